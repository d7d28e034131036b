/*!
# Welcome to Icarus

Icarus is a client agent for networks of replicated execution nodes
("canisters" hosted on "subnets"). It speaks the wire protocol end to
end: typed arguments go through a self-describing binary codec, requests
are content-hashed into stable identifiers, signed into envelopes,
submitted over the versioned HTTP endpoints, and every certified answer
is checked against the network's root key before a caller ever sees it.

# Usage

```no_run
use icarus::networking::agent::Agent;
use icarus::principal::Principal;

# async fn example() -> icarus::Result<()> {
let agent = Agent::builder()
    .with_url("https://icp-api.io")?
    .build()?;
let canister = Principal::from_text("ryjl3-tyaaa-aaaaa-aaaba-cai")?;
let reply = agent
    .query(&canister, "name", icarus::candid::encode_args(&[])?)
    .await?;
# Ok(())
# }
```

# Contact

The Icarus Team
dev@icarus.network

*/
#[macro_use]
extern crate lazy_static;

pub mod candid;
pub mod certificate;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod hash_tree;
pub mod identity;
pub mod networking;
pub mod principal;
pub mod request_id;
pub mod test_utilities;
pub mod time;

pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;
