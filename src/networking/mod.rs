/*!

# Networking Interfaces and Methods

## Introduction

The agent talks to replica nodes over plain HTTP with CBOR bodies. Two
endpoint generations are in play:

```bytes
POST /api/v3/canister/{id}/call        synchronous call (may answer 202)
POST /api/v2/canister/{id}/call        asynchronous call (answer by polling)
POST /api/v2/canister/{id}/query       read-only call
POST /api/v2/canister/{id}/read_state  certified state lookup
GET  /api/v2/status                    unauthenticated status document
```

Status codes carry protocol meaning: `200` means a body is present,
`202` means accepted-poll-for-the-result, and `404`/`405` from the v3
call endpoint means this replica does not speak v3, after which the
agent permanently downgrades itself to the v2 path. Everything else is a
transport-level failure surfaced to the caller.

Certified responses (the v3 call reply and every read_state reply) wrap
a certificate which MUST verify against the network's root public key
before any of its contents are believed; see `crate::certificate`.

The `Transport` trait is the seam between the agent and the HTTP
machinery: send bytes, get a status code and bytes back. The bundled
implementation uses reqwest; tests script a mock.

*/

pub mod agent;
pub mod response;
pub mod status;
pub mod transport;
