/*!
# Icarus Command Line Interface

A binary for poking canisters from the command line.

## Usage

```bash
icaruscli help [subcommand]
```

## Available subcommands

**status**

prints the replica's status document

**query**

sends a read-only call and prints the reply bytes

**call**

sends a state-changing call, polls it to completion, prints the reply

## Example

```bash
cargo run --bin icaruscli -- status --url http://localhost:8000
cargo run --bin icaruscli -- query --url http://localhost:8000 --canister ryjl3-tyaaa-aaaaa-aaaba-cai --method name
cargo run --bin icaruscli -- call --url http://localhost:8000 --canister ryjl3-tyaaa-aaaaa-aaaba-cai --method transfer --arg-hex 4449444c0000
```
*/
use clap::{App, Arg};
use icarus::candid::encode_args;
use icarus::networking::agent::Agent;
use icarus::principal::Principal;

fn url_arg() -> Arg<'static, 'static> {
    Arg::with_name("url")
        .short("u")
        .long("url")
        .required(true)
        .takes_value(true)
        .help("base url of the replica, e.g. http://localhost:8000")
}

fn canister_arg() -> Arg<'static, 'static> {
    Arg::with_name("canister")
        .short("c")
        .long("canister")
        .required(true)
        .takes_value(true)
        .help("target canister in textual form")
}

fn method_arg() -> Arg<'static, 'static> {
    Arg::with_name("method")
        .short("m")
        .long("method")
        .required(true)
        .takes_value(true)
        .help("method name to invoke")
}

fn arg_hex_arg() -> Arg<'static, 'static> {
    Arg::with_name("arg-hex")
        .short("a")
        .long("arg-hex")
        .takes_value(true)
        .help("hex-encoded argument bytes; defaults to an empty argument list")
}

#[tokio::main]
pub async fn main() -> icarus::Result<()> {
    tracing_subscriber::fmt::init();

    let command_matches = App::new("Icarus Command Line Interface")
        .about("Talk to canisters through the command line")
        .subcommand(
            App::new("status")
                .about("prints the replica status document")
                .arg(url_arg()),
        )
        .subcommand(
            App::new("query")
                .about("sends a read-only call")
                .arg(url_arg())
                .arg(canister_arg())
                .arg(method_arg())
                .arg(arg_hex_arg()),
        )
        .subcommand(
            App::new("call")
                .about("sends a state-changing call and waits for the result")
                .arg(url_arg())
                .arg(canister_arg())
                .arg(method_arg())
                .arg(arg_hex_arg()),
        )
        .get_matches();

    if let Some(matches) = command_matches.subcommand_matches("status") {
        let agent = agent_for(matches.value_of("url").unwrap())?;
        let status = agent.status().await?;
        println!("api version : {:?}", status.ic_api_version);
        println!("health      : {:?}", status.replica_health_status);
        println!(
            "root key    : {}",
            status
                .root_key
                .map(|key| hex::encode(key.as_slice()))
                .unwrap_or_else(|| String::from("(production key)"))
        );
    }
    if let Some(matches) = command_matches.subcommand_matches("query") {
        let agent = agent_for(matches.value_of("url").unwrap())?;
        let canister = parse_canister(matches.value_of("canister").unwrap());
        let arg = parse_arg(matches.value_of("arg-hex"))?;
        let reply = agent
            .query(&canister, matches.value_of("method").unwrap(), arg)
            .await?;
        println!("{}", hex::encode(&reply));
    }
    if let Some(matches) = command_matches.subcommand_matches("call") {
        let agent = agent_for(matches.value_of("url").unwrap())?;
        let canister = parse_canister(matches.value_of("canister").unwrap());
        let arg = parse_arg(matches.value_of("arg-hex"))?;
        let reply = agent
            .call(&canister, matches.value_of("method").unwrap(), arg)
            .await?;
        println!("{}", hex::encode(&reply));
    }
    Ok(())
}

fn agent_for(url: &str) -> icarus::Result<Agent> {
    Agent::builder().with_url(url)?.build()
}

fn parse_canister(text: &str) -> Principal {
    Principal::from_text(text).unwrap_or_else(|_error| {
        println!("Invalid canister id. Should be the dashed textual form.");
        println!("got {}", text);
        std::process::exit(1);
    })
}

fn parse_arg(arg_hex: Option<&str>) -> icarus::Result<Vec<u8>> {
    match arg_hex {
        Some(arg_hex) => Ok(hex::decode(arg_hex).unwrap_or_else(|_error| {
            println!("arg-hex must be valid hex");
            std::process::exit(1);
        })),
        None => encode_args(&[]),
    }
}
