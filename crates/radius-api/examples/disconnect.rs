//! Send a Packet of Disconnect straight to a NAS, bypassing the HTTP API
//!
//! cargo run --example disconnect -- <acct-session-id> <secret> [nas] [port]

use radius_api::coa::{CoaClient, CoaConfig, CoaTarget};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <acct-session-id> <secret> [nas] [port]", args[0]);
        eprintln!("Example: {} 81200004 testing123 192.168.88.1 3799", args[0]);
        std::process::exit(1);
    }

    let session = &args[1];
    let secret = args[2].as_bytes().to_vec();
    let nas = args.get(3).map(|s| s.as_str()).unwrap_or("127.0.0.1");
    let port = match args.get(4) {
        Some(port) => port.parse()?,
        None => radius_api::coa::DEFAULT_COA_PORT,
    };

    let client = CoaClient::new(CoaConfig {
        port,
        ..CoaConfig::default()
    });
    let address = client.resolve(nas).await?;

    println!("Disconnect-Request for session {} to {}", session, address);

    let target = CoaTarget {
        nas: address,
        secret,
        acct_session_id: session.clone(),
        username: None,
        framed_ip: None,
    };

    match client.disconnect(&target).await {
        Ok(outcome) => println!("{:?} after {} attempt(s)", outcome.code, outcome.attempts),
        Err(e) => {
            eprintln!("Disconnect failed: {}", e);
            std::process::exit(2);
        }
    }

    Ok(())
}
