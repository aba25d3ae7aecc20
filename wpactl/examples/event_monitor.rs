use tokio::sync::broadcast::error::RecvError;
use wpactl::{EventKind, Result, WpaClient};

#[tokio::main]
async fn main() -> Result<()> {
    let client = WpaClient::open("wlan0").await?;
    let mut events = client.subscribe_events();

    println!("Waiting for events on {}...", client.interface());
    loop {
        match events.recv().await {
            Ok(event) => match event.kind {
                EventKind::Connected => println!("connected"),
                EventKind::Disconnected => println!(
                    "disconnected (reason {})",
                    event.args.get("reason").map(String::as_str).unwrap_or("?")
                ),
                EventKind::InvalidKey => println!(
                    "wrong key for {}",
                    event.args.get("ssid").map(String::as_str).unwrap_or("?")
                ),
                kind => println!("{kind}"),
            },
            Err(RecvError::Lagged(missed)) => println!("missed {missed} events"),
            Err(RecvError::Closed) => break,
        }
    }

    println!("Control channel closed");
    Ok(())
}
