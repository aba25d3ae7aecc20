use wpactl::{NetworkOptions, Result, WpaClient};

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(ssid), password) = (args.next(), args.next()) else {
        eprintln!("usage: add_network <ssid> [password]");
        return Ok(());
    };

    let client = WpaClient::open("wlan0").await?;

    match client
        .connect(&ssid, password.as_deref(), &NetworkOptions::default())
        .await
    {
        Ok(record) => println!("✓ Connected to {} (network {})", record.ssid, record.id),
        Err(e) => eprintln!("✗ Failed to connect: {e}"),
    }

    println!("\nConfigured networks:");
    for network in client.list_networks().await? {
        println!("  {}. {} {}", network.id, network.ssid, network.flags);
    }

    client.close().await;
    Ok(())
}
