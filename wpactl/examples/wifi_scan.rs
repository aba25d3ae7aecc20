use wpactl::{Result, ScanSource, WpaClient, bars_from_strength};

#[tokio::main]
async fn main() -> Result<()> {
    let interface = std::env::args().nth(1).unwrap_or_else(|| "wlan0".into());
    let client = WpaClient::open(&interface).await?;

    println!("Scanning on {interface}...");
    let access_points = ScanSource::scan(&client).await?;

    for ap in &access_points {
        let ssid = if ap.ssid.is_empty() { "<hidden>" } else { &ap.ssid };
        println!(
            "{} {:<32} {:>4} MHz  {:<7}  {}",
            bars_from_strength(ap.strength()),
            ssid,
            ap.frequency,
            ap.security().to_string(),
            ap.bssid
        );
    }

    client.close().await;
    Ok(())
}
