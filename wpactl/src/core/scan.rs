//! Wi-Fi scanning through the daemon's own scan commands.
//!
//! A scan is requested with `SCAN`, completion is signalled by the
//! `CTRL-EVENT-SCAN-RESULTS` event, and the results are read back with
//! `SCAN_RESULTS`.

use log::{debug, warn};
use std::time::Duration;

use crate::Result;
use crate::api::models::{AccessPoint, EventKind, WpaError};
use crate::core::channel::{CommandChannel, ReplyShape};
use crate::monitoring::events::EventBus;
use crate::monitoring::state_wait::wait_for_event;
use crate::types::constants::{command, marker, reply};

/// Parses the `SCAN_RESULTS` table, strongest signal first.
///
/// Rows are tab separated: `bssid \t frequency \t signal \t flags \t ssid`.
/// Hidden networks report an empty SSID. Rows with a non-numeric frequency
/// or signal are skipped.
pub(crate) fn parse_scan_results(reply: &str) -> Vec<AccessPoint> {
    let mut access_points: Vec<AccessPoint> = reply
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.starts_with(marker::SCAN_TABLE_HEADER))
        .filter_map(|line| {
            let columns: Vec<&str> = line.split('\t').collect();
            let (Some(bssid), Some(frequency), Some(signal)) =
                (columns.first(), columns.get(1), columns.get(2))
            else {
                warn!("Skipping malformed scan row: {line:?}");
                return None;
            };
            let (Ok(frequency), Ok(signal)) = (frequency.parse::<u32>(), signal.parse::<i32>()) else {
                warn!("Skipping malformed scan row: {line:?}");
                return None;
            };
            Some(AccessPoint {
                bssid: bssid.to_string(),
                frequency,
                signal,
                flags: columns.get(3).copied().unwrap_or_default().to_string(),
                ssid: columns.get(4).copied().unwrap_or_default().to_string(),
            })
        })
        .collect();

    access_points.sort_by(|a, b| b.signal.cmp(&a.signal));
    access_points
}

/// Reads the daemon's latest scan results.
pub(crate) async fn scan_results(channel: &CommandChannel) -> Result<Vec<AccessPoint>> {
    let reply = channel
        .request(command::SCAN_RESULTS, ReplyShape::Block)
        .await?;
    let access_points = parse_scan_results(&reply);
    debug!("Scan results list {} access point(s)", access_points.len());
    Ok(access_points)
}

/// Requests a scan, waits for it to complete and returns the results.
///
/// A `FAIL-BUSY` reply means a scan is already running; its completion
/// event is awaited the same way.
pub(crate) async fn scan(
    channel: &CommandChannel,
    bus: &EventBus,
    wait: Duration,
) -> Result<Vec<AccessPoint>> {
    // Subscribe before triggering so the completion event cannot be missed.
    let mut events = bus.subscribe_events();

    match channel.request(command::SCAN, ReplyShape::Line).await {
        Ok(_) => debug!("Scan requested"),
        Err(WpaError::CommandFailed { reply: text, .. }) if text == reply::FAIL_BUSY => {
            debug!("Scan already in progress, waiting for it");
        }
        Err(e) => return Err(e),
    }

    wait_for_event(&mut events, &[EventKind::Scanned], wait).await?;
    scan_results(channel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Security;

    const TABLE: &str = "bssid / frequency / signal level / flags / ssid\n\
        00:11:22:33:44:55\t2437\t-71\t[WPA2-PSK-CCMP][ESS]\thome\n\
        66:77:88:99:aa:bb\t5180\t-48\t[WPA2-EAP-CCMP][ESS]\tcorp\n\
        cc:dd:ee:ff:00:11\t2412\t-90\t[ESS]\t\n\
        de:ad:be:ef:00:01\t2462\t-60\t[WEP][ESS]\tlegacy net";

    #[test]
    fn parses_and_orders_by_signal() {
        let aps = parse_scan_results(TABLE);
        assert_eq!(aps.len(), 4);
        let ssids: Vec<&str> = aps.iter().map(|ap| ap.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["corp", "legacy net", "home", ""]);
    }

    #[test]
    fn derived_properties() {
        let aps = parse_scan_results(TABLE);
        let corp = &aps[0];
        assert_eq!(corp.security(), Security::WpaEap);
        assert_eq!(corp.channel(), Some(36));
        assert_eq!(corp.strength(), 100);
        assert!(corp.is_5ghz());

        let home = aps.iter().find(|ap| ap.ssid == "home").unwrap();
        assert_eq!(home.security(), Security::WpaPsk);
        assert_eq!(home.channel(), Some(6));
        assert_eq!(home.strength(), 58);

        let legacy = aps.iter().find(|ap| ap.ssid == "legacy net").unwrap();
        assert_eq!(legacy.security(), Security::Wep);

        let hidden = aps.iter().find(|ap| ap.ssid.is_empty()).unwrap();
        assert_eq!(hidden.security(), Security::Open);
    }

    #[test]
    fn skips_malformed_rows() {
        let aps = parse_scan_results(
            "bssid / frequency / signal level / flags / ssid\n\
             junk\n\
             00:11:22:33:44:55\tnot-a-number\t-50\t[ESS]\tx\n\
             00:11:22:33:44:66\t2412\t-50\t[ESS]\tok",
        );
        assert_eq!(aps.len(), 1);
        assert_eq!(aps[0].ssid, "ok");
    }
}
