//! Waiting for daemon state transitions through control events.
//!
//! The daemon announces scan completion, association and authentication
//! failures as `CTRL-EVENT-*` notifications. Instead of polling `STATUS`,
//! these helpers wait on the semantic event stream.
//!
//! Callers must subscribe *before* issuing the command whose outcome they
//! wait for, otherwise a fast daemon can emit the event first.

use log::{debug, warn};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::timeout;

use crate::Result;
use crate::api::models::{EventKind, WpaError, WpaEvent};
use crate::monitoring::events::is_kind;

/// Waits for the first event whose kind is one of `kinds`.
///
/// Fails with [`WpaError::EventTimeout`] (naming the first kind) when
/// `wait` elapses and with [`WpaError::ChannelClosed`] when the stream ends.
pub(crate) async fn wait_for_event(
    events: &mut broadcast::Receiver<WpaEvent>,
    kinds: &[EventKind],
    wait: Duration,
) -> Result<WpaEvent> {
    let expected = kinds.first().copied().unwrap_or(EventKind::Terminating);

    let outcome = timeout(wait, async {
        loop {
            match events.recv().await {
                Ok(event) if is_kind(&event, kinds) => return Ok(event),
                Ok(event) => debug!("Ignoring {} while waiting for {expected}", event.kind),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Event subscriber lagged, {missed} event(s) dropped");
                }
                Err(RecvError::Closed) => return Err(WpaError::ChannelClosed),
            }
        }
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(_) => {
            warn!("Timed out after {wait:?} waiting for {expected}");
            Err(WpaError::EventTimeout(expected))
        }
    }
}

/// Waits until the supplicant associates with `ssid`.
///
/// A `CTRL-EVENT-SSID-TEMP-DISABLED` for the same network (wrong key) fails
/// with [`WpaError::AuthFailed`]; daemon termination fails with
/// [`WpaError::ChannelClosed`]. Disconnect events are expected while the
/// network is being reselected and are ignored.
pub(crate) async fn wait_for_connection(
    events: &mut broadcast::Receiver<WpaEvent>,
    ssid: &str,
    wait: Duration,
) -> Result<()> {
    let kinds = [
        EventKind::Connected,
        EventKind::InvalidKey,
        EventKind::Terminating,
    ];

    loop {
        let event = wait_for_event(events, &kinds, wait).await?;
        match event.kind {
            EventKind::Connected => {
                debug!("Associated with {ssid}");
                return Ok(());
            }
            EventKind::InvalidKey => {
                // Temp-disable events name the network; skip other networks.
                match event.args.get("ssid") {
                    Some(other) if other != ssid => {
                        debug!("Ignoring authentication failure for {other}");
                    }
                    _ => {
                        warn!("Authentication failed for {ssid}");
                        return Err(WpaError::AuthFailed(ssid.to_string()));
                    }
                }
            }
            _ => {
                warn!("Daemon terminated while connecting to {ssid}");
                return Err(WpaError::ChannelClosed);
            }
        }
    }
}
