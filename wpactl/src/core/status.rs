//! Interface status and operating mode.

use crate::Result;
use crate::try_log;
use crate::api::models::{Mode, Status};
use crate::core::channel::{CommandChannel, ReplyShape};
use crate::types::constants::{command, status_field};

/// Parses `key=value` lines into a [`Status`].
///
/// Lines without `=` are ignored; a value may itself contain `=`.
pub(crate) fn parse_status(reply: &str) -> Status {
    let fields = reply
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();
    Status { fields }
}

/// Derives the operating mode from a status snapshot.
///
/// The control protocol has no direct notion of station versus access point,
/// so it is inferred: an explicit `mode` field wins; otherwise a
/// disconnected supplicant holding an address is taken to be an AP and one
/// without an address to be idle. Anything else is indeterminate.
pub(crate) fn resolve_mode(status: &Status) -> Mode {
    if let Some(mode) = status.get(status_field::MODE) {
        return Mode::Reported(mode.to_string());
    }

    let disconnected = status
        .wpa_state()
        .is_some_and(|state| state.eq_ignore_ascii_case(status_field::DISCONNECTED));
    if !disconnected {
        return Mode::Unknown;
    }

    match status.ip_address() {
        Some(ip) if !ip.is_empty() => Mode::AccessPoint,
        _ => Mode::Idle,
    }
}

impl Status {
    /// Inferred operating mode; see [`Mode`].
    pub fn mode(&self) -> Mode {
        resolve_mode(self)
    }
}

pub(crate) async fn status(channel: &CommandChannel) -> Result<Status> {
    let reply = channel.request(command::STATUS, ReplyShape::Block).await?;
    Ok(parse_status(&reply))
}

/// SSID of the current association, if any.
///
/// Failures are logged and reported as `None`.
pub(crate) async fn current_ssid(channel: &CommandChannel) -> Option<String> {
    let status = try_log!(status(channel).await, "Failed to read status");
    status
        .ssid()
        .filter(|ssid| !ssid.is_empty())
        .map(str::to_string)
}
