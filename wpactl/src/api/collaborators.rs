//! Seams for the system facilities the client works alongside.
//!
//! [`ScanSource`] abstracts "something that can list nearby access points"
//! and is implemented by [`WpaClient`](crate::WpaClient). [`InterfaceControl`]
//! brings a network interface administratively up or down; [`IpLink`] does
//! so through the `ip` tool.

use async_trait::async_trait;
use log::{debug, warn};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use crate::Result;
use crate::api::models::{AccessPoint, WpaError};

/// Anything that can produce a list of visible access points.
#[async_trait]
pub trait ScanSource {
    async fn scan(&self) -> Result<Vec<AccessPoint>>;
}

/// Administrative link state control.
#[async_trait]
pub trait InterfaceControl {
    async fn set_up(&self, interface: &str) -> Result<()>;

    async fn set_down(&self, interface: &str) -> Result<()>;
}

/// [`InterfaceControl`] backed by `ip link set dev <iface> up|down`.
///
/// Usually requires `CAP_NET_ADMIN`.
#[derive(Debug, Clone)]
pub struct IpLink {
    program: PathBuf,
}

impl Default for IpLink {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ip"),
        }
    }
}

impl IpLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a different `ip` binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    async fn set_state(&self, interface: &str, state: &str) -> Result<()> {
        let program = self.program.display().to_string();
        debug!("{program} link set dev {interface} {state}");

        let status = Command::new(&self.program)
            .args(["link", "set", "dev", interface, state])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| WpaError::SpawnFailed {
                program: program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            warn!("Setting {interface} {state} failed: {status}");
            Err(WpaError::ExternalCommand {
                program,
                status: status.to_string(),
            })
        }
    }
}

#[async_trait]
impl InterfaceControl for IpLink {
    async fn set_up(&self, interface: &str) -> Result<()> {
        self.set_state(interface, "up").await
    }

    async fn set_down(&self, interface: &str) -> Result<()> {
        self.set_state(interface, "down").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_ip_tool_is_spawn_failure() {
        let link = IpLink::new().with_program("/nonexistent/ip");
        let err = link.set_up("wlan0").await.unwrap_err();
        assert!(matches!(err, WpaError::SpawnFailed { program, .. } if program == "/nonexistent/ip"));
    }

    #[tokio::test]
    async fn failing_tool_reports_exit_status() {
        let link = IpLink::new().with_program("false");
        let err = link.set_down("wlan0").await.unwrap_err();
        assert!(matches!(err, WpaError::ExternalCommand { program, .. } if program == "false"));
    }
}
