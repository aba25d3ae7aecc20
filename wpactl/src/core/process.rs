//! The `wpa_cli` subprocess that carries the control channel.

use log::debug;
use std::process::Stdio;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::Result;
use crate::api::models::{ClientConfig, WpaError};

/// A running `wpa_cli` with its pipes taken out.
///
/// The child is spawned with kill-on-drop, so dropping the handle on any
/// path (including a failed open) releases the process.
pub(crate) struct CliProcess {
    pub(crate) child: Child,
    pub(crate) stdin: ChildStdin,
    pub(crate) stdout: ChildStdout,
}

/// Spawns `wpa_cli -i <interface> [-p <ctrl_path>]` in interactive mode.
pub(crate) fn spawn(interface: &str, config: &ClientConfig) -> Result<CliProcess> {
    let program = config.cli_path.display().to_string();

    let mut command = Command::new(&config.cli_path);
    command.arg("-i").arg(interface);
    if let Some(ctrl_path) = &config.ctrl_path {
        command.arg("-p").arg(ctrl_path);
    }
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| WpaError::SpawnFailed {
        program: program.clone(),
        source,
    })?;
    debug!("Spawned {program} for {interface} (pid {:?})", child.id());

    let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
        return Err(WpaError::SpawnFailed {
            program,
            source: std::io::Error::other("child pipes unavailable"),
        });
    };

    Ok(CliProcess {
        child,
        stdin,
        stdout,
    })
}

/// Kills the child and reaps it.
pub(crate) async fn terminate(child: &mut Child) {
    match child.kill().await {
        Ok(()) => debug!("wpa_cli terminated"),
        Err(e) => debug!("wpa_cli already gone: {e}"),
    }
}
