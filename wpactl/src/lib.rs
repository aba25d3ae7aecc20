//! A Rust client for `wpa_supplicant`'s interactive control channel.
//!
//! `wpactl` drives `wpa_cli` in interactive mode and turns its single text
//! stream into two things:
//!
//! - Replies to commands, matched to the command that caused them
//! - Asynchronous control events (`<3>CTRL-EVENT-...`), broadcast to
//!   subscribers
//!
//! On top of that it offers the usual network lifecycle (add, configure,
//! enable, select, save, remove), scanning, and status/mode queries.
//!
//! # Example
//!
//! ```no_run
//! use wpactl::WpaClient;
//!
//! # async fn example() -> wpactl::Result<()> {
//! let client = WpaClient::open("wlan0").await?;
//!
//! for network in client.list_networks().await? {
//!     println!("{} {} {}", network.id, network.ssid, network.flags);
//! }
//!
//! client.add_or_update_network("MyNetwork", Some("password123")).await?;
//! client.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Command ordering
//!
//! The control channel has no request identifiers: a reply is attributed to
//! whichever command is outstanding. Commands are therefore admitted one at
//! a time in FIFO order, and every command has a timeout
//! ([`ClientConfig::with_command_timeout`]) so a lost reply cannot block the
//! queue forever.
//!
//! # Error Handling
//!
//! All operations return `Result<T, WpaError>`. Daemon rejections (`FAIL`,
//! `FAIL-BUSY`, `UNKNOWN COMMAND`) surface as [`WpaError::CommandFailed`];
//! loss of the subprocess surfaces as [`WpaError::ChannelClosed`] on every
//! pending and queued command.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade for logging. Wire
//! traffic is logged at `debug` with secrets hidden. To see log output, add
//! a logging implementation like `env_logger`. For example:
//!
//! ```no_run,ignore
//! env_logger::init();
//! // ...
//! ```

// Internal implementation modules
mod core;
mod monitoring;
mod types;
mod util;

// Public API modules
pub mod api;

// Re-exported public API
pub use api::collaborators::{InterfaceControl, IpLink, ScanSource};
pub use api::models::{
    AccessPoint, Auth, ChannelState, ClientConfig, ControlEvent, EventArgs, EventKind, Mode,
    NetworkFlags, NetworkId, NetworkOptions, NetworkRecord, Security, Status, WpaError, WpaEvent,
};
pub use api::wpa_client::WpaClient;
pub use crate::core::channel::ReplyShape;
pub use crate::util::utils::bars_from_strength;

/// A specialized `Result` type for control channel operations.
pub type Result<T> = std::result::Result<T, WpaError>;
