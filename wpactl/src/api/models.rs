use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::types::constants::{event_tag, frequency, status_field, timeouts};
use crate::util::utils::{channel_from_freq, strength_from_dbm};

/// Arguments of a control event, keyed by argument name.
///
/// Tokens without `=` are stored as flags with an empty value.
pub type EventArgs = HashMap<String, String>;

/// Control event tags with a semantic meaning.
///
/// Every control event is published on the raw `control` channel; the
/// tags listed here are additionally published as a [`WpaEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A scan was started (`CTRL-EVENT-SCAN-STARTED`).
    Scanning,
    /// Scan results are available (`CTRL-EVENT-SCAN-RESULTS`).
    Scanned,
    /// Association and authentication completed (`CTRL-EVENT-CONNECTED`).
    Connected,
    /// The link was lost or torn down (`CTRL-EVENT-DISCONNECTED`).
    Disconnected,
    /// The network was temporarily disabled, usually after a wrong key
    /// (`CTRL-EVENT-SSID-TEMP-DISABLED`).
    InvalidKey,
    /// The daemon is shutting down (`CTRL-EVENT-TERMINATING`).
    Terminating,
}

impl EventKind {
    /// Every semantic event kind, in declaration order.
    pub const ALL: [EventKind; 6] = [
        Self::Scanning,
        Self::Scanned,
        Self::Connected,
        Self::Disconnected,
        Self::InvalidKey,
        Self::Terminating,
    ];

    /// Maps a control event tag to its semantic kind.
    ///
    /// The tag is compared exactly; the classifier uppercases tags before
    /// calling this.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            event_tag::SCAN_STARTED => Some(Self::Scanning),
            event_tag::SCAN_RESULTS => Some(Self::Scanned),
            event_tag::CONNECTED => Some(Self::Connected),
            event_tag::DISCONNECTED => Some(Self::Disconnected),
            event_tag::SSID_TEMP_DISABLED => Some(Self::InvalidKey),
            event_tag::TERMINATING => Some(Self::Terminating),
            _ => None,
        }
    }

    /// Returns the control event tag this kind is published for.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Scanning => event_tag::SCAN_STARTED,
            Self::Scanned => event_tag::SCAN_RESULTS,
            Self::Connected => event_tag::CONNECTED,
            Self::Disconnected => event_tag::DISCONNECTED,
            Self::InvalidKey => event_tag::SSID_TEMP_DISABLED,
            Self::Terminating => event_tag::TERMINATING,
        }
    }

    /// Returns the short notification name (`"scanned"`, `"invalidkey"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scanning => "scanning",
            Self::Scanned => "scanned",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::InvalidKey => "invalidkey",
            Self::Terminating => "terminating",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unsolicited notification line pushed by the daemon.
///
/// Produced from lines of the form `<level>CTRL-... key=value ...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEvent {
    /// Message priority digit from the `<level>` prefix.
    pub level: u8,
    /// Uppercased event tag, e.g. `CTRL-EVENT-DISCONNECTED`.
    pub tag: String,
    /// Parsed `key=value` arguments.
    pub args: EventArgs,
}

impl ControlEvent {
    /// Returns the semantic kind of this event, if its tag is known.
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_tag(&self.tag)
    }

    /// Returns the value of a single argument.
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }
}

impl Display for ControlEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag)?;
        let sorted: BTreeMap<_, _> = self.args.iter().collect();
        for (key, value) in sorted {
            if value.is_empty() {
                write!(f, " {key}")?;
            } else {
                write!(f, " {key}={value}")?;
            }
        }
        Ok(())
    }
}

/// A semantic notification derived from a known control event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WpaEvent {
    pub kind: EventKind,
    pub args: EventArgs,
}

/// Lifecycle state of the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// The reader is running and commands are accepted.
    Open,
    /// The channel ended; no further events are published.
    Closed,
}

/// Numeric id the daemon assigns to a configured network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId(pub u32);

impl Display for NetworkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NetworkId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

bitflags! {
    /// Status flags of a configured network as shown by `LIST_NETWORKS`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NetworkFlags: u8 {
        /// The network is the one currently in use.
        const CURRENT = 0b0001;
        /// The network is disabled.
        const DISABLED = 0b0010;
        /// The network is temporarily disabled after failures.
        const TEMP_DISABLED = 0b0100;
        /// The network is a persistent P2P group.
        const P2P_PERSISTENT = 0b1000;
    }
}

impl NetworkFlags {
    /// Parses a bracketed flag list such as `[CURRENT][DISABLED]`.
    ///
    /// Unknown flags are ignored.
    pub fn parse(raw: &str) -> Self {
        raw.split(['[', ']'])
            .filter(|f| !f.is_empty())
            .fold(Self::empty(), |acc, flag| {
                acc | match flag {
                    "CURRENT" => Self::CURRENT,
                    "DISABLED" => Self::DISABLED,
                    "TEMP-DISABLED" => Self::TEMP_DISABLED,
                    "P2P-PERSISTENT" => Self::P2P_PERSISTENT,
                    _ => Self::empty(),
                }
            })
    }
}

/// A configured network as reported by `LIST_NETWORKS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub id: NetworkId,
    pub ssid: String,
    pub bssid: String,
    /// Raw flag column, e.g. `[CURRENT]`.
    pub flags: String,
}

impl NetworkRecord {
    /// Returns the typed view of the flag column.
    pub fn network_flags(&self) -> NetworkFlags {
        NetworkFlags::parse(&self.flags)
    }

    /// Returns whether this is the network currently in use.
    pub fn is_current(&self) -> bool {
        self.network_flags().contains(NetworkFlags::CURRENT)
    }

    /// Returns whether the SSID matches either verbatim or quote-wrapped.
    ///
    /// Some daemon replies quote string fields and some do not.
    pub fn matches_ssid(&self, ssid: &str) -> bool {
        self.ssid == ssid || self.ssid == format!("\"{ssid}\"")
    }
}

/// Authentication used when no passphrase is supplied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Auth {
    /// Open network (`key_mgmt=NONE`).
    #[default]
    Open,
    /// Static WEP key in the given key slot (0-3).
    Wep { key: String, index: u8 },
}

/// Options for [`WpaClient::add_or_update_network`](crate::WpaClient::add_or_update_network).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkOptions {
    /// Authentication for networks without a WPA passphrase.
    pub auth: Auth,
}

impl NetworkOptions {
    /// Options for a WEP network using `key` in slot `index`.
    pub fn wep(key: impl Into<String>, index: u8) -> Self {
        Self {
            auth: Auth::Wep {
                key: key.into(),
                index,
            },
        }
    }
}

/// Flat `key=value` view of the daemon's `STATUS` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub fields: BTreeMap<String, String>,
}

impl Status {
    /// Returns a raw status field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Supplicant state, e.g. `COMPLETED` or `DISCONNECTED`.
    pub fn wpa_state(&self) -> Option<&str> {
        self.get(status_field::WPA_STATE)
    }

    pub fn ssid(&self) -> Option<&str> {
        self.get(status_field::SSID)
    }

    pub fn bssid(&self) -> Option<&str> {
        self.get(status_field::BSSID)
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.get(status_field::IP_ADDRESS)
    }

    /// Id of the network currently selected, if any.
    pub fn network_id(&self) -> Option<NetworkId> {
        self.get(status_field::ID).and_then(|id| id.parse().ok())
    }
}

/// Inferred operating role of the interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// The daemon reported a `mode` field; carried verbatim.
    Reported(String),
    /// Disconnected as a station but holding an address: acting as AP.
    AccessPoint,
    /// Disconnected without an address.
    Idle,
    /// Any other combination.
    Unknown,
}

impl Mode {
    /// Returns the mode string: the reported value, `"ap"`, `""` or `"unknown"`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Reported(mode) => mode,
            Self::AccessPoint => "ap",
            Self::Idle => "",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Security type advertised by an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Security {
    Open,
    Wep,
    WpaPsk,
    WpaEap,
}

impl Display for Security {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Wep => write!(f, "WEP"),
            Self::WpaPsk => write!(f, "WPA-PSK"),
            Self::WpaEap => write!(f, "WPA-EAP"),
        }
    }
}

/// An access point seen in the daemon's scan results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub bssid: String,
    /// Operating frequency in MHz.
    pub frequency: u32,
    /// Signal level in dBm.
    pub signal: i32,
    /// Raw capability flags, e.g. `[WPA2-PSK-CCMP][ESS]`.
    pub flags: String,
    pub ssid: String,
}

impl AccessPoint {
    /// Derives the security type from the capability flags.
    pub fn security(&self) -> Security {
        if self.flags.contains("-EAP") {
            Security::WpaEap
        } else if self.flags.contains("WPA") || self.flags.contains("SAE") {
            Security::WpaPsk
        } else if self.flags.contains("WEP") {
            Security::Wep
        } else {
            Security::Open
        }
    }

    /// Returns the channel number for the access point's frequency.
    pub fn channel(&self) -> Option<u16> {
        channel_from_freq(self.frequency)
    }

    /// Signal quality as a percentage (0-100).
    pub fn strength(&self) -> u8 {
        strength_from_dbm(self.signal)
    }

    /// Returns whether the access point operates in the 5 GHz band.
    pub fn is_5ghz(&self) -> bool {
        (frequency::BAND_5_START..=frequency::BAND_5_END).contains(&self.frequency)
    }
}

/// Configuration for a [`WpaClient`](crate::WpaClient).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use wpactl::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_command_timeout(Duration::from_secs(5))
///     .with_ctrl_path("/run/wpa_supplicant");
/// assert_eq!(config.command_timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Path or name of the `wpa_cli` binary.
    pub cli_path: PathBuf,
    /// Control interface directory passed with `-p`.
    pub ctrl_path: Option<PathBuf>,
    /// Maximum time a command waits for its reply.
    pub command_timeout: Duration,
    /// Quiet period that ends a multi-line reply.
    pub reply_settle: Duration,
    /// Time allowed for the startup banner.
    pub startup_timeout: Duration,
    /// Maximum wait for scan results.
    pub scan_timeout: Duration,
    /// Maximum wait for association.
    pub connect_timeout: Duration,
    /// Buffer size of each event channel.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cli_path: PathBuf::from("wpa_cli"),
            ctrl_path: None,
            command_timeout: timeouts::command_timeout(),
            reply_settle: timeouts::reply_settle(),
            startup_timeout: timeouts::startup_timeout(),
            scan_timeout: timeouts::scan_timeout(),
            connect_timeout: timeouts::connect_timeout(),
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cli_path = path.into();
        self
    }

    #[must_use]
    pub fn with_ctrl_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ctrl_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reply_settle(mut self, settle: Duration) -> Self {
        self.reply_settle = settle;
        self
    }

    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the event channel capacity. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

/// Errors that can occur while driving the control channel.
#[derive(Debug, Error)]
pub enum WpaError {
    /// The `wpa_cli` process could not be started.
    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading from or writing to the control channel failed.
    #[error("control channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel ended or was closed while the command was pending or queued.
    #[error("control channel closed")]
    ChannelClosed,

    /// The daemon rejected the command.
    #[error("command `{command}` failed: {reply}")]
    CommandFailed { command: String, reply: String },

    /// No reply arrived within the command timeout.
    #[error("command `{0}` timed out")]
    Timeout(String),

    /// The reply did not have the expected shape.
    #[error("unexpected reply to `{command}`: {reply}")]
    UnexpectedReply { command: String, reply: String },

    /// The command text would span more than one line on the wire.
    #[error("command `{0}` contains a line break")]
    InvalidCommand(String),

    /// The network is not configured on the daemon.
    #[error("network not found: {0}")]
    NetworkNotFound(String),

    /// A configuration step failed; earlier steps stay applied.
    #[error("configuring network {id} failed at `{step}`: {source}")]
    ConfigureFailed {
        id: NetworkId,
        step: String,
        #[source]
        source: Box<WpaError>,
    },

    /// The daemon temporarily disabled the network after a key failure.
    #[error("authentication failed for {0}")]
    AuthFailed(String),

    /// The expected event did not arrive in time.
    #[error("timed out waiting for {0} event")]
    EventTimeout(EventKind),

    /// The SSID is empty, too long or contains control characters.
    #[error("invalid SSID: {0}")]
    InvalidSsid(String),

    /// The passphrase or key has an invalid length or format.
    #[error("invalid password: {0}")]
    InvalidPassword(String),

    /// An external helper command exited unsuccessfully.
    #[error("{program} exited with {status}")]
    ExternalCommand { program: String, status: String },
}

impl WpaError {
    /// Returns whether the error means the channel is gone for good.
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, Self::ChannelClosed)
    }
}
