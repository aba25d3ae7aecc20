//! Constants for the wpa_supplicant control protocol.
//!
//! These correspond to the command words, reply tokens and markers used on
//! the interactive `wpa_cli` channel.

/// Control interface command words.
pub mod command {
    pub const PING: &str = "PING";
    pub const STATUS: &str = "STATUS";
    pub const SCAN: &str = "SCAN";
    pub const SCAN_RESULTS: &str = "SCAN_RESULTS";
    pub const LIST_NETWORKS: &str = "LIST_NETWORKS";
    pub const ADD_NETWORK: &str = "ADD_NETWORK";
    pub const SET_NETWORK: &str = "SET_NETWORK";
    pub const GET_NETWORK: &str = "GET_NETWORK";
    pub const ENABLE_NETWORK: &str = "ENABLE_NETWORK";
    pub const DISABLE_NETWORK: &str = "DISABLE_NETWORK";
    pub const SELECT_NETWORK: &str = "SELECT_NETWORK";
    pub const REMOVE_NETWORK: &str = "REMOVE_NETWORK";
    pub const SAVE_CONFIG: &str = "SAVE_CONFIG";
    pub const DISCONNECT: &str = "DISCONNECT";
    pub const RECONNECT: &str = "RECONNECT";
    pub const REASSOCIATE: &str = "REASSOCIATE";
}

/// Reply tokens the daemon uses to accept or reject a command.
pub mod reply {
    pub const OK: &str = "OK";
    pub const PONG: &str = "PONG";
    pub const FAIL: &str = "FAIL";
    pub const FAIL_PREFIX: &str = "FAIL-";
    pub const FAIL_BUSY: &str = "FAIL-BUSY";
    pub const UNKNOWN_COMMAND: &str = "UNKNOWN COMMAND";
}

/// Framing markers of the interactive channel.
pub mod marker {
    /// Idle prompt printed between messages.
    pub const PROMPT: &str = ">";
    /// Literal that follows the `<level>` prefix on every control event.
    pub const EVENT: &str = "CTRL";
    /// Header line of the `LIST_NETWORKS` table.
    pub const NETWORK_TABLE_HEADER: &str = "network id";
    /// Header line of the `SCAN_RESULTS` table.
    pub const SCAN_TABLE_HEADER: &str = "bssid";
}

/// Control event tags with a semantic meaning.
pub mod event_tag {
    pub const SCAN_STARTED: &str = "CTRL-EVENT-SCAN-STARTED";
    pub const SCAN_RESULTS: &str = "CTRL-EVENT-SCAN-RESULTS";
    pub const CONNECTED: &str = "CTRL-EVENT-CONNECTED";
    pub const DISCONNECTED: &str = "CTRL-EVENT-DISCONNECTED";
    pub const SSID_TEMP_DISABLED: &str = "CTRL-EVENT-SSID-TEMP-DISABLED";
    pub const TERMINATING: &str = "CTRL-EVENT-TERMINATING";
}

/// Status field names reported by `STATUS`.
pub mod status_field {
    pub const MODE: &str = "mode";
    pub const WPA_STATE: &str = "wpa_state";
    pub const IP_ADDRESS: &str = "ip_address";
    pub const SSID: &str = "ssid";
    pub const BSSID: &str = "bssid";
    pub const ID: &str = "id";
    pub const DISCONNECTED: &str = "disconnected";
}

/// Credential limits enforced before anything is sent to the daemon.
pub mod limits {
    pub const SSID_MAX_BYTES: usize = 32;
    pub const PASSPHRASE_MIN: usize = 8;
    pub const PASSPHRASE_MAX: usize = 63;
    pub const RAW_PSK_HEX_LEN: usize = 64;
    pub const WEP_KEY_SLOTS: u8 = 4;
}

/// Timeout defaults for command replies and event waits.
///
/// Every value here can be overridden through [`ClientConfig`](crate::ClientConfig).
pub mod timeouts {
    use std::time::Duration;

    /// Maximum time a single command may wait for its reply (10 seconds).
    const COMMAND_TIMEOUT_SECS: u64 = 10;

    /// Quiet period that ends a multi-line reply when no prompt follows it.
    const REPLY_SETTLE_MS: u64 = 150;

    /// Time allowed for the `wpa_cli` banner before the first command.
    const STARTUP_TIMEOUT_MS: u64 = 1000;

    /// Maximum time to wait for scan results after requesting a scan.
    const SCAN_TIMEOUT_SECS: u64 = 15;

    /// Maximum time to wait for association after configuring a network.
    const CONNECT_TIMEOUT_SECS: u64 = 30;

    /// Returns the per-command reply timeout.
    pub fn command_timeout() -> Duration {
        Duration::from_secs(COMMAND_TIMEOUT_SECS)
    }

    /// Returns the multi-line reply settle window.
    pub fn reply_settle() -> Duration {
        Duration::from_millis(REPLY_SETTLE_MS)
    }

    /// Returns the startup banner timeout.
    pub fn startup_timeout() -> Duration {
        Duration::from_millis(STARTUP_TIMEOUT_MS)
    }

    /// Returns the scan completion timeout.
    pub fn scan_timeout() -> Duration {
        Duration::from_secs(SCAN_TIMEOUT_SECS)
    }

    /// Returns the association timeout.
    pub fn connect_timeout() -> Duration {
        Duration::from_secs(CONNECT_TIMEOUT_SECS)
    }
}

/// Wi-Fi frequency constants (MHz)
pub mod frequency {
    pub const BAND_2_4_START: u32 = 2412;
    pub const BAND_2_4_END: u32 = 2472;
    pub const BAND_2_4_CH14: u32 = 2484;
    pub const BAND_5_START: u32 = 5150;
    pub const BAND_5_END: u32 = 5925;
    pub const BAND_6_START: u32 = 5955;
    pub const BAND_6_END: u32 = 7115;
    pub const CHANNEL_SPACING: u32 = 5;
}

/// Signal strength thresholds for bar display
pub mod signal_strength {
    pub const BAR_1_MAX: u8 = 24;
    pub const BAR_2_MIN: u8 = BAR_1_MAX + 1;
    pub const BAR_2_MAX: u8 = 49;
    pub const BAR_3_MIN: u8 = BAR_2_MAX + 1;
    pub const BAR_3_MAX: u8 = 74;
    /// dBm at or below which quality is reported as 0%.
    pub const DBM_FLOOR: i32 = -100;
    /// dBm at or above which quality is reported as 100%.
    pub const DBM_CEILING: i32 = -50;
}
