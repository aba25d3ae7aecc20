//! Input validation for network credentials.
//!
//! Invalid SSIDs and keys are rejected before any command reaches the
//! daemon, so a bad argument never leaves a half-configured network behind.

use crate::api::models::{Auth, WpaError};
use crate::types::constants::limits;
use crate::util::utils::is_hex;
use crate::Result;

/// Validates an SSID: non-empty, at most 32 bytes and free of control
/// characters.
pub(crate) fn validate_ssid(ssid: &str) -> Result<()> {
    if ssid.is_empty() {
        return Err(WpaError::InvalidSsid("SSID must not be empty".into()));
    }
    if has_control(ssid) {
        return Err(WpaError::InvalidSsid(
            "SSID must not contain control characters".into(),
        ));
    }
    if ssid.len() > limits::SSID_MAX_BYTES {
        return Err(WpaError::InvalidSsid(format!(
            "SSID is {} bytes, maximum is {}",
            ssid.len(),
            limits::SSID_MAX_BYTES
        )));
    }
    Ok(())
}

/// Validates a WPA passphrase (8-63 characters) or raw PSK (64 hex digits).
pub(crate) fn validate_passphrase(password: &str) -> Result<()> {
    if has_control(password) {
        return Err(WpaError::InvalidPassword(
            "passphrase must not contain control characters".into(),
        ));
    }
    if password.len() == limits::RAW_PSK_HEX_LEN && is_hex(password) {
        return Ok(());
    }
    let len = password.chars().count();
    if !(limits::PASSPHRASE_MIN..=limits::PASSPHRASE_MAX).contains(&len) {
        return Err(WpaError::InvalidPassword(format!(
            "passphrase must be {}-{} characters, got {len}",
            limits::PASSPHRASE_MIN,
            limits::PASSPHRASE_MAX
        )));
    }
    Ok(())
}

/// Validates WEP settings: slot 0-3 and a 5/13 character ASCII key or a
/// 10/26 digit hex key.
pub(crate) fn validate_auth(auth: &Auth) -> Result<()> {
    let Auth::Wep { key, index } = auth else {
        return Ok(());
    };
    if *index >= limits::WEP_KEY_SLOTS {
        return Err(WpaError::InvalidPassword(format!(
            "WEP key index {index} out of range"
        )));
    }
    if has_control(key) {
        return Err(WpaError::InvalidPassword(
            "WEP key must not contain control characters".into(),
        ));
    }
    let valid = match key.len() {
        5 | 13 => true,
        10 | 26 => is_hex(key),
        _ => false,
    };
    if !valid {
        return Err(WpaError::InvalidPassword(
            "WEP key must be 5 or 13 characters, or 10 or 26 hex digits".into(),
        ));
    }
    Ok(())
}

/// Control characters would end or corrupt the command line they are sent on.
fn has_control(value: &str) -> bool {
    value.chars().any(char::is_control)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_ssid() {
        assert!(matches!(validate_ssid(""), Err(WpaError::InvalidSsid(_))));
    }

    #[test]
    fn rejects_ssid_over_32_bytes() {
        assert!(validate_ssid(&"a".repeat(33)).is_err());
        assert!(validate_ssid(&"a".repeat(32)).is_ok());
    }

    #[test]
    fn accepts_valid_passphrases() {
        let max = "a".repeat(63);
        for password in ["password", "password123", max.as_str()] {
            assert!(validate_passphrase(password).is_ok(), "{password}");
        }
    }

    #[test]
    fn rejects_short_and_long_passphrases() {
        assert!(matches!(
            validate_passphrase("short"),
            Err(WpaError::InvalidPassword(_))
        ));
        assert!(validate_passphrase(&"a".repeat(64)).is_err());
    }

    #[test]
    fn rejects_control_characters() {
        assert!(matches!(
            validate_ssid("ab\nREMOVE_NETWORK all"),
            Err(WpaError::InvalidSsid(_))
        ));
        assert!(validate_ssid("tab\there").is_err());
        assert!(matches!(
            validate_passphrase("pass\rDISCONNECT"),
            Err(WpaError::InvalidPassword(_))
        ));
        assert!(validate_auth(&Auth::Wep { key: "ab\ncd".into(), index: 0 }).is_err());
        assert!(validate_ssid("caf\u{e9} wifi").is_ok());
    }

    #[test]
    fn accepts_raw_hex_psk() {
        assert!(validate_passphrase(&"0f".repeat(32)).is_ok());
    }

    #[test]
    fn validates_wep_keys() {
        assert!(validate_auth(&Auth::Open).is_ok());
        assert!(validate_auth(&Auth::Wep { key: "abcde".into(), index: 0 }).is_ok());
        assert!(validate_auth(&Auth::Wep { key: "0123456789".into(), index: 3 }).is_ok());
        assert!(validate_auth(&Auth::Wep { key: "xyz0123456".into(), index: 0 }).is_err());
        assert!(validate_auth(&Auth::Wep { key: "abcde".into(), index: 4 }).is_err());
        assert!(validate_auth(&Auth::Wep { key: "abc".into(), index: 0 }).is_err());
    }
}
