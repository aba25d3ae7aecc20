//! Configured-network workflows.
//!
//! Composes primitive commands into the network lifecycle (add, configure,
//! enable, select, persist, remove) and keeps a cached view of the daemon's
//! network list. The cache is trusted only between a refresh and the next
//! mutation: every mutation here invalidates it, and workflows whose result
//! depends on it re-list before returning.

use log::{debug, warn};
use tokio::sync::{Mutex, RwLock};

use crate::Result;
use crate::api::models::{Auth, NetworkId, NetworkOptions, NetworkRecord, WpaError};
use crate::core::channel::{CommandChannel, ReplyShape};
use crate::types::constants::{command, limits, marker};
use crate::util::utils::{is_hex, quote};
use crate::util::validation::{validate_auth, validate_passphrase, validate_ssid};

/// Cached network list plus the lock that serializes whole workflows.
#[derive(Default)]
pub(crate) struct NetworkCache {
    records: RwLock<Vec<NetworkRecord>>,
    workflow: Mutex<()>,
}

impl NetworkCache {
    /// Exact SSID match against the cached list.
    async fn find(&self, ssid: &str) -> Option<NetworkRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|record| record.ssid == ssid)
            .cloned()
    }

    async fn replace(&self, records: Vec<NetworkRecord>) {
        *self.records.write().await = records;
    }

    async fn invalidate(&self) {
        self.records.write().await.clear();
    }

    async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Value of a `SET_NETWORK` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FieldValue {
    /// String-typed field, sent wrapped in double quotes.
    Quoted(String),
    /// Sent as-is (enums, integers, hex keys).
    Literal(String),
}

/// One network attribute to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NetworkField {
    pub(crate) name: String,
    pub(crate) value: FieldValue,
}

impl NetworkField {
    fn quoted(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Quoted(value.into()),
        }
    }

    pub(crate) fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Literal(value.into()),
        }
    }

    /// Renders `name value` as it appears after `SET_NETWORK <id>`.
    pub(crate) fn render(&self) -> String {
        match &self.value {
            FieldValue::Quoted(value) => format!("{} {}", self.name, quote(value)),
            FieldValue::Literal(value) => format!("{} {value}", self.name),
        }
    }
}

/// Computes the attributes for a network, in the order they are applied.
///
/// With a password: `ssid`, `psk`, `key_mgmt=WPA-PSK`. Without one:
/// `ssid`, `key_mgmt=NONE` and, for WEP, the key index and key. Always ends
/// with `scan_ssid=1` so hidden networks are probed actively.
pub(crate) fn network_fields(
    ssid: &str,
    password: Option<&str>,
    options: &NetworkOptions,
) -> Vec<NetworkField> {
    let mut fields = vec![NetworkField::quoted("ssid", ssid)];

    match password {
        Some(password) => {
            // 64 hex digits is a raw PSK and must not be quoted.
            let psk = if password.len() == limits::RAW_PSK_HEX_LEN && is_hex(password) {
                NetworkField::literal("psk", password)
            } else {
                NetworkField::quoted("psk", password)
            };
            fields.push(psk);
            fields.push(NetworkField::literal("key_mgmt", "WPA-PSK"));
        }
        None => {
            fields.push(NetworkField::literal("key_mgmt", "NONE"));
            if let Auth::Wep { key, index } = &options.auth {
                fields.push(NetworkField::literal("wep_tx_keyidx", index.to_string()));
                let name = format!("wep_key{index}");
                if key.len() == 5 || key.len() == 13 {
                    fields.push(NetworkField::quoted(name, key.as_str()));
                } else {
                    fields.push(NetworkField::literal(name, key.as_str()));
                }
            }
        }
    }

    fields.push(NetworkField::literal("scan_ssid", "1"));
    fields
}

/// Parses the `LIST_NETWORKS` table.
///
/// The header line is skipped. Rows are tab separated:
/// `id \t ssid \t bssid \t flags`; rows without a numeric id are skipped.
pub(crate) fn parse_network_list(reply: &str) -> Vec<NetworkRecord> {
    reply
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.starts_with(marker::NETWORK_TABLE_HEADER))
        .filter_map(|line| {
            let mut columns = line.split('\t');
            let id = columns.next().and_then(|id| id.parse::<NetworkId>().ok());
            let Some(id) = id else {
                warn!("Skipping malformed network row: {line:?}");
                return None;
            };
            Some(NetworkRecord {
                id,
                ssid: columns.next().unwrap_or_default().to_string(),
                bssid: columns.next().unwrap_or_default().to_string(),
                flags: columns.next().unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}

/// Lists configured networks and refreshes the cache.
pub(crate) async fn list_networks(
    channel: &CommandChannel,
    cache: &NetworkCache,
) -> Result<Vec<NetworkRecord>> {
    let reply = channel
        .request(command::LIST_NETWORKS, ReplyShape::Block)
        .await?;
    let records = parse_network_list(&reply);
    debug!("Daemon reports {} configured network(s)", records.len());
    cache.replace(records.clone()).await;
    Ok(records)
}

/// Creates an empty network and returns its id.
pub(crate) async fn add_network(
    channel: &CommandChannel,
    cache: &NetworkCache,
) -> Result<NetworkId> {
    let reply = channel
        .request(command::ADD_NETWORK, ReplyShape::Line)
        .await?;
    cache.invalidate().await;
    reply.parse().map_err(|_| WpaError::UnexpectedReply {
        command: command::ADD_NETWORK.to_string(),
        reply,
    })
}

/// Returns the first cached network whose SSID equals `ssid` exactly.
///
/// The cache is populated only when empty; an already populated cache is
/// not refreshed, so changes made by other clients are seen only after the
/// next [`list_networks`].
pub(crate) async fn find_by_ssid(
    channel: &CommandChannel,
    cache: &NetworkCache,
    ssid: &str,
) -> Result<Option<NetworkRecord>> {
    if cache.is_empty().await {
        list_networks(channel, cache).await?;
    }
    Ok(cache.find(ssid).await)
}

/// Sets one network field.
pub(crate) async fn set_network(
    channel: &CommandChannel,
    cache: &NetworkCache,
    id: NetworkId,
    field: &NetworkField,
) -> Result<()> {
    let command = format!("{} {id} {}", command::SET_NETWORK, field.render());
    channel.request(&command, ReplyShape::Line).await?;
    cache.invalidate().await;
    Ok(())
}

/// Reads one network field verbatim (string fields come back quoted).
pub(crate) async fn get_network(
    channel: &CommandChannel,
    id: NetworkId,
    name: &str,
) -> Result<String> {
    let command = format!("{} {id} {name}", command::GET_NETWORK);
    channel.request(&command, ReplyShape::Line).await
}

/// Writes the current configuration to the daemon's config file.
pub(crate) async fn save_config(channel: &CommandChannel) -> Result<()> {
    channel
        .request(command::SAVE_CONFIG, ReplyShape::Line)
        .await
        .map(drop)
}

/// Creates or updates the network for `ssid`, enables and selects it,
/// persists the configuration and returns the refreshed record.
///
/// Steps run strictly in order. A failing step aborts the rest and is
/// reported as [`WpaError::ConfigureFailed`] with the network id; fields
/// applied before it are not rolled back.
pub(crate) async fn add_or_update_network(
    channel: &CommandChannel,
    cache: &NetworkCache,
    ssid: &str,
    password: Option<&str>,
    options: &NetworkOptions,
) -> Result<NetworkRecord> {
    validate_ssid(ssid)?;
    match password {
        Some(password) => validate_passphrase(password)?,
        None => validate_auth(&options.auth)?,
    }

    let _workflow = cache.workflow.lock().await;

    let id = match find_by_ssid(channel, cache, ssid).await? {
        Some(existing) => {
            debug!("Updating network {} ({ssid})", existing.id);
            existing.id
        }
        None => {
            let id = add_network(channel, cache).await?;
            debug!("Added network {id} for {ssid}");
            id
        }
    };

    for field in network_fields(ssid, password, options) {
        set_network(channel, cache, id, &field)
            .await
            .map_err(|e| configure_failed(id, format!("set {}", field.name), e))?;
    }

    for step in [command::ENABLE_NETWORK, command::SELECT_NETWORK] {
        channel
            .request(&format!("{step} {id}"), ReplyShape::Line)
            .await
            .map_err(|e| configure_failed(id, step.to_string(), e))?;
    }

    save_config(channel)
        .await
        .map_err(|e| configure_failed(id, command::SAVE_CONFIG.to_string(), e))?;

    list_networks(channel, cache)
        .await?
        .into_iter()
        .find(|record| record.matches_ssid(ssid))
        .ok_or_else(|| WpaError::NetworkNotFound(ssid.to_string()))
}

/// Resolves `ssid` and, when found, issues `<verb> <id>`.
///
/// Returns `false` without touching the daemon when no network matches.
pub(crate) async fn apply_to_ssid(
    channel: &CommandChannel,
    cache: &NetworkCache,
    verb: &str,
    ssid: &str,
) -> Result<bool> {
    let Some(record) = find_by_ssid(channel, cache, ssid).await? else {
        debug!("{verb}: no configured network named {ssid}");
        return Ok(false);
    };
    channel
        .request(&format!("{verb} {}", record.id), ReplyShape::Line)
        .await?;
    cache.invalidate().await;
    Ok(true)
}

fn configure_failed(id: NetworkId, step: String, source: WpaError) -> WpaError {
    if source.is_channel_closed() {
        return source;
    }
    warn!("Configuring network {id} stopped at `{step}`: {source}");
    WpaError::ConfigureFailed {
        id,
        step,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(fields: &[NetworkField]) -> Vec<String> {
        fields.iter().map(NetworkField::render).collect()
    }

    #[test]
    fn psk_network_fields_in_order() {
        let fields = network_fields("MyWifi", Some("secret123"), &NetworkOptions::default());
        assert_eq!(
            rendered(&fields),
            vec![
                "ssid \"MyWifi\"",
                "psk \"secret123\"",
                "key_mgmt WPA-PSK",
                "scan_ssid 1",
            ]
        );
    }

    #[test]
    fn raw_psk_is_not_quoted() {
        let raw = "ab".repeat(32);
        let fields = network_fields("MyWifi", Some(&raw), &NetworkOptions::default());
        assert_eq!(fields[1].render(), format!("psk {raw}"));
    }

    #[test]
    fn open_network_fields() {
        let fields = network_fields("Cafe", None, &NetworkOptions::default());
        assert_eq!(
            rendered(&fields),
            vec!["ssid \"Cafe\"", "key_mgmt NONE", "scan_ssid 1"]
        );
    }

    #[test]
    fn wep_network_fields() {
        let ascii = network_fields("Old", None, &NetworkOptions::wep("abcde", 1));
        assert_eq!(
            rendered(&ascii),
            vec![
                "ssid \"Old\"",
                "key_mgmt NONE",
                "wep_tx_keyidx 1",
                "wep_key1 \"abcde\"",
                "scan_ssid 1",
            ]
        );

        let hex = network_fields("Old", None, &NetworkOptions::wep("0123456789", 0));
        assert_eq!(hex[3].render(), "wep_key0 0123456789");
    }

    #[test]
    fn password_wins_over_wep_options() {
        let fields = network_fields("Net", Some("password"), &NetworkOptions::wep("abcde", 0));
        assert!(fields.iter().all(|f| !f.name.starts_with("wep")));
        assert_eq!(fields[2].render(), "key_mgmt WPA-PSK");
    }

    #[test]
    fn parses_network_table() {
        let reply = "network id / ssid / bssid / flags\n\
                     0\thome\tany\t[CURRENT]\n\
                     1\t\"quoted\"\tany\t\n\
                     2\toffice\t00:11:22:33:44:55\t[DISABLED]";
        let records = parse_network_list(reply);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, NetworkId(0));
        assert_eq!(records[0].ssid, "home");
        assert!(records[0].is_current());
        assert_eq!(records[1].ssid, "\"quoted\"");
        assert_eq!(records[1].flags, "");
        assert_eq!(records[2].bssid, "00:11:22:33:44:55");
    }

    #[test]
    fn skips_malformed_rows() {
        let reply = "network id / ssid / bssid / flags\ngarbage\n3\tlab\tany\t";
        let records = parse_network_list(reply);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, NetworkId(3));
    }

    #[test]
    fn empty_table() {
        assert!(parse_network_list("network id / ssid / bssid / flags").is_empty());
        assert!(parse_network_list("").is_empty());
    }

    #[test]
    fn channel_closure_is_not_wrapped() {
        let err = configure_failed(NetworkId(1), "set ssid".into(), WpaError::ChannelClosed);
        assert!(err.is_channel_closed());

        let err = configure_failed(
            NetworkId(1),
            "set psk".into(),
            WpaError::CommandFailed {
                command: "SET_NETWORK 1 psk <hidden>".into(),
                reply: "FAIL".into(),
            },
        );
        assert!(matches!(err, WpaError::ConfigureFailed { id: NetworkId(1), .. }));
    }
}
