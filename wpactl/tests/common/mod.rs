//! Scripted stand-in for `wpa_cli` used by the integration tests.
//!
//! The daemon side keeps a small simulated supplicant (network table,
//! status fields, scan table) and answers commands the way the interactive
//! channel does: reply lines followed by the `> ` prompt. Events are written
//! as `\r<level>CTRL-...\n> `.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};
use tokio::sync::mpsc;
use wpactl::{ClientConfig, WpaClient};

#[derive(Debug, Clone)]
pub struct SimNetwork {
    pub id: u32,
    pub ssid: String,
    pub flags: String,
    pub fields: BTreeMap<String, String>,
}

/// Simulated supplicant state.
#[derive(Debug, Default)]
pub struct SimState {
    pub networks: Vec<SimNetwork>,
    pub next_id: u32,
    pub status: Vec<(String, String)>,
    pub scan_table: Vec<String>,
    /// Commands matching the prefix are answered with the reply.
    pub overrides: Vec<(String, String)>,
    /// Commands matching the prefix are never answered.
    pub silent: Vec<String>,
    /// Replies to commands matching the prefix are held back.
    pub delayed: Vec<(String, Duration)>,
    /// Written right before the next reply.
    pub events_before_reply: Vec<String>,
    /// Written after the reply to `SELECT_NETWORK`.
    pub on_select: Vec<String>,
    /// Written after the reply to `SCAN`.
    pub on_scan: Vec<String>,
    pub saves: usize,
}

struct Response {
    delay: Duration,
    lines: Vec<String>,
    before: Vec<String>,
    after: Vec<String>,
}

impl SimState {
    pub fn add(&mut self, ssid: &str, flags: &str) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.networks.push(SimNetwork {
            id,
            ssid: ssid.to_string(),
            flags: flags.to_string(),
            fields: BTreeMap::new(),
        });
        id
    }

    pub fn network(&self, ssid: &str) -> Option<&SimNetwork> {
        self.networks.iter().find(|n| n.ssid == ssid)
    }

    fn respond(&mut self, command: &str) -> Option<Response> {
        if self.silent.iter().any(|prefix| matches(command, prefix)) {
            return None;
        }
        let delay = self
            .delayed
            .iter()
            .find(|(prefix, _)| matches(command, prefix))
            .map(|(_, delay)| *delay)
            .unwrap_or_default();
        let before = std::mem::take(&mut self.events_before_reply);
        let mut after = Vec::new();

        let overridden = self
            .overrides
            .iter()
            .find(|(prefix, _)| matches(command, prefix))
            .map(|(_, reply)| reply.clone());

        let lines = match overridden {
            Some(reply) => vec![reply],
            None => {
                let lines = self.execute(command);
                if command.starts_with("SELECT_NETWORK") {
                    after = self.on_select.clone();
                } else if command == "SCAN" {
                    after = self.on_scan.clone();
                }
                lines
            }
        };

        Some(Response {
            delay,
            lines,
            before,
            after,
        })
    }

    fn execute(&mut self, command: &str) -> Vec<String> {
        let mut words = command.splitn(4, ' ');
        let verb = words.next().unwrap_or_default();
        let id: Option<u32> = words.next().and_then(|id| id.parse().ok());
        let field = words.next();
        let value = words.next();

        let ok = |done: bool| vec![if done { "OK" } else { "FAIL" }.to_string()];

        match verb {
            "PING" => vec!["PONG".into()],
            "STATUS" => self
                .status
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect(),
            "LIST_NETWORKS" => {
                let mut lines = vec!["network id / ssid / bssid / flags".to_string()];
                lines.extend(
                    self.networks
                        .iter()
                        .map(|n| format!("{}\t{}\tany\t{}", n.id, n.ssid, n.flags)),
                );
                lines
            }
            "ADD_NETWORK" => vec![self.add("", "[DISABLED]").to_string()],
            "SET_NETWORK" => {
                let (Some(field), Some(value)) = (field, value) else {
                    return ok(false);
                };
                let Some(network) = self.networks.iter_mut().find(|n| Some(n.id) == id) else {
                    return ok(false);
                };
                if field == "ssid" {
                    network.ssid = value.trim_matches('"').to_string();
                }
                network.fields.insert(field.to_string(), value.to_string());
                ok(true)
            }
            "GET_NETWORK" => self
                .networks
                .iter()
                .find(|n| Some(n.id) == id)
                .and_then(|n| field.and_then(|f| n.fields.get(f)))
                .map(|v| vec![v.clone()])
                .unwrap_or_else(|| ok(false)),
            "ENABLE_NETWORK" | "DISABLE_NETWORK" | "SELECT_NETWORK" => {
                if !self.networks.iter().any(|n| Some(n.id) == id) {
                    return ok(false);
                }
                for network in &mut self.networks {
                    let target = Some(network.id) == id;
                    match verb {
                        "ENABLE_NETWORK" if target => network.flags.clear(),
                        "DISABLE_NETWORK" if target => network.flags = "[DISABLED]".into(),
                        "SELECT_NETWORK" if target => network.flags = "[CURRENT]".into(),
                        "SELECT_NETWORK" => network.flags = "[DISABLED]".into(),
                        _ => {}
                    }
                }
                ok(true)
            }
            "REMOVE_NETWORK" => {
                let before = self.networks.len();
                self.networks.retain(|n| Some(n.id) != id);
                ok(self.networks.len() < before)
            }
            "SAVE_CONFIG" => {
                self.saves += 1;
                ok(true)
            }
            "SCAN" | "DISCONNECT" | "RECONNECT" | "REASSOCIATE" => ok(true),
            "SCAN_RESULTS" => {
                let mut lines = vec!["bssid / frequency / signal level / flags / ssid".to_string()];
                lines.extend(self.scan_table.iter().cloned());
                lines
            }
            _ => vec!["UNKNOWN COMMAND".into()],
        }
    }
}

/// Whole-word prefix match: `SCAN` matches `SCAN` but not `SCAN_RESULTS`.
fn matches(command: &str, prefix: &str) -> bool {
    command == prefix
        || command
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with(' '))
}

type Output = Arc<tokio::sync::Mutex<Option<DuplexStream>>>;

/// Daemon end of a client/daemon pair.
pub struct FakeDaemon {
    state: Arc<Mutex<SimState>>,
    commands: Arc<Mutex<Vec<String>>>,
    max_in_flight: Arc<AtomicUsize>,
    output: Output,
}

pub fn test_config() -> ClientConfig {
    ClientConfig::new()
        .with_command_timeout(Duration::from_secs(2))
        .with_reply_settle(Duration::from_millis(50))
        .with_scan_timeout(Duration::from_secs(2))
        .with_connect_timeout(Duration::from_secs(2))
}

impl FakeDaemon {
    /// Starts a daemon answering immediately and a client connected to it.
    pub fn start(config: ClientConfig) -> (Self, WpaClient) {
        Self::start_with_delay(config, Duration::ZERO)
    }

    /// Like [`FakeDaemon::start`], but every reply is held back by `delay`.
    pub fn start_with_delay(config: ClientConfig, delay: Duration) -> (Self, WpaClient) {
        let (client_writer, daemon_reader) = duplex(64 * 1024);
        let (daemon_writer, client_reader) = duplex(64 * 1024);

        let daemon = Self {
            state: Arc::new(Mutex::new(SimState::default())),
            commands: Arc::new(Mutex::new(Vec::new())),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            output: Arc::new(tokio::sync::Mutex::new(Some(daemon_writer))),
        };

        let received = Arc::new(AtomicUsize::new(0));
        let answered = Arc::new(AtomicUsize::new(0));
        let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<String>();

        {
            let commands = daemon.commands.clone();
            let max_in_flight = daemon.max_in_flight.clone();
            let received = received.clone();
            let answered = answered.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(daemon_reader).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let total = received.fetch_add(1, Ordering::SeqCst) + 1;
                    let in_flight = total - answered.load(Ordering::SeqCst);
                    max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
                    commands.lock().unwrap().push(line.clone());
                    if queue_tx.send(line).is_err() {
                        break;
                    }
                }
            });
        }

        {
            let state = daemon.state.clone();
            let output = daemon.output.clone();
            tokio::spawn(async move {
                while let Some(command) = queue_rx.recv().await {
                    let response = state.lock().unwrap().respond(&command);
                    let Some(response) = response else {
                        answered.fetch_add(1, Ordering::SeqCst);
                        continue;
                    };
                    let pause = delay.max(response.delay);
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                    for event in &response.before {
                        write(&output, &format!("\r{event}\n")).await;
                    }
                    answered.fetch_add(1, Ordering::SeqCst);
                    write(&output, &format!("{}\n> ", response.lines.join("\n"))).await;
                    for event in &response.after {
                        write(&output, &format!("\r{event}\n> ")).await;
                    }
                }
            });
        }

        let client = WpaClient::from_io("wlan0", client_reader, client_writer, config);
        (daemon, client)
    }

    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap()
    }

    /// Commands received so far, in arrival order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().unwrap().clear();
    }

    /// Largest number of commands seen outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Writes an unsolicited event line.
    pub async fn emit(&self, line: &str) {
        write(&self.output, &format!("\r{line}\n> ")).await;
    }

    /// Writes raw bytes to the client.
    pub async fn emit_raw(&self, raw: &str) {
        write(&self.output, raw).await;
    }

    /// Closes the daemon's output, as if `wpa_cli` exited.
    pub async fn hang_up(&self) {
        self.output.lock().await.take();
    }
}

async fn write(output: &Output, text: &str) {
    if let Some(stream) = output.lock().await.as_mut() {
        let _ = stream.write_all(text.as_bytes()).await;
        let _ = stream.flush().await;
    }
}

/// Polls `check` until it holds or one second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
