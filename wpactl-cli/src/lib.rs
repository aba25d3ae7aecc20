pub mod file_lock;

use anyhow::{Context, Result, bail};
use clap::{Args as CredentialArgs, Parser, Subcommand};
use log::debug;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use wpactl::{
    ClientConfig, InterfaceControl, IpLink, NetworkOptions, NetworkRecord, WpaClient,
    bars_from_strength,
};

use crate::file_lock::acquire_interface_lock;

#[derive(Parser, Debug)]
#[command(name = "wpactl")]
#[command(version, about = "Drive wpa_supplicant through its control channel")]
struct Args {
    /// Wireless interface to manage.
    #[arg(short, long, default_value = "wlan0")]
    interface: String,

    /// Path to the wpa_cli binary.
    #[arg(long, value_name = "PATH")]
    cli_path: Option<PathBuf>,

    /// Directory holding the daemon's control sockets.
    #[arg(long, value_name = "DIR")]
    ctrl_path: Option<PathBuf>,

    /// Per-command reply timeout.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Log wire traffic and state transitions.
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the daemon's status fields.
    Status,
    /// Print the inferred operating mode.
    Mode,
    /// List configured networks.
    List,
    /// Add or update a network, enable and select it, and save.
    Add(Credentials),
    /// Like `add`, then wait until the interface associates.
    Connect(Credentials),
    /// Remove a configured network.
    Remove { ssid: String },
    /// Enable a configured network.
    Enable { ssid: String },
    /// Disable a configured network.
    Disable { ssid: String },
    /// Select a network, disabling all others.
    Select { ssid: String },
    /// Scan and list nearby access points.
    Scan,
    /// Save the configuration.
    Save,
    /// Send a raw command and print the reply.
    Send {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        raw: Vec<String>,
    },
    /// Print control events until interrupted.
    Monitor,
    /// Bring the interface up.
    Up,
    /// Bring the interface down.
    Down,
}

#[derive(CredentialArgs, Debug)]
struct Credentials {
    ssid: String,

    /// WPA passphrase (8-63 characters) or 64 hex digit PSK.
    #[arg(short, long)]
    password: Option<String>,

    /// WEP key for networks without a WPA passphrase.
    #[arg(long, conflicts_with = "password")]
    wep: Option<String>,

    /// WEP key slot (0-3).
    #[arg(long, default_value_t = 0, requires = "wep")]
    wep_index: u8,
}

impl Credentials {
    fn options(&self) -> NetworkOptions {
        match &self.wep {
            Some(key) => NetworkOptions::wep(key.clone(), self.wep_index),
            None => NetworkOptions::default(),
        }
    }
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        if let Some(path) = &self.cli_path {
            config = config.with_cli_path(path);
        }
        if let Some(path) = &self.ctrl_path {
            config = config.with_ctrl_path(path);
        }
        if let Some(secs) = self.timeout {
            config = config.with_command_timeout(Duration::from_secs(secs));
        }
        config
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime.block_on(execute(args))
}

async fn execute(args: Args) -> Result<()> {
    let interface = args.interface.clone();
    let config = args.client_config();

    let command = match args.command {
        Command::Up => return set_link(&interface, true).await,
        Command::Down => return set_link(&interface, false).await,
        command => command,
    };

    let _lock = acquire_interface_lock(&interface)?;
    let client = WpaClient::open_with_config(&interface, config)
        .await
        .with_context(|| format!("Failed to open the control channel for {interface}"))?;

    let outcome = dispatch(&client, command).await;
    client.close().await;
    outcome
}

async fn set_link(interface: &str, up: bool) -> Result<()> {
    let link = IpLink::new();
    let result = if up {
        link.set_up(interface).await
    } else {
        link.set_down(interface).await
    };
    let state = if up { "up" } else { "down" };
    result.with_context(|| format!("Failed to bring {interface} {state}"))
}

async fn dispatch(client: &WpaClient, command: Command) -> Result<()> {
    match command {
        Command::Status => {
            for (key, value) in client.status().await?.fields {
                println!("{key}={value}");
            }
        }
        Command::Mode => {
            let mode = client.mode().await?;
            match mode.as_str() {
                "" => println!("idle"),
                mode => println!("{mode}"),
            }
        }
        Command::List => print_networks(&client.list_networks().await?),
        Command::Add(credentials) => {
            let record = client
                .add_or_update_network_with(
                    &credentials.ssid,
                    credentials.password.as_deref(),
                    &credentials.options(),
                )
                .await?;
            println!("Configured {} as network {}", record.ssid, record.id);
        }
        Command::Connect(credentials) => {
            let record = client
                .connect(
                    &credentials.ssid,
                    credentials.password.as_deref(),
                    &credentials.options(),
                )
                .await?;
            println!("Connected to {} (network {})", record.ssid, record.id);
        }
        Command::Remove { ssid } => require(client.remove_network(&ssid).await?, &ssid)?,
        Command::Enable { ssid } => require(client.enable_network(&ssid).await?, &ssid)?,
        Command::Disable { ssid } => require(client.disable_network(&ssid).await?, &ssid)?,
        Command::Select { ssid } => require(client.select_network(&ssid).await?, &ssid)?,
        Command::Scan => {
            println!(
                "{:<17}  {:>4}  {:>3}  {:<4}  {:<8}  SSID",
                "BSSID", "FREQ", "CH", "SIG", "SECURITY"
            );
            for ap in client.scan().await? {
                println!(
                    "{:<17}  {:>4}  {:>3}  {}  {:<8}  {}",
                    ap.bssid,
                    ap.frequency,
                    ap.channel().map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                    bars_from_strength(ap.strength()),
                    ap.security().to_string(),
                    ap.ssid
                );
            }
        }
        Command::Save => client.save_config().await?,
        Command::Send { raw } => println!("{}", client.send(&raw.join(" ")).await?),
        Command::Monitor => monitor(client).await?,
        Command::Up => set_link(client.interface(), true).await?,
        Command::Down => set_link(client.interface(), false).await?,
    }
    Ok(())
}

fn require(found: bool, ssid: &str) -> Result<()> {
    if !found {
        bail!("No configured network named {ssid}");
    }
    Ok(())
}

fn print_networks(networks: &[NetworkRecord]) {
    println!("{:<4}  {:<32}  {:<17}  FLAGS", "ID", "SSID", "BSSID");
    for network in networks {
        println!(
            "{:<4}  {:<32}  {:<17}  {}",
            network.id.to_string(),
            network.ssid,
            network.bssid,
            network.flags
        );
    }
}

async fn monitor(client: &WpaClient) -> Result<()> {
    let mut events = client.subscribe_control();
    println!("Monitoring {} (Ctrl-C to stop)", client.interface());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(event) => println!("<{}>{event}", event.level),
                Err(RecvError::Lagged(missed)) => eprintln!("({missed} events dropped)"),
                Err(RecvError::Closed) => bail!("Control channel closed"),
            },
        }
    }
}
