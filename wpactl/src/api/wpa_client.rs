use async_trait::async_trait;
use log::debug;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::sync::{Mutex, broadcast, watch};

use crate::Result;
use crate::api::collaborators::ScanSource;
use crate::api::models::{
    AccessPoint, ChannelState, ClientConfig, ControlEvent, Mode, NetworkId, NetworkOptions,
    NetworkRecord, Status, WpaError, WpaEvent,
};
use crate::core::channel::{CommandChannel, ReplyShape};
use crate::core::networks::{self, NetworkCache, NetworkField};
use crate::core::process::{self, CliProcess};
use crate::core::scan;
use crate::core::status;
use crate::monitoring::events::EventBus;
use crate::monitoring::state_wait::wait_for_connection;
use crate::types::constants::{command, reply};

/// Client for one interface's `wpa_supplicant` control channel.
///
/// Owns a `wpa_cli` subprocess in interactive mode and multiplexes its single
/// text stream into command replies and asynchronous control events.
///
/// # Opening a channel
///
/// ```no_run
/// use wpactl::WpaClient;
///
/// # async fn example() -> wpactl::Result<()> {
/// let client = WpaClient::open("wlan0").await?;
/// println!("mode: {:?}", client.mode().await?.as_str());
/// client.close().await;
/// # Ok(())
/// # }
/// ```
///
/// # Configuring a network
///
/// ```no_run
/// use wpactl::WpaClient;
///
/// # async fn example() -> wpactl::Result<()> {
/// let client = WpaClient::open("wlan0").await?;
///
/// let record = client.add_or_update_network("MyWifi", Some("secret123")).await?;
/// println!("configured as network {}", record.id);
///
/// if !client.disable_network("OldWifi").await? {
///     println!("OldWifi was not configured");
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Events
///
/// ```no_run
/// use wpactl::{EventKind, WpaClient};
///
/// # async fn example() -> wpactl::Result<()> {
/// let client = WpaClient::open("wlan0").await?;
/// let mut events = client.subscribe_events();
///
/// while let Ok(event) = events.recv().await {
///     if event.kind == EventKind::Disconnected {
///         println!("lost link: {:?}", event.args.get("reason"));
///     }
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Ordering
///
/// Commands are served strictly one at a time, in the order they were
/// issued, because the channel has no request identifiers. Every clone
/// shares the same channel, so this holds across tasks.
#[derive(Clone)]
pub struct WpaClient {
    inner: Arc<Inner>,
}

struct Inner {
    interface: String,
    config: ClientConfig,
    channel: CommandChannel,
    bus: EventBus,
    networks: NetworkCache,
    child: Mutex<Option<Child>>,
}

impl Debug for WpaClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WpaClient")
            .field("interface", &self.inner.interface)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl WpaClient {
    /// Opens the control channel for `interface` with default settings.
    pub async fn open(interface: &str) -> Result<Self> {
        Self::open_with_config(interface, ClientConfig::default()).await
    }

    /// Spawns `wpa_cli` for `interface` and waits out its startup banner.
    ///
    /// If startup fails after the subprocess was spawned, the subprocess is
    /// terminated before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`WpaError::SpawnFailed`] if `wpa_cli` cannot be started.
    pub async fn open_with_config(interface: &str, config: ClientConfig) -> Result<Self> {
        let CliProcess {
            child,
            stdin,
            stdout,
        } = process::spawn(interface, &config)?;

        let client = Self::assemble(interface, stdout, stdin, config, Some(child));
        let startup = client.inner.config.startup_timeout;
        if let Err(e) = client.inner.channel.drain_banner(startup).await {
            client.close().await;
            return Err(e);
        }

        debug!("Control channel open on {interface}");
        Ok(client)
    }

    /// Builds a client over an already connected transport.
    ///
    /// `reader` yields the daemon's output and `writer` receives commands.
    /// No banner is expected. Must be called within a Tokio runtime.
    pub fn from_io<R, W>(interface: &str, reader: R, writer: W, config: ClientConfig) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::assemble(interface, reader, writer, config, None)
    }

    fn assemble<R, W>(
        interface: &str,
        reader: R,
        writer: W,
        config: ClientConfig,
        child: Option<Child>,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let bus = EventBus::new(config.event_capacity);
        let channel = CommandChannel::start(reader, writer, bus.clone(), &config);
        Self {
            inner: Arc::new(Inner {
                interface: interface.to_string(),
                config,
                channel,
                bus,
                networks: NetworkCache::default(),
                child: Mutex::new(child),
            }),
        }
    }

    /// Closes the channel.
    ///
    /// The pending command and every queued one fail with
    /// [`WpaError::ChannelClosed`], subscribers see their streams end, the
    /// state watch flips to [`ChannelState::Closed`] and the subprocess is
    /// terminated. Calling it again has no effect.
    pub async fn close(&self) {
        self.inner.channel.close().await;
        if let Some(mut child) = self.inner.child.lock().await.take() {
            process::terminate(&mut child).await;
        }
    }

    /// Returns whether the channel has closed, by request or because the
    /// subprocess went away.
    pub fn is_closed(&self) -> bool {
        self.inner.channel.is_closed()
    }

    /// Name of the managed interface.
    pub fn interface(&self) -> &str {
        &self.inner.interface
    }

    /// Sends a raw command and returns the first reply line.
    ///
    /// `FAIL`, `FAIL-*` and `UNKNOWN COMMAND` replies are returned as
    /// [`WpaError::CommandFailed`].
    pub async fn send(&self, command: &str) -> Result<String> {
        self.request(command, ReplyShape::Line).await
    }

    /// Sends a raw command with an explicit reply shape.
    ///
    /// Use [`ReplyShape::Block`] for commands answering with several lines.
    pub async fn request(&self, command: &str, shape: ReplyShape) -> Result<String> {
        self.inner.channel.request(command, shape).await
    }

    /// Checks that the daemon answers.
    pub async fn ping(&self) -> Result<()> {
        let answer = self.send(command::PING).await?;
        if answer == reply::PONG {
            Ok(())
        } else {
            Err(WpaError::UnexpectedReply {
                command: command::PING.to_string(),
                reply: answer,
            })
        }
    }

    pub async fn status(&self) -> Result<Status> {
        status::status(&self.inner.channel).await
    }

    /// Queries the status and infers the operating mode from it.
    pub async fn mode(&self) -> Result<Mode> {
        Ok(self.status().await?.mode())
    }

    /// SSID of the current association, or `None` when not associated or
    /// when the status could not be read.
    pub async fn current_ssid(&self) -> Option<String> {
        status::current_ssid(&self.inner.channel).await
    }

    /// Lists configured networks and refreshes the network cache.
    pub async fn list_networks(&self) -> Result<Vec<NetworkRecord>> {
        networks::list_networks(&self.inner.channel, &self.inner.networks).await
    }

    /// Creates an empty, disabled network and returns its id.
    pub async fn add_network(&self) -> Result<NetworkId> {
        networks::add_network(&self.inner.channel, &self.inner.networks).await
    }

    /// Finds a configured network by exact SSID.
    ///
    /// Served from the network cache when it is populated; call
    /// [`list_networks`](Self::list_networks) first to see changes made by
    /// other clients.
    pub async fn find_by_ssid(&self, ssid: &str) -> Result<Option<NetworkRecord>> {
        networks::find_by_ssid(&self.inner.channel, &self.inner.networks, ssid).await
    }

    /// Sets a network field to `value`, sent as-is.
    ///
    /// String fields such as `ssid` must be passed with their double quotes.
    pub async fn set_network(&self, id: NetworkId, name: &str, value: &str) -> Result<()> {
        let field = NetworkField::literal(name, value);
        networks::set_network(&self.inner.channel, &self.inner.networks, id, &field).await
    }

    /// Reads a network field verbatim.
    pub async fn get_network(&self, id: NetworkId, name: &str) -> Result<String> {
        networks::get_network(&self.inner.channel, id, name).await
    }

    /// Configures `ssid` as a WPA-PSK network (or an open one without a
    /// password), enables and selects it and saves the configuration.
    ///
    /// An existing network with the same SSID is updated in place.
    ///
    /// # Errors
    ///
    /// - [`WpaError::InvalidSsid`] / [`WpaError::InvalidPassword`] before
    ///   anything is sent
    /// - [`WpaError::ConfigureFailed`] naming the step that was rejected;
    ///   earlier steps are not rolled back
    /// - [`WpaError::NetworkNotFound`] if the network is missing from the
    ///   refreshed list
    pub async fn add_or_update_network(
        &self,
        ssid: &str,
        password: Option<&str>,
    ) -> Result<NetworkRecord> {
        self.add_or_update_network_with(ssid, password, &NetworkOptions::default())
            .await
    }

    /// Like [`add_or_update_network`](Self::add_or_update_network), with
    /// options for networks without a password (e.g. a WEP key).
    pub async fn add_or_update_network_with(
        &self,
        ssid: &str,
        password: Option<&str>,
        options: &NetworkOptions,
    ) -> Result<NetworkRecord> {
        networks::add_or_update_network(
            &self.inner.channel,
            &self.inner.networks,
            ssid,
            password,
            options,
        )
        .await
    }

    /// Configures the network like
    /// [`add_or_update_network_with`](Self::add_or_update_network_with) and
    /// waits until the supplicant associates with it.
    ///
    /// # Errors
    ///
    /// Returns [`WpaError::AuthFailed`] when the daemon rejects the key,
    /// [`WpaError::EventTimeout`] when no association happens within the
    /// connect timeout, and the configuration errors described above.
    pub async fn connect(
        &self,
        ssid: &str,
        password: Option<&str>,
        options: &NetworkOptions,
    ) -> Result<NetworkRecord> {
        let mut events = self.inner.bus.subscribe_events();
        let record = self
            .add_or_update_network_with(ssid, password, options)
            .await?;
        wait_for_connection(&mut events, ssid, self.inner.config.connect_timeout).await?;
        Ok(record)
    }

    /// Removes the network named `ssid`. Returns `false` if none exists.
    pub async fn remove_network(&self, ssid: &str) -> Result<bool> {
        self.apply_to_ssid(command::REMOVE_NETWORK, ssid).await
    }

    /// Enables the network named `ssid`. Returns `false` if none exists.
    pub async fn enable_network(&self, ssid: &str) -> Result<bool> {
        self.apply_to_ssid(command::ENABLE_NETWORK, ssid).await
    }

    /// Disables the network named `ssid`. Returns `false` if none exists.
    pub async fn disable_network(&self, ssid: &str) -> Result<bool> {
        self.apply_to_ssid(command::DISABLE_NETWORK, ssid).await
    }

    /// Selects the network named `ssid`, disabling all others. Returns
    /// `false` if none exists.
    pub async fn select_network(&self, ssid: &str) -> Result<bool> {
        self.apply_to_ssid(command::SELECT_NETWORK, ssid).await
    }

    async fn apply_to_ssid(&self, verb: &str, ssid: &str) -> Result<bool> {
        networks::apply_to_ssid(&self.inner.channel, &self.inner.networks, verb, ssid).await
    }

    /// Persists the configuration to the daemon's config file.
    ///
    /// Fails with [`WpaError::CommandFailed`] when the daemon does not allow
    /// configuration updates.
    pub async fn save_config(&self) -> Result<()> {
        networks::save_config(&self.inner.channel).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.expect_ok(command::DISCONNECT).await
    }

    pub async fn reconnect(&self) -> Result<()> {
        self.expect_ok(command::RECONNECT).await
    }

    pub async fn reassociate(&self) -> Result<()> {
        self.expect_ok(command::REASSOCIATE).await
    }

    async fn expect_ok(&self, verb: &str) -> Result<()> {
        let answer = self.send(verb).await?;
        if answer == reply::OK {
            Ok(())
        } else {
            Err(WpaError::UnexpectedReply {
                command: verb.to_string(),
                reply: answer,
            })
        }
    }

    /// Requests a scan and returns the results once it completes.
    pub async fn scan(&self) -> Result<Vec<AccessPoint>> {
        scan::scan(
            &self.inner.channel,
            &self.inner.bus,
            self.inner.config.scan_timeout,
        )
        .await
    }

    /// Returns the results of the latest scan without starting a new one.
    pub async fn scan_results(&self) -> Result<Vec<AccessPoint>> {
        scan::scan_results(&self.inner.channel).await
    }

    /// Every line read from the channel, verbatim.
    pub fn subscribe_raw(&self) -> broadcast::Receiver<String> {
        self.inner.bus.subscribe_data()
    }

    /// Every control event, including tags without a known kind.
    pub fn subscribe_control(&self) -> broadcast::Receiver<ControlEvent> {
        self.inner.bus.subscribe_control()
    }

    /// Control events with a known [`EventKind`](crate::EventKind).
    pub fn subscribe_events(&self) -> broadcast::Receiver<WpaEvent> {
        self.inner.bus.subscribe_events()
    }

    /// Every command written to the daemon, with secrets hidden.
    pub fn subscribe_commands(&self) -> broadcast::Receiver<String> {
        self.inner.bus.subscribe_commands()
    }

    /// Channel state; flips to [`ChannelState::Closed`] exactly once.
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.inner.bus.state()
    }
}

#[async_trait]
impl ScanSource for WpaClient {
    async fn scan(&self) -> Result<Vec<AccessPoint>> {
        WpaClient::scan(self).await
    }
}
