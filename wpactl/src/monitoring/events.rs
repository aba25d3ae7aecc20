//! Publish/subscribe surface for control channel notifications.
//!
//! Notifications travel on separate typed channels instead of one
//! "emit any name" primitive:
//!
//! - `data`: every framed line, verbatim
//! - `control`: every line carrying the event marker, parsed
//! - `events`: control events with a known [`EventKind`]
//! - `commands`: every command written to the daemon (diagnostics)
//!
//! plus a [`ChannelState`] watch that flips to `Closed` exactly once.
//! Closing drops every sender, so existing subscribers observe the end of
//! their stream and nothing is published afterwards.

use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};

use crate::api::models::{ChannelState, ControlEvent, EventKind, WpaEvent};

struct Senders {
    data: broadcast::Sender<String>,
    control: broadcast::Sender<ControlEvent>,
    events: broadcast::Sender<WpaEvent>,
    commands: broadcast::Sender<String>,
}

/// Fan-out hub shared by the reader task, the command channel and the client.
#[derive(Clone)]
pub(crate) struct EventBus {
    senders: Arc<Mutex<Option<Senders>>>,
    state: Arc<watch::Sender<ChannelState>>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let senders = Senders {
            data: broadcast::channel(capacity).0,
            control: broadcast::channel(capacity).0,
            events: broadcast::channel(capacity).0,
            commands: broadcast::channel(capacity).0,
        };
        let (state, _) = watch::channel(ChannelState::Open);
        Self {
            senders: Arc::new(Mutex::new(Some(senders))),
            state: Arc::new(state),
        }
    }

    fn senders(&self) -> MutexGuard<'_, Option<Senders>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes a raw line on the `data` channel.
    pub(crate) fn publish_data(&self, line: &str) {
        if let Some(senders) = self.senders().as_ref() {
            let _ = senders.data.send(line.to_string());
        }
    }

    /// Publishes a control event, plus its semantic notification when the
    /// tag is known.
    pub(crate) fn publish_control(&self, event: ControlEvent) {
        let guard = self.senders();
        let Some(senders) = guard.as_ref() else {
            return;
        };
        if let Some(kind) = event.kind() {
            debug!("Event {kind}: {event}");
            let _ = senders.events.send(WpaEvent {
                kind,
                args: event.args.clone(),
            });
        } else {
            debug!("Unhandled control event: {event}");
        }
        let _ = senders.control.send(event);
    }

    /// Publishes a command that is about to be written.
    pub(crate) fn publish_command(&self, command: &str) {
        if let Some(senders) = self.senders().as_ref() {
            let _ = senders.commands.send(command.to_string());
        }
    }

    /// Marks the channel closed and drops every sender.
    ///
    /// Idempotent: only the first call flips the state.
    pub(crate) fn close(&self) {
        if self.senders().take().is_some() {
            debug!("Event bus closed");
            self.state.send_replace(ChannelState::Closed);
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.state.borrow() == ChannelState::Closed
    }

    pub(crate) fn subscribe_data(&self) -> broadcast::Receiver<String> {
        match self.senders().as_ref() {
            Some(senders) => senders.data.subscribe(),
            None => ended(),
        }
    }

    pub(crate) fn subscribe_control(&self) -> broadcast::Receiver<ControlEvent> {
        match self.senders().as_ref() {
            Some(senders) => senders.control.subscribe(),
            None => ended(),
        }
    }

    pub(crate) fn subscribe_events(&self) -> broadcast::Receiver<WpaEvent> {
        match self.senders().as_ref() {
            Some(senders) => senders.events.subscribe(),
            None => ended(),
        }
    }

    pub(crate) fn subscribe_commands(&self) -> broadcast::Receiver<String> {
        match self.senders().as_ref() {
            Some(senders) => senders.commands.subscribe(),
            None => ended(),
        }
    }

    pub(crate) fn state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }
}

/// A receiver whose sender is already gone: the first `recv` reports
/// `Closed`.
fn ended<T: Clone>() -> broadcast::Receiver<T> {
    broadcast::channel(1).1
}

/// Returns whether the event is one of `kinds`.
pub(crate) fn is_kind(event: &WpaEvent, kinds: &[EventKind]) -> bool {
    kinds.contains(&event.kind)
}
