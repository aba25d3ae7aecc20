//! Serialized command issuance over the single control channel.
//!
//! The interactive channel carries no request ids, so replies are attributed
//! by position: every non-event line belongs to the one command currently
//! awaiting a reply. To keep that sound, commands are admitted strictly one
//! at a time through a fair async mutex (FIFO), and the reply destination is
//! a single-slot mailbox installed before the command is written.
//!
//! A background reader task drives the [`LineFramer`] and the classifier.
//! It publishes every line and event on the [`EventBus`] and forwards reply
//! fragments into the mailbox. When the stream ends, or the channel is
//! closed, the mailbox is sealed: the pending command and every queued one
//! fail with [`WpaError::ChannelClosed`].

use futures::StreamExt;
use log::{debug, warn};
use std::borrow::Cow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::api::models::{ClientConfig, WpaError};
use crate::core::classifier::{Classified, classify};
use crate::core::framer::{Frame, LineFramer};
use crate::monitoring::events::EventBus;
use crate::types::constants::{command as cmd, reply};

/// How the end of a reply is recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyShape {
    /// The first reply line is the whole reply (`OK`, `FAIL`, an id, `PONG`).
    #[default]
    Line,
    /// Lines accumulate until the prompt returns, or the settle window
    /// passes without a new line (`STATUS`, `LIST_NETWORKS`, ...).
    Block,
}

/// A piece of reply routed to the pending command.
#[derive(Debug)]
enum Fragment {
    Line(String),
    Prompt,
}

/// The single-slot mailbox.
#[derive(Default)]
struct PendingSlot {
    sealed: bool,
    reply_tx: Option<mpsc::UnboundedSender<Fragment>>,
    /// Set when a command timed out before its reply ended. Holds whether
    /// any of that reply has been seen.
    stale: Option<bool>,
}

type SharedSlot = Arc<Mutex<PendingSlot>>;

fn lock(slot: &SharedSlot) -> MutexGuard<'_, PendingSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub(crate) struct CommandChannel {
    /// Held for the whole lifetime of one command; acquisition order is FIFO.
    writer: tokio::sync::Mutex<BoxedWriter>,
    pending: SharedSlot,
    bus: EventBus,
    cancel: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
    command_timeout: Duration,
    reply_settle: Duration,
}

impl CommandChannel {
    /// Starts the reader task over `reader` and returns the channel writing
    /// commands to `writer`.
    ///
    /// Must be called within a Tokio runtime.
    pub(crate) fn start<R, W>(reader: R, writer: W, bus: EventBus, config: &ClientConfig) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending = SharedSlot::default();
        let cancel = CancellationToken::new();
        let frames = FramedRead::new(reader, LineFramer);
        let handle = tokio::spawn(read_loop(
            frames,
            pending.clone(),
            bus.clone(),
            cancel.clone(),
        ));

        Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending,
            bus,
            cancel,
            reader: Mutex::new(Some(handle)),
            command_timeout: config.command_timeout,
            reply_settle: config.reply_settle,
        }
    }

    /// Sends a command and waits for its reply.
    ///
    /// Callers are served strictly in submission order. A reply of `FAIL`,
    /// `FAIL-*` or `UNKNOWN COMMAND` is returned as
    /// [`WpaError::CommandFailed`] with the daemon's text verbatim. Command
    /// text containing a line break is refused before anything is written.
    pub(crate) async fn request(&self, command: &str, shape: ReplyShape) -> Result<String> {
        let shown = redact(command);
        if command.contains(['\n', '\r']) {
            return Err(WpaError::InvalidCommand(shown.into_owned()));
        }

        let mut writer = self.writer.lock().await;
        let (mut replies, stale) = self.install()?;
        if let Some(started) = stale {
            self.discard_late_reply(replies, started).await;
            replies = self.install()?.0;
        }

        self.bus.publish_command(&shown);
        debug!("-> {shown}");

        if let Err(e) = write_line(&mut writer, command).await {
            self.clear();
            warn!("Failed to write `{shown}`: {e}");
            return Err(if self.bus.is_closed() {
                WpaError::ChannelClosed
            } else {
                WpaError::Io(e)
            });
        }

        let mut lines = Vec::new();
        let outcome = timeout(
            self.command_timeout,
            collect_into(
                replies,
                &mut lines,
                Some(command),
                shape,
                self.reply_settle,
                false,
            ),
        )
        .await;

        let reply = match outcome {
            Ok(result) => {
                self.clear();
                result?;
                lines.join("\n")
            }
            Err(_) => {
                // The reply may still arrive; it must not reach the next command.
                self.mark_stale(!lines.is_empty());
                warn!(
                    "Command `{shown}` timed out after {:?}",
                    self.command_timeout
                );
                return Err(WpaError::Timeout(shown.into_owned()));
            }
        };
        drop(writer);

        debug!("<- {reply}");
        check_reply(&shown, reply)
    }

    /// Waits for the reply of a timed-out command and throws it away.
    ///
    /// `started` tells whether part of that reply was already consumed. The
    /// wait is bounded by the command timeout, so a daemon that never
    /// answered does not stall the queue for longer than one timeout.
    async fn discard_late_reply(&self, replies: mpsc::UnboundedReceiver<Fragment>, started: bool) {
        let mut lines = Vec::new();
        let outcome = timeout(
            self.command_timeout,
            collect_into(
                replies,
                &mut lines,
                None,
                ReplyShape::Block,
                self.reply_settle,
                started,
            ),
        )
        .await;
        match outcome {
            Ok(Ok(())) => debug!("Discarded late reply: {}", lines.join(" | ")),
            Ok(Err(e)) => debug!("Late reply wait ended: {e}"),
            Err(_) => debug!("No late reply arrived"),
        }
    }

    /// Swallows whatever the subprocess prints before its first prompt.
    ///
    /// `wpa_cli` greets with a version banner and interface selection lines
    /// that must not be attributed to the first command. Absence of a banner
    /// within `wait` is not an error.
    pub(crate) async fn drain_banner(&self, wait: Duration) -> Result<()> {
        let _writer = self.writer.lock().await;
        let (replies, _) = self.install()?;
        let outcome = timeout(
            wait,
            collect_reply(replies, None, ReplyShape::Block, self.reply_settle),
        )
        .await;
        self.clear();

        match outcome {
            Ok(Ok(banner)) => {
                for line in banner.lines() {
                    debug!("wpa_cli: {line}");
                }
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(()),
        }
    }

    /// Stops the reader and fails every pending and queued command.
    pub(crate) async fn close(&self) {
        self.cancel.cancel();
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Control channel reader ended abnormally: {e}");
            }
        }
        seal(&self.pending);
        self.bus.close();
    }

    pub(crate) fn is_closed(&self) -> bool {
        lock(&self.pending).sealed
    }

    /// Installs a fresh mailbox for the command holding the writer lock.
    ///
    /// Also hands over the stale marker left by a timed-out command, if its
    /// reply has not been seen in full yet.
    fn install(&self) -> Result<(mpsc::UnboundedReceiver<Fragment>, Option<bool>)> {
        let mut slot = lock(&self.pending);
        if slot.sealed {
            return Err(WpaError::ChannelClosed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        slot.reply_tx = Some(tx);
        Ok((rx, slot.stale.take()))
    }

    fn clear(&self) {
        lock(&self.pending).reply_tx = None;
    }

    fn mark_stale(&self, started: bool) {
        let mut slot = lock(&self.pending);
        slot.reply_tx = None;
        if !slot.sealed {
            slot.stale = Some(started);
        }
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn write_line(writer: &mut BoxedWriter, command: &str) -> std::io::Result<()> {
    writer.write_all(command.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

fn seal(pending: &SharedSlot) {
    let mut slot = lock(pending);
    slot.sealed = true;
    slot.reply_tx = None;
    slot.stale = None;
}

/// Reader task: frames, classifies, publishes and routes.
async fn read_loop<R>(
    mut frames: FramedRead<R, LineFramer>,
    pending: SharedSlot,
    bus: EventBus,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Control channel closed by caller");
                break;
            }
            frame = frames.next() => frame,
        };

        match frame {
            Some(Ok(Frame::Line(line))) => dispatch_line(line, &pending, &bus),
            Some(Ok(Frame::Prompt)) => route(&pending, Fragment::Prompt),
            Some(Err(e)) => {
                warn!("Control channel read failed: {e}");
                break;
            }
            None => {
                debug!("Control channel reached end of stream");
                break;
            }
        }
    }

    seal(&pending);
    bus.close();
}

fn dispatch_line(line: String, pending: &SharedSlot, bus: &EventBus) {
    bus.publish_data(&line);
    match classify(&line) {
        Classified::Event(event) => bus.publish_control(event),
        Classified::Reply(text) => route(pending, Fragment::Line(text)),
    }
}

fn route(pending: &SharedSlot, fragment: Fragment) {
    let mut slot = lock(pending);
    if let Some(tx) = &slot.reply_tx {
        let _ = tx.send(fragment);
        return;
    }
    match (slot.stale, fragment) {
        (Some(_), Fragment::Line(line)) => {
            debug!("Discarding late reply: {line}");
            slot.stale = Some(true);
        }
        // The prompt after the late reply ends it.
        (Some(true), Fragment::Prompt) => slot.stale = None,
        (None, Fragment::Line(line)) => debug!("Dropping unsolicited reply: {line}"),
        (_, Fragment::Prompt) => {}
    }
}

/// Collects reply fragments until the reply is complete.
///
/// `command` is used to skip a terminal echo of the command itself.
async fn collect_reply(
    replies: mpsc::UnboundedReceiver<Fragment>,
    command: Option<&str>,
    shape: ReplyShape,
    settle: Duration,
) -> Result<String> {
    let mut lines = Vec::new();
    collect_into(replies, &mut lines, command, shape, settle, false).await?;
    Ok(lines.join("\n"))
}

/// Like [`collect_reply`], but keeps the lines in `lines` so a caller that
/// gives up early can see how far the reply got. With `started`, the reply
/// is treated as already under way: the next prompt or a quiet settle
/// window ends it.
async fn collect_into(
    mut replies: mpsc::UnboundedReceiver<Fragment>,
    lines: &mut Vec<String>,
    command: Option<&str>,
    shape: ReplyShape,
    settle: Duration,
    started: bool,
) -> Result<()> {
    loop {
        let begun = started || !lines.is_empty();
        let next = if !begun || shape == ReplyShape::Line {
            replies.recv().await
        } else {
            match timeout(settle, replies.recv()).await {
                Ok(next) => next,
                Err(_) => break,
            }
        };

        match next {
            None => return Err(WpaError::ChannelClosed),
            // A prompt ahead of any output is left over from earlier traffic.
            Some(Fragment::Prompt) if !begun => {}
            Some(Fragment::Prompt) => break,
            Some(Fragment::Line(line)) => {
                if lines.is_empty() && command == Some(line.as_str()) {
                    continue;
                }
                lines.push(line);
                if shape == ReplyShape::Line {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Hides secret values of `SET_NETWORK <id> <field> <value>` so they never
/// reach logs, diagnostics or error messages.
pub(crate) fn redact(command: &str) -> Cow<'_, str> {
    let mut parts = command.splitn(4, ' ');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(verb), Some(id), Some(field), Some(_))
            if verb == cmd::SET_NETWORK && is_secret_field(field) =>
        {
            Cow::Owned(format!("{verb} {id} {field} <hidden>"))
        }
        _ => Cow::Borrowed(command),
    }
}

fn is_secret_field(field: &str) -> bool {
    matches!(field, "psk" | "password" | "sae_password") || field.starts_with("wep_key")
}

/// Maps daemon rejections onto [`WpaError::CommandFailed`].
fn check_reply(command: &str, reply: String) -> Result<String> {
    let rejected = reply == reply::FAIL
        || reply.starts_with(reply::FAIL_PREFIX)
        || reply == reply::UNKNOWN_COMMAND;
    if rejected {
        debug!("Command `{command}` rejected: {reply}");
        return Err(WpaError::CommandFailed {
            command: command.to_string(),
            reply,
        });
    }
    Ok(reply)
}
