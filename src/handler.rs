//! Request/reply multiplexer over a byte transport.
//!
//! One dispatch task consumes the transport's inbound notification stream for
//! the lifetime of the connection; any number of callers may suspend inside
//! [`Handler::send`] at once, each waiting only on its own pending call.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::message::{Message, MessageCommand, MessageType};
use crate::transport::Transport;

/// How long a call waits for its reply unless configured otherwise.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors surfaced to a single `send` caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// The codec could not produce a valid frame for the message.
    #[error("message cannot be framed for transport")]
    InvalidTransportableData,
    /// A message matched the call's command but was not a reply.
    #[error("received message is not a reply")]
    InvalidMessageType,
    /// No matching reply arrived within the configured duration.
    #[error("timed out waiting for reply")]
    Timeout,
    /// The handler went away while the call was suspended.
    #[error("handler closed before the call resolved")]
    ChannelClosed,
}

/// A call that has been transmitted and is waiting for its reply.
struct PendingCall {
    command: MessageCommand,
    slot: oneshot::Sender<Result<Message, HandlerError>>,
}

struct HandlerState {
    /// Pending calls keyed by a monotonically increasing call id. The wire
    /// format carries no correlation field, so an inbound message resolves
    /// the oldest pending call for its command.
    pending: BTreeMap<u64, PendingCall>,
    next_call_id: u64,
    /// The single standing notification subscription, if any.
    listener: Option<(MessageCommand, mpsc::Sender<Message>)>,
}

/// Bridges the asynchronous notify stream to call/response and
/// push-notification semantics.
pub struct Handler {
    transport: Arc<dyn Transport>,
    request_channel: String,
    reply_timeout: Duration,
    state: Arc<Mutex<HandlerState>>,
    dispatch: Option<JoinHandle<()>>,
}

impl Handler {
    /// Creates a handler over a connected transport and starts the dispatch
    /// task consuming the transport's inbound stream.
    pub fn new(transport: Arc<dyn Transport>, request_channel: String) -> Self {
        Self::with_timeout(transport, request_channel, DEFAULT_REPLY_TIMEOUT)
    }

    /// Same as [`Handler::new`] with an explicit per-call reply timeout.
    pub fn with_timeout(
        transport: Arc<dyn Transport>,
        request_channel: String,
        reply_timeout: Duration,
    ) -> Self {
        let state = Arc::new(Mutex::new(HandlerState {
            pending: BTreeMap::new(),
            next_call_id: 0,
            listener: None,
        }));
        let dispatch = match transport.take_updates() {
            Some(updates) => Some(spawn_dispatch(Arc::clone(&state), updates)),
            None => {
                warn!("transport update stream already taken; replies will never resolve");
                None
            }
        };
        Self {
            transport,
            request_channel,
            reply_timeout,
            state,
            dispatch,
        }
    }

    /// Sends a request and suspends until its reply, a timeout, or loss of
    /// the handler.
    ///
    /// # Errors
    /// * [`HandlerError::InvalidTransportableData`] when the message cannot
    ///   be framed.
    /// * [`HandlerError::InvalidMessageType`] when the matched message is not
    ///   a reply.
    /// * [`HandlerError::Timeout`] when no matching message arrives in time;
    ///   the pending entry is removed so a late reply is dropped rather than
    ///   misapplied.
    pub async fn send(&self, message: Message) -> Result<Message, HandlerError> {
        let frame = message.pack().ok_or_else(|| {
            warn!(command = ?message.command, "attempted to send unframeable message");
            HandlerError::InvalidTransportableData
        })?;

        let (tx, rx) = oneshot::channel();
        let call_id = {
            let mut state = self.state.lock();
            let call_id = state.next_call_id;
            state.next_call_id += 1;
            state.pending.insert(
                call_id,
                PendingCall {
                    command: message.command,
                    slot: tx,
                },
            );
            call_id
        };

        debug!(command = ?message.command, call_id, "sending request");
        self.transport.send(&frame, &self.request_channel);
        self.start_timeout(call_id);

        rx.await.unwrap_or(Err(HandlerError::ChannelClosed))
    }

    /// Opens a standing subscription for notifications matching `command`.
    ///
    /// At most one subscription exists per handler; a new call replaces the
    /// previous one. The subscription is independent of the request/reply
    /// path and never resolves a pending call. When the receiver falls
    /// behind, further notifications are dropped rather than delaying reply
    /// dispatch.
    pub fn listen(&self, command: MessageCommand) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(16);
        self.state.lock().listener = Some((command, tx));
        rx
    }

    /// Closes the standing subscription, if any.
    pub fn stop_listening(&self) {
        self.state.lock().listener = None;
    }

    fn start_timeout(&self, call_id: u64) {
        let state = Arc::clone(&self.state);
        let reply_timeout = self.reply_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(reply_timeout).await;
            // Removing the entry atomically with resolution guarantees the
            // slot fires exactly once even if the reply races the timer.
            if let Some(call) = state.lock().pending.remove(&call_id) {
                warn!(command = ?call.command, call_id, "reply timed out");
                let _ = call.slot.send(Err(HandlerError::Timeout));
            }
        });
    }
}

impl Drop for Handler {
    fn drop(&mut self) {
        if let Some(dispatch) = self.dispatch.take() {
            dispatch.abort();
        }
    }
}

fn spawn_dispatch(
    state: Arc<Mutex<HandlerState>>,
    mut updates: mpsc::Receiver<Option<Vec<u8>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            let Some(data) = update else {
                warn!("transport delivered an empty value update");
                continue;
            };
            // Malformed frames cannot be attributed to any pending call, so
            // they are dropped with a diagnostic and nothing else happens.
            let Some(message) = Message::unpack(&data) else {
                warn!(bytes = data.len(), "dropping undecodable inbound frame");
                continue;
            };
            dispatch(&state, message);
        }
        debug!("transport update stream ended");
    })
}

fn dispatch(state: &Mutex<HandlerState>, message: Message) {
    let mut forward = None;
    {
        let mut state = state.lock();
        // Resolve the oldest pending call for this command, if one exists.
        let matched = state
            .pending
            .iter()
            .find(|(_, call)| call.command == message.command)
            .map(|(id, _)| *id);
        match matched {
            Some(call_id) => {
                if let Some(call) = state.pending.remove(&call_id) {
                    let result = if message.message_type == MessageType::Reply {
                        Ok(message.clone())
                    } else {
                        warn!(command = ?message.command, "matched message is not a reply");
                        Err(HandlerError::InvalidMessageType)
                    };
                    let _ = call.slot.send(result);
                }
            }
            None if message.message_type != MessageType::Notification => {
                debug!(command = ?message.command, "dropping reply with no outstanding call");
            }
            None => {}
        }
        // Independently of the call path, notifications feed the standing
        // subscription when the command matches.
        if message.message_type == MessageType::Notification {
            if let Some((command, sender)) = &state.listener {
                if *command == message.command {
                    forward = Some(sender.clone());
                }
            }
        }
    }
    if let Some(sender) = forward {
        // A subscriber that stops draining must never park the dispatch
        // task; the newest notification is dropped instead.
        let command = message.command;
        if sender.try_send(message).is_err() {
            warn!(command = ?command, "subscription buffer full, dropping notification");
        }
    }
}
