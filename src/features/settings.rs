//! Small settings commands: auto-lock, owner registration, factory reset.

use std::sync::Arc;

use tracing::info;

use crate::handler::{Handler, HandlerError};
use crate::message::{Message, MessageCommand};

/// Controls how long the lock waits before relocking itself.
pub struct AutoLockFeature {
    handler: Arc<Handler>,
}

impl AutoLockFeature {
    pub fn new(handler: Arc<Handler>) -> Self {
        Self { handler }
    }

    /// Sets the auto-lock delay in seconds; `None` disables auto-lock.
    pub async fn set_auto_lock(&self, seconds: Option<u8>) -> Result<(), HandlerError> {
        info!(?seconds, "setting auto lock");
        let message = Message {
            payload: seconds.map(|value| vec![value]),
            ..Message::request(MessageCommand::SetAutoLock)
        };
        self.handler.send(message).await.map(|_| ())
    }

    /// Reads the configured auto-lock delay; `None` means disabled.
    pub async fn auto_lock(&self) -> Result<Option<u8>, HandlerError> {
        let reply = self
            .handler
            .send(Message::request(MessageCommand::GetAutoLock))
            .await?;
        Ok(reply.payload.and_then(|payload| payload.first().copied()))
    }
}

/// Registers the owning user with the device.
pub struct SetUserFeature {
    handler: Arc<Handler>,
}

impl SetUserFeature {
    pub fn new(handler: Arc<Handler>) -> Self {
        Self { handler }
    }

    /// Registers a user identifier as the device owner.
    pub async fn register(&self, user: &str) -> Result<(), HandlerError> {
        info!(%user, "registering device owner");
        let message =
            Message::request_with(MessageCommand::SetUserId, user.as_bytes().to_vec());
        self.handler.send(message).await.map(|_| ())
    }
}

/// Factory-resets the device.
pub struct ResetFeature {
    handler: Arc<Handler>,
}

impl ResetFeature {
    pub fn new(handler: Arc<Handler>) -> Self {
        Self { handler }
    }

    pub async fn reset(&self) -> Result<(), HandlerError> {
        info!("resetting device");
        self.handler
            .send(Message::request(MessageCommand::Reset))
            .await
            .map(|_| ())
    }
}
