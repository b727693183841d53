//! Device naming.

use std::sync::Arc;

use tracing::info;

use crate::handler::{Handler, HandlerError};
use crate::message::{Message, MessageCommand};

/// Names longer than this are clipped before sending.
const MAXIMUM_NAME_LENGTH: usize = 20;

/// Gets and sets the peripheral's display name.
pub struct NameFeature {
    handler: Arc<Handler>,
}

impl NameFeature {
    pub fn new(handler: Arc<Handler>) -> Self {
        Self { handler }
    }

    /// Sets the device name, clipped to twenty characters.
    pub async fn set_name(&self, name: &str) -> Result<(), HandlerError> {
        let clipped: String = name.chars().take(MAXIMUM_NAME_LENGTH).collect();
        info!(name = %clipped, "setting device name");
        let message =
            Message::request_with(MessageCommand::SetName, clipped.into_bytes());
        self.handler.send(message).await.map(|_| ())
    }

    /// Reads the device name back from the peripheral.
    pub async fn get_name(&self) -> Result<String, HandlerError> {
        let reply = self
            .handler
            .send(Message::request(MessageCommand::GetName))
            .await?;
        Ok(reply
            .payload
            .map(|payload| String::from_utf8_lossy(&payload).into_owned())
            .unwrap_or_default())
    }
}
