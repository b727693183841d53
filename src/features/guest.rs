//! Guest access via one-time passwords.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use super::UNIT_SEPARATOR;
use crate::handler::{Handler, HandlerError};
use crate::message::{Message, MessageCommand};

/// Failures from the guest feature.
#[derive(Debug, Error)]
pub enum GuestError {
    /// The peripheral rejected the one-time password.
    #[error("one-time password was rejected")]
    OtpFailed,
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Lets a guest drive the lock with a one-time password.
pub struct GuestFeature {
    handler: Arc<Handler>,
}

impl GuestFeature {
    pub fn new(handler: Arc<Handler>) -> Self {
        Self { handler }
    }

    /// Locks or unlocks using a one-time password and its identifier.
    ///
    /// The payload is the desired state byte followed by
    /// `otp <US> otp_id`.
    pub async fn unlock(&self, unlock: bool, otp: &str, otp_id: &str) -> Result<(), GuestError> {
        let mut payload = Vec::with_capacity(1 + otp.len() + 1 + otp_id.len());
        payload.push(u8::from(unlock));
        payload.extend_from_slice(otp.as_bytes());
        payload.push(UNIT_SEPARATOR);
        payload.extend_from_slice(otp_id.as_bytes());

        info!("guest unlocking device");
        let message = Message::request_with(MessageCommand::GuestUnlock, payload);
        let reply = self.handler.send(message).await?;

        if reply.payload.as_deref() == Some(&[0x00]) {
            return Err(GuestError::OtpFailed);
        }
        Ok(())
    }
}
