//! Lock state queries and the encrypted lock/unlock command.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::crypto::{self, CryptoError};
use crate::handler::{Handler, HandlerError};
use crate::message::{Message, MessageCommand};
use crate::secret::SecretStore;

/// Reply payload byte the peripheral sends on success.
const ACCEPTED: &[u8] = &[0x01];

/// Failures from the lock feature.
#[derive(Debug, Error)]
pub enum LockError {
    /// No symmetric key in the secret store; run the key exchange first.
    #[error("missing symmetric key")]
    MissingKey,
    /// No device password in the secret store; provision one first.
    #[error("missing device password")]
    MissingPassword,
    /// The peripheral did not accept the sealed password.
    #[error("device rejected the password")]
    DeviceRejectedPassword,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Whether the lock is engaged.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked = 0x00,
    Unlocked = 0x01,
}

impl LockState {
    fn from_payload(payload: Option<&[u8]>) -> Self {
        if payload == Some(&[0x01]) {
            LockState::Unlocked
        } else {
            LockState::Locked
        }
    }
}

/// Reads and drives the physical lock.
pub struct LockFeature {
    handler: Arc<Handler>,
}

impl LockFeature {
    pub fn new(handler: Arc<Handler>) -> Self {
        Self { handler }
    }

    /// Asks the peripheral for the current lock state.
    pub async fn lock_state(&self) -> Result<LockState, LockError> {
        let reply = self
            .handler
            .send(Message::request(MessageCommand::GetLockState))
            .await?;
        let state = LockState::from_payload(reply.payload.as_deref());
        info!(?state, "peripheral reported lock state");
        Ok(state)
    }

    /// Locks or unlocks the device.
    ///
    /// The stored device password is sealed under the stored symmetric key
    /// with a fresh nonce; the desired state byte travels unencrypted ahead
    /// of the sealed blob. Fails before any message is sent when either
    /// secret is missing.
    pub async fn set_lock(
        &self,
        state: LockState,
        store: &dyn SecretStore,
    ) -> Result<(), LockError> {
        let key = store.symmetric_key().ok_or(LockError::MissingKey)?;
        let password = store.device_password().ok_or(LockError::MissingPassword)?;

        info!(?state, "sealing device password for lock command");
        let sealed = crypto::seal(&key, password.as_bytes())?;
        let mut payload = Vec::with_capacity(1 + sealed.len());
        payload.push(state as u8);
        payload.extend_from_slice(&sealed);

        let message = Message::encrypted_request(MessageCommand::SetLockState, payload);
        let reply = self.handler.send(message).await?;

        if reply.payload.as_deref() != Some(ACCEPTED) {
            return Err(LockError::DeviceRejectedPassword);
        }
        Ok(())
    }
}
