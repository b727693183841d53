//! Device password provisioning.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::crypto::{self, CryptoError};
use crate::handler::{Handler, HandlerError};
use crate::message::{Message, MessageCommand};
use crate::secret::{SecretStore, SecretStoreError};

const ACCEPTED: &[u8] = &[0x01];

/// Failures while generating and setting the device password.
#[derive(Debug, Error)]
pub enum PasswordError {
    /// No symmetric key available, neither supplied nor stored.
    #[error("no symmetric key available")]
    NoSymmetricKey,
    /// The peripheral did not acknowledge the new password.
    #[error("device rejected the password request")]
    DeviceRejectedRequest,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error(transparent)]
    Store(#[from] SecretStoreError),
}

/// Generates and provisions the credential every lock/unlock presents.
pub struct PasswordFeature {
    handler: Arc<Handler>,
}

impl PasswordFeature {
    pub fn new(handler: Arc<Handler>) -> Self {
        Self { handler }
    }

    /// Generates a fresh random password, seals it, and sends it to the
    /// peripheral. The password is persisted only after the peripheral
    /// acknowledges it, never before.
    ///
    /// `key` overrides the stored symmetric key, for the provisioning flow
    /// where the exchange just ran and storage may lag behind.
    pub async fn generate_device_password(
        &self,
        key: Option<[u8; 32]>,
        store: &dyn SecretStore,
    ) -> Result<String, PasswordError> {
        info!("generating device password");
        let password = Uuid::new_v4().to_string();

        let key = key
            .or_else(|| store.symmetric_key())
            .ok_or(PasswordError::NoSymmetricKey)?;

        let sealed = crypto::seal(&key, password.as_bytes())?;
        let message = Message::encrypted_request(MessageCommand::SetDevicePassword, sealed);

        info!("sending sealed device password");
        let reply = self.handler.send(message).await?;
        if reply.payload.as_deref() != Some(ACCEPTED) {
            return Err(PasswordError::DeviceRejectedRequest);
        }

        info!("device acknowledged password, persisting");
        store.save_device_password(&password)?;
        Ok(password)
    }
}
