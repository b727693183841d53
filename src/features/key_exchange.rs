//! Key exchange: establishes the symmetric key the encrypted commands use.

use std::sync::Arc;

use rand_core::OsRng;
use thiserror::Error;
use tracing::info;
use x25519_dalek::{EphemeralSecret, PublicKey};

use crate::crypto::{self, CryptoError};
use crate::handler::{Handler, HandlerError};
use crate::message::{Message, MessageCommand};
use crate::secret::{SecretStore, SecretStoreError};

/// Failures during the key exchange flow.
#[derive(Debug, Error)]
pub enum KeyExchangeError {
    /// The peripheral replied without a public key payload.
    #[error("device rejected the key exchange request")]
    DeviceRejectedRequest,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error(transparent)]
    Store(#[from] SecretStoreError),
}

/// Performs an ephemeral X25519 exchange and derives the channel key.
pub struct KeyExchangeFeature {
    handler: Arc<Handler>,
}

impl KeyExchangeFeature {
    pub fn new(handler: Arc<Handler>) -> Self {
        Self { handler }
    }

    /// Runs the exchange: sends our ephemeral public key unencrypted, reads
    /// the peripheral's key from the reply, derives a 32-byte symmetric key,
    /// and persists it.
    ///
    /// Nothing is persisted when the peripheral rejects the request or the
    /// peer key is malformed.
    pub async fn perform(&self, store: &dyn SecretStore) -> Result<[u8; 32], KeyExchangeError> {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);

        info!("sending public key to peripheral");
        let message =
            Message::request_with(MessageCommand::KeyExchange, public.as_bytes().to_vec());
        let reply = self.handler.send(message).await?;

        let payload = reply
            .payload
            .ok_or(KeyExchangeError::DeviceRejectedRequest)?;
        info!("received public key from peripheral");

        let peer = crypto::peer_public_key(&payload)?;
        let key = crypto::derive_symmetric_key(&secret.diffie_hellman(&peer));

        info!("derived symmetric key, persisting");
        store.save_symmetric_key(&key)?;
        Ok(key)
    }
}
