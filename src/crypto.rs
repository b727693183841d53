//! Cryptographic composition for the secure channel.
//!
//! Key agreement is ephemeral X25519; the symmetric key is derived from the
//! shared secret with HKDF-SHA256 under a fixed, protocol-defined salt and
//! context string. Payloads are sealed with ChaCha20-Poly1305 using a fresh
//! nonce per call, transported in the combined `nonce || ciphertext || tag`
//! layout.

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::SharedSecret;

/// Context string bound into the key derivation.
const HKDF_INFO: &[u8] = b"smartlockperipheral";
/// Protocol-defined HKDF salt shared with the peripheral firmware.
const HKDF_SALT: &[u8] = b"9iac7i7zikocotce9gn3ji7lztz8rltn";

/// Length of the AEAD nonce prefix in a combined blob.
const NONCE_LEN: usize = 12;

/// Failures inside the crypto helpers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("peer public key has the wrong length")]
    InvalidPeerKey,
    #[error("could not seal payload")]
    SealFailed,
    #[error("sealed payload is malformed or does not authenticate")]
    OpenFailed,
}

/// Derives the 32-byte channel key from an X25519 shared secret.
pub fn derive_symmetric_key(shared: &SharedSecret) -> [u8; 32] {
    let hkdf = Hkdf::<Sha256>::new(Some(HKDF_SALT), shared.as_bytes());
    let mut key = [0u8; 32];
    // A 32-byte output is always within HKDF-SHA256's limit.
    hkdf.expand(HKDF_INFO, &mut key)
        .unwrap_or_else(|_| unreachable!("32 bytes is a valid hkdf output length"));
    key
}

/// Parses a peer's raw public key bytes.
pub fn peer_public_key(bytes: &[u8]) -> Result<x25519_dalek::PublicKey, CryptoError> {
    let raw: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidPeerKey)?;
    Ok(x25519_dalek::PublicKey::from(raw))
}

/// Seals `plaintext` under `key` with a freshly generated nonce.
///
/// The nonce is never reused; it is generated per call and prepended to the
/// ciphertext so the peripheral can open the blob.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::SealFailed)?;
    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

/// Opens a combined `nonce || ciphertext || tag` blob.
pub fn open(key: &[u8; 32], combined: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if combined.len() <= NONCE_LEN {
        return Err(CryptoError::OpenFailed);
    }
    let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::OpenFailed)
}
