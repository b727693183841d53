//! Client-side protocol stack for commanding a BLE smart lock.
//!
//! Turns an unreliable notify/write characteristic pair into a reliable,
//! typed request/reply and notification channel. Discovery and connection
//! are driven by a state machine over the platform central's event stream;
//! an optional authenticated-encryption overlay is established with an
//! X25519 key exchange, HKDF-SHA256 derivation, and ChaCha20-Poly1305
//! sealing.

pub mod central;
pub mod config;
pub mod crypto;
pub mod device;
pub mod discovery;
pub mod features;
pub mod handler;
pub mod manager;
pub mod message;
pub mod secret;
pub mod transport;

pub use central::{Central, CentralEvent, PeripheralId};
pub use config::{Configuration, DeviceManagerSettings};
pub use device::Device;
pub use discovery::Discovery;
pub use features::{Feature, FeatureId, LockState};
pub use handler::{Handler, HandlerError};
pub use manager::{DeviceManager, DeviceManagerError};
pub use message::{Message, MessageCommand, MessageType};
pub use secret::{MemorySecretStore, SecretStore};
pub use transport::Transport;
