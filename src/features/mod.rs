//! Typed command adapters over the handler.
//!
//! Each feature is a thin, stateless call site: it builds a fixed-width
//! payload, wraps it in a [`crate::message::Message`] with the right command
//! and encryption flag, and decodes the reply. New capabilities are added by
//! defining a command code and a payload codec, never by touching the core.

mod guest;
mod key_exchange;
mod lock;
mod name;
mod password;
mod settings;
mod wifi;

pub use guest::{GuestError, GuestFeature};
pub use key_exchange::{KeyExchangeError, KeyExchangeFeature};
pub use lock::{LockError, LockFeature, LockState};
pub use name::NameFeature;
pub use password::{PasswordError, PasswordFeature};
pub use settings::{AutoLockFeature, ResetFeature, SetUserFeature};
pub use wifi::WifiFeature;

use std::sync::Arc;

use crate::handler::Handler;

/// ASCII unit separator; cannot appear inside SSIDs, passwords, or OTPs, so
/// it joins multi-part string payloads.
pub(crate) const UNIT_SEPARATOR: u8 = 0x1F;

/// Identifiers for the closed set of features a device can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureId {
    Name,
    Wifi,
    AutoLock,
    KeyExchange,
    Password,
    Lock,
    SetUser,
    Guest,
    Reset,
}

impl FeatureId {
    /// Every feature the stack knows about, in factory order.
    pub fn all() -> [FeatureId; 9] {
        [
            FeatureId::Name,
            FeatureId::Wifi,
            FeatureId::AutoLock,
            FeatureId::KeyExchange,
            FeatureId::Password,
            FeatureId::Lock,
            FeatureId::SetUser,
            FeatureId::Guest,
            FeatureId::Reset,
        ]
    }
}

/// A constructed feature instance bound to a device's handler.
pub enum Feature {
    Name(NameFeature),
    Wifi(WifiFeature),
    AutoLock(AutoLockFeature),
    KeyExchange(KeyExchangeFeature),
    Password(PasswordFeature),
    Lock(LockFeature),
    SetUser(SetUserFeature),
    Guest(GuestFeature),
    Reset(ResetFeature),
}

impl Feature {
    /// Maps a configured feature identifier to its concrete constructor.
    pub fn build(id: FeatureId, handler: Arc<Handler>) -> Self {
        match id {
            FeatureId::Name => Feature::Name(NameFeature::new(handler)),
            FeatureId::Wifi => Feature::Wifi(WifiFeature::new(handler)),
            FeatureId::AutoLock => Feature::AutoLock(AutoLockFeature::new(handler)),
            FeatureId::KeyExchange => Feature::KeyExchange(KeyExchangeFeature::new(handler)),
            FeatureId::Password => Feature::Password(PasswordFeature::new(handler)),
            FeatureId::Lock => Feature::Lock(LockFeature::new(handler)),
            FeatureId::SetUser => Feature::SetUser(SetUserFeature::new(handler)),
            FeatureId::Guest => Feature::Guest(GuestFeature::new(handler)),
            FeatureId::Reset => Feature::Reset(ResetFeature::new(handler)),
        }
    }

    /// Which member of the closed set this instance is.
    pub fn id(&self) -> FeatureId {
        match self {
            Feature::Name(_) => FeatureId::Name,
            Feature::Wifi(_) => FeatureId::Wifi,
            Feature::AutoLock(_) => FeatureId::AutoLock,
            Feature::KeyExchange(_) => FeatureId::KeyExchange,
            Feature::Password(_) => FeatureId::Password,
            Feature::Lock(_) => FeatureId::Lock,
            Feature::SetUser(_) => FeatureId::SetUser,
            Feature::Guest(_) => FeatureId::Guest,
            Feature::Reset(_) => FeatureId::Reset,
        }
    }
}
