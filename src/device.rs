//! A connected peripheral and its feature set.

use std::sync::Arc;

use crate::central::PeripheralId;
use crate::config::Configuration;
use crate::discovery::Discovery;
use crate::features::{
    AutoLockFeature, Feature, GuestFeature, KeyExchangeFeature, LockFeature, NameFeature,
    PasswordFeature, ResetFeature, SetUserFeature, WifiFeature,
};
use crate::handler::Handler;
use crate::transport::Transport;

/// A peripheral with an established transport and active features.
///
/// Created exactly once per successful connection sequence; dropped on
/// disconnect or explicit teardown.
pub struct Device {
    discovery: Discovery,
    features: Vec<Feature>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("discovery", &self.discovery)
            .field("features", &self.features.len())
            .finish()
    }
}

impl Device {
    /// Builds a device from a discovery and its ready transport, wiring one
    /// handler through every configured feature.
    pub fn build(
        discovery: Discovery,
        transport: Arc<dyn Transport>,
        config: &Configuration,
    ) -> Self {
        let handler = Arc::new(Handler::new(transport, config.request_id.clone()));
        let features = config
            .features
            .iter()
            .map(|id| Feature::build(*id, Arc::clone(&handler)))
            .collect();
        Self {
            discovery,
            features,
        }
    }

    /// The advertised name this device was discovered under.
    pub fn name(&self) -> &str {
        &self.discovery.name
    }

    /// The serial number from the discovery advert.
    pub fn serial(&self) -> &str {
        &self.discovery.serial
    }

    pub(crate) fn peripheral(&self) -> PeripheralId {
        self.discovery.peripheral
    }

    /// Every feature instance active on this device.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn name_feature(&self) -> Option<&NameFeature> {
        self.features.iter().find_map(|feature| match feature {
            Feature::Name(inner) => Some(inner),
            _ => None,
        })
    }

    pub fn wifi(&self) -> Option<&WifiFeature> {
        self.features.iter().find_map(|feature| match feature {
            Feature::Wifi(inner) => Some(inner),
            _ => None,
        })
    }

    pub fn auto_lock(&self) -> Option<&AutoLockFeature> {
        self.features.iter().find_map(|feature| match feature {
            Feature::AutoLock(inner) => Some(inner),
            _ => None,
        })
    }

    pub fn key_exchange(&self) -> Option<&KeyExchangeFeature> {
        self.features.iter().find_map(|feature| match feature {
            Feature::KeyExchange(inner) => Some(inner),
            _ => None,
        })
    }

    pub fn password(&self) -> Option<&PasswordFeature> {
        self.features.iter().find_map(|feature| match feature {
            Feature::Password(inner) => Some(inner),
            _ => None,
        })
    }

    pub fn lock(&self) -> Option<&LockFeature> {
        self.features.iter().find_map(|feature| match feature {
            Feature::Lock(inner) => Some(inner),
            _ => None,
        })
    }

    pub fn set_user(&self) -> Option<&SetUserFeature> {
        self.features.iter().find_map(|feature| match feature {
            Feature::SetUser(inner) => Some(inner),
            _ => None,
        })
    }

    pub fn guest(&self) -> Option<&GuestFeature> {
        self.features.iter().find_map(|feature| match feature {
            Feature::Guest(inner) => Some(inner),
            _ => None,
        })
    }

    pub fn reset(&self) -> Option<&ResetFeature> {
        self.features.iter().find_map(|feature| match feature {
            Feature::Reset(inner) => Some(inner),
            _ => None,
        })
    }
}

// Two devices are the same device when their serial numbers match.
impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.discovery.serial == other.discovery.serial
    }
}

impl Eq for Device {}
