//! Explicit configuration passed to the components that need it.
//!
//! There is no process-wide singleton; the manager owns a [`Configuration`]
//! value and hands the relevant pieces to the advert validator and the
//! feature factory.

use std::time::Duration;

use crate::features::FeatureId;

/// Timing and retry policy for the device manager.
#[derive(Debug, Clone, Copy)]
pub struct DeviceManagerSettings {
    /// How long a discovery may go unseen before it is considered lost.
    pub discovery_loss_timeout: Duration,
    /// Maximum number of connection attempts before failing the caller.
    pub retry_attempts: u32,
    /// Overall budget for the connection process.
    pub connection_timeout: Duration,
}

impl Default for DeviceManagerSettings {
    fn default() -> Self {
        Self {
            discovery_loss_timeout: Duration::from_secs(5),
            retry_attempts: 3,
            connection_timeout: Duration::from_secs(15),
        }
    }
}

/// Everything the stack needs to know about the peripheral's GATT layout and
/// the features to expose on a connected device.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Identifier of the lock service advertised by the peripheral.
    pub service_id: String,
    /// Identifier of the write characteristic requests go out on.
    pub request_id: String,
    /// Identifier of the notify characteristic replies come back on.
    pub reply_id: String,
    /// The two bytes of manufacturer data that mark an advert as ours.
    pub company_identifier: [u8; 2],
    /// Which features the factory instantiates on a connected device.
    pub features: Vec<FeatureId>,
    /// Manager timing and retry policy.
    pub settings: DeviceManagerSettings,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            service_id: "00000000-9f34-11ee-8c90-0242ac120002".to_owned(),
            request_id: "00000001-9f34-11ee-8c90-0242ac120002".to_owned(),
            reply_id: "00000002-9f34-11ee-8c90-0242ac120002".to_owned(),
            company_identifier: [0x4C, 0x52],
            features: FeatureId::all().to_vec(),
            settings: DeviceManagerSettings::default(),
        }
    }
}
