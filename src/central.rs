//! Boundary trait over the platform BLE central role.
//!
//! All platform callbacks are collapsed into one [`CentralEvent`] channel
//! consumed by a single dispatcher in the device manager, instead of mutable
//! state scattered across delegate methods.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::transport::Transport;

/// Opaque handle identifying a peripheral known to the platform.
///
/// Identity of a discovery is this handle, never advert content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeripheralId(pub Uuid);

impl PeripheralId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Everything the platform central can tell us, as one event stream.
#[derive(Debug, Clone)]
pub enum CentralEvent {
    /// The radio power state changed.
    StateChanged { powered_on: bool },
    /// An advertisement was received; duplicates are delivered too.
    AdvertisementReceived {
        peripheral: PeripheralId,
        local_name: Option<String>,
        manufacturer_data: Option<Vec<u8>>,
    },
    /// A requested connection completed at the transport level.
    Connected { peripheral: PeripheralId },
    /// A requested connection failed at the transport level.
    ConnectFailed { peripheral: PeripheralId },
    /// An established connection was torn down.
    Disconnected { peripheral: PeripheralId },
}

/// The platform central role: scanning and connection primitives.
pub trait Central: Send + Sync {
    /// Hands out the event stream, exactly once.
    fn take_events(&self) -> Option<mpsc::Receiver<CentralEvent>>;

    /// Starts a passive scan for peripherals advertising `service_id`,
    /// with duplicate adverts delivered so liveness can be tracked.
    fn start_scan(&self, service_id: &str);

    /// Stops any running scan.
    fn stop_scan(&self);

    /// Requests a connection; the outcome arrives as a `Connected` or
    /// `ConnectFailed` event.
    fn connect(&self, peripheral: PeripheralId);

    /// Tears down the connection to a peripheral, if any.
    fn cancel_connection(&self, peripheral: PeripheralId);

    /// Builds the byte transport for a connected peripheral.
    fn transport(&self, peripheral: PeripheralId) -> Arc<dyn Transport>;
}
