//! Boundary trait over the physical wireless link.
//!
//! The platform BLE stack (service discovery, characteristic writes, notify
//! subscriptions) lives behind this trait; the core never speaks to the radio
//! directly.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// A notify/write characteristic pair seen as a byte transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolves once the link is usable: characteristics discovered and
    /// notifications armed. `false` means the transport never became usable.
    async fn is_ready(&self) -> bool;

    /// Hands out the inbound notification stream.
    ///
    /// The stream is infinite and not restartable; the handler takes it
    /// exactly once for the lifetime of the connection. Subsequent calls
    /// return `None`. A `None` item inside the stream is a notification that
    /// carried no data.
    fn take_updates(&self) -> Option<mpsc::Receiver<Option<Vec<u8>>>>;

    /// Writes raw bytes to the characteristic identified by `channel_id`.
    fn send(&self, data: &[u8], channel_id: &str);
}
