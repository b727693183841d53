//! Wi-Fi provisioning over the lock's radio.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::UNIT_SEPARATOR;
use crate::handler::{Handler, HandlerError};
use crate::message::{Message, MessageCommand};

/// Connects the peripheral to a network and surveys nearby SSIDs.
pub struct WifiFeature {
    handler: Arc<Handler>,
}

impl WifiFeature {
    pub fn new(handler: Arc<Handler>) -> Self {
        Self { handler }
    }

    /// Asks the peripheral to join a network.
    ///
    /// SSID and password are joined with the unit separator, which neither
    /// may contain.
    pub async fn connect(&self, ssid: &str, password: &str) -> Result<(), HandlerError> {
        let mut payload = Vec::with_capacity(ssid.len() + 1 + password.len());
        payload.extend_from_slice(ssid.as_bytes());
        payload.push(UNIT_SEPARATOR);
        payload.extend_from_slice(password.as_bytes());

        info!(%ssid, "connecting peripheral to network");
        let message = Message::request_with(MessageCommand::ConnectToNetwork, payload);
        self.handler.send(message).await.map(|_| ())
    }

    /// Asks the peripheral for the networks it currently sees.
    ///
    /// The reply is a unit-separated list of SSIDs; empty entries are
    /// dropped.
    pub async fn available_networks(&self) -> Result<Vec<String>, HandlerError> {
        info!("listing available networks");
        let reply = self
            .handler
            .send(Message::request(MessageCommand::StartNetworkListen))
            .await
            .map_err(|err| {
                warn!("could not get networks");
                err
            })?;
        let Some(payload) = reply.payload else {
            return Ok(Vec::new());
        };
        Ok(payload
            .split(|byte| *byte == UNIT_SEPARATOR)
            .filter(|part| !part.is_empty())
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect())
    }

    /// Opens the standing subscription for SSID update notifications the
    /// peripheral pushes while the network listen is running.
    pub fn ssid_updates(&self) -> mpsc::Receiver<Message> {
        self.handler.listen(MessageCommand::NetworkSsidUpdate)
    }

    /// Stops the peripheral-side listen and closes the subscription.
    pub async fn stop_network_listen(&self) -> Result<(), HandlerError> {
        self.handler.stop_listening();
        self.handler
            .send(Message::request(MessageCommand::StopNetworkListen))
            .await
            .map(|_| ())
    }
}
