//! Discovery and connection state machine.
//!
//! The manager owns the lifecycle of the transport per physical peripheral:
//! scanning with duplicate adverts for liveness tracking, a periodic loss
//! sweep, connect with retry and an overall watchdog, and exactly one
//! connected [`Device`] at a time. All platform callbacks arrive as
//! [`CentralEvent`]s consumed by a single dispatcher task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::central::{Central, CentralEvent, PeripheralId};
use crate::config::Configuration;
use crate::device::Device;
use crate::discovery::Discovery;

/// Errors surfaced by the device manager.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceManagerError {
    /// The radio is not powered on; retry discovery once it is.
    #[error("bluetooth is unavailable")]
    BluetoothUnavailable,
    /// The connection could not be established within the retry budget.
    #[error("failed to connect")]
    FailedToConnect,
    /// The connection process exceeded its overall time budget.
    #[error("connection timed out")]
    ConnectionTimedOut,
    /// Another connection attempt is already in flight.
    #[error("a connection attempt is already in progress")]
    ConnectionInProgress,
}

/// A caller suspended on the outcome of a connection sequence.
struct PendingConnection {
    slot: oneshot::Sender<Result<Arc<Device>, DeviceManagerError>>,
    /// Which peripheral is being connected; `None` until a serial-directed
    /// attempt has found its target.
    peripheral: Option<PeripheralId>,
    attempts: u32,
}

#[derive(Default)]
struct ManagerState {
    bluetooth_available: bool,
    discoveries: Vec<Discovery>,
    last_seen: HashMap<PeripheralId, Instant>,
    device: Option<Arc<Device>>,
    pending: Option<PendingConnection>,
    target_serial: Option<String>,
    loss_sweep: Option<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
    connect_task: Option<JoinHandle<()>>,
}

impl ManagerState {
    /// Takes the pending slot and resolves it; taking it out of shared state
    /// atomically with resolution makes a double resolve impossible. The
    /// watchdog dies with the attempt so it cannot fire into a later one.
    fn resolve_pending(&mut self, outcome: Result<Arc<Device>, DeviceManagerError>) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
        if let Some(pending) = self.pending.take() {
            let _ = pending.slot.send(outcome);
        }
    }

    fn clear_discoveries(&mut self) {
        self.discoveries.clear();
        self.last_seen.clear();
    }

    fn abort_loss_sweep(&mut self) {
        if let Some(sweep) = self.loss_sweep.take() {
            sweep.abort();
        }
    }
}

/// Entry point for all device interaction: discovery and connection.
pub struct DeviceManager {
    central: Arc<dyn Central>,
    config: Arc<Configuration>,
    state: Arc<Mutex<ManagerState>>,
    events: Option<JoinHandle<()>>,
}

impl DeviceManager {
    /// Creates a manager over a platform central and starts consuming its
    /// event stream.
    pub fn new(central: Arc<dyn Central>, config: Configuration) -> Self {
        let config = Arc::new(config);
        let state = Arc::new(Mutex::new(ManagerState::default()));
        let events = match central.take_events() {
            Some(events) => Some(spawn_event_loop(
                Arc::clone(&central),
                Arc::clone(&config),
                Arc::clone(&state),
                events,
            )),
            None => {
                warn!("central event stream already taken; manager will see no events");
                None
            }
        };
        Self {
            central,
            config,
            state,
            events,
        }
    }

    /// Starts passive scanning and the discovery loss sweep.
    ///
    /// Fails with [`DeviceManagerError::BluetoothUnavailable`] until the
    /// central has reported a powered-on state.
    pub fn start_discovery(&self) -> Result<(), DeviceManagerError> {
        let mut state = self.state.lock();
        if !state.bluetooth_available {
            warn!("discovery started before bluetooth available");
            return Err(DeviceManagerError::BluetoothUnavailable);
        }
        info!(service = %self.config.service_id, "scanning for peripherals");
        self.central.start_scan(&self.config.service_id);
        state.abort_loss_sweep();
        state.loss_sweep = Some(spawn_loss_sweep(
            Arc::clone(&self.state),
            self.config.settings.discovery_loss_timeout,
        ));
        Ok(())
    }

    /// Stops scanning, cancels the loss sweep, and forgets all discoveries.
    pub fn stop_discovery(&self) {
        info!("stopped discovery");
        self.central.stop_scan();
        let mut state = self.state.lock();
        state.abort_loss_sweep();
        state.clear_discoveries();
    }

    /// The current discovered set, newest last.
    pub fn discoveries(&self) -> Vec<Discovery> {
        self.state.lock().discoveries.clone()
    }

    /// The connected device, if any.
    pub fn device(&self) -> Option<Arc<Device>> {
        self.state.lock().device.clone()
    }

    /// Connects to a discovery and suspends until the device is ready, the
    /// retry budget is exhausted, or the connection watchdog fires.
    pub async fn connect(
        &self,
        discovery: &Discovery,
    ) -> Result<Arc<Device>, DeviceManagerError> {
        info!(peripheral = %discovery.peripheral, "connecting to discovery");
        let rx = self.register_pending(Some(discovery.peripheral))?;
        self.arm_watchdog();
        self.central.connect(discovery.peripheral);
        rx.await.unwrap_or(Err(DeviceManagerError::FailedToConnect))
    }

    /// Starts discovery and connects to the first peripheral advertising the
    /// given serial number.
    pub async fn connect_to_serial(
        &self,
        serial: &str,
    ) -> Result<Arc<Device>, DeviceManagerError> {
        info!(%serial, "searching for discovery by serial");
        let rx = self.register_pending(None)?;
        self.state.lock().target_serial = Some(serial.to_owned());
        // The watchdog is armed before scanning starts so a target advert
        // can never resolve the attempt while the handle is still in flight.
        self.arm_watchdog();
        if let Err(err) = self.start_discovery() {
            let mut state = self.state.lock();
            state.target_serial = None;
            state.pending = None;
            if let Some(watchdog) = state.watchdog.take() {
                watchdog.abort();
            }
            return Err(err);
        }
        rx.await.unwrap_or(Err(DeviceManagerError::FailedToConnect))
    }

    /// Tears down the connection to the connected device; no-op when there is
    /// none.
    pub fn disconnect(&self) {
        let device = self.state.lock().device.clone();
        if let Some(device) = device {
            self.central.cancel_connection(device.peripheral());
        }
    }

    fn register_pending(
        &self,
        peripheral: Option<PeripheralId>,
    ) -> Result<
        oneshot::Receiver<Result<Arc<Device>, DeviceManagerError>>,
        DeviceManagerError,
    > {
        let mut state = self.state.lock();
        if state.pending.is_some() {
            return Err(DeviceManagerError::ConnectionInProgress);
        }
        state.abort_loss_sweep();
        let (tx, rx) = oneshot::channel();
        state.pending = Some(PendingConnection {
            slot: tx,
            peripheral,
            attempts: 1,
        });
        Ok(rx)
    }

    fn arm_watchdog(&self) {
        let central = Arc::clone(&self.central);
        let state = Arc::clone(&self.state);
        let timeout = self.config.settings.connection_timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!("connection timed out");
            let mut guard = state.lock();
            for discovery in &guard.discoveries {
                central.cancel_connection(discovery.peripheral);
            }
            central.stop_scan();
            guard.abort_loss_sweep();
            guard.clear_discoveries();
            guard.target_serial = None;
            if let Some(task) = guard.connect_task.take() {
                task.abort();
            }
            guard.resolve_pending(Err(DeviceManagerError::ConnectionTimedOut));
        });
        let mut state = self.state.lock();
        if let Some(previous) = state.watchdog.replace(handle) {
            previous.abort();
        }
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        if let Some(events) = self.events.take() {
            events.abort();
        }
        let mut state = self.state.lock();
        state.abort_loss_sweep();
        for task in [state.watchdog.take(), state.connect_task.take()] {
            if let Some(task) = task {
                task.abort();
            }
        }
    }
}

/// Periodically evicts discoveries that have not advertised within the loss
/// timeout. Runs until aborted by `stop_discovery` or a connection attempt.
fn spawn_loss_sweep(
    state: Arc<Mutex<ManagerState>>,
    timeout: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(timeout).await;
            let now = Instant::now();
            let mut guard = state.lock();
            let lost: Vec<PeripheralId> = guard
                .last_seen
                .iter()
                .filter(|(_, seen)| now.duration_since(**seen) > timeout)
                .map(|(id, _)| *id)
                .collect();
            for id in lost {
                info!(peripheral = %id, "lost discovery");
                guard.last_seen.remove(&id);
                guard.discoveries.retain(|d| d.peripheral != id);
            }
        }
    })
}

fn spawn_event_loop(
    central: Arc<dyn Central>,
    config: Arc<Configuration>,
    state: Arc<Mutex<ManagerState>>,
    mut events: tokio::sync::mpsc::Receiver<CentralEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                CentralEvent::StateChanged { powered_on } => {
                    info!(powered_on, "central state changed");
                    state.lock().bluetooth_available = powered_on;
                }
                CentralEvent::AdvertisementReceived {
                    peripheral,
                    local_name,
                    manufacturer_data,
                } => {
                    advert_received(
                        &central,
                        &config,
                        &state,
                        peripheral,
                        local_name,
                        manufacturer_data,
                    );
                }
                CentralEvent::Connected { peripheral } => {
                    connected(&central, &config, &state, peripheral);
                }
                CentralEvent::ConnectFailed { peripheral } => {
                    connect_failed(&central, &config, &state, peripheral);
                }
                CentralEvent::Disconnected { peripheral } => {
                    disconnected(&state, peripheral);
                }
            }
        }
        debug!("central event stream ended");
    })
}

fn advert_received(
    central: &Arc<dyn Central>,
    config: &Configuration,
    state: &Mutex<ManagerState>,
    peripheral: PeripheralId,
    local_name: Option<String>,
    manufacturer_data: Option<Vec<u8>>,
) {
    let mut guard = state.lock();
    // Duplicates refresh liveness regardless of whether the advert parses.
    guard.last_seen.insert(peripheral, Instant::now());

    if guard.discoveries.iter().any(|d| d.peripheral == peripheral) {
        return;
    }
    let Some(discovery) = Discovery::from_advert(
        peripheral,
        local_name.as_deref(),
        manufacturer_data.as_deref(),
        config.company_identifier,
    ) else {
        return;
    };
    info!(peripheral = %peripheral, serial = %discovery.serial, "discovered peripheral");

    let matches_target = guard
        .target_serial
        .as_deref()
        .is_some_and(|serial| serial == discovery.serial);
    guard.discoveries.push(discovery);

    if matches_target {
        info!(peripheral = %peripheral, "found target serial, connecting");
        if let Some(pending) = guard.pending.as_mut() {
            pending.peripheral = Some(peripheral);
            pending.attempts = 1;
        }
        central.connect(peripheral);
    }
}

fn connected(
    central: &Arc<dyn Central>,
    config: &Arc<Configuration>,
    state: &Arc<Mutex<ManagerState>>,
    peripheral: PeripheralId,
) {
    let discovery = {
        let guard = state.lock();
        guard
            .discoveries
            .iter()
            .find(|d| d.peripheral == peripheral)
            .cloned()
    };
    let Some(discovery) = discovery else {
        warn!(peripheral = %peripheral, "connected but no matching discovery");
        return;
    };
    info!(peripheral = %peripheral, "connected, waiting for transport to become ready");

    let central = Arc::clone(central);
    let config = Arc::clone(config);
    let state_for_task = Arc::clone(state);
    let task = tokio::spawn(async move {
        let transport = central.transport(peripheral);
        if transport.is_ready().await {
            info!("transport ready, creating device");
            let device = Arc::new(Device::build(discovery, transport, &config));
            central.stop_scan();
            let mut guard = state_for_task.lock();
            guard.abort_loss_sweep();
            guard.clear_discoveries();
            guard.device = Some(Arc::clone(&device));
            guard.target_serial = None;
            guard.resolve_pending(Ok(device));
        } else {
            warn!("transport never became ready");
            state_for_task
                .lock()
                .resolve_pending(Err(DeviceManagerError::FailedToConnect));
        }
    });
    let mut guard = state.lock();
    if let Some(previous) = guard.connect_task.replace(task) {
        previous.abort();
    }
}

fn connect_failed(
    central: &Arc<dyn Central>,
    config: &Configuration,
    state: &Mutex<ManagerState>,
    peripheral: PeripheralId,
) {
    let mut guard = state.lock();
    let Some(pending) = guard.pending.as_mut() else {
        warn!(peripheral = %peripheral, "connect failed with no pending attempt");
        return;
    };
    if pending.peripheral != Some(peripheral) {
        debug!(peripheral = %peripheral, "connect failed for a peripheral we are not connecting to");
        return;
    }
    if pending.attempts < config.settings.retry_attempts {
        pending.attempts += 1;
        info!(
            peripheral = %peripheral,
            attempt = pending.attempts,
            "retrying connection"
        );
        central.connect(peripheral);
    } else {
        warn!(peripheral = %peripheral, "retry attempts exhausted");
        guard.resolve_pending(Err(DeviceManagerError::FailedToConnect));
    }
}

/// A transport-level disconnect of the connected device is a pure state
/// transition back toward idle; there is no pending call to fail.
fn disconnected(state: &Mutex<ManagerState>, peripheral: PeripheralId) {
    let mut guard = state.lock();
    let matches = guard
        .device
        .as_ref()
        .is_some_and(|device| device.peripheral() == peripheral);
    if !matches {
        debug!(peripheral = %peripheral, "disconnect for a peripheral we are not connected to");
        return;
    }
    info!(peripheral = %peripheral, "lost connection to device");
    guard.discoveries.retain(|d| d.peripheral != peripheral);
    guard.last_seen.remove(&peripheral);
    guard.device = None;
}
