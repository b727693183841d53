#![allow(dead_code)]

//! In-memory doubles used to run the stack without a radio.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use lockwire::{Central, CentralEvent, Message, PeripheralId, Transport};

/// Transport bridge driven from the test body: records outbound frames and
/// lets the test inject inbound buffers.
pub struct PipeTransport {
    ready: bool,
    injector: mpsc::Sender<Option<Vec<u8>>>,
    updates: Mutex<Option<mpsc::Receiver<Option<Vec<u8>>>>>,
    sent: Mutex<Vec<(Vec<u8>, String)>>,
}

impl PipeTransport {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel(32);
        Arc::new(Self {
            ready: true,
            injector: tx,
            updates: Mutex::new(Some(rx)),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Injects a raw inbound buffer as if the peripheral had notified.
    pub fn inject(&self, data: Option<Vec<u8>>) {
        self.injector.try_send(data).expect("inject buffer full");
    }

    /// Injects a packed message.
    pub fn inject_message(&self, message: &Message) {
        self.inject(Some(message.pack().expect("packable message")));
    }

    /// Everything sent so far, frame bytes plus channel id.
    pub fn sent(&self) -> Vec<(Vec<u8>, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for PipeTransport {
    async fn is_ready(&self) -> bool {
        self.ready
    }

    fn take_updates(&self) -> Option<mpsc::Receiver<Option<Vec<u8>>>> {
        self.updates.lock().take()
    }

    fn send(&self, data: &[u8], channel_id: &str) {
        self.sent.lock().push((data.to_vec(), channel_id.to_owned()));
    }
}

type Script = Box<dyn Fn(&Message) -> Option<Message> + Send + Sync>;

/// Transport that plays the peripheral: decodes each outbound frame and
/// feeds the scripted reply straight back into the inbound stream.
pub struct ScriptedTransport {
    script: Script,
    injector: mpsc::Sender<Option<Vec<u8>>>,
    updates: Mutex<Option<mpsc::Receiver<Option<Vec<u8>>>>>,
    sent: Mutex<Vec<Message>>,
}

impl ScriptedTransport {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&Message) -> Option<Message> + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel(32);
        Arc::new(Self {
            script: Box::new(script),
            injector: tx,
            updates: Mutex::new(Some(rx)),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Decoded requests observed so far.
    pub fn requests(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn is_ready(&self) -> bool {
        true
    }

    fn take_updates(&self) -> Option<mpsc::Receiver<Option<Vec<u8>>>> {
        self.updates.lock().take()
    }

    fn send(&self, data: &[u8], _channel_id: &str) {
        let message = Message::unpack(data).expect("outbound frame must decode");
        self.sent.lock().push(message.clone());
        if let Some(reply) = (self.script)(&message) {
            self.injector
                .try_send(Some(reply.pack().expect("packable reply")))
                .expect("inject buffer full");
        }
    }
}

/// What the manager asked the platform to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CentralAction {
    StartScan(String),
    StopScan,
    Connect(PeripheralId),
    CancelConnection(PeripheralId),
}

/// Scripted platform central. `connect` pops the next outcome from the
/// queue: `Some(true)` emits `Connected`, `Some(false)` emits
/// `ConnectFailed`, `None` (queue empty) stays silent so watchdog paths can
/// be exercised.
pub struct MockCentral {
    events_tx: mpsc::Sender<CentralEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<CentralEvent>>>,
    actions: Mutex<Vec<CentralAction>>,
    connect_outcomes: Mutex<VecDeque<bool>>,
    transport_ready: Mutex<bool>,
}

impl MockCentral {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel(32);
        Arc::new(Self {
            events_tx: tx,
            events_rx: Mutex::new(Some(rx)),
            actions: Mutex::new(Vec::new()),
            connect_outcomes: Mutex::new(VecDeque::new()),
            transport_ready: Mutex::new(true),
        })
    }

    pub fn emit(&self, event: CentralEvent) {
        self.events_tx.try_send(event).expect("event buffer full");
    }

    pub fn push_connect_outcome(&self, success: bool) {
        self.connect_outcomes.lock().push_back(success);
    }

    pub fn set_transport_ready(&self, ready: bool) {
        *self.transport_ready.lock() = ready;
    }

    pub fn actions(&self) -> Vec<CentralAction> {
        self.actions.lock().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.actions
            .lock()
            .iter()
            .filter(|action| matches!(action, CentralAction::Connect(_)))
            .count()
    }
}

impl Central for MockCentral {
    fn take_events(&self) -> Option<mpsc::Receiver<CentralEvent>> {
        self.events_rx.lock().take()
    }

    fn start_scan(&self, service_id: &str) {
        self.actions
            .lock()
            .push(CentralAction::StartScan(service_id.to_owned()));
    }

    fn stop_scan(&self) {
        self.actions.lock().push(CentralAction::StopScan);
    }

    fn connect(&self, peripheral: PeripheralId) {
        self.actions.lock().push(CentralAction::Connect(peripheral));
        if let Some(success) = self.connect_outcomes.lock().pop_front() {
            let event = if success {
                CentralEvent::Connected { peripheral }
            } else {
                CentralEvent::ConnectFailed { peripheral }
            };
            self.events_tx.try_send(event).expect("event buffer full");
        }
    }

    fn cancel_connection(&self, peripheral: PeripheralId) {
        self.actions
            .lock()
            .push(CentralAction::CancelConnection(peripheral));
    }

    fn transport(&self, _peripheral: PeripheralId) -> Arc<dyn Transport> {
        if *self.transport_ready.lock() {
            PipeTransport::new()
        } else {
            Arc::new(UnreadyTransport)
        }
    }
}

/// Transport whose ready signal never comes.
struct UnreadyTransport;

#[async_trait]
impl Transport for UnreadyTransport {
    async fn is_ready(&self) -> bool {
        false
    }

    fn take_updates(&self) -> Option<mpsc::Receiver<Option<Vec<u8>>>> {
        None
    }

    fn send(&self, _data: &[u8], _channel_id: &str) {}
}

/// Manufacturer data with the default company identifier and the given
/// serial bytes.
pub fn manufacturer_data(serial: [u8; 6]) -> Vec<u8> {
    let mut data = vec![0x4C, 0x52];
    data.extend_from_slice(&serial);
    data
}
