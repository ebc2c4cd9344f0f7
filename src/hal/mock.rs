//! Mock implementations for testing without hardware.
//!
//! Every collaborator of the bridge has a recording test double here, so
//! the controller can be exercised on a desktop with scripted traffic.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockBus`] | [`TrainboxBus`] | Records sent commands, queues events |
//! | [`MockStation`] | [`StationClients`] | Records messages, queues requests |
//! | [`MockStore`] | [`PreferenceStore`] | In-memory namespaces with fault injection |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`RosterRecorder`] | [`RosterSink`] | Shared log of roster chunks and results |
//!
//! # Example
//!
//! ```rust
//! use rs_trainbridge::BridgeController;
//! use rs_trainbridge::commands::{BusCommand, PowerState};
//! use rs_trainbridge::config::BridgeConfig;
//! use rs_trainbridge::hal::{MockBus, MockStation, MockStore};
//! use rs_trainbridge::traits::ClientRequest;
//!
//! let mut bridge: BridgeController<_, _, _> = BridgeController::new(
//!     BridgeConfig::default(),
//!     MockBus::new(),
//!     MockStation::new(),
//!     MockStore::new(),
//! );
//! bridge.clients_mut().queue(ClientRequest::SetPower(PowerState::Normal));
//! bridge.cyclic(0);
//!
//! assert_eq!(bridge.bus().sent, [BusCommand::SystemGo { uid: 0 }]);
//! ```
//!
//! [`TrainboxBus`]: crate::traits::TrainboxBus
//! [`StationClients`]: crate::traits::StationClients
//! [`PreferenceStore`]: crate::traits::PreferenceStore
//! [`Clock`]: crate::traits::Clock
//! [`RosterSink`]: crate::session::RosterSink

extern crate alloc;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::commands::{BusCommand, StationMessage};
use crate::session::RosterSink;
use crate::stream::{crc16_ccitt, DataType};
use crate::traits::{BusEvent, ClientRequest, Clock, PreferenceStore, StationClients, TrainboxBus};

// ============================================================================
// Transport Mocks
// ============================================================================

/// Mock trainbox bus.
///
/// Sent commands land in [`sent`](Self::sent); events queued with
/// [`queue`](Self::queue) are handed out by `try_recv` in order.
#[derive(Debug, Default)]
pub struct MockBus {
    /// Every command sent, in order.
    pub sent: Vec<BusCommand>,
    /// Pending events for `try_recv`.
    pub incoming: VecDeque<BusEvent>,
    /// When set, `send` fails (and records nothing).
    pub fail_sends: bool,
}

impl MockBus {
    /// Creates an empty mock bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for the controller to receive.
    pub fn queue(&mut self, event: BusEvent) {
        self.incoming.push_back(event);
    }

    /// Queue a complete config-data stream carrying `text`.
    pub fn queue_config_stream(&mut self, text: &str) {
        let mut padded = text.as_bytes().to_vec();
        while padded.len() % 8 != 0 {
            padded.push(0);
        }
        self.queue(BusEvent::ConfigStreamHeader {
            length: text.len() as u32,
            crc: crc16_ccitt(&padded),
        });
        for chunk in padded.chunks(8) {
            let mut data = [0u8; 8];
            data.copy_from_slice(chunk);
            self.queue(BusEvent::ConfigStreamData { data });
        }
    }

    /// Config-data requests sent so far.
    pub fn config_requests(&self) -> Vec<(DataType, String)> {
        self.sent
            .iter()
            .filter_map(|cmd| match cmd {
                BusCommand::ConfigDataRequest { kind, info } => Some((*kind, info.clone())),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded commands.
    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }
}

impl TrainboxBus for MockBus {
    type Error = ();

    fn send(&mut self, command: BusCommand) -> Result<(), ()> {
        if self.fail_sends {
            return Err(());
        }
        self.sent.push(command);
        Ok(())
    }

    fn try_recv(&mut self) -> Option<BusEvent> {
        self.incoming.pop_front()
    }
}

/// Mock station-protocol client side.
#[derive(Debug, Default)]
pub struct MockStation {
    /// Every message sent to clients, in order.
    pub sent: Vec<StationMessage>,
    /// Pending client requests for `try_recv`.
    pub incoming: VecDeque<ClientRequest>,
}

impl MockStation {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a client request.
    pub fn queue(&mut self, request: ClientRequest) {
        self.incoming.push_back(request);
    }

    /// Most recent message, if any.
    pub fn last(&self) -> Option<&StationMessage> {
        self.sent.last()
    }

    /// Forget recorded messages.
    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }
}

impl StationClients for MockStation {
    type Error = ();

    fn send(&mut self, message: StationMessage) -> Result<(), ()> {
        self.sent.push(message);
        Ok(())
    }

    fn try_recv(&mut self) -> Option<ClientRequest> {
        self.incoming.pop_front()
    }
}

// ============================================================================
// Storage Mock
// ============================================================================

/// In-memory preference store.
///
/// Tracks open/close pairing so tests can check that every `begin` is
/// matched by an `end`.
#[derive(Debug, Default)]
pub struct MockStore {
    entries: Vec<(String, String, Vec<u8>)>,
    open: Option<(String, bool)>,
    /// Number of `begin` calls that succeeded.
    pub begin_count: usize,
    /// Number of `end` calls.
    pub end_count: usize,
    /// When set, `begin` fails.
    pub fail_open: bool,
    /// When set, `put_bytes` writes nothing and reports zero bytes.
    pub fail_writes: bool,
    /// When set, `remove` fails.
    pub fail_removes: bool,
}

impl MockStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a namespace is open.
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Stored bytes, bypassing namespace handling.
    pub fn get_raw(&self, namespace: &str, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(ns, k, _)| ns == namespace && k == key)
            .map(|(_, _, v)| v.as_slice())
    }

    /// Store bytes, bypassing namespace handling.
    pub fn put_raw(&mut self, namespace: &str, key: &str, bytes: &[u8]) {
        self.entries.retain(|(ns, k, _)| !(ns == namespace && k == key));
        self.entries
            .push((namespace.to_string(), key.to_string(), bytes.to_vec()));
    }
}

impl PreferenceStore for MockStore {
    fn begin(&mut self, namespace: &str, read_only: bool) -> bool {
        if self.fail_open || self.open.is_some() {
            return false;
        }
        self.open = Some((namespace.to_string(), read_only));
        self.begin_count += 1;
        true
    }

    fn end(&mut self) {
        self.open = None;
        self.end_count += 1;
    }

    fn get_bytes(&mut self, key: &str) -> Option<Vec<u8>> {
        let (namespace, _) = self.open.as_ref()?;
        self.get_raw(namespace, key).map(<[u8]>::to_vec)
    }

    fn put_bytes(&mut self, key: &str, bytes: &[u8]) -> usize {
        let Some((namespace, read_only)) = self.open.clone() else {
            return 0;
        };
        if read_only || self.fail_writes {
            return 0;
        }
        self.put_raw(&namespace, key, bytes);
        bytes.len()
    }

    fn remove(&mut self, key: &str) -> bool {
        let Some((namespace, read_only)) = self.open.clone() else {
            return false;
        };
        if read_only || self.fail_removes {
            return false;
        }
        self.entries.retain(|(ns, k, _)| !(*ns == namespace && k == key));
        true
    }
}

// ============================================================================
// Time Mock
// ============================================================================

/// Mock clock for testing time-dependent behavior.
///
/// # Example
///
/// ```rust
/// use rs_trainbridge::hal::MockClock;
/// use rs_trainbridge::traits::Clock;
///
/// let mut clock = MockClock::new();
/// clock.set(1000);
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

// ============================================================================
// Roster Mock
// ============================================================================

#[derive(Debug, Default)]
struct RosterLog {
    chunks: Vec<String>,
    results: Vec<bool>,
}

/// Roster sink that records into a shared log.
///
/// Clones share the log, so a test keeps one clone and hands the other to
/// the controller.
///
/// ```rust
/// use rs_trainbridge::hal::RosterRecorder;
/// use rs_trainbridge::session::RosterSink;
///
/// let recorder = RosterRecorder::new();
/// let mut sink = recorder.clone();
/// sink.write("a");
/// sink.finished(true);
/// assert_eq!(recorder.text(), "a");
/// assert_eq!(recorder.results(), [true]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct RosterRecorder {
    log: Rc<RefCell<RosterLog>>,
}

impl RosterRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks written so far.
    pub fn chunks(&self) -> Vec<String> {
        self.log.borrow().chunks.clone()
    }

    /// All chunks concatenated.
    pub fn text(&self) -> String {
        self.log.borrow().chunks.concat()
    }

    /// Completion results, one per `finished` call.
    pub fn results(&self) -> Vec<bool> {
        self.log.borrow().results.clone()
    }
}

impl RosterSink for RosterRecorder {
    fn write(&mut self, chunk: &str) {
        self.log.borrow_mut().chunks.push(chunk.to_string());
    }

    fn finished(&mut self, success: bool) {
        self.log.borrow_mut().results.push(success);
    }
}
