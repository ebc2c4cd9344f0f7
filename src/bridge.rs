//! The bridge controller.
//!
//! [`BridgeController`] owns the registries, the roster session and the
//! three collaborators (bus, clients, store). It is driven from a
//! single-threaded main loop:
//!
//! 1. [`begin`](BridgeController::begin) once at start-up
//! 2. [`cyclic`](BridgeController::cyclic) on every tick
//!
//! `cyclic` drains both transports, dispatches each event to the matching
//! sink implementation, advances session timeouts and repeats discovery
//! pings while no trainbox has answered.
//!
//! # Example
//!
//! ```rust
//! use rs_trainbridge::BridgeController;
//! use rs_trainbridge::commands::{BusCommand, BusDirection};
//! use rs_trainbridge::config::BridgeConfig;
//! use rs_trainbridge::hal::{MockBus, MockStation, MockStore};
//! use rs_trainbridge::speed::StepConfig;
//! use rs_trainbridge::traits::ClientRequest;
//!
//! let mut bridge: BridgeController<_, _, _> = BridgeController::new(
//!     BridgeConfig::default(),
//!     MockBus::new(),
//!     MockStation::new(),
//!     MockStore::new(),
//! );
//! bridge.begin(0);
//! bridge.bus_mut().clear_sent();
//!
//! // Throttle on address 3 drives forward at step 10
//! bridge.clients_mut().queue(ClientRequest::LocoSpeed {
//!     address: 3,
//!     steps: StepConfig::Step128,
//!     speed: 0x80 | 11,
//! });
//! bridge.cyclic(10);
//!
//! assert_eq!(
//!     bridge.bus().sent,
//!     [
//!         BusCommand::LocoDirection { id: 3, direction: BusDirection::Forward },
//!         BusCommand::LocoSpeed { id: 3, speed: 78 },
//!     ]
//! );
//! ```

extern crate alloc;
use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, error, info, warn};

use crate::address::{
    accessory_from_bus, accessory_mode, accessory_to_bus, decoder_address, BusOffset, DecoderMode,
};
use crate::commands::{
    BusCommand, BusDirection, DiscoveryProtocol, FunctionSwitch, LocoInfo, LocoProtocol,
    PowerState, StationMessage, TurnoutPosition,
};
use crate::config::{BridgeConfig, DEFAULT_MAX_LOCOS, DEFAULT_MAX_TURNOUTS};
use crate::error::BridgeError;
use crate::registry::{LocoRecord, LocoRegistry, TurnoutRegistry, FUNCTION_COUNT};
use crate::session::{ConfigSession, RosterSink};
use crate::speed::{decode_client_speed, encode_bus_speed, SpeedCode, StepConfig};
use crate::stream::{ConfigDataAssembler, StreamOutcome};
use crate::traits::{
    BusEvent, BusEventSink, ClientEventSink, ClientRequest, PreferenceStore, StationClients,
    StoreGuard, TrainboxBus,
};

/// Hardware identifier of a trainbox (low nibble masked).
pub const HW_TRAINBOX: u16 = 0x0010;
/// Hardware identifier of a mobile station (low nibble masked).
pub const HW_MOBILE_STATION: u16 = 0x0030;

/// Track protocols MM2 + DCC.
pub const PROTOCOLS_NO_MFX: u8 = 0b101;
/// Track protocols MM2 + MFX + DCC.
pub const PROTOCOLS_ALL: u8 = 0b111;

/// Measurement channel: main track current.
pub const CHANNEL_CURRENT: u8 = 1;
/// Measurement channel: track voltage.
pub const CHANNEL_VOLTAGE: u8 = 3;
/// Measurement channel: temperature.
pub const CHANNEL_TEMPERATURE: u8 = 4;

/// Bus identifier used for programming-track access.
const PROGRAMMING_TRACK_ID: u32 = BusOffset::DCC + 1;
/// Motorola programming address.
const MM_PROGRAMMING_ID: u32 = 80;

/// System info reported while no trainbox is known.
const FALLBACK_SYSTEM_INFO: SystemStatus = SystemStatus {
    current_ma: 0,
    voltage_mv: 50_000,
    temperature: 0,
};

/// A mobile station that answered a ping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StationInfo {
    /// Bus hash.
    pub hash: u16,
    /// Device identifier.
    pub uid: u32,
    /// Software version.
    pub sw_version: u16,
    /// Hardware identifier.
    pub hw_ident: u16,
}

/// Latest trainbox measurements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SystemStatus {
    /// Main track current in mA.
    pub current_ma: i16,
    /// Track voltage in mV.
    pub voltage_mv: u16,
    /// Temperature in degrees Celsius.
    pub temperature: u16,
}

impl SystemStatus {
    fn message(&self) -> StationMessage {
        StationMessage::SystemInfo {
            current_ma: self.current_ma,
            voltage_mv: self.voltage_mv,
            temperature: self.temperature,
        }
    }
}

// ============================================================================
// Send helpers
// ============================================================================

fn send_bus<B: TrainboxBus>(bus: &mut B, command: BusCommand) -> bool {
    match bus.send(command) {
        Ok(()) => true,
        Err(e) => {
            warn!("bus send failed: {e:?}");
            false
        }
    }
}

fn send_clients<C: StationClients>(clients: &mut C, message: StationMessage) -> bool {
    match clients.send(message) {
        Ok(()) => true,
        Err(e) => {
            warn!("client send failed: {e:?}");
            false
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Bridge between station-protocol clients and the trainbox bus.
///
/// `LOCOS` and `TURNOUTS` bound the registries.
pub struct BridgeController<
    B,
    C,
    S,
    const LOCOS: usize = DEFAULT_MAX_LOCOS,
    const TURNOUTS: usize = DEFAULT_MAX_TURNOUTS,
> where
    B: TrainboxBus,
    C: StationClients,
    S: PreferenceStore,
{
    config: BridgeConfig,
    bus: B,
    clients: C,
    store: S,
    locos: LocoRegistry<LOCOS>,
    turnouts: TurnoutRegistry<TURNOUTS>,
    session: ConfigSession,
    assembler: ConfigDataAssembler,
    trainboxes: Vec<u32>,
    stations: Vec<StationInfo>,
    status: SystemStatus,
    discovery: String,
    pings_sent: u8,
    last_ping_ms: u64,
}

impl<B, C, S, const LOCOS: usize, const TURNOUTS: usize> BridgeController<B, C, S, LOCOS, TURNOUTS>
where
    B: TrainboxBus,
    C: StationClients,
    S: PreferenceStore,
{
    /// Create a controller. Nothing is sent until [`begin`](Self::begin).
    pub fn new(config: BridgeConfig, bus: B, clients: C, store: S) -> Self {
        if !config.addressing.is_valid() {
            warn!("address band thresholds are not ascending");
        }
        let session = ConfigSession::new(config.session.clone());
        let assembler = ConfigDataAssembler::new().with_max_length(config.session.max_stream_len);
        Self {
            config,
            bus,
            clients,
            store,
            locos: LocoRegistry::new(),
            turnouts: TurnoutRegistry::new(),
            session,
            assembler,
            trainboxes: Vec::new(),
            stations: Vec::new(),
            status: SystemStatus::default(),
            discovery: String::new(),
            pings_sent: 0,
            last_ping_ms: 0,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Active configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Bus transport.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Bus transport, mutable.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Client transport.
    pub fn clients(&self) -> &C {
        &self.clients
    }

    /// Client transport, mutable.
    pub fn clients_mut(&mut self) -> &mut C {
        &mut self.clients
    }

    /// Preference store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Preference store, mutable.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Locomotive registry.
    pub fn locos(&self) -> &LocoRegistry<LOCOS> {
        &self.locos
    }

    /// Turnout positions.
    pub fn turnouts(&self) -> &TurnoutRegistry<TURNOUTS> {
        &self.turnouts
    }

    /// Roster session.
    pub fn session(&self) -> &ConfigSession {
        &self.session
    }

    /// Trainboxes that answered a ping.
    pub fn trainboxes(&self) -> &[u32] {
        &self.trainboxes
    }

    /// Mobile stations that answered a ping.
    pub fn stations(&self) -> &[StationInfo] {
        &self.stations
    }

    /// Latest measurements.
    pub fn system_status(&self) -> SystemStatus {
        self.status
    }

    /// Result of the last locomotive discovery run.
    pub fn discovery_status(&self) -> &str {
        &self.discovery
    }

    // ------------------------------------------------------------------------
    // Main loop
    // ------------------------------------------------------------------------

    /// Load persisted loco modes and start looking for devices.
    pub fn begin(&mut self, now_ms: u64) {
        match self.load_loco_config() {
            Ok(count) => info!("{count} loco modes loaded"),
            Err(e) => warn!("loco modes not loaded: {e}"),
        }
        self.trainboxes.clear();
        self.stations.clear();
        self.pings_sent = 0;
        self.ping(now_ms);
    }

    /// Process pending traffic and timers.
    pub fn cyclic(&mut self, now_ms: u64) {
        while let Some(event) = self.bus.try_recv() {
            self.on_bus_event(event, now_ms);
        }
        while let Some(request) = self.clients.try_recv() {
            if let Some(reply) = self.on_client_request(request, now_ms) {
                send_clients(&mut self.clients, reply);
            }
        }
        self.session.poll(&mut self.bus, now_ms);

        if self.trainboxes.is_empty()
            && self.pings_sent > 0
            && self.pings_sent < self.config.station.ping_attempts
            && now_ms.saturating_sub(self.last_ping_ms) >= self.config.station.ping_interval_ms
        {
            self.ping(now_ms);
        }
    }

    fn ping(&mut self, now_ms: u64) {
        debug!("ping {}", self.pings_sent + 1);
        send_bus(&mut self.bus, BusCommand::Ping);
        self.pings_sent = self.pings_sent.saturating_add(1);
        self.last_ping_ms = now_ms;
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Download the loco roster from the handheld into `sink`.
    ///
    /// Returns `false` when a download is already running; `sink` then gets
    /// `finished(false)` immediately.
    pub fn fetch_roster<K: RosterSink + 'static>(&mut self, sink: K, now_ms: u64) -> bool {
        self.session.start(Box::new(sink), &mut self.bus, now_ms)
    }

    /// Start a locomotive discovery run.
    pub fn search_loco(&mut self, protocol: DiscoveryProtocol) -> bool {
        info!("searching locos ({protocol:?})");
        self.discovery = String::from("Searching");
        send_bus(&mut self.bus, BusCommand::LocoDiscovery { protocol })
    }

    /// Persist the modes of managed locomotives.
    pub fn save_loco_config(&mut self) -> Result<(), BridgeError> {
        let bytes = self.locos.encode_persisted(&self.config.addressing);
        let storage = &self.config.storage;
        let mut guard = StoreGuard::open(&mut self.store, &storage.namespace, false)?;
        let written = guard.put_bytes(&storage.loco_mode_key, &bytes);
        if written != bytes.len() {
            return Err(BridgeError::StorageWrite {
                written,
                expected: bytes.len(),
            });
        }
        debug!("{} loco mode bytes saved", written);
        Ok(())
    }

    /// Restore persisted loco modes. Returns the number of records loaded.
    pub fn load_loco_config(&mut self) -> Result<usize, BridgeError> {
        let storage = &self.config.storage;
        let mut guard = StoreGuard::open(&mut self.store, &storage.namespace, true)?;
        let Some(bytes) = guard.get_bytes(&storage.loco_mode_key) else {
            return Ok(0);
        };
        drop(guard);
        Ok(self.locos.load_persisted(&bytes, &self.config.addressing))
    }

    /// Remove persisted loco modes and forget every locomotive.
    pub fn delete_loco_config(&mut self) -> Result<(), BridgeError> {
        let storage = &self.config.storage;
        let mut guard = StoreGuard::open(&mut self.store, &storage.namespace, false)?;
        if !guard.remove(&storage.loco_mode_key) {
            return Err(BridgeError::StorageRemove(storage.loco_mode_key.clone()));
        }
        drop(guard);
        self.locos.clear();
        info!("loco configuration deleted");
        Ok(())
    }

    fn persist(&mut self) {
        if let Err(e) = self.save_loco_config() {
            warn!("loco modes not saved: {e}");
        }
    }

    /// Insert a record for an unknown address. Returns `true` if created.
    fn ensure_loco(&mut self, address: u16, mode: DecoderMode, steps: StepConfig) -> bool {
        if self.locos.find(address).is_some() {
            return false;
        }
        debug!("new loco {address}");
        self.locos
            .insert(LocoRecord::new(address, mode, steps, &self.config.addressing))
            .is_some()
    }

    fn notify_bus_matches<F>(&mut self, id: u32, mut update: F) -> bool
    where
        F: FnMut(&mut LocoRecord),
    {
        let infos: Vec<LocoInfo> = self
            .locos
            .by_bus_mut(id)
            .map(|record| {
                update(record);
                record.info()
            })
            .collect();
        if infos.is_empty() {
            debug!("no loco for bus id 0x{id:04X}");
            return false;
        }
        for info in infos {
            send_clients(&mut self.clients, StationMessage::LocoInfo(info));
        }
        true
    }

    // ------------------------------------------------------------------------
    // Client handlers
    // ------------------------------------------------------------------------

    fn set_power(&mut self, state: PowerState) -> Option<StationMessage> {
        let command = match state {
            PowerState::Normal => BusCommand::SystemGo { uid: 0 },
            PowerState::EmergencyStop => BusCommand::SystemHalt { uid: 0 },
            PowerState::TrackVoltageOff => BusCommand::SystemStop { uid: 0 },
            PowerState::ShortCircuit => {
                debug!("short circuit cannot be requested");
                return None;
            }
        };
        send_bus(&mut self.bus, command);
        Some(StationMessage::TrackPower(state))
    }

    fn system_info(&mut self) -> Option<StationMessage> {
        match self.trainboxes.first().copied() {
            Some(uid) => {
                for channel in [CHANNEL_CURRENT, CHANNEL_VOLTAGE, CHANNEL_TEMPERATURE] {
                    send_bus(&mut self.bus, BusCommand::SystemStatus { channel, uid });
                }
                None
            }
            None => Some(FALLBACK_SYSTEM_INFO.message()),
        }
    }

    fn loco_state(&mut self, address: u16) -> Option<StationMessage> {
        if self.ensure_loco(address, DecoderMode::Motorola, StepConfig::Step128) {
            self.persist();
        }
        self.locos
            .find(address)
            .map(|record| StationMessage::LocoInfo(record.info()))
    }

    fn loco_speed(&mut self, address: u16, steps: StepConfig, speed: u8, now_ms: u64) {
        let mut dirty = self.ensure_loco(address, DecoderMode::Motorola, steps);
        let Some(record) = self.locos.find_mut(address) else {
            return;
        };
        dirty |= record.set_steps(steps);

        let id = record.bus_address;
        if record.mode == DecoderMode::Dcc && id >= BusOffset::DCC && !record.protocol_announced {
            let long = decoder_address(id) >= self.config.addressing.long_dcc_address_start;
            let protocol = LocoProtocol::for_dcc(long, record.data.steps);
            debug!("loco {address}: announcing {protocol:?}");
            send_bus(&mut self.bus, BusCommand::LocoDataProtocol { id, protocol });
            record.protocol_announced = true;
        }

        match decode_client_speed(speed & 0x7F, record.data.steps) {
            SpeedCode::EmergencyStop => {
                send_bus(&mut self.bus, BusCommand::LocoEmergencyStop { id });
            }
            SpeedCode::Step(step) => {
                let interval = self.config.station.min_speed_interval_ms;
                if record.speed_acknowledged || record.last_speed_ms.saturating_add(interval) < now_ms {
                    record.last_speed_ms = now_ms;
                    record.speed_acknowledged = false;
                    let direction = if speed & 0x80 != 0 {
                        BusDirection::Forward
                    } else {
                        BusDirection::Reverse
                    };
                    let normalized = record.data.steps.to_normalized(step);
                    send_bus(&mut self.bus, BusCommand::LocoDirection { id, direction });
                    send_bus(&mut self.bus, BusCommand::LocoSpeed { id, speed: normalized });
                } else {
                    debug!("loco {address}: speed throttled");
                }
            }
        }

        if dirty {
            self.persist();
        }
    }

    fn loco_function(&mut self, address: u16, function: u8, switch: FunctionSwitch) {
        if self.ensure_loco(address, DecoderMode::Motorola, StepConfig::Step128) {
            self.persist();
        }
        let Some(record) = self.locos.find(address) else {
            return;
        };
        let current = match record.data.function(function) {
            Ok(on) => on,
            Err(e) => {
                error!("loco {address}: {e}");
                return;
            }
        };
        let on = match switch {
            FunctionSwitch::Off => false,
            FunctionSwitch::On => true,
            FunctionSwitch::Toggle => !current,
        };
        let id = record.bus_address;
        send_bus(
            &mut self.bus,
            BusCommand::LocoFunction {
                id,
                function,
                value: u8::from(on),
            },
        );
    }

    fn set_loco_mode(&mut self, address: u16, mode: DecoderMode) {
        let cfg = &self.config.addressing;
        let changed = match self.locos.find_mut(address) {
            Some(record) => record.set_mode(mode, cfg),
            None => self
                .locos
                .insert(LocoRecord::new(address, mode, StepConfig::Step128, cfg))
                .is_some(),
        };
        if changed {
            info!("loco {address} now {mode:?}");
            self.persist();
        }
    }

    fn accessory(&mut self, address: u16, output: u8, active: bool) {
        self.turnouts.set(address, TurnoutPosition::from_output(output));
        let id = accessory_to_bus(address, &self.config.addressing);
        send_bus(
            &mut self.bus,
            BusCommand::Accessory {
                id,
                position: output,
                power: u8::from(active),
            },
        );
    }

    fn cv_read(&mut self, cv: u16) -> Option<StationMessage> {
        if !self.config.station.programming_enabled {
            return Some(StationMessage::CvNack);
        }
        send_bus(
            &mut self.bus,
            BusCommand::ReadConfig {
                id: PROGRAMMING_TRACK_ID,
                cv: cv.saturating_add(1),
                count: 1,
            },
        );
        None
    }

    /// Programming-track write, or an echo of the value when disabled.
    fn direct_write(&mut self, id: u32, cv: u16, value: u8) -> Option<StationMessage> {
        if !self.config.station.programming_enabled {
            return Some(StationMessage::CvResult { cv, value });
        }
        send_bus(
            &mut self.bus,
            BusCommand::WriteConfig {
                id,
                cv: cv.saturating_add(1),
                value,
                direct: true,
                verify: false,
            },
        );
        None
    }

    fn pom_write(&mut self, address: u16, cv: u16, value: u8) -> Option<StationMessage> {
        if !self.config.station.programming_enabled {
            return Some(StationMessage::CvResult { cv, value });
        }
        let Some(record) = self.locos.find(address) else {
            warn!("POM write to unknown loco {address}");
            return Some(StationMessage::CvNack);
        };
        let id = record.bus_address;
        send_bus(
            &mut self.bus,
            BusCommand::WriteConfig {
                id,
                cv: cv.saturating_add(1),
                value,
                direct: false,
                verify: true,
            },
        );
        None
    }

    fn pom_read(&mut self, address: u16, cv: u16) -> Option<StationMessage> {
        let id = match self.locos.find(address) {
            Some(record) if self.config.station.programming_enabled => record.bus_address,
            _ => return Some(StationMessage::CvNack),
        };
        send_bus(&mut self.bus, BusCommand::ReadConfig { id, cv: cv.saturating_add(1), count: 1 });
        None
    }

    // ------------------------------------------------------------------------
    // Bus handlers
    // ------------------------------------------------------------------------

    fn on_ping(&mut self, hash: u16, uid: u32, sw_version: u16, hw_ident: u16) {
        match hw_ident & 0xFFF0 {
            HW_TRAINBOX => {
                if self.trainboxes.contains(&uid) {
                    return;
                }
                info!("trainbox 0x{uid:08X} (hw 0x{hw_ident:04X}, sw 0x{sw_version:04X})");
                self.trainboxes.push(uid);
                if self.stations.is_empty() {
                    send_bus(&mut self.bus, BusCommand::TrackProtocol { protocols: PROTOCOLS_NO_MFX, uid });
                    send_bus(&mut self.bus, BusCommand::TrackProtocol { protocols: PROTOCOLS_NO_MFX, uid: 0 });
                }
            }
            HW_MOBILE_STATION => {
                if self.stations.iter().any(|s| s.uid == uid) {
                    return;
                }
                info!("mobile station 0x{uid:08X} (hash 0x{hash:04X}, sw 0x{sw_version:04X})");
                self.stations.push(StationInfo {
                    hash,
                    uid,
                    sw_version,
                    hw_ident,
                });
                if let Some(&box_uid) = self.trainboxes.first() {
                    send_bus(&mut self.bus, BusCommand::TrackProtocol { protocols: PROTOCOLS_ALL, uid: box_uid });
                    send_bus(&mut self.bus, BusCommand::TrackProtocol { protocols: PROTOCOLS_ALL, uid: 0 });
                }
            }
            _ => debug!("ping from 0x{uid:08X} (hw 0x{hw_ident:04X})"),
        }
    }

    fn on_system_status(&mut self, channel: u8, value: u16) -> bool {
        match channel {
            CHANNEL_CURRENT => {
                let ma = (i32::from(value) - 0x0F) * 10;
                self.status.current_ma = ma.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
            }
            CHANNEL_VOLTAGE => self.status.voltage_mv = value.saturating_mul(10),
            CHANNEL_TEMPERATURE => {
                self.status.temperature = value;
                send_clients(&mut self.clients, self.status.message());
            }
            _ => {
                debug!("status channel {channel}: {value}");
                return false;
            }
        }
        true
    }

    fn on_config_stream(&mut self, outcome: StreamOutcome, now_ms: u64) {
        match outcome {
            StreamOutcome::Pending => {}
            StreamOutcome::Complete(text) => {
                self.session.on_response(Some(&text), &mut self.bus, now_ms)
            }
            StreamOutcome::Failed(BridgeError::UnexpectedChunk) => {
                debug!("config data without header ignored")
            }
            StreamOutcome::Failed(e) => {
                warn!("config stream failed: {e}");
                self.session.on_response(None, &mut self.bus, now_ms);
            }
        }
    }
}

// ============================================================================
// Event sinks
// ============================================================================

impl<B, C, S, const LOCOS: usize, const TURNOUTS: usize> BusEventSink
    for BridgeController<B, C, S, LOCOS, TURNOUTS>
where
    B: TrainboxBus,
    C: StationClients,
    S: PreferenceStore,
{
    fn on_bus_event(&mut self, event: BusEvent, now_ms: u64) -> bool {
        match event {
            BusEvent::SystemStop { .. } => {
                send_clients(&mut self.clients, StationMessage::TrackPower(PowerState::TrackVoltageOff))
            }
            BusEvent::SystemGo { .. } => {
                send_clients(&mut self.clients, StationMessage::TrackPower(PowerState::Normal))
            }
            BusEvent::SystemHalt { .. } => {
                send_clients(&mut self.clients, StationMessage::TrackPower(PowerState::EmergencyStop))
            }
            BusEvent::SystemOverload { channel, .. } => {
                warn!("overload on channel {channel}");
                send_clients(&mut self.clients, StationMessage::TrackPower(PowerState::ShortCircuit))
            }
            BusEvent::SystemStatus { channel, value, .. } => self.on_system_status(channel, value),
            BusEvent::LocoStop { id } => {
                self.notify_bus_matches(id, |record| record.data.set_speed_code(0x01))
            }
            BusEvent::LocoSpeed { id, speed } => self.notify_bus_matches(id, |record| {
                record.speed_acknowledged = true;
                let steps = record.data.steps;
                let code = encode_bus_speed(steps.from_normalized(speed), steps);
                record.data.set_speed_code(code);
            }),
            BusEvent::LocoDirection { id, direction } => {
                self.notify_bus_matches(id, |record| match direction {
                    BusDirection::Forward => record.data.set_forward(true),
                    BusDirection::Reverse => record.data.set_forward(false),
                    BusDirection::Toggle => {
                        let forward = record.data.is_forward();
                        record.data.set_forward(!forward);
                    }
                    BusDirection::Keep => {}
                })
            }
            BusEvent::LocoFunction { id, function, value } => {
                if function >= FUNCTION_COUNT {
                    error!("bus id 0x{id:04X}: {}", BridgeError::FunctionOutOfRange(function));
                    return false;
                }
                self.notify_bus_matches(id, |record| {
                    if let Err(e) = record.data.set_function(function, value != 0) {
                        error!("bus id 0x{id:04X}: {e}");
                    }
                })
            }
            BusEvent::ReadConfig { cv, value, success, .. }
            | BusEvent::WriteConfig { cv, value, success, .. } => {
                let reply = if success {
                    StationMessage::CvResult {
                        cv: cv.saturating_sub(1),
                        value,
                    }
                } else {
                    StationMessage::CvNack
                };
                send_clients(&mut self.clients, reply)
            }
            BusEvent::AccessorySwitch { id, position, .. } => {
                let address = accessory_from_bus(id, &self.config.addressing);
                let position = TurnoutPosition::from_output(position);
                self.turnouts.set(address, position);
                send_clients(&mut self.clients, StationMessage::TurnoutInfo { address, position })
            }
            BusEvent::Ping {
                hash,
                uid,
                sw_version,
                hw_ident,
            } => {
                self.on_ping(hash, uid, sw_version, hw_ident);
                true
            }
            BusEvent::LocoDiscovery { uid, protocol } => {
                match uid {
                    Some(uid) if uid < 0xFFFF => {
                        info!("discovery ({protocol}) found {uid}");
                        self.discovery = format!("Found {uid}");
                    }
                    Some(uid) => debug!("discovery ({protocol}) returned 0x{uid:X}"),
                    None => {
                        info!("discovery ({protocol}) found nothing");
                        self.discovery = String::from("Found Nothing");
                    }
                }
                true
            }
            BusEvent::MfxBind { uid, sid } => {
                info!("mfx 0x{uid:08X} bound to {sid}");
                self.discovery = format!("Bound {uid} to {sid}");
                true
            }
            BusEvent::MfxVerify { uid, sid } => {
                info!("mfx 0x{uid:08X} verified with {sid}");
                true
            }
            BusEvent::ConfigStreamHeader { length, crc } => {
                let outcome = self.assembler.on_header(length, crc);
                self.on_config_stream(outcome, now_ms);
                true
            }
            BusEvent::ConfigStreamData { data } => {
                let outcome = self.assembler.on_chunk(&data);
                self.on_config_stream(outcome, now_ms);
                true
            }
            BusEvent::ConfigStreamError => {
                warn!("config stream aborted by sender");
                self.assembler.reset();
                self.session.on_response(None, &mut self.bus, now_ms);
                true
            }
        }
    }
}

impl<B, C, S, const LOCOS: usize, const TURNOUTS: usize> ClientEventSink
    for BridgeController<B, C, S, LOCOS, TURNOUTS>
where
    B: TrainboxBus,
    C: StationClients,
    S: PreferenceStore,
{
    fn on_client_request(&mut self, request: ClientRequest, now_ms: u64) -> Option<StationMessage> {
        match request {
            ClientRequest::SetPower(state) => self.set_power(state),
            ClientRequest::GetSystemInfo => self.system_info(),
            ClientRequest::GetLocoState { address } => self.loco_state(address),
            ClientRequest::LocoSpeed {
                address,
                steps,
                speed,
            } => {
                self.loco_speed(address, steps, speed, now_ms);
                None
            }
            ClientRequest::LocoFunction {
                address,
                function,
                switch,
            } => {
                self.loco_function(address, function, switch);
                None
            }
            ClientRequest::GetLocoMode { address } => Some(StationMessage::LocoMode {
                address,
                mode: self.locos.find(address).map(|r| r.mode).unwrap_or_default(),
            }),
            ClientRequest::SetLocoMode { address, mode } => {
                self.set_loco_mode(address, mode);
                None
            }
            ClientRequest::GetTurnoutMode { address } => Some(StationMessage::TurnoutMode {
                address,
                mode: accessory_mode(address, &self.config.addressing),
            }),
            ClientRequest::SetTurnoutMode { address, mode } => {
                debug!("turnout {address} mode {mode:?} ignored, mode follows address");
                None
            }
            ClientRequest::Accessory {
                address,
                output,
                active,
            } => {
                self.accessory(address, output, active);
                None
            }
            ClientRequest::GetAccessoryInfo { address } => Some(StationMessage::TurnoutInfo {
                address,
                position: self.turnouts.get(address),
            }),
            ClientRequest::CvRead { cv } => self.cv_read(cv),
            ClientRequest::CvWrite { cv, value } => self.direct_write(PROGRAMMING_TRACK_ID, cv, value),
            ClientRequest::MmWrite { register, value } => {
                self.direct_write(MM_PROGRAMMING_ID, register, value)
            }
            ClientRequest::DccWrite { register, value } => {
                self.direct_write(PROGRAMMING_TRACK_ID, register, value)
            }
            ClientRequest::DccRead { .. } => Some(StationMessage::CvNack),
            ClientRequest::PomWriteByte { address, cv, value } => self.pom_write(address, cv, value),
            ClientRequest::PomWriteBit { address, cv, bit, value } => {
                if self.config.station.programming_enabled {
                    warn!("POM bit write to loco {address} cv {cv} not supported");
                    Some(StationMessage::CvNack)
                } else {
                    let value = u8::from(value) << (bit & 0x07);
                    Some(StationMessage::CvResult { cv, value })
                }
            }
            ClientRequest::PomReadByte { address, cv } => self.pom_read(address, cv),
        }
    }
}
