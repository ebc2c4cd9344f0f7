//! Trainbox side of the bridge.
//!
//! A [`TrainboxBus`] implementation owns the CAN interface: it encodes
//! [`BusCommand`]s into frames and decodes received frames into
//! [`BusEvent`]s. The controller drains events with
//! [`try_recv`](TrainboxBus::try_recv) from its cyclic tick and hands each
//! one to its [`BusEventSink`] implementation.
//!
//! Like the station side, the trait is sync-first: `send` may block briefly
//! on a microcontroller, `try_recv` must never block.

use crate::commands::{BusCommand, BusDirection};

/// Transport for the trainbox CAN bus.
pub trait TrainboxBus {
    /// Transport error.
    type Error: core::fmt::Debug;

    /// Send one command.
    fn send(&mut self, command: BusCommand) -> Result<(), Self::Error>;

    /// Next decoded event, if any (non-blocking).
    fn try_recv(&mut self) -> Option<BusEvent>;
}

/// Decoded frame received from the bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusEvent {
    /// Track power switched off.
    SystemStop {
        /// Reporting device.
        uid: u32,
    },
    /// Track power switched on.
    SystemGo {
        /// Reporting device.
        uid: u32,
    },
    /// All locomotives halted.
    SystemHalt {
        /// Reporting device.
        uid: u32,
    },
    /// Booster overload on a channel.
    SystemOverload {
        /// Reporting device.
        uid: u32,
        /// Overloaded channel.
        channel: u8,
    },
    /// Measurement value.
    SystemStatus {
        /// Reporting device.
        uid: u32,
        /// Measurement channel.
        channel: u8,
        /// Raw value.
        value: u16,
    },
    /// A locomotive was emergency stopped.
    LocoStop {
        /// Bus identifier.
        id: u32,
    },
    /// A locomotive's speed changed (0-1000).
    LocoSpeed {
        /// Bus identifier.
        id: u32,
        /// Normalized speed.
        speed: u16,
    },
    /// A locomotive's direction changed.
    LocoDirection {
        /// Bus identifier.
        id: u32,
        /// New direction.
        direction: BusDirection,
    },
    /// A locomotive function was switched.
    LocoFunction {
        /// Bus identifier.
        id: u32,
        /// Function index.
        function: u8,
        /// 0 off, anything else on.
        value: u8,
    },
    /// Result of a CV read.
    ReadConfig {
        /// Bus identifier.
        id: u32,
        /// 1-based CV number.
        cv: u16,
        /// CV value.
        value: u8,
        /// The decoder answered.
        success: bool,
    },
    /// Result of a CV write.
    WriteConfig {
        /// Bus identifier.
        id: u32,
        /// 1-based CV number.
        cv: u16,
        /// Value written.
        value: u8,
        /// The write completed.
        success: bool,
        /// The value was read back successfully.
        verified: bool,
    },
    /// An accessory output was switched.
    AccessorySwitch {
        /// Bus identifier.
        id: u32,
        /// Output index.
        position: u8,
        /// Output energized.
        power: u8,
    },
    /// A device answered a ping.
    Ping {
        /// Sender hash.
        hash: u16,
        /// Device identifier.
        uid: u32,
        /// Software version.
        sw_version: u16,
        /// Hardware identifier.
        hw_ident: u16,
    },
    /// Result of a locomotive discovery run.
    LocoDiscovery {
        /// Found decoder, `None` when nothing was found.
        uid: Option<u32>,
        /// Searched protocol.
        protocol: u8,
    },
    /// MFX decoder bound to a session id.
    MfxBind {
        /// Decoder identifier.
        uid: u32,
        /// Assigned session id.
        sid: u16,
    },
    /// MFX bind verification.
    MfxVerify {
        /// Decoder identifier.
        uid: u32,
        /// Session id.
        sid: u16,
    },
    /// Start of a config-data stream.
    ConfigStreamHeader {
        /// Payload length in bytes.
        length: u32,
        /// CRC-16/CCITT of the padded payload.
        crc: u16,
    },
    /// One 8-byte payload frame.
    ConfigStreamData {
        /// Payload bytes.
        data: [u8; 8],
    },
    /// The sender aborted the stream.
    ConfigStreamError,
}

/// Receiver of decoded bus events.
pub trait BusEventSink {
    /// Handle one event. Returns `false` when the event was ignored.
    fn on_bus_event(&mut self, event: BusEvent, now_ms: u64) -> bool;
}
