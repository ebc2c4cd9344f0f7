//! Station-protocol side of the bridge.
//!
//! A [`StationClients`] implementation owns the UDP socket and the client
//! list: it decodes datagrams into [`ClientRequest`]s and encodes
//! [`StationMessage`]s for the clients that should see them.
//!
//! Requests that expect an answer get it as the return value of
//! [`ClientEventSink::on_client_request`]; the caller sends it back.

use crate::address::DecoderMode;
use crate::commands::{FunctionSwitch, PowerState, StationMessage};
use crate::speed::StepConfig;

/// Transport for station-protocol clients.
pub trait StationClients {
    /// Transport error.
    type Error: core::fmt::Debug;

    /// Send a reply or broadcast.
    fn send(&mut self, message: StationMessage) -> Result<(), Self::Error>;

    /// Next decoded client request, if any (non-blocking).
    fn try_recv(&mut self) -> Option<ClientRequest>;
}

/// Decoded request from a station-protocol client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientRequest {
    /// Change track power.
    SetPower(PowerState),
    /// Ask for current, voltage and temperature.
    GetSystemInfo,
    /// Ask for a locomotive's state block.
    GetLocoState {
        /// Client address.
        address: u16,
    },
    /// Drive a locomotive.
    LocoSpeed {
        /// Client address.
        address: u16,
        /// Step configuration the client drives with.
        steps: StepConfig,
        /// Direction bit and speed code.
        speed: u8,
    },
    /// Switch a locomotive function.
    LocoFunction {
        /// Client address.
        address: u16,
        /// Function index.
        function: u8,
        /// Off, on or toggle.
        switch: FunctionSwitch,
    },
    /// Ask for a locomotive's decoder mode.
    GetLocoMode {
        /// Client address.
        address: u16,
    },
    /// Change a locomotive's decoder mode.
    SetLocoMode {
        /// Client address.
        address: u16,
        /// New mode.
        mode: DecoderMode,
    },
    /// Ask for an accessory's decoder mode.
    GetTurnoutMode {
        /// Client address.
        address: u16,
    },
    /// Change an accessory's decoder mode.
    SetTurnoutMode {
        /// Client address.
        address: u16,
        /// Requested mode.
        mode: DecoderMode,
    },
    /// Switch an accessory output.
    Accessory {
        /// Client address.
        address: u16,
        /// Output index (0 straight, 1 thrown).
        output: u8,
        /// Energize (true) or release the output.
        active: bool,
    },
    /// Ask for an accessory's position.
    GetAccessoryInfo {
        /// Client address.
        address: u16,
    },
    /// Read a CV on the programming track.
    CvRead {
        /// 0-based CV number.
        cv: u16,
    },
    /// Write a CV on the programming track.
    CvWrite {
        /// 0-based CV number.
        cv: u16,
        /// New value.
        value: u8,
    },
    /// Write a Motorola register.
    MmWrite {
        /// 0-based register.
        register: u16,
        /// New value.
        value: u8,
    },
    /// Write a DCC register.
    DccWrite {
        /// 0-based register.
        register: u16,
        /// New value.
        value: u8,
    },
    /// Read a DCC register.
    DccRead {
        /// 0-based register.
        register: u16,
    },
    /// Programming on main: write a byte.
    PomWriteByte {
        /// Client address.
        address: u16,
        /// 0-based CV number.
        cv: u16,
        /// New value.
        value: u8,
    },
    /// Programming on main: write a bit.
    PomWriteBit {
        /// Client address.
        address: u16,
        /// 0-based CV number.
        cv: u16,
        /// Bit index.
        bit: u8,
        /// Bit value.
        value: bool,
    },
    /// Programming on main: read a byte.
    PomReadByte {
        /// Client address.
        address: u16,
        /// 0-based CV number.
        cv: u16,
    },
}

/// Receiver of decoded client requests.
pub trait ClientEventSink {
    /// Handle one request, returning the reply to send, if any.
    fn on_client_request(&mut self, request: ClientRequest, now_ms: u64) -> Option<StationMessage>;
}
