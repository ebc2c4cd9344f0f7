//! Outbound command types.
//!
//! The controller never touches a wire format. Everything it wants to say
//! is expressed as a value of one of two enums:
//!
//! - [`BusCommand`]: frames for the trainbox side (CAN bus)
//! - [`StationMessage`]: replies and broadcasts for station-protocol clients
//!
//! Transport implementations ([`TrainboxBus`], [`StationClients`]) encode
//! them. The mocks in [`crate::hal`] simply record them, which makes the
//! controller's behaviour directly assertable.
//!
//! # Example
//!
//! ```rust
//! use rs_trainbridge::commands::{BusCommand, BusDirection};
//!
//! let cmd = BusCommand::LocoDirection { id: 0xC003, direction: BusDirection::Reverse };
//! assert_eq!(cmd.target(), Some(0xC003));
//! ```
//!
//! [`TrainboxBus`]: crate::traits::TrainboxBus
//! [`StationClients`]: crate::traits::StationClients

extern crate alloc;
use alloc::string::String;

use crate::address::DecoderMode;
use crate::speed::StepConfig;
use crate::stream::DataType;

// ============================================================================
// Shared value types
// ============================================================================

/// Track power state as seen by station-protocol clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PowerState {
    /// Track powered, trains may run.
    Normal,
    /// All locomotives stopped, track still powered.
    EmergencyStop,
    /// Track voltage switched off.
    #[default]
    TrackVoltageOff,
    /// Booster reported a short circuit.
    ShortCircuit,
}

/// Direction field of a bus direction frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BusDirection {
    /// Leave the direction unchanged.
    Keep = 0,
    /// Drive forward.
    Forward = 1,
    /// Drive in reverse.
    Reverse = 2,
    /// Flip the current direction.
    Toggle = 3,
}

impl BusDirection {
    /// Wire code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parse a wire code (low two bits).
    pub const fn from_code(code: u8) -> Self {
        match code & 0x03 {
            1 => BusDirection::Forward,
            2 => BusDirection::Reverse,
            3 => BusDirection::Toggle,
            _ => BusDirection::Keep,
        }
    }
}

/// DCC data protocol announced before driving a locomotive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LocoProtocol {
    /// Short address, 28 steps.
    DccShort28 = 0,
    /// Short address, 14 steps.
    DccShort14 = 1,
    /// Short address, 128 steps.
    DccShort128 = 2,
    /// Long address, 28 steps.
    DccLong28 = 3,
    /// Long address, 128 steps.
    DccLong128 = 4,
}

impl LocoProtocol {
    /// Protocol for a DCC decoder address and step configuration.
    ///
    /// Long addresses have no 14-step variant and fall back to 28 steps.
    pub fn for_dcc(long_address: bool, steps: StepConfig) -> Self {
        match (long_address, steps) {
            (false, StepConfig::Step14) => LocoProtocol::DccShort14,
            (false, StepConfig::Step28) => LocoProtocol::DccShort28,
            (false, StepConfig::Step128) => LocoProtocol::DccShort128,
            (true, StepConfig::Step128) => LocoProtocol::DccLong128,
            (true, _) => LocoProtocol::DccLong28,
        }
    }

    /// Wire code.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Decoder family searched by a discovery run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiscoveryProtocol {
    /// MFX decoders.
    Mfx = 32,
    /// Motorola decoders, 20 kHz.
    Mm2Fast = 33,
    /// Motorola decoders, 40 kHz.
    Mm2Slow = 34,
    /// DCC short addresses.
    DccShort = 35,
    /// DCC long addresses.
    DccLong = 36,
}

impl DiscoveryProtocol {
    /// Wire code.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// How a client function request changes a function bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FunctionSwitch {
    /// Switch off.
    Off = 0,
    /// Switch on.
    On = 1,
    /// Invert the current state.
    Toggle = 2,
}

impl FunctionSwitch {
    /// Parse the two-bit switch type of a client function request.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code & 0x03 {
            0 => Some(FunctionSwitch::Off),
            1 => Some(FunctionSwitch::On),
            2 => Some(FunctionSwitch::Toggle),
            _ => None,
        }
    }
}

/// Position of a turnout or other two-way accessory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TurnoutPosition {
    /// Never switched since start-up.
    #[default]
    Unknown = 0,
    /// Output 0 (straight / red).
    Straight = 1,
    /// Output 1 (thrown / green).
    Thrown = 2,
}

impl TurnoutPosition {
    /// Station-protocol code (0 unknown, 1 straight, 2 thrown).
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Position from a bus or client output index (0 straight, else thrown).
    pub const fn from_output(output: u8) -> Self {
        if output == 0 {
            TurnoutPosition::Straight
        } else {
            TurnoutPosition::Thrown
        }
    }
}

/// Locomotive state block reported to clients.
///
/// `speed` carries the direction in bit 7 (set = forward) and the
/// station-protocol speed code in bits 0-6. `functions` holds functions
/// 0-31 in the station-protocol byte layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocoInfo {
    /// Client address.
    pub address: u16,
    /// Speed step configuration.
    pub steps: StepConfig,
    /// Direction bit and speed code.
    pub speed: u8,
    /// Function bytes.
    pub functions: [u8; 5],
}

impl LocoInfo {
    /// True when the direction bit says forward.
    pub fn is_forward(&self) -> bool {
        self.speed & 0x80 != 0
    }

    /// Speed code without the direction bit.
    pub fn speed_code(&self) -> u8 {
        self.speed & 0x7F
    }
}

// ============================================================================
// Bus commands
// ============================================================================

/// Frame sent towards the trainbox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusCommand {
    /// Switch track power on.
    SystemGo {
        /// Target device, 0 for all.
        uid: u32,
    },
    /// Switch track power off.
    SystemStop {
        /// Target device, 0 for all.
        uid: u32,
    },
    /// Stop all locomotives, keep power on.
    SystemHalt {
        /// Target device, 0 for all.
        uid: u32,
    },
    /// Stop one locomotive immediately.
    LocoEmergencyStop {
        /// Bus identifier.
        id: u32,
    },
    /// Announce the DCC data protocol of a locomotive.
    LocoDataProtocol {
        /// Bus identifier.
        id: u32,
        /// Protocol variant.
        protocol: LocoProtocol,
    },
    /// Set a locomotive's normalized speed (0-1000).
    LocoSpeed {
        /// Bus identifier.
        id: u32,
        /// Normalized speed.
        speed: u16,
    },
    /// Set a locomotive's direction.
    LocoDirection {
        /// Bus identifier.
        id: u32,
        /// New direction.
        direction: BusDirection,
    },
    /// Switch a locomotive function.
    LocoFunction {
        /// Bus identifier.
        id: u32,
        /// Function index.
        function: u8,
        /// 0 off, 1 on.
        value: u8,
    },
    /// Switch an accessory output.
    Accessory {
        /// Bus identifier.
        id: u32,
        /// Output index.
        position: u8,
        /// 1 to energize the output.
        power: u8,
    },
    /// Ask all devices to identify themselves.
    Ping,
    /// Enable track protocols (bitmask: MM2, MFX, DCC).
    TrackProtocol {
        /// Protocol bitmask.
        protocols: u8,
        /// Target device.
        uid: u32,
    },
    /// Request a measurement channel.
    SystemStatus {
        /// Measurement channel.
        channel: u8,
        /// Target device.
        uid: u32,
    },
    /// Read configuration variables.
    ReadConfig {
        /// Bus identifier.
        id: u32,
        /// 1-based CV number.
        cv: u16,
        /// Number of CVs.
        count: u8,
    },
    /// Write one configuration variable.
    WriteConfig {
        /// Bus identifier.
        id: u32,
        /// 1-based CV number.
        cv: u16,
        /// New value.
        value: u8,
        /// Programming track (true) or programming on main.
        direct: bool,
        /// Read back after writing.
        verify: bool,
    },
    /// Start a locomotive discovery run.
    LocoDiscovery {
        /// Decoder family.
        protocol: DiscoveryProtocol,
    },
    /// Request a config-data stream.
    ConfigDataRequest {
        /// Blob kind.
        kind: DataType,
        /// Request argument (loco name, page range or empty).
        info: String,
    },
}

impl BusCommand {
    /// Bus identifier the command is addressed to, if any.
    pub fn target(&self) -> Option<u32> {
        match *self {
            BusCommand::LocoEmergencyStop { id }
            | BusCommand::LocoDataProtocol { id, .. }
            | BusCommand::LocoSpeed { id, .. }
            | BusCommand::LocoDirection { id, .. }
            | BusCommand::LocoFunction { id, .. }
            | BusCommand::Accessory { id, .. }
            | BusCommand::ReadConfig { id, .. }
            | BusCommand::WriteConfig { id, .. } => Some(id),
            _ => None,
        }
    }
}

// ============================================================================
// Station messages
// ============================================================================

/// Reply or broadcast sent to station-protocol clients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StationMessage {
    /// Track power changed.
    TrackPower(PowerState),
    /// Locomotive state.
    LocoInfo(LocoInfo),
    /// Decoder mode of a locomotive address.
    LocoMode {
        /// Client address.
        address: u16,
        /// Current mode.
        mode: DecoderMode,
    },
    /// Decoder mode of an accessory address.
    TurnoutMode {
        /// Client address.
        address: u16,
        /// Current mode.
        mode: DecoderMode,
    },
    /// Accessory position.
    TurnoutInfo {
        /// Client address.
        address: u16,
        /// Last known position.
        position: TurnoutPosition,
    },
    /// Measurement summary.
    SystemInfo {
        /// Main track current in mA.
        current_ma: i16,
        /// Track voltage in mV.
        voltage_mv: u16,
        /// Temperature in degrees Celsius.
        temperature: u16,
    },
    /// CV read or write result.
    CvResult {
        /// 0-based CV number.
        cv: u16,
        /// CV value.
        value: u8,
    },
    /// CV access failed.
    CvNack,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_direction_codes() {
        assert_eq!(BusDirection::from_code(1), BusDirection::Forward);
        assert_eq!(BusDirection::from_code(2), BusDirection::Reverse);
        assert_eq!(BusDirection::from_code(0), BusDirection::Keep);
        assert_eq!(BusDirection::from_code(7), BusDirection::Toggle);
        assert_eq!(BusDirection::Reverse.code(), 2);
    }

    #[test]
    fn dcc_protocol_selection() {
        assert_eq!(LocoProtocol::for_dcc(false, StepConfig::Step128), LocoProtocol::DccShort128);
        assert_eq!(LocoProtocol::for_dcc(false, StepConfig::Step14), LocoProtocol::DccShort14);
        assert_eq!(LocoProtocol::for_dcc(true, StepConfig::Step128), LocoProtocol::DccLong128);
        assert_eq!(LocoProtocol::for_dcc(true, StepConfig::Step14), LocoProtocol::DccLong28);
    }

    #[test]
    fn function_switch_codes() {
        assert_eq!(FunctionSwitch::from_code(0), Some(FunctionSwitch::Off));
        assert_eq!(FunctionSwitch::from_code(2), Some(FunctionSwitch::Toggle));
        assert_eq!(FunctionSwitch::from_code(3), None);
    }

    #[test]
    fn turnout_position_from_output() {
        assert_eq!(TurnoutPosition::from_output(0), TurnoutPosition::Straight);
        assert_eq!(TurnoutPosition::from_output(1), TurnoutPosition::Thrown);
        assert_eq!(TurnoutPosition::default().code(), 0);
    }

    #[test]
    fn loco_info_speed_bits() {
        let info = LocoInfo {
            address: 3,
            steps: StepConfig::Step128,
            speed: 0x80 | 0x10,
            functions: [0; 5],
        };
        assert!(info.is_forward());
        assert_eq!(info.speed_code(), 0x10);
    }

    #[test]
    fn command_targets() {
        assert_eq!(BusCommand::LocoSpeed { id: 5, speed: 0 }.target(), Some(5));
        assert_eq!(BusCommand::Ping.target(), None);
    }
}
