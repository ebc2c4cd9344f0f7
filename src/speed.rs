//! Speed conversion between station-protocol speed codes and the bus scale.
//!
//! Throttles send a 7-bit speed code whose meaning depends on the decoder's
//! step configuration (14, 28 or 128 steps, with code 1 reserved for an
//! emergency stop). The bus works on a normalized 0-1000 scale.
//!
//! The bus-to-client direction divides by fixed per-configuration divisors
//! (71, 35, 8) rather than inverting the forward scaling.
//!
//! # Example
//!
//! ```rust
//! use rs_trainbridge::speed::{decode_client_speed, SpeedCode, StepConfig};
//!
//! let code = decode_client_speed(0x12, StepConfig::Step28);
//! assert_eq!(code, SpeedCode::Step(2));
//! assert_eq!(StepConfig::Step28.to_normalized(2), 71);
//! ```

/// Decoder speed-step configuration.
///
/// Discriminants are the station-protocol codes carried in the low bits of
/// a drive command header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StepConfig {
    /// 14 speed steps.
    Step14 = 0,
    /// 28 speed steps.
    Step28 = 2,
    /// 128 speed steps.
    #[default]
    Step128 = 3,
}

impl StepConfig {
    /// Station-protocol code of this configuration.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parse a station-protocol code (low two bits are significant).
    pub const fn from_code(code: u8) -> Option<Self> {
        match code & 0x03 {
            0 => Some(StepConfig::Step14),
            2 => Some(StepConfig::Step28),
            3 => Some(StepConfig::Step128),
            _ => None,
        }
    }

    /// Number of discrete steps.
    pub const fn steps(self) -> u16 {
        match self {
            StepConfig::Step14 => 14,
            StepConfig::Step28 => 28,
            StepConfig::Step128 => 128,
        }
    }

    /// Highest drivable step.
    pub const fn max_step(self) -> u8 {
        match self {
            StepConfig::Step14 => 14,
            StepConfig::Step28 => 28,
            StepConfig::Step128 => 126,
        }
    }

    /// Divisor applied to a normalized bus speed to approximate a step.
    pub const fn bus_divisor(self) -> u16 {
        match self {
            StepConfig::Step14 => 71,
            StepConfig::Step28 => 35,
            StepConfig::Step128 => 8,
        }
    }

    /// Scale a decoded step value onto the bus's 0-1000 range.
    pub fn to_normalized(self, step: u8) -> u16 {
        (u32::from(step) * 1000 / u32::from(self.steps())) as u16
    }

    /// Approximate a step value from a normalized bus speed, capped at
    /// [`max_step`](Self::max_step).
    pub fn from_normalized(self, normalized: u16) -> u8 {
        (normalized / self.bus_divisor()).min(u16::from(self.max_step())) as u8
    }
}

/// Decoded meaning of a station-protocol speed code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeedCode {
    /// Drive at the given step (0 = stop).
    Step(u8),
    /// Emergency stop requested.
    EmergencyStop,
}

/// Decode a 7-bit station-protocol speed code.
///
/// The direction bit must already be masked off.
pub fn decode_client_speed(code: u8, config: StepConfig) -> SpeedCode {
    match code {
        0 => SpeedCode::Step(0),
        1 => SpeedCode::EmergencyStop,
        _ => {
            let step = match config {
                StepConfig::Step28 => {
                    (((code & 0x0F) << 1) | ((code & 0x10) >> 4)).saturating_sub(3)
                }
                _ => code - 1,
            };
            SpeedCode::Step(step)
        }
    }
}

/// Encode a step value as a station-protocol speed code.
pub fn encode_bus_speed(step: u8, config: StepConfig) -> u8 {
    if step == 0 {
        return 0;
    }
    match config {
        StepConfig::Step28 => {
            let buf = step.wrapping_add(3);
            ((buf & 0x1E) >> 1) | ((buf & 0x01) << 4)
        }
        _ => step.wrapping_add(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [StepConfig; 3] = [StepConfig::Step14, StepConfig::Step28, StepConfig::Step128];

    #[test]
    fn zero_and_estop() {
        for config in ALL {
            assert_eq!(decode_client_speed(0, config), SpeedCode::Step(0));
            assert_eq!(decode_client_speed(1, config), SpeedCode::EmergencyStop);
            assert_eq!(encode_bus_speed(0, config), 0);
        }
    }

    #[test]
    fn step28_interleaved_bits() {
        assert_eq!(decode_client_speed(0x02, StepConfig::Step28), SpeedCode::Step(1));
        assert_eq!(decode_client_speed(0x12, StepConfig::Step28), SpeedCode::Step(2));
        assert_eq!(decode_client_speed(0x1F, StepConfig::Step28), SpeedCode::Step(28));
        assert_eq!(encode_bus_speed(1, StepConfig::Step28), 0x02);
        assert_eq!(encode_bus_speed(2, StepConfig::Step28), 0x12);
        assert_eq!(encode_bus_speed(28, StepConfig::Step28), 0x1F);
    }

    #[test]
    fn linear_configs_offset_by_one() {
        assert_eq!(decode_client_speed(2, StepConfig::Step128), SpeedCode::Step(1));
        assert_eq!(decode_client_speed(127, StepConfig::Step128), SpeedCode::Step(126));
        assert_eq!(decode_client_speed(15, StepConfig::Step14), SpeedCode::Step(14));
        assert_eq!(encode_bus_speed(126, StepConfig::Step128), 127);
    }

    #[test]
    fn codes_round_trip() {
        for config in ALL {
            for step in 1..=config.max_step() {
                let code = encode_bus_speed(step, config);
                assert_ne!(code, 1, "step {step} collides with e-stop");
                assert_eq!(decode_client_speed(code, config), SpeedCode::Step(step));
            }
        }
    }

    #[test]
    fn normalized_scale() {
        assert_eq!(StepConfig::Step14.to_normalized(14), 1000);
        assert_eq!(StepConfig::Step28.to_normalized(14), 500);
        assert_eq!(StepConfig::Step128.to_normalized(64), 500);
    }

    #[test]
    fn normalized_round_trip_within_tolerance() {
        for config in ALL {
            for step in 0..=config.max_step() {
                let back = config.from_normalized(config.to_normalized(step));
                let diff = (i16::from(back) - i16::from(step)).unsigned_abs();
                assert!(diff <= u16::from(step) / 32 + 1, "{config:?} step {step} -> {back}");
            }
        }
    }

    #[test]
    fn bus_divisors_exact() {
        assert_eq!(StepConfig::Step14.from_normalized(1000), 14);
        assert_eq!(StepConfig::Step28.from_normalized(1000), 28);
        assert_eq!(StepConfig::Step128.from_normalized(1000), 125);
        assert_eq!(StepConfig::Step128.from_normalized(7), 0);
    }

    #[test]
    fn over_range_speed_is_capped() {
        assert_eq!(StepConfig::Step128.from_normalized(1016), 126);
        assert_eq!(StepConfig::Step28.from_normalized(1015), 28);
        assert_eq!(StepConfig::Step14.from_normalized(u16::MAX), 14);
        for config in ALL {
            let code = encode_bus_speed(config.from_normalized(u16::MAX), config);
            assert_ne!(code, 0, "{config:?} wrapped to stop");
        }
    }

    #[test]
    fn step_codes() {
        assert_eq!(StepConfig::from_code(0x10), Some(StepConfig::Step14));
        assert_eq!(StepConfig::from_code(0x12), Some(StepConfig::Step28));
        assert_eq!(StepConfig::from_code(0x13), Some(StepConfig::Step128));
        assert_eq!(StepConfig::from_code(1), None);
        assert_eq!(StepConfig::Step128.code(), 3);
    }
}
