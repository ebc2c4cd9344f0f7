//! Client-to-bus address translation.
//!
//! Station-protocol throttles address locomotives with a plain number. The
//! bridge splits that number space into bands: addresses up to
//! [`AddressConfig::dcc14_start`] are "managed" addresses whose bus identity
//! depends on the decoder mode the user selected, everything above belongs
//! to a fixed band that implies both the decoder protocol and step count.
//!
//! ```text
//!   0 ..= dcc14_start       managed   (mode chooses MM2 or DCC offset)
//!   ..= motorola_start      DCC, 14 steps
//!   ..= mfx_start           Motorola, 128 steps
//!   ..= dcc28_start         MFX (driven like DCC 128)
//!   ..= dcc128_start        DCC, 28 steps
//!   above                   DCC, 128 steps
//! ```
//!
//! Every band is translated by subtracting its start and adding the band's
//! fixed bus offset, so consecutive client addresses stay consecutive on the bus.
//!
//! # Example
//!
//! ```rust
//! use rs_trainbridge::address::{to_bus_address, DecoderMode, BusOffset};
//! use rs_trainbridge::config::AddressConfig;
//!
//! let cfg = AddressConfig::default();
//! assert_eq!(to_bus_address(3, DecoderMode::Motorola, &cfg), 3);
//! assert_eq!(to_bus_address(3, DecoderMode::Dcc, &cfg), BusOffset::DCC + 3);
//! ```

use crate::config::AddressConfig;
use crate::speed::StepConfig;

/// Decoder protocol family selected for a locomotive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DecoderMode {
    /// DCC decoder.
    #[default]
    Dcc = 0,
    /// Motorola (MM2) decoder.
    Motorola = 1,
}

impl DecoderMode {
    /// Station-protocol mode code (0 = DCC, 1 = MM).
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parse a station-protocol mode code. Anything non-zero is Motorola.
    pub const fn from_code(code: u8) -> Self {
        if code == 0 {
            DecoderMode::Dcc
        } else {
            DecoderMode::Motorola
        }
    }
}

/// Fixed identifier offsets of the bus address space.
pub struct BusOffset;

impl BusOffset {
    /// Motorola locomotives.
    pub const MM2: u32 = 0x0000;
    /// MFX locomotives.
    pub const MFX: u32 = 0x4000;
    /// DCC locomotives.
    pub const DCC: u32 = 0xC000;
    /// Motorola accessory decoders.
    pub const MM2_ACC: u32 = 0x3000;
    /// DCC accessory decoders.
    pub const DCC_ACC: u32 = 0x3800;
}

/// Client address band a locomotive address falls into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressBand {
    /// Below the fixed bands; mode comes from the registry.
    Managed,
    /// DCC decoder with 14 speed steps.
    Dcc14,
    /// Motorola decoder.
    Motorola,
    /// MFX decoder, driven like DCC 128.
    Mfx,
    /// DCC decoder with 28 speed steps.
    Dcc28,
    /// DCC decoder with 128 speed steps.
    Dcc128,
}

impl AddressBand {
    /// Classify a client address.
    ///
    /// Band starts are exclusive: `dcc14_start` itself is still managed.
    pub fn classify(client: u16, cfg: &AddressConfig) -> Self {
        if client <= cfg.dcc14_start {
            AddressBand::Managed
        } else if client > cfg.dcc128_start {
            AddressBand::Dcc128
        } else if client > cfg.dcc28_start {
            AddressBand::Dcc28
        } else if client > cfg.mfx_start {
            AddressBand::Mfx
        } else if client > cfg.motorola_start {
            AddressBand::Motorola
        } else {
            AddressBand::Dcc14
        }
    }

    /// Decoder mode and step count implied by a fixed band.
    ///
    /// Returns `None` for [`AddressBand::Managed`].
    pub fn implied(self) -> Option<(DecoderMode, StepConfig)> {
        match self {
            AddressBand::Managed => None,
            AddressBand::Dcc14 => Some((DecoderMode::Dcc, StepConfig::Step14)),
            AddressBand::Motorola => Some((DecoderMode::Motorola, StepConfig::Step128)),
            AddressBand::Mfx => Some((DecoderMode::Dcc, StepConfig::Step128)),
            AddressBand::Dcc28 => Some((DecoderMode::Dcc, StepConfig::Step28)),
            AddressBand::Dcc128 => Some((DecoderMode::Dcc, StepConfig::Step128)),
        }
    }

    fn start_and_offset(self, cfg: &AddressConfig) -> (u16, u32) {
        match self {
            AddressBand::Managed => (0, BusOffset::MM2),
            AddressBand::Dcc14 => (cfg.dcc14_start, BusOffset::DCC),
            AddressBand::Motorola => (cfg.motorola_start, BusOffset::MM2),
            AddressBand::Mfx => (cfg.mfx_start, BusOffset::MFX),
            AddressBand::Dcc28 => (cfg.dcc28_start, BusOffset::DCC),
            AddressBand::Dcc128 => (cfg.dcc128_start, BusOffset::DCC),
        }
    }
}

/// Translate a client locomotive address into a bus identifier.
///
/// `mode` only matters for managed addresses; fixed bands imply their own.
/// Total over `u16`: addresses past the last threshold stay in the DCC 128 band.
pub fn to_bus_address(client: u16, mode: DecoderMode, cfg: &AddressConfig) -> u32 {
    match AddressBand::classify(client, cfg) {
        AddressBand::Managed => {
            let offset = match mode {
                DecoderMode::Motorola => BusOffset::MM2,
                DecoderMode::Dcc => BusOffset::DCC,
            };
            u32::from(client) + offset
        }
        band => {
            let (start, offset) = band.start_and_offset(cfg);
            u32::from(client - start) + offset
        }
    }
}

/// Decoder-level address of a bus identifier (offset stripped).
pub fn decoder_address(bus: u32) -> u16 {
    (bus & 0x3FFF) as u16
}

/// Translate a client accessory address into a bus identifier.
pub fn accessory_to_bus(client: u16, cfg: &AddressConfig) -> u32 {
    if client >= cfg.accessory_dcc_start {
        u32::from(client - cfg.accessory_dcc_start) + BusOffset::DCC_ACC
    } else {
        u32::from(client) + BusOffset::MM2_ACC
    }
}

/// Translate a bus accessory identifier back into a client address.
///
/// Identifiers outside both accessory ranges are passed through truncated.
pub fn accessory_from_bus(bus: u32, cfg: &AddressConfig) -> u16 {
    if bus >= BusOffset::DCC_ACC {
        ((bus - BusOffset::DCC_ACC) as u16).wrapping_add(cfg.accessory_dcc_start)
    } else if bus >= BusOffset::MM2_ACC {
        (bus - BusOffset::MM2_ACC) as u16
    } else {
        bus as u16
    }
}

/// Decoder mode of an accessory address (DCC at or above the DCC threshold).
pub fn accessory_mode(client: u16, cfg: &AddressConfig) -> DecoderMode {
    if client >= cfg.accessory_dcc_start {
        DecoderMode::Dcc
    } else {
        DecoderMode::Motorola
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> AddressConfig {
        AddressConfig::default()
    }

    #[test]
    fn managed_addresses_follow_mode() {
        let cfg = cfg();
        assert_eq!(to_bus_address(78, DecoderMode::Motorola, &cfg), 78);
        assert_eq!(to_bus_address(78, DecoderMode::Dcc, &cfg), 0xC000 + 78);
        assert_eq!(
            to_bus_address(cfg.dcc14_start, DecoderMode::Motorola, &cfg),
            u32::from(cfg.dcc14_start)
        );
    }

    #[test]
    fn fixed_bands_ignore_mode() {
        let cfg = cfg();
        for mode in [DecoderMode::Dcc, DecoderMode::Motorola] {
            assert_eq!(to_bus_address(cfg.dcc14_start + 3, mode, &cfg), 0xC003);
            assert_eq!(to_bus_address(cfg.motorola_start + 3, mode, &cfg), 3);
            assert_eq!(to_bus_address(cfg.mfx_start + 3, mode, &cfg), 0x4003);
            assert_eq!(to_bus_address(cfg.dcc28_start + 3, mode, &cfg), 0xC003);
            assert_eq!(to_bus_address(cfg.dcc128_start + 3, mode, &cfg), 0xC003);
        }
    }

    #[test]
    fn band_monotonic() {
        let cfg = cfg();
        let starts = [
            0,
            cfg.dcc14_start,
            cfg.motorola_start,
            cfg.mfx_start,
            cfg.dcc28_start,
            cfg.dcc128_start,
        ];
        for window in starts.windows(2) {
            for client in (window[0] + 1)..window[1] {
                for mode in [DecoderMode::Dcc, DecoderMode::Motorola] {
                    let a = to_bus_address(client, mode, &cfg);
                    let b = to_bus_address(client + 1, mode, &cfg);
                    assert_eq!(b, a + 1, "client {client} mode {mode:?}");
                }
            }
        }
    }

    #[test]
    fn classify_boundaries_are_exclusive() {
        let cfg = cfg();
        assert_eq!(AddressBand::classify(cfg.dcc14_start, &cfg), AddressBand::Managed);
        assert_eq!(AddressBand::classify(cfg.dcc14_start + 1, &cfg), AddressBand::Dcc14);
        assert_eq!(AddressBand::classify(cfg.motorola_start, &cfg), AddressBand::Dcc14);
        assert_eq!(AddressBand::classify(cfg.motorola_start + 1, &cfg), AddressBand::Motorola);
        assert_eq!(AddressBand::classify(cfg.mfx_start + 1, &cfg), AddressBand::Mfx);
        assert_eq!(AddressBand::classify(cfg.dcc28_start + 1, &cfg), AddressBand::Dcc28);
        assert_eq!(AddressBand::classify(u16::MAX, &cfg), AddressBand::Dcc128);
    }

    #[test]
    fn band_implied_modes() {
        assert_eq!(AddressBand::Managed.implied(), None);
        assert_eq!(
            AddressBand::Motorola.implied(),
            Some((DecoderMode::Motorola, StepConfig::Step128))
        );
        assert_eq!(
            AddressBand::Mfx.implied(),
            Some((DecoderMode::Dcc, StepConfig::Step128))
        );
        assert_eq!(
            AddressBand::Dcc14.implied(),
            Some((DecoderMode::Dcc, StepConfig::Step14))
        );
    }

    #[test]
    fn accessory_split() {
        let cfg = cfg();
        assert_eq!(accessory_to_bus(5, &cfg), 0x3005);
        assert_eq!(accessory_to_bus(cfg.accessory_dcc_start + 5, &cfg), 0x3805);
        assert_eq!(accessory_from_bus(0x3005, &cfg), 5);
        assert_eq!(accessory_from_bus(0x3805, &cfg), cfg.accessory_dcc_start + 5);
        assert_eq!(accessory_mode(5, &cfg), DecoderMode::Motorola);
        assert_eq!(accessory_mode(cfg.accessory_dcc_start, &cfg), DecoderMode::Dcc);
    }

    #[test]
    fn decoder_address_strips_offset() {
        assert_eq!(decoder_address(0xC000 + 300), 300);
        assert_eq!(decoder_address(0x4000 + 7), 7);
        assert_eq!(decoder_address(12), 12);
    }

    #[test]
    fn mode_codes() {
        assert_eq!(DecoderMode::from_code(0), DecoderMode::Dcc);
        assert_eq!(DecoderMode::from_code(1), DecoderMode::Motorola);
        assert_eq!(DecoderMode::Motorola.code(), 1);
    }
}
