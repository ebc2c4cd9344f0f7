//! Locomotive state registry.
//!
//! One [`LocoRecord`] per client address the bridge has seen, bounded to a
//! fixed capacity. New records go to the front; when the registry is full
//! the record at the back (the oldest insertion) is evicted.

extern crate alloc;
use alloc::vec::Vec;

use heapless::Deque;
use log::debug;

use crate::address::{to_bus_address, AddressBand, DecoderMode};
use crate::commands::LocoInfo;
use crate::config::{AddressConfig, DEFAULT_MAX_LOCOS};
use crate::error::BridgeError;
use crate::speed::StepConfig;

/// Bytes per persisted loco mode record.
pub const PERSISTED_RECORD_LEN: usize = 4;

/// Number of addressable function bits (F0 to F31).
pub const FUNCTION_COUNT: u8 = 32;

// ============================================================================
// Loco data block
// ============================================================================

/// Step configuration, direction/speed and function bits of one locomotive.
///
/// Laid out on the wire as seven bytes, see [`LocoData::as_bytes`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocoData {
    /// Speed step configuration.
    pub steps: StepConfig,
    /// Bit 7 direction (set = forward), bits 0-6 speed code.
    pub speed: u8,
    /// Functions 0-31.
    pub functions: [u8; 5],
}

impl Default for LocoData {
    fn default() -> Self {
        Self {
            steps: StepConfig::Step128,
            speed: 0x80,
            functions: [0; 5],
        }
    }
}

/// Byte index into [`LocoData::functions`] and bit mask of a function.
fn function_slot(function: u8) -> Result<(usize, u8), BridgeError> {
    match function {
        0 => Ok((0, 1 << 4)),
        1..=4 => Ok((0, 1 << (function - 1))),
        5..=12 => Ok((1, 1 << (function - 5))),
        13..=20 => Ok((2, 1 << (function - 13))),
        21..=28 => Ok((3, 1 << (function - 21))),
        29..=31 => Ok((4, 1 << (function - 29))),
        _ => Err(BridgeError::FunctionOutOfRange(function)),
    }
}

impl LocoData {
    /// Wire layout: step code, speed byte, five function bytes.
    pub fn as_bytes(&self) -> [u8; 7] {
        let f = &self.functions;
        [self.steps.code(), self.speed, f[0], f[1], f[2], f[3], f[4]]
    }

    /// State of a function bit.
    pub fn function(&self, function: u8) -> Result<bool, BridgeError> {
        let (byte, mask) = function_slot(function)?;
        Ok(self.functions[byte] & mask != 0)
    }

    /// Set or clear a function bit. Leaves the data untouched on error.
    pub fn set_function(&mut self, function: u8, on: bool) -> Result<(), BridgeError> {
        let (byte, mask) = function_slot(function)?;
        if on {
            self.functions[byte] |= mask;
        } else {
            self.functions[byte] &= !mask;
        }
        Ok(())
    }

    /// True when the direction bit says forward.
    pub fn is_forward(&self) -> bool {
        self.speed & 0x80 != 0
    }

    /// Replace the direction bit.
    pub fn set_forward(&mut self, forward: bool) {
        if forward {
            self.speed |= 0x80;
        } else {
            self.speed &= 0x7F;
        }
    }

    /// Replace the speed code, keeping the direction bit.
    pub fn set_speed_code(&mut self, code: u8) {
        self.speed = (self.speed & 0x80) | (code & 0x7F);
    }
}

// ============================================================================
// Loco record
// ============================================================================

/// Everything the bridge tracks about one locomotive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocoRecord {
    /// Station-protocol address.
    pub client_address: u16,
    /// Translated bus identifier.
    pub bus_address: u32,
    /// Decoder protocol family.
    pub mode: DecoderMode,
    /// Reported state block.
    pub data: LocoData,
    /// Time the last speed command was forwarded.
    pub last_speed_ms: u64,
    /// The bus echoed the last forwarded speed.
    pub speed_acknowledged: bool,
    /// The DCC data protocol has been sent for the current mode and steps.
    pub protocol_announced: bool,
}

impl LocoRecord {
    /// Create a record, translating the address.
    ///
    /// Addresses in a fixed band ignore `mode` and `steps` in favour of the
    /// band's own.
    pub fn new(client: u16, mode: DecoderMode, steps: StepConfig, cfg: &AddressConfig) -> Self {
        let (mode, steps) = AddressBand::classify(client, cfg)
            .implied()
            .unwrap_or((mode, steps));
        Self {
            client_address: client,
            bus_address: to_bus_address(client, mode, cfg),
            mode,
            data: LocoData {
                steps,
                ..LocoData::default()
            },
            last_speed_ms: 0,
            speed_acknowledged: true,
            protocol_announced: false,
        }
    }

    /// True when the address lies below the fixed bands.
    pub fn is_managed(&self, cfg: &AddressConfig) -> bool {
        AddressBand::classify(self.client_address, cfg) == AddressBand::Managed
    }

    /// Change the decoder mode and re-translate the bus address.
    ///
    /// Returns `false` when nothing changed, which includes every fixed-band
    /// address.
    pub fn set_mode(&mut self, mode: DecoderMode, cfg: &AddressConfig) -> bool {
        if mode == self.mode || !self.is_managed(cfg) {
            return false;
        }
        self.mode = mode;
        self.bus_address = to_bus_address(self.client_address, mode, cfg);
        self.protocol_announced = false;
        true
    }

    /// Change the step configuration. Returns `false` when unchanged.
    pub fn set_steps(&mut self, steps: StepConfig) -> bool {
        if steps == self.data.steps {
            return false;
        }
        self.data.steps = steps;
        self.protocol_announced = false;
        true
    }

    /// Client-facing state report.
    pub fn info(&self) -> LocoInfo {
        LocoInfo {
            address: self.client_address,
            steps: self.data.steps,
            speed: self.data.speed,
            functions: self.data.functions,
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Bounded locomotive registry.
///
/// # Example
///
/// ```rust
/// use rs_trainbridge::address::DecoderMode;
/// use rs_trainbridge::config::AddressConfig;
/// use rs_trainbridge::registry::{LocoRecord, LocoRegistry};
/// use rs_trainbridge::speed::StepConfig;
///
/// let cfg = AddressConfig::default();
/// let mut locos: LocoRegistry<2> = LocoRegistry::new();
/// for addr in 1..=3 {
///     locos.insert(LocoRecord::new(addr, DecoderMode::Motorola, StepConfig::Step128, &cfg));
/// }
/// assert_eq!(locos.len(), 2);
/// assert!(locos.find(1).is_none());
/// ```
#[derive(Debug)]
pub struct LocoRegistry<const N: usize = DEFAULT_MAX_LOCOS> {
    records: Deque<LocoRecord, N>,
}

impl<const N: usize> Default for LocoRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LocoRegistry<N> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            records: Deque::new(),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no locomotive is known.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of records.
    pub fn capacity(&self) -> usize {
        N
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LocoRecord> {
        self.records.iter()
    }

    /// Record for a client address.
    pub fn find(&self, client: u16) -> Option<&LocoRecord> {
        self.records.iter().find(|r| r.client_address == client)
    }

    /// Mutable record for a client address.
    pub fn find_mut(&mut self, client: u16) -> Option<&mut LocoRecord> {
        self.records.iter_mut().find(|r| r.client_address == client)
    }

    /// Every record driving the given bus identifier.
    ///
    /// Several client addresses can share one bus identifier (a managed
    /// Motorola address and its fixed-band twin, for instance).
    pub fn by_bus_mut(&mut self, bus: u32) -> impl Iterator<Item = &mut LocoRecord> {
        self.records.iter_mut().filter(move |r| r.bus_address == bus)
    }

    /// Insert at the front, evicting the oldest record when full.
    ///
    /// Returns `None` only for a zero-capacity registry.
    pub fn insert(&mut self, record: LocoRecord) -> Option<&mut LocoRecord> {
        if self.records.is_full() {
            if let Some(evicted) = self.records.pop_back() {
                debug!("loco registry full, evicting {}", evicted.client_address);
            }
        }
        self.records.push_front(record).ok()?;
        self.records.front_mut()
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Serialize the modes of managed addresses.
    ///
    /// Each record is four bytes: client address (little endian), mode code,
    /// step code. Fixed-band addresses are skipped; their mode is implied.
    pub fn encode_persisted(&self, cfg: &AddressConfig) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.records.len() * PERSISTED_RECORD_LEN);
        for record in self
            .records
            .iter()
            .filter(|r| r.client_address < cfg.dcc14_start)
        {
            bytes.extend_from_slice(&record.client_address.to_le_bytes());
            bytes.push(record.mode.code());
            bytes.push(record.data.steps.code());
        }
        bytes
    }

    /// Append records decoded from [`encode_persisted`](Self::encode_persisted)
    /// output. A trailing partial record is ignored.
    ///
    /// Returns the number of records loaded.
    pub fn load_persisted(&mut self, bytes: &[u8], cfg: &AddressConfig) -> usize {
        let mut loaded = 0;
        for chunk in bytes.chunks_exact(PERSISTED_RECORD_LEN) {
            let client = u16::from_le_bytes([chunk[0], chunk[1]]);
            if self.find(client).is_some() {
                continue;
            }
            let mode = DecoderMode::from_code(chunk[2]);
            let steps = StepConfig::from_code(chunk[3]).unwrap_or_default();
            if self
                .records
                .push_back(LocoRecord::new(client, mode, steps, cfg))
                .is_err()
            {
                let skipped = bytes.len() / PERSISTED_RECORD_LEN - loaded;
                debug!("loco registry full, {skipped} persisted records skipped");
                break;
            }
            loaded += 1;
        }
        loaded
    }
}
