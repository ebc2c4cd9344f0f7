//! Bridge configuration.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`.
//!
//! # Example
//!
//! ```rust
//! use rs_trainbridge::config::{AddressConfig, BridgeConfig, SessionConfig};
//!
//! // Use defaults
//! let config = BridgeConfig::default();
//!
//! // Or customize
//! let config = BridgeConfig::default()
//!     .with_session(SessionConfig::default().with_timeout_ms(500))
//!     .with_addressing(AddressConfig::default().with_accessory_dcc_start(512));
//! ```

use heapless::String as HString;

/// Maximum length for short config strings (namespaces, keys)
pub const MAX_SHORT_STRING: usize = 32;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Default locomotive registry capacity.
pub const DEFAULT_MAX_LOCOS: usize = 64;

/// Default turnout registry capacity.
pub const DEFAULT_MAX_TURNOUTS: usize = 128;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let take = s.len().min(MAX_SHORT_STRING);
    // Find valid UTF-8 boundary
    let valid_end = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= take)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete bridge configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BridgeConfig {
    /// Address band thresholds
    pub addressing: AddressConfig,
    /// Config-data session timing
    pub session: SessionConfig,
    /// Station identity and behaviour
    pub station: StationConfig,
    /// Preference store keys
    pub storage: StorageConfig,
}

impl BridgeConfig {
    /// Set address configuration
    pub fn with_addressing(mut self, addressing: AddressConfig) -> Self {
        self.addressing = addressing;
        self
    }

    /// Set session configuration
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set station configuration
    pub fn with_station(mut self, station: StationConfig) -> Self {
        self.station = station;
        self
    }

    /// Set storage configuration
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }
}

// ============================================================================
// Address Config
// ============================================================================

/// Client address band thresholds.
///
/// Thresholds must be ascending in declaration order. Each value is the
/// last address of the band below it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressConfig {
    /// Last managed address; DCC 14-step band starts above it
    pub dcc14_start: u16,
    /// Motorola band starts above this address
    pub motorola_start: u16,
    /// MFX band starts above this address
    pub mfx_start: u16,
    /// DCC 28-step band starts above this address
    pub dcc28_start: u16,
    /// DCC 128-step band starts above this address
    pub dcc128_start: u16,
    /// First accessory address routed to DCC accessory space
    pub accessory_dcc_start: u16,
    /// First decoder address that uses the DCC long-address protocol
    pub long_dcc_address_start: u16,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            dcc14_start: 2000,
            motorola_start: 3000,
            mfx_start: 4000,
            dcc28_start: 5000,
            dcc128_start: 6000,
            accessory_dcc_start: 1000,
            long_dcc_address_start: 128,
        }
    }
}

impl AddressConfig {
    /// Set all locomotive band thresholds at once
    pub fn with_bands(
        mut self,
        dcc14: u16,
        motorola: u16,
        mfx: u16,
        dcc28: u16,
        dcc128: u16,
    ) -> Self {
        self.dcc14_start = dcc14;
        self.motorola_start = motorola;
        self.mfx_start = mfx;
        self.dcc28_start = dcc28;
        self.dcc128_start = dcc128;
        self
    }

    /// Set the accessory DCC threshold
    pub fn with_accessory_dcc_start(mut self, start: u16) -> Self {
        self.accessory_dcc_start = start;
        self
    }

    /// Set the first long DCC address
    pub fn with_long_dcc_address_start(mut self, start: u16) -> Self {
        self.long_dcc_address_start = start;
        self
    }

    /// Check that thresholds are strictly ascending
    pub fn is_valid(&self) -> bool {
        self.dcc14_start < self.motorola_start
            && self.motorola_start < self.mfx_start
            && self.mfx_start < self.dcc28_start
            && self.dcc28_start < self.dcc128_start
    }
}

// ============================================================================
// Session Config
// ============================================================================

/// Config-data session timing
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Time to wait for a response before resending, in milliseconds
    pub timeout_ms: u64,
    /// Resends of an unanswered request before it counts as failed
    pub max_cmd_repeat: u8,
    /// Largest config-data stream accepted from the bus, in bytes
    pub max_stream_len: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            max_cmd_repeat: 3,
            max_stream_len: crate::stream::DEFAULT_MAX_STREAM_LEN,
        }
    }
}

impl SessionConfig {
    /// Set the response timeout
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the resend limit
    pub fn with_max_cmd_repeat(mut self, repeats: u8) -> Self {
        self.max_cmd_repeat = repeats;
        self
    }

    /// Set the largest accepted config-data stream
    pub fn with_max_stream_len(mut self, bytes: u32) -> Self {
        self.max_stream_len = bytes;
        self
    }
}

// ============================================================================
// Station Config
// ============================================================================

/// Station identity and behaviour
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationConfig {
    /// Bus hash identifying this bridge
    pub hash: u16,
    /// Serial number reported to clients
    pub serial_number: u32,
    /// Minimum spacing of unacknowledged speed commands, in milliseconds
    pub min_speed_interval_ms: u64,
    /// Forward CV programming to the bus instead of echoing
    pub programming_enabled: bool,
    /// Pings sent while looking for a trainbox
    pub ping_attempts: u8,
    /// Spacing between discovery pings, in milliseconds
    pub ping_interval_ms: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            hash: 0x7A60,
            serial_number: 0,
            min_speed_interval_ms: 100,
            programming_enabled: false,
            ping_attempts: 5,
            ping_interval_ms: 500,
        }
    }
}

impl StationConfig {
    /// Set the bus hash
    pub fn with_hash(mut self, hash: u16) -> Self {
        self.hash = hash;
        self
    }

    /// Set the serial number
    pub fn with_serial_number(mut self, serial: u32) -> Self {
        self.serial_number = serial;
        self
    }

    /// Set the minimum speed command interval
    pub fn with_min_speed_interval_ms(mut self, ms: u64) -> Self {
        self.min_speed_interval_ms = ms;
        self
    }

    /// Enable or disable CV programming
    pub fn with_programming(mut self, enabled: bool) -> Self {
        self.programming_enabled = enabled;
        self
    }

    /// Set discovery ping attempts and spacing
    pub fn with_ping(mut self, attempts: u8, interval_ms: u64) -> Self {
        self.ping_attempts = attempts;
        self.ping_interval_ms = interval_ms;
        self
    }
}

// ============================================================================
// Storage Config
// ============================================================================

/// Preference store namespace and keys
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StorageConfig {
    /// Namespace holding the bridge's entries
    pub namespace: ShortString,
    /// Key of the loco mode blob
    pub loco_mode_key: ShortString,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            namespace: short_string("z21"),
            loco_mode_key: short_string("locomode"),
        }
    }
}

impl StorageConfig {
    /// Set the namespace
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = short_string(namespace);
        self
    }

    /// Set the loco mode key
    pub fn with_loco_mode_key(mut self, key: &str) -> Self {
        self.loco_mode_key = short_string(key);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
