//! Config-data stream reassembly.
//!
//! Text blobs (roster lists, locomotive configuration) travel over the bus
//! as a stream: one header frame announcing the total length and a
//! CRC-16/CCITT checksum, followed by 8-byte data frames. The last frame is
//! zero padded; the checksum covers the padded payload.
//!
//! [`ConfigDataAssembler`] collects the frames and hands back the complete
//! text once the announced length has arrived. Headers announcing more than
//! the configured maximum are refused.
//!
//! # Example
//!
//! ```rust
//! use rs_trainbridge::stream::{crc16_ccitt, ConfigDataAssembler, StreamOutcome};
//!
//! let payload = *b"lok\n.x=1";
//! let mut assembler = ConfigDataAssembler::new();
//! assembler.on_header(8, crc16_ccitt(&payload));
//! match assembler.on_chunk(&payload) {
//!     StreamOutcome::Complete(text) => assert_eq!(text, "lok\n.x=1"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::BridgeError;

/// Kind of configuration blob requested from the bus.
///
/// `Display` yields the name sent in the request frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    /// Complete locomotive list of a handheld (`lokliste`).
    LocoList,
    /// Configuration of one named locomotive (`lokinfo`).
    LocoInfo,
    /// Paged locomotive name list, legacy handhelds (`loknamen`).
    LocoNames,
    /// Accessory article info (`maginfo`).
    AccessoryInfo,
    /// Locomotive database (`lokdb`).
    LocoDb,
    /// Text database (`textdb`).
    TextDb,
    /// Route database (`fsdb`).
    RouteDb,
    /// Central-station locomotive file (`loks`).
    Locomotives,
    /// Central-station accessory file (`mags`).
    Accessories,
    /// Central-station route file (`fs`).
    Routes,
    /// Central-station track diagram index (`gbs`).
    TrackDiagram,
    /// One track diagram page (`gbs-<n>`).
    TrackPage(u8),
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            DataType::LocoList => "lokliste",
            DataType::LocoInfo => "lokinfo",
            DataType::LocoNames => "loknamen",
            DataType::AccessoryInfo => "maginfo",
            DataType::LocoDb => "lokdb",
            DataType::TextDb => "textdb",
            DataType::RouteDb => "fsdb",
            DataType::Locomotives => "loks",
            DataType::Accessories => "mags",
            DataType::Routes => "fs",
            DataType::TrackDiagram => "gbs",
            DataType::TrackPage(page) => return write!(f, "gbs-{page}"),
        };
        f.write_str(name)
    }
}

// ============================================================================
// CRC-16/CCITT-FALSE
// ============================================================================

const POLY: u16 = 0x1021;
const INIT: u16 = 0xFFFF;

const CRC_TABLE: [u16; 256] = {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF) as used by config streams.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    data.iter().fold(INIT, |crc, &byte| {
        let index = ((crc >> 8) ^ u16::from(byte)) as usize;
        (crc << 8) ^ CRC_TABLE[index]
    })
}

// ============================================================================
// Assembler
// ============================================================================

/// Result of feeding one frame to the assembler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// More data expected.
    Pending,
    /// Stream complete; the decoded text.
    Complete(String),
    /// Stream unusable; the assembler has been reset.
    Failed(BridgeError),
}

/// Largest stream a header may announce unless configured otherwise.
pub const DEFAULT_MAX_STREAM_LEN: u32 = 64 * 1024;

/// Collects config-data frames into a text blob.
#[derive(Debug)]
pub struct ConfigDataAssembler {
    expected: Option<(usize, u16)>,
    buffer: Vec<u8>,
    max_length: u32,
}

impl Default for ConfigDataAssembler {
    fn default() -> Self {
        Self {
            expected: None,
            buffer: Vec::new(),
            max_length: DEFAULT_MAX_STREAM_LEN,
        }
    }
}

impl ConfigDataAssembler {
    /// Create an idle assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the largest stream length a header may announce.
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    /// True while a stream header has been seen and data is outstanding.
    pub fn is_receiving(&self) -> bool {
        self.expected.is_some()
    }

    /// Start a new stream, discarding any partial one.
    ///
    /// A header announcing more than the configured maximum is rejected and
    /// leaves the assembler idle.
    pub fn on_header(&mut self, length: u32, crc: u16) -> StreamOutcome {
        self.reset();
        if length > self.max_length {
            return StreamOutcome::Failed(BridgeError::StreamTooLong {
                length,
                limit: self.max_length,
            });
        }
        let length = length as usize;
        self.buffer.reserve(length.saturating_add(7));
        self.expected = Some((length, crc));
        StreamOutcome::Pending
    }

    /// Append one data frame.
    pub fn on_chunk(&mut self, chunk: &[u8; 8]) -> StreamOutcome {
        let Some((length, crc)) = self.expected else {
            return StreamOutcome::Failed(BridgeError::UnexpectedChunk);
        };
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() < length {
            return StreamOutcome::Pending;
        }

        self.expected = None;
        let actual = crc16_ccitt(&self.buffer);
        if actual != crc {
            self.buffer.clear();
            return StreamOutcome::Failed(BridgeError::CrcMismatch {
                expected: crc,
                actual,
            });
        }
        self.buffer.truncate(length);
        while self.buffer.last() == Some(&0) {
            self.buffer.pop();
        }
        let bytes = core::mem::take(&mut self.buffer);
        StreamOutcome::Complete(decode_text(bytes))
    }

    /// Abort the current stream.
    pub fn reset(&mut self) {
        self.expected = None;
        self.buffer.clear();
    }
}

/// UTF-8 passes through unchanged; anything else is read as Latin-1.
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.as_bytes().iter().map(|&b| char::from(b)).collect(),
    }
}
