//! Error type shared by the bridge's fallible helpers.
//!
//! Protocol handlers themselves report success as `bool` (or through a
//! roster completion flag); these errors surface from the pure helpers
//! underneath them so the reason can be logged.

/// Errors produced by the translation core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// Function index beyond the 32 function bits a locomotive carries.
    #[error("function number {0} out of range (max 31)")]
    FunctionOutOfRange(u8),

    /// Locomotive configuration text without a `lok` section.
    #[error("configuration text has no `lok` section")]
    MissingLokSection,

    /// The preference store could not be opened.
    #[error("preference store namespace unavailable")]
    StorageUnavailable,

    /// The preference store refused to remove an entry.
    #[error("preference store could not remove `{0}`")]
    StorageRemove(heapless::String<32>),

    /// The preference store accepted fewer bytes than were written.
    #[error("preference store wrote {written} of {expected} bytes")]
    StorageWrite {
        /// Bytes the store reports as written.
        written: usize,
        /// Bytes handed to the store.
        expected: usize,
    },

    /// A completed config-data stream failed its checksum.
    #[error("config data crc mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    CrcMismatch {
        /// CRC announced in the stream header.
        expected: u16,
        /// CRC computed over the received payload.
        actual: u16,
    },

    /// A stream header announced more data than the bridge accepts.
    #[error("config stream of {length} bytes exceeds limit of {limit}")]
    StreamTooLong {
        /// Length announced in the header.
        length: u32,
        /// Configured maximum.
        limit: u32,
    },

    /// A data chunk arrived without a preceding stream header.
    #[error("config data chunk without stream header")]
    UnexpectedChunk,
}
