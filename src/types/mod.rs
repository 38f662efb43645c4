#![forbid(unsafe_code)]

//! Error taxonomy shared by the LOB storage layer.

use std::io;

/// Unit used when reporting a short bounded copy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StreamUnit {
    /// The declared length counted bytes.
    Bytes,
    /// The declared length counted decoded characters.
    Chars,
}

impl std::fmt::Display for StreamUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamUnit::Bytes => f.write_str("bytes"),
            StreamUnit::Chars => f.write_str("characters"),
        }
    }
}

/// Errors raised by LOB storage, backing files and stream adapters.
#[derive(thiserror::Error, Debug)]
pub enum LobError {
    /// Failure reported by the backing file or the source stream.
    #[error("IO: {0}")]
    Io(#[from] io::Error),
    /// Position is negative, above the 32-bit limit, or past the content end.
    #[error("invalid position {pos}: must be between 0 and {limit}")]
    InvalidPosition {
        /// Offending position.
        pos: i64,
        /// Largest position accepted at the time of the call.
        limit: i64,
    },
    /// Offset lies outside the caller supplied buffer.
    #[error("invalid offset {off} for buffer of length {len}")]
    InvalidOffset {
        /// Offending offset.
        off: usize,
        /// Length of the caller buffer.
        len: usize,
    },
    /// Offset/length pair does not fit inside the caller supplied buffer.
    #[error("index out of bounds: offset {off} + length {len} exceeds buffer of length {buf_len}")]
    IndexOutOfBounds {
        /// Requested offset.
        off: usize,
        /// Requested length.
        len: usize,
        /// Length of the caller buffer.
        buf_len: usize,
    },
    /// A bounded copy ran out of input before reaching the declared length.
    #[error("premature end of stream: expected {expected} {unit}, got {actual}")]
    PrematureEndOfStream {
        /// Declared length.
        expected: u64,
        /// Amount actually produced by the source.
        actual: u64,
        /// Whether the lengths count bytes or characters.
        unit: StreamUnit,
    },
    /// A UTF-8 lead byte outside the one, two and three byte forms.
    #[error("invalid UTF-8 encoding: lead byte {byte:#04x} at offset {offset} after {char_count} characters")]
    MalformedEncoding {
        /// Offending byte.
        byte: u8,
        /// Characters decoded before the offending byte.
        char_count: u64,
        /// Offset of the byte inside the current read chunk.
        offset: usize,
    },
    /// The LOB has already been freed.
    #[error("LOB has been freed")]
    Freed,
    /// The backing file was closed, usually by a connection teardown.
    #[error("LOB backing file is closed")]
    Closed,
    /// Argument rejected without a more specific kind.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, LobError>;

impl From<LobError> for io::Error {
    fn from(err: LobError) -> Self {
        let kind = match err {
            LobError::Io(inner) => return inner,
            LobError::InvalidPosition { .. }
            | LobError::InvalidOffset { .. }
            | LobError::IndexOutOfBounds { .. }
            | LobError::Invalid(_) => io::ErrorKind::InvalidInput,
            LobError::PrematureEndOfStream { .. } => io::ErrorKind::UnexpectedEof,
            LobError::MalformedEncoding { .. } => io::ErrorKind::InvalidData,
            LobError::Freed | LobError::Closed => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
