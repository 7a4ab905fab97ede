//! Error taxonomy for the codec.
//!
//! Every fallible operation in this crate funnels into [`Error`]. Codec
//! primitives that need to report *how many more bytes* they would need
//! (underflow) or *how many more bytes the destination would need*
//! (overflow) carry that count in the variant itself, mirroring the
//! signed-byte-count convention of the wire format this crate implements.

use thiserror::Error;

/// Crate-wide result alias, following the same shape as the teacher's
/// `pdb_sdk::result::Result`.
pub type Result<A, E = Error> = std::result::Result<A, E>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("malformed value: {0}")]
    Invalid(String),

    #[error("type mismatch: expected {expected}, found tag byte {found:#04x}")]
    TypeMismatch { expected: &'static str, found: u8 },

    #[error("no encoder registered for type {0}")]
    NoEncoder(i64),

    #[error("no decoder registered for type {0}")]
    NoDecoder(i64),

    #[error("registry has no size recorded for type {0}")]
    NoSize(i64),

    #[error("allocator failed to provide {0} byte(s)")]
    NoMemory(usize),

    #[error("buffer underflow: {needed} more byte(s) required")]
    Underflow { needed: usize },

    #[error("buffer overflow: destination needs {needed} more byte(s) and cannot grow")]
    Overflow { needed: usize },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// True for the two error kinds that carry a required-byte-count and
    /// are safe to retry once more bytes are available (underflow) or
    /// once the destination has grown (overflow).
    pub fn is_recoverable_with_more_bytes(&self) -> bool {
        matches!(self, Error::Underflow { .. } | Error::Overflow { .. })
    }
}
