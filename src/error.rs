//! Error types for the block codec.
//!
//! All fallible operations in this crate return [`Result<T>`], which is an
//! alias for `std::result::Result<T, Error>`. Every variant is a stable
//! error kind: callers match on the variant, not on message text.
//!
//! [`Error::NeedMoreData`] is the only recoverable kind. It is reported at
//! clean boundaries (the buffered bytes do not yet contain a whole frame or
//! block) and the caller retries after feeding more bytes. Everything else
//! is surfaced to the collaborator; [`Error::Truncated`] and
//! [`Error::Checksum`] additionally poison the stream decoder.

use thiserror::Error;

/// Errors that can occur while encoding or decoding blocks.
#[derive(Error, Debug)]
pub enum Error {
    /// The buffer ended at a clean boundary before a whole frame or block
    /// arrived. Recoverable: retain the buffered bytes and retry once more
    /// input is available.
    #[error("need more data: have {have} bytes, need at least {need}")]
    NeedMoreData {
        /// Bytes currently available.
        have: usize,
        /// Minimum bytes required to make progress.
        need: usize,
    },

    /// The buffer ended inside a structure after a commit point. The stream
    /// is unusable from here on.
    #[error("truncated {context}: need {need} bytes, have {have}")]
    Truncated {
        /// What was being decoded when the bytes ran out.
        context: &'static str,
        /// Bytes required by the failed read.
        need: usize,
        /// Bytes that were available.
        have: usize,
    },

    /// The 128-bit content hash of a compressed frame did not match.
    #[error("frame checksum mismatch")]
    Checksum,

    /// A compressed frame decompressed to a different size than its header
    /// declared, or its header fields are inconsistent.
    #[error("corrupt frame: {0}")]
    CorruptFrame(String),

    /// A compressed frame carried an unknown compression-algorithm tag.
    #[error("unsupported compression algorithm: 0x{0:02x}")]
    UnsupportedAlgorithm(u8),

    /// A type string failed to parse, or a parsed type violated an arity
    /// invariant (e.g. `Array` with two arguments).
    #[error("malformed type: {0}")]
    MalformedType(String),

    /// A well-formed type that this codec has no column implementation for.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// A decimal value does not fit the column's precision on encode.
    #[error("decimal overflow: {0}")]
    DecimalOverflow(String),

    /// A JSON column used a serialization version other than 1.
    #[error("unsupported JSON serialization version: {0}")]
    UnsupportedJsonFormat(u64),

    /// Caller rows do not line up with the server schema (missing field,
    /// incompatible field/column pair, None for a non-nullable column).
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The shared buffer pool refused a rental.
    #[error("buffer pool exhausted")]
    PoolExhausted,

    /// `complete()` was called on a pipeline that already completed.
    #[error("insert pipeline already completed")]
    AlreadyCompleted,

    /// The pipeline was used before a schema was installed.
    #[error("insert pipeline not initialized with a schema")]
    NotInitialized,

    /// A previous `Truncated` or `Checksum` error poisoned this codec
    /// instance; every subsequent operation fails fast with this marker.
    #[error("codec poisoned by an earlier stream error")]
    Poisoned,

    /// An internal invariant was violated.
    #[error("internal invariant violated: {0}")]
    Bug(String),

    /// An I/O error from the byte sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the one recoverable kind, [`Error::NeedMoreData`].
    pub fn is_need_more_data(&self) -> bool {
        matches!(self, Error::NeedMoreData { .. })
    }

    /// True for errors that poison the stream they occurred on.
    pub fn poisons_stream(&self) -> bool {
        matches!(self, Error::Truncated { .. } | Error::Checksum)
    }
}

/// A type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
