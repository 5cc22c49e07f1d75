//! Error types for the storage engine.
//!
//! `HocError` consolidates every failure a dataset operation can produce, from
//! malformed schemas to on-disk corruption to out-of-range filter arguments.
//! The C ABI (see [`crate::abi`]) collapses these into the integer/null
//! sentinels documented on each entry point; native Rust callers get the
//! full enum via [`Result`].

use thiserror::Error;

/// Convenience alias for results returned by the storage engine.
pub type Result<T> = std::result::Result<T, HocError>;

/// Primary error type for the HOCDB storage engine.
#[derive(Error, Debug)]
pub enum HocError {
    /// The schema has no `timestamp` field, or declares an unsupported kind,
    /// or repeats a field name.
    #[error("bad schema: {0}")]
    BadSchema(String),

    /// A schema supplied on reopen does not match the one the dataset was
    /// created with (field count, names, kinds, or order differ).
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The file's magic bytes do not match `"HOCD"`.
    #[error("corrupt file: {0}")]
    CorruptFile(String),

    /// The file's `format_version` is newer than this engine understands.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),

    /// `append` was called with a byte slice whose length does not equal
    /// the schema's stride.
    #[error("invalid record size: expected {expected} bytes, got {actual}")]
    InvalidRecordSize { expected: usize, actual: usize },

    /// `append` was called with a timestamp that does not exceed
    /// `last_timestamp`, and `auto_increment` is disabled.
    #[error("timestamp {ts} is not greater than last timestamp {last}")]
    NonMonotonicTimestamp { ts: i64, last: i64 },

    /// The ring buffer is full and `overwrite_on_full` is disabled.
    #[error("buffer full: capacity {capacity} records reached")]
    BufferFull { capacity: u32 },

    /// `get_latest` (or any read) was called on a dataset with no records.
    #[error("dataset is empty")]
    Empty,

    /// A field index passed to `get_stats` named a non-numeric field, or a
    /// filter's declared kind did not match the schema's kind for that field.
    #[error("field kind mismatch: {0}")]
    FieldKindMismatch(String),

    /// A field index was out of range for the schema.
    #[error("unknown field index {0}")]
    UnknownField(usize),

    /// Underlying filesystem or memory-mapping failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HocError {
    /// The C ABI's stable integer code for `hocdb_append`: `0` is success,
    /// negative values distinguish failure modes. Other entry points only
    /// distinguish success (`0`) from failure (nonzero) or null, so this
    /// mapping is specific to `append`.
    pub fn append_code(&self) -> i32 {
        match self {
            HocError::InvalidRecordSize { .. } => -2,
            HocError::NonMonotonicTimestamp { .. } => -3,
            _ => -1,
        }
    }
}
