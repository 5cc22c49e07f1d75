//! HOCDB: an embeddable, single-writer, append-oriented store for
//! fixed-width, time-indexed records, exposed to native Rust callers and,
//! through [`abi`], to C.
//!
//! A dataset is a single memory-mapped file: a 64-byte header followed by a
//! fixed-capacity ring of fixed-stride record slots. Appends are
//! monotonic-timestamp-ordered (or auto-incrementing), and once the ring
//! fills, the oldest record is overwritten. There is no secondary index;
//! queries and aggregates are a single linear scan over the live records.

pub mod abi;
pub mod engine;
pub mod error;
pub mod filter;
pub mod ring;
pub mod schema;
pub mod stats;

pub(crate) mod file;
pub(crate) mod record;

pub use engine::{Dataset, DatasetConfig};
pub use error::{HocError, Result};
pub use filter::{Filter, FilterValue};
pub use schema::{Field, FieldKind, Schema};
pub use stats::Stats;

/// Size in bytes of the fixed on-disk header, for callers computing a
/// dataset's `max_file_size` from a desired record capacity.
pub fn file_header_size() -> usize {
    file::HEADER_SIZE
}
