//! The native Rust facade over the storage engine (Component I): `Dataset`
//! ties together the schema, the memory-mapped file, and the ring buffer
//! state to implement append, flush, load, query, and aggregation.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{HocError, Result};
use crate::file::DatasetFile;
use crate::filter::Filter;
use crate::record::{read_i64, read_numeric, write_i64};
use crate::ring::RingState;
use crate::schema::Schema;
use crate::stats::{Stats, StatsAccumulator};

/// Engine-level configuration, supplied by the caller at create/open time
/// and fixed for the handle's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct DatasetConfig {
    /// Total file size in bytes; 0 selects the 64 MiB default.
    pub max_file_size: u64,
    /// When the ring buffer is full, overwrite the oldest record instead of
    /// failing the append.
    pub overwrite_on_full: bool,
    /// Flush (msync + fsync) after every append.
    pub flush_on_write: bool,
    /// Assign `last_timestamp + 1` to every append, ignoring the caller's
    /// supplied timestamp.
    pub auto_increment: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            max_file_size: 0,
            overwrite_on_full: true,
            flush_on_write: false,
            auto_increment: false,
        }
    }
}

fn schema_sidecar_path(data_path: &Path) -> PathBuf {
    let mut os = data_path.as_os_str().to_owned();
    os.push(".schema");
    PathBuf::from(os)
}

fn data_path(dir: &Path, ticker: &str) -> PathBuf {
    dir.join(format!("{ticker}.hoc"))
}

/// A single open `(ticker, directory)` dataset: the unit of work behind
/// both the native Rust API and the raw handle the C ABI hands out.
///
/// Deliberately not `Sync`: callers must serialize access to a handle, and
/// `_not_sync` makes sharing `&Dataset` across threads a compile error
/// rather than a documented hazard. `Dataset` is still `Send`, so a handle
/// may be handed off to another thread outright.
pub struct Dataset {
    schema: Schema,
    file: DatasetFile,
    ring: RingState,
    config: DatasetConfig,
    _not_sync: std::marker::PhantomData<std::cell::Cell<()>>,
}

impl Dataset {
    /// Create a new dataset, or open an existing one and validate the
    /// supplied schema against it.
    pub fn open_or_create(
        ticker: &str,
        dir: &Path,
        schema: Schema,
        config: DatasetConfig,
    ) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = data_path(dir, ticker);
        let sidecar = schema_sidecar_path(&path);

        if path.exists() {
            info!(ticker, path = %path.display(), "opening existing dataset");
            let file = DatasetFile::open(&path, schema.stride())?;

            let persisted_json = fs::read_to_string(&sidecar).map_err(|e| {
                HocError::SchemaMismatch(format!(
                    "missing or unreadable schema sidecar {}: {e}",
                    sidecar.display()
                ))
            })?;
            let persisted: Schema = serde_json::from_str(&persisted_json)
                .map_err(|e| HocError::SchemaMismatch(format!("corrupt schema sidecar: {e}")))?;
            schema.validate_against(&persisted)?;

            let ts_offset = schema.offset_of(schema.timestamp_index()).unwrap();
            let ring = RingState::recover(
                file.write_cursor(),
                file.wrapped(),
                file.capacity(),
                |slot| read_i64(file.read_slot(slot), ts_offset),
            );
            debug!(?ring, "recovered ring state");

            Ok(Self {
                schema,
                file,
                ring,
                config,
                _not_sync: std::marker::PhantomData,
            })
        } else {
            info!(ticker, path = %path.display(), "creating new dataset");
            let file = DatasetFile::create(&path, config.max_file_size, schema.stride())?;
            fs::write(&sidecar, serde_json::to_string(&schema).unwrap_or_default())?;
            let ring = RingState::fresh(file.capacity());
            Ok(Self {
                schema,
                file,
                ring,
                config,
                _not_sync: std::marker::PhantomData,
            })
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn field_index_of(&self, name: &str) -> Option<usize> {
        self.schema.field_index_of(name)
    }

    /// Append a record image, enforcing size and timestamp invariants.
    pub fn append(&mut self, record: &[u8]) -> Result<()> {
        if record.len() != self.schema.stride() {
            return Err(HocError::InvalidRecordSize {
                expected: self.schema.stride(),
                actual: record.len(),
            });
        }

        let ts_offset = self.schema.offset_of(self.schema.timestamp_index()).unwrap();
        let mut record = record.to_vec();
        let ts_in = read_i64(&record, ts_offset);

        let ts_assigned = if self.config.auto_increment {
            // The very first append has no prior timestamp; auto-increment
            // starts counting from 0 rather than the "-inf" sentinel used
            // for the monotonicity check below.
            let base = if self.ring.last_timestamp == crate::ring::NO_TIMESTAMP {
                0
            } else {
                self.ring.last_timestamp
            };
            let assigned = base.saturating_add(1);
            write_i64(&mut record, ts_offset, assigned);
            assigned
        } else {
            if ts_in <= self.ring.last_timestamp {
                return Err(HocError::NonMonotonicTimestamp {
                    ts: ts_in,
                    last: self.ring.last_timestamp,
                });
            }
            ts_in
        };

        if self.ring.write_cursor == self.ring.capacity {
            if self.config.overwrite_on_full {
                self.ring.write_cursor = 0;
                self.ring.wrapped = true;
            } else {
                return Err(HocError::BufferFull {
                    capacity: self.ring.capacity,
                });
            }
        }

        let slot = self.ring.write_cursor;
        self.file.write_slot(slot, &record);

        self.ring.write_cursor += 1;
        self.ring.last_timestamp = ts_assigned;
        let record_count = self.ring.record_count();
        self.file
            .set_state(self.ring.write_cursor, self.ring.wrapped, record_count);

        if self.config.flush_on_write {
            self.file.flush()?;
        }

        if self.ring.wrapped && slot == 0 {
            warn!(capacity = self.ring.capacity, "ring buffer wrapped");
        }

        Ok(())
    }

    /// Force header and data to durable storage.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()
    }

    /// All live records, oldest first.
    pub fn load(&self) -> Vec<u8> {
        let stride = self.schema.stride();
        let order = self.ring.load_order();
        let mut out = Vec::with_capacity(order.len() * stride);
        for slot in order {
            out.extend_from_slice(self.file.read_slot(slot));
        }
        out
    }

    /// Records in `[start_ts, end_ts)` that pass every filter, in load order.
    pub fn query(&self, start_ts: i64, end_ts: i64, filters: &[Filter]) -> Vec<u8> {
        let stride = self.schema.stride();
        let ts_offset = self.schema.offset_of(self.schema.timestamp_index()).unwrap();
        let order = self.ring.load_order();
        let mut out = Vec::with_capacity(order.len() * stride);

        for slot in order {
            let record = self.file.read_slot(slot);
            let ts = read_i64(record, ts_offset);
            if ts < start_ts || ts >= end_ts {
                continue;
            }
            let matches_all = filters.iter().all(|f| {
                let schema_kind = match self.schema.kind_of(f.field_index) {
                    Some(k) => k,
                    None => return false,
                };
                let offset = match self.schema.offset_of(f.field_index) {
                    Some(o) => o,
                    None => return false,
                };
                f.matches(record, schema_kind, offset)
            });
            if matches_all {
                out.extend_from_slice(record);
            }
        }
        debug_assert_eq!(out.len() % stride, 0);
        out
    }

    /// Aggregate a numeric field over `[start_ts, end_ts)`.
    pub fn get_stats(&self, start_ts: i64, end_ts: i64, field_index: usize) -> Result<Stats> {
        let kind = self
            .schema
            .kind_of(field_index)
            .ok_or(HocError::UnknownField(field_index))?;
        if !kind.is_numeric() {
            return Err(HocError::FieldKindMismatch(format!(
                "field {field_index} has non-numeric kind {kind:?}"
            )));
        }
        let offset = self.schema.offset_of(field_index).unwrap();
        let ts_offset = self.schema.offset_of(self.schema.timestamp_index()).unwrap();

        let mut acc = StatsAccumulator::new();
        for slot in self.ring.load_order() {
            let record = self.file.read_slot(slot);
            let ts = read_i64(record, ts_offset);
            if ts < start_ts || ts >= end_ts {
                continue;
            }
            acc.accumulate(read_numeric(record, offset, kind)?);
        }
        Ok(acc.finish())
    }

    /// The newest record's value for `field_index`, widened to `f64`, and
    /// its timestamp. Fails with [`HocError::Empty`] on an empty dataset.
    pub fn get_latest(&self, field_index: usize) -> Result<(f64, i64)> {
        if self.ring.record_count() == 0 {
            return Err(HocError::Empty);
        }
        let kind = self
            .schema
            .kind_of(field_index)
            .ok_or(HocError::UnknownField(field_index))?;
        let offset = self.schema.offset_of(field_index).unwrap();
        let ts_offset = self.schema.offset_of(self.schema.timestamp_index()).unwrap();

        let newest_slot = if self.ring.write_cursor == 0 {
            self.ring.capacity - 1
        } else {
            self.ring.write_cursor - 1
        };
        let record = self.file.read_slot(newest_slot);
        let ts = read_i64(record, ts_offset);
        let value = read_numeric(record, offset, kind)?;
        Ok((value, ts))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn capacity(&self) -> u32 {
        self.ring.capacity
    }

    pub fn record_count(&self) -> u32 {
        self.ring.record_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterValue;
    use crate::schema::{Field, FieldKind};

    fn schema() -> Schema {
        Schema::resolve(vec![
            Field::new("timestamp", FieldKind::I64),
            Field::new("price", FieldKind::F64),
        ])
        .unwrap()
    }

    fn record(ts: i64, price: f64) -> Vec<u8> {
        let mut buf = vec![0u8; 16];
        buf[0..8].copy_from_slice(&ts.to_le_bytes());
        buf[8..16].copy_from_slice(&price.to_le_bytes());
        buf
    }

    #[test]
    fn append_load_and_get_latest() {
        let dir = tempfile::tempdir().unwrap();
        let mut ds =
            Dataset::open_or_create("t", dir.path(), schema(), DatasetConfig::default()).unwrap();
        ds.append(&record(1, 1.0)).unwrap();
        ds.append(&record(2, 2.0)).unwrap();
        ds.append(&record(3, 3.0)).unwrap();

        assert_eq!(ds.record_count(), 3);
        assert_eq!(ds.load().len(), 3 * 16);
        let (value, ts) = ds.get_latest(1).unwrap();
        assert_eq!(value, 3.0);
        assert_eq!(ts, 3);
    }

    #[test]
    fn rejects_non_monotonic_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let mut ds =
            Dataset::open_or_create("t", dir.path(), schema(), DatasetConfig::default()).unwrap();
        ds.append(&record(5, 1.0)).unwrap();
        let err = ds.append(&record(5, 2.0)).unwrap_err();
        assert!(matches!(err, HocError::NonMonotonicTimestamp { .. }));
    }

    #[test]
    fn query_filters_by_time_range_and_field() {
        let dir = tempfile::tempdir().unwrap();
        let mut ds =
            Dataset::open_or_create("t", dir.path(), schema(), DatasetConfig::default()).unwrap();
        for i in 1..=5i64 {
            ds.append(&record(i, i as f64)).unwrap();
        }
        let out = ds.query(2, 5, &[]);
        assert_eq!(out.len(), 16 * 3);

        let out = ds.query(i64::MIN, i64::MAX, &[Filter::new(1, FilterValue::F64(3.0))]);
        assert_eq!(out.len(), 16);
    }

    #[test]
    fn get_stats_on_empty_range_is_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let mut ds =
            Dataset::open_or_create("t", dir.path(), schema(), DatasetConfig::default()).unwrap();
        ds.append(&record(1, 1.0)).unwrap();
        let stats = ds.get_stats(100, 200, 1).unwrap();
        assert_eq!(stats.min, f64::INFINITY);
        assert_eq!(stats.max, f64::NEG_INFINITY);
        assert_eq!(stats.sum, 0.0);
        assert_eq!(stats.count, 0);
        assert!(stats.mean.is_nan());
    }

    #[test]
    fn reopen_recovers_ring_state_and_rejects_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut ds = Dataset::open_or_create(
                "t",
                dir.path(),
                schema(),
                DatasetConfig::default(),
            )
            .unwrap();
            ds.append(&record(1, 1.0)).unwrap();
            ds.append(&record(2, 2.0)).unwrap();
        }

        let reopened =
            Dataset::open_or_create("t", dir.path(), schema(), DatasetConfig::default()).unwrap();
        assert_eq!(reopened.record_count(), 2);
        let (value, ts) = reopened.get_latest(1).unwrap();
        assert_eq!((value, ts), (2.0, 2));

        let mismatched = Schema::resolve(vec![
            Field::new("timestamp", FieldKind::I64),
            Field::new("price", FieldKind::I64),
        ])
        .unwrap();
        let err = Dataset::open_or_create("t", dir.path(), mismatched, DatasetConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, HocError::SchemaMismatch(_)));
    }

    #[test]
    fn ring_overwrites_oldest_on_wrap() {
        let dir = tempfile::tempdir().unwrap();
        let stride = schema().stride();
        let max_file_size = crate::file::HEADER_SIZE as u64 + 3 * stride as u64;
        let config = DatasetConfig {
            max_file_size,
            ..DatasetConfig::default()
        };
        let mut ds = Dataset::open_or_create("t", dir.path(), schema(), config).unwrap();
        assert_eq!(ds.capacity(), 3);
        for i in 1..=4i64 {
            ds.append(&record(i, i as f64)).unwrap();
        }
        assert_eq!(ds.record_count(), 3);
        let loaded = ds.load();
        let first_ts = i64::from_le_bytes(loaded[0..8].try_into().unwrap());
        assert_eq!(first_ts, 2);
    }
}
