//! Reading and writing typed fields inside a fixed-stride record image.

use crate::error::{HocError, Result};
use crate::schema::FieldKind;

/// Read the `i64` at `offset` in `record` (used for the timestamp field,
/// which is always `I64`).
pub(crate) fn read_i64(record: &[u8], offset: usize) -> i64 {
    i64::from_le_bytes(record[offset..offset + 8].try_into().unwrap())
}

/// Overwrite the `i64` at `offset` in `record` (used by auto-increment).
pub(crate) fn write_i64(record: &mut [u8], offset: usize, value: i64) {
    record[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Widen a numeric field (`I64`, `U64`, or `F64`) to `f64` for aggregation.
/// Fails with [`HocError::FieldKindMismatch`] for `BOOL`/`STRING` fields.
pub(crate) fn read_numeric(record: &[u8], offset: usize, kind: FieldKind) -> Result<f64> {
    match kind {
        FieldKind::I64 => Ok(read_i64(record, offset) as f64),
        FieldKind::U64 => Ok(u64::from_le_bytes(record[offset..offset + 8].try_into().unwrap()) as f64),
        FieldKind::F64 => Ok(f64::from_le_bytes(record[offset..offset + 8].try_into().unwrap())),
        FieldKind::Bool | FieldKind::String => Err(HocError::FieldKindMismatch(format!(
            "field of kind {kind:?} is not numeric"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_timestamp() {
        let mut record = vec![0u8; 8];
        write_i64(&mut record, 0, -7);
        assert_eq!(read_i64(&record, 0), -7);
    }

    #[test]
    fn widens_numeric_kinds() {
        let mut record = vec![0u8; 8];
        record.copy_from_slice(&42i64.to_le_bytes());
        assert_eq!(read_numeric(&record, 0, FieldKind::I64).unwrap(), 42.0);

        record.copy_from_slice(&3.5f64.to_le_bytes());
        assert_eq!(read_numeric(&record, 0, FieldKind::F64).unwrap(), 3.5);

        record.copy_from_slice(&9u64.to_le_bytes());
        assert_eq!(read_numeric(&record, 0, FieldKind::U64).unwrap(), 9.0);
    }

    #[test]
    fn rejects_non_numeric_kinds() {
        let record = vec![0u8; 128];
        assert!(read_numeric(&record, 0, FieldKind::String).is_err());
        assert!(read_numeric(&record, 0, FieldKind::Bool).is_err());
    }
}
