//! End-to-end scenarios exercising the public API through a tempdir-backed
//! dataset, matching the reference's documented fixtures.

use hocdb::{Dataset, DatasetConfig, Field, FieldKind, Filter, FilterValue, Schema};

fn s1_schema() -> Schema {
    Schema::resolve(vec![
        Field::new("timestamp", FieldKind::I64),
        Field::new("usd", FieldKind::F64),
        Field::new("volume", FieldKind::F64),
    ])
    .unwrap()
}

fn s1_record(ts: i64, usd: f64, volume: f64) -> Vec<u8> {
    let mut buf = vec![0u8; 24];
    buf[0..8].copy_from_slice(&ts.to_le_bytes());
    buf[8..16].copy_from_slice(&usd.to_le_bytes());
    buf[16..24].copy_from_slice(&volume.to_le_bytes());
    buf
}

#[test]
fn s1_basic_append_load_latest_stats() {
    let dir = tempfile::tempdir().unwrap();
    let mut ds =
        Dataset::open_or_create("s1", dir.path(), s1_schema(), DatasetConfig::default()).unwrap();

    ds.append(&s1_record(100, 1.1, 10.1)).unwrap();
    ds.append(&s1_record(200, 2.2, 20.2)).unwrap();
    ds.append(&s1_record(300, 3.3, 30.3)).unwrap();

    let loaded = ds.load();
    assert_eq!(loaded.len(), 3 * 24);
    assert_eq!(loaded, [
        s1_record(100, 1.1, 10.1),
        s1_record(200, 2.2, 20.2),
        s1_record(300, 3.3, 30.3),
    ]
    .concat());

    let usd_index = ds.field_index_of("usd").unwrap();
    let (value, ts) = ds.get_latest(usd_index).unwrap();
    assert_eq!((value, ts), (3.3, 300));

    let stats = ds.get_stats(0, 400, usd_index).unwrap();
    assert!((stats.min - 1.1).abs() < 1e-9);
    assert!((stats.max - 3.3).abs() < 1e-9);
    assert!((stats.sum - 6.6).abs() < 1e-9);
    assert_eq!(stats.count, 3);
    assert!((stats.mean - 2.2).abs() < 1e-9);
}

#[test]
fn s2_monotonicity_rejects_out_of_order_append() {
    let dir = tempfile::tempdir().unwrap();
    let mut ds =
        Dataset::open_or_create("s2", dir.path(), s1_schema(), DatasetConfig::default()).unwrap();
    ds.append(&s1_record(100, 1.1, 10.1)).unwrap();
    ds.append(&s1_record(200, 2.2, 20.2)).unwrap();
    ds.append(&s1_record(300, 3.3, 30.3)).unwrap();

    let err = ds.append(&s1_record(250, 9.9, 9.9)).err().unwrap();
    assert_eq!(err.append_code(), -3);
    assert_eq!(ds.record_count(), 3);
}

#[test]
fn s3_ring_overwrites_oldest_on_wrap() {
    let schema = Schema::resolve(vec![
        Field::new("timestamp", FieldKind::I64),
        Field::new("value", FieldKind::F64),
    ])
    .unwrap();
    let stride = schema.stride();
    let dir = tempfile::tempdir().unwrap();
    let config = DatasetConfig {
        max_file_size: hocdb::file_header_size() as u64 + 3 * stride as u64,
        overwrite_on_full: true,
        ..DatasetConfig::default()
    };
    let mut ds = Dataset::open_or_create("s3", dir.path(), schema, config).unwrap();
    assert_eq!(ds.capacity(), 3);

    for ts in 1..=4i64 {
        let mut rec = vec![0u8; stride];
        rec[0..8].copy_from_slice(&ts.to_le_bytes());
        rec[8..16].copy_from_slice(&(ts as f64).to_le_bytes());
        ds.append(&rec).unwrap();
    }

    let loaded = ds.load();
    let timestamps: Vec<i64> = loaded
        .chunks_exact(stride)
        .map(|c| i64::from_le_bytes(c[0..8].try_into().unwrap()))
        .collect();
    assert_eq!(timestamps, vec![2, 3, 4]);
}

#[test]
fn s4_auto_increment_recovers_across_reopen() {
    let schema = Schema::resolve(vec![
        Field::new("timestamp", FieldKind::I64),
        Field::new("value", FieldKind::F64),
    ])
    .unwrap();
    let stride = schema.stride();
    let dir = tempfile::tempdir().unwrap();
    let config = DatasetConfig {
        max_file_size: hocdb::file_header_size() as u64 + 3 * stride as u64,
        overwrite_on_full: true,
        auto_increment: true,
        ..DatasetConfig::default()
    };

    {
        let mut ds =
            Dataset::open_or_create("s4", dir.path(), schema.clone(), config).unwrap();
        for value in [1.1f64, 2.2, 3.3, 4.4] {
            let mut rec = vec![0u8; stride];
            rec[8..16].copy_from_slice(&value.to_le_bytes());
            ds.append(&rec).unwrap();
        }
    }

    let mut ds = Dataset::open_or_create("s4", dir.path(), schema, config).unwrap();
    let mut rec = vec![0u8; stride];
    rec[8..16].copy_from_slice(&5.5f64.to_le_bytes());
    ds.append(&rec).unwrap();

    let loaded = ds.load();
    let timestamps: Vec<i64> = loaded
        .chunks_exact(stride)
        .map(|c| i64::from_le_bytes(c[0..8].try_into().unwrap()))
        .collect();
    let values: Vec<f64> = loaded
        .chunks_exact(stride)
        .map(|c| f64::from_le_bytes(c[8..16].try_into().unwrap()))
        .collect();
    assert_eq!(timestamps, vec![3, 4, 5]);
    assert_eq!(values, vec![3.3, 4.4, 5.5]);
}

#[test]
fn s5_filter_matches_exact_record() {
    let schema = Schema::resolve(vec![
        Field::new("timestamp", FieldKind::I64),
        Field::new("price", FieldKind::F64),
        Field::new("event", FieldKind::I64),
    ])
    .unwrap();
    let stride = schema.stride();
    let dir = tempfile::tempdir().unwrap();
    let mut ds =
        Dataset::open_or_create("s5", dir.path(), schema.clone(), DatasetConfig::default())
            .unwrap();

    for (ts, price, event) in [(100i64, 1.0f64, 0i64), (200, 2.0, 1), (300, 3.0, 2)] {
        let mut rec = vec![0u8; stride];
        rec[0..8].copy_from_slice(&ts.to_le_bytes());
        rec[8..16].copy_from_slice(&price.to_le_bytes());
        rec[16..24].copy_from_slice(&event.to_le_bytes());
        ds.append(&rec).unwrap();
    }

    let event_index = schema.field_index_of("event").unwrap();
    let result = ds.query(0, 1000, &[Filter::new(event_index, FilterValue::I64(1))]);
    assert_eq!(result.len(), stride);
    let ts = i64::from_le_bytes(result[0..8].try_into().unwrap());
    assert_eq!(ts, 200);
}

#[test]
fn s6_empty_range_query_yields_non_null_zero_length() {
    let mut ds = Dataset::open_or_create(
        "s6",
        tempfile::tempdir().unwrap().path(),
        s1_schema(),
        DatasetConfig::default(),
    )
    .unwrap();
    ds.append(&s1_record(100, 1.1, 10.1)).unwrap();
    ds.append(&s1_record(200, 2.2, 20.2)).unwrap();
    ds.append(&s1_record(300, 3.3, 30.3)).unwrap();

    let result = ds.query(10_000, 20_000, &[]);
    assert!(result.is_empty());
}

#[test]
fn rejects_wrong_record_size() {
    let dir = tempfile::tempdir().unwrap();
    let mut ds =
        Dataset::open_or_create("bad-size", dir.path(), s1_schema(), DatasetConfig::default())
            .unwrap();
    let err = ds.append(&[0u8; 4]).err().unwrap();
    assert_eq!(err.append_code(), -2);
}
