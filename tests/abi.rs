//! Exercises the C ABI surface directly, simulating a C caller: raw
//! pointers, null-terminated strings, and caller-owned buffers.

use std::ffi::CString;
use std::os::raw::c_void;

use hocdb::abi::{
    hocdb_append, hocdb_close, hocdb_free, hocdb_get_field_index, hocdb_get_latest,
    hocdb_get_stats, hocdb_init, hocdb_load, hocdb_query, CField, HOCDB_TYPE_F64, HOCDB_TYPE_I64,
};

fn cfield(name: &CString, kind: i32) -> CField {
    CField {
        name: name.as_ptr(),
        kind,
    }
}

#[test]
fn full_round_trip_through_the_c_abi() {
    let dir = tempfile::tempdir().unwrap();
    let ticker = CString::new("abi-demo").unwrap();
    let path = CString::new(dir.path().to_str().unwrap()).unwrap();
    let ts_name = CString::new("timestamp").unwrap();
    let price_name = CString::new("price").unwrap();
    let fields = [
        cfield(&ts_name, HOCDB_TYPE_I64),
        cfield(&price_name, HOCDB_TYPE_F64),
    ];

    let handle = unsafe {
        hocdb_init(
            ticker.as_ptr(),
            path.as_ptr(),
            fields.as_ptr(),
            fields.len(),
            0,
            1,
            0,
            0,
        )
    };
    assert!(!handle.is_null());

    for (ts, price) in [(1i64, 10.0f64), (2, 20.0), (3, 30.0)] {
        let mut record = [0u8; 16];
        record[0..8].copy_from_slice(&ts.to_le_bytes());
        record[8..16].copy_from_slice(&price.to_le_bytes());
        let rc = unsafe {
            hocdb_append(handle, record.as_ptr() as *const c_void, record.len())
        };
        assert_eq!(rc, 0);
    }

    let mut out_len: usize = 0;
    let buf = unsafe { hocdb_load(handle, &mut out_len) };
    assert!(!buf.is_null());
    assert_eq!(out_len, 3 * 16);

    let price_index = unsafe { hocdb_get_field_index(handle, price_name.as_ptr()) };
    assert_eq!(price_index, 1);

    let mut value = 0.0f64;
    let mut ts = 0i64;
    let rc = unsafe { hocdb_get_latest(handle, price_index as usize, &mut value, &mut ts) };
    assert_eq!(rc, 0);
    assert_eq!((value, ts), (30.0, 3));

    let mut stats = std::mem::MaybeUninit::uninit();
    let rc = unsafe {
        hocdb_get_stats(
            handle,
            i64::MIN,
            i64::MAX,
            price_index as usize,
            stats.as_mut_ptr(),
        )
    };
    assert_eq!(rc, 0);
    let stats = unsafe { stats.assume_init() };
    assert_eq!(stats.count, 3);
    assert_eq!(stats.sum, 60.0);

    let mut query_len: usize = 0;
    let query_buf = unsafe {
        hocdb_query(
            handle,
            10_000,
            20_000,
            std::ptr::null(),
            0,
            &mut query_len,
        )
    };
    assert!(!query_buf.is_null());
    assert_eq!(query_len, 0);

    unsafe {
        hocdb_free(buf, out_len);
        hocdb_free(query_buf, query_len);
        hocdb_close(handle);
    }
}

#[test]
fn null_handle_is_safe_for_every_entry_point() {
    let mut out_len: usize = 1;
    assert!(unsafe { hocdb_load(std::ptr::null_mut(), &mut out_len) }.is_null());
    assert_eq!(out_len, 0);

    let rc = unsafe { hocdb_append(std::ptr::null_mut(), std::ptr::null(), 0) };
    assert_eq!(rc, -1);

    unsafe { hocdb_close(std::ptr::null_mut()) };
}

#[test]
fn init_with_malformed_schema_returns_null() {
    let dir = tempfile::tempdir().unwrap();
    let ticker = CString::new("bad-schema").unwrap();
    let path = CString::new(dir.path().to_str().unwrap()).unwrap();
    let name = CString::new("not_timestamp").unwrap();
    let fields = [cfield(&name, HOCDB_TYPE_I64)];

    let handle = unsafe {
        hocdb_init(
            ticker.as_ptr(),
            path.as_ptr(),
            fields.as_ptr(),
            fields.len(),
            0,
            1,
            0,
            0,
        )
    };
    assert!(handle.is_null());
}
