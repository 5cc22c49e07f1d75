//! The C ABI surface (Component H): a thin, null-safe `extern "C"` layer over
//! [`crate::engine::Dataset`]. A handle is a bare `Box::into_raw` pointer —
//! there is no shared handle table, so two threads must never touch the same
//! handle concurrently (the whole point of `Dataset` not being `Sync`).
#![allow(unsafe_code)]

use std::ffi::{c_char, c_double, c_int, c_void, CStr};
use std::path::Path;
use std::slice;

use tracing::error;

use crate::engine::{Dataset, DatasetConfig};
use crate::filter::{Filter, FilterValue};
use crate::schema::{Field, FieldKind, Schema};

/// Field type constants, matching the original C header.
pub const HOCDB_TYPE_I64: c_int = 1;
pub const HOCDB_TYPE_F64: c_int = 2;
pub const HOCDB_TYPE_U64: c_int = 3;
pub const HOCDB_TYPE_BOOL: c_int = 4;
pub const HOCDB_TYPE_STRING: c_int = 5;

/// Schema field declaration, as supplied by C callers to `hocdb_init`.
#[repr(C)]
pub struct CField {
    pub name: *const c_char,
    pub kind: c_int,
}

/// An opaque database handle. Always a `Box<Dataset>` pointer cast to
/// `*mut c_void`, or null.
pub type HOCDBHandle = *mut c_void;

/// A single `field == value` predicate, as supplied by C callers to
/// `hocdb_query`. Only the member matching `kind` is read.
#[repr(C)]
pub struct HOCDBFilter {
    pub field_index: usize,
    pub kind: c_int,
    pub val_i64: i64,
    pub val_f64: c_double,
    pub val_u64: u64,
    pub val_string: [c_char; 128],
}

/// Aggregation result returned by `hocdb_get_stats`.
#[repr(C)]
pub struct HOCDBStats {
    pub min: c_double,
    pub max: c_double,
    pub sum: c_double,
    pub count: u64,
    pub mean: c_double,
}

unsafe fn str_from_c(ptr: *const c_char) -> Option<&'static str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

unsafe fn schema_from_cfields(schema: *const CField, schema_len: usize) -> Option<Schema> {
    if schema.is_null() {
        return None;
    }
    let raw = slice::from_raw_parts(schema, schema_len);
    let mut fields = Vec::with_capacity(schema_len);
    for f in raw {
        let name = str_from_c(f.name)?;
        let kind = FieldKind::from_abi_code(f.kind)?;
        fields.push(Field::new(name, kind));
    }
    Schema::resolve(fields).ok()
}

/// Create a new dataset, or open and validate an existing one.
///
/// Returns a handle on success, or null if the ticker/path are not valid
/// UTF-8, the schema is malformed, or the underlying file operation fails.
///
/// # Safety
/// `ticker` and `path` must be valid, null-terminated C strings. `schema`
/// must point to an array of at least `schema_len` initialized `CField`s
/// whose `name` pointers are valid, null-terminated C strings for the
/// duration of this call.
#[no_mangle]
pub unsafe extern "C" fn hocdb_init(
    ticker: *const c_char,
    path: *const c_char,
    schema: *const CField,
    schema_len: usize,
    max_file_size: i64,
    overwrite_on_full: c_int,
    flush_on_write: c_int,
    auto_increment: c_int,
) -> HOCDBHandle {
    let Some(ticker) = str_from_c(ticker) else {
        return std::ptr::null_mut();
    };
    let Some(path) = str_from_c(path) else {
        return std::ptr::null_mut();
    };
    let Some(schema) = schema_from_cfields(schema, schema_len) else {
        return std::ptr::null_mut();
    };

    let config = DatasetConfig {
        max_file_size: max_file_size.max(0) as u64,
        overwrite_on_full: overwrite_on_full != 0,
        flush_on_write: flush_on_write != 0,
        auto_increment: auto_increment != 0,
    };

    match Dataset::open_or_create(ticker, Path::new(path), schema, config) {
        Ok(dataset) => Box::into_raw(Box::new(dataset)) as HOCDBHandle,
        Err(e) => {
            error!(error = %e, "hocdb_init failed");
            std::ptr::null_mut()
        }
    }
}

unsafe fn handle_ref<'a>(handle: HOCDBHandle) -> Option<&'a mut Dataset> {
    (handle as *mut Dataset).as_mut()
}

/// Append a raw record. Returns `0` on success, `-1` on a null handle or
/// generic failure, `-2` on a wrong-size record, `-3` on a non-monotonic
/// timestamp.
///
/// # Safety
/// `handle` must be a live handle from `hocdb_init` (or null). `data` must
/// point to at least `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn hocdb_append(handle: HOCDBHandle, data: *const c_void, len: usize) -> c_int {
    let Some(dataset) = handle_ref(handle) else {
        return -1;
    };
    if data.is_null() {
        return -1;
    }
    let record = slice::from_raw_parts(data as *const u8, len);
    match dataset.append(record) {
        Ok(()) => 0,
        Err(e) => e.append_code(),
    }
}

/// Flush the dataset to disk. Returns `0` on success, nonzero on failure.
///
/// # Safety
/// `handle` must be a live handle from `hocdb_init` (or null).
#[no_mangle]
pub unsafe extern "C" fn hocdb_flush(handle: HOCDBHandle) -> c_int {
    let Some(dataset) = handle_ref(handle) else {
        return -1;
    };
    match dataset.flush() {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Hand a buffer to the caller with an allocation sized exactly to its
/// length. `bytes` may have spare capacity left over from `Vec` growth;
/// going through `into_boxed_slice` drops that slack so the pointer/len
/// pair `hocdb_free` receives is enough to reconstruct the allocation
/// exactly, without needing to remember or guess a separate capacity.
fn box_buffer(bytes: Vec<u8>, out_len: *mut usize) -> *mut c_void {
    let boxed: Box<[u8]> = bytes.into_boxed_slice();
    unsafe {
        *out_len = boxed.len();
    }
    Box::into_raw(boxed) as *mut c_void
}

/// Load every live record, oldest first. Returns a caller-owned buffer (free
/// with `hocdb_free`) and writes its length to `out_len`. Returns null only
/// on a null/invalid handle; an empty dataset yields a non-null zero-length
/// buffer.
///
/// # Safety
/// `handle` must be a live handle from `hocdb_init` (or null). `out_len`
/// must point to a writable `usize`.
#[no_mangle]
pub unsafe extern "C" fn hocdb_load(handle: HOCDBHandle, out_len: *mut usize) -> *mut c_void {
    let Some(dataset) = handle_ref(handle) else {
        *out_len = 0;
        return std::ptr::null_mut();
    };
    box_buffer(dataset.load(), out_len)
}

unsafe fn filters_from_raw(filters: *const HOCDBFilter, filters_len: usize) -> Option<Vec<Filter>> {
    if filters.is_null() || filters_len == 0 {
        return Some(Vec::new());
    }
    let raw = slice::from_raw_parts(filters, filters_len);
    let mut out = Vec::with_capacity(filters_len);
    for f in raw {
        let value = match f.kind {
            HOCDB_TYPE_I64 => FilterValue::I64(f.val_i64),
            HOCDB_TYPE_F64 => FilterValue::F64(f.val_f64),
            HOCDB_TYPE_U64 => FilterValue::U64(f.val_u64),
            HOCDB_TYPE_BOOL => FilterValue::Bool(f.val_i64 != 0),
            HOCDB_TYPE_STRING => {
                let bytes = &f.val_string;
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                let s: Vec<u8> = bytes[..end].iter().map(|&c| c as u8).collect();
                FilterValue::String(String::from_utf8(s).ok()?)
            }
            _ => return None,
        };
        out.push(Filter::new(f.field_index, value));
    }
    Some(out)
}

/// Query records in `[start_ts, end_ts)` passing every filter. Returns a
/// caller-owned buffer (free with `hocdb_free`) and writes its length to
/// `out_len`. Returns null only on a null/invalid handle or malformed
/// filter array; an empty result set yields a non-null zero-length buffer.
///
/// # Safety
/// `handle` must be a live handle from `hocdb_init` (or null). `filters`
/// must be null (with `filters_len` 0) or point to `filters_len` readable
/// `HOCDBFilter`s. `out_len` must point to a writable `usize`.
#[no_mangle]
pub unsafe extern "C" fn hocdb_query(
    handle: HOCDBHandle,
    start_ts: i64,
    end_ts: i64,
    filters: *const HOCDBFilter,
    filters_len: usize,
    out_len: *mut usize,
) -> *mut c_void {
    let Some(dataset) = handle_ref(handle) else {
        *out_len = 0;
        return std::ptr::null_mut();
    };
    let Some(filters) = filters_from_raw(filters, filters_len) else {
        *out_len = 0;
        return std::ptr::null_mut();
    };
    box_buffer(dataset.query(start_ts, end_ts, &filters), out_len)
}

/// Aggregate a numeric field over `[start_ts, end_ts)`. Returns `0` on
/// success (with `*out_stats` populated), nonzero on a null handle, unknown
/// field, or non-numeric field.
///
/// # Safety
/// `handle` must be a live handle from `hocdb_init` (or null). `out_stats`
/// must point to a writable `HOCDBStats`.
#[no_mangle]
pub unsafe extern "C" fn hocdb_get_stats(
    handle: HOCDBHandle,
    start_ts: i64,
    end_ts: i64,
    field_index: usize,
    out_stats: *mut HOCDBStats,
) -> c_int {
    let Some(dataset) = handle_ref(handle) else {
        return -1;
    };
    match dataset.get_stats(start_ts, end_ts, field_index) {
        Ok(stats) => {
            *out_stats = HOCDBStats {
                min: stats.min,
                max: stats.max,
                sum: stats.sum,
                count: stats.count,
                mean: stats.mean,
            };
            0
        }
        Err(_) => -1,
    }
}

/// The newest record's value for `field_index`. Returns `0` on success (with
/// `*out_val`/`*out_ts` populated), nonzero on a null handle, empty dataset,
/// unknown field, or non-numeric field.
///
/// # Safety
/// `handle` must be a live handle from `hocdb_init` (or null). `out_val`
/// and `out_ts` must point to writable `f64`/`i64` respectively.
#[no_mangle]
pub unsafe extern "C" fn hocdb_get_latest(
    handle: HOCDBHandle,
    field_index: usize,
    out_val: *mut c_double,
    out_ts: *mut i64,
) -> c_int {
    let Some(dataset) = handle_ref(handle) else {
        return -1;
    };
    match dataset.get_latest(field_index) {
        Ok((value, ts)) => {
            *out_val = value;
            *out_ts = ts;
            0
        }
        Err(_) => -1,
    }
}

/// Resolve a field name to its schema index. Returns `-1` if the handle is
/// null, `name` is not valid UTF-8, or no field of that name exists.
///
/// # Safety
/// `handle` must be a live handle from `hocdb_init` (or null). `name` must
/// be a valid, null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn hocdb_get_field_index(handle: HOCDBHandle, name: *const c_char) -> isize {
    let Some(dataset) = handle_ref(handle) else {
        return -1;
    };
    let Some(name) = str_from_c(name) else {
        return -1;
    };
    match dataset.field_index_of(name) {
        Some(idx) => idx as isize,
        None => -1,
    }
}

/// Free a buffer returned by `hocdb_load` or `hocdb_query`.
///
/// # Safety
/// `ptr` must be either null or a pointer previously returned by
/// `hocdb_load`/`hocdb_query` on this handle, not yet freed, with `len`
/// matching the `out_len` that call produced.
#[no_mangle]
pub unsafe extern "C" fn hocdb_free(ptr: *mut c_void, len: usize) {
    if ptr.is_null() {
        return;
    }
    let slice_ptr = std::ptr::slice_from_raw_parts_mut(ptr as *mut u8, len);
    drop(Box::from_raw(slice_ptr));
}

/// Close and free a database handle. A no-op on a null handle.
///
/// # Safety
/// `handle` must be either null or a handle from `hocdb_init` not yet
/// closed, and must not be used again after this call.
#[no_mangle]
pub unsafe extern "C" fn hocdb_close(handle: HOCDBHandle) {
    if handle.is_null() {
        return;
    }
    drop(Box::from_raw(handle as *mut Dataset));
}
