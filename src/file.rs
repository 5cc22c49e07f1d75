//! On-disk file format: 64-byte header plus a fixed-stride record region,
//! backed by a memory-mapped file in the style of
//! `daq_storage::ring_buffer::RingBuffer`.
#![allow(unsafe_code)]

use crate::error::{HocError, Result};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

const MAGIC: [u8; 4] = *b"HOCD";
const FORMAT_VERSION: u16 = 1;
pub(crate) const HEADER_SIZE: usize = 64;
const FLAG_WRAPPED: u16 = 1 << 0;
const DEFAULT_MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// The 64-byte on-disk header, mapped directly over the start of the file.
///
/// Field order and widths are part of the on-disk contract (§3 of the
/// spec): reordering or resizing any field changes the wire format.
#[repr(C)]
struct HocDbHeader {
    magic: [u8; 4],
    format_version: u16,
    flags: u16,
    write_cursor: u32,
    record_count: u32,
    _reserved: [u8; 48],
}

const _: () = assert!(
    std::mem::size_of::<HocDbHeader>() == HEADER_SIZE,
    "HocDbHeader size must equal HEADER_SIZE (64 bytes)"
);

/// A dataset's backing file: the memory-mapped header plus the record
/// region it fronts.
///
/// # Safety
/// `header` and `data_ptr` point into `mmap` and are valid for as long as
/// `mmap` is not dropped. This type is not `Sync`: callers must serialize
/// access to a single `DatasetFile`, per §5 of the spec.
pub(crate) struct DatasetFile {
    path: PathBuf,
    file: File,
    mmap: MmapMut,
    header: *mut HocDbHeader,
    data_ptr: *mut u8,
    capacity: u32,
    stride: usize,
}

// SAFETY: DatasetFile owns its mmap outright and is only ever accessed
// through `&mut self` or a single-threaded caller serializing access
// externally (see §5: handles are not safe for concurrent use).
unsafe impl Send for DatasetFile {}

impl DatasetFile {
    /// Create a new dataset file of `max_file_size` bytes (0 → 64 MiB
    /// default), sized to hold `capacity = floor((max_file_size - 64) /
    /// stride)` records of `stride` bytes each.
    pub fn create(path: &Path, max_file_size: u64, stride: usize) -> Result<Self> {
        let max_file_size = if max_file_size == 0 {
            DEFAULT_MAX_FILE_SIZE
        } else {
            max_file_size
        };

        let capacity = ((max_file_size.saturating_sub(HEADER_SIZE as u64)) / stride as u64)
            .min(u32::MAX as u64) as u32;
        let total_size = HEADER_SIZE as u64 + capacity as u64 * stride as u64;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(total_size)?;

        let mut mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        debug_assert!(mmap.len() >= HEADER_SIZE);

        // SAFETY: mmap is at least HEADER_SIZE bytes (total_size includes it).
        let header = mmap.as_mut_ptr() as *mut HocDbHeader;
        unsafe {
            (*header).magic = MAGIC;
            (*header).format_version = FORMAT_VERSION;
            (*header).flags = 0;
            (*header).write_cursor = 0;
            (*header).record_count = 0;
            (*header)._reserved = [0u8; 48];
        }

        // SAFETY: mmap is total_size bytes, so offset HEADER_SIZE is in bounds.
        let data_ptr = unsafe { mmap.as_mut_ptr().add(HEADER_SIZE) };

        let mut dataset_file = Self {
            path: path.to_path_buf(),
            file,
            mmap,
            header,
            data_ptr,
            capacity,
            stride,
        };
        dataset_file.flush()?;
        Ok(dataset_file)
    }

    /// Open an existing dataset file, validating magic and version.
    pub fn open(path: &Path, stride: usize) -> Result<Self> {
        let file: File = OpenOptions::new().read(true).write(true).open(path)?;
        let mut mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        if mmap.len() < HEADER_SIZE {
            return Err(HocError::CorruptFile(format!(
                "file is {} bytes, shorter than the {}-byte header",
                mmap.len(),
                HEADER_SIZE
            )));
        }

        // SAFETY: mmap.len() >= HEADER_SIZE, validated above.
        let header = mmap.as_mut_ptr() as *mut HocDbHeader;
        let (magic, version) = unsafe { ((*header).magic, (*header).format_version) };

        if magic != MAGIC {
            return Err(HocError::CorruptFile(format!(
                "bad magic bytes {magic:?}, expected {MAGIC:?}"
            )));
        }
        if version != FORMAT_VERSION {
            return Err(HocError::UnsupportedVersion(version));
        }

        let record_region = mmap.len() - HEADER_SIZE;
        let capacity = (record_region / stride) as u32;

        // SAFETY: offset HEADER_SIZE is within [0, mmap.len()), checked above.
        let data_ptr = unsafe { mmap.as_mut_ptr().add(HEADER_SIZE) };

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mmap,
            header,
            data_ptr,
            capacity,
            stride,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn wrapped(&self) -> bool {
        // SAFETY: header is valid for the lifetime of self.
        unsafe { (*self.header).flags & FLAG_WRAPPED != 0 }
    }

    pub fn write_cursor(&self) -> u32 {
        // SAFETY: header is valid for the lifetime of self.
        unsafe { (*self.header).write_cursor }
    }

    pub fn set_state(&mut self, write_cursor: u32, wrapped: bool, record_count: u32) {
        // SAFETY: header is valid for the lifetime of self, and we hold &mut self.
        unsafe {
            (*self.header).write_cursor = write_cursor;
            (*self.header).flags = if wrapped { FLAG_WRAPPED } else { 0 };
            (*self.header).record_count = record_count;
        }
    }

    /// Read the record stored at `slot` (0-indexed into the record region).
    pub fn read_slot(&self, slot: u32) -> &[u8] {
        debug_assert!(slot < self.capacity);
        let offset = slot as usize * self.stride;
        // SAFETY: offset + stride <= capacity * stride, which is within the
        // mmap's record region by construction (create/open size it that way).
        unsafe { std::slice::from_raw_parts(self.data_ptr.add(offset), self.stride) }
    }

    /// Overwrite the record stored at `slot` with `data` (must be `stride` bytes).
    pub fn write_slot(&mut self, slot: u32, data: &[u8]) {
        debug_assert_eq!(data.len(), self.stride);
        debug_assert!(slot < self.capacity);
        let offset = slot as usize * self.stride;
        // SAFETY: offset + stride <= capacity * stride, within the mmap's
        // record region; data.len() == self.stride, checked above.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.data_ptr.add(offset), data.len());
        }
    }

    /// Persist header and data to durable storage (`msync` + `fsync`).
    pub fn flush(&mut self) -> Result<()> {
        self.mmap.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}
