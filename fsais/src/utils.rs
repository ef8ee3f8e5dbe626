//! Byte and file utilities: open/close, size queries, random tempfile names, bit-width helpers,
//! and RAM/disk accounting.
//!
//! Grounded on the original engine's `utils.cpp`: a single-process allocation/IO-volume counter,
//! unbuffered file handles for the background-thread readers/writers, and a random-string
//! generator used to make tempfile names collision-resistant without depending on process PID
//! uniqueness.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use biometrics::Counter;

use crate::error::{Error, Result};

//////////////////////////////////////////// biometrics ////////////////////////////////////////////

static FILE_OPENED: Counter = Counter::new("fsais.utils.file_opened");
static FILE_DELETED: Counter = Counter::new("fsais.utils.file_deleted");
static BYTES_ALLOCATED: Counter = Counter::new("fsais.utils.bytes_allocated");

pub fn register_biometrics(collector: &biometrics::Collector) {
    collector.register_counter(&FILE_OPENED);
    collector.register_counter(&FILE_DELETED);
    collector.register_counter(&BYTES_ALLOCATED);
}

///////////////////////////////////////////// accounting ///////////////////////////////////////////

static CURRENT_IO_VOLUME: AtomicU64 = AtomicU64::new(0);
static CURRENT_DISK_ALLOCATION: AtomicU64 = AtomicU64::new(0);
static PEAK_DISK_ALLOCATION: AtomicU64 = AtomicU64::new(0);

/// Record `bytes` of I/O having crossed the process boundary (read or written).  Used by the
/// async I/O layer and the radix heap to report `io_volume()`.
pub fn account_io(bytes: u64) {
    CURRENT_IO_VOLUME.fetch_add(bytes, Ordering::Relaxed);
    BYTES_ALLOCATED.count(bytes);
}

/// Total bytes moved across all readers/writers/heaps created in this process so far.
pub fn current_io_volume() -> u64 {
    CURRENT_IO_VOLUME.load(Ordering::Relaxed)
}

fn account_disk_allocate(bytes: u64) {
    let current = CURRENT_DISK_ALLOCATION.fetch_add(bytes, Ordering::Relaxed) + bytes;
    PEAK_DISK_ALLOCATION.fetch_max(current, Ordering::Relaxed);
}

fn account_disk_deallocate(bytes: u64) {
    CURRENT_DISK_ALLOCATION.fetch_sub(bytes, Ordering::Relaxed);
}

/// Largest amount of on-disk tempfile space ever held at once, for diagnostics.
pub fn peak_disk_allocation() -> u64 {
    PEAK_DISK_ALLOCATION.load(Ordering::Relaxed)
}

////////////////////////////////////////////// files ///////////////////////////////////////////////

/// Open `path` for unbuffered sequential reading.  Background-thread readers rely on doing their
/// own buffering, so there is no point stacking a [std::io::BufReader] underneath.
pub fn file_open_read(path: &Path) -> Result<File> {
    FILE_OPENED.click();
    File::open(path).map_err(|e| Error::io(path.to_string_lossy(), &e))
}

/// Open `path` for writing, truncating any existing content.
pub fn file_create(path: &Path) -> Result<File> {
    FILE_OPENED.click();
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| Error::io(path.to_string_lossy(), &e))?;
    Ok(file)
}

/// Open `path` for read-write without truncating, creating it if absent.  Used by backward
/// readers and multi-part writers that need to both append and later seek within the same file.
pub fn file_open_read_write(path: &Path) -> Result<File> {
    FILE_OPENED.click();
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .map_err(|e| Error::io(path.to_string_lossy(), &e))?;
    Ok(file)
}

/// The size, in bytes, of the file at `path`.
pub fn file_size(path: &Path) -> Result<u64> {
    let metadata = std::fs::metadata(path).map_err(|e| Error::io(path.to_string_lossy(), &e))?;
    Ok(metadata.len())
}

/// True iff a regular file exists at `path`.
pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}

/// Delete the file at `path`, updating disk-usage accounting first.
pub fn file_delete(path: &Path) -> Result<()> {
    if let Ok(size) = file_size(path) {
        account_disk_deallocate(size);
    }
    FILE_DELETED.click();
    std::fs::remove_file(path).map_err(|e| Error::io(path.to_string_lossy(), &e))
}

/// Record that `bytes` of new on-disk tempfile space were allocated under `path`.  Called by
/// writers as they extend a file, mirroring the original's disk-usage accounting.
pub fn note_disk_allocation(bytes: u64) {
    account_disk_allocate(bytes);
}

////////////////////////////////////////// tempfile naming /////////////////////////////////////////

static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Produce a path under `basename`'s parent directory that is, with overwhelming probability,
/// unique across the lifetime of the process: `<basename>.tmp<hash>`.
///
/// Unlike the original's `rand()`-based `random_string_hash`, this combines a process-local
/// monotonic counter with wall-clock nanoseconds so that uniqueness does not depend on seeding a
/// global PRNG; the engine does not need cryptographic unpredictability, only collision
/// avoidance among tempfiles created by one run.
pub fn tempfile_path(basename: &Path, suffix: &str) -> PathBuf {
    let ordinal = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut name = basename.as_os_str().to_owned();
    name.push(format!(".tmp{ordinal}_{nanos}{suffix}"));
    PathBuf::from(name)
}

//////////////////////////////////////////// bit widths ////////////////////////////////////////////

/// The number of bits needed to represent values `0..x` (i.e. `ceil(log2(x))`), matching the
/// original's `log2ceil`: `log2ceil(1) == 0`, `log2ceil(2) == 1`, `log2ceil(3) == 2`.
pub fn log2ceil(x: u64) -> u32 {
    if x <= 1 {
        return 0;
    }
    64 - (x - 1).leading_zeros()
}

/// The largest `w` such that `2^w <= x`, matching the original's `log2floor`.
/// `log2floor(0)` is defined as `0` since the original only ever calls it with `x >= 1`.
pub fn log2floor(x: u64) -> u32 {
    if x == 0 {
        return 0;
    }
    63 - x.leading_zeros()
}
