//! The asynchronous I/O layer (C2): background-thread-backed forward/backward typed stream
//! readers and writers, multi-stream and multi-part variants, and bit-packed variants.
//!
//! Every type here owns exactly one background thread (per §5's scheduling model) and hands
//! buffers to/from it through the FIFO [buffer_queue::BufferQueue] pairs. None of these types are
//! `Sync`; each is meant to be driven by exactly one caller thread, matching the "single-threaded
//! from the caller's side" ordering guarantee of §4.2/§5.

mod buffer_queue;

pub mod backward_reader;
pub mod bit_stream;
pub mod multi_part_reader;
pub mod multi_part_writer;
pub mod multi_stream;
pub mod stream_reader;
pub mod stream_writer;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils;

/// Default total buffer budget shared across a reader/writer's buffers, matching the original
/// engine's default of 8 MiB.
pub const DEFAULT_TOTAL_BUF_SIZE_BYTES: usize = 8 << 20;
/// Default buffer count, matching the original engine's default double/multi-buffering depth.
pub const DEFAULT_N_BUFFERS: usize = 4;

/// A value that can be the element type of a raw fixed-width little-endian stream (§6).
///
/// The packed-integer wrapper types the construction driver actually works with are an explicit
/// non-goal (treated as opaque fixed-width unsigned integers); this trait is implemented for the
/// plain `u8`/`u16`/`u32`/`u64` types those wrappers would otherwise wrap.
pub trait StreamItem: Copy + Default + Send + Sync + 'static {
    /// Width in bytes of the on-disk encoding.
    const WIDTH: usize;
    fn write_le(&self, out: &mut [u8]);
    fn read_le(bytes: &[u8]) -> Self;
}

impl StreamItem for u8 {
    const WIDTH: usize = 1;
    fn write_le(&self, out: &mut [u8]) {
        out[0] = *self;
    }
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl StreamItem for u16 {
    const WIDTH: usize = 2;
    fn write_le(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }
    fn read_le(bytes: &[u8]) -> Self {
        u16::from_le_bytes(bytes.try_into().unwrap())
    }
}

impl StreamItem for u32 {
    const WIDTH: usize = 4;
    fn write_le(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }
    fn read_le(bytes: &[u8]) -> Self {
        u32::from_le_bytes(bytes.try_into().unwrap())
    }
}

impl StreamItem for u64 {
    const WIDTH: usize = 8;
    fn write_le(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }
    fn read_le(bytes: &[u8]) -> Self {
        u64::from_le_bytes(bytes.try_into().unwrap())
    }
}

/// Encode `items` and append them to `file`. Used by every writer's I/O thread.
pub(crate) fn write_items<T: StreamItem>(file: &mut File, path: &Path, items: &[T]) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let mut bytes = vec![0u8; items.len() * T::WIDTH];
    for (item, chunk) in items.iter().zip(bytes.chunks_mut(T::WIDTH)) {
        item.write_le(chunk);
    }
    file.write_all(&bytes)
        .map_err(|e| Error::io(path.to_string_lossy(), &e))?;
    utils::account_io(bytes.len() as u64);
    Ok(())
}

/// Fill as much of `dest` as the remaining bytes of `file` allow, returning the number of items
/// actually read (fewer than `dest.len()` signals end of stream). Used by every reader's I/O
/// thread.
pub(crate) fn read_items<T: StreamItem>(file: &mut File, path: &Path, dest: &mut [T]) -> Result<usize> {
    if dest.is_empty() {
        return Ok(0);
    }
    let mut bytes = vec![0u8; dest.len() * T::WIDTH];
    let mut total_read = 0usize;
    loop {
        let n = file
            .read(&mut bytes[total_read..])
            .map_err(|e| Error::io(path.to_string_lossy(), &e))?;
        if n == 0 {
            break;
        }
        total_read += n;
        if total_read == bytes.len() {
            break;
        }
    }
    let whole_items = total_read / T::WIDTH;
    if total_read % T::WIDTH != 0 {
        return Err(Error::invariant_violation(format!(
            "short read left {} trailing bytes in {}",
            total_read % T::WIDTH,
            path.display()
        )));
    }
    for (item, chunk) in dest[..whole_items].iter_mut().zip(bytes.chunks(T::WIDTH)) {
        *item = T::read_le(chunk);
    }
    utils::account_io(total_read as u64);
    Ok(whole_items)
}

/// Read a buffer's worth of `T` ending at the file's current position, then rewind the file
/// pointer back over what was just read, leaving the logical read position where it was before
/// the call completed — the backward-reader analogue of [read_items]. Returns the number of
/// items read, counted from the end of the file toward the front.
pub(crate) fn read_items_backward<T: StreamItem>(
    file: &mut File,
    path: &Path,
    dest: &mut [T],
) -> Result<usize> {
    let pos = file
        .stream_position()
        .map_err(|e| Error::io(path.to_string_lossy(), &e))?;
    if pos == 0 {
        return Ok(0);
    }
    let max_items = (pos as usize) / T::WIDTH;
    let howmany = max_items.min(dest.len());
    if howmany == 0 {
        return Ok(0);
    }
    let back = (howmany * T::WIDTH) as i64;
    file.seek(SeekFrom::Current(-back))
        .map_err(|e| Error::io(path.to_string_lossy(), &e))?;
    let n = read_items(file, path, &mut dest[..howmany])?;
    if n != howmany {
        return Err(Error::invariant_violation(format!(
            "backward read short in {}",
            path.display()
        )));
    }
    file.seek(SeekFrom::Current(-back))
        .map_err(|e| Error::io(path.to_string_lossy(), &e))?;
    Ok(howmany)
}

/// Given a total buffer budget in bytes and a buffer count, compute items-per-buffer, always at
/// least 1 (matching the original's `disk_block_size` / `max(1, ...)` guards).
pub(crate) fn items_per_buffer<T: StreamItem>(total_buf_size_bytes: usize, n_buffers: usize) -> usize {
    let per_buf_bytes = (total_buf_size_bytes / n_buffers.max(1)).max(1);
    (per_buf_bytes / T::WIDTH).max(1)
}
