//! Forward typed stream writer.
//!
//! Grounded on `fsais_src/io/async_stream_writer_multipart.hpp` with the part-rollover logic
//! removed (that behavior lives in [`crate::io::multi_part_writer`]): a background thread drains
//! full buffers to disk while the caller fills the next one.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::{Error, Result};
use crate::utils;

use super::buffer_queue::{Buffer, BufferQueue};
use super::{items_per_buffer, write_items, StreamItem, DEFAULT_N_BUFFERS, DEFAULT_TOTAL_BUF_SIZE_BYTES};

struct Shared<T> {
    file: std::sync::Mutex<File>,
    path: PathBuf,
    full_buffers: BufferQueue<T>,
    empty_buffers: BufferQueue<T>,
}

/// Writes a sequence of `T` to a file, back to back, flushing to disk on a background thread.
pub struct StreamWriter<T: StreamItem> {
    shared: Arc<Shared<T>>,
    thread: Option<JoinHandle<Result<()>>>,
    cur_buffer: Option<Buffer<T>>,
    bytes_written: u64,
    closed: bool,
}

impl<T: StreamItem> StreamWriter<T> {
    /// Create (truncating) `path` with the default buffering parameters.
    pub fn new(path: &Path) -> Result<Self> {
        Self::with_buffering(path, DEFAULT_TOTAL_BUF_SIZE_BYTES, DEFAULT_N_BUFFERS)
    }

    /// Create (truncating) `path`, sizing `n_buffers` buffers out of a `total_buf_size_bytes`
    /// budget.
    pub fn with_buffering(path: &Path, total_buf_size_bytes: usize, n_buffers: usize) -> Result<Self> {
        assert!(n_buffers > 0, "n_buffers must be nonzero");
        let file = utils::file_create(path)?;
        let items_per_buf = items_per_buffer::<T>(total_buf_size_bytes, n_buffers);

        let empty_buffers = BufferQueue::new();
        for _ in 1..n_buffers {
            empty_buffers.push(Buffer::with_capacity(items_per_buf));
        }

        let shared = Arc::new(Shared {
            file: std::sync::Mutex::new(file),
            path: path.to_path_buf(),
            full_buffers: BufferQueue::new(),
            empty_buffers,
        });

        let io_shared = Arc::clone(&shared);
        let thread = std::thread::spawn(move || io_thread_code(io_shared));

        Ok(StreamWriter {
            shared,
            thread: Some(thread),
            cur_buffer: Some(Buffer::with_capacity(items_per_buf)),
            bytes_written: 0,
            closed: false,
        })
    }

    fn get_empty_buffer(&mut self) -> Buffer<T> {
        self.shared.empty_buffers.pop_blocking().expect(
            "empty-buffer pool never sends a stop signal while the writer is alive",
        )
    }

    /// Hand the active buffer, if non-empty, to the I/O thread and take a fresh one.
    pub fn flush(&mut self) {
        let full = self.cur_buffer.as_ref().map(|b| !b.is_empty()).unwrap_or(false);
        if full {
            let buf = self.cur_buffer.take().unwrap();
            self.shared.full_buffers.push(buf);
            self.cur_buffer = Some(self.get_empty_buffer());
        }
    }

    /// Append a single item.
    pub fn write(&mut self, item: T) {
        self.bytes_written += T::WIDTH as u64;
        let buf = self.cur_buffer.as_mut().unwrap();
        let pos = buf.filled;
        buf.filled += 1;
        buf.content[pos] = item;
        if buf.is_full() {
            self.flush();
        }
    }

    /// Append `items` in order.
    pub fn write_slice(&mut self, mut items: &[T]) {
        self.bytes_written += (items.len() * T::WIDTH) as u64;
        while !items.is_empty() {
            let buf = self.cur_buffer.as_mut().unwrap();
            let tocopy = buf.free_space().min(items.len());
            buf.content[buf.filled..buf.filled + tocopy].copy_from_slice(&items[..tocopy]);
            buf.filled += tocopy;
            items = &items[tocopy..];
            if buf.is_full() {
                self.flush();
            }
        }
    }

    /// Total bytes handed to `write`/`write_slice` so far (including buffered, not-yet-flushed
    /// bytes).
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush, stop the background thread, and surface any write error. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.flush();
        if let Some(thread) = self.thread.take() {
            self.shared.full_buffers.send_stop_signal();
            match thread.join() {
                Ok(result) => result?,
                Err(_) => return Err(Error::invariant_violation("writer thread panicked")),
            }
        }
        Ok(())
    }
}

impl<T: StreamItem> Drop for StreamWriter<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn io_thread_code<T: StreamItem>(shared: Arc<Shared<T>>) -> Result<()> {
    loop {
        let buf = match shared.full_buffers.pop_blocking() {
            Some(buf) => buf,
            None => return Ok(()),
        };
        {
            let mut file = shared.file.lock().unwrap();
            write_items(&mut file, &shared.path, &buf.content[..buf.filled])?;
        }
        let mut buf = buf;
        buf.clear();
        shared.empty_buffers.push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::stream_reader::StreamReader;

    #[test]
    fn flushes_partial_final_buffer() {
        let dir = std::env::temp_dir().join(format!("fsais_stream_writer_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.bin");
        {
            let mut writer: StreamWriter<u8> = StreamWriter::with_buffering(&path, 16, 2).unwrap();
            for i in 0..5u8 {
                writer.write(i);
            }
            writer.close().unwrap();
        }
        assert_eq!(5, utils::file_size(&path).unwrap());
        let mut reader: StreamReader<u8> = StreamReader::new(&path).unwrap();
        for i in 0..5u8 {
            assert_eq!(i, reader.read());
        }
        assert!(reader.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
