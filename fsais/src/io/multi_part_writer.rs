//! Multi-part forward writer: caps each physical file at `single_part_max_bytes` and rolls over
//! to a new part when the cap is hit.
//!
//! Grounded directly on `fsais_src/io/async_stream_writer_multipart.hpp`. Parts are named
//! `<base>.multipart_file.part<k>` per §6; no file is created until the first item is written.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::{Error, Result};
use crate::utils;

use super::buffer_queue::{Buffer, BufferQueue};
use super::{items_per_buffer, write_items, StreamItem, DEFAULT_N_BUFFERS, DEFAULT_TOTAL_BUF_SIZE_BYTES};

fn part_path(base: &Path, part: u64) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".multipart_file.part{part}"));
    PathBuf::from(name)
}

struct PartState {
    file: Option<File>,
    cur_part: u64,
    cur_part_items_written: u64,
}

struct Shared<T> {
    base: PathBuf,
    single_part_max_items: u64,
    state: std::sync::Mutex<PartState>,
    full_buffers: BufferQueue<T>,
    empty_buffers: BufferQueue<T>,
}

/// Writes a sequence of `T`, splitting the output across size-capped part files.
pub struct MultiPartWriter<T: StreamItem> {
    shared: Arc<Shared<T>>,
    thread: Option<JoinHandle<Result<()>>>,
    cur_buffer: Option<Buffer<T>>,
    bytes_written: u64,
    closed: bool,
}

impl<T: StreamItem> MultiPartWriter<T> {
    /// Create a multi-part stream under `base`, capping each part at `single_part_max_bytes`.
    pub fn new(base: &Path, single_part_max_bytes: u64) -> Result<Self> {
        Self::with_buffering(
            base,
            single_part_max_bytes,
            DEFAULT_TOTAL_BUF_SIZE_BYTES,
            DEFAULT_N_BUFFERS,
        )
    }

    pub fn with_buffering(
        base: &Path,
        single_part_max_bytes: u64,
        total_buf_size_bytes: usize,
        n_buffers: usize,
    ) -> Result<Self> {
        assert!(n_buffers > 0, "n_buffers must be nonzero");
        let single_part_max_items = (single_part_max_bytes / T::WIDTH as u64).max(1);
        let items_per_buf = items_per_buffer::<T>(total_buf_size_bytes, n_buffers);

        let empty_buffers = BufferQueue::new();
        for _ in 1..n_buffers {
            empty_buffers.push(Buffer::with_capacity(items_per_buf));
        }

        let shared = Arc::new(Shared {
            base: base.to_path_buf(),
            single_part_max_items,
            state: std::sync::Mutex::new(PartState {
                file: None,
                cur_part: 0,
                cur_part_items_written: 0,
            }),
            full_buffers: BufferQueue::new(),
            empty_buffers,
        });

        let io_shared = Arc::clone(&shared);
        let thread = std::thread::spawn(move || io_thread_code::<T>(io_shared));

        Ok(MultiPartWriter {
            shared,
            thread: Some(thread),
            cur_buffer: Some(Buffer::with_capacity(items_per_buf)),
            bytes_written: 0,
            closed: false,
        })
    }

    fn get_empty_buffer(&mut self) -> Buffer<T> {
        self.shared
            .empty_buffers
            .pop_blocking()
            .expect("empty-buffer pool never stops while the writer is alive")
    }

    pub fn flush(&mut self) {
        let full = self.cur_buffer.as_ref().map(|b| !b.is_empty()).unwrap_or(false);
        if full {
            let buf = self.cur_buffer.take().unwrap();
            self.shared.full_buffers.push(buf);
            self.cur_buffer = Some(self.get_empty_buffer());
        }
    }

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

    /// Number of part files produced so far (valid any time, grows monotonically).
    pub fn parts_count(&self) -> u64 {
        let items_written = self.bytes_written / T::WIDTH as u64;
        (items_written + self.shared.single_part_max_items - 1) / self.shared.single_part_max_items
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn close(&mut self) -> Result<u64> {
        if !self.closed {
            self.closed = true;
            self.flush();
            if let Some(thread) = self.thread.take() {
                self.shared.full_buffers.send_stop_signal();
                match thread.join() {
                    Ok(result) => result?,
                    Err(_) => return Err(Error::invariant_violation("multi-part writer thread panicked")),
                }
            }
        }
        Ok(self.parts_count())
    }
}

impl<T: StreamItem> Drop for MultiPartWriter<T> {
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
        let mut remaining = &buf.content[..buf.filled];
        while !remaining.is_empty() {
            let mut state = shared.state.lock().unwrap();
            if state.file.is_none() || state.cur_part_items_written == shared.single_part_max_items {
                if state.file.is_some() {
                    state.cur_part += 1;
                }
                let path = part_path(&shared.base, state.cur_part);
                state.file = Some(utils::file_create(&path)?);
                state.cur_part_items_written = 0;
            }
            let items_left_in_part = shared.single_part_max_items - state.cur_part_items_written;
            let towrite = (items_left_in_part as usize).min(remaining.len());
            let path = part_path(&shared.base, state.cur_part);
            write_items(state.file.as_mut().unwrap(), &path, &remaining[..towrite])?;
            state.cur_part_items_written += towrite as u64;
            remaining = &remaining[towrite..];
        }
        let mut buf = buf;
        buf.clear();
        shared.empty_buffers.push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::multi_part_reader::MultiPartBackwardReader;

    #[test]
    fn rolls_over_parts_and_reads_back_in_reverse() {
        let dir = std::env::temp_dir().join(format!("fsais_multipart_writer_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let base = dir.join("stream");
        let n_parts;
        {
            let mut writer: MultiPartWriter<u32> = MultiPartWriter::with_buffering(&base, 40, 64, 2).unwrap();
            for i in 0..100u32 {
                writer.write(i);
            }
            n_parts = writer.close().unwrap();
        }
        assert!(n_parts >= 9, "expected several parts, got {n_parts}");
        let mut reader: MultiPartBackwardReader<u32> =
            MultiPartBackwardReader::new(&base, n_parts).unwrap();
        for i in (0..100u32).rev() {
            assert!(!reader.is_empty());
            assert_eq!(i, reader.read());
        }
        assert!(reader.is_empty());
        for k in 0..n_parts {
            assert!(!utils::file_exists(&part_path(&base, k)));
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_stream_creates_no_files() {
        let dir = std::env::temp_dir().join(format!("fsais_multipart_empty_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let base = dir.join("stream");
        {
            let writer: MultiPartWriter<u32> = MultiPartWriter::new(&base, 1024).unwrap();
            drop(writer);
        }
        assert!(!utils::file_exists(&part_path(&base, 0)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
