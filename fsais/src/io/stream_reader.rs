//! Forward typed stream reader.
//!
//! Grounded on `fsais_src/io/async_stream_reader.hpp`: a background thread keeps a pipeline of
//! filled buffers ahead of the caller by repeatedly pulling an empty buffer, filling it from the
//! file, and handing it to the caller's queue; `stop_reading()` idles the thread, and the
//! destructor calls it so the join always happens.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::Result;
use crate::utils;

use super::buffer_queue::{Buffer, BufferQueue};
use super::{items_per_buffer, read_items, StreamItem, DEFAULT_N_BUFFERS, DEFAULT_TOTAL_BUF_SIZE_BYTES};

struct Shared<T> {
    file: std::sync::Mutex<File>,
    path: PathBuf,
    empty_buffers: BufferQueue<T>,
    full_buffers: BufferQueue<T>,
}

/// Reads a sequence of `T` from a file, front to back, prefetching ahead of the caller on a
/// background thread.
pub struct StreamReader<T: StreamItem> {
    shared: Arc<Shared<T>>,
    thread: Option<JoinHandle<Result<()>>>,
    cur_buffer: Option<Buffer<T>>,
    cur_buffer_pos: usize,
    cur_buffer_filled: usize,
}

impl<T: StreamItem> StreamReader<T> {
    /// Open `path` with the default buffering parameters.
    pub fn new(path: &Path) -> Result<Self> {
        Self::with_buffering(path, DEFAULT_TOTAL_BUF_SIZE_BYTES, DEFAULT_N_BUFFERS)
    }

    /// Open `path`, sizing `n_buffers` buffers out of a `total_buf_size_bytes` budget.
    pub fn with_buffering(path: &Path, total_buf_size_bytes: usize, n_buffers: usize) -> Result<Self> {
        assert!(n_buffers > 0, "n_buffers must be nonzero");
        let file = utils::file_open_read(path)?;
        let items_per_buf = items_per_buffer::<T>(total_buf_size_bytes, n_buffers);

        let empty_buffers = BufferQueue::new();
        for _ in 0..n_buffers {
            empty_buffers.push(Buffer::with_capacity(items_per_buf));
        }

        let shared = Arc::new(Shared {
            file: std::sync::Mutex::new(file),
            path: path.to_path_buf(),
            empty_buffers,
            full_buffers: BufferQueue::new(),
        });

        let io_shared = Arc::clone(&shared);
        let thread = std::thread::spawn(move || io_thread_code(io_shared));

        Ok(StreamReader {
            shared,
            thread: Some(thread),
            cur_buffer: None,
            cur_buffer_pos: 0,
            cur_buffer_filled: 0,
        })
    }

    fn receive_new_buffer(&mut self) {
        if let Some(mut buf) = self.cur_buffer.take() {
            buf.clear();
            self.shared.empty_buffers.push(buf);
        }
        match self.shared.full_buffers.pop_blocking() {
            Some(buf) => {
                self.cur_buffer_filled = buf.filled;
                self.cur_buffer = Some(buf);
            }
            None => {
                self.cur_buffer_filled = 0;
                self.cur_buffer = None;
            }
        }
        self.cur_buffer_pos = 0;
    }

    /// True iff there are no more items to read.
    pub fn is_empty(&mut self) -> bool {
        if self.cur_buffer_pos == self.cur_buffer_filled {
            self.receive_new_buffer();
        }
        self.cur_buffer_pos == self.cur_buffer_filled
    }

    /// Read the next item. Panics if called when [`Self::is_empty`] would be true; callers are
    /// expected to check `is_empty()` themselves, mirroring the original's unchecked `read()`.
    pub fn read(&mut self) -> T {
        if self.cur_buffer_pos == self.cur_buffer_filled {
            self.receive_new_buffer();
        }
        let buf = self.cur_buffer.as_ref().expect("read() past end of stream");
        let item = buf.content[self.cur_buffer_pos];
        self.cur_buffer_pos += 1;
        item
    }

    /// Read `dest.len()` items into `dest`.
    pub fn read_into(&mut self, mut dest: &mut [T]) {
        while !dest.is_empty() {
            if self.cur_buffer_pos == self.cur_buffer_filled {
                self.receive_new_buffer();
            }
            let buf = self.cur_buffer.as_ref().expect("read_into() past end of stream");
            let available = self.cur_buffer_filled - self.cur_buffer_pos;
            let tocopy = available.min(dest.len());
            dest[..tocopy].copy_from_slice(&buf.content[self.cur_buffer_pos..self.cur_buffer_pos + tocopy]);
            self.cur_buffer_pos += tocopy;
            dest = &mut dest[tocopy..];
        }
    }

    /// Skip `howmany` items without materializing them.
    pub fn skip(&mut self, mut howmany: usize) {
        while howmany > 0 {
            if self.cur_buffer_pos == self.cur_buffer_filled {
                self.receive_new_buffer();
            }
            let available = self.cur_buffer_filled - self.cur_buffer_pos;
            let toskip = available.min(howmany);
            self.cur_buffer_pos += toskip;
            howmany -= toskip;
        }
    }

    /// Peek the next item without consuming it.
    pub fn peek(&mut self) -> T {
        if self.cur_buffer_pos == self.cur_buffer_filled {
            self.receive_new_buffer();
        }
        self.cur_buffer.as_ref().expect("peek() past end of stream").content[self.cur_buffer_pos]
    }

    /// Stop the background thread (idempotent). Safe to call more than once.
    pub fn stop_reading(&mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            self.shared.empty_buffers.send_stop_signal();
            match thread.join() {
                Ok(result) => result?,
                Err(_) => return Err(crate::error::Error::invariant_violation("reader thread panicked")),
            }
        }
        Ok(())
    }
}

impl<T: StreamItem> Drop for StreamReader<T> {
    fn drop(&mut self) {
        let _ = self.stop_reading();
    }
}

fn io_thread_code<T: StreamItem>(shared: Arc<Shared<T>>) -> Result<()> {
    loop {
        let mut buf = match shared.empty_buffers.pop_blocking() {
            Some(buf) => buf,
            None => return Ok(()),
        };
        let n = {
            let mut file = shared.file.lock().unwrap();
            read_items(&mut file, &shared.path, &mut buf.content)?
        };
        buf.filled = n;
        if n == 0 {
            shared.full_buffers.send_stop_signal();
            return Ok(());
        }
        shared.full_buffers.push(buf);
    }
}
