//! Backward typed stream reader: consumes a file from the last item toward the first.
//!
//! Grounded on `fsais_src/io/async_backward_stream_reader.hpp`: the I/O thread fills a buffer by
//! reading a chunk ending at the file's current position and then rewinding the file pointer
//! back over what it just read, so the next fill picks up further toward the front of the file.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::{Error, Result};
use crate::utils;

use super::buffer_queue::{Buffer, BufferQueue};
use super::{
    items_per_buffer, read_items_backward, StreamItem, DEFAULT_N_BUFFERS, DEFAULT_TOTAL_BUF_SIZE_BYTES,
};

struct Shared<T> {
    file: std::sync::Mutex<File>,
    path: PathBuf,
    empty_buffers: BufferQueue<T>,
    full_buffers: BufferQueue<T>,
}

/// Reads a sequence of `T` from a file, last item first.
pub struct BackwardStreamReader<T: StreamItem> {
    shared: Arc<Shared<T>>,
    thread: Option<JoinHandle<Result<()>>>,
    cur_buffer: Option<Buffer<T>>,
    cur_buffer_pos: usize,
}

impl<T: StreamItem> BackwardStreamReader<T> {
    /// Open `path` with the default buffering parameters, starting from end-of-file.
    pub fn new(path: &Path) -> Result<Self> {
        Self::with_buffering(path, DEFAULT_TOTAL_BUF_SIZE_BYTES, DEFAULT_N_BUFFERS, 0)
    }

    /// Open `path`, skipping `n_skip_bytes` off the end before reading backward (used to resume
    /// a logical stream that is the prefix of a larger file).
    pub fn with_buffering(
        path: &Path,
        total_buf_size_bytes: usize,
        n_buffers: usize,
        n_skip_bytes: u64,
    ) -> Result<Self> {
        assert!(n_buffers > 0, "n_buffers must be nonzero");
        let mut file = utils::file_open_read(path)?;
        let end = file
            .seek(SeekFrom::End(0))
            .map_err(|e| Error::io(path.to_string_lossy(), &e))?;
        let start = end.saturating_sub(n_skip_bytes);
        file.seek(SeekFrom::Start(start))
            .map_err(|e| Error::io(path.to_string_lossy(), &e))?;

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

        Ok(BackwardStreamReader {
            shared,
            thread: Some(thread),
            cur_buffer: None,
            cur_buffer_pos: 0,
        })
    }

    fn receive_new_buffer(&mut self) {
        if let Some(mut buf) = self.cur_buffer.take() {
            buf.clear();
            self.shared.empty_buffers.push(buf);
        }
        match self.shared.full_buffers.pop_blocking() {
            Some(buf) => {
                self.cur_buffer_pos = buf.filled;
                self.cur_buffer = Some(buf);
            }
            None => {
                self.cur_buffer_pos = 0;
                self.cur_buffer = None;
            }
        }
    }

    /// True iff there are no more items left to read.
    pub fn is_empty(&mut self) -> bool {
        if self.cur_buffer_pos == 0 {
            self.receive_new_buffer();
        }
        self.cur_buffer_pos == 0
    }

    /// Read the previous item (i.e. the stream, consumed back to front).
    pub fn read(&mut self) -> T {
        if self.cur_buffer_pos == 0 {
            self.receive_new_buffer();
        }
        self.cur_buffer_pos -= 1;
        self.cur_buffer.as_ref().expect("read() past start of stream").content[self.cur_buffer_pos]
    }

    /// Peek the previous item without consuming it.
    pub fn peek(&mut self) -> T {
        if self.cur_buffer_pos == 0 {
            self.receive_new_buffer();
        }
        self.cur_buffer.as_ref().expect("peek() past start of stream").content[self.cur_buffer_pos - 1]
    }

    /// Stop the background thread (idempotent).
    pub fn stop_reading(&mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            self.shared.empty_buffers.send_stop_signal();
            match thread.join() {
                Ok(result) => result?,
                Err(_) => return Err(Error::invariant_violation("backward reader thread panicked")),
            }
        }
        Ok(())
    }
}

impl<T: StreamItem> Drop for BackwardStreamReader<T> {
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
            read_items_backward(&mut file, &shared.path, &mut buf.content)?
        };
        buf.filled = n;
        if n == 0 {
            shared.empty_buffers.push(buf);
            shared.full_buffers.send_stop_signal();
            return Ok(());
        }
        shared.full_buffers.push(buf);
    }
}
