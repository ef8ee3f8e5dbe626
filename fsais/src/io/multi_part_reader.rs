//! Multi-part backward reader: consumes a multi-part stream's parts in reverse order, deleting
//! each part as it is fully drained.
//!
//! Grounded on `fsais_src/io/async_backward_stream_reader_multipart.hpp`: the I/O thread opens
//! the highest-numbered remaining part, reads backward from its end exactly like
//! [`crate::io::backward_reader`], and deletes the part file once it is fully consumed, moving on
//! to the next-lower part number. When the part count reaches zero the thread signals stop.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::{Error, Result};
use crate::utils;

use super::buffer_queue::{Buffer, BufferQueue};
use super::{
    items_per_buffer, read_items_backward, StreamItem, DEFAULT_N_BUFFERS, DEFAULT_TOTAL_BUF_SIZE_BYTES,
};

fn part_path(base: &Path, part: u64) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".multipart_file.part{part}"));
    PathBuf::from(name)
}

struct OpenPart {
    file: Option<File>,
    parts_left: u64,
}

struct Shared<T> {
    base: PathBuf,
    state: std::sync::Mutex<OpenPart>,
    empty_buffers: BufferQueue<T>,
    full_buffers: BufferQueue<T>,
}

/// Reads a multi-part stream written by [`crate::io::multi_part_writer::MultiPartWriter`], last
/// item of the last part first, deleting each part as it drains.
pub struct MultiPartBackwardReader<T: StreamItem> {
    shared: Arc<Shared<T>>,
    thread: Option<JoinHandle<Result<()>>>,
    cur_buffer: Option<Buffer<T>>,
    cur_buffer_pos: usize,
}

impl<T: StreamItem> MultiPartBackwardReader<T> {
    /// Open a multi-part stream under `base` that produced `n_parts` part files.
    pub fn new(base: &Path, n_parts: u64) -> Result<Self> {
        Self::with_buffering(base, n_parts, DEFAULT_TOTAL_BUF_SIZE_BYTES, DEFAULT_N_BUFFERS)
    }

    pub fn with_buffering(
        base: &Path,
        n_parts: u64,
        total_buf_size_bytes: usize,
        n_buffers: usize,
    ) -> Result<Self> {
        assert!(n_buffers > 0, "n_buffers must be nonzero");
        let items_per_buf = items_per_buffer::<T>(total_buf_size_bytes, n_buffers);
        let empty_buffers = BufferQueue::new();
        for _ in 0..n_buffers {
            empty_buffers.push(Buffer::with_capacity(items_per_buf));
        }

        let shared = Arc::new(Shared {
            base: base.to_path_buf(),
            state: std::sync::Mutex::new(OpenPart {
                file: None,
                parts_left: n_parts,
            }),
            empty_buffers,
            full_buffers: BufferQueue::new(),
        });

        if n_parts > 0 {
            let io_shared = Arc::clone(&shared);
            let thread = std::thread::spawn(move || io_thread_code::<T>(io_shared));
            Ok(MultiPartBackwardReader {
                shared,
                thread: Some(thread),
                cur_buffer: None,
                cur_buffer_pos: 0,
            })
        } else {
            shared.full_buffers.send_stop_signal();
            Ok(MultiPartBackwardReader {
                shared,
                thread: None,
                cur_buffer: None,
                cur_buffer_pos: 0,
            })
        }
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

    pub fn is_empty(&mut self) -> bool {
        if self.cur_buffer_pos == 0 {
            self.receive_new_buffer();
        }
        self.cur_buffer_pos == 0
    }

    pub fn read(&mut self) -> T {
        if self.cur_buffer_pos == 0 {
            self.receive_new_buffer();
        }
        self.cur_buffer_pos -= 1;
        self.cur_buffer.as_ref().expect("read() past start of stream").content[self.cur_buffer_pos]
    }

    pub fn stop_reading(&mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            self.shared.empty_buffers.send_stop_signal();
            match thread.join() {
                Ok(result) => result?,
                Err(_) => return Err(Error::invariant_violation("multi-part reader thread panicked")),
            }
        }
        Ok(())
    }
}

impl<T: StreamItem> Drop for MultiPartBackwardReader<T> {
    fn drop(&mut self) {
        let _ = self.stop_reading();
    }
}

fn io_thread_code<T: StreamItem>(shared: Arc<Shared<T>>) -> Result<()> {
    use std::io::{Seek, SeekFrom};
    loop {
        let mut buf = match shared.empty_buffers.pop_blocking() {
            Some(buf) => buf,
            None => return Ok(()),
        };
        let mut state = shared.state.lock().unwrap();
        if state.parts_left == 0 {
            shared.full_buffers.send_stop_signal();
            return Ok(());
        }
        let path = part_path(&shared.base, state.parts_left - 1);
        if state.file.is_none() {
            let mut file = utils::file_open_read(&path)?;
            file.seek(SeekFrom::End(0))
                .map_err(|e| Error::io(path.to_string_lossy(), &e))?;
            state.file = Some(file);
        }
        let file = state.file.as_mut().unwrap();
        let pos_before = file
            .stream_position()
            .map_err(|e| Error::io(path.to_string_lossy(), &e))?;
        let n = read_items_backward(file, &path, &mut buf.content)?;
        let drained_part = pos_before == (n * T::WIDTH) as u64;
        buf.filled = n;
        if n == 0 {
            return Err(Error::invariant_violation(format!(
                "empty buffer reading multi-part stream at {}",
                path.display()
            )));
        }
        shared.full_buffers.push(buf);
        if drained_part {
            state.file = None;
            utils::file_delete(&path)?;
            state.parts_left -= 1;
            if state.parts_left == 0 {
                shared.full_buffers.send_stop_signal();
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::multi_part_writer::MultiPartWriter;

    #[test]
    fn drains_parts_and_deletes_them() {
        let dir = std::env::temp_dir().join(format!("fsais_multipart_reader_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let base = dir.join("s");
        let n_parts;
        {
            let mut writer: MultiPartWriter<u16> = MultiPartWriter::with_buffering(&base, 20, 64, 2).unwrap();
            for i in 0..200u16 {
                writer.write(i);
            }
            n_parts = writer.close().unwrap();
        }
        let mut reader: MultiPartBackwardReader<u16> = MultiPartBackwardReader::new(&base, n_parts).unwrap();
        for i in (0..200u16).rev() {
            assert_eq!(i, reader.read());
        }
        assert!(reader.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
