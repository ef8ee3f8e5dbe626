//! A single bucket's storage: a FIFO of `(u64, u64)` pairs with a RAM-resident head and tail and
//! a spill file in between once the RAM portion grows past its budget.
//!
//! Grounded on `fsais_src/utils/em_queue.hpp`'s head/middle/tail structure: pushes land in the
//! tail; once the tail exceeds `ram_budget` items, everything but a small suffix is appended to
//! the spill file; pops drain the head, refilling it from the spill file (oldest data first) once
//! it runs dry, falling back to the tail only once the file and head are both empty.

use std::collections::VecDeque;
use std::path::PathBuf;

use crate::error::Result;
use crate::io::stream_reader::StreamReader;
use crate::io::stream_writer::StreamWriter;
use crate::utils;

/// How many RAM-resident items a bucket tolerates before it starts spilling to disk.
const RAM_BUDGET_ITEMS: usize = 256;

pub(crate) struct EmQueue {
    head: VecDeque<(u64, u64)>,
    tail: VecDeque<(u64, u64)>,
    spill_path: PathBuf,
    spill_writer: Option<StreamWriter<u64>>,
    spill_reader: Option<StreamReader<u64>>,
    spilled_pairs: u64,
    len: usize,
}

impl EmQueue {
    pub(crate) fn new(basename: &PathBuf, bucket_id: usize) -> Self {
        EmQueue {
            head: VecDeque::new(),
            tail: VecDeque::new(),
            spill_path: utils::tempfile_path(basename, &format!(".bucket{bucket_id}")),
            spill_writer: None,
            spill_reader: None,
            spilled_pairs: 0,
            len: 0,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn push(&mut self, key: u64, value: u64) -> Result<()> {
        self.tail.push_back((key, value));
        self.len += 1;
        if self.head.is_empty() && self.tail.len() > RAM_BUDGET_ITEMS {
            self.spill_excess()?;
        }
        Ok(())
    }

    fn spill_excess(&mut self) -> Result<()> {
        if self.spill_writer.is_none() {
            self.spill_writer = Some(StreamWriter::new(&self.spill_path)?);
        }
        let writer = self.spill_writer.as_mut().unwrap();
        while self.tail.len() > RAM_BUDGET_ITEMS / 2 {
            let (k, v) = self.tail.pop_front().unwrap();
            writer.write(k);
            writer.write(v);
            self.spilled_pairs += 1;
        }
        Ok(())
    }

    /// Remove and return the oldest item, if any.
    pub(crate) fn pop(&mut self) -> Result<Option<(u64, u64)>> {
        if self.head.is_empty() {
            self.refill_head()?;
        }
        if let Some(item) = self.head.pop_front() {
            self.len -= 1;
            return Ok(Some(item));
        }
        if let Some(item) = self.tail.pop_front() {
            self.len -= 1;
            return Ok(Some(item));
        }
        Ok(None)
    }

    fn refill_head(&mut self) -> Result<()> {
        if self.spilled_pairs == 0 {
            return Ok(());
        }
        if let Some(mut writer) = self.spill_writer.take() {
            writer.close()?;
        }
        if self.spill_reader.is_none() {
            self.spill_reader = Some(StreamReader::new(&self.spill_path)?);
        }
        let reader = self.spill_reader.as_mut().unwrap();
        let mut drained = 0u64;
        while drained < self.spilled_pairs && !reader.is_empty() {
            let k = reader.read();
            let v = reader.read();
            self.head.push_back((k, v));
            drained += 1;
        }
        self.spilled_pairs -= drained;
        if self.spilled_pairs == 0 {
            self.spill_reader = None;
            utils::file_delete(&self.spill_path).ok();
        }
        Ok(())
    }

    /// Drain every remaining item, in FIFO order, consuming the queue. Used by redistribution.
    pub(crate) fn drain_all(&mut self) -> Result<Vec<(u64, u64)>> {
        let mut out = Vec::with_capacity(self.len);
        while let Some(item) = self.pop()? {
            out.push(item);
        }
        Ok(out)
    }
}

impl Drop for EmQueue {
    fn drop(&mut self) {
        if let Some(mut writer) = self.spill_writer.take() {
            let _ = writer.close();
        }
        if self.spill_reader.is_some() || utils::file_exists(&self.spill_path) {
            utils::file_delete(&self.spill_path).ok();
        }
    }
}
