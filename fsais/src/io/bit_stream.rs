//! Bit-packed stream reader/writer (§4.2, §6): 64 bits packed per word, with one trailing word
//! giving the number of valid bits in the last data word so the reader can reproduce the exact
//! original bit sequence without a separate length header.
//!
//! Grounded on `fsais_src/io/async_bit_stream_writer.hpp` and
//! `fsais_src/io/async_backward_bit_stream_reader.hpp`: built directly on top of this crate's own
//! [`crate::io::stream_writer::StreamWriter`] / [`crate::io::stream_reader::StreamReader`] /
//! [`crate::io::backward_reader::BackwardStreamReader`] over `u64` rather than re-implementing
//! buffering, since the bit-packing logic is orthogonal to the double-buffering mechanism.

use std::path::Path;

use crate::error::{Error, Result};

use super::backward_reader::BackwardStreamReader;
use super::stream_reader::StreamReader;
use super::stream_writer::StreamWriter;

/// Writes a sequence of bits, packing 64 into each underlying word.
pub struct BitStreamWriter {
    inner: StreamWriter<u64>,
    acc: u64,
    acc_bits: u32,
    total_bits: u64,
    closed: bool,
}

impl BitStreamWriter {
    pub fn new(path: &Path) -> Result<Self> {
        Ok(BitStreamWriter {
            inner: StreamWriter::new(path)?,
            acc: 0,
            acc_bits: 0,
            total_bits: 0,
            closed: false,
        })
    }

    /// Append a single bit.
    pub fn write_bit(&mut self, bit: bool) {
        if bit {
            self.acc |= 1u64 << self.acc_bits;
        }
        self.acc_bits += 1;
        self.total_bits += 1;
        if self.acc_bits == 64 {
            self.inner.write(self.acc);
            self.acc = 0;
            self.acc_bits = 0;
        }
    }

    /// Total bits written so far.
    pub fn total_bits(&self) -> u64 {
        self.total_bits
    }

    /// Flush the final (possibly partial) word, append the trailing bit-count word, and close
    /// the underlying stream. Idempotent; writes nothing at all if no bit was ever written.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.total_bits == 0 {
            return self.inner.close();
        }
        if self.acc_bits > 0 {
            self.inner.write(self.acc);
            self.inner.write(self.acc_bits as u64);
        } else {
            // total_bits is a nonzero multiple of 64: the last full word was already flushed by
            // write_bit, so the trailing count word describes all 64 of its bits.
            self.inner.write(64);
        }
        self.inner.close()
    }
}

impl Drop for BitStreamWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Reads a bit-packed stream front to back.
pub struct BitStreamReader {
    inner: StreamReader<u64>,
    cur: u64,
    cur_bits: u32,
    pos: u32,
    /// The word immediately following `cur`, already read and confirmed to be a genuine data
    /// word (not the trailing count word). `None` once `cur` is the final data word.
    peek: Option<u64>,
}

impl BitStreamReader {
    pub fn new(path: &Path) -> Result<Self> {
        let mut inner = StreamReader::<u64>::new(path)?;
        if inner.is_empty() {
            return Ok(BitStreamReader {
                inner,
                cur: 0,
                cur_bits: 0,
                pos: 0,
                peek: None,
            });
        }
        let w0 = inner.read();
        let (cur_bits, peek) = classify_next(&mut inner)?;
        Ok(BitStreamReader {
            inner,
            cur: w0,
            cur_bits,
            pos: 0,
            peek,
        })
    }

    fn advance(&mut self) -> Result<()> {
        match self.peek.take() {
            Some(w) => {
                let (bits, peek) = classify_next(&mut self.inner)?;
                self.cur = w;
                self.cur_bits = bits;
                self.pos = 0;
                self.peek = peek;
            }
            None => {
                self.cur_bits = 0;
                self.pos = 0;
            }
        }
        Ok(())
    }

    /// True iff there are no more bits left to read.
    pub fn is_empty(&mut self) -> bool {
        if self.pos >= self.cur_bits && self.peek.is_some() {
            let _ = self.advance();
        }
        self.pos >= self.cur_bits
    }

    /// Read the next bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.pos >= self.cur_bits {
            self.advance()?;
        }
        if self.pos >= self.cur_bits {
            return Err(Error::invariant_violation("read past end of bit stream"));
        }
        let bit = (self.cur >> self.pos) & 1 == 1;
        self.pos += 1;
        Ok(bit)
    }
}

/// Given a reader positioned right after reading a candidate data word, read one further word
/// and decide: if nothing follows it, that further word is the trailing bit-count and the
/// candidate holds exactly that many valid bits; otherwise the further word is itself a genuine
/// data word and the candidate is a full 64-bit word.
fn classify_next(inner: &mut StreamReader<u64>) -> Result<(u32, Option<u64>)> {
    if inner.is_empty() {
        return Err(Error::invariant_violation(
            "bit stream truncated: missing trailing bit-count word",
        ));
    }
    let next = inner.read();
    if inner.is_empty() {
        Ok((next as u32, None))
    } else {
        Ok((64, Some(next)))
    }
}

/// Reads a bit-packed stream from the last bit toward the first.
pub struct BackwardBitStreamReader {
    inner: BackwardStreamReader<u64>,
    cur: u64,
    /// Number of bits of `cur` not yet returned, counted from the high end down.
    pos: u32,
}

impl BackwardBitStreamReader {
    pub fn new(path: &Path) -> Result<Self> {
        let mut inner = BackwardStreamReader::<u64>::new(path)?;
        if inner.is_empty() {
            return Ok(BackwardBitStreamReader { inner, cur: 0, pos: 0 });
        }
        let count = inner.read() as u32;
        if inner.is_empty() {
            return Err(Error::invariant_violation(
                "bit stream truncated: missing final data word",
            ));
        }
        let cur = inner.read();
        Ok(BackwardBitStreamReader { inner, cur, pos: count })
    }

    fn advance(&mut self) {
        if self.inner.is_empty() {
            self.pos = 0;
            return;
        }
        self.cur = self.inner.read();
        self.pos = 64;
    }

    /// True iff there are no more bits left to read.
    pub fn is_empty(&mut self) -> bool {
        if self.pos == 0 {
            self.advance();
        }
        self.pos == 0
    }

    /// Read the previous bit (i.e. the stream, consumed back to front).
    pub fn read_bit(&mut self) -> bool {
        if self.pos == 0 {
            self.advance();
        }
        self.pos -= 1;
        (self.cur >> self.pos) & 1 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("fsais_bit_stream_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("bits.bin")
    }

    fn bits_for(n: usize, seed: u64) -> Vec<bool> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state & 1 == 1
            })
            .collect()
    }

    #[test]
    fn round_trips_forward() {
        for &n in &[0usize, 1, 63, 64, 65, 127, 128, 129, 1000] {
            let path = scratch(&format!("fwd_{n}"));
            let bits = bits_for(n, 0x9E3779B97F4A7C15 ^ n as u64);
            {
                let mut w = BitStreamWriter::new(&path).unwrap();
                for &b in &bits {
                    w.write_bit(b);
                }
                w.close().unwrap();
            }
            let mut r = BitStreamReader::new(&path).unwrap();
            for &b in &bits {
                assert!(!r.is_empty());
                assert_eq!(b, r.read_bit().unwrap());
            }
            assert!(r.is_empty());
            std::fs::remove_file(&path).ok();
        }
    }

    #[test]
    fn round_trips_backward_as_reverse() {
        for &n in &[1usize, 63, 64, 65, 200] {
            let path = scratch(&format!("bwd_{n}"));
            let bits = bits_for(n, 0xC2B2AE3D27D4EB4F ^ n as u64);
            {
                let mut w = BitStreamWriter::new(&path).unwrap();
                for &b in &bits {
                    w.write_bit(b);
                }
                w.close().unwrap();
            }
            let mut r = BackwardBitStreamReader::new(&path).unwrap();
            for &b in bits.iter().rev() {
                assert!(!r.is_empty());
                assert_eq!(b, r.read_bit());
            }
            assert!(r.is_empty());
            std::fs::remove_file(&path).ok();
        }
    }
}
