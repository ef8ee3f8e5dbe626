//! RAM-bounded block partitioner (C4): divides a text's position space into blocks sized to fit
//! under a caller-supplied RAM budget, and within each block sorts that block's own LMS
//! ("plus-star") and RMS ("minus-star") positions by full substring content.
//!
//! Grounded on `fsais_src/block_sort/im_induce_substrings.hpp`'s per-block responsibility: each
//! block is sorted independently of the others, in RAM, using only `block_size` worth of star
//! positions at a time. The comparator it sorts with ([`sais_core::lms_substrings_cmp`] /
//! [`sais_core::rms_substrings_cmp`]) reads `text`/`is_s` directly rather than a block-local
//! copy, so a run that extends past a block's own boundary is still compared correctly — only
//! the *set of positions* a block is responsible for sorting is partitioned, not the text a
//! comparison is allowed to look at. Each block's sorted run is written into its own sub-stream
//! of a shared [`MultiStreamWriter`], so [`crate::induction`]'s merge can read every block's
//! output independently and lazily instead of waiting for the whole partition to finish.

use std::path::Path;

use crate::error::{Error, Result};
use crate::io::multi_stream::MultiStreamWriter;
use crate::sais_core;

/// The largest block count a merge can address: block ids are packed into the high bits of a
/// radix-heap value word alongside a position (see [`crate::induction`]).
pub(crate) const MAX_BLOCKS: u64 = 1 << 24;

/// How a text's position space of length `n` is divided into RAM-bounded blocks.
pub(crate) struct BlockPlan {
    pub(crate) block_size: u64,
    pub(crate) n_blocks: u64,
}

impl BlockPlan {
    /// Size a block so that sorting it (one `u64` position plus the implicit `u64` key a
    /// comparison sort holds per element) comfortably fits in `ram_budget_bytes`.
    pub(crate) fn new(n: u64, ram_budget_bytes: u64) -> Result<Self> {
        const BYTES_PER_POSITION: u64 = 16;
        let block_size = (ram_budget_bytes / BYTES_PER_POSITION).max(1);
        let n_blocks = if n == 0 { 0 } else { (n + block_size - 1) / block_size };
        if n_blocks > MAX_BLOCKS {
            return Err(Error::type_capacity("block count", n_blocks, MAX_BLOCKS));
        }
        Ok(BlockPlan { block_size, n_blocks })
    }

    pub(crate) fn block_of(&self, position: u64) -> u64 {
        position / self.block_size
    }
}

/// Partition `text`'s star positions by block and sort each block's list in place, writing the
/// plus-star (LMS) runs under `plus_base` and the minus-star (RMS) runs under `minus_base`, one
/// sub-stream per block.
pub(crate) fn induce_blocks(
    text: &[u64],
    is_s: &[bool],
    plan: &BlockPlan,
    plus_base: &Path,
    minus_base: &Path,
) -> Result<()> {
    let n_streams = (plan.n_blocks as usize).max(1);
    let mut plus_blocks: Vec<Vec<u64>> = vec![Vec::new(); n_streams];
    let mut minus_blocks: Vec<Vec<u64>> = vec![Vec::new(); n_streams];

    for i in 0..text.len() as u64 {
        let p = i as usize;
        if sais_core::is_lms(is_s, p) {
            let b = plan.block_of(i) as usize;
            plus_blocks[b].push(i);
        } else if sais_core::is_rms(is_s, p) {
            let b = plan.block_of(i) as usize;
            minus_blocks[b].push(i);
        }
    }

    let mut plus_writer = MultiStreamWriter::<u64>::new(plus_base, n_streams)?;
    for (b, positions) in plus_blocks.iter_mut().enumerate() {
        positions.sort_unstable_by(|&p, &q| {
            sais_core::lms_substrings_cmp(text, is_s, p as usize, q as usize)
        });
        for &p in positions.iter() {
            plus_writer.write_to_ith_file(b, p);
        }
    }
    plus_writer.close()?;

    let mut minus_writer = MultiStreamWriter::<u64>::new(minus_base, n_streams)?;
    for (b, positions) in minus_blocks.iter_mut().enumerate() {
        positions.sort_unstable_by(|&p, &q| {
            sais_core::rms_substrings_cmp(text, is_s, p as usize, q as usize)
        });
        for &p in positions.iter() {
            minus_writer.write_to_ith_file(b, p);
        }
    }
    minus_writer.close()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::multi_stream::MultiStreamReader;

    fn with_sentinel(s: &str) -> Vec<u64> {
        let mut text: Vec<u64> = s.bytes().map(|b| b as u64 + 1).collect();
        text.push(0);
        text
    }

    #[test]
    fn partitions_into_more_than_one_block_for_a_small_budget() {
        let text = with_sentinel("mississippi");
        // 16 bytes/position, so a budget of 32 bytes caps each block at 2 positions.
        let plan = BlockPlan::new(text.len() as u64, 32).unwrap();
        assert!(plan.n_blocks > 1, "expected multiple blocks, got {}", plan.n_blocks);
    }

    #[test]
    fn each_block_run_is_sorted_by_full_substring() {
        let dir = std::env::temp_dir().join(format!("fsais_block_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let text = with_sentinel("mississippi");
        let is_s = sais_core::classify(&text);
        let plan = BlockPlan::new(text.len() as u64, 32).unwrap();

        let plus_base = dir.join("plus");
        let minus_base = dir.join("minus");
        induce_blocks(&text, &is_s, &plan, &plus_base, &minus_base).unwrap();

        let mut reader = MultiStreamReader::<u64>::new(&plus_base, plan.n_blocks as usize).unwrap();
        for b in 0..plan.n_blocks as usize {
            let mut run = Vec::new();
            while !reader.is_empty_ith_file(b) {
                run.push(reader.read_from_ith_file(b));
            }
            for w in run.windows(2) {
                assert_ne!(
                    std::cmp::Ordering::Greater,
                    sais_core::lms_substrings_cmp(&text, &is_s, w[0] as usize, w[1] as usize)
                );
            }
            for &p in &run {
                assert!(plan.block_of(p) as usize == b);
                assert!(sais_core::is_lms(&is_s, p as usize));
            }
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn every_star_position_is_written_exactly_once() {
        let dir = std::env::temp_dir().join(format!("fsais_block_count_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let text = with_sentinel("banana");
        let is_s = sais_core::classify(&text);
        let want_plus = (0..text.len()).filter(|&i| sais_core::is_lms(&is_s, i)).count();
        let want_minus = (0..text.len()).filter(|&i| sais_core::is_rms(&is_s, i)).count();
        let plan = BlockPlan::new(text.len() as u64, 1 << 20).unwrap();
        assert_eq!(1, plan.n_blocks);

        let plus_base = dir.join("plus");
        let minus_base = dir.join("minus");
        induce_blocks(&text, &is_s, &plan, &plus_base, &minus_base).unwrap();

        let mut plus_reader = MultiStreamReader::<u64>::new(&plus_base, 1).unwrap();
        let mut got_plus = 0usize;
        while !plus_reader.is_empty_ith_file(0) {
            plus_reader.read_from_ith_file(0);
            got_plus += 1;
        }
        let mut minus_reader = MultiStreamReader::<u64>::new(&minus_base, 1).unwrap();
        let mut got_minus = 0usize;
        while !minus_reader.is_empty_ith_file(0) {
            minus_reader.read_from_ith_file(0);
            got_minus += 1;
        }
        assert_eq!(want_plus, got_plus);
        assert_eq!(want_minus, got_minus);
        std::fs::remove_dir_all(&dir).ok();
    }
}
