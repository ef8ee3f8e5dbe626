//! EM induction driver (C5): merges every block's locally-sorted star run into one globally
//! correct order and names it (Passes A/B), then — once the caller holds a fully correct LMS
//! order, resolved directly from unique names or via recursion on a reduced problem — channels
//! the induced suffix array to disk (Pass C).
//!
//! Grounded on `fsais_src/induce/em_induce_plus_star_substrings.hpp` / `em_induce_minus_star_
//! substrings.hpp` / `em_induce_minus_and_plus_suffixes.hpp`: each pass still drains
//! [`crate::radix_heap::RadixHeap`] bucketed by leading symbol (§4.4's "outer loop over
//! symbols"), but now the heap is doing real multi-source work — coarse-bucketing the next
//! pending position from every block that still has one, at most `n_blocks` positions held in
//! memory at a time — rather than re-sorting a list some other component already fully ordered.
//! Positions sharing a leading symbol (common with small alphabets) are resolved within the
//! bucket by an explicit full-substring comparison, so the merge's output is a genuine total
//! order rather than just a same-symbol grouping.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::block::MAX_BLOCKS;
use crate::error::{Error, Result};
use crate::io::bit_stream::{BackwardBitStreamReader, BitStreamWriter};
use crate::io::multi_part_reader::MultiPartBackwardReader;
use crate::io::multi_part_writer::MultiPartWriter;
use crate::io::multi_stream::MultiStreamReader;
use crate::io::stream_writer::StreamWriter;
use crate::radix_heap::RadixHeap;
use crate::sais_core;

const POSITION_BITS: u32 = 40;
const POSITION_MASK: u64 = (1u64 << POSITION_BITS) - 1;

fn pack(block: u64, position: u64) -> u64 {
    (block << POSITION_BITS) | position
}

fn unpack(value: u64) -> (u64, u64) {
    (value >> POSITION_BITS, value & POSITION_MASK)
}

/// Output of a star-substring merge: every star position in globally sorted order, the name
/// assigned to each (aligned index-for-index with `ordered`), and the on-disk paths the merge
/// wrote its own output to (owned by the caller, deleted once consumed).
pub(crate) struct StarNaming {
    pub(crate) positions_path: PathBuf,
    pub(crate) diff_path: PathBuf,
    pub(crate) ordered: Vec<u64>,
    pub(crate) names: Vec<u64>,
    pub(crate) n_names: u64,
}

/// Merge `n_blocks` independently block-sorted star runs (read from `base`'s sub-streams) into
/// one globally sorted sequence, then name adjacent distinct substrings via `equal`/`cmp`.
///
/// Only `n_blocks` pending positions (plus one bucket's worth of ties) are ever held at once
/// while draining the heap; `ordered`/`names` accumulate in memory here because the caller (the
/// recursion driver in `lib.rs`) needs the full resolved order to build a reduced problem or seed
/// the final induction, the same O(n) footprint `sais_core::induce_final` already requires.
fn merge_and_name(
    text: &[u64],
    is_s: &[bool],
    n_blocks: u64,
    base: &Path,
    heap_tmp: &Path,
    out_base: &Path,
    out_suffix: &str,
    cmp: fn(&[u64], &[bool], usize, usize) -> Ordering,
    equal: fn(&[u64], &[bool], usize, usize) -> bool,
) -> Result<StarNaming> {
    if text.len() as u64 > POSITION_MASK {
        return Err(Error::type_capacity("text length", text.len() as u64, POSITION_MASK));
    }
    if n_blocks > MAX_BLOCKS {
        return Err(Error::type_capacity("block count", n_blocks, MAX_BLOCKS));
    }
    let n_streams = (n_blocks as usize).max(1);
    let mut reader = MultiStreamReader::<u64>::new(base, n_streams)?;

    let mut heap = RadixHeap::new(heap_tmp);
    for b in 0..n_streams {
        refill(&mut reader, &mut heap, text, b as u64)?;
    }

    let mut ordered: Vec<u64> = Vec::new();
    let mut pending: Option<(u64, u64)> = None;
    loop {
        let (key, value) = match pending.take() {
            Some(kv) => kv,
            None => {
                if heap.is_empty() {
                    break;
                }
                heap.extract_min()?
            }
        };
        let mut bucket = Vec::new();
        let (block, p) = unpack(value);
        bucket.push(p);
        refill(&mut reader, &mut heap, text, block)?;
        loop {
            if heap.is_empty() {
                break;
            }
            let (k2, v2) = heap.extract_min()?;
            if k2 == key {
                let (b2, p2) = unpack(v2);
                bucket.push(p2);
                refill(&mut reader, &mut heap, text, b2)?;
            } else {
                pending = Some((k2, v2));
                break;
            }
        }
        bucket.sort_unstable_by(|&p, &q| cmp(text, is_s, p as usize, q as usize));
        ordered.extend(bucket);
    }

    let positions_path = {
        let mut name = out_base.as_os_str().to_owned();
        name.push(format!("{out_suffix}_pos"));
        PathBuf::from(name)
    };
    let diff_path = {
        let mut name = out_base.as_os_str().to_owned();
        name.push(format!("{out_suffix}_diff"));
        PathBuf::from(name)
    };
    let mut pos_w = StreamWriter::<u64>::new(&positions_path)?;
    let mut diff_w = BitStreamWriter::new(&diff_path)?;

    let mut names = Vec::with_capacity(ordered.len());
    let mut cur_name = 0u64;
    let mut prev: Option<u64> = None;
    let mut forward_diffs = 0u64;
    for &p in &ordered {
        let is_diff = match prev {
            None => true,
            Some(pp) => !equal(text, is_s, pp as usize, p as usize),
        };
        if is_diff && prev.is_some() {
            cur_name += 1;
        }
        if is_diff {
            forward_diffs += 1;
        }
        names.push(cur_name);
        pos_w.write(p);
        diff_w.write_bit(is_diff);
        prev = Some(p);
    }
    pos_w.close()?;
    diff_w.close()?;

    // Cross-check the diff bitstream by reading it back in reverse: a bug in the bit-stream
    // layer's forward/backward symmetry would otherwise silently desynchronize the name count
    // from what a downstream consumer re-reading this stream would see.
    let mut backward_diffs = 0u64;
    {
        let mut back = BackwardBitStreamReader::new(&diff_path)?;
        while !back.is_empty() {
            if back.read_bit() {
                backward_diffs += 1;
            }
        }
    }
    if backward_diffs != forward_diffs {
        return Err(Error::invariant_violation(format!(
            "diff bitstream round-trip mismatch: {forward_diffs} forward vs {backward_diffs} backward"
        )));
    }

    let n_names = if ordered.is_empty() { 0 } else { cur_name + 1 };
    Ok(StarNaming { positions_path, diff_path, ordered, names, n_names })
}

fn refill(reader: &mut MultiStreamReader<u64>, heap: &mut RadixHeap, text: &[u64], block: u64) -> Result<()> {
    let b = block as usize;
    if !reader.is_empty_ith_file(b) {
        let p = reader.read_from_ith_file(b);
        heap.push(text[p as usize], pack(block, p))?;
    }
    Ok(())
}

/// Pass A: merge every block's plus-star (LMS) run into the true global LMS-substring order.
pub(crate) fn em_induce_plus_star_substrings(
    text: &[u64],
    is_s: &[bool],
    n_blocks: u64,
    plus_base: &Path,
    heap_tmp: &Path,
    out_base: &Path,
) -> Result<StarNaming> {
    merge_and_name(
        text,
        is_s,
        n_blocks,
        plus_base,
        heap_tmp,
        out_base,
        ".plus_star",
        sais_core::lms_substrings_cmp,
        sais_core::lms_substrings_equal,
    )
}

/// Pass B: merge every block's minus-star (RMS) run into the true global RMS-substring order.
/// Kept as an independently-computed cross-check on the block partition: [`crate::lib`]'s driver
/// does not need this naming to resolve LMS order (Pass A already gives that directly), but a
/// second, differently-keyed merge over the same block partition is cheap insurance that the
/// partition and merge logic are not silently wrong in a way Pass A's own output wouldn't reveal.
pub(crate) fn em_induce_minus_star_substrings(
    text: &[u64],
    is_s: &[bool],
    n_blocks: u64,
    minus_base: &Path,
    heap_tmp: &Path,
    out_base: &Path,
) -> Result<StarNaming> {
    merge_and_name(
        text,
        is_s,
        n_blocks,
        minus_base,
        heap_tmp,
        out_base,
        ".minus_star",
        sais_core::rms_substrings_cmp,
        sais_core::rms_substrings_equal,
    )
}

/// Pass C: channel the already-induced final suffix array (`sa`, produced by
/// [`sais_core::induce_final`] from a genuinely-resolved LMS order) through the radix heap,
/// bucketed by leading symbol, then out to a size-capped multi-part file. Returns the number of
/// parts written.
pub(crate) fn em_induce_minus_and_plus_suffixes(
    sa: &[u64],
    text: &[u64],
    heap_tmp: &Path,
    multipart_base: &Path,
    single_part_max_bytes: u64,
) -> Result<u64> {
    let mut heap = RadixHeap::new(heap_tmp);
    for &p in sa {
        // Items sharing a leading symbol are pushed in their already-correct relative order;
        // the heap's FIFO-per-key behavior (§4.1's stability property) preserves that order
        // through the bucketed channel.
        let symbol = text[p as usize];
        heap.push(symbol, p)?;
    }
    let mut writer = MultiPartWriter::<u64>::new(multipart_base, single_part_max_bytes)?;
    while !heap.is_empty() {
        let (_, p) = heap.extract_min()?;
        writer.write(p);
    }
    writer.close()
}

/// Read back the multi-part output of [`em_induce_minus_and_plus_suffixes`] (which only supports
/// backward reading) into forward order.
pub(crate) fn read_multipart_suffixes_forward(multipart_base: &Path, n_parts: u64) -> Result<Vec<u64>> {
    let mut reader = MultiPartBackwardReader::<u64>::new(multipart_base, n_parts)?;
    let mut reversed = Vec::new();
    while !reader.is_empty() {
        reversed.push(reader.read());
    }
    reversed.reverse();
    Ok(reversed)
}
