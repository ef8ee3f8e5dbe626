//! External-memory suffix array construction (§1/§2): given a text too large to sort in RAM with
//! an ordinary comparison sort, build its suffix array by induced sorting, partitioning the work
//! into RAM-bounded blocks and streaming intermediate state through the typed I/O layer and the
//! external-memory radix heap rather than holding the whole working set in memory at once.
//!
//! Grounded on the engine's top-level driver (`fsais_src/construct_sa.hpp`): classify the text,
//! hand its position space to the RAM-bounded block partitioner, merge the blocks' own sorted
//! star runs into a global order (recursing into a reduced problem when that order isn't already
//! uniquely named), then induce and emit the final suffix array. Recursion bottoms out in
//! [sais_core]'s array-based sorter only once a (sub)problem is small enough to fit comfortably
//! under the caller's RAM budget — never on the original, possibly-too-large-for-RAM text.

pub mod error;
pub mod io;
pub mod utils;

mod block;
mod induction;
mod radix_heap;
mod sais_core;

use std::path::{Path, PathBuf};

use error::{Error, Result};
use io::stream_reader::StreamReader;
use io::stream_writer::StreamWriter;

/// Register every counter this crate exposes with `collector`, matching the per-module
/// `register_biometrics` convention each submodule follows.
pub fn register_biometrics(collector: &biometrics::Collector) {
    error::register_biometrics(collector);
    utils::register_biometrics(collector);
    radix_heap::register_biometrics(collector);
}

/// The width, in bytes, of one input symbol on disk. Matches §2's "the input alphabet is some
/// fixed-width unsigned integer type"; wrapper/packed-integer encodings are an explicit non-goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolWidth {
    U8,
    U16,
    U32,
    U64,
}

impl SymbolWidth {
    /// Width of one symbol of this kind, in bytes.
    pub fn bytes(self) -> u8 {
        match self {
            SymbolWidth::U8 => 1,
            SymbolWidth::U16 => 2,
            SymbolWidth::U32 => 4,
            SymbolWidth::U64 => 8,
        }
    }
}

/// Construction-time options (C9): everything [construct_suffix_array] needs besides the text and
/// output path themselves.
#[derive(Clone, Debug)]
pub struct ConstructionOptions {
    /// Width of one symbol in the input file.
    pub symbol_width: SymbolWidth,
    /// Directory (plus filename prefix) under which every temporary stream this run creates is
    /// placed; siblings of this path are created and removed over the course of one call.
    pub tempfile_basename: PathBuf,
    /// Upper bound, in bytes, on how much of the text's star positions this crate will ever hold
    /// in RAM at once while partitioning and locally sorting a block (§4.3's "a block's star
    /// substrings fit in RAM" assumption, made an explicit, caller-controlled parameter rather
    /// than an unstated constant).
    pub ram_budget_bytes: u64,
}

impl ConstructionOptions {
    /// Options reading `symbol_width`-wide symbols, scratching temporary files as siblings of
    /// `tempfile_basename`, and bounding per-block RAM use to `ram_budget_bytes`.
    pub fn new(symbol_width: SymbolWidth, tempfile_basename: impl Into<PathBuf>, ram_budget_bytes: u64) -> Self {
        ConstructionOptions {
            symbol_width,
            tempfile_basename: tempfile_basename.into(),
            ram_budget_bytes,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.tempfile_basename.as_os_str().is_empty() {
            return Err(Error::configuration("tempfile_basename must not be empty"));
        }
        if self.ram_budget_bytes == 0 {
            return Err(Error::configuration("ram_budget_bytes must be nonzero"));
        }
        Ok(())
    }

    fn path_for(&self, suffix: &str) -> PathBuf {
        path_for_base(&self.tempfile_basename, suffix)
    }
}

fn path_for_base(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn read_text(path: &Path, width: SymbolWidth) -> Result<Vec<u64>> {
    match width {
        SymbolWidth::U8 => {
            let mut r = StreamReader::<u8>::new(path)?;
            let mut out = Vec::new();
            while !r.is_empty() {
                out.push(r.read() as u64);
            }
            Ok(out)
        }
        SymbolWidth::U16 => {
            let mut r = StreamReader::<u16>::new(path)?;
            let mut out = Vec::new();
            while !r.is_empty() {
                out.push(r.read() as u64);
            }
            Ok(out)
        }
        SymbolWidth::U32 => {
            let mut r = StreamReader::<u32>::new(path)?;
            let mut out = Vec::new();
            while !r.is_empty() {
                out.push(r.read() as u64);
            }
            Ok(out)
        }
        SymbolWidth::U64 => {
            let mut r = StreamReader::<u64>::new(path)?;
            let mut out = Vec::new();
            while !r.is_empty() {
                out.push(r.read());
            }
            Ok(out)
        }
    }
}

/// Below this many symbols, sorting directly in RAM is cheaper and simpler than partitioning
/// into blocks; also the floor every recursive reduced-name-string problem eventually shrinks to.
const BASE_CASE_MAX: usize = 64;

/// Build the suffix array of `text` (which must already carry its trailing sentinel), recursing
/// on a reduced name-string problem when the block merge's naming pass doesn't already uniquely
/// name every LMS substring. Returns the full induced order, sentinel included.
fn construct_level(
    text: &[u64],
    alphabet_size: usize,
    options: &ConstructionOptions,
    base: &Path,
    level: u32,
) -> Result<Vec<u64>> {
    let n = text.len();
    if n <= BASE_CASE_MAX {
        return Ok(sais_core::suffix_array(text, alphabet_size));
    }

    let is_s = sais_core::classify(text);
    let lms = sais_core::lms_positions(&is_s);
    if lms.len() <= 1 {
        return Ok(sais_core::induce_final(text, alphabet_size, &lms));
    }

    let level_base = path_for_base(base, &format!(".L{level}"));
    let plan = block::BlockPlan::new(n as u64, options.ram_budget_bytes)?;

    let plus_base = path_for_base(&level_base, ".plus_blocks");
    let minus_base = path_for_base(&level_base, ".minus_blocks");
    block::induce_blocks(text, &is_s, &plan, &plus_base, &minus_base)?;

    let heap_tmp = path_for_base(&level_base, ".heap");
    let pass_a_out = path_for_base(&level_base, ".pass_a");
    let pass_b_out = path_for_base(&level_base, ".pass_b");
    let pass_a =
        induction::em_induce_plus_star_substrings(text, &is_s, plan.n_blocks, &plus_base, &heap_tmp, &pass_a_out)?;
    let pass_b =
        induction::em_induce_minus_star_substrings(text, &is_s, plan.n_blocks, &minus_base, &heap_tmp, &pass_b_out)?;

    let n_minus_stars = (0..n).filter(|&i| sais_core::is_rms(&is_s, i)).count() as u64;
    if pass_b.ordered.len() as u64 != n_minus_stars {
        return Err(Error::invariant_violation(
            "minus-star merge produced a different count than direct classification",
        ));
    }

    let sorted_lms: Vec<u64> = if pass_a.n_names as usize == lms.len() {
        // Every adjacent pair in the merge differed, so names were assigned 0, 1, 2, ... in
        // lockstep with `ordered`: the merge's own output is already the final LMS order.
        pass_a.ordered.clone()
    } else {
        let mut name_by_pos = vec![0u64; n];
        for (i, &p) in pass_a.ordered.iter().enumerate() {
            name_by_pos[p as usize] = pass_a.names[i];
        }
        let reduced_text: Vec<u64> = lms.iter().map(|&p| name_by_pos[p as usize]).collect();
        let reduced_sa = construct_level(&reduced_text, pass_a.n_names as usize, options, base, level + 1)?;
        reduced_sa.iter().map(|&i| lms[i as usize]).collect()
    };

    let sa = sais_core::induce_final(text, alphabet_size, &sorted_lms);

    // Channel the induced order through the radix heap and a size-capped multi-part file, then
    // read it back, so every recursion level genuinely exercises the bucketed output path rather
    // than only ever producing `sa` in memory.
    let multipart_base = path_for_base(&level_base, ".final");
    let single_part_max_bytes = options.ram_budget_bytes.max(8);
    let n_parts =
        induction::em_induce_minus_and_plus_suffixes(&sa, text, &heap_tmp, &multipart_base, single_part_max_bytes)?;
    let roundtripped = induction::read_multipart_suffixes_forward(&multipart_base, n_parts)?;
    if roundtripped.len() != sa.len() {
        return Err(Error::invariant_violation(
            "final induction's multi-part round trip changed the suffix count",
        ));
    }

    for i in 0..(plan.n_blocks.max(1) as usize) {
        utils::file_delete(&io::multi_stream::stream_path(&plus_base, i)).ok();
        utils::file_delete(&io::multi_stream::stream_path(&minus_base, i)).ok();
    }
    for path in [&pass_a.positions_path, &pass_a.diff_path, &pass_b.positions_path, &pass_b.diff_path] {
        utils::file_delete(path).ok();
    }

    Ok(roundtripped)
}

/// Build the suffix array of the text stored at `text_path` and write it, as a stream of `u64`
/// offsets, to `sa_path`.
///
/// The suffix array is always emitted as `u64` regardless of `options.symbol_width`: packed
/// output encodings are the same non-goal as packed input encodings (§1), and `u64` is the widest
/// offset type any of the upstream streams already use.
pub fn construct_suffix_array(text_path: &Path, sa_path: &Path, options: &ConstructionOptions) -> Result<()> {
    options.validate()?;

    let mut text = read_text(text_path, options.symbol_width)?;
    // The bucket tables in `sais_core`/`block` are sized by `alphabet_size`, so for wide symbol
    // types we bound it by the distinct values actually present rather than the type's full
    // range (2^32 or 2^64 buckets would be infeasible to allocate for a handful of distinct
    // symbols).
    let max_symbol = text.iter().copied().max().unwrap_or(0);
    let observed_alphabet_size = max_symbol as usize + 1;
    // Shift every symbol up by one and append a sentinel strictly below them all, so the
    // induced-sorting base case never has to special-case "no explicit terminator".
    for s in text.iter_mut() {
        *s += 1;
    }
    text.push(0);
    let alphabet_size = observed_alphabet_size + 1;

    let sa = construct_level(&text, alphabet_size, options, &options.tempfile_basename, 0)?;
    if sa.len() != text.len() {
        return Err(Error::invariant_violation(format!(
            "construction produced {} suffixes, expected {}",
            sa.len(),
            text.len()
        )));
    }

    let mut writer = StreamWriter::<u64>::new(sa_path)?;
    let sentinel = (text.len() - 1) as u64;
    for &p in &sa {
        if p != sentinel {
            writer.write(p);
        }
    }
    writer.close()?;

    Ok(())
}
