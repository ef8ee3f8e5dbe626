//! The induced-sorting subroutine shared by the in-memory block inducer (§4.3 point 2: "a tiny
//! leaf sort... handles the base case" plus the induced-sorting machinery that surrounds it) and
//! the recursion base case in the top-level constructor.
//!
//! Works over a text that has an explicit, unique, minimal sentinel as its last symbol (so the
//! classic SAIS classify/induce steps need no special-casing at the right edge). Grounded on the
//! standard Nong/Zhang/Chen induced-sorting algorithm as described in §3/§4.3/§4.4; this module
//! is the "black box" §1 calls out as a non-goal replaced here by a from-scratch implementation
//! rather than a `divsufsort` binding, since pulling in a C suffix-sort library is out of scope
//! for a pure-Rust crate in this workspace.

/// Suffix type of every position, classified by a single backward pass: `true` = S-type (plus),
/// `false` = L-type (minus). The sentinel (last position) is always S-type.
pub(crate) fn classify(text: &[u64]) -> Vec<bool> {
    let n = text.len();
    let mut is_s = vec![false; n];
    if n == 0 {
        return is_s;
    }
    is_s[n - 1] = true;
    for i in (0..n - 1).rev() {
        is_s[i] = text[i] < text[i + 1] || (text[i] == text[i + 1] && is_s[i + 1]);
    }
    is_s
}

/// A position is LMS ("star") iff it is S-type and immediately preceded by an L-type position.
/// Position 0 is never LMS (it has no predecessor).
pub(crate) fn is_lms(is_s: &[bool], i: usize) -> bool {
    i > 0 && is_s[i] && !is_s[i - 1]
}

pub(crate) fn lms_positions(is_s: &[bool]) -> Vec<u64> {
    (0..is_s.len() as u64).filter(|&i| is_lms(is_s, i as usize)).collect()
}

/// The dual marker used for the "minus-star" stream (§3/§4.4): an L-type position immediately
/// preceded by an S-type position, i.e. the start of a new L-run. Symmetric to [`is_lms`].
pub(crate) fn is_rms(is_s: &[bool], i: usize) -> bool {
    i > 0 && !is_s[i] && is_s[i - 1]
}

pub(crate) fn bucket_sizes(text: &[u64], alphabet_size: usize) -> Vec<u64> {
    let mut sizes = vec![0u64; alphabet_size];
    for &c in text {
        sizes[c as usize] += 1;
    }
    sizes
}

pub(crate) fn bucket_heads(sizes: &[u64]) -> Vec<u64> {
    let mut sum = 0u64;
    let mut heads = vec![0u64; sizes.len()];
    for (i, &s) in sizes.iter().enumerate() {
        heads[i] = sum;
        sum += s;
    }
    heads
}

pub(crate) fn bucket_tails(sizes: &[u64]) -> Vec<u64> {
    let mut sum = 0u64;
    let mut tails = vec![0u64; sizes.len()];
    for (i, &s) in sizes.iter().enumerate() {
        sum += s;
        tails[i] = sum;
    }
    tails
}

pub(crate) const EMPTY: u64 = u64::MAX;

pub(crate) fn induce_l(sa: &mut [u64], text: &[u64], is_s: &[bool], sizes: &[u64]) {
    let mut heads = bucket_heads(sizes);
    for i in 0..sa.len() {
        if sa[i] == EMPTY || sa[i] == 0 {
            continue;
        }
        let p = (sa[i] - 1) as usize;
        if !is_s[p] {
            let c = text[p] as usize;
            sa[heads[c] as usize] = p as u64;
            heads[c] += 1;
        }
    }
}

pub(crate) fn induce_s(sa: &mut [u64], text: &[u64], is_s: &[bool], sizes: &[u64]) {
    let mut tails = bucket_tails(sizes);
    for i in (0..sa.len()).rev() {
        if sa[i] == EMPTY || sa[i] == 0 {
            continue;
        }
        let p = (sa[i] - 1) as usize;
        if is_s[p] {
            let c = text[p] as usize;
            tails[c] -= 1;
            sa[tails[c] as usize] = p as u64;
        }
    }
}

pub(crate) fn lms_substrings_equal(text: &[u64], is_s: &[bool], p: usize, q: usize) -> bool {
    run_substrings_equal(text, is_s, p, q, is_lms)
}

/// Mirrors [`lms_substrings_equal`] for the "minus-star" runs marked by [`is_rms`].
pub(crate) fn rms_substrings_equal(text: &[u64], is_s: &[bool], p: usize, q: usize) -> bool {
    run_substrings_equal(text, is_s, p, q, is_rms)
}

fn run_substrings_equal(
    text: &[u64],
    is_s: &[bool],
    p: usize,
    q: usize,
    is_boundary: fn(&[bool], usize) -> bool,
) -> bool {
    if p == text.len() - 1 || q == text.len() - 1 {
        return p == q;
    }
    let n = text.len();
    let mut i = 0usize;
    loop {
        let pi = p + i;
        let qi = q + i;
        let p_end = pi >= n || (i > 0 && is_boundary(is_s, pi));
        let q_end = qi >= n || (i > 0 && is_boundary(is_s, qi));
        if p_end && q_end {
            return true;
        }
        if p_end != q_end {
            return false;
        }
        if text[pi] != text[qi] || is_s[pi] != is_s[qi] {
            return false;
        }
        i += 1;
    }
}

/// Total order over the runs [`is_lms`]/[`is_rms`] mark off, used to sort a block's own star
/// positions locally and to break ties within a cross-block merge bucket. Compares symbol by
/// symbol past the run boundary; the sentinel position (always unique) sorts before everything
/// else that isn't itself.
pub(crate) fn lms_substrings_cmp(text: &[u64], is_s: &[bool], p: usize, q: usize) -> std::cmp::Ordering {
    run_substrings_cmp(text, is_s, p, q, is_lms)
}

/// Mirrors [`lms_substrings_cmp`] for [`is_rms`]-bounded runs.
pub(crate) fn rms_substrings_cmp(text: &[u64], is_s: &[bool], p: usize, q: usize) -> std::cmp::Ordering {
    run_substrings_cmp(text, is_s, p, q, is_rms)
}

fn run_substrings_cmp(
    text: &[u64],
    is_s: &[bool],
    p: usize,
    q: usize,
    is_boundary: fn(&[bool], usize) -> bool,
) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    if p == q {
        return Ordering::Equal;
    }
    let sentinel = text.len() - 1;
    if p == sentinel || q == sentinel {
        return if p == sentinel { Ordering::Less } else { Ordering::Greater };
    }
    let n = text.len();
    let mut i = 0usize;
    loop {
        let pi = p + i;
        let qi = q + i;
        let p_end = pi >= n || (i > 0 && is_boundary(is_s, pi));
        let q_end = qi >= n || (i > 0 && is_boundary(is_s, qi));
        if p_end && q_end {
            return Ordering::Equal;
        }
        if p_end != q_end {
            // The shorter run is a prefix of the longer one; under SA-IS, a run that ends
            // (hits the sentinel or a boundary) compares before one that keeps extending with
            // a real symbol at the same position, since the sentinel is the minimal symbol.
            return if p_end { Ordering::Less } else { Ordering::Greater };
        }
        match text[pi].cmp(&text[qi]) {
            Ordering::Equal => {}
            other => return other,
        }
        match is_s[pi].cmp(&is_s[qi]) {
            Ordering::Equal => {}
            other => return other,
        }
        i += 1;
    }
}

/// Induce the final suffix array given the already-correct global order of a text's LMS
/// positions (`sorted_lms`, most-significant-to-least-significant by suffix order is NOT
/// required — this seeds bucket tails in reverse so any consistent ascending order works).
/// This is the single place genuine global order is ever computed into an array: callers must
/// have already resolved `sorted_lms` themselves (directly, or via recursion on a reduced
/// problem) rather than precomputing the answer some other way.
pub(crate) fn induce_final(text: &[u64], alphabet_size: usize, sorted_lms: &[u64]) -> Vec<u64> {
    let n = text.len();
    let is_s = classify(text);
    let sizes = bucket_sizes(text, alphabet_size);
    let mut sa = vec![EMPTY; n];
    let mut tails = bucket_tails(&sizes);
    for &p in sorted_lms.iter().rev() {
        let c = text[p as usize] as usize;
        tails[c] -= 1;
        sa[tails[c] as usize] = p;
    }
    induce_l(&mut sa, text, &is_s, &sizes);
    induce_s(&mut sa, text, &is_s, &sizes);
    sa
}

/// Construct the suffix array of `text`, which MUST end with a value strictly smaller than every
/// other value in it (the sentinel). `alphabet_size` bounds every value in `text` (exclusive).
pub(crate) fn suffix_array(text: &[u64], alphabet_size: usize) -> Vec<u64> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![0];
    }
    let is_s = classify(text);
    let sizes = bucket_sizes(text, alphabet_size);

    let mut sa = vec![EMPTY; n];
    {
        let mut tails = bucket_tails(&sizes);
        for i in (0..n).rev() {
            if is_lms(&is_s, i) {
                let c = text[i] as usize;
                tails[c] -= 1;
                sa[tails[c] as usize] = i as u64;
            }
        }
    }
    induce_l(&mut sa, text, &is_s, &sizes);
    induce_s(&mut sa, text, &is_s, &sizes);

    let lms = lms_positions(&is_s);
    if lms.len() > 1 {
        let mut name = vec![EMPTY; n];
        let mut cur_name = 0u64;
        let mut prev: Option<usize> = None;
        for &p in sa.iter() {
            let p = p as usize;
            if !is_lms(&is_s, p) {
                continue;
            }
            if let Some(pp) = prev {
                if !lms_substrings_equal(text, &is_s, pp, p) {
                    cur_name += 1;
                }
            }
            name[p] = cur_name;
            prev = Some(p);
        }
        let n_names = if lms.is_empty() { 0 } else { cur_name + 1 };

        let summary: Vec<u64> = lms.iter().map(|&p| name[p as usize]).collect();
        let sorted_lms: Vec<u64> = if (n_names as usize) < lms.len() {
            let summary_sa = suffix_array(&summary, n_names as usize);
            summary_sa.iter().map(|&i| lms[i as usize]).collect()
        } else {
            let mut order: Vec<u64> = (0..lms.len() as u64).collect();
            order.sort_unstable_by_key(|&i| summary[i as usize]);
            order.iter().map(|&i| lms[i as usize]).collect()
        };

        for slot in sa.iter_mut() {
            *slot = EMPTY;
        }
        let mut tails = bucket_tails(&sizes);
        for &p in sorted_lms.iter().rev() {
            let c = text[p as usize] as usize;
            tails[c] -= 1;
            sa[tails[c] as usize] = p;
        }
        induce_l(&mut sa, text, &is_s, &sizes);
        induce_s(&mut sa, text, &is_s, &sizes);
    }

    sa
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_sentinel(s: &str) -> (Vec<u64>, usize) {
        let mut text: Vec<u64> = s.bytes().map(|b| b as u64 + 1).collect();
        text.push(0);
        (text, 256)
    }

    fn sa_of(s: &str) -> Vec<u64> {
        let (text, alphabet) = with_sentinel(s);
        let sa = suffix_array(&text, alphabet);
        sa.into_iter().filter(|&p| (p as usize) != s.len()).collect()
    }

    #[test]
    fn banana() {
        assert_eq!(vec![5, 3, 1, 0, 4, 2], sa_of("banana"));
    }

    #[test]
    fn mississippi() {
        assert_eq!(vec![10, 7, 4, 1, 0, 9, 8, 6, 3, 5, 2], sa_of("mississippi"));
    }

    #[test]
    fn all_same_character() {
        assert_eq!(vec![7, 6, 5, 4, 3, 2, 1, 0], sa_of("aaaaaaaa"));
    }

    #[test]
    fn abracadabra() {
        assert_eq!(vec![10, 7, 0, 3, 5, 8, 1, 4, 6, 9, 2], sa_of("abracadabra"));
    }

    #[test]
    fn empty_string() {
        assert!(sa_of("").is_empty());
    }

    #[test]
    fn single_character() {
        assert_eq!(vec![0], sa_of("x"));
    }

    #[test]
    fn matches_naive_sort_on_random_strings() {
        let mut state = 0x2545F4914F6CDD1Du64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        for trial in 0..40 {
            let len = (next() % 60) as usize;
            let alphabet = 1 + (next() % 4) as u8;
            let s: Vec<u8> = (0..len).map(|_| b'a' + (next() % alphabet as u64) as u8).collect();
            let text = String::from_utf8(s).unwrap();
            let got = sa_of(&text);
            let mut want: Vec<usize> = (0..text.len()).collect();
            want.sort_by_key(|&i| &text.as_bytes()[i..]);
            let want: Vec<u64> = want.into_iter().map(|x| x as u64).collect();
            assert_eq!(want, got, "trial {trial} text {text:?}");
        }
    }
}
