//! Closest-string matching for approximate program lookups.
//!
//! Similarity is the Ratcliff/Obershelp ratio `2*M/T`, where `M` counts the
//! characters covered by recursively found longest common blocks and `T` is
//! the combined length of both strings.

use crate::error::{IplError, Result};

/// Cutoff schedule for [`closest_bounded`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    /// First cutoff tried
    pub cutoff: f64,
    /// Amount the cutoff is relaxed by after each miss
    pub step: f64,
    /// Lowest cutoff tried before giving up
    pub floor: f64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            cutoff: 0.9,
            step: 0.01,
            floor: 0.2,
        }
    }
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, size)`.
/// Ties go to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    (alo, ahi): (usize, usize),
    (blo, bhi): (usize, usize),
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    let width = bhi - blo;
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo;
            if a[i] == b[j] {
                let k = prev[col] + 1;
                cur[col + 1] = k;
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            } else {
                cur[col + 1] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    (best_i, best_j, best_size)
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut pending = vec![((0, a.len()), (0, b.len()))];

    while let Some(((alo, ahi), (blo, bhi))) = pending.pop() {
        if alo >= ahi || blo >= bhi {
            continue;
        }
        let (i, j, size) = longest_match(a, b, (alo, ahi), (blo, bhi));
        if size == 0 {
            continue;
        }
        total += size;
        pending.push(((alo, i), (blo, j)));
        pending.push(((i + size, ahi), (j + size, bhi)));
    }

    total
}

/// Similarity of two strings in `[0.0, 1.0]`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Best candidate scoring at least `cutoff`. Equal scores go to the
/// lexicographically greatest candidate.
pub fn closest<'a, S: AsRef<str>>(query: &str, candidates: &'a [S], cutoff: f64) -> Option<&'a str> {
    candidates
        .iter()
        .map(|candidate| (ratio(query, candidate.as_ref()), candidate.as_ref()))
        .filter(|(score, _)| *score >= cutoff)
        .max_by(|(sa, ca), (sb, cb)| sa.total_cmp(sb).then_with(|| ca.cmp(cb)))
        .map(|(_, candidate)| candidate)
}

/// Most cutoffs [`closest_bounded`] tries after the first one. Smaller steps
/// are widened to fit.
const MAX_ROUNDS: f64 = 1000.0;

/// Retry [`closest`] with a cutoff relaxed by `options.step` each round until
/// a candidate matches or `options.floor` has been tried.
pub fn closest_bounded<'a, S: AsRef<str>>(
    query: &str,
    candidates: &'a [S],
    options: MatchOptions,
) -> Result<&'a str> {
    let span = (options.cutoff - options.floor).max(0.0);
    let (step, rounds) = if options.step > 0.0 {
        let step = options.step.max(span / MAX_ROUNDS);
        (step, (span / step).ceil() as u32)
    } else {
        (0.0, 0)
    };

    for round in 0..=rounds {
        let cutoff = (options.cutoff - step * f64::from(round)).max(options.floor);
        if let Some(hit) = closest(query, candidates, cutoff) {
            return Ok(hit);
        }
    }

    Err(IplError::AmbiguousMatch {
        query: query.to_string(),
        floor: options.floor,
    })
}
