/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// How the distance between an observed barcode and a whitelist
/// entry is measured when no exact match exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// full edit distance (substitutions, insertions and deletions)
    #[default]
    Levenshtein,
    /// substitutions only
    Hamming,
    /// a Hamming pass first; if that does not yield a unique
    /// candidate, a Levenshtein pass decides
    Mixed,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Levenshtein => write!(f, "levenshtein"),
            DistanceMetric::Hamming => write!(f, "hamming"),
            DistanceMetric::Mixed => write!(f, "mixed"),
        }
    }
}

/// The outcome of resolving an observed sequence against a whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// the region has no whitelist; the observed sequence is accepted verbatim
    Unrestricted,
    /// the observed sequence is the whitelist entry at this index
    Exact(usize),
    /// the unique closest whitelist entry within the allowed distance
    Corrected { index: usize, distance: usize },
    /// nothing within the allowed distance, or a tie between several entries
    NoMatch,
}

impl Match {
    #[inline(always)]
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Match::NoMatch)
    }

    #[inline(always)]
    pub fn is_exact(&self) -> bool {
        matches!(self, Match::Exact(_))
    }

    #[inline(always)]
    pub fn index(&self) -> Option<usize> {
        match self {
            Match::Exact(i) => Some(*i),
            Match::Corrected { index, .. } => Some(*index),
            _ => None,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WhitelistError {
    #[error("duplicated white list entry {0}")]
    DuplicateEntry(String),
}

/// An ordered list of allowed barcode values and a hash index over
/// them for the exact-match fast path.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<Vec<u8>>,
    index: HashMap<Vec<u8>, usize, ahash::RandomState>,
}

impl Whitelist {
    /// Build the whitelist; every entry must be distinct.
    pub fn new(values: Vec<String>) -> Result<Self, WhitelistError> {
        let s = ahash::RandomState::with_seeds(2u64, 7u64, 1u64, 8u64);
        let mut index = HashMap::with_capacity_and_hasher(values.len(), s);
        let mut entries = Vec::with_capacity(values.len());
        for (i, v) in values.into_iter().enumerate() {
            let bytes = v.into_bytes();
            if index.insert(bytes.clone(), i).is_some() {
                return Err(WhitelistError::DuplicateEntry(
                    String::from_utf8_lossy(&bytes).into_owned(),
                ));
            }
            entries.push(bytes);
        }
        Ok(Whitelist { entries, index })
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline(always)]
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        self.entries.get(i).map(|v| v.as_slice())
    }

    pub fn resolve(&self, query: &[u8], max_distance: u8, metric: DistanceMetric) -> Match {
        if self.entries.is_empty() {
            return Match::Unrestricted;
        }
        if let Some(&i) = self.index.get(query) {
            return Match::Exact(i);
        }
        if max_distance == 0 {
            return Match::NoMatch;
        }
        let k = max_distance as usize;
        match metric {
            DistanceMetric::Levenshtein => self.closest(query, k, bounded_levenshtein),
            DistanceMetric::Hamming => self.closest(query, k, bounded_hamming),
            DistanceMetric::Mixed => match self.closest(query, k, bounded_hamming) {
                m @ Match::Corrected { .. } => m,
                _ => self.closest(query, k, bounded_levenshtein),
            },
        }
    }

    /// Scan every entry of the query's length and return the unique entry
    /// at the minimal distance (<= k). Ties at the minimum are ambiguous and
    /// give `NoMatch`.
    fn closest<F>(&self, query: &[u8], k: usize, dist: F) -> Match
    where
        F: Fn(&[u8], &[u8], usize) -> Option<usize>,
    {
        let mut best = usize::MAX;
        let mut best_idx = 0usize;
        let mut n_best = 0usize;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.len() != query.len() {
                continue;
            }
            // nothing farther than the current best can matter
            let limit = k.min(best);
            if let Some(d) = dist(entry, query, limit) {
                if d < best {
                    best = d;
                    best_idx = i;
                    n_best = 1;
                } else if d == best {
                    n_best += 1;
                }
            }
        }
        if n_best == 1 {
            Match::Corrected {
                index: best_idx,
                distance: best,
            }
        } else {
            Match::NoMatch
        }
    }
}

/// Levenshtein distance between `a` and `b`.
pub fn levenshtein(a: &[u8], b: &[u8]) -> usize {
    bounded_levenshtein(a, b, usize::MAX).unwrap_or(usize::MAX)
}

/// Levenshtein distance between `a` and `b` if it is at most `k`,
/// otherwise `None`. Gives up as soon as an entire row of the
/// table exceeds `k`, since row minima never decrease.
pub fn bounded_levenshtein(a: &[u8], b: &[u8], k: usize) -> Option<usize> {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
            row_min = row_min.min(curr[j + 1]);
        }
        if row_min > k {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let d = prev[b.len()];
    (d <= k).then_some(d)
}

/// Number of mismatching positions between two equal length
/// sequences if it is at most `k`, otherwise `None`.
pub fn bounded_hamming(a: &[u8], b: &[u8], k: usize) -> Option<usize> {
    if a.len() != b.len() {
        return None;
    }
    let mut d = 0usize;
    for (x, y) in a.iter().zip(b.iter()) {
        if x != y {
            d += 1;
            if d > k {
                return None;
            }
        }
    }
    Some(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wl(v: &[&str]) -> Whitelist {
        Whitelist::new(v.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein(b"AAAA", b"AAAA"), 0);
        assert_eq!(levenshtein(b"AAAA", b"AAAT"), 1);
        assert_eq!(levenshtein(b"AACC", b"AAAA"), 2);
        // a shift costs one deletion and one insertion, not four substitutions
        assert_eq!(levenshtein(b"ACGTACGT", b"CGTACGTA"), 2);
        assert_eq!(levenshtein(b"", b"ACG"), 3);
        assert_eq!(levenshtein(b"kitten", b"sitting"), 3);
    }

    #[test]
    fn test_bounded_levenshtein() {
        assert_eq!(bounded_levenshtein(b"AAAA", b"AAAT", 1), Some(1));
        assert_eq!(bounded_levenshtein(b"AAAA", b"AACC", 1), None);
        assert_eq!(bounded_levenshtein(b"ACGTACGT", b"CGTACGTA", 2), Some(2));
        assert_eq!(bounded_levenshtein(b"ACGTACGT", b"TTTTTTTT", 3), None);
    }

    #[test]
    fn test_bounded_hamming() {
        assert_eq!(bounded_hamming(b"ACGTACGT", b"CGTACGTA", 3), None);
        assert_eq!(bounded_hamming(b"AAAA", b"AATA", 1), Some(1));
        assert_eq!(bounded_hamming(b"AAAA", b"AAA", 3), None);
    }

    #[test]
    fn test_empty_whitelist_is_unrestricted() {
        let w = Whitelist::default();
        assert_eq!(
            w.resolve(b"ANYTHING", 0, DistanceMetric::Levenshtein),
            Match::Unrestricted
        );
        assert!(Match::Unrestricted.is_accepted());
        assert!(!Match::Unrestricted.is_exact());
    }

    #[test]
    fn test_exact_match_ignores_distance() {
        let w = wl(&["AAAA", "CCCC", "GGGG"]);
        for d in 0..=2 {
            for metric in [
                DistanceMetric::Levenshtein,
                DistanceMetric::Hamming,
                DistanceMetric::Mixed,
            ] {
                assert_eq!(w.resolve(b"CCCC", d, metric), Match::Exact(1));
            }
        }
    }

    #[test]
    fn test_unique_correction() {
        let w = wl(&["AAAA", "CCCC"]);
        let m = w.resolve(b"AAAT", 1, DistanceMetric::Levenshtein);
        assert_eq!(
            m,
            Match::Corrected {
                index: 0,
                distance: 1
            }
        );
        assert_eq!(w.get(m.index().unwrap()), Some(&b"AAAA"[..]));
    }

    #[test]
    fn test_no_correction_without_distance() {
        let w = wl(&["AAAA", "CCCC"]);
        assert_eq!(
            w.resolve(b"AAAT", 0, DistanceMetric::Levenshtein),
            Match::NoMatch
        );
    }

    #[test]
    fn test_beyond_distance_is_no_match() {
        let w = wl(&["AAAA", "CCCC"]);
        assert_eq!(
            w.resolve(b"AACC", 1, DistanceMetric::Levenshtein),
            Match::NoMatch
        );
    }

    #[test]
    fn test_ties_are_ambiguous() {
        // AACC is distance 2 from both entries
        let w = wl(&["AAAA", "CCCC"]);
        assert_eq!(
            w.resolve(b"AACC", 2, DistanceMetric::Levenshtein),
            Match::NoMatch
        );
        // ACGA is distance 1 from both ACGT and ACGC
        let w = wl(&["ACGT", "ACGC", "TTTT"]);
        assert_eq!(
            w.resolve(b"ACGA", 1, DistanceMetric::Levenshtein),
            Match::NoMatch
        );
    }

    #[test]
    fn test_closer_entry_wins_over_farther_tie() {
        // one entry at distance 1, two at distance 2: the closest is unique
        let w = wl(&["AAAAAA", "AAACCC", "AACCAA"]);
        let m = w.resolve(b"AAAAAC", 2, DistanceMetric::Levenshtein);
        assert_eq!(
            m,
            Match::Corrected {
                index: 0,
                distance: 1
            }
        );
    }

    #[test]
    fn test_shift_needs_edit_distance() {
        let w = wl(&["ACGTACGT", "TTTTTTTT"]);
        let query = b"CGTACGTA";
        assert_eq!(w.resolve(query, 2, DistanceMetric::Hamming), Match::NoMatch);
        assert_eq!(
            w.resolve(query, 2, DistanceMetric::Levenshtein),
            Match::Corrected {
                index: 0,
                distance: 2
            }
        );
        assert_eq!(
            w.resolve(query, 2, DistanceMetric::Mixed),
            Match::Corrected {
                index: 0,
                distance: 2
            }
        );
    }

    #[test]
    fn test_mixed_falls_back_after_ambiguous_hamming() {
        // both entries are 3 mismatches away, but the first is only
        // a deletion plus an insertion away
        let w = wl(&["ATCGGG", "CATAAA"]);
        let query = b"CATGGG";
        assert_eq!(bounded_hamming(b"ATCGGG", query, 3), Some(3));
        assert_eq!(bounded_hamming(b"CATAAA", query, 3), Some(3));
        assert_eq!(w.resolve(query, 3, DistanceMetric::Hamming), Match::NoMatch);
        assert_eq!(
            w.resolve(query, 3, DistanceMetric::Mixed),
            Match::Corrected {
                index: 0,
                distance: 2
            }
        );

        let w = wl(&["AATTT", "TTTAA"]);
        let query = b"ATTTA";
        // Hamming distance 2 to both entries: ambiguous
        assert_eq!(w.resolve(query, 2, DistanceMetric::Hamming), Match::NoMatch);
        // still ambiguous under edit distance (1 indel-pair each), so no match
        assert_eq!(w.resolve(query, 2, DistanceMetric::Mixed), Match::NoMatch);
    }

    #[test]
    fn test_duplicate_entries_rejected() {
        let r = Whitelist::new(vec!["AAAA".into(), "CCCC".into(), "AAAA".into()]);
        assert_eq!(
            r.unwrap_err(),
            WhitelistError::DuplicateEntry("AAAA".to_string())
        );
    }
}
