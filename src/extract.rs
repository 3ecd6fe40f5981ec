/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

use crate::record::Record;
use crate::region::{Location, Mate};
use thiserror::Error;

pub const PHRED_OFFSET: u8 = 33;
pub const Q30_THRESHOLD: u8 = 30;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractError {
    #[error("region {0} refers to a mate that is absent from the record")]
    MissingMate(Location),
    #[error("region {location} runs past the end of a mate of length {len}")]
    TooShort { location: Location, len: usize },
}

/// A view of one region of a record.
#[derive(Debug, PartialEq, Eq)]
pub struct Extracted<'a> {
    pub seq: &'a [u8],
    pub qual: Option<&'a [u8]>,
    pub bases: usize,
    pub q30_bases: usize,
}

#[inline(always)]
pub fn count_q30(qual: &[u8]) -> usize {
    qual.iter()
        .filter(|&&q| q.saturating_sub(PHRED_OFFSET) >= Q30_THRESHOLD)
        .count()
}

/// Slice the sequence (and quality) covered by `loc` out of `rec`.
pub fn extract<'a>(rec: &'a Record, loc: &Location) -> Result<Extracted<'a>, ExtractError> {
    let mate = match loc.mate {
        Mate::One => &rec.r1,
        Mate::Two => rec.r2.as_ref().ok_or(ExtractError::MissingMate(*loc))?,
    };
    if mate.len() < loc.end {
        return Err(ExtractError::TooShort {
            location: *loc,
            len: mate.len(),
        });
    }
    let r = loc.range();
    let seq = &mate.seq[r.clone()];
    let qual = mate.qual.as_ref().and_then(|q| q.get(r));
    Ok(Extracted {
        seq,
        qual,
        bases: seq.len(),
        q30_bases: qual.map_or(0, count_q30),
    })
}
