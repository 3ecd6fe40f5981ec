/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

/// A sequence and its (optional) quality string. The quality is absent
/// for FASTA input, in which case the record is written back out as FASTA.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeqQual {
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

impl SeqQual {
    pub fn new(seq: &[u8], qual: Option<&[u8]>) -> Self {
        SeqQual {
            seq: seq.to_vec(),
            qual: qual.map(|q| q.to_vec()),
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// The terminal classification of a record once it has been through
/// the transformer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Disposition {
    #[default]
    Unprocessed,
    Accepted,
    SampleRejected,
    BarcodeRejected,
    TooShort,
}

/// Bases and quality >= 30 bases seen for one tag category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagStats {
    pub bases: u64,
    pub q30_bases: u64,
}

impl TagStats {
    #[inline(always)]
    pub fn add(&mut self, bases: usize, q30_bases: usize) {
        self.bases += bases as u64;
        self.q30_bases += q30_bases as u64;
    }

    #[inline(always)]
    pub fn merge(&mut self, other: &TagStats) {
        self.bases += other.bases;
        self.q30_bases += other.q30_bases;
    }
}

/// What the transformer learned about one record; folded into the
/// run statistics by the sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordMetrics {
    pub cell_barcode: TagStats,
    pub sample_barcode: TagStats,
    pub umi: TagStats,
    pub reads: TagStats,
    pub cell_barcode_exact: bool,
    /// the resolved (and possibly run-suffixed) cell barcode, if the
    /// layout has any cell barcode region
    pub barcode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub name: Vec<u8>,
    pub r1: SeqQual,
    pub r2: Option<SeqQual>,
    pub disposition: Disposition,
    pub metrics: RecordMetrics,
}

impl Record {
    pub fn single(name: &[u8], seq: &[u8], qual: Option<&[u8]>) -> Self {
        Record {
            name: name.to_vec(),
            r1: SeqQual::new(seq, qual),
            ..Default::default()
        }
    }

    pub fn paired(
        name: &[u8],
        seq1: &[u8],
        qual1: Option<&[u8]>,
        seq2: &[u8],
        qual2: Option<&[u8]>,
    ) -> Self {
        Record {
            name: name.to_vec(),
            r1: SeqQual::new(seq1, qual1),
            r2: Some(SeqQual::new(seq2, qual2)),
            ..Default::default()
        }
    }

    #[inline(always)]
    pub fn is_accepted(&self) -> bool {
        self.disposition == Disposition::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_stats() {
        let mut a = TagStats::default();
        a.add(4, 3);
        let mut b = TagStats::default();
        b.add(8, 1);
        b.merge(&a);
        assert_eq!(
            b,
            TagStats {
                bases: 12,
                q30_bases: 4
            }
        );
    }

    #[test]
    fn test_constructors() {
        let r = Record::paired(b"r0", b"ACGT", Some(b"IIII"), b"TT", None);
        assert_eq!(r.disposition, Disposition::Unprocessed);
        assert!(!r.is_accepted());
        assert_eq!(r.r1.len(), 4);
        assert_eq!(r.r2.as_ref().map(|m| m.len()), Some(2));
        assert!(Record::single(b"r1", b"A", None).r2.is_none());
    }
}
