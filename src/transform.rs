/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

use crate::extract::extract;
use crate::record::{Disposition, Record, RecordMetrics, SeqQual, TagStats};
use crate::region::{Region, RegionLayout};
use crate::whitelist::DistanceMetric;
use std::sync::Arc;

const TAG_SEP: &[u8] = b"|||";

/// The concatenated resolved value, raw sequence and raw quality of
/// all of the regions in one tag category.
#[derive(Default)]
struct TagValues {
    resolved: Vec<u8>,
    raw: Vec<u8>,
    raw_qual: Option<Vec<u8>>,
    stats: TagStats,
    all_exact: bool,
}

/// Extract and resolve each region of a barcode category, in
/// configuration order. `None` if any region is missing from the
/// record or has no acceptable whitelist match.
fn resolve_category(rec: &Record, regions: &[Region], metric: DistanceMetric) -> Option<TagValues> {
    let mut tv = TagValues {
        all_exact: !regions.is_empty(),
        raw_qual: Some(Vec::new()),
        ..Default::default()
    };
    for region in regions {
        let ex = extract(rec, &region.location).ok()?;
        let m = region.resolve(ex.seq, metric);
        if !m.is_accepted() {
            return None;
        }
        tv.all_exact &= m.is_exact();
        // a corrected (or exact) match is reported as the whitelist value
        let value = m
            .index()
            .and_then(|i| region.whitelist.get(i))
            .unwrap_or(ex.seq);
        tv.resolved.extend_from_slice(value);
        tv.raw.extend_from_slice(ex.seq);
        tv.raw_qual = match (tv.raw_qual.take(), ex.qual) {
            (Some(mut acc), Some(q)) => {
                acc.extend_from_slice(q);
                Some(acc)
            }
            _ => None,
        };
        tv.stats.add(ex.bases, ex.q30_bases);
    }
    Some(tv)
}

#[inline]
fn append_tag(name: &mut Vec<u8>, tag: &str, value: &[u8]) {
    name.extend_from_slice(TAG_SEP);
    name.extend_from_slice(tag.as_bytes());
    name.extend_from_slice(TAG_SEP);
    name.extend_from_slice(value);
}

/// Applies a `RegionLayout` to records. Cheap to clone; every worker
/// holds its own copy pointing at the same layout.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    layout: Arc<RegionLayout>,
    run_id: Option<String>,
}

impl RecordTransformer {
    pub fn new(layout: Arc<RegionLayout>, run_id: Option<String>) -> Self {
        RecordTransformer { layout, run_id }
    }

    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    pub fn transform_all(&self, recs: &mut [Record]) {
        for rec in recs.iter_mut() {
            self.transform(rec);
        }
    }

    /// Run one record through the sample, cell, UMI and payload stages.
    /// On acceptance the identifier carries the resolved tags and the
    /// mates hold only their payload; a rejected record is left as it
    /// was apart from its disposition.
    pub fn transform(&self, rec: &mut Record) -> Disposition {
        let disp = self.classify(rec);
        rec.disposition = disp;
        disp
    }

    fn classify(&self, rec: &mut Record) -> Disposition {
        let layout = &*self.layout;
        let tags = &layout.tags;

        let Some(sample) = resolve_category(rec, &layout.sample_barcodes, layout.metric) else {
            return Disposition::SampleRejected;
        };
        let Some(cell) = resolve_category(rec, &layout.cell_barcodes, layout.metric) else {
            return Disposition::BarcodeRejected;
        };

        let mut metrics = RecordMetrics {
            sample_barcode: sample.stats,
            cell_barcode: cell.stats,
            cell_barcode_exact: cell.all_exact,
            ..Default::default()
        };

        let umi = match &layout.umi {
            Some(region) => match extract(rec, &region.location) {
                Ok(ex) => {
                    metrics.umi.add(ex.bases, ex.q30_bases);
                    Some((ex.seq.to_vec(), ex.qual.map(|q| q.to_vec())))
                }
                Err(_) => return Disposition::TooShort,
            },
            None => None,
        };

        let mut payload = |region: &Region| -> Option<SeqQual> {
            let ex = extract(rec, &region.location).ok()?;
            metrics.reads.add(ex.bases, ex.q30_bases);
            Some(SeqQual::new(ex.seq, ex.qual))
        };
        let Some(out1) = payload(&layout.read_1) else {
            return Disposition::TooShort;
        };
        let out2 = match &layout.read_2 {
            Some(region) => match payload(region) {
                Some(sq) => Some(sq),
                None => return Disposition::TooShort,
            },
            None => None,
        };

        // everything resolved; rewrite the record in place
        if !layout.sample_barcodes.is_empty() {
            append_tag(&mut rec.name, &tags.sample_barcode, &sample.resolved);
            if let Some(t) = &tags.sample_barcode_raw {
                append_tag(&mut rec.name, t, &sample.raw);
            }
            if let (Some(t), Some(q)) = (&tags.sample_barcode_raw_qual, &sample.raw_qual) {
                append_tag(&mut rec.name, t, q);
            }
        }

        if !layout.cell_barcodes.is_empty() {
            let mut barcode = String::from_utf8_lossy(&cell.resolved).into_owned();
            if let Some(run) = &self.run_id {
                barcode.push('-');
                barcode.push_str(run);
            }
            append_tag(&mut rec.name, &tags.cell_barcode, barcode.as_bytes());
            if let Some(t) = &tags.cell_barcode_raw {
                append_tag(&mut rec.name, t, &cell.raw);
            }
            if let (Some(t), Some(q)) = (&tags.cell_barcode_raw_qual, &cell.raw_qual) {
                append_tag(&mut rec.name, t, q);
            }
            metrics.barcode = Some(barcode);
        }

        if let Some((seq, qual)) = umi {
            append_tag(&mut rec.name, &tags.umi, &seq);
            if let (Some(t), Some(q)) = (&tags.umi_qual, &qual) {
                append_tag(&mut rec.name, t, q);
            }
        }

        rec.r1 = out1;
        rec.r2 = out2;
        rec.metrics = metrics;
        Disposition::Accepted
    }
}
