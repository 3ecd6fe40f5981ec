/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

use crate::pipeline::{Chunk, ChunkSink};
use crate::record::{Disposition, Record, SeqQual, TagStats};
use anyhow::Context;
use itertools::Itertools;
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;

/// Counters for the whole run. Only the sink ever touches these.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub fragments: u64,
    pub passed: u64,
    pub exact_barcodes: u64,
    pub failed_barcodes: u64,
    // nothing filters on quality yet; kept so the report layout is stable
    pub low_quality: u64,
    pub unknown_sample: u64,
    pub too_short: u64,
    pub cell_barcode: TagStats,
    pub sample_barcode: TagStats,
    pub umi: TagStats,
    pub reads: TagStats,
}

/// `q30` as a percentage of `bases`, formatted like `97.3%`; 0% if
/// no bases were seen.
pub fn q30_percent(ts: &TagStats) -> String {
    let pct = if ts.bases == 0 {
        0.0
    } else {
        ts.q30_bases as f64 / ts.bases as f64 * 100.0
    };
    format!("{:.1}%", pct)
}

impl RunStats {
    pub fn record(&mut self, rec: &Record) {
        self.fragments += 1;
        match rec.disposition {
            Disposition::Accepted => {
                self.passed += 1;
                let m = &rec.metrics;
                if m.cell_barcode_exact {
                    self.exact_barcodes += 1;
                }
                self.cell_barcode.merge(&m.cell_barcode);
                self.sample_barcode.merge(&m.sample_barcode);
                self.umi.merge(&m.umi);
                self.reads.merge(&m.reads);
            }
            Disposition::BarcodeRejected => self.failed_barcodes += 1,
            Disposition::SampleRejected => self.unknown_sample += 1,
            Disposition::TooShort => self.too_short += 1,
            // the transformer always assigns a terminal disposition
            Disposition::Unprocessed => {}
        }
    }

    pub fn to_json(&self, cmdline: &str, version: &str) -> serde_json::Value {
        json!({
            "Number of Fragments" : self.fragments,
            "Fragments Passed" : self.passed,
            "Fragments with Exactly Matched Barcodes" : self.exact_barcodes,
            "Fragments with Failed Barcodes" : self.failed_barcodes,
            "Fragments Filtered on Low Quality" : self.low_quality,
            "Fragments Filtered on Unknown Sample Barcodes" : self.unknown_sample,
            "Fragments Filtered on Short Reads" : self.too_short,
            "Q30 bases in Cell Barcode" : q30_percent(&self.cell_barcode),
            "Q30 bases in Sample Barcode" : q30_percent(&self.sample_barcode),
            "Q30 bases in UMI" : q30_percent(&self.umi),
            "Q30 bases in Reads" : q30_percent(&self.reads),
            "cmd" : cmdline,
            "version_str" : version
        })
    }

    pub fn write_report<W: Write>(
        &self,
        mut w: W,
        cmdline: &str,
        version: &str,
    ) -> anyhow::Result<()> {
        let meta_info = self.to_json(cmdline, version);
        let meta_info_string =
            serde_json::to_string_pretty(&meta_info).context("could not format json.")?;
        w.write_all(meta_info_string.as_bytes())
            .context("cannot write the report")?;
        w.flush().context("cannot write the report")?;
        Ok(())
    }
}

/// How often each resolved cell barcode was seen.
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    counts: HashMap<String, u64, ahash::RandomState>,
}

impl Default for FrequencyTable {
    fn default() -> Self {
        let s = ahash::RandomState::with_seeds(2u64, 7u64, 1u64, 8u64);
        FrequencyTable {
            counts: HashMap::with_hasher(s),
        }
    }
}

impl FrequencyTable {
    pub fn increment(&mut self, barcode: &str) {
        match self.counts.get_mut(barcode) {
            Some(c) => *c += 1,
            None => {
                self.counts.insert(barcode.to_string(), 1);
            }
        }
    }

    pub fn get(&self, barcode: &str) -> u64 {
        self.counts.get(barcode).copied().unwrap_or(0)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// All entries, most frequent first; equal counts are ordered by barcode.
    pub fn sorted(&self) -> Vec<(&str, u64)> {
        self.counts
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
            .collect()
    }

    /// Write `barcode\tcount` lines in `sorted()` order.
    pub fn write_tsv<W: Write>(&self, w: W) -> anyhow::Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .from_writer(w);
        for (bc, count) in self.sorted() {
            wtr.write_record([bc, count.to_string().as_str()])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// FASTQ if there is a quality string, FASTA otherwise.
pub fn write_fastx<W: Write + ?Sized>(w: &mut W, name: &[u8], sq: &SeqQual) -> std::io::Result<()> {
    match &sq.qual {
        Some(q) => {
            w.write_all(b"@")?;
            w.write_all(name)?;
            w.write_all(b"\n")?;
            w.write_all(&sq.seq)?;
            w.write_all(b"\n+\n")?;
            w.write_all(q)?;
            w.write_all(b"\n")
        }
        None => {
            w.write_all(b">")?;
            w.write_all(name)?;
            w.write_all(b"\n")?;
            w.write_all(&sq.seq)?;
            w.write_all(b"\n")
        }
    }
}

/// The single consumer of processed chunks: writes the accepted records,
/// and keeps the run counters and the barcode frequency table. When no
/// second output is given, mate 2 goes to the first one.
pub struct Sink<W: Write> {
    out1: W,
    out2: Option<W>,
    stats: RunStats,
    freq: FrequencyTable,
}

impl<W: Write> Sink<W> {
    pub fn new(out1: W, out2: Option<W>) -> Self {
        Sink {
            out1,
            out2,
            stats: RunStats::default(),
            freq: FrequencyTable::default(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn frequencies(&self) -> &FrequencyTable {
        &self.freq
    }

    pub fn consume_record(&mut self, rec: &Record) -> anyhow::Result<()> {
        self.stats.record(rec);
        if !rec.is_accepted() {
            return Ok(());
        }
        write_fastx(&mut self.out1, &rec.name, &rec.r1)?;
        if let Some(r2) = rec.r2.as_ref().filter(|m| !m.is_empty()) {
            let w = self.out2.as_mut().unwrap_or(&mut self.out1);
            write_fastx(w, &rec.name, r2)?;
        }
        if let Some(bc) = &rec.metrics.barcode {
            self.freq.increment(bc);
        }
        Ok(())
    }

    /// Flush the outputs and hand back the counters and the frequency table.
    pub fn finish(mut self) -> anyhow::Result<(RunStats, FrequencyTable)> {
        self.out1.flush().context("could not flush the first output")?;
        if let Some(w) = self.out2.as_mut() {
            w.flush().context("could not flush the second output")?;
        }
        Ok((self.stats, self.freq))
    }
}

impl<W: Write> ChunkSink for Sink<W> {
    fn consume(&mut self, chunk: Chunk) -> anyhow::Result<()> {
        for rec in chunk.records.iter() {
            self.consume_record(rec)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordMetrics;

    fn accepted(name: &str, barcode: Option<&str>, exact: bool) -> Record {
        let mut r = Record::single(name.as_bytes(), b"ACGT", Some(b"I#I#"));
        r.disposition = Disposition::Accepted;
        r.metrics = RecordMetrics {
            cell_barcode_exact: exact,
            barcode: barcode.map(String::from),
            ..Default::default()
        };
        r.metrics.reads.add(4, 2);
        r
    }

    #[test]
    fn test_frequency_table_sorted() {
        let mut ft = FrequencyTable::default();
        for bc in ["CCCC", "AAAA", "AAAA", "GGGG", "AAAA"] {
            ft.increment(bc);
        }
        assert_eq!(
            ft.sorted(),
            vec![("AAAA", 3), ("CCCC", 1), ("GGGG", 1)]
        );
        assert_eq!(ft.total(), 5);

        let mut out = Vec::new();
        ft.write_tsv(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "AAAA\t3\nCCCC\t1\nGGGG\t1\n"
        );
    }

    #[test]
    fn test_sink_counts_and_frequencies() {
        let mut sink = Sink::new(Vec::new(), None);
        let mut recs = vec![
            accepted("a", Some("AAAA"), true),
            accepted("b", Some("AAAA"), false),
            accepted("c", Some("CCCC"), true),
            accepted("d", Some("AAAA"), true),
        ];
        let mut rej = Record::single(b"e", b"ACGT", None);
        rej.disposition = Disposition::BarcodeRejected;
        recs.push(rej);
        let mut rej = Record::single(b"f", b"ACGT", None);
        rej.disposition = Disposition::SampleRejected;
        recs.push(rej);
        let mut rej = Record::single(b"g", b"AC", None);
        rej.disposition = Disposition::TooShort;
        recs.push(rej);

        sink.consume(Chunk {
            seq: 0,
            records: recs,
        })
        .unwrap();

        let (stats, freq) = sink.finish().unwrap();
        assert_eq!(stats.fragments, 7);
        assert_eq!(stats.passed, 4);
        assert_eq!(stats.exact_barcodes, 3);
        assert_eq!(stats.failed_barcodes, 1);
        assert_eq!(stats.unknown_sample, 1);
        assert_eq!(stats.too_short, 1);
        assert_eq!(
            stats.passed + stats.failed_barcodes + stats.unknown_sample + stats.too_short,
            stats.fragments
        );
        assert_eq!(freq.sorted(), vec![("AAAA", 3), ("CCCC", 1)]);
        assert_eq!(freq.total(), stats.passed);
    }

    #[test]
    fn test_fastx_output() {
        let mut sink = Sink::new(Vec::new(), Some(Vec::new()));
        let mut r = Record::paired(b"p|||CB|||AAAA", b"ACGT", Some(b"IIII"), b"GG", Some(b"##"));
        r.disposition = Disposition::Accepted;
        sink.consume_record(&r).unwrap();
        let mut r = Record::single(b"q", b"TTTT", None);
        r.disposition = Disposition::Accepted;
        sink.consume_record(&r).unwrap();
        let mut r = Record::single(b"x", b"TTTT", None);
        r.disposition = Disposition::BarcodeRejected;
        sink.consume_record(&r).unwrap();

        let Sink { out1, out2, .. } = sink;
        assert_eq!(
            String::from_utf8(out1).unwrap(),
            "@p|||CB|||AAAA\nACGT\n+\nIIII\n>q\nTTTT\n"
        );
        assert_eq!(
            String::from_utf8(out2.unwrap()).unwrap(),
            "@p|||CB|||AAAA\nGG\n+\n##\n"
        );
    }

    #[test]
    fn test_mate_two_interleaved_without_second_output() {
        let mut sink = Sink::new(Vec::new(), None);
        let mut r = Record::paired(b"p", b"AC", None, b"GT", None);
        r.disposition = Disposition::Accepted;
        sink.consume_record(&r).unwrap();
        // an empty mate 2 is skipped
        let mut r = Record::paired(b"q", b"AC", None, b"", None);
        r.disposition = Disposition::Accepted;
        sink.consume_record(&r).unwrap();
        assert_eq!(
            String::from_utf8(sink.out1).unwrap(),
            ">p\nAC\n>p\nGT\n>q\nAC\n"
        );
    }

    #[test]
    fn test_report() {
        let mut stats = RunStats::default();
        assert_eq!(q30_percent(&stats.reads), "0.0%");
        stats.record(&accepted("a", None, false));
        stats.record(&accepted("b", None, false));
        stats.record(&accepted("c", None, false));
        stats.reads.add(0, 1);
        let j = stats.to_json("fastq-parse-barcode -t 2", "0.3.0");
        assert_eq!(j["Number of Fragments"], 3);
        // counts are JSON numbers, percentages are strings
        assert!(j["Number of Fragments"].is_u64());
        assert_eq!(j["Fragments with Exactly Matched Barcodes"], 0);
        assert_eq!(j["Fragments Filtered on Low Quality"], 0);
        // 7 of 12
        assert_eq!(j["Q30 bases in Reads"], "58.3%");
        assert_eq!(j["Q30 bases in UMI"], "0.0%");
        assert_eq!(j["version_str"], "0.3.0");

        let mut buf = Vec::new();
        stats.write_report(&mut buf, "cmd", "0.3.0").unwrap();
        let back: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(back, stats.to_json("cmd", "0.3.0"));
    }
}
