/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

//! reading the input reads and opening the output streams

use crate::pipeline::RecordSource;
use crate::record::Record;
use anyhow::Context;
use bstr::ByteSlice;
use flate2::write::GzEncoder;
use flate2::Compression;
use needletail::errors::{ParseError, ParseErrorKind};
use needletail::{parse_fastx_file, parse_fastx_reader, parse_fastx_stdin, FastxReader};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SourceError {
    #[error("read 2 input ended before read 1 (after {0} records)")]
    MissingMateTwo(u64),
    #[error("read 1 input ended before read 2 (after {0} records)")]
    MissingMateOne(u64),
    #[error("read names do not match at record {index}: {name1} vs. {name2}")]
    NameMismatch {
        index: u64,
        name1: String,
        name2: String,
    },
}

#[inline]
fn is_stdin(p: &Path) -> bool {
    p.as_os_str() == "-"
}

type Reader = Box<dyn FastxReader>;

/// needletail refuses an empty file outright; here that is just an
/// empty input.
fn empty_is_none(r: Result<Reader, ParseError>) -> anyhow::Result<Option<Reader>> {
    match r {
        Ok(rdr) => Ok(Some(rdr)),
        Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Open a (possibly compressed) FASTA/FASTQ file, or standard input
/// for `None` or `-`.
pub fn open_fastx(path: Option<&Path>) -> anyhow::Result<Option<Reader>> {
    match path {
        Some(p) if !is_stdin(p) => empty_is_none(parse_fastx_file(p))
            .with_context(|| format!("could not open input file {}", p.display())),
        _ => empty_is_none(parse_fastx_stdin()).context("could not read from standard input"),
    }
}

/// The record name is the identifier up to its first whitespace.
#[inline]
fn record_name(id: &[u8]) -> &[u8] {
    id.fields().next().unwrap_or(id)
}

/// `name/1` and `name/2` denote the same fragment
#[inline]
fn strip_mate_suffix(name: &[u8]) -> &[u8] {
    if name.ends_with(b"/1") || name.ends_with(b"/2") {
        &name[..name.len() - 2]
    } else {
        name
    }
}

/// Yields `Record`s from one (single end) or two (paired end) FASTX
/// streams, read in lock step.
pub struct FastqSource {
    r1: Option<Reader>,
    r2: Option<Reader>,
    paired: bool,
    check_names: bool,
    nread: u64,
}

impl FastqSource {
    pub fn new(r1: Option<Reader>, r2: Option<Reader>, paired: bool, check_names: bool) -> Self {
        FastqSource {
            r1,
            r2,
            paired,
            check_names,
            nread: 0,
        }
    }

    pub fn open(
        input_1: Option<&Path>,
        input_2: Option<&Path>,
        check_names: bool,
    ) -> anyhow::Result<Self> {
        let r1 = open_fastx(input_1)?;
        let (r2, paired) = match input_2 {
            Some(p) => (open_fastx(Some(p))?, true),
            None => (None, false),
        };
        Ok(Self::new(r1, r2, paired, check_names))
    }

    pub fn from_readers<R1, R2>(r1: R1, r2: Option<R2>, check_names: bool) -> anyhow::Result<Self>
    where
        R1: Read + Send + 'static,
        R2: Read + Send + 'static,
    {
        let paired = r2.is_some();
        let r1 = empty_is_none(parse_fastx_reader(r1))?;
        let r2 = match r2 {
            Some(r) => empty_is_none(parse_fastx_reader(r))?,
            None => None,
        };
        Ok(Self::new(r1, r2, paired, check_names))
    }

    /// the number of records yielded so far
    pub fn records_read(&self) -> u64 {
        self.nread
    }
}

impl RecordSource for FastqSource {
    fn next_record(&mut self) -> anyhow::Result<Option<Record>> {
        let rec1 = match self.r1.as_mut() {
            Some(r) => r.next(),
            None => None,
        };
        let rec2 = match self.r2.as_mut() {
            Some(r) => r.next(),
            None => None,
        };

        let rec = match (rec1, rec2) {
            (None, None) => return Ok(None),
            (Some(_), None) if self.paired => {
                return Err(SourceError::MissingMateTwo(self.nread).into())
            }
            (None, Some(_)) => return Err(SourceError::MissingMateOne(self.nread).into()),
            (Some(r1), None) => {
                let r1 = r1.context("malformed record in read 1 input")?;
                Record::single(record_name(r1.id()), &r1.seq(), r1.qual())
            }
            (Some(r1), Some(r2)) => {
                let r1 = r1.context("malformed record in read 1 input")?;
                let r2 = r2.context("malformed record in read 2 input")?;
                let n1 = record_name(r1.id());
                if self.check_names {
                    let n2 = record_name(r2.id());
                    if strip_mate_suffix(n1) != strip_mate_suffix(n2) {
                        return Err(SourceError::NameMismatch {
                            index: self.nread,
                            name1: n1.to_str_lossy().into_owned(),
                            name2: n2.to_str_lossy().into_owned(),
                        }
                        .into());
                    }
                }
                Record::paired(n1, &r1.seq(), r1.qual(), &r2.seq(), r2.qual())
            }
        };
        self.nread += 1;
        Ok(Some(rec))
    }
}

/// Open an output stream: standard output when no path (or `-`) is
/// given, gzip compressed when the path ends in `.gz`.
pub fn create_writer(path: Option<&Path>) -> anyhow::Result<Box<dyn Write + Send>> {
    let w: Box<dyn Write + Send> = match path {
        Some(p) if !is_stdin(p) => {
            let f = File::create(p)
                .with_context(|| format!("could not create output file {}", p.display()))?;
            let buffered = BufWriter::new(f);
            if p.extension().is_some_and(|e| e == "gz") {
                Box::new(GzEncoder::new(buffered, Compression::default()))
            } else {
                Box::new(buffered)
            }
        }
        _ => Box::new(BufWriter::new(io::stdout())),
    };
    Ok(w)
}
