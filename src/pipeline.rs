/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

use crate::pool::{OrderedPool, Submit};
use crate::record::Record;
use crate::transform::RecordTransformer;
use anyhow::Context;
use indicatif::ProgressBar;
use slog::{crit, debug};
use typed_builder::TypedBuilder;

pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
pub const DEFAULT_CONCURRENCY_FACTOR: usize = 2;

/// A batch of records, numbered in the order it was read.
#[derive(Debug, Default)]
pub struct Chunk {
    pub seq: u64,
    pub records: Vec<Record>,
}

/// Where records come from. `Ok(None)` means the input is exhausted.
pub trait RecordSource {
    fn next_record(&mut self) -> anyhow::Result<Option<Record>>;
}

impl RecordSource for std::vec::IntoIter<Record> {
    fn next_record(&mut self) -> anyhow::Result<Option<Record>> {
        Ok(self.next())
    }
}

/// Where processed chunks go, strictly in input order.
pub trait ChunkSink {
    fn consume(&mut self, chunk: Chunk) -> anyhow::Result<()>;
}

#[derive(TypedBuilder, Debug, Clone)]
pub struct PipelineConfig {
    #[builder(default = 1)]
    pub workers: usize,
    #[builder(default = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
    #[builder(default = DEFAULT_CONCURRENCY_FACTOR)]
    pub concurrency_factor: usize,
}

impl PipelineConfig {
    /// the largest number of chunks that may be in flight at once
    pub fn max_in_flight(&self) -> usize {
        (self.workers * self.concurrency_factor).max(1)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub chunks: u64,
    pub records: u64,
    pub max_in_flight: usize,
}

fn read_chunk<S: RecordSource + ?Sized>(
    src: &mut S,
    seq: u64,
    chunk_size: usize,
) -> anyhow::Result<Option<Chunk>> {
    let mut records = Vec::with_capacity(chunk_size);
    while records.len() < chunk_size {
        match src.next_record()? {
            Some(r) => records.push(r),
            None => break,
        }
    }
    if records.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Chunk { seq, records }))
    }
}

/// Read everything from `src`, transform it on `cfg.workers` threads and
/// hand the chunks to `sink` in the order they were read.
pub fn run_pipeline<S, K>(
    src: &mut S,
    transformer: &RecordTransformer,
    sink: &mut K,
    cfg: &PipelineConfig,
    pbar: &ProgressBar,
    log: &slog::Logger,
) -> anyhow::Result<PipelineSummary>
where
    S: RecordSource + ?Sized,
    K: ChunkSink + ?Sized,
{
    let chunk_size = cfg.chunk_size.max(1);
    let t = transformer.clone();
    let mut pool = OrderedPool::new(cfg.workers, cfg.max_in_flight(), move |c: &mut Chunk| {
        t.transform_all(&mut c.records)
    });

    debug!(
        log,
        "starting {} workers with at most {} chunks of {} records in flight",
        cfg.workers,
        pool.capacity(),
        chunk_size
    );

    let mut summary = PipelineSummary::default();
    let mut deliver = |chunk: Chunk, summary: &mut PipelineSummary| -> anyhow::Result<()> {
        let n = chunk.records.len() as u64;
        sink.consume(chunk)?;
        summary.chunks += 1;
        summary.records += n;
        pbar.inc(n);
        Ok(())
    };

    let mut next_seq = 0u64;
    while let Some(chunk) = read_chunk(src, next_seq, chunk_size)? {
        next_seq += 1;
        let mut pending = chunk;
        // keep offering the chunk; every time the pool is full, the
        // oldest chunk is waited for and written out, which frees a slot
        loop {
            match pool.try_submit(pending)? {
                Submit::Accepted => break,
                Submit::WouldBlock(c) => {
                    pending = c;
                    let done = pool
                        .next_result()?
                        .context("pool reported full with nothing in flight")?;
                    deliver(done, &mut summary)?;
                }
            }
        }
        // write out whatever is already finished, without waiting
        while let Some(done) = pool.try_next_result()? {
            deliver(done, &mut summary)?;
        }
    }

    // end of input; flush everything still in flight
    while let Some(done) = pool.next_result()? {
        deliver(done, &mut summary)?;
    }

    summary.max_in_flight = pool.max_in_flight();
    if let Err(e) = pool.join() {
        crit!(log, "{}", e);
        return Err(e.into());
    }
    Ok(summary)
}
