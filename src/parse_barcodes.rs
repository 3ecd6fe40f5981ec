/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

use crate::config::LayoutConfig;
use crate::diagnostics;
use crate::io_utils::{create_writer, FastqSource};
use crate::pipeline::{run_pipeline, PipelineConfig};
use crate::prog_opts::ParseBarcodeOpts;
use crate::region::{Mate, RegionLayout};
use crate::sink::{RunStats, Sink};
use crate::transform::RecordTransformer;
use anyhow::Context;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use num_format::{Locale, ToFormattedString};
use slog::{info, warn};
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::time::Duration;

/// Tag every fragment in the input with its sample barcode, cell barcode
/// and UMI, write out the payload reads and the run report.
pub fn parse_barcodes(opts: ParseBarcodeOpts) -> anyhow::Result<RunStats> {
    let log = opts.log;

    // read and check the layout before touching any input or output, so
    // that a bad configuration never leaves partial files behind.
    let cfg = LayoutConfig::from_path(&opts.config)?;
    let layout = RegionLayout::from_config(cfg, opts.distance_metric)
        .with_context(|| format!("invalid layout in {}", opts.config.display()))?;

    let has_whitelist = layout
        .cell_barcodes
        .iter()
        .any(|r| !r.whitelist.is_empty());
    info!(
        log,
        "layout {} ({}): {} cell barcode region(s), {} sample barcode region(s), UMI {}, read 1 {}{}",
        layout.platform.as_deref().unwrap_or("unnamed"),
        layout.version.as_deref().unwrap_or("no version"),
        layout.cell_barcodes.len(),
        layout.sample_barcodes.len(),
        layout
            .umi
            .as_ref()
            .map_or("absent".to_string(), |r| r.location.to_string()),
        layout.read_1.location,
        layout
            .read_2
            .as_ref()
            .map_or(String::new(), |r| format!(", read 2 {}", r.location))
    );

    if layout.uses_mate_two() && opts.input_2.is_none() {
        warn!(
            log,
            "the layout refers to read 2 but only one input was given; every fragment will be rejected"
        );
    }
    if opts.input_2.is_some()
        && layout.read_1.location.mate == Mate::One
        && layout.read_2.is_none()
    {
        info!(log, "no \"read 2\" location is configured; read 2 payload will be dropped");
    }

    // the report and frequency table are only written at the end, but a
    // path that cannot be created must stop the run before any output
    let report_file = File::create(&opts.report)
        .with_context(|| format!("could not create report file {}", opts.report.display()))?;
    let cbdis_file = match &opts.cbdis {
        Some(p) => Some((
            File::create(p).with_context(|| {
                format!("could not create barcode frequency file {}", p.display())
            })?,
            p,
        )),
        None => None,
    };

    let mut source = FastqSource::open(
        opts.input_1.as_deref(),
        opts.input_2.as_deref(),
        opts.check_names,
    )?;

    let out1 = create_writer(opts.out_1.as_deref())?;
    let out2 = match opts.out_2.as_deref() {
        Some(p) => Some(create_writer(Some(p))?),
        None => None,
    };
    let mut sink = Sink::new(out1, out2);

    let transformer = RecordTransformer::new(Arc::new(layout), opts.run_id.clone());
    let pcfg = PipelineConfig::builder()
        .workers(opts.num_threads as usize)
        .chunk_size(opts.chunk_size)
        .concurrency_factor(opts.concurrency_factor)
        .build();

    let pbar = ProgressBar::new_spinner();
    if opts.quiet {
        pbar.set_draw_target(ProgressDrawTarget::hidden());
    }
    pbar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} fragments processed {msg}")
            .context("could not set the progress bar style")?,
    );
    pbar.enable_steady_tick(Duration::from_millis(200));

    let summary = run_pipeline(&mut source, &transformer, &mut sink, &pcfg, &pbar, log)?;
    pbar.finish_with_message("done");

    let (stats, freq) = sink.finish()?;
    info!(
        log,
        "processed {} fragments in {} chunks (at most {} in flight)",
        summary.records.to_formatted_string(&Locale::en),
        summary.chunks.to_formatted_string(&Locale::en),
        summary.max_in_flight
    );

    if let Some((f, p)) = cbdis_file {
        freq.write_tsv(BufWriter::new(f))
            .with_context(|| format!("could not write {}", p.display()))?;
        info!(
            log,
            "wrote {} distinct cell barcodes to {}",
            freq.len().to_formatted_string(&Locale::en),
            p.display()
        );
    }

    stats
        .write_report(BufWriter::new(report_file), opts.cmdline, opts.version)
        .with_context(|| format!("could not write {}", opts.report.display()))?;

    info!(
        log,
        "{} of {} fragments passed ({} with exactly matched barcodes, {} failed barcodes, {} unknown sample barcodes, {} too short)",
        stats.passed.to_formatted_string(&Locale::en),
        stats.fragments.to_formatted_string(&Locale::en),
        stats.exact_barcodes.to_formatted_string(&Locale::en),
        stats.failed_barcodes.to_formatted_string(&Locale::en),
        stats.unknown_sample.to_formatted_string(&Locale::en),
        stats.too_short.to_formatted_string(&Locale::en)
    );
    diagnostics::check_run(&stats, has_whitelist, log);

    Ok(stats)
}
