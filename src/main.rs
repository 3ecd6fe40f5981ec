/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

use clap::{arg, crate_authors, crate_version, value_parser, Arg, ArgAction, Command};
use mimalloc::MiMalloc;
use slog::{crit, o, Drain};
use std::path::PathBuf;

use fastq_parse_barcode::cmd_parse_utils::{
    pathbuf_file_exists_validator, positive_usize_validator,
};
use fastq_parse_barcode::parse_barcodes::parse_barcodes;
use fastq_parse_barcode::prog_opts::ParseBarcodeOpts;
use fastq_parse_barcode::whitelist::DistanceMetric;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> anyhow::Result<()> {
    let num_hardware_threads = num_cpus::get() as u32;
    let max_num_threads: String = num_hardware_threads.to_string();

    let crate_authors = crate_authors!("\n");
    let version = crate_version!();
    let cmdline = std::env::args().collect::<Vec<String>>().join(" ");

    let opts = Command::new("fastq-parse-barcode")
        .about("Extract, correct and tag cell barcodes, sample barcodes and UMIs in single-cell reads")
        .version(version)
        .author(crate_authors)
        .arg(
            arg!([R1] "read 1 input (FASTQ/FASTA, optionally gzipped); standard input if absent or -")
                .value_parser(pathbuf_file_exists_validator),
        )
        .arg(arg!([R2] "read 2 input").value_parser(pathbuf_file_exists_validator))
        .arg(
            arg!(--config <CONFIG> "JSON file describing where the barcodes, UMI and reads are")
                .required(true)
                .value_parser(pathbuf_file_exists_validator),
        )
        .arg(
            arg!(--report <REPORT> "path of the JSON run report")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("out1")
                .short('1')
                .long("out1")
                .value_name("OUT1")
                .help("output for read 1 (and read 2 if -2 is not given); standard output if absent, gzipped if it ends in .gz")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("out2")
                .short('2')
                .long("out2")
                .value_name("OUT2")
                .help("output for read 2")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(--cbdis <CBDIS> "write the cell barcode frequency table (barcode<TAB>count) here")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-t --threads <THREADS> "number of worker threads")
                .value_parser(value_parser!(u32).range(1..))
                .default_value(max_num_threads),
        )
        .arg(
            arg!(-r --"chunk-size" <CHUNK> "number of fragments per work chunk")
                .value_parser(positive_usize_validator)
                .default_value("10000"),
        )
        .arg(arg!(--run <RUN_ID> "run identifier appended to every cell barcode as -RUN_ID; when omitted barcodes carry no suffix, which changes the barcode keys compared with releases that appended -1 by default (pass --run 1 to keep them)"))
        .arg(
            arg!(--"concurrency-factor" <N> "at most N x threads chunks are in flight at once")
                .value_parser(positive_usize_validator)
                .default_value("2"),
        )
        .arg(
            arg!(--"distance-metric" <METRIC> "how barcodes are compared to the white list")
                .value_parser(value_parser!(DistanceMetric))
                .default_value("levenshtein"),
        )
        .arg(
            arg!(--"check-names" "fail if the names of paired reads differ")
                .action(ArgAction::SetTrue),
        )
        .arg(arg!(-q --quiet "only log warnings and errors").action(ArgAction::SetTrue))
        .get_matches();

    let quiet = opts.get_flag("quiet");
    let min_level = if quiet {
        slog::Level::Warning
    } else {
        slog::Level::Info
    };

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator)
        .use_custom_timestamp(|out: &mut dyn std::io::Write| {
            write!(out, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))?;
            Ok(())
        })
        .build()
        .fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = drain.filter_level(min_level).fuse();

    let log = slog::Logger::root(drain, o!());

    let num_threads: u32 = *opts.get_one("threads").expect("threads has a default");
    if num_threads > num_hardware_threads {
        slog::warn!(
            log,
            "{} threads were requested but only {} are available",
            num_threads,
            num_hardware_threads
        );
    }

    let bc_opts = ParseBarcodeOpts::builder()
        .input_1(opts.get_one::<PathBuf>("R1").cloned())
        .input_2(opts.get_one::<PathBuf>("R2").cloned())
        .config(
            opts.get_one::<PathBuf>("config")
                .expect("config is required")
                .clone(),
        )
        .report(
            opts.get_one::<PathBuf>("report")
                .expect("report is required")
                .clone(),
        )
        .out_1(opts.get_one::<PathBuf>("out1").cloned())
        .out_2(opts.get_one::<PathBuf>("out2").cloned())
        .cbdis(opts.get_one::<PathBuf>("cbdis").cloned())
        .num_threads(num_threads)
        .chunk_size(*opts.get_one("chunk-size").expect("chunk-size has a default"))
        .concurrency_factor(
            *opts
                .get_one("concurrency-factor")
                .expect("concurrency-factor has a default"),
        )
        .run_id(opts.get_one::<String>("run").cloned())
        .distance_metric(
            *opts
                .get_one("distance-metric")
                .expect("distance-metric has a default"),
        )
        .check_names(opts.get_flag("check-names"))
        .quiet(quiet)
        .cmdline(&cmdline)
        .version(version)
        .log(&log)
        .build();

    if let Err(e) = parse_barcodes(bc_opts) {
        crit!(log, "{:#}", e);
        // let the async drain flush before exiting
        drop(log);
        std::process::exit(1);
    }
    Ok(())
}
