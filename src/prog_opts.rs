/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

use crate::pipeline::{DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY_FACTOR};
use crate::whitelist::DistanceMetric;
use slog;
use std::path::PathBuf;
use typed_builder::TypedBuilder;

#[derive(TypedBuilder, Debug)]
pub struct ParseBarcodeOpts<'a, 'b, 'c> {
    /// read 1 input; standard input when absent
    #[builder(default)]
    pub input_1: Option<PathBuf>,
    #[builder(default)]
    pub input_2: Option<PathBuf>,
    pub config: PathBuf,
    pub report: PathBuf,
    /// payload output; standard output when absent
    #[builder(default)]
    pub out_1: Option<PathBuf>,
    #[builder(default)]
    pub out_2: Option<PathBuf>,
    /// cell barcode frequency table
    #[builder(default)]
    pub cbdis: Option<PathBuf>,
    pub num_threads: u32,
    #[builder(default = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
    #[builder(default = DEFAULT_CONCURRENCY_FACTOR)]
    pub concurrency_factor: usize,
    #[builder(default)]
    pub run_id: Option<String>,
    #[builder(default)]
    pub distance_metric: DistanceMetric,
    #[builder(default = false)]
    pub check_names: bool,
    #[builder(default = false)]
    pub quiet: bool,
    pub cmdline: &'a str,
    pub version: &'b str,
    pub log: &'c slog::Logger,
}
