/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

pub mod cmd_parse_utils;
pub mod config;
pub mod diagnostics;
pub mod extract;
pub mod io_utils;
pub mod parse_barcodes;
pub mod pipeline;
pub mod pool;
pub mod prog_opts;
pub mod record;
pub mod region;
pub mod sink;
pub mod transform;
pub mod whitelist;
