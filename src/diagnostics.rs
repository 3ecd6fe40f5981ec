/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

use crate::sink::RunStats;

/// The fraction of fragments whose cell barcode could not be matched to
/// the white list, if that fraction looks plausible (below `thresh`).
/// A large failure rate usually means the wrong white list or the wrong
/// barcode location was configured.
pub fn likely_valid_whitelist(
    num_failed: u64,
    total: u64,
    thresh: f64,
) -> anyhow::Result<f64> {
    if total > 0 {
        let failed_frac = (num_failed as f64) / (total as f64);
        if failed_frac < thresh {
            anyhow::Ok(failed_frac)
        } else {
            anyhow::bail!(
                "Percentage of fragments not matching a known cell barcode ({:.2}%) is > the suggested fraction ({:.2}%); check the white list and barcode location",
                failed_frac * 100.0f64,
                thresh * 100.0f64
            )
        }
    } else {
        anyhow::bail!("Cannot judge the white list if no fragments were processed")
    }
}

/// Post-run sanity checks on the statistics; problems are logged, never fatal.
pub fn check_run(stats: &RunStats, has_whitelist: bool, log: &slog::Logger) {
    if stats.fragments == 0 {
        slog::warn!(log, "no input fragments were read");
        return;
    }
    if has_whitelist {
        match likely_valid_whitelist(stats.failed_barcodes, stats.fragments, 0.5) {
            Ok(f) => slog::debug!(
                log,
                "{:.2}% of fragments failed cell barcode matching",
                f * 100.0
            ),
            Err(e) => slog::warn!(log, "{:#}", e),
        }
    }
    if stats.passed == 0 {
        slog::warn!(log, "no fragment passed; the output is empty");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_likely_valid_whitelist() {
        assert_eq!(likely_valid_whitelist(1, 4, 0.5).unwrap(), 0.25);
        assert!(likely_valid_whitelist(3, 4, 0.5).is_err());
        assert!(likely_valid_whitelist(0, 0, 0.5).is_err());
    }
}
