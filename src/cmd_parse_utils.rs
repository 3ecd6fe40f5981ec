/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

use crate::whitelist::DistanceMetric;
use clap;
use std::path::{Path, PathBuf};

impl clap::ValueEnum for DistanceMetric {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Levenshtein, Self::Hamming, Self::Mixed]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Levenshtein => Some(clap::builder::PossibleValue::new("levenshtein")),
            Self::Hamming => Some(clap::builder::PossibleValue::new("hamming")),
            Self::Mixed => Some(clap::builder::PossibleValue::new("mixed")),
        }
    }
}

/// Checks if the path pointed to by v exists.  It can be
/// any valid entity (e.g. disk file, FIFO, directory, etc.).
/// `-` (standard input) is always accepted.
pub fn pathbuf_file_exists_validator(v: &str) -> Result<PathBuf, String> {
    // NOTE: we explicitly *do not* check `is_file()` here
    // since we want to return true even if the path is to
    // a FIFO/named pipe (e.g. process substitution).
    if v != "-" && !Path::new(v).exists() {
        Err(String::from("No valid file was found at this path."))
    } else {
        Ok(PathBuf::from(v))
    }
}

/// Parses a strictly positive integer.
pub fn positive_usize_validator(v: &str) -> Result<usize, String> {
    match v.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(String::from("The value must be greater than 0.")),
        Err(e) => Err(format!("Not a valid positive integer: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn test_validators() {
        assert!(pathbuf_file_exists_validator("-").is_ok());
        assert!(pathbuf_file_exists_validator("/definitely/not/a/real/path.fq").is_err());
        assert_eq!(positive_usize_validator("12"), Ok(12));
        assert!(positive_usize_validator("0").is_err());
        assert!(positive_usize_validator("-3").is_err());
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(
            DistanceMetric::from_str("hamming", false),
            Ok(DistanceMetric::Hamming)
        );
        for m in DistanceMetric::value_variants() {
            let pv = m.to_possible_value().unwrap();
            assert_eq!(pv.get_name(), m.to_string());
        }
    }
}
