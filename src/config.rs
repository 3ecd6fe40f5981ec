/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

//! The on-disk layout document. This only mirrors the JSON; all of the
//! checking happens when it is turned into a `RegionLayout`.

use anyhow::Context;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// `distance` is written as a bare integer in newer layouts and as a
/// string in older ones.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum DistanceValue {
    Number(i64),
    Text(String),
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegionConfig {
    pub location: String,
    #[serde(default)]
    pub distance: Option<DistanceValue>,
    #[serde(rename = "white list", alias = "whitelist", default)]
    pub white_list: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct LocationConfig {
    pub location: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct LayoutConfig {
    pub platform: Option<String>,
    pub version: Option<String>,

    #[serde(rename = "cell barcode tag")]
    pub cell_barcode_tag: Option<String>,
    #[serde(rename = "cell barcode raw tag")]
    pub cell_barcode_raw_tag: Option<String>,
    #[serde(rename = "cell barcode raw qual tag")]
    pub cell_barcode_raw_qual_tag: Option<String>,
    #[serde(rename = "cell barcode", default)]
    pub cell_barcode: Vec<RegionConfig>,

    #[serde(rename = "sample barcode tag")]
    pub sample_barcode_tag: Option<String>,
    #[serde(rename = "sample barcode raw tag")]
    pub sample_barcode_raw_tag: Option<String>,
    #[serde(rename = "sample barcode raw qual tag")]
    pub sample_barcode_raw_qual_tag: Option<String>,
    #[serde(rename = "sample barcode", default)]
    pub sample_barcode: Vec<RegionConfig>,

    #[serde(rename = "UMI tag")]
    pub umi_tag: Option<String>,
    #[serde(rename = "UMI qual tag")]
    pub umi_qual_tag: Option<String>,
    #[serde(rename = "UMI")]
    pub umi: Option<LocationConfig>,

    #[serde(rename = "read 1")]
    pub read_1: Option<LocationConfig>,
    #[serde(rename = "read 2")]
    pub read_2: Option<LocationConfig>,
}

impl LayoutConfig {
    pub fn from_reader<R: Read>(rdr: R) -> anyhow::Result<Self> {
        let cfg: LayoutConfig =
            serde_json::from_reader(rdr).context("could not parse the layout configuration")?;
        Ok(cfg)
    }

    pub fn from_path<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let p = p.as_ref();
        let f = File::open(p)
            .with_context(|| format!("could not open the configuration file {}", p.display()))?;
        Self::from_reader(BufReader::new(f))
            .with_context(|| format!("while reading {}", p.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_document() {
        let doc = r#"{
            "platform": "DNBelab C4",
            "version": "v1",
            "cell barcode tag": "CB",
            "cell barcode raw tag": "CR",
            "cell barcode raw qual tag": "CY",
            "cell barcode": [
                {"location": "R1:1-10", "distance": 1, "white list": ["AAAAAAAAAA", "CCCCCCCCCC"]},
                {"location": "R1:11-20", "distance": "1", "whitelist": ["GGGGGGGGGG"]}
            ],
            "sample barcode tag": "SB",
            "sample barcode": [{"location": "R2:1-8"}],
            "UMI tag": "UR",
            "UMI qual tag": "UY",
            "UMI": {"location": "R1:21-30"},
            "read 1": {"location": "R2:1-100"}
        }"#;
        let cfg = LayoutConfig::from_reader(doc.as_bytes()).unwrap();
        assert_eq!(cfg.platform.as_deref(), Some("DNBelab C4"));
        assert_eq!(cfg.cell_barcode.len(), 2);
        assert_eq!(cfg.cell_barcode[0].distance, Some(DistanceValue::Number(1)));
        assert_eq!(
            cfg.cell_barcode[1].distance,
            Some(DistanceValue::Text("1".to_string()))
        );
        assert_eq!(cfg.cell_barcode[1].white_list, vec!["GGGGGGGGGG".to_string()]);
        assert!(cfg.sample_barcode[0].white_list.is_empty());
        assert_eq!(cfg.umi_qual_tag.as_deref(), Some("UY"));
        assert!(cfg.read_2.is_none());
    }

    #[test]
    fn test_unknown_key_is_fatal() {
        let doc = r#"{"read 1": {"location": "R1:1-4"}, "cell barcodes": []}"#;
        assert!(LayoutConfig::from_reader(doc.as_bytes()).is_err());
        let doc = r#"{"read 1": {"location": "R1:1-4", "distance": 1}}"#;
        assert!(LayoutConfig::from_reader(doc.as_bytes()).is_err());
    }
}
