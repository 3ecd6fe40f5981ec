/*
 * Copyright (c) 2020-2024 COMBINE-lab.
 *
 * This file is part of fastq-parse-barcode.
 *
 * License: 3-clause BSD, see https://opensource.org/licenses/BSD-3-Clause
 */

use crate::config::{DistanceValue, LayoutConfig, LocationConfig, RegionConfig};
use crate::whitelist::{DistanceMetric, Match, Whitelist, WhitelistError};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// the largest edit distance we will ever correct a barcode across
pub const MAX_DISTANCE_CAP: u8 = 3;

pub const DEFAULT_CELL_BARCODE_TAG: &str = "CB";
pub const DEFAULT_SAMPLE_BARCODE_TAG: &str = "SB";
pub const DEFAULT_UMI_TAG: &str = "UR";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Unknown location format `{0}`, should be like \"R1:1-16\"")]
    InvalidLocation(String),
    #[error("Invalid distance `{0}`, should be an integer in [0, 3]")]
    InvalidDistance(String),
    #[error("Set too much distance ({distance}) for region {location}, allow {cap} distance at max")]
    DistanceOverCap {
        location: Location,
        distance: u8,
        cap: u8,
    },
    #[error("Allowed distance ({distance}) for region {location} is greater than half of its length ({len}); try to reduce distance")]
    DistanceOverHalf {
        location: Location,
        distance: u8,
        len: usize,
    },
    #[error("Inconsistent white list length for region {location}: expected {expected}, found {found} ({entry})")]
    WhitelistLength {
        location: Location,
        expected: usize,
        found: usize,
        entry: String,
    },
    #[error("Duplicated white list entry {entry} for region {location}")]
    DuplicateWhitelistEntry { location: Location, entry: String },
    #[error("The layout must define a \"read 1\" location")]
    MissingReadOne,
}

/// Which mate of a read pair a region lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mate {
    One,
    Two,
}

/// A 1-based, inclusive stretch of one mate's sequence, written
/// `R{1|2}:{start}-{end}` in the layout document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub mate: Mate,
    pub start: usize,
    pub end: usize,
}

impl Location {
    pub fn new(mate: Mate, start: usize, end: usize) -> Result<Self, LayoutError> {
        let loc = Location { mate, start, end };
        if start == 0 || end < start {
            return Err(LayoutError::InvalidLocation(loc.to_string()));
        }
        Ok(loc)
    }

    #[inline(always)]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// the 0-based, half-open byte range covered by this location
    #[inline(always)]
    pub fn range(&self) -> std::ops::Range<usize> {
        (self.start - 1)..self.end
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rd = match self.mate {
            Mate::One => 1,
            Mate::Two => 2,
        };
        write!(f, "R{}:{}-{}", rd, self.start, self.end)
    }
}

impl FromStr for Location {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || LayoutError::InvalidLocation(s.to_string());
        let (rd, span) = s.trim().split_once(':').ok_or_else(bad)?;
        let mate = match rd {
            "R1" => Mate::One,
            "R2" => Mate::Two,
            _ => return Err(bad()),
        };
        let (start, end) = span.split_once('-').ok_or_else(bad)?;
        let start = start.parse::<usize>().map_err(|_| bad())?;
        let end = end.parse::<usize>().map_err(|_| bad())?;
        Location::new(mate, start, end).map_err(|_| bad())
    }
}

/// One tagged sub-sequence location together with the values it may take.
#[derive(Debug, Clone)]
pub struct Region {
    pub location: Location,
    pub max_distance: u8,
    pub whitelist: Whitelist,
}

impl Region {
    /// A region that is only ever sliced out (UMI, payload); nothing to correct against.
    pub fn plain(location: Location) -> Self {
        Region {
            location,
            max_distance: 0,
            whitelist: Whitelist::default(),
        }
    }

    pub fn new(
        location: Location,
        max_distance: u8,
        allowed_values: Vec<String>,
    ) -> Result<Self, LayoutError> {
        if max_distance > MAX_DISTANCE_CAP {
            return Err(LayoutError::DistanceOverCap {
                location,
                distance: max_distance,
                cap: MAX_DISTANCE_CAP,
            });
        }
        let len = location.len();
        if max_distance as usize > len / 2 {
            return Err(LayoutError::DistanceOverHalf {
                location,
                distance: max_distance,
                len,
            });
        }
        if let Some(bad) = allowed_values.iter().find(|v| v.len() != len) {
            return Err(LayoutError::WhitelistLength {
                location,
                expected: len,
                found: bad.len(),
                entry: bad.clone(),
            });
        }
        let whitelist = Whitelist::new(allowed_values)
            .map_err(|WhitelistError::DuplicateEntry(entry)| {
                LayoutError::DuplicateWhitelistEntry { location, entry }
            })?;
        Ok(Region {
            location,
            max_distance,
            whitelist,
        })
    }

    fn from_config(rc: RegionConfig) -> Result<Self, LayoutError> {
        let location = rc.location.parse::<Location>()?;
        let max_distance = match rc.distance {
            None => 0,
            Some(d) => parse_distance(&d)?,
        };
        Region::new(location, max_distance, rc.white_list)
    }

    #[inline]
    pub fn resolve(&self, query: &[u8], metric: DistanceMetric) -> Match {
        self.whitelist.resolve(query, self.max_distance, metric)
    }
}

fn parse_distance(d: &DistanceValue) -> Result<u8, LayoutError> {
    let (txt, parsed) = match d {
        DistanceValue::Number(n) => (n.to_string(), u8::try_from(*n).ok()),
        DistanceValue::Text(s) => (s.clone(), s.trim().parse::<u8>().ok()),
    };
    parsed.ok_or(LayoutError::InvalidDistance(txt))
}

/// Names of the identifier tags written for each category; the raw
/// tags are only emitted when they are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagNames {
    pub cell_barcode: String,
    pub cell_barcode_raw: Option<String>,
    pub cell_barcode_raw_qual: Option<String>,
    pub sample_barcode: String,
    pub sample_barcode_raw: Option<String>,
    pub sample_barcode_raw_qual: Option<String>,
    pub umi: String,
    pub umi_qual: Option<String>,
}

impl Default for TagNames {
    fn default() -> Self {
        TagNames {
            cell_barcode: DEFAULT_CELL_BARCODE_TAG.to_string(),
            cell_barcode_raw: None,
            cell_barcode_raw_qual: None,
            sample_barcode: DEFAULT_SAMPLE_BARCODE_TAG.to_string(),
            sample_barcode_raw: None,
            sample_barcode_raw_qual: None,
            umi: DEFAULT_UMI_TAG.to_string(),
            umi_qual: None,
        }
    }
}

/// The complete, validated description of where every tag lives.
/// Built once before any worker starts and never mutated afterwards,
/// so it is shared between threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RegionLayout {
    pub platform: Option<String>,
    pub version: Option<String>,
    pub cell_barcodes: Vec<Region>,
    pub sample_barcodes: Vec<Region>,
    pub umi: Option<Region>,
    pub read_1: Region,
    pub read_2: Option<Region>,
    pub tags: TagNames,
    pub metric: DistanceMetric,
}

impl RegionLayout {
    /// A layout with only a read 1 payload; the remaining pieces are
    /// filled in by the caller.
    pub fn new(read_1: Location) -> Self {
        RegionLayout {
            platform: None,
            version: None,
            cell_barcodes: Vec::new(),
            sample_barcodes: Vec::new(),
            umi: None,
            read_1: Region::plain(read_1),
            read_2: None,
            tags: TagNames::default(),
            metric: DistanceMetric::default(),
        }
    }

    pub fn from_config(cfg: LayoutConfig, metric: DistanceMetric) -> Result<Self, LayoutError> {
        let plain = |lc: LocationConfig| -> Result<Region, LayoutError> {
            Ok(Region::plain(lc.location.parse::<Location>()?))
        };

        let read_1 = plain(cfg.read_1.ok_or(LayoutError::MissingReadOne)?)?;
        let read_2 = cfg.read_2.map(plain).transpose()?;
        let umi = cfg.umi.map(plain).transpose()?;

        let cell_barcodes = cfg
            .cell_barcode
            .into_iter()
            .map(Region::from_config)
            .collect::<Result<Vec<Region>, LayoutError>>()?;
        let sample_barcodes = cfg
            .sample_barcode
            .into_iter()
            .map(Region::from_config)
            .collect::<Result<Vec<Region>, LayoutError>>()?;

        let defaults = TagNames::default();
        let tags = TagNames {
            cell_barcode: cfg.cell_barcode_tag.unwrap_or(defaults.cell_barcode),
            cell_barcode_raw: cfg.cell_barcode_raw_tag,
            cell_barcode_raw_qual: cfg.cell_barcode_raw_qual_tag,
            sample_barcode: cfg.sample_barcode_tag.unwrap_or(defaults.sample_barcode),
            sample_barcode_raw: cfg.sample_barcode_raw_tag,
            sample_barcode_raw_qual: cfg.sample_barcode_raw_qual_tag,
            umi: cfg.umi_tag.unwrap_or(defaults.umi),
            umi_qual: cfg.umi_qual_tag,
        };

        Ok(RegionLayout {
            platform: cfg.platform,
            version: cfg.version,
            cell_barcodes,
            sample_barcodes,
            umi,
            read_1,
            read_2,
            tags,
            metric,
        })
    }

    /// true if any region (barcode, UMI or payload) reads from mate 2
    pub fn uses_mate_two(&self) -> bool {
        self.cell_barcodes
            .iter()
            .chain(self.sample_barcodes.iter())
            .chain(self.umi.iter())
            .chain(std::iter::once(&self.read_1))
            .chain(self.read_2.iter())
            .any(|r| r.location.mate == Mate::Two)
    }
}
