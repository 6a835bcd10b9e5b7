//! Dataset loading for wide monthly rent exports.
//!
//! The input has one row per region and one column per sampled month, with
//! the month columns named `YYYY-MM-DD`. Loading turns that layout into
//! [`MarketRow`]s whose [`TimeSeries`] is sorted once, ascending, so the
//! resolver never has to sort or parse column names per row.
//!
//! Only header-level problems are fatal ([`DatasetError`]). Cell-level noise
//! degrades to gaps: an unparseable month becomes `None`, an unparseable rank
//! becomes an absent rank, and a row without a usable `RegionID` is dropped
//! with a warning.

use std::{collections::HashMap, path::Path, sync::LazyLock};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use encoding_rs::Encoding;
use log::{debug, warn};
use regex::Regex;
use thiserror::Error;

use crate::io_utils;

pub const REGION_ID_COLUMN: &str = "RegionID";
pub const SIZE_RANK_COLUMN: &str = "SizeRank";
pub const REGION_NAME_COLUMN: &str = "RegionName";
pub const REGION_TYPE_COLUMN: &str = "RegionType";

static DATE_COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date column pattern is valid"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("Dataset has no header row")]
    MissingHeader,
    #[error("Required column '{0}' not found in dataset header")]
    MissingColumn(&'static str),
    #[error("Dataset contains no month columns named YYYY-MM-DD")]
    NoDateColumns,
    #[error("Month column '{0}' appears more than once")]
    DuplicateDateColumn(String),
}

/// Monthly observations for one region, ordered by date ascending.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    points: Vec<(NaiveDate, Option<f64>)>,
}

impl TimeSeries {
    /// Builds a series from unordered points. Later duplicates of a date are
    /// dropped so each date keeps exactly one slot.
    pub fn new(mut points: Vec<(NaiveDate, Option<f64>)>) -> Self {
        points.sort_by_key(|(date, _)| *date);
        points.dedup_by_key(|(date, _)| *date);
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(NaiveDate, Option<f64>)] {
        &self.points
    }

    pub fn date_at(&self, index: usize) -> Option<NaiveDate> {
        self.points.get(index).map(|(date, _)| *date)
    }

    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.points.get(index).and_then(|(_, value)| *value)
    }

    /// Ascending index of `date`, if the series has a slot for it.
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.points
            .binary_search_by_key(&date, |(candidate, _)| *candidate)
            .ok()
    }

    /// Value observed on `date`; `None` for both a missing slot and a gap.
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.position(date).and_then(|idx| self.value_at(idx))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketRow {
    pub region_id: i64,
    pub size_rank: Option<u32>,
    pub region_name: String,
    pub series: TimeSeries,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    /// Keep only rows whose `RegionType` matches (case-insensitive). `None`
    /// keeps every row and does not require the column.
    pub region_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub rows: Vec<MarketRow>,
    /// Every month column in the header, ascending.
    pub dates: Vec<NaiveDate>,
    pub records_read: usize,
}

impl Dataset {
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}

struct HeaderLayout {
    region_id: usize,
    size_rank: usize,
    region_name: usize,
    region_type: Option<usize>,
    /// `(column index, date)` pairs sorted by date.
    dates: Vec<(usize, NaiveDate)>,
}

impl HeaderLayout {
    fn from_headers(headers: &[String], require_region_type: bool) -> Result<Self, DatasetError> {
        if headers.is_empty() {
            return Err(DatasetError::MissingHeader);
        }
        let lookup = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim(), idx))
            .collect::<HashMap<_, _>>();
        let required = |name: &'static str| {
            lookup
                .get(name)
                .copied()
                .ok_or(DatasetError::MissingColumn(name))
        };
        let region_type = if require_region_type {
            Some(required(REGION_TYPE_COLUMN)?)
        } else {
            lookup.get(REGION_TYPE_COLUMN).copied()
        };

        let mut dates = Vec::new();
        for (idx, name) in headers.iter().enumerate() {
            let name = name.trim();
            if !DATE_COLUMN.is_match(name) {
                continue;
            }
            match NaiveDate::parse_from_str(name, "%Y-%m-%d") {
                Ok(date) => dates.push((idx, date)),
                Err(_) => debug!("Ignoring column '{name}' that looks like a date but is not one"),
            }
        }
        if dates.is_empty() {
            return Err(DatasetError::NoDateColumns);
        }
        dates.sort_by_key(|(_, date)| *date);
        if let Some(pair) = dates.windows(2).find(|pair| pair[0].1 == pair[1].1) {
            return Err(DatasetError::DuplicateDateColumn(
                pair[0].1.format("%Y-%m-%d").to_string(),
            ));
        }

        Ok(Self {
            region_id: required(REGION_ID_COLUMN)?,
            size_rank: required(SIZE_RANK_COLUMN)?,
            region_name: required(REGION_NAME_COLUMN)?,
            region_type,
            dates,
        })
    }

    fn parse_row(&self, record: &[String], row_number: usize) -> Option<MarketRow> {
        let cell = |idx: usize| record.get(idx).map(|s| s.trim()).unwrap_or("");
        let Some(region_id) = parse_integer(cell(self.region_id)) else {
            warn!(
                "Skipping row {row_number}: unusable {REGION_ID_COLUMN} '{}'",
                cell(self.region_id)
            );
            return None;
        };
        // Negative ranks are treated like a missing rank.
        let size_rank = parse_integer(cell(self.size_rank)).and_then(|rank| u32::try_from(rank).ok());
        let points = self
            .dates
            .iter()
            .map(|(idx, date)| (*date, parse_observation(cell(*idx))))
            .collect();
        Some(MarketRow {
            region_id,
            size_rank,
            region_name: cell(self.region_name).to_string(),
            series: TimeSeries { points },
        })
    }

    fn matches_region_type(&self, record: &[String], wanted: Option<&str>) -> bool {
        match (wanted, self.region_type) {
            (Some(wanted), Some(idx)) => record
                .get(idx)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case(wanted)),
            _ => true,
        }
    }
}

/// Reads and filters the dataset at `path` (`-` reads stdin).
pub fn load_dataset(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let mut reader = io_utils::open_csv_reader_from_path(path, options.delimiter, true)?;
    let headers = io_utils::reader_headers(&mut reader, options.encoding)
        .with_context(|| format!("Reading header row of {path:?}"))?;
    let layout = HeaderLayout::from_headers(&headers, options.region_type.is_some())
        .with_context(|| format!("Validating header row of {path:?}"))?;
    let wanted = options.region_type.as_deref();

    let mut dataset = Dataset {
        rows: Vec::new(),
        dates: layout.dates.iter().map(|(_, date)| *date).collect(),
        records_read: 0,
    };
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} of {path:?}", row_idx + 2))?;
        let decoded = io_utils::decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding row {} of {path:?}", row_idx + 2))?;
        dataset.records_read += 1;
        if !layout.matches_region_type(&decoded, wanted) {
            continue;
        }
        if let Some(row) = layout.parse_row(&decoded, row_idx + 2) {
            dataset.rows.push(row);
        }
    }
    Ok(dataset)
}

fn parse_integer(raw: &str) -> Option<i64> {
    if raw.is_empty() {
        return None;
    }
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && value.fract() == 0.0)
            .map(|value| value as i64)
    })
}

fn parse_observation(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    raw.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
