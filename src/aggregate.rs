//! Per-market result assembly and summary statistics.
//!
//! [`build_result`] turns one [`MarketRow`] into an immutable [`MarketResult`]
//! (or a [`SkipReason`]); [`process_markets`] maps a whole dataset in input
//! order; [`summarize`] folds the results into [`SummaryStats`] for the
//! report.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Serialize;
use thiserror::Error;

use crate::{
    classify::{self, MarketTier},
    dataset::MarketRow,
    resolver::{self, DEFAULT_MAX_LOOKBACK, YoyAnchor},
};

pub const DEFAULT_TOP_N: usize = 10;
pub const MISSING_YOY_TEXT: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub target: NaiveDate,
    pub max_lookback: usize,
    pub yoy_anchor: YoyAnchor,
}

impl ResolveOptions {
    pub fn new(target: NaiveDate) -> Self {
        Self {
            target,
            max_lookback: DEFAULT_MAX_LOOKBACK,
            yoy_anchor: YoyAnchor::default(),
        }
    }
}

/// Finalized record for one market, shared by the SQL and report writers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketResult {
    pub region_id: i64,
    pub size_rank: u32,
    pub city_state: String,
    pub monthly_rental_average: i64,
    pub radius: f64,
    pub year_over_year_growth: String,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub yoy_growth_numeric: Option<Decimal>,
    pub market_tier: MarketTier,
    pub data_date_used: NaiveDate,
    pub yoy_comparison_date: Option<NaiveDate>,
}

impl MarketResult {
    pub fn yoy_percent(&self) -> Option<f64> {
        self.yoy_growth_numeric.and_then(|value| value.to_f64())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("missing or zero size rank")]
    Unranked,
    #[error("no value within {lookback} month(s) of {target}")]
    NoRecentData { target: NaiveDate, lookback: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedMarket {
    pub region_id: i64,
    pub region_name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketBatch {
    pub results: Vec<MarketResult>,
    pub skipped: Vec<SkippedMarket>,
}

pub fn build_result(row: &MarketRow, options: &ResolveOptions) -> Result<MarketResult, SkipReason> {
    let tier = MarketTier::from_rank(row.size_rank);
    let size_rank = match row.size_rank {
        Some(rank) if tier != MarketTier::Unranked => rank,
        _ => return Err(SkipReason::Unranked),
    };

    let current = resolver::resolve_current(&row.series, options.target, options.max_lookback)
        .ok_or(SkipReason::NoRecentData {
            target: options.target,
            lookback: options.max_lookback,
        })?;
    let prior =
        resolver::find_comparison_column(&row.series, current.date_used, options.yoy_anchor)
            .and_then(|column| {
                resolver::resolve_comparison(&row.series, column, options.max_lookback)
            });
    let change = classify::yoy(Some(current.value), prior.map(|p| p.value));

    Ok(MarketResult {
        region_id: row.region_id,
        size_rank,
        city_state: row.region_name.clone(),
        monthly_rental_average: classify::round_rent(current.value),
        radius: tier.default_radius(),
        year_over_year_growth: change
            .as_ref()
            .map(|c| c.percentage_text.clone())
            .unwrap_or_else(|| MISSING_YOY_TEXT.to_string()),
        yoy_growth_numeric: change.map(|c| c.decimal_percent),
        market_tier: tier,
        data_date_used: current.date_used,
        yoy_comparison_date: prior.map(|p| p.date_used),
    })
}

pub fn process_markets(rows: &[MarketRow], options: &ResolveOptions) -> MarketBatch {
    let mut batch = MarketBatch::default();
    for row in rows {
        match build_result(row, options) {
            Ok(result) => batch.results.push(result),
            Err(reason) => {
                match reason {
                    SkipReason::Unranked => debug!(
                        "Skipping {} (ID: {}): {reason}",
                        row.region_name, row.region_id
                    ),
                    SkipReason::NoRecentData { .. } => warn!(
                        "No recent data found for {} (ID: {}): {reason}",
                        row.region_name, row.region_id
                    ),
                }
                batch.skipped.push(SkippedMarket {
                    region_id: row.region_id,
                    region_name: row.region_name.clone(),
                    reason,
                });
            }
        }
    }
    batch
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedMarket {
    pub city_state: String,
    pub yoy_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub total: usize,
    pub tier_counts: BTreeMap<MarketTier, usize>,
    pub with_yoy: usize,
    pub without_yoy: usize,
    /// `None` when no market has a YOY value.
    pub growth: Option<GrowthStats>,
    /// Requested length of the fastest-growing list.
    pub top_n: usize,
    pub top_growth: Vec<RankedMarket>,
}

impl SummaryStats {
    pub fn tier_count(&self, tier: MarketTier) -> usize {
        self.tier_counts.get(&tier).copied().unwrap_or(0)
    }
}

#[derive(Default)]
struct GrowthAccumulator {
    values: Vec<f64>,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl GrowthAccumulator {
    fn add_value(&mut self, value: f64) {
        self.sum += value;
        self.min = Some(self.min.map_or(value, |current| current.min(value)));
        self.max = Some(self.max.map_or(value, |current| current.max(value)));
        self.values.push(value);
    }

    fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.sum / self.values.len() as f64)
        }
    }

    fn median(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len().is_multiple_of(2) {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }

    fn finish(&self) -> Option<GrowthStats> {
        Some(GrowthStats {
            mean: self.mean()?,
            median: self.median()?,
            min: self.min?,
            max: self.max?,
        })
    }
}

pub fn summarize(results: &[MarketResult], top_n: usize) -> SummaryStats {
    let mut tier_counts = BTreeMap::new();
    let mut growth = GrowthAccumulator::default();
    let mut ranked = Vec::new();
    for result in results {
        *tier_counts.entry(result.market_tier).or_insert(0) += 1;
        if let Some(percent) = result.yoy_percent() {
            growth.add_value(percent);
            ranked.push(RankedMarket {
                city_state: result.city_state.clone(),
                yoy_percent: percent,
            });
        }
    }
    // Stable sort keeps input order among equal growth values.
    ranked.sort_by(|a, b| b.yoy_percent.total_cmp(&a.yoy_percent));
    ranked.truncate(top_n);

    let with_yoy = growth.values.len();
    SummaryStats {
        total: results.len(),
        tier_counts,
        with_yoy,
        without_yoy: results.len() - with_yoy,
        growth: growth.finish(),
        top_n,
        top_growth: ranked,
    }
}
