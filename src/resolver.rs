//! Column-dated value resolution and YOY pairing.
//!
//! Monthly exports are sparse: a market may be missing the newest month or
//! have holes further back. [`resolve_current`] finds the best observation at
//! or before a target within a bounded number of sampling periods, and
//! [`find_yoy_column`] locates the comparison month by counting back twelve
//! periods from the date that actually supplied the value, so a fallback
//! shifts the baseline with it.

use chrono::{Months, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::dataset::TimeSeries;

pub const DEFAULT_MAX_LOOKBACK: usize = 6;
/// Sampling periods between a month and its year-ago counterpart.
pub const YOY_PERIODS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedObservation {
    pub value: f64,
    pub date_used: NaiveDate,
}

/// How the year-ago column is located from the date used for the current
/// value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum YoyAnchor {
    /// Twelve columns earlier in ascending order. Assumes gap-free monthly
    /// cadence.
    #[default]
    Positional,
    /// Twelve calendar months earlier, snapped to the latest column at or
    /// before that date.
    Calendar,
}

/// Latest present value at or before `target`, examining at most
/// `max_lookback` sampling periods.
///
/// A present value on `target` wins outright. Otherwise the scan walks the
/// row's dates newest-first, starting at `target` when the row has that
/// column and at the newest column when it does not.
pub fn resolve_current(
    series: &TimeSeries,
    target: NaiveDate,
    max_lookback: usize,
) -> Option<ResolvedObservation> {
    if let Some(value) = series.value_on(target) {
        return Some(ResolvedObservation {
            value,
            date_used: target,
        });
    }

    let points = series.points();
    // Descending offset of the first date to examine.
    let start = series
        .position(target)
        .map(|idx| points.len() - 1 - idx)
        .unwrap_or(0);
    points
        .iter()
        .rev()
        .skip(start)
        .take(max_lookback)
        .find_map(|(date, value)| {
            value.map(|value| ResolvedObservation {
                value,
                date_used: *date,
            })
        })
}

/// Date twelve sampling periods before `actual_date_used`.
///
/// When `actual_date_used` is not one of the row's columns, the nearest
/// column at or before it anchors the count (the first column if none
/// qualify). Returns `None` when fewer than twelve earlier columns exist.
pub fn find_yoy_column(series: &TimeSeries, actual_date_used: NaiveDate) -> Option<NaiveDate> {
    let anchor = match series.position(actual_date_used) {
        Some(idx) => idx,
        None => series
            .points()
            .iter()
            .take_while(|(date, _)| *date <= actual_date_used)
            .count()
            .saturating_sub(1),
    };
    anchor
        .checked_sub(YOY_PERIODS)
        .and_then(|idx| series.date_at(idx))
}

/// Calendar variant of [`find_yoy_column`]: the latest column on or before
/// the date twelve calendar months earlier.
pub fn find_yoy_column_by_calendar(
    series: &TimeSeries,
    actual_date_used: NaiveDate,
) -> Option<NaiveDate> {
    let year_ago = actual_date_used.checked_sub_months(Months::new(YOY_PERIODS as u32))?;
    series
        .points()
        .iter()
        .rev()
        .map(|(date, _)| *date)
        .find(|date| *date <= year_ago)
}

pub fn find_comparison_column(
    series: &TimeSeries,
    actual_date_used: NaiveDate,
    anchor: YoyAnchor,
) -> Option<NaiveDate> {
    match anchor {
        YoyAnchor::Positional => find_yoy_column(series, actual_date_used),
        YoyAnchor::Calendar => find_yoy_column_by_calendar(series, actual_date_used),
    }
}

/// Resolves the year-ago observation with the same fallback rules as the
/// current value.
pub fn resolve_comparison(
    series: &TimeSeries,
    yoy_column: NaiveDate,
    max_lookback: usize,
) -> Option<ResolvedObservation> {
    resolve_current(series, yoy_column, max_lookback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    /// Month-end series starting at `first`, one slot per value.
    fn monthly(first: &str, values: &[Option<f64>]) -> TimeSeries {
        let start = date(first);
        let points = values
            .iter()
            .enumerate()
            .map(|(offset, value)| {
                let month = start
                    .checked_add_months(Months::new(offset as u32))
                    .expect("month in range");
                (month_end(month), *value)
            })
            .collect();
        TimeSeries::new(points)
    }

    fn month_end(date: NaiveDate) -> NaiveDate {
        let next = date
            .with_day(1)
            .and_then(|d| d.checked_add_months(Months::new(1)))
            .expect("next month");
        next.pred_opt().expect("previous day")
    }

    #[test]
    fn present_target_is_returned_untouched() {
        let series = monthly("2024-08-31", &[Some(1000.0), Some(1010.0), Some(1020.0)]);
        let found = resolve_current(&series, date("2024-10-31"), 6).expect("value");
        assert_eq!(found.value, 1020.0);
        assert_eq!(found.date_used, date("2024-10-31"));
    }

    #[test]
    fn missing_target_falls_back_to_nearest_earlier_value() {
        let series = monthly(
            "2025-01-31",
            &[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(6.0), None, None],
        );
        let found = resolve_current(&series, date("2025-08-31"), 6).expect("value");
        assert_eq!(found.date_used, date("2025-06-30"));
        assert_eq!(found.value, 6.0);
    }

    #[test]
    fn lookback_window_is_never_exceeded() {
        let series = monthly(
            "2025-01-31",
            &[Some(1.0), None, None, None, None, None, None, None],
        );
        // From 2025-08 the window covers 08..03; 01 is seven periods back.
        assert_eq!(resolve_current(&series, date("2025-08-31"), 6), None);
        let found = resolve_current(&series, date("2025-08-31"), 8).expect("value");
        assert_eq!(found.date_used, date("2025-01-31"));
        assert_eq!(resolve_current(&series, date("2025-08-31"), 0), None);
    }

    #[test]
    fn target_outside_columns_starts_at_newest_column() {
        let series = monthly("2025-01-31", &[Some(1.0), Some(2.0), None]);
        let found = resolve_current(&series, date("2026-12-31"), 6).expect("value");
        assert_eq!(found.date_used, date("2025-02-28"));

        // An unknown date older than every column still starts at the newest.
        let found = resolve_current(&series, date("2020-01-15"), 6).expect("value");
        assert_eq!(found.date_used, date("2025-02-28"));
    }

    #[test]
    fn empty_series_resolves_nothing() {
        let series = TimeSeries::default();
        assert_eq!(resolve_current(&series, date("2025-08-31"), 6), None);
        assert_eq!(find_yoy_column(&series, date("2025-08-31")), None);
    }

    #[test]
    fn yoy_column_is_twelve_positions_before_date_used() {
        let series = monthly("2024-08-31", &[Some(1.0); 13]);
        assert_eq!(
            find_yoy_column(&series, date("2025-08-31")),
            Some(date("2024-08-31"))
        );
        assert_eq!(find_yoy_column(&series, date("2025-07-31")), None);
    }

    #[test]
    fn yoy_column_follows_fallback_date() {
        let mut values = vec![Some(1000.0); 24];
        values[23] = None;
        values[22] = None;
        let series = monthly("2023-09-30", &values);
        let current = resolve_current(&series, date("2025-08-31"), 6).expect("value");
        assert_eq!(current.date_used, date("2025-06-30"));
        assert_eq!(
            find_yoy_column(&series, current.date_used),
            Some(date("2024-06-30"))
        );
    }

    #[test]
    fn yoy_column_for_unknown_date_anchors_on_nearest_earlier_column() {
        let series = monthly("2024-01-31", &[Some(1.0); 14]);
        // 2025-02-15 sits between 2025-01-31 (idx 12) and 2025-02-28 (idx 13).
        assert_eq!(
            find_yoy_column(&series, date("2025-02-15")),
            Some(date("2024-01-31"))
        );
        // Before every column anchors on index 0, which has no year-ago slot.
        assert_eq!(find_yoy_column(&series, date("2023-01-01")), None);
    }

    #[test]
    fn calendar_anchor_skips_missing_columns() {
        let full = monthly("2024-06-30", &[Some(1.0); 15]);
        // Drop 2024-09-30 so positional counting drifts by one month.
        let points = full
            .points()
            .iter()
            .copied()
            .filter(|(d, _)| *d != date("2024-09-30"))
            .collect();
        let gappy = TimeSeries::new(points);
        assert_eq!(
            find_comparison_column(&gappy, date("2025-08-31"), YoyAnchor::Positional),
            Some(date("2024-07-31"))
        );
        assert_eq!(
            find_comparison_column(&gappy, date("2025-08-31"), YoyAnchor::Calendar),
            Some(date("2024-08-31"))
        );
    }

    #[test]
    fn comparison_uses_the_same_fallback() {
        let mut values = vec![Some(1500.0); 14];
        values[0] = None;
        values[1] = Some(1400.0);
        let series = monthly("2024-07-31", &values);
        let yoy_column = find_yoy_column(&series, date("2025-07-31")).expect("column");
        assert_eq!(yoy_column, date("2024-07-31"));
        assert_eq!(resolve_comparison(&series, yoy_column, 6), None);

        let yoy_column = find_yoy_column(&series, date("2025-08-31")).expect("column");
        let prior = resolve_comparison(&series, yoy_column, 6).expect("prior");
        assert_eq!(prior.date_used, date("2024-08-31"));
        assert_eq!(prior.value, 1400.0);
    }
}
