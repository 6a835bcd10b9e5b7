//! Text renderings of a processing run: the summary report written next to
//! the SQL file, and the per-market audit table.

use std::fmt::Write as _;

use crate::{
    aggregate::{MarketResult, SummaryStats},
    classify::MarketTier,
    table::{self, Align},
};

pub fn render_summary(stats: &SummaryStats) -> String {
    let mut report = String::new();
    let _ = writeln!(report, "=== PROCESSING SUMMARY ===");
    let _ = writeln!(report, "Total MSAs processed: {}", stats.total);
    let _ = writeln!(report);
    let _ = writeln!(report, "Market Tier Breakdown:");
    for (number, tier) in [
        (1, MarketTier::Primary),
        (2, MarketTier::Secondary),
        (3, MarketTier::Tertiary),
    ] {
        let _ = writeln!(
            report,
            "  Tier {number} ({tier}): {} markets",
            stats.tier_count(tier)
        );
    }
    let _ = writeln!(report);
    let _ = writeln!(report, "YOY Growth Statistics:");
    let _ = writeln!(report, "  MSAs with YOY data: {}", stats.with_yoy);
    let _ = write!(report, "  MSAs missing YOY: {}", stats.without_yoy);
    if let Some(growth) = &stats.growth {
        let _ = write!(
            report,
            "\n  Average YOY growth: {:.2}%\n  Median YOY growth: {:.2}%\n  Min YOY growth: {:.2}%\n  Max YOY growth: {:.2}%",
            growth.mean, growth.median, growth.min, growth.max
        );
    }

    if !stats.top_growth.is_empty() {
        let _ = write!(
            report,
            "\n\nTop {} Fastest Growing Markets:",
            stats.top_n
        );
        for (idx, market) in stats.top_growth.iter().enumerate() {
            let _ = write!(
                report,
                "\n  {:>2}. {}: {:.2}%",
                idx + 1,
                market.city_state,
                market.yoy_percent
            );
        }
    }
    report
}

const MARKET_HEADERS: &[&str] = &[
    "region_id",
    "size_rank",
    "city_state",
    "tier",
    "rent",
    "radius",
    "yoy",
    "date_used",
    "yoy_date",
];

const MARKET_ALIGNS: &[Align] = &[
    Align::Right,
    Align::Right,
    Align::Left,
    Align::Left,
    Align::Right,
    Align::Right,
    Align::Right,
    Align::Left,
    Align::Left,
];

pub fn render_market_table(results: &[MarketResult]) -> String {
    let headers = MARKET_HEADERS
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = results
        .iter()
        .map(|result| {
            vec![
                result.region_id.to_string(),
                result.size_rank.to_string(),
                result.city_state.clone(),
                result.market_tier.to_string(),
                result.monthly_rental_average.to_string(),
                format!("{:.1}", result.radius),
                result.year_over_year_growth.clone(),
                result.data_date_used.format("%Y-%m-%d").to_string(),
                result
                    .yoy_comparison_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    table::render_table(&headers, &rows, MARKET_ALIGNS)
}
