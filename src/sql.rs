//! Upsert statement generation for `market_rental_data`.
//!
//! Rows are keyed on `region_id`. On conflict every column is overwritten
//! except `radius`, `latitude`, and `longitude`, which keep the stored value
//! when one exists; the radius emitted here only seeds new markets.

use std::fmt::Write as _;

use chrono::NaiveDate;
use itertools::Itertools;

use crate::aggregate::MarketResult;

pub const DEFAULT_TABLE: &str = "public.market_rental_data";

const INSERT_COLUMNS: &[&str] = &[
    "region_id",
    "size_rank",
    "city_state",
    "latitude",
    "longitude",
    "monthly_rental_average",
    "radius",
    "year_over_year_growth",
    "yoy_growth_numeric",
    "market_tier",
    "updated_at",
];

const OVERWRITTEN_COLUMNS: &[&str] = &[
    "size_rank",
    "city_state",
    "monthly_rental_average",
    "year_over_year_growth",
    "yoy_growth_numeric",
    "market_tier",
];

const PRESERVED_COLUMNS: &[&str] = &["radius", "latitude", "longitude"];

#[derive(Debug, Clone)]
pub struct UpsertOptions {
    pub table: String,
    /// Rows per INSERT statement; 0 puts every row in one statement.
    pub batch_size: usize,
    /// Rendered into the header when present. Leave unset for reproducible
    /// output.
    pub generated_at: Option<String>,
    pub target: NaiveDate,
}

impl UpsertOptions {
    pub fn new(target: NaiveDate) -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            batch_size: 0,
            generated_at: None,
            target,
        }
    }
}

pub fn render_upsert(results: &[MarketResult], options: &UpsertOptions) -> String {
    let mut sql = String::new();
    let _ = writeln!(sql, "-- Auto-generated UPSERT for market rental data");
    if let Some(generated_at) = &options.generated_at {
        let _ = writeln!(sql, "-- Processed on {generated_at}");
    }
    let _ = writeln!(sql, "-- Target month: {}", options.target.format("%Y-%m-%d"));
    let _ = writeln!(sql, "-- Total MSAs: {}", results.len());

    if results.is_empty() {
        let _ = writeln!(sql, "-- No markets to upsert");
        return sql;
    }

    let chunk_size = if options.batch_size == 0 {
        results.len()
    } else {
        options.batch_size
    };
    for chunk in results.chunks(chunk_size) {
        sql.push('\n');
        write_statement(&mut sql, &options.table, chunk);
    }
    sql
}

fn write_statement(sql: &mut String, table: &str, rows: &[MarketResult]) {
    let _ = writeln!(sql, "INSERT INTO {table}");
    let _ = writeln!(sql, "  ({})", INSERT_COLUMNS.join(", "));
    let _ = writeln!(sql, "VALUES");
    let _ = writeln!(sql, "{}", rows.iter().map(value_row).join(",\n"));
    let _ = writeln!(sql, "ON CONFLICT (region_id) DO UPDATE");
    let _ = writeln!(sql, "SET");
    for column in OVERWRITTEN_COLUMNS {
        let _ = writeln!(sql, "  {column:<23} = EXCLUDED.{column},");
    }
    for column in PRESERVED_COLUMNS {
        let _ = writeln!(
            sql,
            "  {column:<23} = COALESCE({table}.{column}, EXCLUDED.{column}),"
        );
    }
    let _ = writeln!(sql, "  {:<23} = now();", "updated_at");
}

fn value_row(result: &MarketResult) -> String {
    let yoy_numeric = result
        .yoy_growth_numeric
        .map(|value| format!("{value:.2}"))
        .unwrap_or_else(|| "NULL".to_string());
    let tier = result
        .market_tier
        .code()
        .map(|code| code.to_string())
        .unwrap_or_else(|| "NULL".to_string());
    format!(
        "  ({}, {}, {}, NULL, NULL, {}, {:.1}, {}, {}, {}, now())",
        result.region_id,
        result.size_rank,
        quote_literal(&result.city_state),
        result.monthly_rental_average,
        result.radius,
        quote_literal(&result.year_over_year_growth),
        yoy_numeric,
        tier,
    )
}

/// Single-quoted SQL string literal with embedded quotes doubled.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::MarketTier;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    fn market(region_id: i64, name: &str, yoy: Option<&str>) -> MarketResult {
        MarketResult {
            region_id,
            size_rank: 12,
            city_state: name.to_string(),
            monthly_rental_average: 2110,
            radius: 50.0,
            year_over_year_growth: yoy.map(|v| format!("{v}%")).unwrap_or_else(|| "N/A".into()),
            yoy_growth_numeric: yoy.map(|v| v.parse().expect("decimal")),
            market_tier: MarketTier::Primary,
            data_date_used: date("2025-08-31"),
            yoy_comparison_date: None,
        }
    }

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(quote_literal("Coeur d'Alene, ID"), "'Coeur d''Alene, ID'");
    }

    #[test]
    fn value_rows_render_nulls() {
        let row = value_row(&market(394913, "New York, NY", Some("3.10")));
        assert_eq!(
            row,
            "  (394913, 12, 'New York, NY', NULL, NULL, 2110, 50.0, '3.10%', 3.10, 1, now())"
        );
        let row = value_row(&market(1, "Nowhere", None));
        assert!(row.ends_with("'N/A', NULL, 1, now())"), "{row}");
    }

    #[test]
    fn upsert_preserves_seed_columns() {
        let sql = render_upsert(
            &[market(1, "A", Some("1.00"))],
            &UpsertOptions::new(date("2025-08-31")),
        );
        assert!(sql.contains("INSERT INTO public.market_rental_data"));
        assert!(sql.contains("ON CONFLICT (region_id) DO UPDATE"));
        assert!(sql.contains(
            "radius                  = COALESCE(public.market_rental_data.radius, EXCLUDED.radius),"
        ));
        assert!(sql.contains("monthly_rental_average  = EXCLUDED.monthly_rental_average,"));
        assert!(sql.trim_end().ends_with("updated_at              = now();"));
        assert!(!sql.contains("Processed on"));
    }

    #[test]
    fn batches_split_statements() {
        let rows = (1..=5)
            .map(|id| market(id, "Metro", None))
            .collect::<Vec<_>>();
        let mut options = UpsertOptions::new(date("2025-08-31"));
        options.batch_size = 2;
        let sql = render_upsert(&rows, &options);
        assert_eq!(sql.matches("INSERT INTO").count(), 3);
        assert_eq!(sql.matches("ON CONFLICT").count(), 3);
        assert!(sql.contains("-- Total MSAs: 5"));
    }

    #[test]
    fn empty_results_produce_header_only() {
        let mut options = UpsertOptions::new(date("2025-08-31"));
        options.generated_at = Some("2025-09-15 08:00:00".into());
        let sql = render_upsert(&[], &options);
        assert!(sql.contains("-- Processed on 2025-09-15 08:00:00"));
        assert!(sql.contains("-- No markets to upsert"));
        assert!(!sql.contains("INSERT"));
    }
}
