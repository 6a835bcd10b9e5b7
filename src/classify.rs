use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

pub const PRIMARY_MAX_RANK: u32 = 50;
pub const SECONDARY_MAX_RANK: u32 = 100;

/// Market size class derived from a region's size rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarketTier {
    Primary,
    Secondary,
    Tertiary,
    /// Missing or zero rank. Such rows never reach a result set.
    Unranked,
}

impl MarketTier {
    pub fn from_rank(size_rank: Option<u32>) -> Self {
        match size_rank {
            None | Some(0) => MarketTier::Unranked,
            Some(1..=PRIMARY_MAX_RANK) => MarketTier::Primary,
            Some(rank) if rank <= SECONDARY_MAX_RANK => MarketTier::Secondary,
            Some(_) => MarketTier::Tertiary,
        }
    }

    /// Seed radius (miles) for new rows in the destination table.
    pub fn default_radius(self) -> f64 {
        match self {
            MarketTier::Primary => 50.0,
            MarketTier::Secondary => 35.0,
            MarketTier::Tertiary | MarketTier::Unranked => 10.0,
        }
    }

    /// Numeric tier stored in `market_tier`; `None` maps to SQL `NULL`.
    pub fn code(self) -> Option<u8> {
        match self {
            MarketTier::Primary => Some(1),
            MarketTier::Secondary => Some(2),
            MarketTier::Tertiary => Some(3),
            MarketTier::Unranked => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MarketTier::Primary => "Primary",
            MarketTier::Secondary => "Secondary",
            MarketTier::Tertiary => "Tertiary",
            MarketTier::Unranked => "Unranked",
        }
    }
}

impl fmt::Display for MarketTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for MarketTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.code() {
            Some(code) => serializer.serialize_u8(code),
            None => serializer.serialize_none(),
        }
    }
}

/// Year-over-year change expressed in percentage units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YoyChange {
    /// e.g. `"7.25%"`
    pub percentage_text: String,
    /// e.g. `7.25`, rounded to two places
    pub decimal_percent: Decimal,
}

/// Growth from `prior` to `current`. `None` when either side is missing or
/// non-finite, or when `prior` is zero.
pub fn yoy(current: Option<f64>, prior: Option<f64>) -> Option<YoyChange> {
    let (current, prior) = (current?, prior?);
    if prior == 0.0 || !current.is_finite() || !prior.is_finite() {
        return None;
    }
    let percent = (current - prior) / prior * 100.0;
    // Round the exact binary value once; the number is parsed back from the
    // same digits so the two can never disagree.
    let digits = format!("{percent:.2}");
    let decimal_percent = Decimal::from_str(&digits).ok()?;
    Some(YoyChange {
        percentage_text: format!("{digits}%"),
        decimal_percent,
    })
}

/// Monthly rent rounded to a whole unit, ties to even.
pub fn round_rent(value: f64) -> i64 {
    value.round_ties_even() as i64
}
