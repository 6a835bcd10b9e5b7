//! Run configuration.
//!
//! Values resolve in three layers: built-in defaults, an optional YAML file
//! (`--config`), then explicit command-line flags.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{DEFAULT_TOP_N, ResolveOptions},
    resolver::{DEFAULT_MAX_LOOKBACK, YoyAnchor},
    sql::DEFAULT_TABLE,
};

pub const DEFAULT_REGION_TYPE: &str = "msa";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Month to resolve; the newest month column when unset.
    pub target_month: Option<NaiveDate>,
    pub max_lookback_months: usize,
    /// `RegionType` to keep; `None` keeps every row.
    pub region_type: Option<String>,
    pub yoy_anchor: YoyAnchor,
    pub top_n: usize,
    pub table: String,
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_month: None,
            max_lookback_months: DEFAULT_MAX_LOOKBACK,
            region_type: Some(DEFAULT_REGION_TYPE.to_string()),
            yoy_anchor: YoyAnchor::default(),
            top_n: DEFAULT_TOP_N,
            table: DEFAULT_TABLE.to_string(),
            batch_size: 0,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Opening configuration file {path:?}"))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing configuration file {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_yaml::to_string(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Writing configuration file {path:?}"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_lookback_months == 0 {
            return Err(anyhow!("max_lookback_months must be at least 1"));
        }
        if self.table.trim().is_empty() {
            return Err(anyhow!("table must not be empty"));
        }
        Ok(())
    }

    pub fn resolve_options(&self, target: NaiveDate) -> ResolveOptions {
        ResolveOptions {
            target,
            max_lookback: self.max_lookback_months,
            yoy_anchor: self.yoy_anchor,
        }
    }
}
