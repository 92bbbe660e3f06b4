//! Reference data parsing from YAML/JSON.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::{validate_schema, SchemaKind};
use crate::engines::parse_iso_str;
use crate::engines::research::parse_thesis_names;
use crate::types::{AssetType, Market, ReviewType};

/// Errors that can occur when loading reference data or input documents.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Schema validation failed: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid reference date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

/// Strategy section of the settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Strategy {
    /// Target share of the budget held in core positions, in percent
    pub core_pct: f64,

    /// Target share of the budget held in satellite positions, in percent
    pub satellite_pct: f64,

    /// Relative weights between core symbols
    #[serde(default)]
    pub core_internal_ratio: Option<BTreeMap<String, f64>>,
}

/// Confidence-pool sizing section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sizing {
    pub high_confidence_pool_pct: f64,
    pub medium_confidence_pool_pct: f64,
    pub low_confidence_pool_pct: f64,
}

impl Sizing {
    pub fn total_pct(&self) -> f64 {
        self.high_confidence_pool_pct + self.medium_confidence_pool_pct + self.low_confidence_pool_pct
    }
}

/// Risk limits section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskTolerance {
    pub max_single_stock_pct: f64,
    pub max_single_etf_pct: f64,
    pub max_sector_concentration_pct: f64,
    pub min_position_size_krw: i64,

    #[serde(default)]
    pub max_drawdown_warning_pct: Option<f64>,

    #[serde(default)]
    pub max_drawdown_action_pct: Option<f64>,
}

/// Rebalance pacing caps, per review cadence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anchoring {
    pub monthly_max_change_per_position_krw: i64,
    pub monthly_max_total_change_krw: i64,
    pub quarterly_max_change_per_position_krw: i64,
    pub quarterly_max_total_change_krw: i64,
}

impl Anchoring {
    /// Per-position cap for the given cadence.
    pub fn max_change_per_position(&self, review_type: ReviewType) -> i64 {
        match review_type {
            ReviewType::Monthly => self.monthly_max_change_per_position_krw,
            ReviewType::Quarterly => self.quarterly_max_change_per_position_krw,
        }
    }

    /// Total-change cap for the given cadence.
    pub fn max_total_change(&self, review_type: ReviewType) -> i64 {
        match review_type {
            ReviewType::Monthly => self.monthly_max_total_change_krw,
            ReviewType::Quarterly => self.quarterly_max_total_change_krw,
        }
    }
}

/// Portfolio settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Total budget as written; anything but a positive number becomes a
    /// `budget_positive` violation.
    #[serde(default)]
    pub budget_krw: serde_json::Value,

    /// Every allocation amount must be a multiple of this
    pub adjustment_unit_krw: i64,

    pub strategy: Strategy,
    pub sizing: Sizing,
    pub risk_tolerance: RiskTolerance,
    pub anchoring: Anchoring,

    /// Age after which holdings are considered stale
    #[serde(default)]
    pub holdings_staleness_threshold_days: Option<i64>,
}

impl Settings {
    /// The budget, if it is a positive number.
    pub fn budget(&self) -> Option<f64> {
        self.budget_krw.as_f64().filter(|b| *b > 0.0)
    }

    /// Parse settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse settings from a file; `.yaml`/`.yml` are read as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        if is_yaml(path) {
            Self::from_yaml(&contents)
        } else {
            Self::from_json(&contents)
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        validate_schema(SchemaKind::Settings, &value).map_err(ConfigError::SchemaError)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// A single tracked security.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchlistEntry {
    pub symbol: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub asset_type: AssetType,

    pub sector: String,
    pub market: Market,
}

/// The watchlist: source of truth for symbol type, sector and market.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Watchlist {
    pub entries: Vec<WatchlistEntry>,
}

impl Watchlist {
    pub fn new(entries: Vec<WatchlistEntry>) -> Self {
        Self { entries }
    }

    /// Look up an entry by symbol.
    pub fn get(&self, symbol: &str) -> Option<&WatchlistEntry> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }

    /// Every symbol on the watchlist.
    pub fn symbols(&self) -> BTreeSet<String> {
        self.entries.iter().map(|e| e.symbol.clone()).collect()
    }

    /// Parse a watchlist from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a watchlist from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a watchlist from a file; `.yaml`/`.yml` are read as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        if is_yaml(path) {
            Self::from_yaml(&contents)
        } else {
            Self::from_json(&contents)
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        validate_schema(SchemaKind::Watchlist, &value).map_err(ConfigError::SchemaError)?;
        let watchlist: Watchlist = serde_json::from_value(value)?;
        watchlist.validate_unique_symbols()?;
        Ok(watchlist)
    }

    /// Ensure no symbol is listed twice.
    fn validate_unique_symbols(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(&entry.symbol) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate watchlist symbol: {}",
                    entry.symbol
                )));
            }
        }
        Ok(())
    }
}

/// Ordered thesis names from `theses.md`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThesisCatalog {
    pub names: Vec<String>,
}

impl ThesisCatalog {
    pub fn from_markdown(markdown: &str) -> Self {
        Self {
            names: parse_thesis_names(markdown),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::from_markdown(&contents))
    }
}

/// Read a free-form JSON document (holdings, research artifacts).
pub fn read_json_document(path: impl AsRef<Path>) -> Result<serde_json::Value, ConfigError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Parse a `YYYY-MM-DD` reference date.
pub fn parse_reference_date(raw: &str) -> Result<NaiveDate, ConfigError> {
    parse_iso_str(raw).ok_or_else(|| ConfigError::InvalidDate(raw.to_string()))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
