//! Core types shared by every validation engine.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::violation::Violation;

/// Aggregate outcome of a validation run.
///
/// Ordering matters: `Fail` dominates `Warn`, which dominates `Pass`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Warn,
    Fail,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pass => "PASS",
            Status::Warn => "WARN",
            Status::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of running one engine over one set of documents.
///
/// Serializes to `{"status": "PASS"}` when clean; `errors` and `warnings`
/// only appear when non-empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    pub status: Status,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Violation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Violation>,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        self.status == Status::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.status == Status::Fail
    }

    /// Rule identifiers of every error, in reporting order.
    pub fn error_rules(&self) -> Vec<&str> {
        self.errors.iter().map(|v| v.rule.as_str()).collect()
    }

    /// Rule identifiers of every warning, in reporting order.
    pub fn warning_rules(&self) -> Vec<&str> {
        self.warnings.iter().map(|v| v.rule.as_str()).collect()
    }
}

/// A closed set of string values.
///
/// Free-form documents (holdings, research artifacts) are read as raw JSON;
/// their enum-typed fields are checked through this trait so an unknown value
/// becomes a violation instead of a load error.
pub trait ClosedSet: DeserializeOwned + Sized {
    /// Accepted wire values, sorted.
    const ALLOWED: &'static [&'static str];

    /// Parse a raw JSON value into the set, `None` if it is not a member.
    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(_) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    }
}

/// Exchange region of a security.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Market {
    US,
    KR,
    EU,
}

impl Market {
    /// Settlement currency implied by the market, if the portfolio tracks one.
    pub fn implied_currency(&self) -> Option<Currency> {
        match self {
            Market::US => Some(Currency::USD),
            Market::KR => Some(Currency::KRW),
            Market::EU => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::US => "US",
            Market::KR => "KR",
            Market::EU => "EU",
        }
    }
}

impl ClosedSet for Market {
    const ALLOWED: &'static [&'static str] = &["EU", "KR", "US"];
}

/// Individual stock or exchange-traded fund.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Stock,
    Etf,
}

impl ClosedSet for AssetType {
    const ALLOWED: &'static [&'static str] = &["etf", "stock"];
}

/// Strategic role of an allocated position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Core,
    Satellite,
}

/// Conviction bucket used for position sizing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Currency a position is denominated in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Currency {
    USD,
    KRW,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::KRW => "KRW",
        }
    }
}

impl ClosedSet for Currency {
    const ALLOWED: &'static [&'static str] = &["KRW", "USD"];
}

/// Rebalance cadence; selects which anchoring caps apply.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReviewType {
    #[default]
    Monthly,
    Quarterly,
}

impl ReviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewType::Monthly => "monthly",
            ReviewType::Quarterly => "quarterly",
        }
    }
}

impl std::fmt::Display for ReviewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of an investment thesis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ThesisStatus {
    Valid,
    Weakening,
    Invalidated,
}

impl ClosedSet for ThesisStatus {
    const ALLOWED: &'static [&'static str] = &["invalidated", "valid", "weakening"];
}

/// Whether a condition supports or would invalidate its thesis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    Validity,
    Invalidation,
}

impl ClosedSet for ConditionType {
    const ALLOWED: &'static [&'static str] = &["invalidation", "validity"];
}

/// Evaluation state of a single thesis condition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConditionStatus {
    Met,
    PartiallyMet,
    NotYet,
    Refuted,
    Unknown,
}

impl ClosedSet for ConditionStatus {
    const ALLOWED: &'static [&'static str] =
        &["met", "not_yet", "partially_met", "refuted", "unknown"];
}

/// Direction of a status change since the previous check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StatusTransition {
    Stable,
    Improving,
    Degrading,
    New,
}

impl ClosedSet for StatusTransition {
    const ALLOWED: &'static [&'static str] = &["degrading", "improving", "new", "stable"];
}

/// Size bucket of a candidate security.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MarketCapCategory {
    Large,
    Mid,
    Small,
}

impl ClosedSet for MarketCapCategory {
    const ALLOWED: &'static [&'static str] = &["large", "mid", "small"];
}
