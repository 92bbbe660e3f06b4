//! Allocation Validator
//!
//! **Question**: Does this proposed capital distribution respect budget,
//! risk, strategy and rebalance-pacing limits?
//!
//! A missing or non-positive `budget_krw` fails immediately with a single
//! `budget_positive` violation. Otherwise every rule in [`RULES`] runs and
//! all violations are reported. There is no warning tier.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::reference::{Settings, Watchlist};
use crate::synthesizer::Synthesizer;
use crate::types::{AssetType, Confidence, ReviewType, Role, Verdict};
use crate::violation::Violation;

/// Allowed distance from a target ratio, as a fraction (±5 percentage points).
pub const RATIO_TOLERANCE: f64 = 0.05;

/// Absorbs binary floating-point error at exact tolerance boundaries.
pub const FLOAT_EPSILON: f64 = 1e-9;

/// One allocated position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    /// Amount in KRW
    pub amount: i64,
    pub role: Role,
    pub confidence: Confidence,
}

/// A proposed allocation keyed by symbol.
pub type Allocation = BTreeMap<String, Position>;

/// Amount held or proposed for a symbol in the prior state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnchorPosition {
    #[serde(default)]
    pub amount: i64,
}

/// Prior state used for anchoring: a previous allocation or the KRW value
/// of current holdings, keyed by symbol.
pub type AnchorReference = BTreeMap<String, AnchorPosition>;

/// Everything the allocation engine reads.
#[derive(Debug, Clone, Copy)]
pub struct AllocationRequest<'a> {
    pub allocation: &'a Allocation,
    pub watchlist: &'a Watchlist,
    pub settings: &'a Settings,

    /// Previous (possibly unexecuted) proposal
    pub previous: Option<&'a AnchorReference>,

    pub review_type: ReviewType,

    /// Actual ownership; preferred over `previous` when both are present
    pub current_holdings: Option<&'a AnchorReference>,
}

impl<'a> AllocationRequest<'a> {
    pub fn new(allocation: &'a Allocation, watchlist: &'a Watchlist, settings: &'a Settings) -> Self {
        Self {
            allocation,
            watchlist,
            settings,
            previous: None,
            review_type: ReviewType::Monthly,
            current_holdings: None,
        }
    }

    pub fn with_previous(mut self, previous: &'a AnchorReference) -> Self {
        self.previous = Some(previous);
        self
    }

    pub fn with_current_holdings(mut self, holdings: &'a AnchorReference) -> Self {
        self.current_holdings = Some(holdings);
        self
    }

    pub fn with_review_type(mut self, review_type: ReviewType) -> Self {
        self.review_type = review_type;
        self
    }

    fn total_amount(&self) -> i64 {
        self.allocation
            .values()
            .fold(0i64, |total, p| total.saturating_add(p.amount))
    }
}

/// A rule receives the request and the already-checked positive budget.
pub type AllocationRule = fn(&AllocationRequest<'_>, f64) -> Vec<Violation>;

/// Rules in evaluation and reporting order.
pub const RULES: &[(&str, AllocationRule)] = &[
    ("confidence_pool_total", validate_confidence_pool),
    ("watchlist_membership", validate_watchlist_membership),
    ("budget_total", validate_budget_total),
    ("adjustment_unit", validate_adjustment_unit),
    ("position_limits", validate_position_limits),
    ("sector_concentration", validate_sector_concentration),
    ("min_position", validate_min_position),
    ("core_satellite_ratio", validate_core_satellite_ratio),
    ("core_internal_ratio", validate_core_internal_ratio),
    ("anchoring", validate_anchoring),
];

/// Validate a proposed allocation.
pub fn validate_allocation(request: &AllocationRequest<'_>) -> Verdict {
    let synthesizer = Synthesizer::new();

    let Some(budget) = request.settings.budget() else {
        tracing::debug!(budget = %request.settings.budget_krw, "Budget not positive, skipping allocation rules");
        return synthesizer.synthesize_errors("allocation", vec![budget_positive(&request.settings.budget_krw)]);
    };

    let mut errors = Vec::new();
    for (name, rule) in RULES {
        let found = rule(request, budget);
        if !found.is_empty() {
            tracing::debug!(rule = *name, count = found.len(), "Allocation rule violated");
        }
        errors.extend(found);
    }

    synthesizer.synthesize_errors("allocation", errors)
}

fn budget_positive(raw: &Value) -> Violation {
    let actual = if raw.is_null() { json!(0) } else { raw.clone() };
    Violation::builder("budget_positive")
        .detail(format!(
            "budget_krw must be a positive number, got {}",
            super::display_value(&actual)
        ))
        .expected("> 0")
        .actual(actual)
        .build()
}

/// The three confidence pools must sum to exactly 100%.
pub fn validate_confidence_pool(request: &AllocationRequest<'_>, _budget: f64) -> Vec<Violation> {
    let total = request.settings.sizing.total_pct();
    if total != 100.0 {
        return vec![Violation::builder("confidence_pool_total")
            .detail(format!(
                "Confidence pools sum to {}%, must equal 100%",
                format_number(total)
            ))
            .expected(100)
            .actual(number(total))
            .build()];
    }
    Vec::new()
}

/// Every allocated symbol must be on the watchlist.
pub fn validate_watchlist_membership(request: &AllocationRequest<'_>, _budget: f64) -> Vec<Violation> {
    request
        .allocation
        .keys()
        .filter(|symbol| !request.watchlist.contains(symbol))
        .map(|symbol| {
            Violation::builder("watchlist_membership")
                .detail(format!("{}: not found in watchlist", symbol))
                .expected("symbol in watchlist")
                .actual(symbol.as_str())
                .build()
        })
        .collect()
}

/// The allocation must spend the budget exactly.
pub fn validate_budget_total(request: &AllocationRequest<'_>, budget: f64) -> Vec<Violation> {
    let total = request.total_amount() as f64;
    if total == budget {
        return Vec::new();
    }

    let direction = if total > budget { "exceeds" } else { "below" };
    vec![Violation::builder("budget_total")
        .detail(format!(
            "Total {} budget by {}",
            direction,
            format_number((total - budget).abs())
        ))
        .expected(number(budget))
        .actual(number(total))
        .build()]
}

/// Every amount must be a whole multiple of the adjustment unit.
pub fn validate_adjustment_unit(request: &AllocationRequest<'_>, _budget: f64) -> Vec<Violation> {
    let unit = request.settings.adjustment_unit_krw;
    if unit <= 0 {
        tracing::warn!(unit, "Non-positive adjustment unit, skipping adjustment_unit rule");
        return Vec::new();
    }

    request
        .allocation
        .iter()
        .filter(|(_, pos)| pos.amount % unit != 0)
        .map(|(symbol, pos)| {
            Violation::builder("adjustment_unit")
                .detail(format!("{}: {} is not a multiple of {}", symbol, pos.amount, unit))
                .expected(format!("multiple of {}", unit))
                .actual(pos.amount)
                .build()
        })
        .collect()
}

/// No single stock or ETF may exceed its type's share of the budget.
pub fn validate_position_limits(request: &AllocationRequest<'_>, budget: f64) -> Vec<Violation> {
    let risk = &request.settings.risk_tolerance;
    let max_stock = risk.max_single_stock_pct / 100.0;
    let max_etf = risk.max_single_etf_pct / 100.0;

    let mut errors = Vec::new();
    for (symbol, pos) in request.allocation {
        let pct = pos.amount as f64 / budget;
        let Some(entry) = request.watchlist.get(symbol) else {
            continue;
        };

        let (rule, label, limit) = match entry.asset_type {
            AssetType::Stock => ("single_stock_limit", "stock", max_stock),
            AssetType::Etf => ("single_etf_limit", "ETF", max_etf),
        };

        if pct > limit {
            errors.push(
                Violation::builder(rule)
                    .detail(format!(
                        "{}: {} position {} exceeds {} limit",
                        symbol,
                        label,
                        percent(pct),
                        whole_percent(limit)
                    ))
                    .expected(format!("<= {}", whole_percent(limit)))
                    .actual(percent(pct))
                    .build(),
            );
        }
    }
    errors
}

/// No watchlist sector may exceed the concentration cap.
///
/// Symbols missing from the watchlist share one `unknown` bucket.
pub fn validate_sector_concentration(request: &AllocationRequest<'_>, budget: f64) -> Vec<Violation> {
    let max_pct = request.settings.risk_tolerance.max_sector_concentration_pct / 100.0;

    let mut sector_totals: BTreeMap<&str, i64> = BTreeMap::new();
    for (symbol, pos) in request.allocation {
        let sector = request
            .watchlist
            .get(symbol)
            .map(|e| e.sector.as_str())
            .unwrap_or("unknown");
        let total = sector_totals.entry(sector).or_insert(0);
        *total = total.saturating_add(pos.amount);
    }

    sector_totals
        .into_iter()
        .filter_map(|(sector, total)| {
            let pct = total as f64 / budget;
            (pct > max_pct).then(|| {
                Violation::builder("sector_concentration")
                    .detail(format!(
                        "{}: sector concentration {} exceeds {} limit",
                        sector,
                        percent(pct),
                        whole_percent(max_pct)
                    ))
                    .expected(format!("<= {}", whole_percent(max_pct)))
                    .actual(percent(pct))
                    .build()
            })
        })
        .collect()
}

/// Every position must reach the minimum size.
pub fn validate_min_position(request: &AllocationRequest<'_>, _budget: f64) -> Vec<Violation> {
    let min_size = request.settings.risk_tolerance.min_position_size_krw;

    request
        .allocation
        .iter()
        .filter(|(_, pos)| pos.amount < min_size)
        .map(|(symbol, pos)| {
            Violation::builder("min_position")
                .detail(format!("{}: position {} below minimum {}", symbol, pos.amount, min_size))
                .expected(format!(">= {}", min_size))
                .actual(pos.amount)
                .build()
        })
        .collect()
}

/// The core share must sit within ±5pp of the strategy target.
pub fn validate_core_satellite_ratio(request: &AllocationRequest<'_>, budget: f64) -> Vec<Violation> {
    let target = request.settings.strategy.core_pct / 100.0;
    let core_total: i64 = request
        .allocation
        .values()
        .filter(|p| p.role == Role::Core)
        .fold(0i64, |total, p| total.saturating_add(p.amount));
    let core_pct = core_total as f64 / budget;

    if (core_pct - target).abs() <= RATIO_TOLERANCE + FLOAT_EPSILON {
        return Vec::new();
    }

    let lower = (target - RATIO_TOLERANCE) * 100.0;
    let upper = (target + RATIO_TOLERANCE) * 100.0;
    let range = format!("{:.0}–{:.0}%", lower, upper);
    vec![Violation::builder("core_satellite_ratio")
        .detail(format!("Core ratio {} outside {} range", percent(core_pct), range))
        .expected(range)
        .actual(percent(core_pct))
        .build()]
}

/// Core symbols with configured weights must keep their relative ratio.
///
/// Weights are normalized over the configured symbols that are actually held
/// as core; fewer than two such symbols means there is no ratio to check.
pub fn validate_core_internal_ratio(request: &AllocationRequest<'_>, _budget: f64) -> Vec<Violation> {
    let Some(ratio_map) = request.settings.strategy.core_internal_ratio.as_ref() else {
        return Vec::new();
    };

    let core_positions: BTreeMap<&str, i64> = request
        .allocation
        .iter()
        .filter(|(_, p)| p.role == Role::Core)
        .map(|(symbol, p)| (symbol.as_str(), p.amount))
        .collect();

    let relevant: Vec<&str> = ratio_map
        .keys()
        .map(String::as_str)
        .filter(|symbol| core_positions.contains_key(symbol))
        .collect();
    if relevant.len() < 2 {
        return Vec::new();
    }

    let total_weight: f64 = relevant.iter().map(|s| ratio_map[*s]).sum();
    let core_total = core_positions
        .values()
        .fold(0i64, |total, amount| total.saturating_add(*amount));
    if total_weight <= 0.0 || core_total == 0 {
        return Vec::new();
    }

    let mut errors = Vec::new();
    for symbol in relevant {
        let expected_pct = ratio_map[symbol] / total_weight;
        let actual_pct = core_positions[symbol] as f64 / core_total as f64;

        if (actual_pct - expected_pct).abs() > RATIO_TOLERANCE + FLOAT_EPSILON {
            errors.push(
                Violation::builder("core_internal_ratio")
                    .detail(format!(
                        "{}: core internal ratio {} vs expected {} (±5%p tolerance)",
                        symbol,
                        percent(actual_pct),
                        whole_percent(expected_pct)
                    ))
                    .expected(whole_percent(expected_pct))
                    .actual(percent(actual_pct))
                    .build(),
            );
        }
    }
    errors
}

/// Period-over-period changes must stay within the cadence's caps.
///
/// Current holdings win over the previous proposal; with neither, the rule
/// is skipped.
pub fn validate_anchoring(request: &AllocationRequest<'_>, _budget: f64) -> Vec<Violation> {
    let Some(reference) = request.current_holdings.or(request.previous) else {
        return Vec::new();
    };

    let review = request.review_type;
    let max_per = request.settings.anchoring.max_change_per_position(review);
    let max_total = request.settings.anchoring.max_total_change(review);

    let symbols: BTreeSet<&str> = request
        .allocation
        .keys()
        .chain(reference.keys())
        .map(String::as_str)
        .collect();

    let mut errors = Vec::new();
    let mut total_change: i64 = 0;

    for symbol in symbols {
        let old_amount = reference.get(symbol).map(|p| p.amount).unwrap_or(0);
        let new_amount = request.allocation.get(symbol).map(|p| p.amount).unwrap_or(0);
        let change = new_amount.saturating_sub(old_amount).saturating_abs();
        total_change = total_change.saturating_add(change);

        if change > max_per {
            errors.push(
                Violation::builder(format!("anchoring_per_position_{}", review))
                    .detail(format!(
                        "{}: change {} exceeds {} per-position limit {}",
                        symbol, change, review, max_per
                    ))
                    .expected(format!("<= {}", max_per))
                    .actual(change)
                    .build(),
            );
        }
    }

    if total_change > max_total {
        errors.push(
            Violation::builder(format!("anchoring_total_{}", review))
                .detail(format!(
                    "Total change {} exceeds {} limit {}",
                    total_change, review, max_total
                ))
                .expected(format!("<= {}", max_total))
                .actual(total_change)
                .build(),
        );
    }

    errors
}

/// `0.32` → `"32.0%"`.
fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// `0.3` → `"30%"`.
fn whole_percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

/// Integral values render without a fractional part.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::WatchlistEntry;
    use crate::types::Market;
    use proptest::prelude::*;

    fn settings() -> Settings {
        Settings::from_json(
            r#"{
                "budget_krw": 5000000,
                "adjustment_unit_krw": 100000,
                "strategy": {
                    "core_pct": 70,
                    "satellite_pct": 30,
                    "core_internal_ratio": {"QQQ": 2, "069500": 1}
                },
                "sizing": {
                    "high_confidence_pool_pct": 50,
                    "medium_confidence_pool_pct": 35,
                    "low_confidence_pool_pct": 15
                },
                "risk_tolerance": {
                    "max_single_stock_pct": 30,
                    "max_single_etf_pct": 50,
                    "max_sector_concentration_pct": 60,
                    "min_position_size_krw": 100000
                },
                "anchoring": {
                    "monthly_max_change_per_position_krw": 200000,
                    "monthly_max_total_change_krw": 500000,
                    "quarterly_max_change_per_position_krw": 400000,
                    "quarterly_max_total_change_krw": 1500000
                }
            }"#,
        )
        .unwrap()
    }

    fn entry(symbol: &str, asset_type: AssetType, sector: &str, market: Market) -> WatchlistEntry {
        WatchlistEntry {
            symbol: symbol.to_string(),
            name: None,
            asset_type,
            sector: sector.to_string(),
            market,
        }
    }

    fn watchlist() -> Watchlist {
        Watchlist::new(vec![
            entry("ASML", AssetType::Stock, "semiconductor", Market::US),
            entry("META", AssetType::Stock, "big-tech", Market::US),
            entry("NVDA", AssetType::Stock, "semiconductor", Market::US),
            entry("QQQ", AssetType::Etf, "us-broad-market", Market::US),
            entry("069500", AssetType::Etf, "kr-broad-market", Market::KR),
        ])
    }

    fn pos(amount: i64, role: Role, confidence: Confidence) -> Position {
        Position {
            amount,
            role,
            confidence,
        }
    }

    fn valid_allocation() -> Allocation {
        BTreeMap::from([
            ("QQQ".to_string(), pos(2_300_000, Role::Core, Confidence::High)),
            ("069500".to_string(), pos(1_200_000, Role::Core, Confidence::Medium)),
            ("NVDA".to_string(), pos(600_000, Role::Satellite, Confidence::Medium)),
            ("ASML".to_string(), pos(500_000, Role::Satellite, Confidence::Medium)),
            ("META".to_string(), pos(400_000, Role::Satellite, Confidence::Low)),
        ])
    }

    fn anchor(amounts: &[(&str, i64)]) -> AnchorReference {
        amounts
            .iter()
            .map(|(s, a)| (s.to_string(), AnchorPosition { amount: *a }))
            .collect()
    }

    fn rules(verdict: &Verdict) -> Vec<&str> {
        verdict.error_rules()
    }

    #[test]
    fn test_reference_allocation_passes() {
        let (allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        let verdict = validate_allocation(&AllocationRequest::new(&allocation, &watchlist, &settings));

        assert!(verdict.is_pass(), "unexpected errors: {:?}", verdict.errors);
        assert_eq!(serde_json::to_string(&verdict).unwrap(), r#"{"status":"PASS"}"#);
    }

    #[test]
    fn test_raised_stock_breaks_budget_and_stock_limit() {
        let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        allocation.get_mut("NVDA").unwrap().amount = 1_600_000;

        let verdict = validate_allocation(&AllocationRequest::new(&allocation, &watchlist, &settings));

        assert!(verdict.is_fail());
        let found = rules(&verdict);
        assert!(found.contains(&"budget_total"));
        assert!(found.contains(&"single_stock_limit"));

        let stock = verdict.errors.iter().find(|e| e.rule == "single_stock_limit").unwrap();
        assert!(stock.detail.starts_with("NVDA:"));
        assert_eq!(stock.actual, Some(json!("32.0%")));
    }

    #[test]
    fn test_non_positive_budget_short_circuits() {
        let (allocation, watchlist, mut settings) = (valid_allocation(), watchlist(), settings());
        settings.budget_krw = json!(0);
        settings.sizing.low_confidence_pool_pct = 99.0;

        let verdict = validate_allocation(&AllocationRequest::new(&allocation, &watchlist, &settings));

        assert_eq!(rules(&verdict), vec!["budget_positive"]);
        assert_eq!(verdict.errors[0].actual, Some(json!(0)));
    }

    #[test]
    fn test_missing_budget_reports_zero() {
        let (allocation, watchlist, mut settings) = (valid_allocation(), watchlist(), settings());
        settings.budget_krw = Value::Null;

        let verdict = validate_allocation(&AllocationRequest::new(&allocation, &watchlist, &settings));
        assert_eq!(rules(&verdict), vec!["budget_positive"]);
        assert!(verdict.errors[0].detail.ends_with("got 0"));
    }

    #[test]
    fn test_string_budget_is_not_positive() {
        let (allocation, watchlist, mut settings) = (valid_allocation(), watchlist(), settings());
        settings.budget_krw = json!("5000000");

        let verdict = validate_allocation(&AllocationRequest::new(&allocation, &watchlist, &settings));
        assert_eq!(rules(&verdict), vec!["budget_positive"]);
    }

    #[test]
    fn test_confidence_pool_must_total_100() {
        let (allocation, watchlist, mut settings) = (valid_allocation(), watchlist(), settings());
        settings.sizing.low_confidence_pool_pct = 20.0;

        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        let errors = validate_confidence_pool(&request, 5_000_000.0);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].actual, Some(json!(105)));
        assert_eq!(errors[0].detail, "Confidence pools sum to 105%, must equal 100%");
    }

    #[test]
    fn test_unknown_symbol_outside_watchlist() {
        let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        allocation.get_mut("META").unwrap().amount = 300_000;
        allocation.insert("TSLA".to_string(), pos(100_000, Role::Satellite, Confidence::Low));

        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        let errors = validate_watchlist_membership(&request, 5_000_000.0);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].detail, "TSLA: not found in watchlist");
    }

    #[test]
    fn test_budget_total_below() {
        let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        allocation.get_mut("META").unwrap().amount = 300_000;

        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        let errors = validate_budget_total(&request, 5_000_000.0);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].detail, "Total below budget by 100000");
        assert_eq!(errors[0].expected, Some(json!(5_000_000)));
        assert_eq!(errors[0].actual, Some(json!(4_900_000)));
    }

    #[test]
    fn test_adjustment_unit_violation() {
        let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        allocation.get_mut("META").unwrap().amount = 450_000;

        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        let errors = validate_adjustment_unit(&request, 5_000_000.0);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].detail, "META: 450000 is not a multiple of 100000");
    }

    #[test]
    fn test_stock_at_exact_cap_passes_and_one_unit_over_fails() {
        let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        allocation.get_mut("NVDA").unwrap().amount = 1_500_000;
        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        assert!(validate_position_limits(&request, 5_000_000.0).is_empty());

        allocation.get_mut("NVDA").unwrap().amount = 1_500_001;
        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        let errors = validate_position_limits(&request, 5_000_000.0);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, "single_stock_limit");
    }

    #[test]
    fn test_etf_limit_uses_etf_cap() {
        let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        allocation.get_mut("QQQ").unwrap().amount = 2_500_000;
        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        assert!(validate_position_limits(&request, 5_000_000.0).is_empty());

        allocation.get_mut("QQQ").unwrap().amount = 2_600_000;
        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        let errors = validate_position_limits(&request, 5_000_000.0);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, "single_etf_limit");
        assert_eq!(errors[0].expected, Some(json!("<= 50%")));
    }

    #[test]
    fn test_sector_at_cap_passes_and_over_fails() {
        let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        allocation.get_mut("NVDA").unwrap().amount = 1_500_000;
        allocation.get_mut("ASML").unwrap().amount = 1_500_000;
        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        assert!(validate_sector_concentration(&request, 5_000_000.0).is_empty());

        allocation.get_mut("ASML").unwrap().amount = 1_600_000;
        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        let errors = validate_sector_concentration(&request, 5_000_000.0);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].detail.starts_with("semiconductor:"));
        assert_eq!(errors[0].actual, Some(json!("62.0%")));
    }

    #[test]
    fn test_unmapped_symbols_share_unknown_sector() {
        let (watchlist, settings) = (watchlist(), settings());
        let allocation = BTreeMap::from([
            ("AAA".to_string(), pos(1_600_000, Role::Satellite, Confidence::Low)),
            ("BBB".to_string(), pos(1_600_000, Role::Satellite, Confidence::Low)),
        ]);
        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        let errors = validate_sector_concentration(&request, 5_000_000.0);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].detail.starts_with("unknown:"));
    }

    #[test]
    fn test_min_position() {
        let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        allocation.get_mut("META").unwrap().amount = 0;

        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        let errors = validate_min_position(&request, 5_000_000.0);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].detail, "META: position 0 below minimum 100000");
    }

    #[test]
    fn test_core_ratio_boundaries() {
        let (watchlist, settings) = (watchlist(), settings());

        let split = |core: i64| -> Allocation {
            BTreeMap::from([
                ("QQQ".to_string(), pos(core, Role::Core, Confidence::High)),
                ("NVDA".to_string(), pos(5_000_000 - core, Role::Satellite, Confidence::Medium)),
            ])
        };

        for core in [3_250_000, 3_500_000, 3_750_000] {
            let allocation = split(core);
            let request = AllocationRequest::new(&allocation, &watchlist, &settings);
            assert!(
                validate_core_satellite_ratio(&request, 5_000_000.0).is_empty(),
                "core {} should pass",
                core
            );
        }

        for core in [3_249_999, 3_750_001] {
            let allocation = split(core);
            let request = AllocationRequest::new(&allocation, &watchlist, &settings);
            let errors = validate_core_satellite_ratio(&request, 5_000_000.0);
            assert_eq!(errors.len(), 1, "core {} should fail", core);
            assert_eq!(errors[0].expected, Some(json!("65–75%")));
        }
    }

    #[test]
    fn test_core_internal_ratio_flags_skewed_core() {
        let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        allocation.get_mut("QQQ").unwrap().amount = 1_700_000;
        allocation.get_mut("069500").unwrap().amount = 1_800_000;

        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        let errors = validate_core_internal_ratio(&request, 5_000_000.0);

        assert_eq!(errors.len(), 2);
        assert!(errors[0].detail.starts_with("069500:"));
        assert!(errors[1].detail.starts_with("QQQ:"));
        assert_eq!(errors[1].expected, Some(json!("67%")));
    }

    #[test]
    fn test_core_internal_ratio_needs_two_configured_core_symbols() {
        let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        allocation.get_mut("069500").unwrap().role = Role::Satellite;
        allocation.get_mut("QQQ").unwrap().amount = 100_000;

        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        assert!(validate_core_internal_ratio(&request, 5_000_000.0).is_empty());
    }

    #[test]
    fn test_core_internal_ratio_unconfigured() {
        let (allocation, watchlist, mut settings) = (valid_allocation(), watchlist(), settings());
        settings.strategy.core_internal_ratio = None;

        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        assert!(validate_core_internal_ratio(&request, 5_000_000.0).is_empty());
    }

    #[test]
    fn test_anchoring_skipped_without_reference() {
        let (allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        let request = AllocationRequest::new(&allocation, &watchlist, &settings);
        assert!(validate_anchoring(&request, 5_000_000.0).is_empty());
    }

    #[test]
    fn test_anchoring_monthly_limits() {
        let (allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        let previous = anchor(&[
            ("QQQ", 2_000_000),
            ("069500", 1_200_000),
            ("NVDA", 600_000),
            ("ASML", 500_000),
            ("TSLA", 100_000),
        ]);

        let request = AllocationRequest::new(&allocation, &watchlist, &settings).with_previous(&previous);
        let errors = validate_anchoring(&request, 5_000_000.0);

        let found: Vec<&str> = errors.iter().map(|e| e.rule.as_str()).collect();
        assert_eq!(
            found,
            vec![
                "anchoring_per_position_monthly",
                "anchoring_per_position_monthly",
                "anchoring_total_monthly"
            ]
        );
        assert!(errors[0].detail.starts_with("META:"));
        assert!(errors[1].detail.starts_with("QQQ:"));
        assert_eq!(errors[2].actual, Some(json!(800_000)));
    }

    #[test]
    fn test_anchoring_quarterly_caps_are_wider() {
        let (allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        let previous = anchor(&[
            ("QQQ", 2_000_000),
            ("069500", 1_200_000),
            ("NVDA", 600_000),
            ("ASML", 500_000),
            ("TSLA", 100_000),
        ]);

        let request = AllocationRequest::new(&allocation, &watchlist, &settings)
            .with_previous(&previous)
            .with_review_type(ReviewType::Quarterly);
        assert!(validate_anchoring(&request, 5_000_000.0).is_empty());
    }

    #[test]
    fn test_extreme_amounts_saturate() {
        let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        allocation.get_mut("QQQ").unwrap().amount = i64::MAX;
        allocation.get_mut("NVDA").unwrap().amount = i64::MAX;
        let previous = anchor(&[("QQQ", i64::MIN), ("META", i64::MIN)]);

        let request = AllocationRequest::new(&allocation, &watchlist, &settings).with_previous(&previous);
        let verdict = validate_allocation(&request);

        assert!(verdict.is_fail());
        assert!(rules(&verdict).contains(&"budget_total"));
        let total = verdict
            .errors
            .iter()
            .find(|e| e.rule == "anchoring_total_monthly")
            .unwrap();
        assert_eq!(total.actual, Some(json!(i64::MAX)));
    }

    #[test]
    fn test_current_holdings_take_priority_over_previous() {
        let (allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        let previous = anchor(&[("QQQ", 0)]);
        let holdings = anchor(&[
            ("QQQ", 2_300_000),
            ("069500", 1_200_000),
            ("NVDA", 600_000),
            ("ASML", 500_000),
            ("META", 400_000),
        ]);

        let request = AllocationRequest::new(&allocation, &watchlist, &settings)
            .with_previous(&previous)
            .with_current_holdings(&holdings);
        assert!(validate_anchoring(&request, 5_000_000.0).is_empty());
    }

    #[test]
    fn test_rule_order_is_fixed() {
        let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
        allocation.insert("TSLA".to_string(), pos(50_000, Role::Satellite, Confidence::Low));

        let verdict = validate_allocation(&AllocationRequest::new(&allocation, &watchlist, &settings));
        assert_eq!(
            rules(&verdict),
            vec!["watchlist_membership", "budget_total", "adjustment_unit", "min_position"]
        );
    }

    proptest! {
        #[test]
        fn prop_any_budget_deviation_fails_with_direction(delta in 1i64..2_000_000, over in any::<bool>()) {
            let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
            let signed = if over { delta } else { -delta };
            allocation.get_mut("QQQ").unwrap().amount += signed;

            let request = AllocationRequest::new(&allocation, &watchlist, &settings);
            let errors = validate_budget_total(&request, 5_000_000.0);

            prop_assert_eq!(errors.len(), 1);
            let expected = format!(
                "Total {} budget by {}",
                if over { "exceeds" } else { "below" },
                delta
            );
            prop_assert_eq!(&errors[0].detail, &expected);
        }

        #[test]
        fn prop_validation_is_idempotent(nvda in 0i64..3_000_000, meta in 0i64..3_000_000) {
            let (mut allocation, watchlist, settings) = (valid_allocation(), watchlist(), settings());
            allocation.get_mut("NVDA").unwrap().amount = nvda;
            allocation.get_mut("META").unwrap().amount = meta;

            let request = AllocationRequest::new(&allocation, &watchlist, &settings);
            prop_assert_eq!(validate_allocation(&request), validate_allocation(&request));
        }
    }
}
