//! Holdings Validator
//!
//! **Question**: Is the record of owned positions well-formed, consistent with
//! the watchlist and recent enough to act on?
//!
//! Holdings are a free-form JSON document, so every field is checked on the
//! raw value. Structural and numeric problems are errors; an unknown symbol
//! or an old `as_of` date only warns.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::{allowed_list, display_value, json_type_name, parse_iso_date};
use crate::reference::Watchlist;
use crate::synthesizer::Synthesizer;
use crate::types::{ClosedSet, Currency, Verdict};
use crate::violation::Violation;

/// Days after `as_of` before holdings are considered stale.
pub const DEFAULT_STALENESS_THRESHOLD_DAYS: i64 = 30;

/// Fields every position must carry.
const REQUIRED_POSITION_FIELDS: &[&str] = &["avg_cost", "currency", "quantity"];

/// Position entries in sorted symbol order.
fn sorted_positions(positions: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<(&String, &Value)> = positions.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

/// Field-level checks for every position.
pub fn validate_positions(positions: &Map<String, Value>) -> Vec<Violation> {
    let mut errors = Vec::new();

    for (symbol, position) in sorted_positions(positions) {
        let Some(fields) = position.as_object() else {
            errors.push(Violation::new(
                "position_type",
                format!(
                    "{}: position must be an object, got {}",
                    symbol,
                    json_type_name(position)
                ),
            ));
            continue;
        };

        let missing: Vec<&str> = REQUIRED_POSITION_FIELDS
            .iter()
            .copied()
            .filter(|field| !fields.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            errors.push(Violation::new(
                "missing_field",
                format!("{}: missing required fields: {}", symbol, allowed_list(&missing)),
            ));
            continue;
        }

        let quantity = &fields["quantity"];
        match quantity.as_f64() {
            None => errors.push(Violation::new(
                "quantity_numeric",
                format!(
                    "{}: quantity must be numeric, got {}",
                    symbol,
                    json_type_name(quantity)
                ),
            )),
            Some(q) if q < 0.0 => errors.push(
                Violation::builder("quantity_non_negative")
                    .detail(format!(
                        "{}: quantity must be >= 0, got {}",
                        symbol,
                        display_value(quantity)
                    ))
                    .actual(quantity.clone())
                    .build(),
            ),
            Some(_) => {}
        }

        let avg_cost = &fields["avg_cost"];
        match avg_cost.as_f64() {
            None => errors.push(Violation::new(
                "avg_cost_numeric",
                format!(
                    "{}: avg_cost must be numeric, got {}",
                    symbol,
                    json_type_name(avg_cost)
                ),
            )),
            Some(c) if c <= 0.0 => errors.push(
                Violation::builder("avg_cost_positive")
                    .detail(format!(
                        "{}: avg_cost must be > 0, got {}",
                        symbol,
                        display_value(avg_cost)
                    ))
                    .actual(avg_cost.clone())
                    .build(),
            ),
            Some(_) => {}
        }

        let currency = &fields["currency"];
        if Currency::from_json(currency).is_none() {
            errors.push(Violation::new(
                "currency_enum",
                format!(
                    "{}: currency must be one of {}, got '{}'",
                    symbol,
                    allowed_list(Currency::ALLOWED),
                    display_value(currency)
                ),
            ));
        }
    }

    errors
}

/// Watchlist symbols must be held in their market's currency.
pub fn validate_currency_market_match(
    positions: &Map<String, Value>,
    watchlist: &Watchlist,
) -> Vec<Violation> {
    let mut errors = Vec::new();

    for (symbol, position) in sorted_positions(positions) {
        let Some(entry) = watchlist.get(symbol) else {
            continue;
        };
        let Some(expected) = entry.market.implied_currency() else {
            continue;
        };

        let actual = position.get("currency").unwrap_or(&Value::Null);
        if actual.as_str() != Some(expected.as_str()) {
            errors.push(
                Violation::builder("currency_market_mismatch")
                    .detail(format!(
                        "{}: market {} requires {}, got {}",
                        symbol,
                        entry.market.as_str(),
                        expected.as_str(),
                        display_value(actual)
                    ))
                    .expected(expected.as_str())
                    .actual(actual.clone())
                    .build(),
            );
        }
    }

    errors
}

/// Warn about held symbols that are not tracked.
pub fn validate_watchlist_cross_ref(
    positions: &Map<String, Value>,
    watchlist: &Watchlist,
) -> Vec<Violation> {
    sorted_positions(positions)
        .into_iter()
        .filter(|(symbol, _)| !watchlist.contains(symbol))
        .map(|(symbol, _)| {
            Violation::new(
                "watchlist_cross_ref",
                format!("{}: not found in watchlist", symbol),
            )
        })
        .collect()
}

/// Warn when `as_of` is malformed or older than the threshold.
///
/// A snapshot exactly `threshold_days` old is still fresh.
pub fn validate_staleness(
    as_of: &Value,
    reference: NaiveDate,
    threshold_days: i64,
) -> Vec<Violation> {
    let Some(date) = parse_iso_date(as_of) else {
        return vec![Violation::new(
            "invalid_as_of_date",
            format!(
                "as_of '{}' is not a valid ISO date (YYYY-MM-DD)",
                display_value(as_of)
            ),
        )];
    };

    let days_old = (reference - date).num_days();
    if days_old <= threshold_days {
        return Vec::new();
    }

    vec![Violation::builder("stale_holdings")
        .detail(format!(
            "as_of ({}) is {} days old (threshold: {})",
            date, days_old, threshold_days
        ))
        .expected(threshold_days)
        .actual(days_old)
        .build()]
}

/// Validate a holdings document.
///
/// Staleness is only checked when a reference date is supplied.
pub fn validate_holdings(
    holdings: &Value,
    watchlist: &Watchlist,
    reference: Option<NaiveDate>,
    threshold_days: i64,
) -> Verdict {
    let synthesizer = Synthesizer::new();

    let as_of = holdings.get("as_of");
    let positions = holdings.get("positions");

    let mut errors = Vec::new();
    if as_of.is_none() {
        errors.push(Violation::new(
            "missing_as_of",
            "holdings must contain 'as_of' field",
        ));
    }
    if positions.is_none() {
        errors.push(Violation::new(
            "missing_positions",
            "holdings must contain 'positions' field",
        ));
    }
    let (Some(as_of), Some(positions)) = (as_of, positions) else {
        tracing::debug!(errors = errors.len(), "Holdings structure incomplete, skipping rules");
        return synthesizer.synthesize_errors("holdings", errors);
    };

    let Some(positions) = positions.as_object() else {
        errors.push(Violation::new(
            "positions_type",
            format!(
                "positions must be an object, got {}",
                json_type_name(positions)
            ),
        ));
        return synthesizer.synthesize_errors("holdings", errors);
    };

    errors.extend(validate_positions(positions));
    errors.extend(validate_currency_market_match(positions, watchlist));

    let mut warnings = validate_watchlist_cross_ref(positions, watchlist);
    match reference {
        Some(reference) => warnings.extend(validate_staleness(as_of, reference, threshold_days)),
        None => tracing::debug!("No reference date, staleness check skipped"),
    }

    synthesizer.synthesize("holdings", errors, warnings)
}
