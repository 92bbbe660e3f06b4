//! Research Validator
//!
//! **Question**: Did the research pass re-check every thesis with sourced
//! evidence, and are the proposed candidates new, well-formed and tied to a
//! known thesis?
//!
//! Two artifacts are checked: `thesis-check.json` (per-thesis condition
//! review) and `candidates.json` (new securities to consider). Both are
//! free-form JSON, so every enum-typed field goes through [`ClosedSet`].

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use super::{allowed_list, display_value, is_non_empty_string, json_type_name, parse_iso_date};
use crate::synthesizer::Synthesizer;
use crate::types::{
    AssetType, ClosedSet, ConditionStatus, ConditionType, Market, MarketCapCategory,
    StatusTransition, ThesisStatus, Verdict,
};
use crate::violation::Violation;

/// Days after `checked_at` before a research artifact is considered stale.
pub const STALENESS_THRESHOLD_DAYS: i64 = 7;

/// Accepted source tiers, inclusive.
pub const SOURCE_TIER_RANGE: (i64, i64) = (1, 4);

/// Level-2 headings in `theses.md` that are not theses.
const NON_THESIS_SECTIONS: &[&str] = &["투자 선호도"];

const THESIS_CHECK_LABEL: &str = "thesis-check.json";
const CANDIDATES_LABEL: &str = "candidates.json";

const THESIS_FIELDS: &[&str] = &["name", "status", "conditions"];
const CONDITION_FIELDS: &[&str] = &["text", "type", "status", "evidence", "sources"];
const SOURCE_FIELDS: &[&str] = &["title", "url", "tier", "date"];
const CANDIDATE_FIELDS: &[&str] = &[
    "symbol",
    "name",
    "market",
    "sector",
    "type",
    "related_theses",
    "rationale",
    "risks",
    "market_cap_category",
    "already_in_watchlist",
];

lazy_static! {
    static ref H2_HEADING: Regex = Regex::new(r"(?m)^## (.+)$").unwrap();
}

/// Thesis names from `theses.md`, in document order.
pub fn parse_thesis_names(markdown: &str) -> Vec<String> {
    H2_HEADING
        .captures_iter(markdown)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !NON_THESIS_SECTIONS.contains(&name.as_str()))
        .collect()
}

/// A `checked_at` date must parse and fall within the last week.
pub fn validate_checked_at(value: &Value, label: &str, reference: NaiveDate) -> Vec<Violation> {
    let Some(checked_at) = parse_iso_date(value) else {
        return vec![Violation::new(
            "checked_at_format",
            format!(
                "{}: '{}' is not a valid ISO date (YYYY-MM-DD)",
                label,
                display_value(value)
            ),
        )];
    };

    let days_old = (reference - checked_at).num_days();
    if days_old > STALENESS_THRESHOLD_DAYS {
        return vec![Violation::builder("checked_at_stale")
            .detail(format!(
                "{}: checked_at ({}) is {} days old (threshold: {})",
                label, checked_at, days_old, STALENESS_THRESHOLD_DAYS
            ))
            .expected(STALENESS_THRESHOLD_DAYS)
            .actual(days_old)
            .build()];
    }
    if days_old < 0 {
        return vec![Violation::new(
            "checked_at_future",
            format!("{}: checked_at ({}) is in the future", label, checked_at),
        )];
    }
    Vec::new()
}

/// Report every required field absent from an object.
fn missing_fields(
    object: &Map<String, Value>,
    fields: &[&str],
    rule: &str,
    prefix: &str,
) -> Vec<Violation> {
    fields
        .iter()
        .filter(|field| !object.contains_key(**field))
        .map(|field| {
            Violation::new(rule, format!("{}: missing required field '{}'", prefix, field))
        })
        .collect()
}

/// A required field must be a member of the closed set `T`.
fn check_enum<T: ClosedSet>(
    value: &Value,
    rule: &str,
    prefix: &str,
    field: &str,
) -> Option<Violation> {
    if T::from_json(value).is_some() {
        return None;
    }
    Some(Violation::new(
        rule,
        format!(
            "{}: {} must be one of {}, got '{}'",
            prefix,
            field,
            allowed_list(T::ALLOWED),
            display_value(value)
        ),
    ))
}

/// A present, non-null value must be a member of the closed set `T`.
fn check_optional_enum<T: ClosedSet>(
    value: Option<&Value>,
    rule: &str,
    prefix: &str,
    field: &str,
) -> Option<Violation> {
    let value = value.filter(|v| !v.is_null())?;
    if T::from_json(value).is_some() {
        return None;
    }
    Some(Violation::new(
        rule,
        format!(
            "{}: {} must be one of {} or null, got '{}'",
            prefix,
            field,
            allowed_list(T::ALLOWED),
            display_value(value)
        ),
    ))
}

/// Check `previous_status` / `status_transition` for a thesis or condition.
///
/// `kind` is the rule prefix (`thesis` or `condition`); `S` is the status set
/// the previous status must belong to.
fn validate_transition<S: ClosedSet>(
    entry: &Map<String, Value>,
    kind: &str,
    prefix: &str,
) -> Vec<Violation> {
    let previous = entry.get("previous_status").filter(|v| !v.is_null());
    let transition = entry.get("status_transition").filter(|v| !v.is_null());

    let mut errors = Vec::new();
    errors.extend(check_optional_enum::<S>(
        previous,
        &format!("{}_previous_status_enum", kind),
        prefix,
        "previous_status",
    ));
    errors.extend(check_optional_enum::<StatusTransition>(
        transition,
        &format!("{}_transition_enum", kind),
        prefix,
        "status_transition",
    ));

    let consistency_rule = format!("{}_transition_consistency", kind);
    let is_new = transition.and_then(Value::as_str) == Some("new");
    match (previous, transition) {
        (None, Some(transition)) if !is_new => errors.push(Violation::new(
            consistency_rule,
            format!(
                "{}: previous_status is null but status_transition is '{}' (expected 'new' or null)",
                prefix,
                display_value(transition)
            ),
        )),
        (Some(previous), Some(_)) if is_new => errors.push(Violation::new(
            consistency_rule,
            format!(
                "{}: previous_status is '{}' but status_transition is 'new' (expected stable/improving/degrading)",
                prefix,
                display_value(previous)
            ),
        )),
        _ => {}
    }
    errors
}

/// Validate one cited source of a condition.
pub fn validate_source(
    source: &Map<String, Value>,
    thesis_name: &str,
    condition_index: usize,
    source_index: usize,
) -> Vec<Violation> {
    let prefix = format!(
        "{}.conditions[{}].sources[{}]",
        thesis_name, condition_index, source_index
    );

    let missing = missing_fields(source, SOURCE_FIELDS, "source_missing_field", &prefix);
    if !missing.is_empty() {
        return missing;
    }

    let mut errors = Vec::new();
    if !is_non_empty_string(&source["title"]) {
        errors.push(Violation::new(
            "source_title_empty",
            format!("{}: title must be a non-empty string", prefix),
        ));
    }
    if !is_non_empty_string(&source["url"]) {
        errors.push(Violation::new(
            "source_url_empty",
            format!("{}: url must be a non-empty string", prefix),
        ));
    }

    let tier = &source["tier"];
    let (low, high) = SOURCE_TIER_RANGE;
    if !tier.as_i64().is_some_and(|t| (low..=high).contains(&t)) {
        errors.push(
            Violation::builder("source_tier_range")
                .detail(format!(
                    "{}: tier must be integer {}-{}, got {}",
                    prefix, low, high, tier
                ))
                .expected(format!("{}-{}", low, high))
                .actual(tier.clone())
                .build(),
        );
    }

    let date = &source["date"];
    match date {
        Value::String(raw) if parse_iso_date(date).is_none() => errors.push(Violation::new(
            "source_date_format",
            format!("{}: date '{}' is not a valid ISO date", prefix, raw),
        )),
        Value::String(_) => {}
        other => errors.push(Violation::new(
            "source_date_format",
            format!(
                "{}: date must be a string, got {}",
                prefix,
                json_type_name(other)
            ),
        )),
    }

    errors
}

/// Validate one condition of a thesis, including its sources.
pub fn validate_condition(
    condition: &Map<String, Value>,
    thesis_name: &str,
    condition_index: usize,
) -> Vec<Violation> {
    let prefix = format!("{}.conditions[{}]", thesis_name, condition_index);

    let missing = missing_fields(condition, CONDITION_FIELDS, "condition_missing_field", &prefix);
    if !missing.is_empty() {
        return missing;
    }

    let mut errors = Vec::new();
    if !is_non_empty_string(&condition["text"]) {
        errors.push(Violation::new(
            "condition_text_empty",
            format!("{}: text must be a non-empty string", prefix),
        ));
    }
    errors.extend(check_enum::<ConditionType>(
        &condition["type"],
        "condition_type_enum",
        &prefix,
        "type",
    ));
    errors.extend(check_enum::<ConditionStatus>(
        &condition["status"],
        "condition_status_enum",
        &prefix,
        "status",
    ));
    if !is_non_empty_string(&condition["evidence"]) {
        errors.push(Violation::new(
            "condition_evidence_empty",
            format!("{}: evidence must be a non-empty string", prefix),
        ));
    }

    match condition["sources"].as_array() {
        Some(sources) if !sources.is_empty() => {
            for (si, source) in sources.iter().enumerate() {
                match source.as_object() {
                    Some(source) => {
                        errors.extend(validate_source(source, thesis_name, condition_index, si))
                    }
                    None => errors.push(Violation::new(
                        "source_type",
                        format!("{}.sources[{}]: source must be an object", prefix, si),
                    )),
                }
            }
        }
        _ => errors.push(Violation::new(
            "condition_sources_empty",
            format!("{}: must have at least one source", prefix),
        )),
    }

    errors.extend(validate_transition::<ConditionStatus>(
        condition,
        "condition",
        &prefix,
    ));
    errors
}

/// Validate one thesis entry and its conditions.
pub fn validate_thesis_entry(thesis: &Map<String, Value>) -> Vec<Violation> {
    let mut errors: Vec<Violation> = THESIS_FIELDS
        .iter()
        .filter(|field| !thesis.contains_key(**field))
        .map(|field| {
            Violation::new(
                "thesis_missing_field",
                format!("thesis entry missing required field '{}'", field),
            )
        })
        .collect();
    if !errors.is_empty() {
        return errors;
    }

    let name = match thesis["name"].as_str() {
        Some(name) if !name.trim().is_empty() => name,
        _ => {
            errors.push(Violation::new(
                "thesis_name_empty",
                "thesis name must be a non-empty string",
            ));
            return errors;
        }
    };

    errors.extend(check_enum::<ThesisStatus>(
        &thesis["status"],
        "thesis_status_enum",
        name,
        "status",
    ));
    errors.extend(validate_transition::<ThesisStatus>(thesis, "thesis", name));

    match thesis["conditions"].as_array() {
        Some(conditions) if !conditions.is_empty() => {
            for (ci, condition) in conditions.iter().enumerate() {
                match condition.as_object() {
                    Some(condition) => errors.extend(validate_condition(condition, name, ci)),
                    None => errors.push(Violation::new(
                        "condition_type",
                        format!("{}.conditions[{}]: condition must be an object", name, ci),
                    )),
                }
            }
        }
        _ => errors.push(Violation::new(
            "thesis_conditions_empty",
            format!("{}: must have at least one condition", name),
        )),
    }

    errors
}

/// Validate `thesis-check.json` and its coverage of the thesis catalog.
pub fn validate_thesis_check(
    thesis_check: &Value,
    thesis_names: &[String],
    reference: NaiveDate,
) -> Vec<Violation> {
    let mut errors = Vec::new();

    match thesis_check.get("checked_at") {
        Some(checked_at) => {
            errors.extend(validate_checked_at(checked_at, THESIS_CHECK_LABEL, reference))
        }
        None => errors.push(Violation::new(
            "thesis_check_missing_field",
            format!("{}: missing required field 'checked_at'", THESIS_CHECK_LABEL),
        )),
    }

    let Some(theses) = thesis_check.get("theses") else {
        errors.push(Violation::new(
            "thesis_check_missing_field",
            format!("{}: missing required field 'theses'", THESIS_CHECK_LABEL),
        ));
        return errors;
    };
    let Some(theses) = theses.as_array() else {
        errors.push(Violation::new(
            "thesis_check_theses_type",
            format!("{}: 'theses' must be an array", THESIS_CHECK_LABEL),
        ));
        return errors;
    };

    for thesis in theses {
        match thesis.as_object() {
            Some(thesis) => errors.extend(validate_thesis_entry(thesis)),
            None => errors.push(Violation::new(
                "thesis_entry_type",
                format!("{}: each thesis entry must be an object", THESIS_CHECK_LABEL),
            )),
        }
    }

    let checked: HashSet<&str> = theses
        .iter()
        .filter_map(|t| t.get("name").and_then(Value::as_str))
        .collect();
    let expected: BTreeSet<&str> = thesis_names.iter().map(String::as_str).collect();
    for name in expected {
        if !checked.contains(name) {
            errors.push(Violation::new(
                "thesis_completeness",
                format!(
                    "thesis '{}' from theses.md has no entry in {}",
                    name, THESIS_CHECK_LABEL
                ),
            ));
        }
    }

    errors
}

/// Validate one research candidate.
pub fn validate_candidate(
    candidate: &Map<String, Value>,
    index: usize,
    watchlist_symbols: &BTreeSet<String>,
    thesis_names: &[String],
) -> Vec<Violation> {
    let prefix = format!("candidates[{}]", index);

    let missing = missing_fields(candidate, CANDIDATE_FIELDS, "candidate_missing_field", &prefix);
    if !missing.is_empty() {
        return missing;
    }

    let symbol = &candidate["symbol"];
    let label = format!("{} ({})", prefix, display_value(symbol));
    let mut errors = Vec::new();

    if !is_non_empty_string(symbol) {
        errors.push(Violation::new(
            "candidate_symbol_empty",
            format!("{}: symbol must be a non-empty string", prefix),
        ));
    }
    if !is_non_empty_string(&candidate["name"]) {
        errors.push(Violation::new(
            "candidate_name_empty",
            format!("{}: name must be a non-empty string", label),
        ));
    }
    errors.extend(check_enum::<Market>(
        &candidate["market"],
        "candidate_market_enum",
        &label,
        "market",
    ));
    if !is_non_empty_string(&candidate["sector"]) {
        errors.push(Violation::new(
            "candidate_sector_empty",
            format!("{}: sector must be a non-empty string", label),
        ));
    }
    errors.extend(check_enum::<AssetType>(
        &candidate["type"],
        "candidate_type_enum",
        &label,
        "type",
    ));

    match candidate["related_theses"].as_array() {
        Some(related) if !related.is_empty() => {
            for thesis_ref in related {
                match thesis_ref.as_str() {
                    None => errors.push(Violation::new(
                        "candidate_related_thesis_type",
                        format!("{}: related_theses entries must be strings", label),
                    )),
                    Some(name) if !thesis_names.iter().any(|n| n == name) => {
                        errors.push(Violation::new(
                            "candidate_related_thesis_unknown",
                            format!("{}: related thesis '{}' not found in theses.md", label, name),
                        ))
                    }
                    Some(_) => {}
                }
            }
        }
        _ => errors.push(Violation::new(
            "candidate_related_theses_empty",
            format!("{}: related_theses must be a non-empty array", label),
        )),
    }

    if !is_non_empty_string(&candidate["rationale"]) {
        errors.push(Violation::new(
            "candidate_rationale_empty",
            format!("{}: rationale must be a non-empty string", label),
        ));
    }
    if !is_non_empty_string(&candidate["risks"]) {
        errors.push(Violation::new(
            "candidate_risks_empty",
            format!("{}: risks must be a non-empty string", label),
        ));
    }
    errors.extend(check_enum::<MarketCapCategory>(
        &candidate["market_cap_category"],
        "candidate_market_cap_enum",
        &label,
        "market_cap_category",
    ));

    if candidate["already_in_watchlist"] != Value::Bool(false) {
        errors.push(Violation::new(
            "candidate_already_in_watchlist_false",
            format!("{}: already_in_watchlist must be false", label),
        ));
    }
    if symbol.as_str().is_some_and(|s| watchlist_symbols.contains(s)) {
        errors.push(Violation::new(
            "candidate_watchlist_dedup",
            format!("{}: symbol already exists in watchlist.json", label),
        ));
    }

    errors
}

/// Validate `candidates.json`, including duplicate symbols across the list.
pub fn validate_candidates(
    candidates: &Value,
    watchlist_symbols: &BTreeSet<String>,
    thesis_names: &[String],
    reference: NaiveDate,
) -> Vec<Violation> {
    let mut errors = Vec::new();

    match candidates.get("checked_at") {
        Some(checked_at) => {
            errors.extend(validate_checked_at(checked_at, CANDIDATES_LABEL, reference))
        }
        None => errors.push(Violation::new(
            "candidates_missing_field",
            format!("{}: missing required field 'checked_at'", CANDIDATES_LABEL),
        )),
    }

    let Some(list) = candidates.get("candidates") else {
        errors.push(Violation::new(
            "candidates_missing_field",
            format!("{}: missing required field 'candidates'", CANDIDATES_LABEL),
        ));
        return errors;
    };
    let Some(list) = list.as_array() else {
        errors.push(Violation::new(
            "candidates_list_type",
            format!("{}: 'candidates' must be an array", CANDIDATES_LABEL),
        ));
        return errors;
    };

    let mut seen: HashSet<&str> = HashSet::new();
    for (ci, candidate) in list.iter().enumerate() {
        let Some(candidate) = candidate.as_object() else {
            errors.push(Violation::new(
                "candidate_entry_type",
                format!("candidates[{}]: candidate entry must be an object", ci),
            ));
            continue;
        };

        errors.extend(validate_candidate(candidate, ci, watchlist_symbols, thesis_names));

        let symbol = candidate
            .get("symbol")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        if let Some(symbol) = symbol {
            if !seen.insert(symbol) {
                errors.push(Violation::new(
                    "candidate_duplicate_symbol",
                    format!(
                        "candidates[{}] ({}): duplicate symbol in candidates list",
                        ci, symbol
                    ),
                ));
            }
        }
    }

    errors
}

/// Validate both research artifacts.
///
/// Thesis-check violations come first, followed by candidate violations.
pub fn validate_research(
    thesis_check: &Value,
    candidates: &Value,
    thesis_names: &[String],
    watchlist_symbols: &BTreeSet<String>,
    reference: NaiveDate,
) -> Verdict {
    tracing::debug!(
        theses = thesis_names.len(),
        watchlist = watchlist_symbols.len(),
        %reference,
        "Validating research artifacts"
    );

    let mut errors = validate_thesis_check(thesis_check, thesis_names, reference);
    errors.extend(validate_candidates(
        candidates,
        watchlist_symbols,
        thesis_names,
        reference,
    ));

    Synthesizer::new().synthesize_errors("research", errors)
}
