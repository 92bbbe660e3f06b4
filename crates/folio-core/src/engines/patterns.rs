//! Shared detection patterns.
//!
//! Heading splitters, confidence labels, evidence and source tags, and the
//! Korean-market disclaimer patterns for the report engine, plus the strict
//! date shape every engine accepts.

use lazy_static::lazy_static;
use regex::Regex;

/// Sections every report must contain (matched by substring).
pub const REQUIRED_SECTIONS: &[&str] = &["요약", "논제별 현황", "배분 제안", "리스크 요인"];

/// Name fragment of the per-thesis status section.
pub const THESIS_SECTION: &str = "논제별 현황";

/// Name fragment of the action directives section.
pub const ACTION_DIRECTIVES_SECTION: &str = "행동 지시";

/// Words that count as counter-argument content when the labeled marker is absent.
pub const COUNTER_KEYWORDS: &[&str] = &["반론", "리스크", "위험", "주의"];

/// Absolute or overconfident phrasing that a report may not use.
pub const FORBIDDEN_EXPRESSIONS: &[&str] = &["확실히", "반드시", "무조건", "틀림없이", "100%"];

/// Minimum distinct evidence categories behind a High-confidence thesis.
pub const MIN_HIGH_CONFIDENCE_CATEGORIES: usize = 2;

lazy_static! {
    /// Start of a Level-3 heading; splits a body into thesis blocks.
    pub static ref H3_SPLIT: Regex = Regex::new(r"(?m)^### ").unwrap();

    /// Labeled counter-argument marker line.
    pub static ref COUNTER_MARKER: Regex = Regex::new(
        r"(?m)^\*\*반론/리스크\*\*:\s*\n"
    ).unwrap();

    /// Confidence label set to High, in English or Korean, optionally bold.
    pub static ref HIGH_CONFIDENCE: Regex = Regex::new(
        r"(?i)\*{0,2}(?:신뢰도|confidence)\*{0,2}\s*[:：]\s*(High|높음)"
    ).unwrap();

    /// Evidence-category tag.
    pub static ref EVIDENCE_TAG: Regex = Regex::new(
        r"\[(추세|모멘텀|변동성|상대강도|외부)\]"
    ).unwrap();

    /// Amounts, percentages and grouped numbers that need attribution.
    pub static ref NUMBER_TOKEN: Regex = Regex::new(
        r"(?i)\d[\d,]*\.?\d*\s*[%원KMB달러]|\d[\d,]*\.?\d*\s*(?:퍼센트|percent)|\d{1,3}(?:,\d{3})+"
    ).unwrap();

    /// Bracketed data-source tag.
    pub static ref SOURCE_TAG: Regex = Regex::new(
        r"\[(summary|psql|user|사용자|config|holdings|research)\]"
    ).unwrap();

    /// Zero-padded `YYYY-MM-DD` with nothing around it.
    pub static ref ISO_DATE: Regex = Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap();

    /// Korean-market instrument mention.
    pub static ref KR_INSTRUMENT: Regex = Regex::new(r"(069500|KODEX)").unwrap();

    /// Data-limitation disclaimers for Korean-market price data.
    pub static ref KR_DISCLAIMERS: Vec<Regex> = vec![
        Regex::new(r"수정주가").unwrap(),
        Regex::new(r"adj_close").unwrap(),
        Regex::new(r"배당.*미반영").unwrap(),
        Regex::new(r"분배금.*미반영").unwrap(),
    ];
}

/// Check if a line carries a numeric, currency or percentage token.
pub fn contains_number(line: &str) -> bool {
    NUMBER_TOKEN.is_match(line)
}

/// Check if a line carries a recognized source tag.
pub fn contains_source_tag(line: &str) -> bool {
    SOURCE_TAG.is_match(line)
}

/// Check if a document mentions a Korean-market instrument.
pub fn mentions_kr_instrument(content: &str) -> bool {
    KR_INSTRUMENT.is_match(content)
}

/// Check if a document carries any Korean data-limitation disclaimer.
pub fn contains_kr_disclaimer(content: &str) -> bool {
    KR_DISCLAIMERS.iter().any(|p| p.is_match(content))
}
