//! Rule violations.
//!
//! Every broken rule is recorded as data, never raised. A violation carries
//! the rule identifier plus enough detail (offending symbol, value, line) to
//! act on it without re-deriving context.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single broken rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    /// Rule identifier (e.g. "budget_total", "stale_holdings")
    pub rule: String,

    /// Human-readable explanation
    pub detail: String,

    /// What the rule required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,

    /// What the document contained
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,

    /// 1-based line number, for line-oriented documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Violation {
    pub fn new(rule: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            detail: detail.into(),
            expected: None,
            actual: None,
            line: None,
        }
    }

    /// Start a fluent builder for a violation of `rule`.
    pub fn builder(rule: impl Into<String>) -> ViolationBuilder {
        ViolationBuilder::new(rule)
    }

    /// Create a violation anchored to a document line.
    pub fn at_line(rule: impl Into<String>, detail: impl Into<String>, line: usize) -> Self {
        Self {
            line: Some(line),
            ..Self::new(rule, detail)
        }
    }
}

/// Builder for violations that report an expected/actual pair.
pub struct ViolationBuilder {
    rule: String,
    detail: String,
    expected: Option<Value>,
    actual: Option<Value>,
    line: Option<usize>,
}

impl ViolationBuilder {
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            detail: String::new(),
            expected: None,
            actual: None,
            line: None,
        }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn expected(mut self, expected: impl Into<Value>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn actual(mut self, actual: impl Into<Value>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    pub fn build(self) -> Violation {
        Violation {
            rule: self.rule,
            detail: self.detail,
            expected: self.expected,
            actual: self.actual,
            line: self.line,
        }
    }
}
