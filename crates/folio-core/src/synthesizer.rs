//! Synthesizer: Aggregates collected violations into a verdict.
//!
//! The synthesizer applies strict, non-configurable precedence:
//! 1. If ANY error was collected → FAIL
//! 2. Else if ANY warning was collected → WARN
//! 3. Else → PASS

use crate::types::{Status, Verdict};
use crate::violation::Violation;

/// The Synthesizer turns engine output into a final verdict.
pub struct Synthesizer;

impl Synthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Synthesize errors and warnings into a verdict.
    ///
    /// # Arguments
    ///
    /// * `engine` - Engine name, used for tracing only
    /// * `errors` - FAIL-tier violations in reporting order
    /// * `warnings` - WARN-tier violations in reporting order
    pub fn synthesize(
        &self,
        engine: &'static str,
        errors: Vec<Violation>,
        warnings: Vec<Violation>,
    ) -> Verdict {
        let status = if !errors.is_empty() {
            Status::Fail
        } else if !warnings.is_empty() {
            Status::Warn
        } else {
            Status::Pass
        };

        tracing::debug!(
            engine,
            status = %status,
            errors = errors.len(),
            warnings = warnings.len(),
            "Validation finished"
        );

        Verdict {
            status,
            errors,
            warnings,
        }
    }

    /// Synthesize a verdict for an engine that has no warning tier.
    pub fn synthesize_errors(&self, engine: &'static str, errors: Vec<Violation>) -> Verdict {
        self.synthesize(engine, errors, Vec::new())
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}
