//! # folio-core
//!
//! Deterministic rule engines for portfolio workflow artifacts.
//!
//! This crate answers, for each artifact a portfolio workflow produces:
//! - Does this allocation respect the budget, caps and anchoring limits?
//! - Are these holdings well-formed and fresh?
//! - Is this analysis report complete, evidenced and attributed?
//! - Did the research pass cover every thesis with sourced findings?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **Pure**: Engines never touch the filesystem or mutate their inputs
//! 3. **Traceable**: Every violation cites a rule ID and a human-readable detail
//! 4. **Exhaustive**: All rules run; violations are collected, not thrown
//!
//! ## Example
//!
//! ```rust,ignore
//! use folio_core::{validate_allocation, AllocationRequest, Settings, Watchlist};
//!
//! let settings = Settings::from_file("config/settings.json")?;
//! let watchlist = Watchlist::from_file("config/watchlist.json")?;
//! let allocation = serde_json::from_str(&proposal_json)?;
//!
//! let verdict = validate_allocation(&AllocationRequest::new(&allocation, &watchlist, &settings));
//! match verdict.status {
//!     Status::Pass => println!("OK"),
//!     _ => for v in &verdict.errors { println!("{}: {}", v.rule, v.detail) },
//! }
//! ```

pub mod engines;
pub mod reference;
pub mod synthesizer;
pub mod types;
pub mod violation;

// Re-export main types at crate root
pub use engines::allocation::{
    validate_allocation, Allocation, AllocationRequest, AnchorPosition, AnchorReference, Position,
};
pub use engines::holdings::{validate_holdings, DEFAULT_STALENESS_THRESHOLD_DAYS};
pub use engines::report::{extract_sections, validate_report, Section, Sections};
pub use engines::research::{parse_thesis_names, validate_research};
pub use reference::{
    parse_reference_date, read_json_document, ConfigError, Settings, ThesisCatalog, Watchlist,
    WatchlistEntry,
};
pub use synthesizer::Synthesizer;
pub use types::{
    AssetType, ClosedSet, Confidence, Currency, Market, ReviewType, Role, Status, Verdict,
};
pub use violation::{Violation, ViolationBuilder};
