//! Reference data parsing and validation.
//!
//! Settings and watchlist files are structured data validated against JSON
//! Schema before deserialization. The thesis catalog is read from markdown.

mod parser;
mod schema;

pub use parser::{
    parse_reference_date, read_json_document, Anchoring, ConfigError, RiskTolerance, Settings,
    Sizing, Strategy, ThesisCatalog, Watchlist, WatchlistEntry,
};
pub use schema::{validate_schema, SchemaError, SchemaKind};
