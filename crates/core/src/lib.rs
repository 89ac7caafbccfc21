//! Normalizes V8 `.cpuprofile` and Hermes trace-event captures into a single
//! function-centric model, builds flame trees from them, and diffs two
//! normalized profiles.
//!
//! ```text
//!   serde_json::Value ─▶ detect_format ─┬─▶ trace_event ─┐
//!                                       └─▶ cpuprofile ──┴─▶ CallTree ─▶ NormalizedProfile
//!   NormalizedProfile × 2 ─▶ diff::compare ─▶ ComparisonResult
//! ```

pub mod config;
pub mod diff;
pub mod model;
pub mod parsers;
pub mod stats;

pub use config::{Config, DiffOptions, ParseOptions};
pub use diff::{compare, compare_with};
pub use parsers::{
    ParseError, detect_format, parse_bytes, parse_bytes_with, parse_value, parse_value_with,
    parse_value_with_stats,
};
pub use stats::{HotFunction, ParseStats};
