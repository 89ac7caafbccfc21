use serde::{Deserialize, Serialize};

/// Knobs for the capture parsers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParseOptions {
    /// URL prefixes that mark a frame name as coming from a local dev server.
    /// Matching names are shortened to `name (file)`.
    pub loopback_prefixes: Vec<String>,
    /// A trace-event root is treated as the single dominant root when its
    /// value exceeds this multiple of the runner-up root.
    pub dominance_ratio: f64,
    /// How many functions `ParseStats::top_functions` keeps.
    pub top_functions: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            loopback_prefixes: vec!["http://localhost".to_string()],
            dominance_ratio: 2.0,
            top_functions: 10,
        }
    }
}

/// Knobs for the profile differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiffOptions {
    /// Deltas at or below this magnitude (ms) are floating-point noise.
    pub epsilon_ms: f64,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self { epsilon_ms: 0.01 }
    }
}

/// Top-level configuration, loadable from a (possibly partial) JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub parse: ParseOptions,
    pub diff: DiffOptions,
}

impl Config {
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}
