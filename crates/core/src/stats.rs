use std::collections::HashMap;

use profdiff_protocol::{NormalizedProfile, SourceFormat};
use serde::Serialize;

/// A row of the "hottest functions" summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotFunction {
    pub name: String,
    pub self_time_ms: f64,
    pub total_time_ms: f64,
    /// How many records share this name.
    pub count: u32,
}

/// Diagnostics returned next to a parsed profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseStats {
    pub format: SourceFormat,
    pub function_count: usize,
    pub sample_count: usize,
    /// Root candidates before flame-tree pruning.
    pub root_count: usize,
    /// Samples whose frame / node id resolved to nothing.
    pub unresolved_samples: usize,
    /// Parent / child references that were ignored.
    pub dropped_references: usize,
    /// Frames skipped because an earlier frame already used their id.
    pub duplicate_ids: usize,
    /// `endTime - startTime` as reported by the capture, if it carried both.
    pub reported_duration_ms: Option<f64>,
    pub top_functions: Vec<HotFunction>,
}

impl ParseStats {
    pub fn new(format: SourceFormat) -> Self {
        Self {
            format,
            function_count: 0,
            sample_count: 0,
            root_count: 0,
            unresolved_samples: 0,
            dropped_references: 0,
            duplicate_ids: 0,
            reported_duration_ms: None,
            top_functions: Vec::new(),
        }
    }

    /// Fill the fields that can be read off the finished profile.
    pub(crate) fn summarize(mut self, profile: &NormalizedProfile, top: usize) -> Self {
        self.function_count = profile.functions.len();
        self.top_functions = hottest_functions(profile, top);
        self
    }
}

/// Aggregate records by name and keep the `limit` with the most self time.
pub fn hottest_functions(profile: &NormalizedProfile, limit: usize) -> Vec<HotFunction> {
    let mut by_name: HashMap<&str, HotFunction> = HashMap::new();

    for f in &profile.functions {
        let entry = by_name.entry(&f.name).or_insert_with(|| HotFunction {
            name: f.name.clone(),
            self_time_ms: 0.0,
            total_time_ms: 0.0,
            count: 0,
        });
        entry.self_time_ms += f.self_time;
        entry.total_time_ms += f.total_time;
        entry.count += 1;
    }

    let mut entries: Vec<HotFunction> = by_name.into_values().collect();
    entries.sort_by(|a, b| {
        b.self_time_ms
            .total_cmp(&a.self_time_ms)
            .then_with(|| a.name.cmp(&b.name))
    });
    entries.truncate(limit);
    entries
}
