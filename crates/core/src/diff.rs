//! Function-level comparison of two normalized profiles.
//!
//! Functions are matched by display name only. Two same-named functions at
//! different call sites are conflated, and profile-local ids are ignored.

use std::collections::BTreeMap;

use profdiff_protocol::{
    ComparisonResult, DeltaKind, FunctionDelta, FunctionRecord, NormalizedProfile,
};

use crate::config::DiffOptions;

/// Compare `left` (baseline) against `right` with the default noise threshold.
pub fn compare(left: &NormalizedProfile, right: &NormalizedProfile) -> ComparisonResult {
    compare_with(left, right, &DiffOptions::default())
}

/// Compare two profiles.
///
/// Rows are sorted by descending `|self_time_delta_ms|`, ties broken by name,
/// so the output is deterministic for a given pair of inputs.
pub fn compare_with(
    left: &NormalizedProfile,
    right: &NormalizedProfile,
    options: &DiffOptions,
) -> ComparisonResult {
    let left_by_name = index_by_name(left);
    let right_by_name = index_by_name(right);

    let mut differences: Vec<FunctionDelta> =
        Vec::with_capacity(left_by_name.len().max(right_by_name.len()));

    for (name, l) in &left_by_name {
        match right_by_name.get(name) {
            Some(r) => {
                let row = delta(
                    name,
                    DeltaKind::Changed,
                    l.self_time,
                    r.self_time,
                    l.total_time,
                    r.total_time,
                );
                if row.self_time_delta_ms.abs() > options.epsilon_ms
                    || row.total_time_delta_ms.abs() > options.epsilon_ms
                {
                    differences.push(row);
                }
            }
            None => differences.push(delta(
                name,
                DeltaKind::Removed,
                l.self_time,
                0.0,
                l.total_time,
                0.0,
            )),
        }
    }

    for (name, r) in &right_by_name {
        if !left_by_name.contains_key(name) {
            differences.push(delta(
                name,
                DeltaKind::Added,
                0.0,
                r.self_time,
                0.0,
                r.total_time,
            ));
        }
    }

    differences.sort_by(|a, b| {
        b.self_time_delta_ms
            .abs()
            .total_cmp(&a.self_time_delta_ms.abs())
            .then_with(|| a.name.cmp(&b.name))
    });

    let result = ComparisonResult {
        left_total_duration_ms: left.total_duration_ms,
        right_total_duration_ms: right.total_duration_ms,
        duration_delta_ms: right.total_duration_ms - left.total_duration_ms,
        differences,
    };

    tracing::debug!(
        added = result.count(DeltaKind::Added),
        removed = result.count(DeltaKind::Removed),
        changed = result.count(DeltaKind::Changed),
        duration_delta_ms = result.duration_delta_ms,
        "compared profiles"
    );
    result
}

/// Name → record. Later records overwrite earlier ones with the same name.
fn index_by_name(profile: &NormalizedProfile) -> BTreeMap<&str, &FunctionRecord> {
    profile
        .functions
        .iter()
        .map(|f| (f.name.as_str(), f))
        .collect()
}

fn delta(
    name: &str,
    kind: DeltaKind,
    left_self: f64,
    right_self: f64,
    left_total: f64,
    right_total: f64,
) -> FunctionDelta {
    FunctionDelta {
        name: name.to_string(),
        kind,
        left_self_time_ms: left_self,
        right_self_time_ms: right_self,
        left_total_time_ms: left_total,
        right_total_time_ms: right_total,
        self_time_delta_ms: right_self - left_self,
        total_time_delta_ms: right_total - left_total,
    }
}
