use serde::{Deserialize, Serialize};

/// How a function changed between the left and right profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeltaKind {
    /// Present only in the right profile.
    Added,
    /// Present only in the left profile.
    Removed,
    /// Present in both with a timing change above the noise threshold.
    Changed,
}

impl std::fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
            Self::Changed => write!(f, "changed"),
        }
    }
}

/// One row of the diff table. Absent sides carry zeroed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDelta {
    pub name: String,
    pub kind: DeltaKind,
    pub left_self_time_ms: f64,
    pub right_self_time_ms: f64,
    pub left_total_time_ms: f64,
    pub right_total_time_ms: f64,
    pub self_time_delta_ms: f64,
    pub total_time_delta_ms: f64,
}

/// Result of comparing two normalized profiles.
///
/// `differences` is ordered by descending `|self_time_delta_ms|`, so the
/// largest-impact rows come first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub left_total_duration_ms: f64,
    pub right_total_duration_ms: f64,
    pub duration_delta_ms: f64,
    pub differences: Vec<FunctionDelta>,
}

impl ComparisonResult {
    /// Number of rows of the given kind.
    pub fn count(&self, kind: DeltaKind) -> usize {
        self.differences.iter().filter(|d| d.kind == kind).count()
    }

    /// The `n` largest-impact rows.
    pub fn top(&self, n: usize) -> &[FunctionDelta] {
        &self.differences[..n.min(self.differences.len())]
    }

    /// True when no function changed and the overall duration is unchanged.
    pub fn is_identical(&self) -> bool {
        self.differences.is_empty() && self.duration_delta_ms == 0.0
    }
}
