pub mod cpuprofile;
mod lenient;
pub mod trace_event;

use profdiff_protocol::{NormalizedProfile, SourceFormat};
use serde_json::Value;
use thiserror::Error;

use crate::config::ParseOptions;
use crate::stats::ParseStats;

/// Both capture formats record time in microseconds; everything leaving the
/// core is in milliseconds.
pub(crate) const MICROS_PER_MILLI: f64 = 1_000.0;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pick the parser for a payload by its top-level shape.
///
/// Detection strategy (no version field is assumed):
/// 1. `samples` array + `stackFrames` object → trace-event, regardless of
///    any other keys.
/// 2. `nodes` + `samples` + `timeDeltas` arrays → V8 CPU profile.
/// 3. Anything else is unsupported.
pub fn detect_format(value: &Value) -> SourceFormat {
    let Some(obj) = value.as_object() else {
        return SourceFormat::Unsupported;
    };
    let is_array = |key: &str| obj.get(key).is_some_and(Value::is_array);

    if is_array("samples") && obj.get("stackFrames").is_some_and(Value::is_object) {
        return SourceFormat::TraceEvent;
    }
    if is_array("nodes") && is_array("samples") && is_array("timeDeltas") {
        return SourceFormat::CpuProfile;
    }
    SourceFormat::Unsupported
}

/// Normalize an already-deserialized capture with default options.
///
/// Never fails: an unrecognized payload comes back as an empty profile whose
/// flame tree is the payload itself.
pub fn parse_value(value: &Value) -> NormalizedProfile {
    parse_value_with(value, &ParseOptions::default())
}

pub fn parse_value_with(value: &Value, options: &ParseOptions) -> NormalizedProfile {
    parse_value_with_stats(value, options).0
}

/// Like [`parse_value_with`], also returning parse diagnostics.
pub fn parse_value_with_stats(
    value: &Value,
    options: &ParseOptions,
) -> (NormalizedProfile, ParseStats) {
    let format = detect_format(value);
    let (profile, stats) = match format {
        SourceFormat::TraceEvent => trace_event::parse_trace_events(value, options),
        SourceFormat::CpuProfile => cpuprofile::parse_cpuprofile(value, options),
        SourceFormat::Unsupported => {
            tracing::warn!("payload matches no known capture format");
            return (
                NormalizedProfile::unsupported(value.clone()),
                ParseStats::new(SourceFormat::Unsupported),
            );
        }
    };

    tracing::debug!(
        format = %stats.format,
        functions = stats.function_count,
        samples = stats.sample_count,
        roots = stats.root_count,
        unresolved_samples = stats.unresolved_samples,
        dropped_references = stats.dropped_references,
        duplicate_ids = stats.duplicate_ids,
        total_duration_ms = profile.total_duration_ms,
        "parsed profile"
    );
    (profile, stats)
}

/// Deserialize raw bytes and normalize them. Invalid JSON is the only error.
pub fn parse_bytes(data: &[u8]) -> Result<NormalizedProfile, ParseError> {
    parse_bytes_with(data, &ParseOptions::default())
}

pub fn parse_bytes_with(
    data: &[u8],
    options: &ParseOptions,
) -> Result<NormalizedProfile, ParseError> {
    let value: Value = serde_json::from_slice(data)?;
    Ok(parse_value_with(&value, options))
}
