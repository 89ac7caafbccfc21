use profdiff_protocol::{FunctionRecord, NormalizedProfile, SourceFormat};
use serde::Deserialize;
use serde_json::Value;

use super::MICROS_PER_MILLI;
use super::lenient::{self, FrameKey, Num};
use crate::config::ParseOptions;
use crate::model::{CallTree, RootPolicy};
use crate::stats::ParseStats;

const UNKNOWN_CATEGORY: &str = "Unknown";

/// Trace-event export with a stack-frame table, as written by Hermes and
/// the React Native profiler.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TraceCapture {
    #[serde(default, deserialize_with = "lenient::vec_skip_invalid")]
    samples: Vec<RawSample>,
    #[serde(default, deserialize_with = "lenient::entries_skip_invalid")]
    stack_frames: Vec<(String, RawStackFrame)>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSample {
    #[serde(
        default,
        rename = "stackFrameId",
        alias = "sf",
        deserialize_with = "lenient::or_default"
    )]
    stack_frame_id: Option<FrameKey>,
    /// Microseconds.
    #[serde(default, alias = "ts", deserialize_with = "lenient::or_default")]
    timestamp: Option<Num>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    weight: Option<Num>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStackFrame {
    #[serde(default, deserialize_with = "lenient::or_default")]
    name: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    category: Option<String>,
    #[serde(
        default,
        rename = "parentId",
        alias = "parent",
        deserialize_with = "lenient::or_default"
    )]
    parent_id: Option<FrameKey>,
}

/// Estimate of the wall-clock span covered by the samples, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Timing {
    span: f64,
    interval: f64,
}

impl Timing {
    /// `span = max(ts) - min(ts)` and `interval = span / (n - 1)`. With fewer
    /// than two timestamps the span is the lone timestamp (or 0) and the
    /// interval equals the span. A negative or overflowing span counts as 0.
    fn from_timestamps(timestamps: &[f64]) -> Self {
        match timestamps {
            [] => Self {
                span: 0.0,
                interval: 0.0,
            },
            [only] => {
                let span = clamp_span(*only);
                Self {
                    span,
                    interval: span,
                }
            }
            _ => {
                let min = timestamps.iter().copied().fold(f64::INFINITY, f64::min);
                let max = timestamps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let span = clamp_span(max - min);
                Self {
                    span,
                    interval: span / (timestamps.len() - 1) as f64,
                }
            }
        }
    }
}

fn clamp_span(span: f64) -> f64 {
    if span.is_finite() { span.max(0.0) } else { 0.0 }
}

/// Parse a Hermes-style trace-event capture (`samples` + `stackFrames`).
///
/// Self time is the weighted sample count times the average sample interval;
/// total time is recomputed from the subtree. The flame tree is weighted by
/// total time so callers dominate visually.
pub fn parse_trace_events(
    value: &Value,
    options: &ParseOptions,
) -> (NormalizedProfile, ParseStats) {
    let capture = TraceCapture::deserialize(value).unwrap_or_default();
    let mut stats = ParseStats::new(SourceFormat::TraceEvent);

    let mut tree = CallTree::new();
    let mut frames: Vec<RawStackFrame> = Vec::with_capacity(capture.stack_frames.len());
    for (id, frame) in capture.stack_frames {
        if tree.add(id).is_some() {
            frames.push(frame);
        } else {
            stats.duplicate_ids += 1;
        }
    }

    for (idx, frame) in frames.iter().enumerate() {
        if let Some(parent) = &frame.parent_id {
            let child = tree.id(idx).to_string();
            tree.link(&parent.0, &child);
        }
    }

    let timestamps: Vec<f64> = capture
        .samples
        .iter()
        .filter_map(|s| s.timestamp.map(|n| n.0))
        .collect();
    let timing = Timing::from_timestamps(&timestamps);

    let mut weights = vec![0.0_f64; tree.len()];
    for sample in &capture.samples {
        match sample.stack_frame_id.as_ref().and_then(|k| tree.index_of(&k.0)) {
            Some(idx) => weights[idx] += sample.weight.map_or(1.0, |w| w.0.max(0.0)),
            None => stats.unresolved_samples += 1,
        }
    }

    // Huge weights can still overflow; keep every time finite.
    let self_us: Vec<f64> = weights
        .iter()
        .map(|w| w * timing.interval)
        .map(|t| if t.is_finite() { t } else { 0.0 })
        .collect();
    let total_us = tree.subtree_totals(&self_us);

    let self_ms: Vec<f64> = self_us.iter().map(|t| t / MICROS_PER_MILLI).collect();
    let total_ms: Vec<f64> = total_us.iter().map(|t| t / MICROS_PER_MILLI).collect();
    let names: Vec<String> = frames
        .iter()
        .map(|f| display_name(&f.name, &options.loopback_prefixes))
        .collect();

    let flame = tree.flame_tree(
        &names,
        &total_ms,
        RootPolicy::Dominant {
            ratio: options.dominance_ratio,
        },
    );

    let roots = tree.roots();
    stats.sample_count = capture.samples.len();
    stats.root_count = roots.len();
    stats.dropped_references = tree.dropped_references();

    let functions = frames
        .into_iter()
        .zip(names)
        .enumerate()
        .map(|(idx, (frame, name))| FunctionRecord {
            id: tree.id(idx).to_string(),
            name,
            self_time: self_ms[idx],
            total_time: total_ms[idx],
            category: frame
                .category
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            parent_id: frame.parent_id.map(|k| k.0),
            child_ids: tree.child_ids(idx),
        })
        .collect();

    let profile = NormalizedProfile {
        format: SourceFormat::TraceEvent,
        total_duration_ms: timing.span / MICROS_PER_MILLI,
        functions,
        flame_tree: flame.into(),
    };
    let stats = stats.summarize(&profile, options.top_functions);
    (profile, stats)
}

/// Shorten frame names that embed a dev-server URL.
///
/// `render(http://localhost:8081/index.bundle?platform=ios:120:4)` becomes
/// `render (index.bundle?platform=ios)`; anything else is returned as-is.
pub fn display_name(raw: &str, loopback_prefixes: &[String]) -> String {
    let Some(open) = loopback_prefixes
        .iter()
        .filter_map(|prefix| raw.find(&format!("({prefix}")))
        .min()
    else {
        return raw.to_string();
    };

    let base = raw[..open].trim_end();
    let url = raw[open + 1..].trim_end_matches(')');
    let segment = url.rsplit('/').next().unwrap_or(url);
    let file = segment.split(':').next().unwrap_or(segment);
    format!("{base} ({file})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: &Value) -> NormalizedProfile {
        parse_trace_events(value, &ParseOptions::default()).0
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn prefixes() -> Vec<String> {
        ParseOptions::default().loopback_prefixes
    }

    #[test]
    fn single_frame_three_samples() {
        let value = json!({
            "samples": [
                {"sf": 1, "ts": 1000},
                {"sf": 1, "ts": 3000},
                {"sf": 1, "ts": 5000}
            ],
            "stackFrames": {"1": {"name": "main", "category": "JavaScript"}}
        });
        let profile = parse(&value);

        // span = 4000µs, interval = 2000µs, self = 3 × 2000µs = 6ms
        assert!(approx(profile.total_duration_ms, 4.0));
        let main = profile.function("1").unwrap();
        assert!(approx(main.self_time, 6.0));
        assert!(approx(main.total_time, 6.0));

        let flame = profile.flame_tree.as_node().unwrap();
        assert_eq!(flame.name, "main");
        assert!(approx(flame.value, 6.0));
        assert!(flame.children.is_empty());
    }

    #[test]
    fn totals_include_children() {
        let value = json!({
            "samples": [
                {"stackFrameId": "leaf", "timestamp": 0},
                {"stackFrameId": "leaf", "timestamp": 100},
                {"stackFrameId": "mid", "timestamp": 200},
                {"stackFrameId": "root", "timestamp": 300}
            ],
            "stackFrames": {
                "root": {"name": "root"},
                "mid": {"name": "mid", "parent": "root"},
                "leaf": {"name": "leaf", "parentId": "mid"}
            }
        });
        let profile = parse(&value);

        // interval = 300 / 3 = 100µs
        let leaf = profile.function("leaf").unwrap();
        let mid = profile.function("mid").unwrap();
        let root = profile.function("root").unwrap();
        assert!(approx(leaf.self_time, 0.2));
        assert!(approx(mid.self_time, 0.1));
        assert!(approx(mid.total_time, 0.3));
        assert!(approx(root.total_time, 0.4));
        assert_eq!(root.child_ids, vec!["mid"]);
        assert_eq!(mid.parent_id.as_deref(), Some("root"));
        assert_eq!(root.category, "Unknown");

        let flame = profile.flame_tree.as_node().unwrap();
        assert_eq!(flame.name, "root");
        assert!(approx(flame.value, 0.4));
        assert_eq!(flame.children[0].name, "mid");
        assert_eq!(flame.children[0].children[0].name, "leaf");
    }

    #[test]
    fn weights_scale_self_time() {
        let value = json!({
            "samples": [
                {"sf": 1, "ts": 0, "weight": 3},
                {"sf": 2, "ts": 10, "weight": "1"}
            ],
            "stackFrames": {"1": {"name": "a"}, "2": {"name": "b"}}
        });
        let profile = parse(&value);
        assert!(approx(profile.function("1").unwrap().self_time, 0.03));
        assert!(approx(profile.function("2").unwrap().self_time, 0.01));
    }

    #[test]
    fn dominant_root_discards_background() {
        let value = json!({
            "samples": [
                {"sf": "app", "ts": 0},
                {"sf": "app", "ts": 10},
                {"sf": "app", "ts": 20},
                {"sf": "app", "ts": 30},
                {"sf": "gc", "ts": 40}
            ],
            "stackFrames": {"app": {"name": "app"}, "gc": {"name": "gc"}}
        });
        let flame = parse(&value).flame_tree;
        let flame = flame.as_node().unwrap();
        assert_eq!(flame.name, "app");
        assert!(flame.children.is_empty());
    }

    #[test]
    fn balanced_roots_get_synthetic_parent() {
        let value = json!({
            "samples": [
                {"sf": "a", "ts": 0},
                {"sf": "b", "ts": 10},
                {"sf": "a", "ts": 20},
                {"sf": "b", "ts": 30}
            ],
            "stackFrames": {"a": {"name": "a"}, "b": {"name": "b"}, "idle": {"name": "idle"}}
        });
        let profile = parse(&value);
        let flame = profile.flame_tree.as_node().unwrap();
        assert_eq!(flame.name, "root");
        assert_eq!(flame.value, 0.0);
        // "idle" has no samples and no children, so it is pruned.
        assert_eq!(flame.children.len(), 2);
        assert_eq!(profile.functions.len(), 3);
    }

    #[test]
    fn self_parent_does_not_loop() {
        let value = json!({
            "samples": [{"sf": 1, "ts": 0}, {"sf": 1, "ts": 10}],
            "stackFrames": {"1": {"name": "loop", "parent": 1}}
        });
        let (profile, stats) = parse_trace_events(&value, &ParseOptions::default());
        let f = profile.function("1").unwrap();
        assert!(approx(f.total_time, f.self_time));
        assert!(f.child_ids.is_empty());
        assert_eq!(stats.dropped_references, 1);
    }

    #[test]
    fn dangling_parent_is_root() {
        let value = json!({
            "samples": [{"sf": 1, "ts": 0}, {"sf": 1, "ts": 10}],
            "stackFrames": {"1": {"name": "orphan", "parent": 404}}
        });
        let (profile, stats) = parse_trace_events(&value, &ParseOptions::default());
        assert_eq!(profile.flame_tree.as_node().unwrap().name, "orphan");
        assert_eq!(profile.function("1").unwrap().parent_id.as_deref(), Some("404"));
        assert_eq!(stats.root_count, 1);
    }

    #[test]
    fn single_sample_span_is_its_timestamp() {
        let value = json!({
            "samples": [{"sf": 1, "ts": 2500}],
            "stackFrames": {"1": {"name": "only"}}
        });
        let profile = parse(&value);
        assert!(approx(profile.total_duration_ms, 2.5));
        assert!(approx(profile.function("1").unwrap().self_time, 2.5));
    }

    #[test]
    fn negative_lone_timestamp_gives_zero_times() {
        let value = json!({
            "samples": [{"sf": 1, "ts": -5000}],
            "stackFrames": {"1": {"name": "a"}}
        });
        let profile = parse(&value);
        assert_eq!(profile.total_duration_ms, 0.0);
        let a = profile.function("1").unwrap();
        assert_eq!(a.self_time, 0.0);
        assert_eq!(a.total_time, 0.0);
        assert_eq!(profile.flame_tree.as_node().unwrap().value, 0.0);
    }

    #[test]
    fn overflowing_span_stays_finite() {
        let value = json!({
            "samples": [
                {"sf": 1, "ts": -1e308},
                {"sf": 2, "ts": 1e308, "weight": 0}
            ],
            "stackFrames": {"1": {"name": "a"}, "2": {"name": "b", "parent": 1}}
        });
        let profile = parse(&value);
        assert!(profile.total_duration_ms.is_finite());
        for f in &profile.functions {
            assert!(f.self_time.is_finite(), "{} self", f.name);
            assert!(f.total_time.is_finite(), "{} total", f.name);
            assert!(f.self_time >= 0.0);
        }
        assert!(serde_json::to_value(&profile).unwrap()["functions"][0]["selfTime"].is_number());
    }

    #[test]
    fn empty_capture_yields_placeholder() {
        let value = json!({"samples": [], "stackFrames": {}});
        let profile = parse(&value);
        assert_eq!(profile.total_duration_ms, 0.0);
        assert!(profile.functions.is_empty());
        assert_eq!(profile.flame_tree.as_node().unwrap().name, "root");
    }

    #[test]
    fn unknown_frames_in_samples_are_counted() {
        let value = json!({
            "samples": [{"sf": 1, "ts": 0}, {"sf": 99, "ts": 10}, {"ts": 20}],
            "stackFrames": {"1": {"name": "a"}}
        });
        let (profile, stats) = parse_trace_events(&value, &ParseOptions::default());
        assert_eq!(stats.sample_count, 3);
        assert_eq!(stats.unresolved_samples, 2);
        // interval = 20 / 2 = 10µs, one sample on "a"
        assert!(approx(profile.function("1").unwrap().self_time, 0.01));
    }

    #[test]
    fn display_name_shortens_dev_server_urls() {
        assert_eq!(
            display_name(
                "render(http://localhost:8081/index.bundle?platform=ios:120:4)",
                &prefixes()
            ),
            "render (index.bundle?platform=ios)"
        );
        assert_eq!(
            display_name("App (http://localhost:8081/src/App.js:10:2)", &prefixes()),
            "App (App.js)"
        );
    }

    #[test]
    fn display_name_leaves_other_names_alone() {
        assert_eq!(display_name("flushWork", &prefixes()), "flushWork");
        assert_eq!(
            display_name("fetch(https://example.com/a.js:1:2)", &prefixes()),
            "fetch(https://example.com/a.js:1:2)"
        );
        assert_eq!(display_name("", &prefixes()), "");
    }

    #[test]
    fn display_name_honours_extra_prefixes() {
        let prefixes = vec!["http://127.0.0.1".to_string()];
        assert_eq!(
            display_name("tick(http://127.0.0.1:9000/main.js:3:9)", &prefixes),
            "tick (main.js)"
        );
    }

    #[test]
    fn timing_edge_cases() {
        assert_eq!(
            Timing::from_timestamps(&[]),
            Timing {
                span: 0.0,
                interval: 0.0
            }
        );
        let t = Timing::from_timestamps(&[50.0, 10.0, 30.0]);
        assert_eq!(t.span, 40.0);
        assert_eq!(t.interval, 20.0);
        assert_eq!(Timing::from_timestamps(&[-7.0]).interval, 0.0);
        assert_eq!(Timing::from_timestamps(&[f64::MAX, -f64::MAX]).span, 0.0);
    }
}
