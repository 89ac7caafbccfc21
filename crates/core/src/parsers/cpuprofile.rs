use profdiff_protocol::{FunctionRecord, NormalizedProfile, SourceFormat};
use serde::Deserialize;
use serde_json::Value;

use super::MICROS_PER_MILLI;
use super::lenient::{self, FrameKey, Num};
use crate::config::ParseOptions;
use crate::model::{CallTree, RootPolicy};
use crate::stats::ParseStats;

const JAVASCRIPT_CATEGORY: &str = "JavaScript";

/// V8 CPU profile node.
#[derive(Debug, Deserialize)]
struct CpuProfileNode {
    #[serde(deserialize_with = "lenient::or_default")]
    id: Option<FrameKey>,
    #[serde(default, rename = "callFrame", deserialize_with = "lenient::or_default")]
    call_frame: CallFrame,
    #[serde(default, deserialize_with = "lenient::vec_skip_invalid")]
    children: Vec<FrameKey>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallFrame {
    #[serde(default, deserialize_with = "lenient::or_default")]
    function_name: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    line_number: Option<Num>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    column_number: Option<Num>,
}

impl CallFrame {
    /// `functionName (file:line:column)` when a script URL is known.
    fn display_name(&self) -> String {
        let function = if self.function_name.is_empty() {
            "(anonymous)"
        } else {
            self.function_name.as_str()
        };

        match self.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => {
                let file = url.rsplit('/').find(|s| !s.is_empty()).unwrap_or(url);
                let line = self.line_number.map_or(0, |n| n.0 as i64);
                let column = self.column_number.map_or(0, |n| n.0 as i64);
                format!("{function} ({file}:{line}:{column})")
            }
            None => function.to_string(),
        }
    }
}

/// V8 CPU profile top-level structure (.cpuprofile files).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CpuProfile {
    #[serde(default, deserialize_with = "lenient::vec_skip_invalid")]
    nodes: Vec<CpuProfileNode>,
    #[serde(default, deserialize_with = "lenient::vec_lossy")]
    samples: Vec<Option<FrameKey>>,
    #[serde(default, deserialize_with = "lenient::vec_lossy")]
    time_deltas: Vec<Num>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    start_time: Option<Num>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    end_time: Option<Num>,
}

/// Parse a V8 CPU profile (.cpuprofile) into a `NormalizedProfile`.
///
/// Used by: Node.js `--cpu-prof`, Chrome DevTools CPU profiler, Deno.
///
/// Sample `i` is charged `timeDeltas[i]` (0 when missing). Unlike the
/// trace-event parser, a node's total time is only its own samples; it is not
/// summed over the subtree. The flame tree is weighted by self time and
/// multiple roots always get a synthetic parent.
pub fn parse_cpuprofile(value: &Value, options: &ParseOptions) -> (NormalizedProfile, ParseStats) {
    let cpu_profile = CpuProfile::deserialize(value).unwrap_or_default();
    let mut stats = ParseStats::new(SourceFormat::CpuProfile);

    let mut tree = CallTree::new();
    let mut nodes: Vec<&CpuProfileNode> = Vec::with_capacity(cpu_profile.nodes.len());
    for node in &cpu_profile.nodes {
        let Some(id) = &node.id else {
            continue;
        };
        if tree.add(id.0.clone()).is_some() {
            nodes.push(node);
        } else {
            stats.duplicate_ids += 1;
        }
    }

    for (idx, node) in nodes.iter().enumerate() {
        let parent = tree.id(idx).to_string();
        for child in &node.children {
            tree.link(&parent, &child.0);
        }
    }

    let mut self_us = vec![0.0_f64; tree.len()];
    let mut duration_us = 0.0;
    for (i, sample) in cpu_profile.samples.iter().enumerate() {
        let delta = cpu_profile.time_deltas.get(i).map_or(0.0, |d| d.0);
        duration_us += delta;
        match sample.as_ref().and_then(|k| tree.index_of(&k.0)) {
            Some(idx) => self_us[idx] += delta,
            None => stats.unresolved_samples += 1,
        }
    }

    let self_ms: Vec<f64> = self_us
        .iter()
        .map(|t| t.max(0.0) / MICROS_PER_MILLI)
        .collect();
    let names: Vec<String> = nodes.iter().map(|n| n.call_frame.display_name()).collect();
    let flame = tree.flame_tree(&names, &self_ms, RootPolicy::Synthetic);

    stats.sample_count = cpu_profile.samples.len();
    stats.root_count = tree.roots().len();
    stats.dropped_references = tree.dropped_references();
    if let (Some(start), Some(end)) = (cpu_profile.start_time, cpu_profile.end_time) {
        stats.reported_duration_ms = Some((end.0 - start.0) / MICROS_PER_MILLI);
    }

    let functions = names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| FunctionRecord {
            id: tree.id(idx).to_string(),
            name,
            self_time: self_ms[idx],
            total_time: self_ms[idx],
            category: JAVASCRIPT_CATEGORY.to_string(),
            parent_id: tree.parent(idx).map(|p| tree.id(p).to_string()),
            child_ids: tree.child_ids(idx),
        })
        .collect();

    let profile = NormalizedProfile {
        format: SourceFormat::CpuProfile,
        total_duration_ms: duration_us.max(0.0) / MICROS_PER_MILLI,
        functions,
        flame_tree: flame.into(),
    };
    let stats = stats.summarize(&profile, options.top_functions);
    (profile, stats)
}
