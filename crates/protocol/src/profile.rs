use serde::{Deserialize, Serialize};

/// The normalized profile every capture format compiles into.
///
/// ```text
///   Hermes trace ─┐
///                 ├─▶ NormalizedProfile ──▶ flame-graph renderer
///   V8 cpuprofile ┘        (this)        └─▶ statistics view / differ
/// ```
///
/// Created fresh per parse call and never mutated afterwards. All times are
/// in milliseconds regardless of the capture's native unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedProfile {
    /// Source format (for display, not for branching logic).
    pub format: SourceFormat,
    pub total_duration_ms: f64,
    /// Every frame of the capture. Order carries no meaning.
    pub functions: Vec<FunctionRecord>,
    pub flame_tree: FlameTree,
}

impl NormalizedProfile {
    /// The degraded result for a payload no parser recognizes: no functions,
    /// zero duration, and the raw payload echoed back for inspection.
    pub fn unsupported(raw: serde_json::Value) -> Self {
        Self {
            format: SourceFormat::Unsupported,
            total_duration_ms: 0.0,
            functions: Vec::new(),
            flame_tree: FlameTree::Raw(raw),
        }
    }

    /// Get a function by its id.
    pub fn function(&self, id: &str) -> Option<&FunctionRecord> {
        self.functions.iter().find(|f| f.id == id)
    }

    /// First function carrying the given display name.
    pub fn function_named(&self, name: &str) -> Option<&FunctionRecord> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Direct children of the given function that resolve within this profile.
    pub fn children(&self, id: &str) -> Vec<&FunctionRecord> {
        self.function(id)
            .map(|f| f.child_ids.iter().filter_map(|c| self.function(c)).collect())
            .unwrap_or_default()
    }

    /// Functions with no resolvable parent.
    pub fn root_candidates(&self) -> Vec<&FunctionRecord> {
        self.functions
            .iter()
            .filter(|f| {
                f.parent_id
                    .as_deref()
                    .is_none_or(|pid| self.function(pid).is_none())
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// The capture format a profile was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceFormat {
    /// Hermes / React Native trace-event export (`samples` + `stackFrames`).
    TraceEvent,
    /// V8 / Chrome DevTools `.cpuprofile` (`nodes` + `samples` + `timeDeltas`).
    CpuProfile,
    /// Neither shape matched.
    Unsupported,
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TraceEvent => write!(f, "Trace Event"),
            Self::CpuProfile => write!(f, "V8 CPU Profile"),
            Self::Unsupported => write!(f, "Unsupported"),
        }
    }
}

/// One distinct call frame / node of a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRecord {
    /// Unique within this profile only.
    pub id: String,
    /// Display name, with source location folded in where the capture has one.
    pub name: String,
    /// Time attributed directly to this frame (ms).
    pub self_time: f64,
    /// Time attributed to this frame and its subtree (ms).
    pub total_time: f64,
    pub category: String,
    pub parent_id: Option<String>,
    pub child_ids: Vec<String>,
}

/// A weighted, ordered tree node ready for an external flame-graph layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlameNode {
    pub name: String,
    pub value: f64,
    pub children: Vec<FlameNode>,
}

impl FlameNode {
    pub const ROOT_NAME: &'static str = "root";

    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            children: Vec::new(),
        }
    }

    /// Zero-value root with no children, used when a capture has no usable roots.
    pub fn placeholder() -> Self {
        Self::new(Self::ROOT_NAME, 0.0)
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Depth-first search for the first node with the given name.
    pub fn find(&self, name: &str) -> Option<&FlameNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.name == name {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }
}

// Captures can nest thousands of frames deep; unlink children iteratively
// instead of letting drop glue recurse once per level.
impl Drop for FlameNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

/// The flame tree of a profile: a real tree, or the raw payload when the
/// capture format was not recognized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlameTree {
    Node(FlameNode),
    Raw(serde_json::Value),
}

impl FlameTree {
    pub fn as_node(&self) -> Option<&FlameNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Raw(_) => None,
        }
    }
}

impl From<FlameNode> for FlameTree {
    fn from(node: FlameNode) -> Self {
        Self::Node(node)
    }
}
