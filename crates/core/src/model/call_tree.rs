use std::collections::HashMap;

use profdiff_protocol::FlameNode;

/// How a flame tree picks its root when a capture has several root candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RootPolicy {
    /// If the heaviest root outweighs the runner-up by more than `ratio`,
    /// keep it alone and discard the rest (background noise next to one real
    /// entry point). Otherwise fall back to a synthetic root.
    Dominant { ratio: f64 },
    /// Always gather multiple roots under a synthetic root.
    Synthetic,
}

impl RootPolicy {
    /// Collapse `roots` (already sorted heaviest first) into a single node.
    fn select(self, mut roots: Vec<FlameNode>) -> FlameNode {
        let dominant = match (self, roots.as_slice()) {
            (Self::Dominant { ratio }, [first, second, ..]) => first.value > ratio * second.value,
            _ => false,
        };

        match roots.len() {
            0 => FlameNode::placeholder(),
            1 => roots.swap_remove(0),
            _ if dominant => roots.swap_remove(0),
            _ => FlameNode {
                name: FlameNode::ROOT_NAME.to_string(),
                value: 0.0,
                children: roots,
            },
        }
    }
}

/// Index-based call tree over the frames of one capture.
///
/// Frames are addressed by their position in the order they were added.
/// Edges that reference unknown ids, point a frame at itself, or repeat an
/// existing edge are dropped and counted rather than reported as errors.
#[derive(Debug, Clone, Default)]
pub struct CallTree {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    children: Vec<Vec<usize>>,
    parents: Vec<Option<usize>>,
    dropped_references: usize,
}

impl CallTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame. Returns its index, or `None` if the id is already taken.
    pub fn add(&mut self, id: impl Into<String>) -> Option<usize> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return None;
        }
        let idx = self.ids.len();
        self.index.insert(id.clone(), idx);
        self.ids.push(id);
        self.children.push(Vec::new());
        self.parents.push(None);
        Some(idx)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id(&self, idx: usize) -> &str {
        &self.ids[idx]
    }

    /// Record a parent → child edge by id. The first resolvable parent of a
    /// frame becomes its parent; later ones still contribute child edges.
    pub fn link(&mut self, parent: &str, child: &str) -> bool {
        let (Some(p), Some(c)) = (self.index_of(parent), self.index_of(child)) else {
            self.dropped_references += 1;
            return false;
        };
        if p == c || self.children[p].contains(&c) {
            self.dropped_references += 1;
            return false;
        }
        self.children[p].push(c);
        if self.parents[c].is_none() {
            self.parents[c] = Some(p);
        }
        true
    }

    pub fn child_ids(&self, idx: usize) -> Vec<String> {
        self.children[idx]
            .iter()
            .map(|&c| self.ids[c].clone())
            .collect()
    }

    pub fn parent(&self, idx: usize) -> Option<usize> {
        self.parents[idx]
    }

    /// Frames with no resolvable parent, in insertion order.
    pub fn roots(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&idx| self.parents[idx].is_none())
            .collect()
    }

    /// Number of edges that were ignored by `link`.
    pub fn dropped_references(&self) -> usize {
        self.dropped_references
    }

    /// `total(f) = self(f) + Σ total(child)` for every frame.
    ///
    /// Post-order from each root, memoized so a frame is computed once. A
    /// child that is still on the traversal stack (a cycle) contributes
    /// nothing. Frames that no root reaches are computed afterwards, so every
    /// frame ends up with `total >= self`.
    pub fn subtree_totals(&self, self_values: &[f64]) -> Vec<f64> {
        let mut totals: Vec<Option<f64>> = vec![None; self.len()];
        let mut on_stack = vec![false; self.len()];

        for start in self.roots().into_iter().chain(0..self.len()) {
            if totals[start].is_some() {
                continue;
            }
            on_stack[start] = true;
            let mut stack = vec![(start, 0usize)];

            while let Some((node, next)) = stack.last_mut() {
                let node = *node;
                if let Some(&child) = self.children[node].get(*next) {
                    *next += 1;
                    if totals[child].is_none() && !on_stack[child] {
                        on_stack[child] = true;
                        stack.push((child, 0));
                    }
                    continue;
                }

                stack.pop();
                let from_children: f64 = self.children[node]
                    .iter()
                    .filter_map(|&c| totals[c])
                    .sum();
                totals[node] = Some(self_values.get(node).copied().unwrap_or(0.0) + from_children);
                on_stack[node] = false;
            }
        }

        totals.into_iter().map(|t| t.unwrap_or(0.0)).collect()
    }

    /// Build the weighted flame tree.
    ///
    /// Each frame appears at most once. A child with value 0 and no surviving
    /// children is pruned; siblings are sorted heaviest first. `policy`
    /// decides what happens when more than one root survives.
    pub fn flame_tree(&self, names: &[String], values: &[f64], policy: RootPolicy) -> FlameNode {
        let mut visited = vec![false; self.len()];
        let mut roots: Vec<FlameNode> = self
            .roots()
            .into_iter()
            .filter_map(|root| self.build_subtree(root, names, values, &mut visited))
            .collect();
        sort_heaviest_first(&mut roots);
        policy.select(roots)
    }

    fn build_subtree(
        &self,
        root: usize,
        names: &[String],
        values: &[f64],
        visited: &mut [bool],
    ) -> Option<FlameNode> {
        struct Pending {
            idx: usize,
            next: usize,
            node: FlameNode,
        }

        let open = |idx: usize| Pending {
            idx,
            next: 0,
            node: FlameNode::new(
                names.get(idx).map_or("", String::as_str),
                values.get(idx).copied().unwrap_or(0.0),
            ),
        };

        visited[root] = true;
        let mut stack = vec![open(root)];

        while let Some(top) = stack.last_mut() {
            if let Some(&child) = self.children[top.idx].get(top.next) {
                top.next += 1;
                if !visited[child] {
                    visited[child] = true;
                    stack.push(open(child));
                }
                continue;
            }

            let mut node = stack.pop()?.node;
            sort_heaviest_first(&mut node.children);
            let dead = node.value == 0.0 && node.children.is_empty();

            match stack.last_mut() {
                Some(parent) if !dead => parent.node.children.push(node),
                Some(_) => {}
                None => return (!dead).then_some(node),
            }
        }
        None
    }
}

fn sort_heaviest_first(nodes: &mut [FlameNode]) {
    nodes.sort_by(|a, b| b.value.total_cmp(&a.value));
}
