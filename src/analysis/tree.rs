//! Canonical text rendering of a document's object graph
//!
//! The rendering is a depth-first expansion from the root followed by every node in
//! identifier order. Each node prints as `kind (id) `; a node's children are expanded
//! the first time it is reached and later references print the node without
//! expanding it again. Versions after the first are introduced by ` Version N: `.
//! The output is the input to the structural fingerprint, so it must never depend
//! on anything but the graph.

use super::{NodeInfo, ObjectId, Revision};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

/// Kind reported for references the analyzer could not resolve
pub const UNKNOWN_KIND: &str = "Unknown";

enum Step<'a> {
    Visit { id: ObjectId, depth: usize },
    Leaf { kind: &'a str, id: ObjectId },
}

/// Render every revision of a document as one line of text
pub fn render_tree(revisions: &[Revision]) -> String {
    let mut output = String::new();
    for (version, revision) in revisions.iter().enumerate() {
        if version != 0 {
            let _ = write!(output, " Version {version}: ");
        }
        let mut expanded = HashSet::new();
        if let Some(root) = revision.root {
            render_node(root, &revision.nodes, &mut expanded, &mut output);
        }
        for &id in revision.nodes.keys() {
            render_node(id, &revision.nodes, &mut expanded, &mut output);
        }
    }
    output
}

/// Expand `start` with an explicit stack; object chains in hostile files can be far
/// deeper than the thread stack allows.
fn render_node(
    start: ObjectId,
    nodes: &BTreeMap<ObjectId, NodeInfo>,
    expanded: &mut HashSet<ObjectId>,
    output: &mut String,
) {
    let mut stack = vec![Step::Visit { id: start, depth: 0 }];

    while let Some(step) = stack.pop() {
        let (id, depth) = match step {
            Step::Leaf { kind, id } => {
                let _ = write!(output, "{kind} ({id}) ");
                continue;
            }
            Step::Visit { id, depth } => (id, depth),
        };

        let Some(info) = nodes.get(&id) else {
            continue;
        };
        let seen = expanded.contains(&id);
        if !seen || depth > 0 {
            let _ = write!(output, "{} ({id}) ", info.kind);
        }
        if seen {
            continue;
        }
        expanded.insert(id);

        for &child in info.children.iter().rev() {
            let step = match nodes.get(&child) {
                Some(child_info) if child_info.kind != UNKNOWN_KIND => Step::Visit {
                    id: child,
                    depth: depth + 1,
                },
                Some(child_info) => Step::Leaf {
                    kind: &child_info.kind,
                    id: child,
                },
                None => Step::Leaf {
                    kind: UNKNOWN_KIND,
                    id: child,
                },
            };
            stack.push(step);
        }
    }
}
