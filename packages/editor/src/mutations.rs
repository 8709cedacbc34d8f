//! # Node Mutations
//!
//! Per-commit classification of what happened to each node:
//!
//! - **Created**: the key is in the next state but not the previous one
//! - **Updated**: the key is in both and was written during the update
//! - **Destroyed**: the key was in the previous state and is gone
//!
//! Destroyed nodes include the descendants of a removed element, which were
//! never individually written.

use crate::state::EditorState;
use crate::NodeKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMutation {
    Created,
    Updated,
    Destroyed,
}

/// Mutations of nodes of `node_type` between `prev` and `next`. With `full`
/// every key of both states is compared instead of only the dirty ones.
pub(crate) fn collect_mutations(
    prev: &EditorState,
    next: &EditorState,
    dirty_leaves: &BTreeSet<NodeKey>,
    dirty_elements: &BTreeMap<NodeKey, bool>,
    full: bool,
    node_type: &str,
) -> BTreeMap<NodeKey, NodeMutation> {
    let mut candidates: BTreeSet<NodeKey> = dirty_leaves
        .iter()
        .chain(dirty_elements.keys())
        .copied()
        .collect();
    if full {
        candidates.extend(prev.node_map.keys().copied());
        candidates.extend(next.node_map.keys().copied());
    }

    let mut out = BTreeMap::new();
    for key in candidates {
        let before = prev.node_map.get(&key);
        let after = next.node_map.get(&key);
        match (before, after) {
            (None, Some(node)) if node.node_type() == node_type => {
                out.insert(key, NodeMutation::Created);
            }
            (Some(old), Some(node)) if node.node_type() == node_type => {
                let written = full
                    || dirty_leaves.contains(&key)
                    || dirty_elements.get(&key).copied().unwrap_or(false);
                if written && !std::sync::Arc::ptr_eq(old, node) {
                    out.insert(key, NodeMutation::Updated);
                }
            }
            (Some(old), None) => {
                collect_destroyed(prev, next, old.key(), node_type, &mut out);
            }
            _ => {}
        }
    }
    out
}

fn collect_destroyed(
    prev: &EditorState,
    next: &EditorState,
    key: NodeKey,
    node_type: &str,
    out: &mut BTreeMap<NodeKey, NodeMutation>,
) {
    let Some(node) = prev.node_map.get(&key) else {
        return;
    };
    if next.node_map.contains_key(&key) {
        return;
    }
    if node.node_type() == node_type {
        out.insert(key, NodeMutation::Destroyed);
    }
    for child in node.children() {
        collect_destroyed(prev, next, *child, node_type, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeData, NodeRegistry, TextData};
    use std::sync::Arc;

    fn with_text(state: &EditorState, key: NodeKey, text: &str) -> EditorState {
        let mut next = state.clone();
        let mut node = Node::new(key, Arc::from("text"), NodeData::Text(TextData::new(text)));
        node.parent = None;
        next.node_map.insert(key, Arc::new(node));
        next
    }

    #[test]
    fn test_created_updated_destroyed() {
        let empty = EditorState::empty(Arc::new(NodeRegistry::with_builtins()));
        let key = NodeKey::generate();
        let created = with_text(&empty, key, "a");
        let dirty: BTreeSet<_> = [key].into_iter().collect();

        let mutations = collect_mutations(&empty, &created, &dirty, &BTreeMap::new(), false, "text");
        assert_eq!(mutations.get(&key), Some(&NodeMutation::Created));

        let updated = with_text(&created, key, "b");
        let mutations = collect_mutations(&created, &updated, &dirty, &BTreeMap::new(), false, "text");
        assert_eq!(mutations.get(&key), Some(&NodeMutation::Updated));

        let mutations = collect_mutations(&updated, &empty, &dirty, &BTreeMap::new(), false, "text");
        assert_eq!(mutations.get(&key), Some(&NodeMutation::Destroyed));

        let mutations =
            collect_mutations(&updated, &empty, &dirty, &BTreeMap::new(), false, "paragraph");
        assert!(mutations.is_empty());
    }
}
