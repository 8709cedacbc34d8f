//! # Editor State
//!
//! An [`EditorState`] is an immutable snapshot of the document: the node map
//! plus the selection. Snapshots share structure. Cloning one is O(1) and a
//! node that did not change between two states is the same `Arc` in both.

use crate::node::{Node, NodeRegistry};
use crate::read::StateRead;
use crate::selection::Selection;
use crate::serialize::{self, SerializedEditorState};
use crate::{EditorResult, NodeKey};
use std::fmt;
use std::sync::Arc;

/// Persistent map from key to node.
pub type NodeMap = im::OrdMap<NodeKey, Arc<Node>>;

#[derive(Clone)]
pub struct EditorState {
    pub(crate) node_map: NodeMap,
    pub(crate) selection: Option<Selection>,
    pub(crate) registry: Arc<NodeRegistry>,
}

impl EditorState {
    /// A state holding only an empty root.
    pub fn empty(registry: Arc<NodeRegistry>) -> Self {
        let mut node_map = NodeMap::new();
        node_map.insert(NodeKey::ROOT, Arc::new(Node::root()));
        Self {
            node_map,
            selection: None,
            registry,
        }
    }

    /// Rebuild a state from its JSON form.
    pub fn from_json(
        registry: Arc<NodeRegistry>,
        serialized: &SerializedEditorState,
    ) -> EditorResult<Self> {
        serialize::import_state(registry, serialized)
    }

    pub fn from_json_str(registry: Arc<NodeRegistry>, json: &str) -> EditorResult<Self> {
        let serialized: SerializedEditorState = serde_json::from_str(json)?;
        Self::from_json(registry, &serialized)
    }

    pub fn node_map(&self) -> &NodeMap {
        &self.node_map
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// The shared handle for `key`; equal handles mean an unchanged node.
    pub fn node_arc(&self, key: NodeKey) -> Option<&Arc<Node>> {
        self.node_map.get(&key)
    }

    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Only the root, and no selection.
    pub fn is_empty(&self) -> bool {
        self.node_map.len() == 1 && self.selection.is_none()
    }

    /// Run `f` against this snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&EditorState) -> T) -> T {
        f(self)
    }

    /// Same nodes, different selection.
    pub fn clone_with_selection(&self, selection: Option<Selection>) -> EditorState {
        EditorState {
            node_map: self.node_map.clone(),
            selection,
            registry: self.registry.clone(),
        }
    }

    pub fn root_text_content(&self) -> String {
        self.text_content(NodeKey::ROOT).unwrap_or_default()
    }

    pub fn to_json(&self) -> EditorResult<SerializedEditorState> {
        serialize::export_state(self)
    }

    pub fn to_json_string(&self) -> EditorResult<String> {
        Ok(serde_json::to_string(&self.to_json()?)?)
    }
}

impl StateRead for EditorState {
    fn state(&self) -> &EditorState {
        self
    }
}

impl fmt::Debug for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorState")
            .field("nodes", &self.node_map.len())
            .field("selection", &self.selection)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state_has_root_only() {
        let state = EditorState::empty(Arc::new(NodeRegistry::with_builtins()));
        assert!(state.is_empty());
        assert!(state.node(NodeKey::ROOT).unwrap().is_root());
        assert_eq!(state.root_text_content(), "");
    }

    #[test]
    fn test_clone_shares_nodes() {
        let state = EditorState::empty(Arc::new(NodeRegistry::with_builtins()));
        let copy = state.clone_with_selection(None);
        assert!(Arc::ptr_eq(
            state.node_arc(NodeKey::ROOT).unwrap(),
            copy.node_arc(NodeKey::ROOT).unwrap()
        ));
    }
}
