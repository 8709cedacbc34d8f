//! Read access to a state.
//!
//! [`StateRead`] is implemented by committed snapshots and by the update
//! context, so tree navigation reads the same way inside and outside of an
//! update. Inside an update it observes the pending state.

use crate::node::{ElementData, Node, NodeBehavior, NodeData, TextData};
use crate::selection::Selection;
use crate::state::EditorState;
use crate::{EditorError, EditorResult, NodeKey};
use serde_json::Value;
use std::sync::Arc;

pub trait StateRead {
    fn state(&self) -> &EditorState;

    fn get_node(&self, key: NodeKey) -> Option<&Node> {
        self.state().node_map.get(&key).map(|node| node.as_ref())
    }

    fn node(&self, key: NodeKey) -> EditorResult<&Node> {
        self.get_node(key).ok_or(EditorError::NodeNotFound(key))
    }

    fn contains(&self, key: NodeKey) -> bool {
        self.state().node_map.contains_key(&key)
    }

    fn root(&self) -> EditorResult<&Node> {
        self.get_node(NodeKey::ROOT).ok_or(EditorError::NoRootElement)
    }

    fn selection(&self) -> Option<&Selection> {
        self.state().selection.as_ref()
    }

    fn behavior(&self, key: NodeKey) -> EditorResult<&Arc<dyn NodeBehavior>> {
        let node = self.node(key)?;
        self.state().registry.get(node.node_type())
    }

    fn element(&self, key: NodeKey) -> EditorResult<&ElementData> {
        let node = self.node(key)?;
        node.as_element().ok_or_else(|| EditorError::NotAnElement {
            key,
            node_type: node.node_type().to_string(),
        })
    }

    fn text_data(&self, key: NodeKey) -> EditorResult<&TextData> {
        let node = self.node(key)?;
        node.as_text().ok_or_else(|| EditorError::NotText {
            key,
            node_type: node.node_type().to_string(),
        })
    }

    fn is_element(&self, key: NodeKey) -> bool {
        self.get_node(key).map(Node::is_element).unwrap_or(false)
    }

    fn is_text(&self, key: NodeKey) -> bool {
        self.get_node(key).map(Node::is_text).unwrap_or(false)
    }

    /// Inline nodes sit inside blocks: text, line breaks, inline decorators.
    fn is_inline(&self, key: NodeKey) -> EditorResult<bool> {
        Ok(self.behavior(key)?.is_inline())
    }

    fn parent(&self, key: NodeKey) -> EditorResult<Option<NodeKey>> {
        Ok(self.node(key)?.parent())
    }

    fn children(&self, key: NodeKey) -> EditorResult<&[NodeKey]> {
        Ok(self.node(key)?.children())
    }

    fn children_size(&self, key: NodeKey) -> EditorResult<usize> {
        Ok(self.children(key)?.len())
    }

    fn child_at(&self, key: NodeKey, index: usize) -> EditorResult<Option<NodeKey>> {
        Ok(self.children(key)?.get(index).copied())
    }

    fn first_child(&self, key: NodeKey) -> EditorResult<Option<NodeKey>> {
        Ok(self.children(key)?.first().copied())
    }

    fn last_child(&self, key: NodeKey) -> EditorResult<Option<NodeKey>> {
        Ok(self.children(key)?.last().copied())
    }

    /// Position among the parent's children; `None` when detached.
    fn index_within_parent(&self, key: NodeKey) -> EditorResult<Option<usize>> {
        let Some(parent) = self.parent(key)? else {
            return Ok(None);
        };
        Ok(self.children(parent)?.iter().position(|k| *k == key))
    }

    fn next_sibling(&self, key: NodeKey) -> EditorResult<Option<NodeKey>> {
        let Some(parent) = self.parent(key)? else {
            return Ok(None);
        };
        let children = self.children(parent)?;
        Ok(children
            .iter()
            .position(|k| *k == key)
            .and_then(|i| children.get(i + 1).copied()))
    }

    fn previous_sibling(&self, key: NodeKey) -> EditorResult<Option<NodeKey>> {
        let Some(parent) = self.parent(key)? else {
            return Ok(None);
        };
        let children = self.children(parent)?;
        Ok(children
            .iter()
            .position(|k| *k == key)
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| children.get(i).copied()))
    }

    fn next_siblings(&self, key: NodeKey) -> EditorResult<Vec<NodeKey>> {
        let Some(parent) = self.parent(key)? else {
            return Ok(Vec::new());
        };
        let children = self.children(parent)?;
        Ok(match children.iter().position(|k| *k == key) {
            Some(i) => children[i + 1..].to_vec(),
            None => Vec::new(),
        })
    }

    fn previous_siblings(&self, key: NodeKey) -> EditorResult<Vec<NodeKey>> {
        let Some(parent) = self.parent(key)? else {
            return Ok(Vec::new());
        };
        let children = self.children(parent)?;
        Ok(match children.iter().position(|k| *k == key) {
            Some(i) => children[..i].to_vec(),
            None => Vec::new(),
        })
    }

    /// Ancestors, nearest first.
    fn parents(&self, key: NodeKey) -> EditorResult<Vec<NodeKey>> {
        let mut out = Vec::new();
        let mut current = self.parent(key)?;
        while let Some(parent) = current {
            out.push(parent);
            current = self.parent(parent)?;
        }
        Ok(out)
    }

    /// Whether the parent chain reaches the root.
    fn is_attached(&self, key: NodeKey) -> bool {
        let mut current = key;
        loop {
            if current.is_root() {
                return self.contains(current);
            }
            match self.get_node(current).and_then(Node::parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Strict ancestry.
    fn is_ancestor_of(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        let mut current = self.get_node(key).and_then(Node::parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.get_node(parent).and_then(Node::parent);
        }
        false
    }

    fn is_parent_of(&self, parent: NodeKey, key: NodeKey) -> bool {
        self.is_ancestor_of(parent, key)
    }

    /// The child of the root that contains `key`.
    fn top_level_element(&self, key: NodeKey) -> EditorResult<Option<NodeKey>> {
        let mut current = key;
        loop {
            match self.parent(current)? {
                Some(parent) if parent.is_root() => return Ok(Some(current)),
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }

    /// Nearest non-inline, non-root element at or above `key`.
    fn nearest_block(&self, key: NodeKey) -> EditorResult<Option<NodeKey>> {
        let mut current = Some(key);
        while let Some(k) = current {
            let node = self.node(k)?;
            if node.is_root() {
                return Ok(None);
            }
            if node.is_element() && !self.is_inline(k)? {
                return Ok(Some(k));
            }
            current = node.parent();
        }
        Ok(None)
    }

    fn common_ancestor(&self, a: NodeKey, b: NodeKey) -> EditorResult<Option<NodeKey>> {
        let mut a_chain = vec![a];
        a_chain.extend(self.parents(a)?);
        let mut current = Some(b);
        while let Some(k) = current {
            if a_chain.contains(&k) {
                return Ok(Some(k));
            }
            current = self.parent(k)?;
        }
        Ok(None)
    }

    fn first_descendant(&self, key: NodeKey) -> EditorResult<Option<NodeKey>> {
        let mut current = self.first_child(key)?;
        while let Some(k) = current {
            match self.first_child(k)? {
                Some(child) => current = Some(child),
                None => return Ok(Some(k)),
            }
        }
        Ok(None)
    }

    fn last_descendant(&self, key: NodeKey) -> EditorResult<Option<NodeKey>> {
        let mut current = self.last_child(key)?;
        while let Some(k) = current {
            match self.last_child(k)? {
                Some(child) => current = Some(child),
                None => return Ok(Some(k)),
            }
        }
        Ok(None)
    }

    /// The deepest node at child `index`, clamped to the last child. An
    /// element without children resolves to itself.
    fn descendant_by_index(&self, key: NodeKey, index: usize) -> EditorResult<NodeKey> {
        let children = self.children(key)?;
        let Some(&last) = children.last() else {
            return Ok(key);
        };
        if index >= children.len() {
            return Ok(self.last_descendant(last)?.unwrap_or(last));
        }
        let child = children[index];
        Ok(self.first_descendant(child)?.unwrap_or(child))
    }

    /// `key` and its descendants in document order.
    fn preorder(&self, key: NodeKey) -> EditorResult<Vec<NodeKey>> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            out.push(k);
            for child in self.children(k)?.iter().rev() {
                stack.push(*child);
            }
        }
        Ok(out)
    }

    /// Child indexes from the root down to `key`.
    fn tree_path(&self, key: NodeKey) -> EditorResult<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = key;
        while !current.is_root() {
            let parent = self.parent(current)?.ok_or(EditorError::Detached(current))?;
            let index = self
                .children(parent)?
                .iter()
                .position(|k| *k == current)
                .ok_or(EditorError::Detached(current))?;
            path.push(index);
            current = parent;
        }
        path.reverse();
        Ok(path)
    }

    /// Document order; an ancestor comes before its descendants.
    fn is_before(&self, a: NodeKey, b: NodeKey) -> EditorResult<bool> {
        Ok(self.tree_path(a)? < self.tree_path(b)?)
    }

    /// Nodes from `a` to `b` inclusive, in document order.
    fn nodes_between(&self, a: NodeKey, b: NodeKey) -> EditorResult<Vec<NodeKey>> {
        if a == b {
            return Ok(vec![a]);
        }
        let (first, last) = if self.is_before(a, b)? { (a, b) } else { (b, a) };
        let order = self.preorder(NodeKey::ROOT)?;
        let start = order.iter().position(|k| *k == first);
        let end = order.iter().position(|k| *k == last);
        match (start, end) {
            (Some(start), Some(end)) => Ok(order[start..=end].to_vec()),
            _ => Err(EditorError::Detached(if start.is_none() { first } else { last })),
        }
    }

    /// Plain text of a subtree. Sibling blocks are separated by a blank line.
    fn text_content(&self, key: NodeKey) -> EditorResult<String> {
        let node = self.node(key)?;
        match node.data() {
            NodeData::Text(text) => Ok(text.text().to_string()),
            NodeData::LineBreak => Ok("\n".to_string()),
            NodeData::Decorator(_) => Ok(String::new()),
            NodeData::Root(data) | NodeData::Element(data) => {
                let mut out = String::new();
                let count = data.len();
                for (i, child) in data.children().iter().enumerate() {
                    out.push_str(&self.text_content(*child)?);
                    if i + 1 != count && self.is_element(*child) && !self.is_inline(*child)? {
                        out.push_str("\n\n");
                    }
                }
                Ok(out)
            }
        }
    }

    /// Size in characters of [`StateRead::text_content`].
    fn text_content_size(&self, key: NodeKey) -> EditorResult<usize> {
        Ok(self.text_content(key)?.chars().count())
    }

    fn node_state(&self, key: NodeKey, name: &str) -> EditorResult<Option<&Value>> {
        Ok(self.node(key)?.state(name))
    }

    /// Every node of `node_type` in the map, attached or not.
    fn nodes_of_type(&self, node_type: &str) -> Vec<NodeKey> {
        self.state()
            .node_map
            .iter()
            .filter(|(_, node)| node.node_type() == node_type)
            .map(|(key, _)| *key)
            .collect()
    }
}
