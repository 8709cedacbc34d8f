//! # Reconciler
//!
//! Patches the live DOM from the previous state to the next one.
//!
//! ```text
//! root
//!  ├─ same Arc, not dirty     → skip subtree
//!  ├─ cascade-only element    → walk children, no list diff
//!  └─ written node            → update_dom (recreate on true)
//!       └─ element            → keyed child-list diff
//!             ├─ kept keys    → reconcile + move
//!             ├─ removed keys → unmount, unmap subtree
//!             └─ added keys   → create_dom, insert at position
//! ```
//!
//! A full pass ignores the previous state and rebuilds every DOM node below
//! the root element.

use crate::config::EditorConfig;
use crate::node::{element_style, Node, NodeBase, RenderContext};
use crate::read::StateRead;
use crate::state::EditorState;
use crate::update::PendingState;
use crate::{EditorError, EditorResult, NodeKey};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{trace, warn};
use weft_dom::{Document, DomNodeId};

/// Two-way mapping between node keys and the DOM nodes rendered for them,
/// plus the placeholder `<br>` elements the reconciler manages.
#[derive(Debug, Default)]
pub(crate) struct DomKeyMap {
    key_to_dom: HashMap<NodeKey, DomNodeId>,
    dom_to_key: HashMap<DomNodeId, NodeKey>,
    line_breaks: HashMap<DomNodeId, DomNodeId>,
}

impl DomKeyMap {
    /// Map `key` to `dom`, returning the DOM node it was mapped to before.
    pub(crate) fn insert(&mut self, key: NodeKey, dom: DomNodeId) -> Option<DomNodeId> {
        let old = self.key_to_dom.insert(key, dom);
        if let Some(old) = old.filter(|old| *old != dom) {
            if self.dom_to_key.get(&old) == Some(&key) {
                self.dom_to_key.remove(&old);
            }
            self.line_breaks.remove(&old);
        }
        self.dom_to_key.insert(dom, key);
        old
    }

    pub(crate) fn remove(&mut self, key: NodeKey) -> Option<DomNodeId> {
        let dom = self.key_to_dom.remove(&key)?;
        if self.dom_to_key.get(&dom) == Some(&key) {
            self.dom_to_key.remove(&dom);
        }
        self.line_breaks.remove(&dom);
        Some(dom)
    }

    pub(crate) fn get(&self, key: NodeKey) -> Option<DomNodeId> {
        self.key_to_dom.get(&key).copied()
    }

    pub(crate) fn key_for(&self, dom: DomNodeId) -> Option<NodeKey> {
        self.dom_to_key.get(&dom).copied()
    }

    /// The key of `dom` or of its nearest mapped ancestor.
    pub(crate) fn nearest_key(&self, document: &Document, dom: DomNodeId) -> Option<NodeKey> {
        let mut current = Some(dom);
        while let Some(node) = current {
            if let Some(key) = self.key_for(node) {
                return Some(key);
            }
            current = document.parent(node);
        }
        None
    }

    pub(crate) fn line_break(&self, element: DomNodeId) -> Option<DomNodeId> {
        self.line_breaks.get(&element).copied()
    }

    pub(crate) fn clear(&mut self) {
        self.key_to_dom.clear();
        self.dom_to_key.clear();
        self.line_breaks.clear();
    }
}

pub(crate) struct Reconciler<'a> {
    prev: &'a EditorState,
    next: &'a EditorState,
    dirty_leaves: &'a BTreeSet<NodeKey>,
    dirty_elements: &'a BTreeMap<NodeKey, bool>,
    full: bool,
    document: &'a mut Document,
    dom_map: &'a mut DomKeyMap,
    config: &'a EditorConfig,
    /// DOM a key was mapped to before it was recreated during this pass.
    replaced: HashMap<NodeKey, DomNodeId>,
    errors: Vec<EditorError>,
}

impl<'a> Reconciler<'a> {
    pub(crate) fn new(
        prev: &'a EditorState,
        pending: &'a PendingState,
        document: &'a mut Document,
        dom_map: &'a mut DomKeyMap,
        config: &'a EditorConfig,
    ) -> Self {
        Self {
            prev,
            next: &pending.state,
            dirty_leaves: &pending.dirty_leaves,
            dirty_elements: &pending.dirty_elements,
            full: pending.is_full(),
            document,
            dom_map,
            config,
            replaced: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// Errors of nodes that failed to render; their siblings still rendered.
    pub(crate) fn into_errors(self) -> Vec<EditorError> {
        self.errors
    }

    pub(crate) fn reconcile(&mut self, root_dom: DomNodeId) -> EditorResult<()> {
        if self.full {
            return self.render_full(root_dom);
        }
        let next = self.next;
        let next_root = next.node_arc(NodeKey::ROOT).ok_or(EditorError::NoRootElement)?;
        let prev_root = self
            .prev
            .node_arc(NodeKey::ROOT)
            .ok_or(EditorError::NoRootElement)?;
        if Arc::ptr_eq(prev_root, next_root) && !self.is_dirty(NodeKey::ROOT) {
            return Ok(());
        }
        if Arc::ptr_eq(prev_root, next_root) {
            for child in next_root.children() {
                self.reconcile_node(*child, root_dom)?;
            }
            Ok(())
        } else {
            self.reconcile_children(prev_root, next_root, root_dom)
        }
    }

    fn render_full(&mut self, root_dom: DomNodeId) -> EditorResult<()> {
        trace!("full render");
        self.document.clear_children(root_dom)?;
        self.dom_map.clear();
        self.dom_map.insert(NodeKey::ROOT, root_dom);
        let next = self.next;
        for child in next.children(NodeKey::ROOT)? {
            if let Some(dom) = self.create_node(*child)? {
                self.document.append_child(root_dom, dom)?;
            }
        }
        Ok(())
    }

    fn is_dirty(&self, key: NodeKey) -> bool {
        self.dirty_leaves.contains(&key) || self.dirty_elements.contains_key(&key)
    }

    /// Build the DOM for `key` and its subtree. `Ok(None)` when the node's
    /// behavior failed; the error is kept for reporting.
    fn create_node(&mut self, key: NodeKey) -> EditorResult<Option<DomNodeId>> {
        let next = self.next;
        let node = next.node(key)?;
        let behavior = next.registry().get(node.node_type())?;
        let created = {
            let mut cx = RenderContext::new(self.document, self.config);
            behavior.create_dom(node, &mut cx)
        };
        let dom = match created {
            Ok(dom) => dom,
            Err(err) => {
                warn!(key = %key, node_type = node.node_type(), error = %err, "create_dom failed");
                self.errors.push(err);
                return Ok(None);
            }
        };
        if let Some(old) = self.dom_map.insert(key, dom) {
            self.replaced.insert(key, old);
        }

        match node.base() {
            NodeBase::Element => {
                for child in node.children() {
                    if let Some(child_dom) = self.create_node(*child)? {
                        self.document.append_child(dom, child_dom)?;
                    }
                }
                self.apply_element_attributes(node, dom)?;
                self.ensure_line_break(node, dom)?;
            }
            NodeBase::Decorator => {
                self.document.set_attribute(dom, "contenteditable", "false")?;
            }
            _ => {}
        }
        Ok(Some(dom))
    }

    fn reconcile_node(&mut self, key: NodeKey, parent_dom: DomNodeId) -> EditorResult<()> {
        let (prev, next) = (self.prev, self.next);
        let prev_node = prev.node_arc(key).ok_or(EditorError::NodeNotFound(key))?;
        let next_node = next.node_arc(key).ok_or(EditorError::NodeNotFound(key))?;
        let unchanged = Arc::ptr_eq(prev_node, next_node);
        if unchanged && !self.is_dirty(key) {
            return Ok(());
        }
        let dom = self
            .dom_map
            .get(key)
            .ok_or_else(|| EditorError::Reconcile(format!("node {} has no DOM", key)))?;

        if !unchanged {
            let behavior = next.registry().get(next_node.node_type())?;
            let updated = {
                let mut cx = RenderContext::new(self.document, self.config);
                behavior.update_dom(prev_node, next_node, dom, &mut cx)
            };
            match updated {
                Ok(false) => {}
                Ok(true) => return self.recreate(key, dom, parent_dom),
                Err(err) => {
                    warn!(key = %key, error = %err, "update_dom failed");
                    self.errors.push(err);
                    return Ok(());
                }
            }
        }

        if next_node.base() != NodeBase::Element {
            return Ok(());
        }
        if unchanged {
            for child in next_node.children() {
                self.reconcile_node(*child, dom)?;
            }
        } else {
            self.apply_element_attributes(next_node, dom)?;
            self.reconcile_children(prev_node, next_node, dom)?;
        }
        self.ensure_line_break(next_node, dom)
    }

    fn recreate(&mut self, key: NodeKey, old: DomNodeId, parent_dom: DomNodeId) -> EditorResult<()> {
        trace!(key = %key, "recreating DOM");
        self.unmap_removed(key);
        if let Some(dom) = self.create_node(key)? {
            if self.document.parent(old) == Some(parent_dom) {
                self.document.replace_child(parent_dom, dom, old)?;
            } else {
                self.document.append_child(parent_dom, dom)?;
            }
        }
        Ok(())
    }

    fn reconcile_children(&mut self, prev_node: &Node, next_node: &Node, dom: DomNodeId) -> EditorResult<()> {
        let prev_children = prev_node.children();
        let next_children = next_node.children();
        if prev_children == next_children {
            for child in next_children {
                self.reconcile_node(*child, dom)?;
            }
            return Ok(());
        }

        let prev_set: HashSet<NodeKey> = prev_children.iter().copied().collect();
        let next_set: HashSet<NodeKey> = next_children.iter().copied().collect();

        // Every kept key must still have its DOM before anything is touched.
        for child in next_children.iter().filter(|k| prev_set.contains(k)) {
            if self.dom_map.get(*child).is_none() {
                return Err(EditorError::Reconcile(format!(
                    "kept child {} of {} has no DOM",
                    child,
                    next_node.key()
                )));
            }
        }

        for child in prev_children.iter().filter(|k| !next_set.contains(k)) {
            self.destroy(*child)?;
        }

        let mut slot = 0;
        for child in next_children {
            let child_dom = if prev_set.contains(child) {
                self.reconcile_node(*child, dom)?;
                self.dom_map.get(*child)
            } else {
                self.create_node(*child)?
            };
            let Some(child_dom) = child_dom else {
                continue;
            };
            let current = self.document.children(dom).get(slot).copied();
            if current != Some(child_dom) {
                self.document.insert_before(dom, child_dom, current)?;
            }
            slot += 1;
        }
        Ok(())
    }

    fn destroy(&mut self, key: NodeKey) -> EditorResult<()> {
        let dom = self
            .replaced
            .remove(&key)
            .or_else(|| self.dom_map.get(key));
        if let Some(dom) = dom {
            self.document.detach(dom)?;
        }
        self.unmap_removed(key);
        Ok(())
    }

    /// Forget the DOM of every node of `key`'s previous subtree that is gone
    /// from the next state.
    fn unmap_removed(&mut self, key: NodeKey) {
        let prev = self.prev;
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if !self.next.contains(current) {
                self.dom_map.remove(current);
            }
            if let Some(node) = prev.get_node(current) {
                stack.extend(node.children().iter().copied());
            }
        }
    }

    /// Keep the placeholder `<br>` on empty elements and on elements ending
    /// in a line break.
    fn ensure_line_break(&mut self, node: &Node, dom: DomNodeId) -> EditorResult<()> {
        let next = self.next;
        let needed = match node.children().last() {
            None => true,
            Some(last) => match next.get_node(*last) {
                Some(last) if last.is_line_break() => true,
                Some(last) if last.is_decorator() => next.is_inline(last.key())?,
                _ => false,
            },
        };
        match (needed, self.dom_map.line_break(dom)) {
            (true, Some(br)) => {
                if self.document.last_child(dom) != Some(br) {
                    self.document.append_child(dom, br)?;
                }
            }
            (true, None) => {
                let br = self.document.create_element("br");
                self.document.append_child(dom, br)?;
                self.dom_map.line_breaks.insert(dom, br);
            }
            (false, Some(br)) => {
                self.document.detach(br)?;
                self.dom_map.line_breaks.remove(&dom);
            }
            (false, None) => {}
        }
        Ok(())
    }

    fn apply_element_attributes(&mut self, node: &Node, dom: DomNodeId) -> EditorResult<()> {
        let Some(data) = node.as_element() else {
            return Ok(());
        };
        match element_style(data) {
            Some(style) => {
                if self.document.get_attribute(dom, "style") != Some(style.as_str()) {
                    self.document.set_attribute(dom, "style", style)?;
                }
            }
            None => {
                if self.document.get_attribute(dom, "style").is_some() {
                    self.document.remove_attribute(dom, "style")?;
                }
            }
        }
        match data.direction() {
            Some(direction) => {
                if self.document.get_attribute(dom, "dir") != Some(direction.as_str()) {
                    self.document.set_attribute(dom, "dir", direction.as_str())?;
                }
            }
            None => {
                if self.document.get_attribute(dom, "dir").is_some() {
                    self.document.remove_attribute(dom, "dir")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remapping_a_key_drops_the_old_line_break() {
        let mut document = Document::new();
        let old = document.create_element("p");
        let br = document.create_element("br");
        let replacement = document.create_element("p");
        let mut map = DomKeyMap::default();

        map.insert(NodeKey::ROOT, old);
        map.line_breaks.insert(old, br);
        assert_eq!(map.insert(NodeKey::ROOT, replacement), Some(old));

        assert_eq!(map.line_break(old), None);
        assert_eq!(map.key_for(old), None);
        assert_eq!(map.key_for(replacement), Some(NodeKey::ROOT));
        assert!(map.line_breaks.is_empty());
    }
}
