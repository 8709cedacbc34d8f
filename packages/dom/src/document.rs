//! # Document Arena
//!
//! The live tree the reconciler patches. Nodes are addressed by [`DomNodeId`]
//! and never freed: a detached node stays valid so it can be re-inserted, which
//! is what a moved child or a re-attached managed node needs.

use crate::error::{DomError, DomResult};
use crate::html;
use crate::observer::{MutationRecord, Observer};
use crate::selection::DomSelection;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Identity of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DomNodeId(pub u32);

impl fmt::Display for DomNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomNodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text {
        data: String,
    },
}

#[derive(Debug, Clone)]
struct DomNode {
    kind: DomNodeKind,
    parent: Option<DomNodeId>,
    children: Vec<DomNodeId>,
}

/// Operation counters, used to assert how much work a reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomStats {
    pub created: usize,
    pub inserted: usize,
    pub removed: usize,
    pub text_writes: usize,
    pub attribute_writes: usize,
    pub selection_writes: usize,
}

#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<DomNode>,
    observer: Observer,
    selection: Option<DomSelection>,
    active_element: Option<DomNodeId>,
    stats: DomStats,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    pub fn create_element(&mut self, tag: impl Into<String>) -> DomNodeId {
        self.push(DomNodeKind::Element {
            tag: tag.into().to_ascii_lowercase(),
            attributes: Vec::new(),
        })
    }

    pub fn create_text_node(&mut self, data: impl Into<String>) -> DomNodeId {
        self.push(DomNodeKind::Text { data: data.into() })
    }

    fn push(&mut self, kind: DomNodeKind) -> DomNodeId {
        let id = DomNodeId(self.nodes.len() as u32);
        self.nodes.push(DomNode {
            kind,
            parent: None,
            children: Vec::new(),
        });
        self.stats.created += 1;
        id
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    fn node(&self, id: DomNodeId) -> DomResult<&DomNode> {
        self.nodes.get(id.0 as usize).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: DomNodeId) -> DomResult<&mut DomNode> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or(DomError::UnknownNode(id))
    }

    pub fn exists(&self, id: DomNodeId) -> bool {
        (id.0 as usize) < self.nodes.len()
    }

    pub fn kind(&self, id: DomNodeId) -> DomResult<&DomNodeKind> {
        Ok(&self.node(id)?.kind)
    }

    pub fn is_element(&self, id: DomNodeId) -> bool {
        matches!(self.kind(id), Ok(DomNodeKind::Element { .. }))
    }

    pub fn is_text(&self, id: DomNodeId) -> bool {
        matches!(self.kind(id), Ok(DomNodeKind::Text { .. }))
    }

    pub fn tag_name(&self, id: DomNodeId) -> Option<&str> {
        match self.kind(id).ok()? {
            DomNodeKind::Element { tag, .. } => Some(tag),
            DomNodeKind::Text { .. } => None,
        }
    }

    /// Data of a text node.
    pub fn text(&self, id: DomNodeId) -> Option<&str> {
        match self.kind(id).ok()? {
            DomNodeKind::Text { data } => Some(data),
            DomNodeKind::Element { .. } => None,
        }
    }

    pub fn parent(&self, id: DomNodeId) -> Option<DomNodeId> {
        self.node(id).ok()?.parent
    }

    pub fn children(&self, id: DomNodeId) -> &[DomNodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn first_child(&self, id: DomNodeId) -> Option<DomNodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: DomNodeId) -> Option<DomNodeId> {
        self.children(id).last().copied()
    }

    pub fn child_index(&self, id: DomNodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn next_sibling(&self, id: DomNodeId) -> Option<DomNodeId> {
        let parent = self.parent(id)?;
        let index = self.child_index(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: DomNodeId) -> Option<DomNodeId> {
        let parent = self.parent(id)?;
        let index = self.child_index(id)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    /// Inclusive ancestry check.
    pub fn contains(&self, ancestor: DomNodeId, node: DomNodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    pub fn text_content(&self, id: DomNodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: DomNodeId, out: &mut String) {
        match self.kind(id) {
            Ok(DomNodeKind::Text { data }) => out.push_str(data),
            Ok(DomNodeKind::Element { .. }) => {
                for child in self.children(id) {
                    self.collect_text(*child, out);
                }
            }
            Err(_) => {}
        }
    }

    // ---------------------------------------------------------------------
    // Attributes and text
    // ---------------------------------------------------------------------

    pub fn attributes(&self, id: DomNodeId) -> &[(String, String)] {
        match self.kind(id) {
            Ok(DomNodeKind::Element { attributes, .. }) => attributes,
            _ => &[],
        }
    }

    pub fn get_attribute(&self, id: DomNodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(
        &mut self,
        id: DomNodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> DomResult<()> {
        let name = name.into();
        let value = value.into();
        match &mut self.node_mut(id)?.kind {
            DomNodeKind::Element { attributes, .. } => {
                if let Some(slot) = attributes.iter_mut().find(|(n, _)| *n == name) {
                    if slot.1 == value {
                        return Ok(());
                    }
                    slot.1 = value;
                } else {
                    attributes.push((name, value));
                }
            }
            DomNodeKind::Text { .. } => return Err(DomError::NotAnElement(id)),
        }
        self.stats.attribute_writes += 1;
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: DomNodeId, name: &str) -> DomResult<()> {
        match &mut self.node_mut(id)?.kind {
            DomNodeKind::Element { attributes, .. } => {
                let before = attributes.len();
                attributes.retain(|(n, _)| n != name);
                if attributes.len() != before {
                    self.stats.attribute_writes += 1;
                }
                Ok(())
            }
            DomNodeKind::Text { .. } => Err(DomError::NotAnElement(id)),
        }
    }

    /// Replace the data of a text node.
    pub fn set_text(&mut self, id: DomNodeId, data: impl Into<String>) -> DomResult<()> {
        let data = data.into();
        let old_value = match &mut self.node_mut(id)?.kind {
            DomNodeKind::Text { data: current } => {
                if *current == data {
                    return Ok(());
                }
                std::mem::replace(current, data)
            }
            DomNodeKind::Element { .. } => return Err(DomError::NotAText(id)),
        };
        self.stats.text_writes += 1;
        self.record(MutationRecord::CharacterData {
            target: id,
            old_value,
        });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Tree mutation
    // ---------------------------------------------------------------------

    pub fn append_child(&mut self, parent: DomNodeId, child: DomNodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference`, or at the end when
    /// `reference` is `None`. A child that already has a parent is moved.
    pub fn insert_before(
        &mut self,
        parent: DomNodeId,
        child: DomNodeId,
        reference: Option<DomNodeId>,
    ) -> DomResult<()> {
        self.validate_insertion(parent, child)?;
        if let Some(reference) = reference {
            if reference == child {
                return Ok(());
            }
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }

        self.detach(child)?;

        let index = match reference {
            Some(reference) => self
                .children(parent)
                .iter()
                .position(|c| *c == reference)
                .ok_or(DomError::NotAChild {
                    parent,
                    child: reference,
                })?,
            None => self.children(parent).len(),
        };

        self.node_mut(parent)?.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        self.stats.inserted += 1;
        self.record(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    fn validate_insertion(&self, parent: DomNodeId, child: DomNodeId) -> DomResult<()> {
        self.node(child)?;
        match self.kind(parent)? {
            DomNodeKind::Element { .. } => {}
            DomNodeKind::Text { .. } => return Err(DomError::NotAnElement(parent)),
        }
        if self.contains(child, parent) {
            return Err(DomError::HierarchyRequest {
                parent,
                child,
                reason: "the child is an inclusive ancestor of the parent",
            });
        }
        Ok(())
    }

    pub fn remove_child(&mut self, parent: DomNodeId, child: DomNodeId) -> DomResult<()> {
        if self.parent(child) != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.detach(child)
    }

    /// Replace `old` (a child of `parent`) with `new`.
    pub fn replace_child(
        &mut self,
        parent: DomNodeId,
        new: DomNodeId,
        old: DomNodeId,
    ) -> DomResult<()> {
        if self.parent(old) != Some(parent) {
            return Err(DomError::NotAChild { parent, child: old });
        }
        if new == old {
            return Ok(());
        }
        self.insert_before(parent, new, Some(old))?;
        self.remove_child(parent, old)
    }

    /// Remove a node from its parent, if it has one.
    pub fn detach(&mut self, id: DomNodeId) -> DomResult<()> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|c| *c != id);
        self.node_mut(id)?.parent = None;
        self.stats.removed += 1;
        self.record(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![id],
        });
        Ok(())
    }

    /// Detach every child of `id`.
    pub fn clear_children(&mut self, id: DomNodeId) -> DomResult<()> {
        let children = self.children(id).to_vec();
        for child in children {
            self.detach(child)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Serialization
    // ---------------------------------------------------------------------

    pub fn outer_html(&self, id: DomNodeId) -> String {
        let mut out = String::new();
        html::write_node(self, id, &mut out);
        out
    }

    pub fn inner_html(&self, id: DomNodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            html::write_node(self, *child, &mut out);
        }
        out
    }

    // ---------------------------------------------------------------------
    // Selection and focus
    // ---------------------------------------------------------------------

    pub fn selection(&self) -> Option<&DomSelection> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, selection: DomSelection) {
        if self.selection.as_ref() != Some(&selection) {
            self.stats.selection_writes += 1;
        }
        self.selection = Some(selection);
    }

    pub fn clear_selection(&mut self) {
        if self.selection.take().is_some() {
            self.stats.selection_writes += 1;
        }
    }

    pub fn focus(&mut self, id: DomNodeId) {
        self.active_element = Some(id);
    }

    pub fn blur(&mut self) {
        self.active_element = None;
    }

    pub fn active_element(&self) -> Option<DomNodeId> {
        self.active_element
    }

    /// Whether focus is on `root` or one of its descendants.
    pub fn has_focus_within(&self, root: DomNodeId) -> bool {
        self.active_element
            .map(|active| self.contains(root, active))
            .unwrap_or(false)
    }

    // ---------------------------------------------------------------------
    // Mutation observer
    // ---------------------------------------------------------------------

    /// Start observing the subtree rooted at `root`. Replaces any previous target.
    pub fn observe(&mut self, root: DomNodeId) {
        trace!(root = %root, "mutation observer connected");
        self.observer.root = Some(root);
        self.observer.connected = true;
    }

    /// Stop recording. Already queued records are kept.
    pub fn disconnect(&mut self) {
        trace!("mutation observer disconnected");
        self.observer.connected = false;
    }

    /// Resume recording on the last observed root.
    pub fn reconnect(&mut self) {
        if self.observer.root.is_some() {
            self.observer.connected = true;
        }
    }

    pub fn is_observing(&self) -> bool {
        self.observer.connected
    }

    pub fn has_records(&self) -> bool {
        !self.observer.records.is_empty()
    }

    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.observer.records)
    }

    fn record(&mut self, record: MutationRecord) {
        if !self.observer.connected {
            return;
        }
        let Some(root) = self.observer.root else {
            return;
        };
        if self.contains(root, record.target()) {
            self.observer.records.push(record);
        }
    }

    // ---------------------------------------------------------------------
    // Stats
    // ---------------------------------------------------------------------

    pub fn stats(&self) -> DomStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = DomStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::DomPoint;

    #[test]
    fn test_build_and_serialize() {
        let mut doc = Document::new();
        let root = doc.create_element("div");
        let p = doc.create_element("P");
        let text = doc.create_text_node("a < b");
        doc.append_child(root, p).unwrap();
        doc.append_child(p, text).unwrap();
        doc.set_attribute(p, "class", "para").unwrap();

        assert_eq!(
            doc.outer_html(root),
            r#"<div><p class="para">a &lt; b</p></div>"#
        );
        assert_eq!(doc.text_content(root), "a < b");
    }

    #[test]
    fn test_insert_before_moves_existing_child() {
        let mut doc = Document::new();
        let root = doc.create_element("div");
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(root, a).unwrap();
        doc.append_child(root, b).unwrap();

        doc.insert_before(root, b, Some(a)).unwrap();
        assert_eq!(doc.children(root), &[b, a]);
        assert_eq!(doc.child_index(a), Some(1));
        assert_eq!(doc.next_sibling(b), Some(a));
        assert_eq!(doc.previous_sibling(a), Some(b));
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner).unwrap();

        let err = doc.append_child(inner, outer).unwrap_err();
        assert!(matches!(err, DomError::HierarchyRequest { .. }));
    }

    #[test]
    fn test_text_writes_require_text_nodes() {
        let mut doc = Document::new();
        let el = doc.create_element("span");
        assert_eq!(doc.set_text(el, "x"), Err(DomError::NotAText(el)));
    }

    #[test]
    fn test_observer_records_only_while_connected() {
        let mut doc = Document::new();
        let root = doc.create_element("div");
        let text = doc.create_text_node("abc");
        doc.append_child(root, text).unwrap();

        doc.observe(root);
        doc.set_text(text, "abcd").unwrap();
        doc.disconnect();
        doc.set_text(text, "abcde").unwrap();
        doc.reconnect();

        let records = doc.take_records();
        assert_eq!(
            records,
            vec![MutationRecord::CharacterData {
                target: text,
                old_value: "abc".to_string()
            }]
        );
        assert!(!doc.has_records());
    }

    #[test]
    fn test_observer_ignores_nodes_outside_root() {
        let mut doc = Document::new();
        let root = doc.create_element("div");
        let elsewhere = doc.create_element("div");
        let text = doc.create_text_node("x");
        doc.append_child(elsewhere, text).unwrap();

        doc.observe(root);
        doc.set_text(text, "y").unwrap();
        assert!(!doc.has_records());
    }

    #[test]
    fn test_stats_and_focus() {
        let mut doc = Document::new();
        let root = doc.create_element("div");
        let child = doc.create_element("p");
        doc.reset_stats();

        doc.append_child(root, child).unwrap();
        doc.remove_child(root, child).unwrap();
        let stats = doc.stats();
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.created, 0);

        doc.append_child(root, child).unwrap();
        doc.focus(child);
        assert!(doc.has_focus_within(root));
        doc.set_selection(DomSelection::collapsed(DomPoint::new(child, 0)));
        assert!(doc.selection().unwrap().is_collapsed());
        doc.blur();
        assert!(!doc.has_focus_within(root));
    }
}
