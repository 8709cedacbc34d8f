//! # Updates
//!
//! Every change to the document runs inside an update:
//!
//! ```text
//! Idle → Updating → Transforming → (Discarded | Pending) → Reconciling → Committed
//! ```
//!
//! The callback receives an [`UpdateContext`] wrapping the pending state.
//! Writes go through [`UpdateContext::get_writable`], which clones a node on
//! its first write in the cycle and marks it dirty. Ancestors get a cascade
//! mark so the reconciler can find the change from the root.

mod pipeline;
mod text;
mod tree;

pub(crate) use pipeline::{run_queued, run_update, UpdateFn};

use crate::config::EditorConfig;
use crate::editor::Editor;
use crate::node::{ElementData, Node, NodeBase, NodeData, TextData};
use crate::read::StateRead;
use crate::selection::{RangeSelection, Selection};
use crate::state::EditorState;
use crate::{EditorError, EditorResult, NodeKey};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

/// Tag that stops the commit from writing the platform selection.
pub const SKIP_DOM_SELECTION_TAG: &str = "skip-dom-selection";

/// Options for [`Editor::update_with`].
#[derive(Default)]
pub struct UpdateOptions {
    pub tags: Vec<String>,
    /// Runs after the update is committed and update listeners have fired.
    pub on_update: Option<Box<dyn FnOnce()>>,
    pub skip_transforms: bool,
    /// Commit immediately instead of waiting for the next flush.
    pub discrete: bool,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Self::default().with_tag(tag)
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_on_update(mut self, f: impl FnOnce() + 'static) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }

    pub fn skip_transforms(mut self) -> Self {
        self.skip_transforms = true;
        self
    }

    pub fn discrete(mut self) -> Self {
        self.discrete = true;
        self
    }
}

impl fmt::Debug for UpdateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateOptions")
            .field("tags", &self.tags)
            .field("on_update", &self.on_update.is_some())
            .field("skip_transforms", &self.skip_transforms)
            .field("discrete", &self.discrete)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub(crate) enum DirtyType {
    #[default]
    Clean,
    Nodes,
    /// Everything is re-rendered.
    Full,
}

/// The in-flight state of one batch of updates.
#[derive(Clone)]
pub(crate) struct PendingState {
    pub(crate) state: EditorState,
    pub(crate) dirty_leaves: BTreeSet<NodeKey>,
    /// `true` marks an intentional write, `false` a cascade from a descendant.
    pub(crate) dirty_elements: BTreeMap<NodeKey, bool>,
    pub(crate) pass_leaves: BTreeSet<NodeKey>,
    pub(crate) pass_elements: BTreeMap<NodeKey, bool>,
    /// Keys already cloned this cycle; further writes reuse the clone.
    pub(crate) cloned: HashSet<NodeKey>,
    pub(crate) normalized: BTreeSet<NodeKey>,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) dirty_type: DirtyType,
    pub(crate) discrete: bool,
}

impl PendingState {
    pub(crate) fn from_state(state: &EditorState) -> Self {
        Self {
            state: state.clone(),
            dirty_leaves: BTreeSet::new(),
            dirty_elements: BTreeMap::new(),
            pass_leaves: BTreeSet::new(),
            pass_elements: BTreeMap::new(),
            cloned: HashSet::new(),
            normalized: BTreeSet::new(),
            tags: BTreeSet::new(),
            dirty_type: DirtyType::Clean,
            discrete: false,
        }
    }

    /// A pending state that re-renders `state` from scratch.
    pub(crate) fn full(state: &EditorState) -> Self {
        let mut pending = Self::from_state(state);
        pending.dirty_type = DirtyType::Full;
        pending
    }

    pub(crate) fn has_changes(&self, current: &EditorState) -> bool {
        self.dirty_type != DirtyType::Clean || self.state.selection != current.selection
    }
}

/// Write access to the pending state, handed to update callbacks,
/// transforms and command handlers.
pub struct UpdateContext<'a> {
    pub(crate) editor: &'a Editor,
    pub(crate) pending: &'a mut PendingState,
}

impl StateRead for UpdateContext<'_> {
    fn state(&self) -> &EditorState {
        &self.pending.state
    }
}

impl<'a> UpdateContext<'a> {
    pub(crate) fn new(editor: &'a Editor, pending: &'a mut PendingState) -> Self {
        Self { editor, pending }
    }

    pub fn editor(&self) -> &Editor {
        self.editor
    }

    pub fn config(&self) -> &EditorConfig {
        self.editor.config()
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.pending.tags.insert(tag.into());
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.pending.tags.contains(tag)
    }

    pub fn composition_key(&self) -> Option<NodeKey> {
        self.editor.composition_key()
    }

    pub fn set_composition_key(&mut self, key: Option<NodeKey>) {
        self.editor.set_composition_key(key);
    }

    pub fn dirty_leaves(&self) -> &BTreeSet<NodeKey> {
        &self.pending.dirty_leaves
    }

    pub fn dirty_elements(&self) -> &BTreeMap<NodeKey, bool> {
        &self.pending.dirty_elements
    }

    /// Clone-on-first-write access to `key`; marks it dirty.
    pub fn get_writable(&mut self, key: NodeKey) -> EditorResult<&mut Node> {
        if !self.pending.cloned.contains(&key) {
            let latest = self
                .pending
                .state
                .node_map
                .get(&key)
                .ok_or(EditorError::NodeNotFound(key))?;
            let copy = Arc::new(Node::clone(latest));
            self.pending.state.node_map.insert(key, copy);
            self.pending.cloned.insert(key);
        }
        self.mark_node_dirty(key)?;
        let slot = self
            .pending
            .state
            .node_map
            .get_mut(&key)
            .ok_or(EditorError::NodeNotFound(key))?;
        Ok(Arc::make_mut(slot))
    }

    /// Produce a new revision of `key` without changing it.
    pub fn mark_dirty(&mut self, key: NodeKey) -> EditorResult<()> {
        self.get_writable(key).map(|_| ())
    }

    fn mark_node_dirty(&mut self, key: NodeKey) -> EditorResult<()> {
        let node = self.node(key)?;
        let (parent, is_element) = (node.parent(), node.is_element());

        let mut current = parent;
        while let Some(ancestor) = current {
            if self.pending.dirty_elements.contains_key(&ancestor) {
                break;
            }
            self.pending.dirty_elements.insert(ancestor, false);
            current = self.get_node(ancestor).and_then(Node::parent);
        }

        if is_element {
            self.pending.dirty_elements.insert(key, true);
            self.pending.pass_elements.insert(key, true);
        } else {
            self.pending.dirty_leaves.insert(key);
            self.pending.pass_leaves.insert(key);
        }
        if self.pending.dirty_type < DirtyType::Nodes {
            self.pending.dirty_type = DirtyType::Nodes;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Factories
    // -----------------------------------------------------------------

    /// Create a detached node of a registered type.
    pub fn create_node(&mut self, node_type: &str, data: NodeData) -> EditorResult<NodeKey> {
        let behavior = self.pending.state.registry.get(node_type)?;
        let base = behavior.base();
        if base == NodeBase::Root {
            return Err(EditorError::RootOperation("create"));
        }
        if base != data.base() {
            return Err(EditorError::InvalidOperation(format!(
                "node type '{}' is a {:?} node, got {:?} data",
                node_type,
                base,
                data.base()
            )));
        }
        let key = NodeKey::generate();
        let node = Node::new(key, Arc::from(behavior.node_type()), data);
        self.pending.state.node_map.insert(key, Arc::new(node));
        self.pending.cloned.insert(key);
        self.mark_node_dirty(key)?;
        Ok(key)
    }

    /// Create a node of `node_type` with the empty payload of its base.
    pub fn create_default(&mut self, node_type: &str) -> EditorResult<NodeKey> {
        let base = self.pending.state.registry.get(node_type)?.base();
        self.create_node(node_type, NodeData::empty(base))
    }

    pub fn create_paragraph(&mut self) -> EditorResult<NodeKey> {
        self.create_node("paragraph", NodeData::Element(ElementData::default()))
    }

    pub fn create_text_node(&mut self, text: impl Into<String>) -> EditorResult<NodeKey> {
        self.create_node("text", NodeData::Text(TextData::new(text)))
    }

    pub fn create_line_break(&mut self) -> EditorResult<NodeKey> {
        self.create_node("linebreak", NodeData::LineBreak)
    }

    // -----------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------

    pub fn get_selection(&self) -> Option<&Selection> {
        self.pending.state.selection.as_ref()
    }

    pub fn selection_mut(&mut self) -> Option<&mut Selection> {
        self.pending.state.selection.as_mut()
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.pending.state.selection = selection;
    }

    /// Swap in `state` wholesale. Dirty tracking is reset and the commit
    /// re-renders everything.
    pub fn replace_state(&mut self, state: EditorState) {
        let pending = &mut *self.pending;
        pending.state = state;
        pending.dirty_leaves.clear();
        pending.dirty_elements.clear();
        pending.pass_leaves.clear();
        pending.pass_elements.clear();
        pending.cloned.clear();
        pending.normalized.clear();
        pending.dirty_type = DirtyType::Full;
        self.editor.set_composition_key(None);
    }

    pub fn range_selection(&self) -> Option<&RangeSelection> {
        self.get_selection().and_then(Selection::as_range)
    }

    pub(crate) fn range_selection_mut(&mut self) -> Option<&mut RangeSelection> {
        self.selection_mut().and_then(Selection::as_range_mut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Editor;

    #[test]
    fn test_first_write_clones_once() {
        let editor = Editor::new();
        let mut pending = PendingState::from_state(&editor.get_editor_state());
        let mut ctx = UpdateContext::new(&editor, &mut pending);

        let p = ctx.create_paragraph().unwrap();
        ctx.append(NodeKey::ROOT, p).unwrap();
        let first = Arc::as_ptr(ctx.state().node_arc(NodeKey::ROOT).unwrap());
        ctx.mark_dirty(NodeKey::ROOT).unwrap();
        let second = Arc::as_ptr(ctx.state().node_arc(NodeKey::ROOT).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_cascade_marks_do_not_override_intentional() {
        let editor = Editor::new();
        let mut pending = PendingState::from_state(&editor.get_editor_state());
        let mut ctx = UpdateContext::new(&editor, &mut pending);

        let p = ctx.create_paragraph().unwrap();
        ctx.append(NodeKey::ROOT, p).unwrap();
        let t = ctx.create_text_node("hi").unwrap();
        ctx.append(p, t).unwrap();
        ctx.set_text_content(t, "hey").unwrap();

        assert_eq!(ctx.dirty_elements().get(&p), Some(&true));
        assert_eq!(ctx.dirty_elements().get(&NodeKey::ROOT), Some(&true));
        assert!(ctx.dirty_leaves().contains(&t));
    }

    #[test]
    fn test_create_node_checks_base() {
        let editor = Editor::new();
        let mut pending = PendingState::from_state(&editor.get_editor_state());
        let mut ctx = UpdateContext::new(&editor, &mut pending);

        assert!(matches!(
            ctx.create_node("paragraph", NodeData::LineBreak),
            Err(EditorError::InvalidOperation(_))
        ));
        assert_eq!(
            ctx.create_default("root"),
            Err(EditorError::RootOperation("create"))
        );
        assert_eq!(
            ctx.create_default("heading"),
            Err(EditorError::UnregisteredNodeType("heading".to_string()))
        );
    }
}
