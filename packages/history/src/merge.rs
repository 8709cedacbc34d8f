//! Classifying committed updates for the undo stack.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use weft_editor::selection::{PointType, RangeSelection};
use weft_editor::{EditorState, NodeKey, StateRead, UpdatePayload};

/// Set on updates that restore a history entry; they are never recorded.
pub const HISTORIC_TAG: &str = "historic";
/// Forces a new undo step.
pub const HISTORY_PUSH_TAG: &str = "history-push";
/// Folds the update into the current undo step.
pub const HISTORY_MERGE_TAG: &str = "history-merge";

/// What an update did, as far as merging goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Other,
    ComposingCharacter,
    InsertCharacterAfterSelection,
    DeleteCharacterBeforeSelection,
    DeleteCharacterAfterSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// Replace the current entry.
    Merge,
    /// Move the current entry onto the undo stack.
    Push,
    /// Leave the history untouched.
    Discard,
}

/// Remembers the previous change so runs of typing collapse into one step.
#[derive(Debug)]
pub struct MergeTracker {
    delay: Duration,
    prev_type: ChangeType,
    prev_time: Instant,
}

impl MergeTracker {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            prev_type: ChangeType::Other,
            prev_time: Instant::now(),
        }
    }

    /// Decide what to do with the commit described by `payload`.
    pub fn action(&mut self, payload: &UpdatePayload, composing: bool) -> MergeAction {
        self.action_at(payload, composing, Instant::now())
    }

    pub(crate) fn action_at(
        &mut self,
        payload: &UpdatePayload,
        composing: bool,
        now: Instant,
    ) -> MergeAction {
        if payload.has_tag(HISTORIC_TAG) {
            self.prev_type = ChangeType::Other;
            self.prev_time = now;
            return MergeAction::Discard;
        }

        let change = change_type(
            &payload.prev_editor_state,
            &payload.editor_state,
            &payload.dirty_leaves,
            &payload.dirty_elements,
            composing,
        );
        let action = self.decide(payload, change, now);
        self.prev_type = change;
        self.prev_time = now;
        action
    }

    fn decide(&self, payload: &UpdatePayload, change: ChangeType, now: Instant) -> MergeAction {
        let push = payload.has_tag(HISTORY_PUSH_TAG);
        if !push && payload.has_tag(HISTORY_MERGE_TAG) {
            return MergeAction::Merge;
        }

        let dirty = !payload.dirty_leaves.is_empty() || !payload.dirty_elements.is_empty();
        if !dirty {
            return match payload.editor_state.selection() {
                Some(_) => MergeAction::Merge,
                None => MergeAction::Discard,
            };
        }

        if !push
            && change != ChangeType::Other
            && change == self.prev_type
            && now < self.prev_time + self.delay
        {
            return MergeAction::Merge;
        }

        if payload.dirty_leaves.len() == 1 {
            if let Some(key) = payload.dirty_leaves.iter().next() {
                if text_unchanged(&payload.prev_editor_state, &payload.editor_state, *key) {
                    return MergeAction::Merge;
                }
            }
        }
        MergeAction::Push
    }
}

fn range(state: &EditorState) -> Option<&RangeSelection> {
    state.selection().and_then(|selection| selection.as_range())
}

/// Dirty leaves and intentionally dirty elements that survived the update.
fn dirty_nodes(
    next: &EditorState,
    dirty_leaves: &BTreeSet<NodeKey>,
    dirty_elements: &BTreeMap<NodeKey, bool>,
) -> Vec<NodeKey> {
    let elements = dirty_elements
        .iter()
        .filter(|(key, intentional)| **intentional && !key.is_root())
        .map(|(key, _)| key);
    dirty_leaves
        .iter()
        .chain(elements)
        .copied()
        .filter(|key| next.contains(*key))
        .collect()
}

pub fn change_type(
    prev: &EditorState,
    next: &EditorState,
    dirty_leaves: &BTreeSet<NodeKey>,
    dirty_elements: &BTreeMap<NodeKey, bool>,
    composing: bool,
) -> ChangeType {
    if dirty_leaves.is_empty() && dirty_elements.is_empty() && !composing {
        return ChangeType::Other;
    }
    if composing {
        return ChangeType::ComposingCharacter;
    }
    let (Some(prev_range), Some(next_range)) = (range(prev), range(next)) else {
        return ChangeType::Other;
    };
    if !prev_range.is_collapsed() || !next_range.is_collapsed() {
        return ChangeType::Other;
    }

    let dirty = dirty_nodes(next, dirty_leaves, dirty_elements);
    match dirty.as_slice() {
        [] => ChangeType::Other,
        [key] => single_text_change(prev, next, *key, prev_range, next_range),
        _ => {
            // Typing the first character into a fresh text node.
            let prev_anchor = prev.get_node(prev_range.anchor.key);
            let fresh = !prev.contains(next_range.anchor.key) && next.contains(next_range.anchor.key);
            match prev_anchor.and_then(|node| node.as_text()) {
                Some(text) if fresh && text.len() == 1 && prev_range.anchor.offset == 1 => {
                    ChangeType::InsertCharacterAfterSelection
                }
                _ => ChangeType::Other,
            }
        }
    }
}

fn single_text_change(
    prev: &EditorState,
    next: &EditorState,
    key: NodeKey,
    prev_range: &RangeSelection,
    next_range: &RangeSelection,
) -> ChangeType {
    let before = prev.get_node(key).and_then(|node| node.as_text());
    let after = next.get_node(key).and_then(|node| node.as_text());
    let (Some(before), Some(after)) = (before, after) else {
        return ChangeType::Other;
    };
    if before.mode() != after.mode() || before.text() == after.text() {
        return ChangeType::Other;
    }

    let (prev_anchor, next_anchor) = (prev_range.anchor, next_range.anchor);
    if next_anchor.key != prev_anchor.key || next_anchor.kind != PointType::Text {
        return ChangeType::Other;
    }
    let diff = after.len() as isize - before.len() as isize;
    let (was, now) = (prev_anchor.offset, next_anchor.offset);
    match diff {
        1 if was + 1 == now => ChangeType::InsertCharacterAfterSelection,
        -1 if was == now + 1 => ChangeType::DeleteCharacterBeforeSelection,
        -1 if was == now => ChangeType::DeleteCharacterAfterSelection,
        _ => ChangeType::Other,
    }
}

/// A lone dirty text leaf that ended up identical, e.g. a format toggled
/// twice.
fn text_unchanged(prev: &EditorState, next: &EditorState, key: NodeKey) -> bool {
    match (prev.get_node(key), next.get_node(key)) {
        (Some(before), Some(after)) if before.is_text() && after.is_text() => before == after,
        _ => false,
    }
}
