//! Undo/redo stacks of committed editor states.

use crate::merge::MergeAction;
use weft_editor::EditorState;

/// History shared between an editor and whoever drives undo/redo.
///
/// `current` is the state the user sees; the undo stack holds the states
/// before it, most recent last.
#[derive(Debug, Default)]
pub struct HistoryState {
    undo_stack: Vec<EditorState>,
    redo_stack: Vec<EditorState>,
    current: Option<EditorState>,
    /// Maximum number of undo steps kept (0 = unlimited)
    max_depth: usize,
}

impl HistoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_depth` undo steps, dropping the oldest.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    pub fn current(&self) -> Option<&EditorState> {
        self.current.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current = None;
    }

    /// Apply `action` for the freshly committed `next`.
    pub fn record(&mut self, next: EditorState, action: MergeAction) {
        match action {
            MergeAction::Discard => return,
            MergeAction::Merge => {}
            MergeAction::Push => {
                self.redo_stack.clear();
                if let Some(current) = self.current.take() {
                    self.undo_stack.push(current);
                    if self.max_depth > 0 && self.undo_stack.len() > self.max_depth {
                        self.undo_stack.remove(0);
                    }
                }
            }
        }
        self.current = Some(next);
    }

    /// Step back. Returns the state to restore.
    pub fn undo(&mut self) -> Option<EditorState> {
        let previous = self.undo_stack.pop()?;
        if let Some(current) = self.current.replace(previous.clone()) {
            self.redo_stack.push(current);
        }
        Some(previous)
    }

    /// Step forward again. Returns the state to restore.
    pub fn redo(&mut self) -> Option<EditorState> {
        let next = self.redo_stack.pop()?;
        if let Some(current) = self.current.replace(next.clone()) {
            self.undo_stack.push(current);
        }
        Some(next)
    }
}
