//! Undo/redo against a live editor

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use weft_editor::{
    CommandPriority, Editor, EditorResult, NodeKey, UpdateOptions, CAN_REDO_COMMAND,
    CAN_UNDO_COMMAND, REDO_COMMAND, UNDO_COMMAND,
};
use weft_history::{
    register_history, HistoryState, CLEAR_HISTORY_COMMAND, DEFAULT_MERGE_WINDOW,
    HISTORY_PUSH_TAG,
};

struct Fixture {
    editor: Editor,
    history: Rc<RefCell<HistoryState>>,
    text: NodeKey,
}

impl Fixture {
    /// An editor holding "ab" with the caret at its end, history attached
    /// before any content exists.
    fn new(delay: Duration) -> EditorResult<Self> {
        let editor = Editor::new();
        let history = Rc::new(RefCell::new(HistoryState::new()));
        let _handle = register_history(&editor, history.clone(), delay);

        let key = Rc::new(Cell::new(None));
        let out = key.clone();
        editor.update(move |ctx| {
            let p = ctx.create_paragraph()?;
            let t = ctx.create_text_node("ab")?;
            ctx.append(p, t)?;
            ctx.append(NodeKey::ROOT, p)?;
            ctx.select_end(t)?;
            out.set(Some(t));
            Ok(())
        })?;
        editor.flush()?;
        let text = key.get().expect("text key");
        Ok(Self {
            editor,
            history,
            text,
        })
    }

    fn type_text(&self, text: &str, options: UpdateOptions) -> EditorResult<()> {
        let text = text.to_string();
        self.editor
            .update_with(options, move |ctx| ctx.insert_text(&text))?;
        self.editor.flush()
    }

    fn content(&self) -> String {
        self.editor.get_editor_state().root_text_content()
    }

    fn undo(&self) -> EditorResult<bool> {
        let handled = self.editor.dispatch_command(&UNDO_COMMAND, ())?;
        self.editor.flush()?;
        Ok(handled)
    }

    fn redo(&self) -> EditorResult<bool> {
        let handled = self.editor.dispatch_command(&REDO_COMMAND, ())?;
        self.editor.flush()?;
        Ok(handled)
    }
}

#[test]
fn test_typing_within_window_is_one_step() -> anyhow::Result<()> {
    let f = Fixture::new(DEFAULT_MERGE_WINDOW)?;
    f.type_text("c", UpdateOptions::new())?;
    f.type_text("d", UpdateOptions::new())?;
    assert_eq!(f.content(), "abcd");
    assert_eq!(f.history.borrow().undo_depth(), 1);

    assert!(f.undo()?);
    assert_eq!(f.content(), "ab");
    assert!(!f.undo()?);

    assert!(f.redo()?);
    assert_eq!(f.content(), "abcd");
    Ok(())
}

#[test]
fn test_history_push_tag_starts_new_step() -> anyhow::Result<()> {
    let f = Fixture::new(DEFAULT_MERGE_WINDOW)?;
    f.type_text("c", UpdateOptions::new())?;
    f.type_text("d", UpdateOptions::tag(HISTORY_PUSH_TAG))?;
    assert_eq!(f.history.borrow().undo_depth(), 2);

    f.undo()?;
    assert_eq!(f.content(), "abc");
    f.undo()?;
    assert_eq!(f.content(), "ab");
    Ok(())
}

#[test]
fn test_zero_window_never_merges_typing() -> anyhow::Result<()> {
    let f = Fixture::new(Duration::ZERO)?;
    f.type_text("c", UpdateOptions::new())?;
    f.type_text("d", UpdateOptions::new())?;
    assert_eq!(f.history.borrow().undo_depth(), 2);
    Ok(())
}

#[test]
fn test_restored_state_keeps_selection() -> anyhow::Result<()> {
    let f = Fixture::new(DEFAULT_MERGE_WINDOW)?;
    f.type_text("c", UpdateOptions::new())?;
    f.undo()?;

    let state = f.editor.get_editor_state();
    let range = weft_editor::StateRead::selection(&state)
        .and_then(|selection| selection.as_range())
        .cloned()
        .expect("range selection");
    assert_eq!(range.anchor.key, f.text);
    assert_eq!(range.anchor.offset, 2);

    // Typing after an undo discards the redo branch.
    f.type_text("z", UpdateOptions::new())?;
    assert_eq!(f.content(), "abz");
    assert!(!f.history.borrow().can_redo());
    assert!(!f.redo()?);
    Ok(())
}

#[test]
fn test_availability_commands_fire() -> anyhow::Result<()> {
    let f = Fixture::new(DEFAULT_MERGE_WINDOW)?;
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let _undo = f
        .editor
        .register_command(&CAN_UNDO_COMMAND, CommandPriority::Editor, move |can, _| {
            log.borrow_mut().push(("undo", *can));
            Ok(false)
        });
    let log = seen.clone();
    let _redo = f
        .editor
        .register_command(&CAN_REDO_COMMAND, CommandPriority::Editor, move |can, _| {
            log.borrow_mut().push(("redo", *can));
            Ok(false)
        });

    f.type_text("c", UpdateOptions::new())?;
    f.undo()?;
    f.editor.dispatch_command(&CLEAR_HISTORY_COMMAND, ())?;
    f.editor.flush()?;

    assert_eq!(
        *seen.borrow(),
        vec![
            ("undo", true),
            ("undo", false),
            ("redo", true),
            ("undo", false),
            ("redo", false),
        ]
    );
    assert!(f.history.borrow().current().is_none());
    Ok(())
}
