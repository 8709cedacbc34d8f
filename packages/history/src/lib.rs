//! # Weft History
//!
//! Undo/redo for a weft editor, built entirely on the public editor API:
//! an update listener records committed states, command handlers restore
//! them.
//!
//! ## Design
//!
//! - Every commit is classified as merge, push or discard
//! - Runs of the same kind of typing within the merge window merge into one step
//! - Restoring a state tags its update `historic`, which is never recorded
//! - `CAN_UNDO_COMMAND`/`CAN_REDO_COMMAND` are dispatched when availability changes
//!
//! ## Example
//!
//! ```rust,ignore
//! let history = Rc::new(RefCell::new(HistoryState::new()));
//! let _handle = register_history(&editor, history.clone(), DEFAULT_MERGE_WINDOW);
//!
//! editor.dispatch_command(&UNDO_COMMAND, ())?;
//! editor.flush()?;
//! ```

mod merge;
mod state;

pub use merge::{
    change_type, ChangeType, MergeAction, MergeTracker, HISTORIC_TAG, HISTORY_MERGE_TAG,
    HISTORY_PUSH_TAG,
};
pub use state::HistoryState;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};
use weft_editor::{
    create_command, Command, CommandPriority, Editor, EditorResult, UpdateContext, Unsubscribe,
    CAN_REDO_COMMAND, CAN_UNDO_COMMAND, REDO_COMMAND, UNDO_COMMAND,
};

/// Updates of one kind closer together than this merge.
pub const DEFAULT_MERGE_WINDOW: Duration = Duration::from_millis(1000);

/// Drop all undo/redo steps.
pub const CLEAR_HISTORY_COMMAND: Command<()> = create_command("CLEAR_HISTORY_COMMAND");

/// Track the history of `editor` in `history`. `delay` is the merge window.
pub fn register_history(
    editor: &Editor,
    history: Rc<RefCell<HistoryState>>,
    delay: Duration,
) -> Unsubscribe {
    let tracker = RefCell::new(MergeTracker::new(delay));
    let weak = editor.downgrade();
    let recorder = history.clone();
    let listener = editor.register_update_listener(move |payload| {
        let Some(editor) = weak.upgrade() else {
            return;
        };
        let action = tracker.borrow_mut().action(payload, editor.is_composing());
        debug!(?action, "history");

        let before = availability(&recorder.borrow());
        recorder
            .borrow_mut()
            .record(payload.editor_state.clone(), action);
        let after = availability(&recorder.borrow());
        // Listeners run inside the commit, so these dispatches queue.
        if before.0 != after.0 {
            if let Err(err) = editor.dispatch_command(&CAN_UNDO_COMMAND, after.0) {
                warn!(error = %err, "failed to announce undo availability");
            }
        }
        if before.1 != after.1 {
            if let Err(err) = editor.dispatch_command(&CAN_REDO_COMMAND, after.1) {
                warn!(error = %err, "failed to announce redo availability");
            }
        }
    });

    let undo_history = history.clone();
    let undo = editor.register_command(&UNDO_COMMAND, CommandPriority::Editor, move |_, ctx| {
        restore(ctx, &undo_history, HistoryState::undo)
    });
    let redo_history = history.clone();
    let redo = editor.register_command(&REDO_COMMAND, CommandPriority::Editor, move |_, ctx| {
        restore(ctx, &redo_history, HistoryState::redo)
    });
    let clear = editor.register_command(
        &CLEAR_HISTORY_COMMAND,
        CommandPriority::Editor,
        move |_, ctx| {
            history.borrow_mut().clear();
            ctx.dispatch_command(&CAN_UNDO_COMMAND, false)?;
            ctx.dispatch_command(&CAN_REDO_COMMAND, false)?;
            Ok(true)
        },
    );

    Unsubscribe::merge(vec![listener, undo, redo, clear])
}

fn availability(history: &HistoryState) -> (bool, bool) {
    (history.can_undo(), history.can_redo())
}

fn restore(
    ctx: &mut UpdateContext<'_>,
    history: &RefCell<HistoryState>,
    step: fn(&mut HistoryState) -> Option<weft_editor::EditorState>,
) -> EditorResult<bool> {
    let before = availability(&history.borrow());
    let Some(state) = step(&mut history.borrow_mut()) else {
        return Ok(false);
    };
    let after = availability(&history.borrow());

    ctx.add_tag(HISTORIC_TAG);
    ctx.replace_state(state);
    if before.0 != after.0 {
        ctx.dispatch_command(&CAN_UNDO_COMMAND, after.0)?;
    }
    if before.1 != after.1 {
        ctx.dispatch_command(&CAN_REDO_COMMAND, after.1)?;
    }
    Ok(true)
}
