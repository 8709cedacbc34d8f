//! # Weft Editor
//!
//! Rich-text editing engine: an immutable node tree, a transactional update
//! pipeline and a reconciler that patches a DOM to match.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ update: callbacks against the pending state │
//! │  - copy-on-write node writes                │
//! │  - transforms to fixpoint                   │
//! │  - text normalization, GC, selection fixup  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ commit: reconcile dirty subtrees into DOM   │
//! │  - write the platform selection             │
//! │  - fire mutation/decorator/text/update      │
//! │    listeners                                │
//! └─────────────────────────────────────────────┘
//!                     ↑
//! ┌─────────────────────────────────────────────┐
//! │ observer: DOM edits folded back into nodes  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **States are immutable**: every commit produces a new [`EditorState`]
//! 2. **Keys are the only references**: nodes point at each other by [`NodeKey`]
//! 3. **The DOM is derived**: foreign DOM edits are either adopted or reverted
//! 4. **Updates batch**: nothing renders until [`Editor::flush`] or a discrete update
//! 5. **Reentrancy queues**: updates issued while one runs are run after it
//!
//! ## Usage
//!
//! ```rust,ignore
//! use weft_editor::{Editor, NodeKey};
//! use weft_dom::shared_document;
//!
//! let editor = Editor::new();
//! let document = shared_document();
//! let root = document.borrow_mut().create_element("div");
//! editor.set_root_element(&document, root)?;
//!
//! editor.update(|ctx| {
//!     let p = ctx.create_paragraph()?;
//!     let text = ctx.create_text_node("Hello")?;
//!     ctx.append(p, text)?;
//!     ctx.append(NodeKey::ROOT, p)?;
//!     ctx.select_end(text)?;
//!     Ok(())
//! })?;
//! editor.flush()?;
//!
//! assert_eq!(
//!     document.borrow().inner_html(root),
//!     r#"<p><span data-weft-text="true">Hello</span></p>"#
//! );
//! ```

mod commands;
mod commit;
mod config;
mod dom_selection;
mod editor;
mod errors;
mod html;
mod key;
mod listeners;
mod mutations;
pub mod node;
mod observer;
mod read;
mod reconciler;
pub mod selection;
mod serialize;
mod state;
mod transforms;
mod update;

pub use commands::{
    create_command, Command, CommandPriority, BLUR_COMMAND, CAN_REDO_COMMAND, CAN_UNDO_COMMAND,
    CONTROLLED_TEXT_INSERTION_COMMAND, DELETE_CHARACTER_COMMAND, FOCUS_COMMAND,
    FORMAT_TEXT_COMMAND, INSERT_LINE_BREAK_COMMAND, INSERT_PARAGRAPH_COMMAND, REDO_COMMAND,
    REMOVE_TEXT_COMMAND, SELECTION_CHANGE_COMMAND, UNDO_COMMAND,
};
pub use config::{EditorConfig, Theme, DEFAULT_TRANSFORM_ITERATION_LIMIT};
pub use editor::{Editor, EditorBuilder, ErrorHandler, WeakEditor};
pub use errors::{EditorError, EditorResult};
pub use html::{generate_html_from_nodes, generate_nodes_from_dom};
pub use key::NodeKey;
pub use listeners::{
    DecoratorListener, EditableListener, MutationListener, RootListener, TextContentListener,
    Unsubscribe, UpdateListener, UpdatePayload,
};
pub use mutations::NodeMutation;
pub use read::StateRead;
pub use serialize::{export_base_fields, import_base_fields, SerializedEditorState, SerializedNode};
pub use state::{EditorState, NodeMap};
pub use transforms::NodeTransform;
pub use update::{UpdateContext, UpdateOptions, SKIP_DOM_SELECTION_TAG};

// Re-export the DOM host so consumers need only one dependency.
pub use weft_dom;
