//! # Weft DOM
//!
//! A headless stand-in for the browser's live `contenteditable` tree.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ editor: EditorState → reconciler            │
//! └─────────────────────────────────────────────┘
//!                     ↓ patches
//! ┌─────────────────────────────────────────────┐
//! │ dom: Document arena                         │
//! │  - element / text nodes                     │
//! │  - platform selection + focus               │
//! │  - mutation observer records                │
//! └─────────────────────────────────────────────┘
//!                     ↑ records (IME, foreign edits)
//! ┌─────────────────────────────────────────────┐
//! │ host: input events, composition             │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The editor and its host share one document through [`SharedDocument`].

mod document;
mod error;
pub mod html;
mod observer;
mod selection;

use std::cell::RefCell;
use std::rc::Rc;

pub use document::{Document, DomNodeId, DomNodeKind, DomStats};
pub use error::{DomError, DomResult};
pub use observer::MutationRecord;
pub use selection::{DomPoint, DomSelection};

/// A document shared between the editor and the host driving it.
pub type SharedDocument = Rc<RefCell<Document>>;

/// Wrap a fresh document for sharing.
pub fn shared_document() -> SharedDocument {
    Rc::new(RefCell::new(Document::new()))
}
