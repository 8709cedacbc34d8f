//! Error types for the editor

use crate::NodeKey;
use thiserror::Error;
use weft_dom::DomError;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeKey),

    #[error("Node {0} is not attached to a parent")]
    Detached(NodeKey),

    #[error("Node {key} ({node_type}) is not an element")]
    NotAnElement { key: NodeKey, node_type: String },

    #[error("Node {key} ({node_type}) is not a text node")]
    NotText { key: NodeKey, node_type: String },

    #[error("Inserting {child} under {parent} would create a cycle")]
    CycleDetected { parent: NodeKey, child: NodeKey },

    #[error("Operation not permitted on the root node: {0}")]
    RootOperation(&'static str),

    #[error("Node type '{0}' is not registered")]
    UnregisteredNodeType(String),

    #[error("Node type '{0}' is already registered")]
    DuplicateNodeType(String),

    #[error("Offset {offset} is out of bounds for {key} (size {size})")]
    OffsetOutOfBounds {
        key: NodeKey,
        offset: usize,
        size: usize,
    },

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Transforms did not settle after {0} passes")]
    InfiniteTransform(usize),

    #[error("Reconciliation failed: {0}")]
    Reconcile(String),

    #[error("DOM error: {0}")]
    Dom(#[from] DomError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Callback failed: {0}")]
    Callback(String),

    #[error("Editor state has no root element")]
    NoRootElement,
}

impl From<serde_json::Error> for EditorError {
    fn from(e: serde_json::Error) -> Self {
        EditorError::Serialization(e.to_string())
    }
}
