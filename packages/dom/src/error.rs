//! Error types for DOM operations

use crate::DomNodeId;
use thiserror::Error;

pub type DomResult<T> = Result<T, DomError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("DOM node {0} does not exist")]
    UnknownNode(DomNodeId),

    #[error("DOM node {0} is not an element")]
    NotAnElement(DomNodeId),

    #[error("DOM node {0} is not a text node")]
    NotAText(DomNodeId),

    #[error("cannot insert {child} under {parent}: {reason}")]
    HierarchyRequest {
        parent: DomNodeId,
        child: DomNodeId,
        reason: &'static str,
    },

    #[error("DOM node {child} is not a child of {parent}")]
    NotAChild { parent: DomNodeId, child: DomNodeId },
}
