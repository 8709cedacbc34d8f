//! Platform selection.

use crate::DomNodeId;
use serde::{Deserialize, Serialize};

/// A boundary point: a DOM node and an offset into it.
///
/// For text nodes the offset counts characters, for elements it counts children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomPoint {
    pub node: DomNodeId,
    pub offset: usize,
}

impl DomPoint {
    pub fn new(node: DomNodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// The document's single selection range, anchor first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomSelection {
    pub anchor: DomPoint,
    pub focus: DomPoint,
}

impl DomSelection {
    pub fn collapsed(point: DomPoint) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}
