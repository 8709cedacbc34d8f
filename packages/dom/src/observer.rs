//! Mutation observer records.
//!
//! The observer watches one subtree. While connected, every character-data or
//! child-list change under that subtree is queued as a [`MutationRecord`] until
//! the owner drains the queue with [`Document::take_records`](crate::Document::take_records).

use crate::DomNodeId;
use serde::{Deserialize, Serialize};

/// A single observed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MutationRecord {
    /// The data of a text node changed.
    CharacterData { target: DomNodeId, old_value: String },

    /// Children were added to or removed from `target`.
    ChildList {
        target: DomNodeId,
        added: Vec<DomNodeId>,
        removed: Vec<DomNodeId>,
    },
}

impl MutationRecord {
    pub fn target(&self) -> DomNodeId {
        match self {
            MutationRecord::CharacterData { target, .. } => *target,
            MutationRecord::ChildList { target, .. } => *target,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Observer {
    pub(crate) root: Option<DomNodeId>,
    pub(crate) connected: bool,
    pub(crate) records: Vec<MutationRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = MutationRecord::CharacterData {
            target: DomNodeId(3),
            old_value: "ab".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "characterData");
        assert_eq!(json["target"], 3);
        assert_eq!(record.target(), DomNodeId(3));
    }
}
