//! # Node Transforms
//!
//! Transforms are per-type callbacks that run after an update's callback
//! returns. They see every node of their type that was written during the
//! update and may write further nodes; the pipeline repeats until a pass
//! writes nothing new.
//!
//! Transforms should be:
//! - **Idempotent**: running twice on a settled node changes nothing
//! - **Local**: they touch the node they are given and its neighbourhood

use crate::listeners::{ListenerSet, Unsubscribe};
use crate::update::UpdateContext;
use crate::{EditorResult, NodeKey};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type NodeTransform = dyn Fn(&mut UpdateContext<'_>, NodeKey) -> EditorResult<()>;

#[derive(Default)]
pub(crate) struct TransformRegistry {
    by_type: RefCell<HashMap<String, ListenerSet<NodeTransform>>>,
}

impl TransformRegistry {
    pub(crate) fn register(&self, node_type: &str, transform: Rc<NodeTransform>) -> Unsubscribe {
        let set = self
            .by_type
            .borrow_mut()
            .entry(node_type.to_string())
            .or_default()
            .clone();
        set.add(transform)
    }

    pub(crate) fn for_type(&self, node_type: &str) -> Vec<Rc<NodeTransform>> {
        self.by_type
            .borrow()
            .get(node_type)
            .map(ListenerSet::snapshot)
            .unwrap_or_default()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_type.borrow().values().all(ListenerSet::is_empty)
    }
}
