//! Listener registries.
//!
//! Listeners are stored behind `Rc` so the editor can snapshot a set before
//! calling it. Nothing is borrowed while a listener runs, so listeners may
//! register or unregister others, or issue updates (which are queued).

use crate::mutations::NodeMutation;
use crate::state::EditorState;
use crate::NodeKey;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;
use weft_dom::DomNodeId;

thread_local! {
    static NEXT_ID: Cell<u64> = const { Cell::new(1) };
}

fn next_id() -> u64 {
    NEXT_ID.with(|id| {
        let value = id.get();
        id.set(value + 1);
        value
    })
}

/// Handle returned by every `register_*` call.
#[derive(Clone)]
pub struct Unsubscribe(Rc<dyn Fn()>);

impl Unsubscribe {
    pub(crate) fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Remove the registration. Calling it again does nothing.
    pub fn unregister(&self) {
        (self.0)()
    }

    /// One handle that unregisters all of `handles`.
    pub fn merge(handles: Vec<Unsubscribe>) -> Self {
        Self::new(move || {
            for handle in &handles {
                handle.unregister();
            }
        })
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Unsubscribe")
    }
}

/// An ordered set of callbacks of one shape.
pub(crate) struct ListenerSet<F: ?Sized> {
    entries: Rc<RefCell<Vec<(u64, Rc<F>)>>>,
}

impl<F: ?Sized> Clone for ListenerSet<F> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<F: ?Sized> Default for ListenerSet<F> {
    fn default() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<F: ?Sized + 'static> ListenerSet<F> {
    pub(crate) fn add(&self, listener: Rc<F>) -> Unsubscribe {
        let id = next_id();
        self.entries.borrow_mut().push((id, listener));
        let entries = Rc::downgrade(&self.entries);
        Unsubscribe::new(move || {
            if let Some(entries) = entries.upgrade() {
                entries.borrow_mut().retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// The current listeners, in registration order.
    pub(crate) fn snapshot(&self) -> Vec<Rc<F>> {
        self.entries
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// What update listeners receive after a commit.
#[derive(Debug, Clone)]
pub struct UpdatePayload {
    pub editor_state: EditorState,
    pub prev_editor_state: EditorState,
    pub dirty_leaves: BTreeSet<NodeKey>,
    pub dirty_elements: BTreeMap<NodeKey, bool>,
    pub normalized_nodes: BTreeSet<NodeKey>,
    pub tags: BTreeSet<String>,
}

impl UpdatePayload {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Nothing but the selection changed.
    pub fn is_selection_only(&self) -> bool {
        self.dirty_leaves.is_empty() && self.dirty_elements.is_empty()
    }
}

pub type UpdateListener = dyn Fn(&UpdatePayload);
/// Called with the new and the previous root element.
pub type RootListener = dyn Fn(Option<DomNodeId>, Option<DomNodeId>);
pub type DecoratorListener = dyn Fn(&BTreeMap<NodeKey, Value>);
pub type TextContentListener = dyn Fn(&str);
pub type MutationListener = dyn Fn(&BTreeMap<NodeKey, NodeMutation>, &UpdatePayload);
pub type EditableListener = dyn Fn(bool);

#[derive(Default)]
pub(crate) struct Listeners {
    pub(crate) update: ListenerSet<UpdateListener>,
    pub(crate) root: ListenerSet<RootListener>,
    pub(crate) decorator: ListenerSet<DecoratorListener>,
    pub(crate) text_content: ListenerSet<TextContentListener>,
    pub(crate) mutation: RefCell<HashMap<String, ListenerSet<MutationListener>>>,
    pub(crate) editable: ListenerSet<EditableListener>,
}

impl Listeners {
    pub(crate) fn mutation_set(&self, node_type: &str) -> ListenerSet<MutationListener> {
        self.mutation
            .borrow_mut()
            .entry(node_type.to_string())
            .or_default()
            .clone()
    }

    /// Node types with at least one mutation listener.
    pub(crate) fn mutation_types(&self) -> Vec<(String, ListenerSet<MutationListener>)> {
        self.mutation
            .borrow()
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(node_type, set)| (node_type.clone(), set.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregister_removes_only_that_listener() {
        let set: ListenerSet<dyn Fn() -> u8> = ListenerSet::default();
        let first = set.add(Rc::new(|| 1));
        let _second = set.add(Rc::new(|| 2));
        first.unregister();
        first.unregister();
        let remaining: Vec<u8> = set.snapshot().iter().map(|f| f()).collect();
        assert_eq!(remaining, vec![2]);
    }

    #[test]
    fn test_merge_unregisters_all() {
        let set: ListenerSet<dyn Fn()> = ListenerSet::default();
        let handles = vec![set.add(Rc::new(|| {})), set.add(Rc::new(|| {}))];
        Unsubscribe::merge(handles).unregister();
        assert!(set.is_empty());
    }
}
