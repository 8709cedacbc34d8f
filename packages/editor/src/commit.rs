//! Commit: reconcile the DOM, swap the current state, notify listeners.

use crate::dom_selection;
use crate::editor::{Editor, FlagScope};
use crate::listeners::UpdatePayload;
use crate::mutations::collect_mutations;
use crate::node::NodeBase;
use crate::reconciler::Reconciler;
use crate::state::EditorState;
use crate::update::{run_queued, PendingState, SKIP_DOM_SELECTION_TAG};
use crate::{EditorResult, NodeKey};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, error};

/// Commit the pending state, if any. Does nothing while an update runs.
pub(crate) fn commit_pending(editor: &Editor) -> EditorResult<()> {
    let inner = &editor.inner;
    if inner.updating.get() {
        return Ok(());
    }
    let Some(pending) = inner.pending.borrow_mut().take() else {
        return Ok(());
    };
    let prev = inner.current.borrow().clone();

    if let Err(err) = reconcile(editor, &prev, &pending) {
        error!(error = %err, "reconciliation aborted, restoring previous state");
        if let Err(render_err) = editor.render_root(&prev) {
            error!(error = %render_err, "failed to rebuild the DOM");
        }
        editor.report_error(&err);
        return Err(err);
    }

    let next = pending.state.clone();
    *inner.current.borrow_mut() = next.clone();
    inner.version.set(inner.version.get() + 1);
    debug!(
        version = inner.version.get(),
        leaves = pending.dirty_leaves.len(),
        elements = pending.dirty_elements.len(),
        "committed"
    );

    let payload = UpdatePayload {
        editor_state: next,
        prev_editor_state: prev,
        dirty_leaves: pending.dirty_leaves.clone(),
        dirty_elements: pending.dirty_elements.clone(),
        normalized_nodes: pending.normalized.clone(),
        tags: pending.tags.clone(),
    };

    {
        let _updating = FlagScope::enter(&inner.updating);
        trigger_listeners(editor, &pending, &payload);
    }

    let deferred = std::mem::take(&mut *inner.deferred.borrow_mut());
    for callback in deferred {
        callback();
    }
    run_queued(editor)
}

fn reconcile(editor: &Editor, prev: &EditorState, pending: &PendingState) -> EditorResult<()> {
    let inner = &editor.inner;
    let Some((document, root_dom)) = editor.root_handle() else {
        return Ok(());
    };
    let mut doc = document.borrow_mut();
    let observing = doc.is_observing();
    doc.disconnect();

    let outcome = {
        let mut dom_map = inner.dom_map.borrow_mut();
        let mut reconciler = Reconciler::new(prev, pending, &mut doc, &mut dom_map, &inner.config);
        reconciler.reconcile(root_dom).map(|_| reconciler.into_errors())
    };

    let selection_result = match &outcome {
        Ok(_) => {
            let selection_changed = prev.selection != pending.state.selection;
            let composing = inner.composition_key.get().is_some();
            let skip = pending.tags.contains(SKIP_DOM_SELECTION_TAG);
            if !composing && !skip && (selection_changed || doc.has_focus_within(root_dom)) {
                let dom_map = inner.dom_map.borrow();
                dom_selection::apply_selection(&mut doc, &dom_map, &pending.state)
            } else {
                Ok(())
            }
        }
        Err(_) => Ok(()),
    };

    if observing {
        doc.reconnect();
    }
    drop(doc);

    for err in outcome? {
        error!(error = %err, "node failed to render");
        editor.report_error(&err);
    }
    selection_result
}

fn trigger_listeners(editor: &Editor, pending: &PendingState, payload: &UpdatePayload) {
    let inner = &editor.inner;
    let prev = &payload.prev_editor_state;
    let next = &payload.editor_state;

    for (node_type, set) in inner.listeners.mutation_types() {
        let mutations = collect_mutations(
            prev,
            next,
            &pending.dirty_leaves,
            &pending.dirty_elements,
            pending.is_full(),
            &node_type,
        );
        if mutations.is_empty() {
            continue;
        }
        for listener in set.snapshot() {
            listener(&mutations, payload);
        }
    }

    let decorators = next_decorators(editor, pending);
    if decorators != *inner.decorators.borrow() {
        *inner.decorators.borrow_mut() = decorators.clone();
        for listener in inner.listeners.decorator.snapshot() {
            listener(&decorators);
        }
    }

    if !inner.listeners.text_content.is_empty() {
        let before = prev.root_text_content();
        let after = next.root_text_content();
        if before != after {
            for listener in inner.listeners.text_content.snapshot() {
                listener(&after);
            }
        }
    }

    for listener in inner.listeners.update.snapshot() {
        listener(payload);
    }
}

/// Decorator payloads after this commit. Only dirty leaves are revisited
/// unless the whole state was replaced.
fn next_decorators(editor: &Editor, pending: &PendingState) -> BTreeMap<NodeKey, Value> {
    let state = &pending.state;
    if pending.is_full() {
        return all_decorators(state);
    }
    let mut decorators = editor.inner.decorators.borrow().clone();
    for key in &pending.dirty_leaves {
        match decorate(state, *key) {
            Some(value) => decorators.insert(*key, value),
            None => decorators.remove(key),
        };
    }
    decorators
}

/// Decorator payloads of every decorator node in `state`.
pub(crate) fn all_decorators(state: &EditorState) -> BTreeMap<NodeKey, Value> {
    state
        .node_map
        .keys()
        .filter_map(|key| decorate(state, *key).map(|value| (*key, value)))
        .collect()
}

fn decorate(state: &EditorState, key: NodeKey) -> Option<Value> {
    let node = state.node_map.get(&key)?;
    if node.base() != NodeBase::Decorator {
        return None;
    }
    let behavior = state.registry.get(node.node_type()).ok()?;
    behavior.decorate(node)
}
