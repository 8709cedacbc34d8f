//! Update pipeline: callback, queued callbacks, transforms, garbage
//! collection, selection normalization, then the commit decision.
//!
//! ```text
//! run_update
//!   ├─ updating?  → queue and return
//!   ├─ callback + drained queue   (against the pending state)
//!   ├─ transforms / normalization (to fixpoint, draining nested updates)
//!   ├─ garbage collection         (detached dirty nodes)
//!   ├─ selection normalization
//!   └─ discard | keep pending | commit (discrete)
//! ```

use super::{DirtyType, PendingState, UpdateContext, UpdateOptions};
use crate::commit;
use crate::editor::{Editor, FlagScope};
use crate::node::Node;
use crate::read::StateRead;
use crate::selection::{Point, PointType, Selection};
use crate::{EditorError, EditorResult, NodeKey};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// A callback run against the pending state.
pub(crate) type UpdateFn = Box<dyn FnOnce(&mut UpdateContext<'_>) -> EditorResult<()>>;

/// Entry point for every update.
pub(crate) fn run_update(editor: &Editor, f: UpdateFn, options: UpdateOptions) -> EditorResult<()> {
    let inner = &editor.inner;
    if inner.updating.get() {
        trace!("update queued");
        inner.queue.borrow_mut().push_back((f, options));
        return Ok(());
    }
    if !inner.flushing_dom.get() {
        editor.flush_dom_mutations()?;
    }
    begin_update(editor, f, options)
}

/// Run queued callbacks as fresh updates, in order.
pub(crate) fn run_queued(editor: &Editor) -> EditorResult<()> {
    loop {
        let next = editor.inner.queue.borrow_mut().pop_front();
        let Some((f, options)) = next else {
            return Ok(());
        };
        begin_update(editor, f, options)?;
    }
}

struct Collected {
    tags: Vec<String>,
    on_update: Vec<Box<dyn FnOnce()>>,
    skip_transforms: bool,
    discrete: bool,
}

impl Collected {
    fn absorb(&mut self, options: UpdateOptions) {
        self.tags.extend(options.tags);
        self.on_update.extend(options.on_update);
        self.skip_transforms |= options.skip_transforms;
        self.discrete |= options.discrete;
    }
}

/// Marks the editor as updating. Dropping it while armed rolls the
/// pending state, the composition key and the queue back to how the update
/// found them, unwinding included.
struct UpdateScope<'a> {
    editor: &'a Editor,
    snapshot: Option<PendingState>,
    composition: Option<NodeKey>,
    armed: bool,
    _updating: FlagScope<'a>,
}

impl<'a> UpdateScope<'a> {
    fn enter(editor: &'a Editor, snapshot: Option<PendingState>) -> Self {
        let inner = &editor.inner;
        Self {
            editor,
            snapshot,
            composition: inner.composition_key.get(),
            armed: true,
            _updating: FlagScope::enter(&inner.updating),
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for UpdateScope<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let inner = &self.editor.inner;
        if let Ok(mut queue) = inner.queue.try_borrow_mut() {
            queue.clear();
        }
        if let Ok(mut pending) = inner.pending.try_borrow_mut() {
            *pending = self.snapshot.take();
        }
        inner.composition_key.set(self.composition);
    }
}

fn begin_update(editor: &Editor, f: UpdateFn, options: UpdateOptions) -> EditorResult<()> {
    let inner = &editor.inner;
    let existing = inner.pending.borrow_mut().take();
    let fresh = existing.is_none();
    let mut pending = match existing {
        Some(pending) => pending,
        None => PendingState::from_state(&inner.current.borrow()),
    };
    let snapshot = if fresh { None } else { Some(pending.clone()) };

    let mut collected = Collected {
        tags: Vec::new(),
        on_update: Vec::new(),
        skip_transforms: false,
        discrete: false,
    };
    collected.absorb(options);

    let scope = UpdateScope::enter(editor, snapshot);
    let result = {
        let mut ctx = UpdateContext::new(editor, &mut pending);
        run_callbacks(&mut ctx, f, &mut collected).and_then(|_| {
            apply_transforms(&mut ctx, &mut collected)?;
            garbage_collect(&mut ctx)?;
            normalize_selection(&mut ctx)
        })
    };

    if let Err(err) = result {
        debug!(error = %err, "update rolled back");
        drop(scope);
        editor.report_error(&err);
        return Err(err);
    }
    scope.disarm();

    pending.tags.extend(collected.tags);
    pending.discrete |= collected.discrete;
    let changed = pending.has_changes(&inner.current.borrow());

    if fresh && !changed {
        trace!("update discarded");
        for callback in collected.on_update {
            callback();
        }
        return Ok(());
    }

    inner.deferred.borrow_mut().extend(collected.on_update);
    let discrete = pending.discrete;
    *inner.pending.borrow_mut() = Some(pending);
    if discrete {
        commit::commit_pending(editor)?;
    }
    Ok(())
}

fn run_callbacks(
    ctx: &mut UpdateContext<'_>,
    f: UpdateFn,
    collected: &mut Collected,
) -> EditorResult<()> {
    f(ctx)?;
    drain_queue(ctx, collected)
}

/// Run updates issued from inside this one against the same pending state.
fn drain_queue(ctx: &mut UpdateContext<'_>, collected: &mut Collected) -> EditorResult<()> {
    loop {
        let next = ctx.editor.inner.queue.borrow_mut().pop_front();
        let Some((queued, options)) = next else {
            return Ok(());
        };
        collected.absorb(options);
        queued(ctx)?;
    }
}

fn apply_transforms(ctx: &mut UpdateContext<'_>, collected: &mut Collected) -> EditorResult<()> {
    let limit = ctx.config().transform_iteration_limit;
    let mut passes = 0;
    loop {
        drain_queue(ctx, collected)?;
        let run_transforms =
            !collected.skip_transforms && !ctx.editor.inner.transforms.is_empty();
        let leaves = std::mem::take(&mut ctx.pending.pass_leaves);
        let elements = std::mem::take(&mut ctx.pending.pass_elements);
        if leaves.is_empty() && elements.is_empty() {
            return Ok(());
        }
        passes += 1;
        if passes > limit {
            return Err(EditorError::InfiniteTransform(limit));
        }
        let composition = ctx.composition_key();

        for key in leaves {
            if composition == Some(key) || !ctx.is_attached(key) {
                continue;
            }
            let mergeable = ctx
                .get_node(key)
                .map(|node| node.is_simple_text() && !is_unmergeable(node))
                .unwrap_or(false);
            if mergeable {
                normalize_text_node(ctx, key)?;
            }
            if run_transforms && ctx.is_attached(key) {
                run_node_transforms(ctx, key)?;
            }
        }

        if !run_transforms {
            continue;
        }
        for (key, intentional) in elements {
            if intentional && !key.is_root() && ctx.is_attached(key) {
                run_node_transforms(ctx, key)?;
            }
        }
    }
}

fn run_node_transforms(ctx: &mut UpdateContext<'_>, key: NodeKey) -> EditorResult<()> {
    let node_type = ctx.node(key)?.node_type().to_string();
    for transform in ctx.editor.inner.transforms.for_type(&node_type) {
        if !ctx.is_attached(key) {
            break;
        }
        transform(ctx, key)?;
    }
    Ok(())
}

fn is_unmergeable(node: &Node) -> bool {
    node.as_text().map(|text| text.is_unmergeable()).unwrap_or(true)
}

fn mergeable_neighbour(ctx: &UpdateContext<'_>, key: Option<NodeKey>) -> Option<NodeKey> {
    let key = key?;
    let node = ctx.get_node(key)?;
    let composing = ctx.composition_key() == Some(key);
    (node.is_simple_text() && !is_unmergeable(node) && !composing).then_some(key)
}

fn can_merge(a: &Node, b: &Node) -> bool {
    match (a.as_text(), b.as_text()) {
        (Some(x), Some(y)) => {
            x.format() == y.format()
                && x.style() == y.style()
                && x.mode() == y.mode()
                && a.state_map() == b.state_map()
        }
        _ => false,
    }
}

/// Remove an empty text node, or merge it with equally formatted neighbours.
fn normalize_text_node(ctx: &mut UpdateContext<'_>, key: NodeKey) -> EditorResult<()> {
    if ctx.text_data(key)?.is_empty() {
        ctx.remove(key)?;
        ctx.pending.normalized.insert(key);
        return Ok(());
    }

    let mut node = key;
    while let Some(prev) = mergeable_neighbour(ctx, ctx.previous_sibling(node)?) {
        if ctx.text_data(prev)?.is_empty() {
            ctx.remove(prev)?;
        } else if can_merge(ctx.node(prev)?, ctx.node(node)?) {
            ctx.merge_with_sibling(prev, node)?;
            ctx.pending.normalized.extend([prev, node]);
            node = prev;
            break;
        } else {
            break;
        }
    }
    while let Some(next) = mergeable_neighbour(ctx, ctx.next_sibling(node)?) {
        if ctx.text_data(next)?.is_empty() {
            ctx.remove(next)?;
        } else if can_merge(ctx.node(node)?, ctx.node(next)?) {
            ctx.merge_with_sibling(node, next)?;
            ctx.pending.normalized.extend([node, next]);
            break;
        } else {
            break;
        }
    }
    Ok(())
}

/// Drop dirty nodes that ended the update detached, with their subtrees.
fn garbage_collect(ctx: &mut UpdateContext<'_>) -> EditorResult<()> {
    let candidates: Vec<NodeKey> = ctx
        .pending
        .dirty_leaves
        .iter()
        .chain(ctx.pending.dirty_elements.keys())
        .copied()
        .collect();
    let mut removed = BTreeSet::new();
    for key in candidates {
        if key.is_root() || !ctx.contains(key) || ctx.is_attached(key) {
            continue;
        }
        collect_subtree(ctx, key, &mut removed);
    }
    if removed.is_empty() {
        return Ok(());
    }
    trace!(count = removed.len(), "collected detached nodes");
    for key in &removed {
        ctx.pending.state.node_map.remove(key);
        ctx.pending.cloned.remove(key);
    }
    Ok(())
}

fn collect_subtree(ctx: &UpdateContext<'_>, key: NodeKey, out: &mut BTreeSet<NodeKey>) {
    if !out.insert(key) {
        return;
    }
    let Some(node) = ctx.get_node(key) else {
        return;
    };
    for child in node.children() {
        let owned = ctx.get_node(*child).and_then(Node::parent) == Some(key);
        if owned {
            collect_subtree(ctx, *child, out);
        }
    }
}

fn point_is_valid(ctx: &UpdateContext<'_>, point: &mut Point) -> bool {
    let Some(node) = ctx.get_node(point.key) else {
        return false;
    };
    if !ctx.is_attached(point.key) {
        return false;
    }
    let size = match (point.kind, node.as_text(), node.as_element()) {
        (PointType::Text, Some(text), _) => text.len(),
        (PointType::Element, _, Some(element)) => element.len(),
        _ => return false,
    };
    point.offset = point.offset.min(size);
    true
}

/// Null out selections pointing at nodes that did not survive the update.
fn normalize_selection(ctx: &mut UpdateContext<'_>) -> EditorResult<()> {
    let Some(mut selection) = ctx.pending.state.selection.take() else {
        return Ok(());
    };
    let keep = match &mut selection {
        Selection::Range(range) => {
            let anchor_ok = point_is_valid(ctx, &mut range.anchor);
            let focus_ok = point_is_valid(ctx, &mut range.focus);
            anchor_ok && focus_ok
        }
        Selection::Node(nodes) => {
            nodes.retain(|key| ctx.is_attached(*key));
            true
        }
        Selection::Grid(grid) => [grid.grid_key, grid.anchor_cell_key, grid.focus_cell_key]
            .iter()
            .all(|key| ctx.is_attached(*key)),
    };
    if keep {
        ctx.pending.state.selection = Some(selection);
    } else {
        trace!("selection dropped");
    }
    Ok(())
}

impl PendingState {
    pub(crate) fn is_full(&self) -> bool {
        self.dirty_type == DirtyType::Full
    }
}
