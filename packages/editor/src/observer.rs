//! # Mutation Observer Bridge
//!
//! Changes made to the DOM outside the reconciler (IME composition, spell
//! checkers, extensions) arrive as observer records. They are folded back
//! into the node tree by one update tagged `skip-dom-selection`:
//!
//! - character data under a text node becomes that node's text
//! - child lists of rendered elements are repaired to what the reconciler
//!   rendered: foreign DOM is removed, removed managed DOM is put back

use crate::commands::SELECTION_CHANGE_COMMAND;
use crate::dom_selection::selection_from_dom;
use crate::editor::{Editor, FlagScope};
use crate::node::{NodeBase, TextMode};
use crate::read::StateRead;
use crate::reconciler::DomKeyMap;
use crate::selection::{Point, PointType};
use crate::state::EditorState;
use crate::update::{run_update, UpdateContext, UpdateOptions, SKIP_DOM_SELECTION_TAG};
use crate::{EditorResult, NodeKey};
use std::collections::BTreeSet;
use tracing::{debug, trace};
use weft_dom::{Document, DomNodeId, MutationRecord, SharedDocument};

impl Editor {
    /// Apply pending observer records. Runs before every update so DOM
    /// changes land in causal order.
    pub fn flush_dom_mutations(&self) -> EditorResult<()> {
        let Some((document, _)) = self.root_handle() else {
            return Ok(());
        };
        let records = document.borrow_mut().take_records();
        if records.is_empty() {
            return Ok(());
        }
        debug!(records = records.len(), "flushing DOM mutations");

        let _flushing = FlagScope::enter(&self.inner.flushing_dom);
        run_update(
            self,
            Box::new(move |ctx| apply_records(ctx, &document, records)),
            UpdateOptions::tag(SKIP_DOM_SELECTION_TAG).discrete(),
        )
    }

    pub fn is_composing(&self) -> bool {
        self.inner.composition_key.get().is_some()
    }

    /// Begin an IME composition at the caret. A caret on an element gets an
    /// empty text node to compose into.
    pub fn composition_start(&self) -> EditorResult<()> {
        self.update_with(UpdateOptions::new().discrete(), |ctx| {
            if ctx.range_selection().map(|r| !r.is_collapsed()).unwrap_or(false) {
                ctx.remove_text()?;
            }
            let Some(anchor) = ctx.range_selection().map(|r| r.anchor) else {
                return Ok(());
            };
            let key = match anchor.kind {
                PointType::Text => anchor.key,
                PointType::Element => composition_target(ctx, anchor)?,
            };
            trace!(key = %key, "composition started");
            ctx.set_composition_key(Some(key));
            Ok(())
        })
    }

    /// End the composition. `data` is the committed string; it is inserted
    /// only when the DOM did not already deliver it.
    pub fn composition_end(&self, data: &str) -> EditorResult<()> {
        let data = data.to_string();
        self.update_with(UpdateOptions::new().discrete(), move |ctx| {
            let key = ctx.composition_key();
            ctx.set_composition_key(None);
            trace!(key = ?key, "composition ended");
            match key {
                Some(key) if ctx.is_attached(key) && ctx.is_text(key) => {
                    let delivered = ctx.text_data(key)?.text().contains(data.as_str());
                    if !data.is_empty() && !delivered {
                        ctx.insert_text(&data)?;
                    }
                    // Normalization skipped the node while it was composing.
                    ctx.mark_dirty(key)?;
                }
                _ if !data.is_empty() => ctx.insert_text(&data)?,
                _ => {}
            }
            Ok(())
        })
    }

    /// Read the platform selection into the editor and dispatch
    /// `SELECTION_CHANGE_COMMAND`.
    pub fn handle_dom_selection_change(&self) -> EditorResult<()> {
        let Some((document, _)) = self.root_handle() else {
            return Ok(());
        };
        self.update_with(UpdateOptions::tag(SKIP_DOM_SELECTION_TAG), move |ctx| {
            let editor = ctx.editor;
            let range = {
                let doc = document.borrow();
                let dom_map = editor.inner.dom_map.borrow();
                selection_from_dom(&doc, &dom_map, &*ctx)
            };
            ctx.set_selection(range.map(Into::into));
            ctx.dispatch_command(&SELECTION_CHANGE_COMMAND, ())?;
            Ok(())
        })
    }
}

fn composition_target(ctx: &mut UpdateContext<'_>, anchor: Point) -> EditorResult<NodeKey> {
    let text = ctx.create_text_node("")?;
    if ctx.behavior(anchor.key)?.is_shadow_root() {
        let paragraph = ctx.create_paragraph()?;
        ctx.append(paragraph, text)?;
        ctx.insert_child(anchor.key, anchor.offset, paragraph)?;
    } else {
        ctx.insert_child(anchor.key, anchor.offset, text)?;
    }
    ctx.select_text(text, 0, 0)?;
    Ok(text)
}

fn apply_records(
    ctx: &mut UpdateContext<'_>,
    document: &SharedDocument,
    records: Vec<MutationRecord>,
) -> EditorResult<()> {
    let editor = ctx.editor;
    let mut text_targets = BTreeSet::new();
    let mut list_targets = BTreeSet::new();
    for record in records {
        match record {
            MutationRecord::CharacterData { target, .. } => {
                text_targets.insert(target);
            }
            MutationRecord::ChildList { target, .. } => {
                list_targets.insert(target);
            }
        }
    }

    for target in text_targets {
        let key = {
            let doc = document.borrow();
            editor.inner.dom_map.borrow().nearest_key(&doc, target)
        };
        if let Some(key) = key {
            apply_text(ctx, document, key, target)?;
        }
    }

    if list_targets.is_empty() {
        return Ok(());
    }
    let committed = editor.inner.current.borrow().clone();
    let mut doc = document.borrow_mut();
    let observing = doc.is_observing();
    doc.disconnect();
    let mut restore = Vec::new();
    {
        let dom_map = editor.inner.dom_map.borrow();
        for target in list_targets {
            let Some(key) = dom_map.key_for(target) else {
                continue;
            };
            if let Some(key) = repair_children(&mut doc, &dom_map, &committed, key, target)? {
                restore.push(key);
            }
        }
    }
    if observing {
        doc.reconnect();
    }
    drop(doc);

    for key in restore {
        if ctx.contains(key) {
            ctx.mark_dirty(key)?;
        }
    }
    Ok(())
}

fn apply_text(
    ctx: &mut UpdateContext<'_>,
    document: &SharedDocument,
    key: NodeKey,
    target: DomNodeId,
) -> EditorResult<()> {
    if !ctx.is_attached(key) || !ctx.is_text(key) {
        return Ok(());
    }
    let (dom_text, platform) = {
        let doc = document.borrow();
        let Some(dom) = ctx.editor.inner.dom_map.borrow().get(key) else {
            return Ok(());
        };
        let platform = doc
            .selection()
            .filter(|sel| sel.anchor.node == target && sel.focus.node == target)
            .map(|sel| (sel.anchor.offset, sel.focus.offset));
        (doc.text_content(dom), platform)
    };

    let data = ctx.text_data(key)?;
    if data.mode() == TextMode::Token {
        // Tokens are atomic; re-render to undo the edit.
        ctx.mark_dirty(key)?;
        return Ok(());
    }
    if data.text() == dom_text {
        return Ok(());
    }
    trace!(key = %key, "text changed in DOM");
    if dom_text.is_empty() && ctx.composition_key() != Some(key) {
        return ctx.remove(key);
    }
    ctx.set_text_content(key, dom_text)?;
    if let Some((anchor, focus)) = platform {
        let size = ctx.text_data(key)?.len();
        ctx.select_text(key, anchor.min(size), focus.min(size))?;
    }
    Ok(())
}

/// Put the DOM children of `target` back into the rendered shape. Returns a
/// key to re-render when the DOM lost something only the reconciler can
/// recreate.
fn repair_children(
    doc: &mut Document,
    dom_map: &DomKeyMap,
    state: &EditorState,
    key: NodeKey,
    target: DomNodeId,
) -> EditorResult<Option<NodeKey>> {
    let Some(node) = state.get_node(key) else {
        return Ok(None);
    };
    match node.base() {
        NodeBase::Text => {
            let children = doc.children(target).to_vec();
            let inner = children.iter().copied().find(|child| doc.is_text(*child));
            for child in children {
                if Some(child) != inner {
                    doc.detach(child)?;
                }
            }
            Ok(inner.is_none().then_some(key))
        }
        NodeBase::Root | NodeBase::Element => {
            let mut expected: Vec<DomNodeId> = node
                .children()
                .iter()
                .filter_map(|child| dom_map.get(*child))
                .collect();
            if let Some(br) = dom_map.line_break(target) {
                expected.push(br);
            }
            for child in doc.children(target).to_vec() {
                if !expected.contains(&child) {
                    trace!(dom = %child, "removing foreign DOM");
                    doc.detach(child)?;
                }
            }
            for (index, dom) in expected.into_iter().enumerate() {
                let current = doc.children(target).get(index).copied();
                if current != Some(dom) {
                    doc.insert_before(target, dom, current)?;
                }
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}
