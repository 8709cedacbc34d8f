//! # HTML Conversion
//!
//! Import walks a DOM subtree and asks the registered conversions to turn
//! each DOM node into editor nodes:
//!
//! ```text
//! <p><strong>hi</strong></p>
//!   p       → paragraph            (node)
//!   strong  → bold for_child       (no node, children lifted)
//!   #text   → text "hi"            (bolded by the inherited for_child)
//! ```
//!
//! Export renders nodes through [`NodeBehavior::export_dom`] into a scratch
//! document and serializes it.
//!
//! [`NodeBehavior::export_dom`]: crate::node::NodeBehavior::export_dom

use crate::config::EditorConfig;
use crate::node::{ForChildFn, Node, RenderContext};
use crate::read::StateRead;
use crate::selection::{Point, Selection};
use crate::state::EditorState;
use crate::update::UpdateContext;
use crate::{EditorResult, NodeKey};
use std::collections::BTreeSet;
use tracing::trace;
use weft_dom::{Document, DomNodeId};

/// Convert the children of `dom_root` into detached editor nodes. Runs of
/// inline nodes at the top level are wrapped in paragraphs.
pub fn generate_nodes_from_dom(
    ctx: &mut UpdateContext<'_>,
    document: &Document,
    dom_root: DomNodeId,
) -> EditorResult<Vec<NodeKey>> {
    let mut nodes = Vec::new();
    for child in document.children(dom_root) {
        nodes.extend(convert_dom(ctx, document, *child, &[], None)?);
    }
    wrap_inline_runs(ctx, nodes)
}

fn convert_dom(
    ctx: &mut UpdateContext<'_>,
    document: &Document,
    dom: DomNodeId,
    inherited: &[(String, ForChildFn)],
    parent: Option<NodeKey>,
) -> EditorResult<Vec<NodeKey>> {
    let tag = match document.tag_name(dom) {
        Some(tag) => tag.to_ascii_lowercase(),
        None if document.is_text(dom) => "#text".to_string(),
        None => return Ok(Vec::new()),
    };

    let conversions = ctx.state().registry().conversions_for(&tag);
    let mut output = None;
    for conversion in conversions {
        if let Some(converted) = (conversion.convert)(ctx, document, dom)? {
            output = Some(converted);
            break;
        }
    }

    let mut for_child = inherited.to_vec();
    let mut current = None;
    let mut after = None;
    if let Some(output) = output {
        after = output.after;
        if let Some(mut key) = output.node {
            let mut kept = true;
            for (_, hook) in inherited {
                match hook(ctx, key, parent)? {
                    Some(next) => key = next,
                    None => {
                        kept = false;
                        break;
                    }
                }
            }
            if kept {
                current = Some(key);
            }
        }
        if let Some(hook) = output.for_child {
            for_child.retain(|(name, _)| *name != tag);
            for_child.push((tag.clone(), hook));
        }
    }

    let mut children = Vec::new();
    for child in document.children(dom) {
        children.extend(convert_dom(ctx, document, *child, &for_child, current)?);
    }
    if let Some(after) = after {
        children = after(ctx, children)?;
    }

    match current {
        None => Ok(children),
        Some(key) => {
            if ctx.is_element(key) {
                ctx.append_all(key, children)?;
            } else if !children.is_empty() {
                trace!(key = %key, dropped = children.len(), "leaf conversion ignores children");
            }
            Ok(vec![key])
        }
    }
}

fn wrap_inline_runs(ctx: &mut UpdateContext<'_>, nodes: Vec<NodeKey>) -> EditorResult<Vec<NodeKey>> {
    let mut out = Vec::with_capacity(nodes.len());
    let mut run: Option<NodeKey> = None;
    for key in nodes {
        if ctx.is_inline(key)? {
            let paragraph = match run {
                Some(paragraph) => paragraph,
                None => {
                    let paragraph = ctx.create_paragraph()?;
                    out.push(paragraph);
                    run = Some(paragraph);
                    paragraph
                }
            };
            ctx.append(paragraph, key)?;
        } else {
            run = None;
            out.push(key);
        }
    }
    Ok(out)
}

/// Serialize the document, or only the selected part of it, to HTML.
pub fn generate_html_from_nodes(
    state: &EditorState,
    selection: Option<&Selection>,
) -> EditorResult<String> {
    let config = EditorConfig::default();
    let mut document = Document::new();
    let container = document.create_element("div");
    let range = match selection {
        Some(selection) => Some(RangeFilter::new(state, selection)?),
        None => None,
    };

    let mut exporter = Exporter {
        state,
        range: range.as_ref(),
        document: &mut document,
        config: &config,
    };
    for child in state.children(NodeKey::ROOT)? {
        exporter.append(*child, container)?;
    }
    Ok(document.inner_html(container))
}

/// Which nodes a selection covers, and where text is cut.
struct RangeFilter {
    selected: BTreeSet<NodeKey>,
    start: Option<Point>,
    end: Option<Point>,
}

impl RangeFilter {
    fn new(state: &EditorState, selection: &Selection) -> EditorResult<Self> {
        let selected = selection.get_nodes(state)?.into_iter().collect();
        let (start, end) = match selection.as_range() {
            Some(range) => {
                let (start, end) = range.start_end(state)?;
                (Some(start), Some(end))
            }
            None => (None, None),
        };
        Ok(Self {
            selected,
            start,
            end,
        })
    }

    /// The selected chars of a text node as `(from, to)`.
    fn slice(&self, key: NodeKey, len: usize) -> (usize, usize) {
        let from = match self.start {
            Some(start) if start.key == key && start.is_text() => start.offset.min(len),
            _ => 0,
        };
        let to = match self.end {
            Some(end) if end.key == key && end.is_text() => end.offset.min(len),
            _ => len,
        };
        (from, to.max(from))
    }
}

struct Exporter<'a> {
    state: &'a EditorState,
    range: Option<&'a RangeFilter>,
    document: &'a mut Document,
    config: &'a EditorConfig,
}

impl Exporter<'_> {
    /// Export `key` under `parent`. Returns whether the node itself was
    /// included; an excluded element still contributes its included
    /// children.
    fn append(&mut self, key: NodeKey, parent: DomNodeId) -> EditorResult<bool> {
        let state = self.state;
        let node = state.node(key)?;
        let included = self
            .range
            .map(|range| range.selected.contains(&key))
            .unwrap_or(true);

        let sliced;
        let target: &Node = match (self.range, node.as_text()) {
            (Some(range), Some(text)) => {
                let (from, to) = range.slice(key, text.len());
                let mut copy = Node::clone(node);
                if let Some(data) = copy.as_text_mut() {
                    data.text = text.text().chars().skip(from).take(to - from).collect();
                }
                sliced = copy;
                &sliced
            }
            _ => node,
        };

        let behavior = state.behavior(key)?;
        let dom = {
            let mut cx = RenderContext::new(self.document, self.config);
            behavior.export_dom(target, &mut cx)?
        };
        let Some(dom) = dom else {
            return Ok(false);
        };

        let holder = if included { dom } else { parent };
        for child in node.children() {
            self.append(*child, holder)?;
        }
        if included {
            self.document.append_child(parent, dom)?;
        }
        Ok(included)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Editor;
    use crate::node::TextFormat;
    use crate::selection::RangeSelection;
    use crate::update::PendingState;

    fn paragraph_with(ctx: &mut UpdateContext<'_>, texts: &[&str]) -> Vec<NodeKey> {
        let p = ctx.create_paragraph().unwrap();
        ctx.append(NodeKey::ROOT, p).unwrap();
        texts
            .iter()
            .map(|text| {
                let t = ctx.create_text_node(*text).unwrap();
                ctx.append(p, t).unwrap();
                t
            })
            .collect()
    }

    #[test]
    fn test_import_applies_nested_formats() {
        let editor = Editor::new();
        let mut source = Document::new();
        let root = source.create_element("div");
        let p = source.create_element("p");
        let strong = source.create_element("strong");
        let em = source.create_element("em");
        let text = source.create_text_node("hi");
        source.append_child(root, p).unwrap();
        source.append_child(p, strong).unwrap();
        source.append_child(strong, em).unwrap();
        source.append_child(em, text).unwrap();

        let mut pending = PendingState::from_state(&editor.get_editor_state());
        let mut ctx = UpdateContext::new(&editor, &mut pending);
        let nodes = generate_nodes_from_dom(&mut ctx, &source, root).unwrap();

        assert_eq!(nodes.len(), 1);
        let children = ctx.children(nodes[0]).unwrap().to_vec();
        assert_eq!(children.len(), 1);
        let data = ctx.text_data(children[0]).unwrap();
        assert_eq!(data.text(), "hi");
        assert_eq!(data.format(), TextFormat::BOLD | TextFormat::ITALIC);
    }

    #[test]
    fn test_import_wraps_top_level_inline_text() {
        let editor = Editor::new();
        let mut source = Document::new();
        let root = source.create_element("div");
        let text = source.create_text_node("loose");
        source.append_child(root, text).unwrap();

        let mut pending = PendingState::from_state(&editor.get_editor_state());
        let mut ctx = UpdateContext::new(&editor, &mut pending);
        let nodes = generate_nodes_from_dom(&mut ctx, &source, root).unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(ctx.node(nodes[0]).unwrap().node_type(), "paragraph");
        assert_eq!(ctx.text_content(nodes[0]).unwrap(), "loose");
    }

    #[test]
    fn test_export_whole_document() {
        let editor = Editor::new();
        let mut pending = PendingState::from_state(&editor.get_editor_state());
        let mut ctx = UpdateContext::new(&editor, &mut pending);
        let texts = paragraph_with(&mut ctx, &["a < b"]);
        ctx.set_text_format(texts[0], TextFormat::BOLD).unwrap();

        let html = generate_html_from_nodes(&pending.state, None).unwrap();
        assert!(html.starts_with("<p"));
        assert!(html.contains("<strong"));
        assert!(html.contains("a &lt; b"));
    }

    #[test]
    fn test_export_slices_selected_text() {
        let editor = Editor::new();
        let mut pending = PendingState::from_state(&editor.get_editor_state());
        let mut ctx = UpdateContext::new(&editor, &mut pending);
        let texts = paragraph_with(&mut ctx, &["hello"]);
        let range = RangeSelection::new(Point::text(texts[0], 1), Point::text(texts[0], 4));

        let selection: Selection = range.into();
        let html = generate_html_from_nodes(&pending.state, Some(&selection)).unwrap();
        assert!(html.contains("ell"));
        assert!(!html.contains("hello"));
        assert!(!html.starts_with("<p"));
    }
}
