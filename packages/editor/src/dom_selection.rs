//! Translation between editor selections and the platform selection.

use crate::read::StateRead;
use crate::reconciler::DomKeyMap;
use crate::selection::{Point, PointType, RangeSelection, Selection};
use crate::state::EditorState;
use crate::EditorResult;
use tracing::trace;
use weft_dom::{Document, DomPoint, DomSelection};

/// Write the state's range selection to the document. Other selection kinds
/// clear the platform selection.
pub(crate) fn apply_selection(
    document: &mut Document,
    dom_map: &DomKeyMap,
    state: &EditorState,
) -> EditorResult<()> {
    let Some(range) = state.selection.as_ref().and_then(Selection::as_range) else {
        document.clear_selection();
        return Ok(());
    };
    let anchor = dom_point(document, dom_map, state, &range.anchor)?;
    let focus = dom_point(document, dom_map, state, &range.focus)?;
    match (anchor, focus) {
        (Some(anchor), Some(focus)) => {
            trace!(?anchor, ?focus, "writing DOM selection");
            document.set_selection(DomSelection { anchor, focus });
        }
        _ => document.clear_selection(),
    }
    Ok(())
}

fn dom_point(
    document: &Document,
    dom_map: &DomKeyMap,
    state: &EditorState,
    point: &Point,
) -> EditorResult<Option<DomPoint>> {
    let Some(dom) = dom_map.get(point.key) else {
        return Ok(None);
    };
    match point.kind {
        PointType::Text => {
            let inner = document
                .children(dom)
                .iter()
                .copied()
                .find(|child| document.is_text(*child));
            Ok(Some(match inner {
                Some(inner) => DomPoint::new(inner, point.offset),
                None => DomPoint::new(dom, 0),
            }))
        }
        PointType::Element => {
            // Children that failed to render have no DOM and take no slot.
            let children = state.children(point.key)?;
            let offset = children
                .iter()
                .take(point.offset)
                .filter(|child| {
                    dom_map
                        .get(**child)
                        .map(|child_dom| document.parent(child_dom) == Some(dom))
                        .unwrap_or(false)
                })
                .count();
            Ok(Some(DomPoint::new(dom, offset)))
        }
    }
}

/// Read a platform point back into editor coordinates.
pub(crate) fn point_from_dom(
    document: &Document,
    dom_map: &DomKeyMap,
    reader: &(impl StateRead + ?Sized),
    point: DomPoint,
) -> Option<Point> {
    let key = dom_map.nearest_key(document, point.node)?;
    let node = reader.get_node(key)?;
    let mapped = dom_map.get(key) == Some(point.node);

    if let Some(text) = node.as_text() {
        let size = text.len();
        let offset = if document.is_text(point.node) {
            point.offset.min(size)
        } else if point.offset == 0 {
            0
        } else {
            size
        };
        return Some(Point::text(key, offset));
    }

    if !node.is_element() {
        let parent = node.parent()?;
        let index = reader.index_within_parent(key).ok()??;
        return Some(Point::element(parent, index + usize::from(point.offset > 0)));
    }

    if !mapped {
        // Inside foreign or managed DOM under an element.
        return Some(Point::element(key, 0));
    }
    let offset = document
        .children(point.node)
        .iter()
        .take(point.offset)
        .filter(|child| dom_map.key_for(**child).is_some())
        .count();
    Some(Point::element(key, offset.min(node.children().len())))
}

/// The platform selection as a range selection, when both ends resolve.
pub(crate) fn selection_from_dom(
    document: &Document,
    dom_map: &DomKeyMap,
    reader: &(impl StateRead + ?Sized),
) -> Option<RangeSelection> {
    let dom = document.selection()?;
    let anchor = point_from_dom(document, dom_map, reader, dom.anchor)?;
    let focus = point_from_dom(document, dom_map, reader, dom.focus)?;
    let mut range = RangeSelection::new(anchor, focus);
    if let Some(text) = reader.get_node(anchor.key).and_then(|node| node.as_text()) {
        range.format = text.format();
        range.style = text.style().to_string();
    }
    Some(range)
}
