//! # Selection
//!
//! Three shapes are supported:
//! - [`RangeSelection`]: anchor and focus points, plus the format and style
//!   that the next inserted text picks up.
//! - [`NodeSelection`]: an explicit set of keys.
//! - [`GridSelection`]: a rectangle of cells inside a grid node.
//!
//! Points address either a character offset inside a text node or a child
//! index inside an element.

mod ops;

use crate::node::TextFormat;
use crate::read::StateRead;
use crate::{EditorError, EditorResult, NodeKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointType {
    Text,
    Element,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
    pub kind: PointType,
}

impl Point {
    pub fn text(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            kind: PointType::Text,
        }
    }

    pub fn element(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            kind: PointType::Element,
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == PointType::Text
    }

    /// Document order of two points.
    pub fn is_before(&self, other: &Point, reader: &(impl StateRead + ?Sized)) -> EditorResult<bool> {
        if self.key == other.key {
            return Ok(self.offset < other.offset);
        }
        let a = resolve_point_node(reader, self)?;
        let b = resolve_point_node(reader, other)?;
        if a == b {
            let (ra, rb) = (self.side(reader)?, other.side(reader)?);
            return Ok(ra < rb || (ra == rb && self.offset < other.offset));
        }
        reader.is_before(a, b)
    }

    /// Where the point sits relative to the node it resolves to: before it,
    /// inside it, or after it.
    fn side(&self, reader: &(impl StateRead + ?Sized)) -> EditorResult<i8> {
        Ok(match self.kind {
            PointType::Text => 0,
            PointType::Element if self.offset < reader.children_size(self.key)? => -1,
            PointType::Element => 1,
        })
    }
}

/// The node a point refers to: the text node, or the element child at the
/// offset (clamped to the last descendant).
pub(crate) fn resolve_point_node(
    reader: &(impl StateRead + ?Sized),
    point: &Point,
) -> EditorResult<NodeKey> {
    match point.kind {
        PointType::Text => Ok(point.key),
        PointType::Element => reader.descendant_by_index(point.key, point.offset),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeSelection {
    pub anchor: Point,
    pub focus: Point,
    pub format: TextFormat,
    pub style: String,
}

impl RangeSelection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self {
            anchor,
            focus,
            format: TextFormat::empty(),
            style: String::new(),
        }
    }

    pub fn collapsed(point: Point) -> Self {
        Self::new(point, point)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn is_backward(&self, reader: &(impl StateRead + ?Sized)) -> EditorResult<bool> {
        self.focus.is_before(&self.anchor, reader)
    }

    /// `(start, end)` in document order.
    pub fn start_end(&self, reader: &(impl StateRead + ?Sized)) -> EditorResult<(Point, Point)> {
        if self.is_backward(reader)? {
            Ok((self.focus, self.anchor))
        } else {
            Ok((self.anchor, self.focus))
        }
    }

    pub fn has_format(&self, format: TextFormat) -> bool {
        self.format.contains(format)
    }

    /// Nodes touched by the range, in document order.
    pub fn get_nodes(&self, reader: &(impl StateRead + ?Sized)) -> EditorResult<Vec<NodeKey>> {
        let (start, end) = self.start_end(reader)?;
        let first = resolve_point_node(reader, &start)?;
        let last = resolve_point_node(reader, &end)?;
        reader.nodes_between(first, last)
    }

    pub fn get_text_content(&self, reader: &(impl StateRead + ?Sized)) -> EditorResult<String> {
        let nodes = self.get_nodes(reader)?;
        let (Some(&first), Some(&last)) = (nodes.first(), nodes.last()) else {
            return Ok(String::new());
        };
        let (start, end) = self.start_end(reader)?;
        let mut out = String::new();
        let mut prev_was_element = true;
        for key in nodes {
            let node = reader.node(key)?;
            if node.is_element() && !reader.is_inline(key)? {
                if !prev_was_element {
                    out.push('\n');
                }
                prev_was_element = !node.children().is_empty();
                continue;
            }
            prev_was_element = false;
            if let Some(text) = node.text() {
                let len = text.chars().count();
                let from = if key == first && start.is_text() {
                    start.offset.min(len)
                } else {
                    0
                };
                let to = if key == last && end.is_text() {
                    end.offset.min(len)
                } else {
                    len
                };
                out.extend(text.chars().skip(from).take(to.saturating_sub(from)));
            } else if key != last || !self.is_collapsed() {
                out.push_str(&reader.text_content(key)?);
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeSelection {
    nodes: BTreeSet<NodeKey>,
}

impl NodeSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: NodeKey) {
        self.nodes.insert(key);
    }

    pub fn delete(&mut self, key: NodeKey) {
        self.nodes.remove(&key);
    }

    pub fn has(&self, key: NodeKey) -> bool {
        self.nodes.contains(&key)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes.iter().copied()
    }

    pub(crate) fn retain(&mut self, f: impl FnMut(&NodeKey) -> bool) {
        self.nodes.retain(f);
    }

    pub fn get_text_content(&self, reader: &(impl StateRead + ?Sized)) -> EditorResult<String> {
        let mut out = String::new();
        for key in &self.nodes {
            out.push_str(&reader.text_content(*key)?);
        }
        Ok(out)
    }
}

/// The rectangle covered by a grid selection, in cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub from_x: usize,
    pub from_y: usize,
    pub to_x: usize,
    pub to_y: usize,
}

/// A rectangle of cells. The grid's children are rows and each row's
/// children are cells.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSelection {
    pub grid_key: NodeKey,
    pub anchor_cell_key: NodeKey,
    pub focus_cell_key: NodeKey,
}

impl GridSelection {
    pub fn new(grid_key: NodeKey, anchor_cell_key: NodeKey, focus_cell_key: NodeKey) -> Self {
        Self {
            grid_key,
            anchor_cell_key,
            focus_cell_key,
        }
    }

    fn cell_position(
        &self,
        reader: &(impl StateRead + ?Sized),
        cell: NodeKey,
    ) -> EditorResult<(usize, usize)> {
        let row = reader.parent(cell)?.ok_or(EditorError::Detached(cell))?;
        if reader.parent(row)? != Some(self.grid_key) {
            return Err(EditorError::InvalidSelection(format!(
                "cell {} is not inside grid {}",
                cell, self.grid_key
            )));
        }
        let x = reader
            .index_within_parent(cell)?
            .ok_or(EditorError::Detached(cell))?;
        let y = reader
            .index_within_parent(row)?
            .ok_or(EditorError::Detached(row))?;
        Ok((x, y))
    }

    pub fn get_shape(&self, reader: &(impl StateRead + ?Sized)) -> EditorResult<GridShape> {
        let (ax, ay) = self.cell_position(reader, self.anchor_cell_key)?;
        let (fx, fy) = self.cell_position(reader, self.focus_cell_key)?;
        Ok(GridShape {
            from_x: ax.min(fx),
            from_y: ay.min(fy),
            to_x: ax.max(fx),
            to_y: ay.max(fy),
        })
    }

    /// The grid, the rows and cells inside the shape, and the cells' contents.
    pub fn get_nodes(&self, reader: &(impl StateRead + ?Sized)) -> EditorResult<Vec<NodeKey>> {
        let shape = self.get_shape(reader)?;
        let mut out = vec![self.grid_key];
        let rows = reader.children(self.grid_key)?;
        for row in rows.iter().take(shape.to_y + 1).skip(shape.from_y) {
            out.push(*row);
            let cells = reader.children(*row)?;
            for cell in cells.iter().take(shape.to_x + 1).skip(shape.from_x) {
                out.extend(reader.preorder(*cell)?);
            }
        }
        Ok(out)
    }

    pub fn get_text_content(&self, reader: &(impl StateRead + ?Sized)) -> EditorResult<String> {
        let mut out = String::new();
        for key in self.get_nodes(reader)? {
            if let Some(text) = reader.node(key)?.text() {
                out.push_str(text);
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Range(RangeSelection),
    Node(NodeSelection),
    Grid(GridSelection),
}

impl Selection {
    pub fn as_range(&self) -> Option<&RangeSelection> {
        match self {
            Selection::Range(range) => Some(range),
            _ => None,
        }
    }

    pub fn as_range_mut(&mut self) -> Option<&mut RangeSelection> {
        match self {
            Selection::Range(range) => Some(range),
            _ => None,
        }
    }

    pub fn get_nodes(&self, reader: &(impl StateRead + ?Sized)) -> EditorResult<Vec<NodeKey>> {
        match self {
            Selection::Range(range) => range.get_nodes(reader),
            Selection::Node(nodes) => Ok(nodes.keys().collect()),
            Selection::Grid(grid) => grid.get_nodes(reader),
        }
    }

    pub fn get_text_content(&self, reader: &(impl StateRead + ?Sized)) -> EditorResult<String> {
        match self {
            Selection::Range(range) => range.get_text_content(reader),
            Selection::Node(nodes) => nodes.get_text_content(reader),
            Selection::Grid(grid) => grid.get_text_content(reader),
        }
    }
}

impl From<RangeSelection> for Selection {
    fn from(range: RangeSelection) -> Self {
        Selection::Range(range)
    }
}

impl From<NodeSelection> for Selection {
    fn from(nodes: NodeSelection) -> Self {
        Selection::Node(nodes)
    }
}

impl From<GridSelection> for Selection {
    fn from(grid: GridSelection) -> Self {
        Selection::Grid(grid)
    }
}
