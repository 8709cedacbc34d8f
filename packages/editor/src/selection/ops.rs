//! Editing operations driven by the current range selection.

use super::{resolve_point_node, Point, PointType, RangeSelection};
use crate::node::{TextFormat, TextMode};
use crate::read::StateRead;
use crate::update::UpdateContext;
use crate::{EditorError, EditorResult, NodeKey};
use std::collections::BTreeSet;

fn apply_flag(format: TextFormat, flag: TextFormat, add: bool) -> TextFormat {
    if !add {
        return format - flag;
    }
    let mut next = format | flag;
    if flag == TextFormat::SUBSCRIPT {
        next.remove(TextFormat::SUPERSCRIPT);
    } else if flag == TextFormat::SUPERSCRIPT {
        next.remove(TextFormat::SUBSCRIPT);
    }
    next
}

impl UpdateContext<'_> {
    fn require_range(&self) -> EditorResult<RangeSelection> {
        self.range_selection()
            .cloned()
            .ok_or_else(|| EditorError::InvalidSelection("no range selection".to_string()))
    }

    fn set_caret(&mut self, point: Point) -> EditorResult<()> {
        match point.kind {
            PointType::Text => self.select_text(point.key, point.offset, point.offset)?,
            PointType::Element => self.select_element(point.key, point.offset, point.offset)?,
        };
        Ok(())
    }

    /// Move an element point down to the text or element it sits against.
    pub fn normalize_point(&self, point: Point) -> EditorResult<Point> {
        let mut point = point;
        while point.kind == PointType::Element {
            let children = self.children(point.key)?;
            let size = children.len();
            let (child, at_end) = if point.offset < size {
                (children[point.offset], false)
            } else if let Some(&last) = children.last() {
                (last, true)
            } else {
                break;
            };
            let node = self.node(child)?;
            if let Some(text) = node.as_text() {
                return Ok(Point::text(child, if at_end { text.len() } else { 0 }));
            }
            match node.as_element() {
                Some(element) => {
                    point = Point::element(child, if at_end { element.len() } else { 0 });
                }
                None => break,
            }
        }
        Ok(point)
    }

    /// Nodes strictly inside `start..end`, in document order.
    fn covered_nodes(&self, start: Point, end: Point) -> EditorResult<Vec<NodeKey>> {
        let start_size = match start.kind {
            PointType::Element => self.children_size(start.key)?,
            PointType::Text => 0,
        };
        let first = match start.kind {
            PointType::Element if start.offset < start_size => {
                self.child_at(start.key, start.offset)?.unwrap_or(start.key)
            }
            _ => resolve_point_node(self, &start)?,
        };
        let (last, drop_last) = match end.kind {
            PointType::Element => match self.child_at(end.key, end.offset)? {
                Some(child) => (child, true),
                None => (self.last_descendant(end.key)?.unwrap_or(end.key), false),
            },
            PointType::Text => (end.key, false),
        };

        let mut nodes = self.nodes_between(first, last)?;
        if drop_last {
            nodes.retain(|k| *k != last && !self.is_ancestor_of(last, *k));
        }
        if start.kind == PointType::Element && start.offset >= start_size {
            nodes.retain(|k| *k != first);
        }
        Ok(nodes)
    }

    /// Insert `text` at the selection, replacing any selected content.
    pub fn insert_text(&mut self, text: &str) -> EditorResult<()> {
        let range = self.require_range()?;
        if !range.is_collapsed() {
            self.remove_text()?;
        }
        if text.is_empty() {
            return Ok(());
        }
        let range = self.require_range()?;
        let (start, _) = range.start_end(&*self)?;
        let point = self.normalize_point(start)?;

        if point.kind == PointType::Text {
            let data = self.text_data(point.key)?;
            let behavior = self.behavior(point.key)?;
            let size = data.len();
            let blocked = data.mode() != TextMode::Normal
                || data.format() != range.format
                || data.style() != range.style
                || (point.offset == 0 && !behavior.can_insert_text_before())
                || (point.offset == size && !behavior.can_insert_text_after());
            if !blocked {
                return self.splice_text(point.key, point.offset, 0, text, true);
            }

            let created = self.create_formatted_text(text, &range)?;
            if point.offset == 0 {
                self.insert_before(point.key, created)?;
            } else if point.offset >= size {
                self.insert_after(point.key, created)?;
            } else {
                let parts = self.split_text(point.key, &[point.offset])?;
                self.insert_after(parts[0], created)?;
            }
            let len = self.text_data(created)?.len();
            self.select_text(created, len, len)?;
            return Ok(());
        }

        let created = self.create_formatted_text(text, &range)?;
        if self.behavior(point.key)?.is_shadow_root() {
            let paragraph = self.create_paragraph()?;
            self.append(paragraph, created)?;
            self.attach_at(point.key, point.offset, paragraph)?;
        } else {
            self.attach_at(point.key, point.offset, created)?;
        }
        let len = self.text_data(created)?.len();
        self.select_text(created, len, len)?;
        Ok(())
    }

    fn create_formatted_text(&mut self, text: &str, range: &RangeSelection) -> EditorResult<NodeKey> {
        let key = self.create_text_node(text)?;
        self.set_text_format(key, range.format)?;
        self.set_text_style(key, range.style.clone())?;
        Ok(key)
    }

    /// Delete the selected content and collapse the selection at its start.
    pub fn remove_text(&mut self) -> EditorResult<()> {
        let range = self.require_range()?;
        if range.is_collapsed() {
            return Ok(());
        }
        let (start, end) = range.start_end(&*self)?;
        let start = self.normalize_point(start)?;
        let end = self.normalize_point(end)?;

        if start.key == end.key && start.kind == PointType::Text {
            self.splice_text(start.key, start.offset, end.offset - start.offset, "", false)?;
            return self.collapse_at(start, &range);
        }

        let covered = self.covered_nodes(start, end)?;
        let mut protected: BTreeSet<NodeKey> = [start.key, end.key].into_iter().collect();
        protected.extend(self.parents(start.key)?);
        protected.extend(self.parents(end.key)?);

        if start.kind == PointType::Text {
            let size = self.text_data(start.key)?.len();
            self.splice_text(start.key, start.offset, size - start.offset, "", false)?;
        }
        if end.kind == PointType::Text {
            self.splice_text(end.key, 0, end.offset, "", false)?;
        }

        let mut removed = BTreeSet::new();
        for key in covered {
            if protected.contains(&key) {
                continue;
            }
            let parent = self.parent(key)?;
            if parent.map(|p| removed.contains(&p)).unwrap_or(false) {
                removed.insert(key);
                continue;
            }
            self.remove(key)?;
            removed.insert(key);
        }

        let start_block = self.nearest_block(start.key)?;
        let end_block = self.nearest_block(end.key)?;
        if let (Some(first), Some(last)) = (start_block, end_block) {
            if first != last
                && !self.is_ancestor_of(first, last)
                && !self.is_ancestor_of(last, first)
                && self.is_attached(last)
            {
                let children = self.children(last)?.to_vec();
                self.append_all(first, children)?;
                self.remove(last)?;
            }
        }
        self.collapse_at(start, &range)
    }

    fn collapse_at(&mut self, point: Point, range: &RangeSelection) -> EditorResult<()> {
        if !self.is_attached(point.key) {
            return Ok(());
        }
        let mut collapsed = RangeSelection::collapsed(point);
        collapsed.format = range.format;
        collapsed.style = range.style.clone();
        self.set_selection(Some(collapsed.into()));
        Ok(())
    }

    /// Delete one character, or the selected content, in the given direction.
    pub fn delete_character(&mut self, backward: bool) -> EditorResult<()> {
        let range = self.require_range()?;
        if !range.is_collapsed() {
            return self.remove_text();
        }
        let point = self.normalize_point(range.anchor)?;

        if point.kind == PointType::Text {
            let data = self.text_data(point.key)?;
            let size = data.len();
            let token = data.mode() == TextMode::Token;
            let inside = if backward { point.offset > 0 } else { point.offset < size };
            if inside {
                if token {
                    return self.remove(point.key);
                }
                let at = if backward { point.offset - 1 } else { point.offset };
                self.splice_text(point.key, at, 1, "", false)?;
                return self.set_caret(Point::text(point.key, at));
            }
            let sibling = if backward {
                self.previous_sibling(point.key)?
            } else {
                self.next_sibling(point.key)?
            };
            return match sibling {
                Some(sibling) => self.delete_into_sibling(sibling, backward),
                None => self.merge_blocks(point.key, backward),
            };
        }

        let size = self.children_size(point.key)?;
        let neighbour = match (backward, point.offset) {
            (true, 0) => None,
            (true, offset) => self.child_at(point.key, offset - 1)?,
            (false, offset) if offset < size => self.child_at(point.key, offset)?,
            _ => None,
        };
        match neighbour {
            Some(sibling) if !self.is_element(sibling) || self.is_inline(sibling)? => {
                self.delete_into_sibling(sibling, backward)
            }
            _ => self.merge_blocks(point.key, backward),
        }
    }

    fn delete_into_sibling(&mut self, sibling: NodeKey, backward: bool) -> EditorResult<()> {
        if self.is_text(sibling) && self.text_data(sibling)?.mode() != TextMode::Token {
            let size = self.text_data(sibling)?.len();
            let caret = if backward { size } else { 0 };
            self.select_text(sibling, caret, caret)?;
            if size == 0 {
                self.remove(sibling)?;
                return self.delete_character(backward);
            }
            return self.delete_character(backward);
        }
        if self.is_element(sibling) {
            let caret = if backward {
                self.end_point(sibling)?
            } else {
                Point::element(sibling, 0)
            };
            self.set_caret(caret)?;
            return self.delete_character(backward);
        }
        self.remove(sibling)
    }

    /// Join the block holding `key` with the block before it (or after it).
    fn merge_blocks(&mut self, key: NodeKey, backward: bool) -> EditorResult<()> {
        let Some(block) = self.nearest_block(key)? else {
            return Ok(());
        };
        let neighbour = if backward {
            self.previous_sibling(block)?
        } else {
            self.next_sibling(block)?
        };
        let Some(neighbour) = neighbour else {
            return Ok(());
        };
        if !self.is_element(neighbour) {
            return self.remove(neighbour);
        }

        let (target, source) = if backward {
            (neighbour, block)
        } else {
            (block, neighbour)
        };
        let caret = match self.last_child(target)? {
            Some(last) if self.is_text(last) => self.end_point(last)?,
            Some(_) => Point::element(target, self.children_size(target)?),
            None => Point::element(target, 0),
        };
        let children = self.children(source)?.to_vec();
        self.append_all(target, children)?;
        self.remove(source)?;
        self.set_caret(caret)
    }

    /// Split the block at the selection. Returns the new block.
    pub fn insert_paragraph(&mut self) -> EditorResult<NodeKey> {
        let range = self.require_range()?;
        if !range.is_collapsed() {
            self.remove_text()?;
        }
        let range = self.require_range()?;
        let point = self.normalize_point(range.anchor)?;

        if point.kind == PointType::Element && self.behavior(point.key)?.is_shadow_root() {
            let paragraph = self.create_paragraph()?;
            self.attach_at(point.key, point.offset, paragraph)?;
            self.select_start(paragraph)?;
            return Ok(paragraph);
        }
        let block = self
            .nearest_block(point.key)?
            .ok_or_else(|| EditorError::InvalidSelection("selection is outside any block".into()))?;

        let first_moved = match point.kind {
            PointType::Element => self.child_at(point.key, point.offset)?,
            PointType::Text => {
                let size = self.text_data(point.key)?.len();
                if point.offset == 0 {
                    Some(point.key)
                } else if point.offset >= size {
                    self.next_sibling(point.key)?
                } else {
                    self.split_text(point.key, &[point.offset])?.get(1).copied()
                }
            }
        };
        let mut moved = Vec::new();
        if let Some(mut first) = first_moved {
            while let Some(parent) = self.parent(first)? {
                if parent == block {
                    break;
                }
                first = parent;
            }
            moved.push(first);
            moved.extend(self.next_siblings(first)?);
        }

        let behavior = self.behavior(block)?.clone();
        let new_type = behavior.insert_new_after().unwrap_or("paragraph");
        let new_block = self.create_default(new_type)?;
        let element = self.element(block)?.clone();
        self.set_element_format(new_block, element.format())?;
        self.set_indent(new_block, element.indent())?;
        self.set_direction(new_block, element.direction())?;

        self.insert_after(block, new_block)?;
        self.append_all(new_block, moved)?;
        self.select_start(new_block)?;
        Ok(new_block)
    }

    /// Insert a line break at the selection. With `select_start` the caret
    /// stays before the break.
    pub fn insert_line_break(&mut self, select_start: bool) -> EditorResult<NodeKey> {
        let range = self.require_range()?;
        if !range.is_collapsed() {
            self.remove_text()?;
        }
        let range = self.require_range()?;
        let point = self.normalize_point(range.anchor)?;
        let line_break = self.create_line_break()?;

        match point.kind {
            PointType::Text => {
                let size = self.text_data(point.key)?.len();
                if point.offset == 0 {
                    self.insert_before(point.key, line_break)?;
                } else if point.offset >= size {
                    self.insert_after(point.key, line_break)?;
                } else {
                    let parts = self.split_text(point.key, &[point.offset])?;
                    self.insert_after(parts[0], line_break)?;
                }
            }
            PointType::Element if self.behavior(point.key)?.is_shadow_root() => {
                let paragraph = self.create_paragraph()?;
                self.append(paragraph, line_break)?;
                self.attach_at(point.key, point.offset, paragraph)?;
            }
            PointType::Element => self.attach_at(point.key, point.offset, line_break)?,
        }

        let parent = self.parent(line_break)?.ok_or(EditorError::Detached(line_break))?;
        let index = self
            .index_within_parent(line_break)?
            .ok_or(EditorError::Detached(line_break))?;
        let caret = if select_start {
            match self.previous_sibling(line_break)? {
                Some(prev) if self.is_text(prev) => self.end_point(prev)?,
                _ => Point::element(parent, index),
            }
        } else {
            self.normalize_point(Point::element(parent, index + 1))?
        };
        self.set_caret(caret)?;
        Ok(line_break)
    }

    /// Toggle `flag` on the selected text. A collapsed selection only
    /// changes the format the next insertion uses.
    pub fn format_text(&mut self, flag: TextFormat) -> EditorResult<()> {
        let mut range = self.require_range()?;
        if range.is_collapsed() {
            range.format = range.format.toggled(flag);
            self.set_selection(Some(range.into()));
            return Ok(());
        }
        let backward = range.is_backward(&*self)?;
        let (start, end) = range.start_end(&*self)?;
        let start = self.normalize_point(start)?;
        let end = self.normalize_point(end)?;

        let mut texts: Vec<NodeKey> = self
            .covered_nodes(start, end)?
            .into_iter()
            .filter(|k| self.is_text(*k))
            .collect();
        // Points sitting on a text boundary cover none of that text.
        if start.kind == PointType::Text && start.offset >= self.text_data(start.key)?.len() {
            texts.retain(|k| *k != start.key);
        }
        if end.kind == PointType::Text && end.offset == 0 {
            texts.retain(|k| *k != end.key);
        }
        let (Some(&first), Some(&last)) = (texts.first(), texts.last()) else {
            return Ok(());
        };
        let add = self
            .text_data(first)?
            .format()
            .toggled(flag)
            .contains(flag);

        let (first_target, last_target) = if first == last {
            let size = self.text_data(first)?.len();
            let from = if first == start.key && start.kind == PointType::Text { start.offset } else { 0 };
            let to = if first == end.key && end.kind == PointType::Text { end.offset } else { size };
            if from >= to {
                return Ok(());
            }
            let parts = self.split_text(first, &[from, to])?;
            let target = match from {
                0 => parts[0],
                _ => parts.get(1).copied().unwrap_or(parts[0]),
            };
            (target, target)
        } else {
            let first_target = match start.kind {
                PointType::Text if start.key == first && start.offset > 0 => {
                    *self.split_text(first, &[start.offset])?.last().unwrap_or(&first)
                }
                _ => first,
            };
            let last_target = match end.kind {
                PointType::Text if end.key == last => self.split_text(last, &[end.offset])?[0],
                _ => last,
            };
            texts[0] = first_target;
            if let Some(slot) = texts.last_mut() {
                *slot = last_target;
            }
            (first_target, last_target)
        };

        let targets = if first_target == last_target { vec![first_target] } else { texts };
        for key in &targets {
            let format = apply_flag(self.text_data(*key)?.format(), flag, add);
            self.set_text_format(*key, format)?;
        }

        let size = self.text_data(last_target)?.len();
        let (a, f) = (Point::text(first_target, 0), Point::text(last_target, size));
        let mut next = if backward {
            RangeSelection::new(f, a)
        } else {
            RangeSelection::new(a, f)
        };
        next.format = self.text_data(first_target)?.format();
        next.style = range.style;
        self.set_selection(Some(next.into()));
        Ok(())
    }
}
