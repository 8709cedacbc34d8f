//! Text, element and node-state setters, plus selection helpers.

use super::UpdateContext;
use crate::node::{Direction, ElementData, ElementFormat, TextData, TextFormat, TextMode};
use crate::read::StateRead;
use crate::selection::{NodeSelection, Point, PointType, RangeSelection, Selection};
use crate::{EditorError, EditorResult, NodeKey};
use serde_json::Value;

fn char_slice(text: &str, from: usize, to: usize) -> String {
    text.chars().skip(from).take(to.saturating_sub(from)).collect()
}

impl UpdateContext<'_> {
    fn text_writable(&mut self, key: NodeKey) -> EditorResult<&mut TextData> {
        self.text_data(key)?;
        let node = self.get_writable(key)?;
        let node_type = node.node_type().to_string();
        node.as_text_mut()
            .ok_or(EditorError::NotText { key, node_type })
    }

    fn element_writable(&mut self, key: NodeKey) -> EditorResult<&mut ElementData> {
        self.element(key)?;
        let node = self.get_writable(key)?;
        let node_type = node.node_type().to_string();
        node.as_element_mut()
            .ok_or(EditorError::NotAnElement { key, node_type })
    }

    // -----------------------------------------------------------------
    // Text
    // -----------------------------------------------------------------

    pub fn set_text_content(&mut self, key: NodeKey, text: impl Into<String>) -> EditorResult<()> {
        let text = text.into();
        if self.text_data(key)?.text() == text {
            return Ok(());
        }
        self.text_writable(key)?.text = text;
        Ok(())
    }

    /// Replace `delete_count` chars at `offset` with `insert`. With
    /// `move_selection` the caret lands after the inserted text.
    pub fn splice_text(
        &mut self,
        key: NodeKey,
        offset: usize,
        delete_count: usize,
        insert: &str,
        move_selection: bool,
    ) -> EditorResult<()> {
        let data = self.text_data(key)?;
        let size = data.len();
        if offset > size {
            return Err(EditorError::OffsetOutOfBounds { key, offset, size });
        }
        let delete_count = delete_count.min(size - offset);
        let inserted = insert.chars().count();
        let text = data.text();
        let mut next = char_slice(text, 0, offset);
        next.push_str(insert);
        next.push_str(&char_slice(text, offset + delete_count, size));
        self.set_text_content(key, next)?;

        if move_selection {
            if let Some(range) = self.range_selection_mut() {
                let caret = Point::text(key, offset + inserted);
                range.anchor = caret;
                range.focus = caret;
            }
        } else {
            self.for_each_point(|point| {
                if point.key != key || point.kind != PointType::Text || point.offset <= offset {
                    return;
                }
                point.offset = if point.offset >= offset + delete_count {
                    point.offset + inserted - delete_count
                } else {
                    offset + inserted
                };
            });
        }
        Ok(())
    }

    /// Split a text node at char `offsets`. The first part keeps `key`; the
    /// rest become new siblings carrying the same format, style and detail.
    /// Returns every part in order.
    pub fn split_text(&mut self, key: NodeKey, offsets: &[usize]) -> EditorResult<Vec<NodeKey>> {
        let data = self.text_data(key)?.clone();
        let chars: Vec<char> = data.text().chars().collect();

        let mut parts: Vec<String> = Vec::new();
        let mut current = String::new();
        for (i, ch) in chars.iter().enumerate() {
            if !current.is_empty() && offsets.contains(&i) {
                parts.push(std::mem::take(&mut current));
            }
            current.push(*ch);
        }
        if !current.is_empty() {
            parts.push(current);
        }
        if parts.len() <= 1 {
            return Ok(vec![key]);
        }
        self.parent(key)?.ok_or(EditorError::Detached(key))?;

        let composition = self.composition_key();
        self.text_writable(key)?.text = parts[0].clone();

        let mut split = vec![key];
        let mut size = parts[0].chars().count();
        let mut previous = key;
        for part in &parts[1..] {
            let part_size = part.chars().count();
            let sibling = self.create_text_node(part.clone())?;
            {
                let writable = self.text_writable(sibling)?;
                writable.format = data.format();
                writable.style = data.style().to_string();
                writable.detail = data.detail();
            }
            let next_size = size + part_size;
            self.for_each_point(|point| {
                if point.key == key
                    && point.kind == PointType::Text
                    && point.offset > size
                    && point.offset <= next_size
                {
                    point.key = sibling;
                    point.offset -= size;
                }
            });
            if composition == Some(key) {
                self.set_composition_key(Some(sibling));
            }
            self.insert_after(previous, sibling)?;
            previous = sibling;
            size = next_size;
            split.push(sibling);
        }
        Ok(split)
    }

    /// Merge the adjacent text node `target` into `key` and remove it.
    pub fn merge_with_sibling(&mut self, key: NodeKey, target: NodeKey) -> EditorResult<NodeKey> {
        let is_before = self.previous_sibling(key)? == Some(target);
        if !is_before && self.next_sibling(key)? != Some(target) {
            return Err(EditorError::InvalidOperation(format!(
                "{} is not a sibling of {}",
                target, key
            )));
        }
        let own = self.text_data(key)?.text().to_string();
        let other = self.text_data(target)?.text().to_string();
        let (own_len, other_len) = (own.chars().count(), other.chars().count());

        if self.composition_key() == Some(target) {
            self.set_composition_key(Some(key));
        }
        self.for_each_point(|point| {
            if point.key == target && point.kind == PointType::Text {
                point.key = key;
                if !is_before {
                    point.offset += own_len;
                }
            } else if is_before && point.key == key && point.kind == PointType::Text {
                point.offset += other_len;
            }
        });

        let merged = if is_before { other + &own } else { own + &other };
        self.set_text_content(key, merged)?;
        self.remove(target)?;
        Ok(key)
    }

    pub fn set_text_format(&mut self, key: NodeKey, format: TextFormat) -> EditorResult<()> {
        if self.text_data(key)?.format() != format {
            self.text_writable(key)?.format = format;
        }
        Ok(())
    }

    pub fn toggle_text_format(&mut self, key: NodeKey, flag: TextFormat) -> EditorResult<()> {
        let format = self.text_data(key)?.format().toggled(flag);
        self.set_text_format(key, format)
    }

    pub fn set_text_style(&mut self, key: NodeKey, style: impl Into<String>) -> EditorResult<()> {
        let style = style.into();
        if self.text_data(key)?.style() != style {
            self.text_writable(key)?.style = style;
        }
        Ok(())
    }

    pub fn set_text_mode(&mut self, key: NodeKey, mode: TextMode) -> EditorResult<()> {
        if self.text_data(key)?.mode() != mode {
            self.text_writable(key)?.mode = mode;
        }
        Ok(())
    }

    pub fn set_text_detail(&mut self, key: NodeKey, detail: u32) -> EditorResult<()> {
        if self.text_data(key)?.detail() != detail {
            self.text_writable(key)?.detail = detail;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Elements
    // -----------------------------------------------------------------

    pub fn set_element_format(&mut self, key: NodeKey, format: ElementFormat) -> EditorResult<()> {
        if self.element(key)?.format() != format {
            self.element_writable(key)?.format = format;
        }
        Ok(())
    }

    pub fn set_indent(&mut self, key: NodeKey, indent: u32) -> EditorResult<()> {
        if self.element(key)?.indent() != indent {
            self.element_writable(key)?.indent = indent;
        }
        Ok(())
    }

    pub fn set_direction(&mut self, key: NodeKey, direction: Option<Direction>) -> EditorResult<()> {
        if self.element(key)?.direction() != direction {
            self.element_writable(key)?.direction = direction;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Node state
    // -----------------------------------------------------------------

    pub fn set_node_state(
        &mut self,
        key: NodeKey,
        name: impl Into<String>,
        value: Value,
    ) -> EditorResult<()> {
        let name = name.into();
        if self.node(key)?.state(&name) == Some(&value) {
            return Ok(());
        }
        self.get_writable(key)?.state.insert(name, value);
        Ok(())
    }

    pub fn remove_node_state(&mut self, key: NodeKey, name: &str) -> EditorResult<Option<Value>> {
        if self.node(key)?.state(name).is_none() {
            return Ok(None);
        }
        Ok(self.get_writable(key)?.state.remove(name))
    }

    // -----------------------------------------------------------------
    // Selecting
    // -----------------------------------------------------------------

    /// Select chars `anchor..focus` of a text node. The selection picks up
    /// the node's format and style.
    pub fn select_text(
        &mut self,
        key: NodeKey,
        anchor: usize,
        focus: usize,
    ) -> EditorResult<RangeSelection> {
        let data = self.text_data(key)?;
        let size = data.len();
        for offset in [anchor, focus] {
            if offset > size {
                return Err(EditorError::OffsetOutOfBounds { key, offset, size });
            }
        }
        let mut range = RangeSelection::new(Point::text(key, anchor), Point::text(key, focus));
        range.format = data.format();
        range.style = data.style().to_string();
        self.set_selection(Some(range.clone().into()));
        Ok(range)
    }

    pub fn select_element(
        &mut self,
        key: NodeKey,
        anchor: usize,
        focus: usize,
    ) -> EditorResult<RangeSelection> {
        let size = self.element(key)?.len();
        for offset in [anchor, focus] {
            if offset > size {
                return Err(EditorError::OffsetOutOfBounds { key, offset, size });
            }
        }
        let range = RangeSelection::new(Point::element(key, anchor), Point::element(key, focus));
        self.set_selection(Some(range.clone().into()));
        Ok(range)
    }

    /// Collapse the selection at the start of `key`.
    pub fn select_start(&mut self, key: NodeKey) -> EditorResult<RangeSelection> {
        let target = match self.node(key)?.is_element() {
            true => self.first_descendant(key)?.unwrap_or(key),
            false => key,
        };
        let node = self.node(target)?;
        if node.is_text() {
            return self.select_text(target, 0, 0);
        }
        if node.is_element() {
            return self.select_element(target, 0, 0);
        }
        let parent = self.parent(target)?.ok_or(EditorError::Detached(target))?;
        let index = self
            .index_within_parent(target)?
            .ok_or(EditorError::Detached(target))?;
        self.select_element(parent, index, index)
    }

    /// Collapse the selection at the end of `key`.
    pub fn select_end(&mut self, key: NodeKey) -> EditorResult<RangeSelection> {
        let target = match self.node(key)?.is_element() {
            true => self.last_descendant(key)?.unwrap_or(key),
            false => key,
        };
        let point = self.end_point(target)?;
        match point.kind {
            PointType::Text => self.select_text(point.key, point.offset, point.offset),
            PointType::Element => self.select_element(point.key, point.offset, point.offset),
        }
    }

    /// Replace the selection with a node selection holding `key`.
    pub fn select_node(&mut self, key: NodeKey) -> EditorResult<()> {
        self.node(key)?;
        let mut nodes = NodeSelection::new();
        nodes.add(key);
        self.set_selection(Some(Selection::Node(nodes)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::node::TextFormat;
    use crate::read::StateRead;
    use crate::selection::{Point, RangeSelection};
    use crate::update::{PendingState, UpdateContext};
    use crate::{Editor, EditorError, NodeKey};

    fn with_text(text: &str, f: impl FnOnce(&mut UpdateContext<'_>, NodeKey, NodeKey)) {
        let editor = Editor::new();
        let mut pending = PendingState::from_state(&editor.get_editor_state());
        let mut ctx = UpdateContext::new(&editor, &mut pending);
        let p = ctx.create_paragraph().unwrap();
        ctx.append(NodeKey::ROOT, p).unwrap();
        let t = ctx.create_text_node(text).unwrap();
        ctx.append(p, t).unwrap();
        f(&mut ctx, p, t);
    }

    #[test]
    fn test_split_text_moves_caret() {
        with_text("hello", |ctx, p, t| {
            ctx.set_selection(Some(RangeSelection::collapsed(Point::text(t, 3)).into()));
            let parts = ctx.split_text(t, &[2]).unwrap();
            assert_eq!(parts.len(), 2);
            assert_eq!(parts[0], t);
            assert_eq!(ctx.text_data(t).unwrap().text(), "he");
            assert_eq!(ctx.text_data(parts[1]).unwrap().text(), "llo");
            assert_eq!(ctx.children(p).unwrap(), &parts[..]);
            assert_eq!(
                ctx.range_selection().unwrap().anchor,
                Point::text(parts[1], 1)
            );
        });
    }

    #[test]
    fn test_split_text_without_split_returns_self() {
        with_text("hello", |ctx, _, t| {
            assert_eq!(ctx.split_text(t, &[0, 5]).unwrap(), vec![t]);
            assert_eq!(ctx.split_text(t, &[]).unwrap(), vec![t]);
        });
    }

    #[test]
    fn test_split_text_counts_chars() {
        with_text("héllo", |ctx, _, t| {
            let parts = ctx.split_text(t, &[1, 3]).unwrap();
            let texts: Vec<_> = parts
                .iter()
                .map(|k| ctx.text_data(*k).unwrap().text().to_string())
                .collect();
            assert_eq!(texts, vec!["h", "él", "lo"]);
        });
    }

    #[test]
    fn test_split_keeps_format() {
        with_text("hello", |ctx, _, t| {
            ctx.set_text_format(t, TextFormat::BOLD).unwrap();
            let parts = ctx.split_text(t, &[1]).unwrap();
            assert!(ctx.text_data(parts[1]).unwrap().has_format(TextFormat::BOLD));
        });
    }

    #[test]
    fn test_merge_with_next_sibling() {
        with_text("ab", |ctx, p, t| {
            let next = ctx.create_text_node("cd").unwrap();
            ctx.append(p, next).unwrap();
            ctx.set_selection(Some(RangeSelection::collapsed(Point::text(next, 1)).into()));
            ctx.merge_with_sibling(t, next).unwrap();
            assert_eq!(ctx.text_data(t).unwrap().text(), "abcd");
            assert_eq!(ctx.children(p).unwrap(), &[t]);
            assert_eq!(ctx.range_selection().unwrap().anchor, Point::text(t, 3));
        });
    }

    #[test]
    fn test_splice_text() {
        with_text("hello", |ctx, _, t| {
            ctx.set_selection(Some(RangeSelection::collapsed(Point::text(t, 5)).into()));
            ctx.splice_text(t, 1, 3, "ipp", false).unwrap();
            assert_eq!(ctx.text_data(t).unwrap().text(), "hippo");
            assert_eq!(ctx.range_selection().unwrap().anchor, Point::text(t, 5));

            ctx.splice_text(t, 0, 0, "a ", true).unwrap();
            assert_eq!(ctx.range_selection().unwrap().anchor, Point::text(t, 2));
            assert_eq!(
                ctx.splice_text(t, 20, 0, "x", false),
                Err(EditorError::OffsetOutOfBounds { key: t, offset: 20, size: 7 })
            );
        });
    }

    #[test]
    fn test_select_text_bounds() {
        with_text("abc", |ctx, _, t| {
            assert!(ctx.select_text(t, 0, 3).is_ok());
            assert!(ctx.select_text(t, 0, 4).is_err());
            let range = ctx.select_end(t).unwrap();
            assert_eq!(range.anchor, Point::text(t, 3));
        });
    }

    #[test]
    fn test_setters_are_noops_when_equal() {
        with_text("abc", |ctx, _, t| {
            ctx.pending.dirty_leaves.clear();
            ctx.set_text_content(t, "abc").unwrap();
            ctx.set_text_format(t, TextFormat::empty()).unwrap();
            assert!(ctx.dirty_leaves().is_empty());
        });
    }
}
