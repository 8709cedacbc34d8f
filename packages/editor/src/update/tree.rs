//! Structural mutations: attaching, moving, removing and replacing nodes.
//!
//! Range selection points are kept valid as the tree changes. Element points
//! on a parent shift when children are inserted or removed before them, and
//! points inside a removed subtree move to the nearest surviving sibling.

use super::UpdateContext;
use crate::read::StateRead;
use crate::selection::{Point, PointType, Selection};
use crate::{EditorError, EditorResult, NodeKey};

impl UpdateContext<'_> {
    fn children_writable(&mut self, key: NodeKey) -> EditorResult<&mut Vec<NodeKey>> {
        self.element(key)?;
        let node = self.get_writable(key)?;
        let node_type = node.node_type().to_string();
        node.as_element_mut()
            .map(|data| &mut data.children)
            .ok_or(EditorError::NotAnElement { key, node_type })
    }

    pub(crate) fn for_each_point(&mut self, mut f: impl FnMut(&mut Point)) {
        if let Some(range) = self.range_selection_mut() {
            f(&mut range.anchor);
            f(&mut range.focus);
        }
    }

    /// Take `key` out of its parent's child list. Returns the old position.
    pub(crate) fn detach(&mut self, key: NodeKey) -> EditorResult<Option<(NodeKey, usize)>> {
        let Some(parent) = self.parent(key)? else {
            return Ok(None);
        };
        let index = self
            .children(parent)?
            .iter()
            .position(|k| *k == key)
            .ok_or(EditorError::Detached(key))?;

        self.children_writable(parent)?.remove(index);
        self.get_writable(key)?.parent = None;
        self.for_each_point(|point| {
            if point.kind == PointType::Element && point.key == parent && point.offset > index {
                point.offset -= 1;
            }
        });
        Ok(Some((parent, index)))
    }

    /// Insert `key` at `index` of `parent`, moving it from wherever it was.
    pub(crate) fn attach_at(
        &mut self,
        parent: NodeKey,
        index: usize,
        key: NodeKey,
    ) -> EditorResult<()> {
        if key.is_root() {
            return Err(EditorError::RootOperation("insert"));
        }
        self.node(key)?;
        let size = self.element(parent)?.len();
        if key == parent || self.is_ancestor_of(key, parent) {
            return Err(EditorError::CycleDetected { parent, child: key });
        }

        let mut index = index;
        let mut available = size;
        if self.parent(key)? == Some(parent) {
            available -= 1;
            if let Some(current) = self.children(parent)?.iter().position(|k| *k == key) {
                if current < index {
                    index -= 1;
                }
            }
        }
        if index > available {
            return Err(EditorError::OffsetOutOfBounds {
                key: parent,
                offset: index,
                size: available,
            });
        }

        self.detach(key)?;
        self.children_writable(parent)?.insert(index, key);
        self.get_writable(key)?.parent = Some(parent);
        self.for_each_point(|point| {
            if point.kind == PointType::Element && point.key == parent && point.offset >= index {
                point.offset += 1;
            }
        });
        Ok(())
    }

    pub fn append(&mut self, parent: NodeKey, key: NodeKey) -> EditorResult<()> {
        let size = self.children_size(parent)?;
        self.attach_at(parent, size, key)
    }

    pub fn append_all(
        &mut self,
        parent: NodeKey,
        keys: impl IntoIterator<Item = NodeKey>,
    ) -> EditorResult<()> {
        for key in keys {
            self.append(parent, key)?;
        }
        Ok(())
    }

    pub fn insert_child(&mut self, parent: NodeKey, index: usize, key: NodeKey) -> EditorResult<()> {
        self.attach_at(parent, index, key)
    }

    fn sibling_position(&self, sibling: NodeKey) -> EditorResult<(NodeKey, usize)> {
        if sibling.is_root() {
            return Err(EditorError::RootOperation("insert a sibling of"));
        }
        let parent = self.parent(sibling)?.ok_or(EditorError::Detached(sibling))?;
        let index = self
            .index_within_parent(sibling)?
            .ok_or(EditorError::Detached(sibling))?;
        Ok((parent, index))
    }

    pub fn insert_before(&mut self, sibling: NodeKey, key: NodeKey) -> EditorResult<()> {
        let (parent, index) = self.sibling_position(sibling)?;
        self.attach_at(parent, index, key)
    }

    pub fn insert_after(&mut self, sibling: NodeKey, key: NodeKey) -> EditorResult<()> {
        let (parent, index) = self.sibling_position(sibling)?;
        self.attach_at(parent, index + 1, key)
    }

    /// Remove `key` from the tree. A parent that cannot be empty is removed
    /// along with its last child.
    pub fn remove(&mut self, key: NodeKey) -> EditorResult<()> {
        self.remove_node(key, false)
    }

    pub fn remove_preserving_parent(&mut self, key: NodeKey) -> EditorResult<()> {
        self.remove_node(key, true)
    }

    fn remove_node(&mut self, key: NodeKey, preserve_empty_parent: bool) -> EditorResult<()> {
        if key.is_root() {
            return Err(EditorError::RootOperation("remove"));
        }
        let Some(parent) = self.parent(key)? else {
            return Ok(());
        };

        let prev = self.previous_sibling(key)?;
        let next = self.next_sibling(key)?;
        let mut moved = Vec::new();
        if let Some(range) = self.range_selection() {
            for (i, point) in [range.anchor, range.focus].into_iter().enumerate() {
                if point.key == key || self.is_ancestor_of(key, point.key) {
                    moved.push((i, self.point_at_sibling(key, parent, prev, next)?));
                }
            }
        }
        match self.selection_mut() {
            Some(Selection::Range(range)) => {
                for (i, point) in moved {
                    if i == 0 {
                        range.anchor = point;
                    } else {
                        range.focus = point;
                    }
                }
            }
            Some(Selection::Node(nodes)) => nodes.delete(key),
            _ => {}
        }

        self.detach(key)?;

        if !preserve_empty_parent
            && !parent.is_root()
            && self.children_size(parent)? == 0
            && !self.behavior(parent)?.can_be_empty()
            && !self.behavior(parent)?.is_shadow_root()
        {
            self.remove_node(parent, false)?;
        }
        Ok(())
    }

    /// Where a point inside a removed node should go: the end of the previous
    /// sibling, the start of the next one, or the parent at the node's index.
    fn point_at_sibling(
        &self,
        key: NodeKey,
        parent: NodeKey,
        prev: Option<NodeKey>,
        next: Option<NodeKey>,
    ) -> EditorResult<Point> {
        if let Some(prev) = prev {
            let node = self.node(prev)?;
            if let Some(text) = node.as_text() {
                return Ok(Point::text(prev, text.len()));
            }
            if let Some(element) = node.as_element() {
                return Ok(Point::element(prev, element.len()));
            }
        } else if let Some(next) = next {
            let node = self.node(next)?;
            if node.is_text() {
                return Ok(Point::text(next, 0));
            }
            if node.is_element() {
                return Ok(Point::element(next, 0));
            }
        }
        let offset = match self.index_within_parent(key)? {
            Some(index) => index,
            None => self.children_size(parent)?,
        };
        Ok(Point::element(parent, offset))
    }

    /// The point at the end of `key`.
    pub(crate) fn end_point(&self, key: NodeKey) -> EditorResult<Point> {
        let node = self.node(key)?;
        if let Some(text) = node.as_text() {
            return Ok(Point::text(key, text.len()));
        }
        if let Some(element) = node.as_element() {
            return Ok(Point::element(key, element.len()));
        }
        let parent = self.parent(key)?.ok_or(EditorError::Detached(key))?;
        let index = self.index_within_parent(key)?.ok_or(EditorError::Detached(key))?;
        Ok(Point::element(parent, index + 1))
    }

    /// Put `replacement` where `key` is and remove `key`. With
    /// `include_children` the children move over too.
    pub fn replace(
        &mut self,
        key: NodeKey,
        replacement: NodeKey,
        include_children: bool,
    ) -> EditorResult<NodeKey> {
        if key.is_root() || replacement.is_root() {
            return Err(EditorError::RootOperation("replace"));
        }
        if key == replacement {
            return Ok(key);
        }
        self.parent(key)?.ok_or(EditorError::Detached(key))?;

        if include_children {
            self.element(replacement)?;
            let children = self.element(key)?.children().to_vec();
            for child in children {
                self.append(replacement, child)?;
            }
        }
        self.insert_after(key, replacement)?;

        let keep_offsets = include_children;
        let end = self.end_point(replacement)?;
        self.for_each_point(|point| {
            if point.key != key {
                return;
            }
            if keep_offsets && point.kind == PointType::Element {
                point.key = replacement;
            } else {
                *point = end;
            }
        });
        self.remove_preserving_parent(key)?;
        Ok(replacement)
    }

    /// Remove every child of `key`.
    pub fn clear(&mut self, key: NodeKey) -> EditorResult<()> {
        let children = self.element(key)?.children().to_vec();
        for child in children {
            self.remove_preserving_parent(child)?;
        }
        Ok(())
    }

    /// Remove `delete_count` children from `start` and insert `nodes` there.
    pub fn splice(
        &mut self,
        key: NodeKey,
        start: usize,
        delete_count: usize,
        nodes: &[NodeKey],
    ) -> EditorResult<()> {
        let children = self.element(key)?.children().to_vec();
        if start > children.len() {
            return Err(EditorError::OffsetOutOfBounds {
                key,
                offset: start,
                size: children.len(),
            });
        }
        let end = (start + delete_count).min(children.len());
        for child in &children[start..end] {
            self.remove_preserving_parent(*child)?;
        }
        for (i, node) in nodes.iter().enumerate() {
            self.attach_at(key, start + i, *node)?;
        }
        if !key.is_root()
            && self.children_size(key)? == 0
            && !self.behavior(key)?.can_be_empty()
        {
            self.remove(key)?;
        }
        Ok(())
    }
}
