//! # Nodes
//!
//! A [`Node`] is an immutable record stored behind an `Arc` in the state's
//! node map. Structure is held by keys: an element lists its children's keys
//! and every node records its parent's key.
//!
//! Nodes never change in place once a state is committed. The update context
//! clones a node the first time it is written during a cycle.

mod behavior;
mod builtin;
mod registry;

use crate::NodeKey;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use behavior::{
    AfterFn, ConvertFn, DomConversion, DomConversionOutput, ForChildFn, NodeBehavior,
    RenderContext,
};
pub use builtin::{LineBreakBehavior, ParagraphBehavior, RootBehavior, TextBehavior};
pub(crate) use builtin::element_style;
pub use registry::NodeRegistry;

/// The base kind a node type derives from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeBase {
    Root,
    Element,
    Text,
    LineBreak,
    Decorator,
}

impl NodeBase {
    pub fn is_element(self) -> bool {
        matches!(self, NodeBase::Root | NodeBase::Element)
    }
}

bitflags! {
    /// Inline formatting applied to a text node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextFormat: u32 {
        const BOLD = 1;
        const ITALIC = 1 << 1;
        const STRIKETHROUGH = 1 << 2;
        const UNDERLINE = 1 << 3;
        const CODE = 1 << 4;
        const SUBSCRIPT = 1 << 5;
        const SUPERSCRIPT = 1 << 6;
        const HIGHLIGHT = 1 << 7;
    }
}

impl TextFormat {
    const NAMES: [(&'static str, TextFormat); 8] = [
        ("bold", TextFormat::BOLD),
        ("italic", TextFormat::ITALIC),
        ("strikethrough", TextFormat::STRIKETHROUGH),
        ("underline", TextFormat::UNDERLINE),
        ("code", TextFormat::CODE),
        ("subscript", TextFormat::SUBSCRIPT),
        ("superscript", TextFormat::SUPERSCRIPT),
        ("highlight", TextFormat::HIGHLIGHT),
    ];

    pub fn from_format_name(name: &str) -> Option<TextFormat> {
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, format)| *format)
    }

    /// Names of the set flags, in flag order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(_, format)| self.contains(*format))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Toggle `flag`, keeping subscript and superscript exclusive.
    pub fn toggled(self, flag: TextFormat) -> TextFormat {
        let mut next = self ^ flag;
        if next.contains(TextFormat::SUBSCRIPT) && flag == TextFormat::SUPERSCRIPT {
            next.remove(TextFormat::SUBSCRIPT);
        } else if next.contains(TextFormat::SUPERSCRIPT) && flag == TextFormat::SUBSCRIPT {
            next.remove(TextFormat::SUPERSCRIPT);
        }
        next
    }
}

/// Detail flag: the node is never merged with its neighbours.
pub const DETAIL_UNMERGEABLE: u32 = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    #[default]
    Normal,
    /// Edited as a single atom; partial edits are rejected.
    Token,
    /// Any edit removes the node's trailing segment.
    Segmented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementFormat {
    #[default]
    #[serde(rename = "")]
    None,
    Left,
    Start,
    Center,
    Right,
    End,
    Justify,
}

impl ElementFormat {
    pub fn as_css(self) -> Option<&'static str> {
        match self {
            ElementFormat::None => None,
            ElementFormat::Left => Some("left"),
            ElementFormat::Start => Some("start"),
            ElementFormat::Center => Some("center"),
            ElementFormat::Right => Some("right"),
            ElementFormat::End => Some("end"),
            ElementFormat::Justify => Some("justify"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementData {
    pub(crate) children: Vec<NodeKey>,
    pub(crate) format: ElementFormat,
    pub(crate) indent: u32,
    pub(crate) direction: Option<Direction>,
}

impl ElementData {
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn format(&self) -> ElementFormat {
        self.format
    }

    pub fn indent(&self) -> u32 {
        self.indent
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn with_format(mut self, format: ElementFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_indent(mut self, indent: u32) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_direction(mut self, direction: Option<Direction>) -> Self {
        self.direction = direction;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextData {
    pub(crate) text: String,
    pub(crate) format: TextFormat,
    pub(crate) style: String,
    pub(crate) mode: TextMode,
    pub(crate) detail: u32,
}

impl TextData {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters. All text offsets are character offsets.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn format(&self) -> TextFormat {
        self.format
    }

    pub fn has_format(&self, format: TextFormat) -> bool {
        self.format.contains(format)
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn mode(&self) -> TextMode {
        self.mode
    }

    pub fn detail(&self) -> u32 {
        self.detail
    }

    pub fn is_unmergeable(&self) -> bool {
        self.detail & DETAIL_UNMERGEABLE != 0
    }

    pub fn with_format(mut self, format: TextFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_mode(mut self, mode: TextMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_detail(mut self, detail: u32) -> Self {
        self.detail = detail;
        self
    }
}

/// Base-specific payload of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Root(ElementData),
    Element(ElementData),
    Text(TextData),
    LineBreak,
    /// Host-facing payload of a decorator.
    Decorator(Value),
}

impl NodeData {
    pub fn base(&self) -> NodeBase {
        match self {
            NodeData::Root(_) => NodeBase::Root,
            NodeData::Element(_) => NodeBase::Element,
            NodeData::Text(_) => NodeBase::Text,
            NodeData::LineBreak => NodeBase::LineBreak,
            NodeData::Decorator(_) => NodeBase::Decorator,
        }
    }

    pub fn empty(base: NodeBase) -> NodeData {
        match base {
            NodeBase::Root => NodeData::Root(ElementData::default()),
            NodeBase::Element => NodeData::Element(ElementData::default()),
            NodeBase::Text => NodeData::Text(TextData::default()),
            NodeBase::LineBreak => NodeData::LineBreak,
            NodeBase::Decorator => NodeData::Decorator(Value::Null),
        }
    }
}

/// One node of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) key: NodeKey,
    pub(crate) node_type: Arc<str>,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) data: NodeData,
    pub(crate) state: BTreeMap<String, Value>,
}

impl Node {
    pub(crate) fn new(key: NodeKey, node_type: Arc<str>, data: NodeData) -> Self {
        Self {
            key,
            node_type,
            parent: None,
            data,
            state: BTreeMap::new(),
        }
    }

    pub(crate) fn root() -> Self {
        Self::new(
            NodeKey::ROOT,
            Arc::from("root"),
            NodeData::Root(ElementData::default()),
        )
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn base(&self) -> NodeBase {
        self.data.base()
    }

    pub fn is_root(&self) -> bool {
        matches!(self.data, NodeData::Root(_))
    }

    /// Root or element.
    pub fn is_element(&self) -> bool {
        self.as_element().is_some()
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    pub fn is_line_break(&self) -> bool {
        matches!(self.data, NodeData::LineBreak)
    }

    pub fn is_decorator(&self) -> bool {
        matches!(self.data, NodeData::Decorator(_))
    }

    pub fn decorator_payload(&self) -> Option<&Value> {
        match &self.data {
            NodeData::Decorator(payload) => Some(payload),
            _ => None,
        }
    }

    /// A plain `text` node in normal mode, the only kind normalization merges.
    pub fn is_simple_text(&self) -> bool {
        match &self.data {
            NodeData::Text(text) => &*self.node_type == "text" && text.mode == TextMode::Normal,
            _ => false,
        }
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Root(data) | NodeData::Element(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Root(data) | NodeData::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextData> {
        match &self.data {
            NodeData::Text(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn as_text_mut(&mut self) -> Option<&mut TextData> {
        match &mut self.data {
            NodeData::Text(data) => Some(data),
            _ => None,
        }
    }

    /// Children keys; empty for leaves.
    pub fn children(&self) -> &[NodeKey] {
        self.as_element().map(|e| e.children()).unwrap_or(&[])
    }

    /// Text of a text node; `None` for every other base.
    pub fn text(&self) -> Option<&str> {
        self.as_text().map(|t| t.text())
    }

    pub fn state(&self, name: &str) -> Option<&Value> {
        self.state.get(name)
    }

    pub fn state_map(&self) -> &BTreeMap<String, Value> {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        let format = TextFormat::BOLD | TextFormat::CODE;
        assert_eq!(format.names(), vec!["bold", "code"]);
        assert_eq!(TextFormat::from_format_name("italic"), Some(TextFormat::ITALIC));
        assert_eq!(TextFormat::from_format_name("blink"), None);
    }

    #[test]
    fn test_toggle_keeps_scripts_exclusive() {
        let format = TextFormat::SUBSCRIPT.toggled(TextFormat::SUPERSCRIPT);
        assert_eq!(format, TextFormat::SUPERSCRIPT);
        assert_eq!(TextFormat::BOLD.toggled(TextFormat::BOLD), TextFormat::empty());
    }

    #[test]
    fn test_simple_text_requires_text_type_and_normal_mode() {
        let key = NodeKey::generate();
        let plain = Node::new(key, Arc::from("text"), NodeData::Text(TextData::new("a")));
        assert!(plain.is_simple_text());

        let token = Node::new(
            key,
            Arc::from("text"),
            NodeData::Text(TextData::new("a").with_mode(TextMode::Token)),
        );
        assert!(!token.is_simple_text());

        let custom = Node::new(key, Arc::from("hashtag"), NodeData::Text(TextData::new("a")));
        assert!(!custom.is_simple_text());
    }

    #[test]
    fn test_text_length_counts_chars() {
        assert_eq!(TextData::new("héllo").len(), 5);
    }
}
