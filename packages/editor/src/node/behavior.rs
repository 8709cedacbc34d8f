//! Per-type node behavior.
//!
//! Every node type registered with an editor is described by one
//! [`NodeBehavior`]. The engine itself only knows the five bases; anything
//! type-specific (DOM shape, serialization, capability flags) goes through
//! this trait.

use super::{Node, NodeBase, NodeData};
use crate::config::EditorConfig;
use crate::serialize;
use crate::update::UpdateContext;
use crate::{EditorResult, NodeKey};
use serde_json::{Map, Value};
use std::fmt;
use weft_dom::{Document, DomNodeId};

/// What a behavior may touch while producing DOM.
pub struct RenderContext<'a> {
    pub document: &'a mut Document,
    pub config: &'a EditorConfig,
}

impl<'a> RenderContext<'a> {
    pub fn new(document: &'a mut Document, config: &'a EditorConfig) -> Self {
        Self { document, config }
    }

    pub fn theme_class(&self, key: &str) -> Option<&str> {
        self.config.theme.class_for(key)
    }

    /// Create `tag` carrying the theme class registered for `node_type`.
    pub fn create_themed_element(&mut self, tag: &str, node_type: &str) -> EditorResult<DomNodeId> {
        let dom = self.document.create_element(tag);
        if let Some(class) = self.config.theme.class_for(node_type) {
            let class = class.to_string();
            self.document.set_attribute(dom, "class", class)?;
        }
        Ok(dom)
    }
}

/// Turns one DOM node into editor nodes, or declines with `None`.
pub type ConvertFn =
    fn(&mut UpdateContext<'_>, &Document, DomNodeId) -> EditorResult<Option<DomConversionOutput>>;

/// Applied to every node created beneath the converted DOM node. Returning
/// `None` drops the child.
pub type ForChildFn =
    fn(&mut UpdateContext<'_>, NodeKey, Option<NodeKey>) -> EditorResult<Option<NodeKey>>;

/// Post-processes the converted children before they are attached.
pub type AfterFn = fn(&mut UpdateContext<'_>, Vec<NodeKey>) -> EditorResult<Vec<NodeKey>>;

/// A converter claimed for a tag name (`#text` for text nodes).
#[derive(Debug, Clone, Copy)]
pub struct DomConversion {
    pub tag: &'static str,
    /// Higher priorities are tried first.
    pub priority: u8,
    pub convert: ConvertFn,
}

#[derive(Debug, Default, Clone)]
pub struct DomConversionOutput {
    /// The created node; `None` lifts the children into the parent.
    pub node: Option<NodeKey>,
    pub for_child: Option<ForChildFn>,
    pub after: Option<AfterFn>,
}

impl DomConversionOutput {
    pub fn node(key: NodeKey) -> Self {
        Self {
            node: Some(key),
            ..Default::default()
        }
    }
}

pub trait NodeBehavior: fmt::Debug {
    fn node_type(&self) -> &str;

    fn base(&self) -> NodeBase;

    /// Written into serialized nodes as `version`.
    fn version(&self) -> u32 {
        1
    }

    fn is_inline(&self) -> bool {
        !self.base().is_element()
    }

    /// Shadow roots act like the root for the blocks they contain.
    fn is_shadow_root(&self) -> bool {
        self.base() == NodeBase::Root
    }

    /// When `false`, the element is removed once its last child goes.
    fn can_be_empty(&self) -> bool {
        true
    }

    fn can_insert_text_before(&self) -> bool {
        true
    }

    fn can_insert_text_after(&self) -> bool {
        true
    }

    /// Type of the block created when a paragraph break splits this element.
    fn insert_new_after(&self) -> Option<&str> {
        None
    }

    fn create_dom(&self, node: &Node, cx: &mut RenderContext<'_>) -> EditorResult<DomNodeId>;

    /// Patch `dom` in place. Returning `true` asks the reconciler to recreate it.
    fn update_dom(
        &self,
        prev: &Node,
        next: &Node,
        dom: DomNodeId,
        cx: &mut RenderContext<'_>,
    ) -> EditorResult<bool>;

    /// DOM used when exporting HTML; `None` omits the node.
    fn export_dom(&self, node: &Node, cx: &mut RenderContext<'_>) -> EditorResult<Option<DomNodeId>> {
        self.create_dom(node, cx).map(Some)
    }

    fn import_dom(&self) -> Vec<DomConversion> {
        Vec::new()
    }

    fn export_json(&self, node: &Node) -> Map<String, Value> {
        serialize::export_base_fields(node)
    }

    fn import_json(&self, fields: &Map<String, Value>) -> EditorResult<NodeData> {
        serialize::import_base_fields(self.base(), fields)
    }

    /// Host-facing payload for decorator nodes.
    fn decorate(&self, node: &Node) -> Option<Value> {
        node.decorator_payload()
            .filter(|payload| !payload.is_null())
            .cloned()
    }
}
