//! JSON form of editor states.
//!
//! ```json
//! {"root": {"type": "root", "version": 1, "format": "", "indent": 0,
//!           "direction": null, "children": [...]}}
//! ```
//!
//! Base fields are written by [`export_base_fields`]; node state goes under
//! `"$"`. Keys are not serialized, every import mints fresh ones.

use crate::node::{
    Direction, ElementData, ElementFormat, Node, NodeBase, NodeData, NodeRegistry, TextData,
    TextFormat, TextMode,
};
use crate::read::StateRead;
use crate::state::EditorState;
use crate::{EditorError, EditorResult, NodeKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const STATE_FIELD: &str = "$";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedEditorState {
    pub root: SerializedNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SerializedNode>>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn default_version() -> u32 {
    1
}

/// Fields every node of `node`'s base carries.
pub fn export_base_fields(node: &Node) -> Map<String, Value> {
    let mut fields = Map::new();
    match node.data() {
        NodeData::Root(data) | NodeData::Element(data) => {
            fields.insert("format".into(), serde_json::json!(data.format()));
            fields.insert("indent".into(), Value::from(data.indent()));
            fields.insert("direction".into(), serde_json::json!(data.direction()));
        }
        NodeData::Text(data) => {
            fields.insert("text".into(), Value::from(data.text()));
            fields.insert("format".into(), Value::from(data.format().bits()));
            fields.insert("style".into(), Value::from(data.style()));
            fields.insert("mode".into(), serde_json::json!(data.mode()));
            fields.insert("detail".into(), Value::from(data.detail()));
        }
        NodeData::Decorator(payload) => {
            if !payload.is_null() {
                fields.insert("payload".into(), payload.clone());
            }
        }
        NodeData::LineBreak => {}
    }
    fields
}

fn field<T: serde::de::DeserializeOwned + Default>(
    fields: &Map<String, Value>,
    name: &str,
) -> EditorResult<T> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| EditorError::Serialization(format!("field '{}': {}", name, e))),
    }
}

/// Inverse of [`export_base_fields`]. Missing fields take their defaults.
pub fn import_base_fields(base: NodeBase, fields: &Map<String, Value>) -> EditorResult<NodeData> {
    Ok(match base {
        NodeBase::Root | NodeBase::Element => {
            let data = ElementData::default()
                .with_format(field::<ElementFormat>(fields, "format")?)
                .with_indent(field::<u32>(fields, "indent")?)
                .with_direction(field::<Option<Direction>>(fields, "direction")?);
            if base == NodeBase::Root {
                NodeData::Root(data)
            } else {
                NodeData::Element(data)
            }
        }
        NodeBase::Text => NodeData::Text(
            TextData::new(field::<String>(fields, "text")?)
                .with_format(TextFormat::from_bits_truncate(field::<u32>(fields, "format")?))
                .with_style(field::<String>(fields, "style")?)
                .with_mode(field::<TextMode>(fields, "mode")?)
                .with_detail(field::<u32>(fields, "detail")?),
        ),
        NodeBase::LineBreak => NodeData::LineBreak,
        NodeBase::Decorator => {
            NodeData::Decorator(fields.get("payload").cloned().unwrap_or(Value::Null))
        }
    })
}

pub(crate) fn export_state(state: &EditorState) -> EditorResult<SerializedEditorState> {
    Ok(SerializedEditorState {
        root: export_node(state, NodeKey::ROOT)?,
    })
}

pub(crate) fn export_node(state: &EditorState, key: NodeKey) -> EditorResult<SerializedNode> {
    let node = state.node(key)?;
    let behavior = state.registry.get(node.node_type())?;
    let mut fields = behavior.export_json(node);
    if !node.state_map().is_empty() {
        let map: Map<String, Value> = node
            .state_map()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        fields.insert(STATE_FIELD.into(), Value::Object(map));
    }
    let children = match node.as_element() {
        Some(data) => Some(
            data.children()
                .iter()
                .map(|child| export_node(state, *child))
                .collect::<EditorResult<Vec<_>>>()?,
        ),
        None => None,
    };
    Ok(SerializedNode {
        node_type: node.node_type().to_string(),
        version: behavior.version(),
        children,
        fields,
    })
}

pub(crate) fn import_state(
    registry: Arc<NodeRegistry>,
    serialized: &SerializedEditorState,
) -> EditorResult<EditorState> {
    if serialized.root.node_type != "root" {
        return Err(EditorError::Serialization(format!(
            "expected a root node, found '{}'",
            serialized.root.node_type
        )));
    }
    let mut state = EditorState::empty(registry);
    let root = import_node(&mut state, &serialized.root, NodeKey::ROOT, None)?;
    debug_assert_eq!(root, NodeKey::ROOT);
    Ok(state)
}

fn import_node(
    state: &mut EditorState,
    serialized: &SerializedNode,
    key: NodeKey,
    parent: Option<NodeKey>,
) -> EditorResult<NodeKey> {
    let behavior = state.registry.get(&serialized.node_type)?.clone();
    if key.is_root() != (behavior.base() == NodeBase::Root) {
        return Err(EditorError::Serialization(format!(
            "node type '{}' cannot appear here",
            serialized.node_type
        )));
    }
    let mut data = behavior.import_json(&serialized.fields)?;

    if let Some(children) = &serialized.children {
        match &mut data {
            NodeData::Root(element) | NodeData::Element(element) => {
                for child in children {
                    let child_key = import_node(state, child, NodeKey::generate(), Some(key))?;
                    element.children.push(child_key);
                }
            }
            _ if children.is_empty() => {}
            _ => {
                return Err(EditorError::Serialization(format!(
                    "node type '{}' cannot have children",
                    serialized.node_type
                )))
            }
        }
    }

    let mut node = Node::new(key, Arc::from(behavior.node_type()), data);
    node.parent = parent;
    if let Some(value) = serialized.fields.get(STATE_FIELD) {
        let Value::Object(map) = value else {
            return Err(EditorError::Serialization(
                "node state must be an object".to_string(),
            ));
        };
        node.state = map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<BTreeMap<_, _>>();
    }
    state.node_map.insert(key, Arc::new(node));
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<NodeRegistry> {
        Arc::new(NodeRegistry::with_builtins())
    }

    const DOC: &str = r#"{
        "root": {
            "type": "root", "version": 1, "format": "", "indent": 0, "direction": null,
            "children": [{
                "type": "paragraph", "version": 1, "format": "center", "indent": 1,
                "direction": "ltr",
                "children": [
                    {"type": "text", "version": 1, "text": "Hello", "format": 1,
                     "style": "", "mode": "normal", "detail": 0},
                    {"type": "linebreak", "version": 1}
                ]
            }]
        }
    }"#;

    #[test]
    fn test_import_builds_linked_tree() {
        let state = EditorState::from_json_str(registry(), DOC).unwrap();
        let paragraph = state.first_child(NodeKey::ROOT).unwrap().unwrap();
        let element = state.element(paragraph).unwrap();
        assert_eq!(element.format(), ElementFormat::Center);
        assert_eq!(element.indent(), 1);
        assert_eq!(element.direction(), Some(Direction::Ltr));

        let text = element.children()[0];
        assert_eq!(state.parent(text).unwrap(), Some(paragraph));
        let data = state.text_data(text).unwrap();
        assert_eq!(data.text(), "Hello");
        assert!(data.has_format(TextFormat::BOLD));
        assert_eq!(state.root_text_content(), "Hello\n");
    }

    #[test]
    fn test_export_matches_import() {
        let state = EditorState::from_json_str(registry(), DOC).unwrap();
        let exported = serde_json::to_value(state.to_json().unwrap()).unwrap();
        let original: Value = serde_json::from_str(DOC).unwrap();
        assert_eq!(exported, original);
    }

    #[test]
    fn test_node_state_round_trips() {
        let json = r#"{"root": {"type": "root", "children": [
            {"type": "paragraph", "children": [], "$": {"id": "abc"}}
        ]}}"#;
        let state = EditorState::from_json_str(registry(), json).unwrap();
        let paragraph = state.first_child(NodeKey::ROOT).unwrap().unwrap();
        assert_eq!(
            state.node_state(paragraph, "id").unwrap(),
            Some(&Value::from("abc"))
        );
        let exported = state.to_json().unwrap();
        let child = &exported.root.children.as_ref().unwrap()[0];
        assert_eq!(child.fields["$"]["id"], "abc");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"root": {"type": "root", "children": [{"type": "table"}]}}"#;
        let err = EditorState::from_json_str(registry(), json).unwrap_err();
        assert_eq!(err, EditorError::UnregisteredNodeType("table".to_string()));
    }

    #[test]
    fn test_leaf_with_children_rejected() {
        let json = r#"{"root": {"type": "root", "children": [
            {"type": "paragraph", "children": [
                {"type": "text", "text": "x", "children": [{"type": "text"}]}
            ]}
        ]}}"#;
        assert!(matches!(
            EditorState::from_json_str(registry(), json),
            Err(EditorError::Serialization(_))
        ));
    }

    #[test]
    fn test_root_must_be_root() {
        let json = r#"{"root": {"type": "paragraph", "children": []}}"#;
        assert!(matches!(
            EditorState::from_json_str(registry(), json),
            Err(EditorError::Serialization(_))
        ));
    }
}
