//! Editor state JSON round trips

use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use weft_editor::node::NodeRegistry;
use weft_editor::{Editor, EditorError, EditorState, NodeKey, StateRead};

#[derive(Debug, Clone)]
enum Inline {
    Text { text: String, format: u32 },
    LineBreak,
}

fn inline() -> impl Strategy<Value = Inline> {
    prop_oneof![
        4 => ("[a-zA-Z ]{1,8}", 0u32..256).prop_map(|(text, format)| Inline::Text { text, format }),
        1 => Just(Inline::LineBreak),
    ]
}

fn document() -> impl Strategy<Value = Vec<Vec<Inline>>> {
    prop::collection::vec(prop::collection::vec(inline(), 0..5), 0..5)
}

fn to_json(paragraphs: &[Vec<Inline>]) -> Value {
    let children: Vec<Value> = paragraphs
        .iter()
        .map(|inlines| {
            let children: Vec<Value> = inlines
                .iter()
                .map(|inline| match inline {
                    Inline::Text { text, format } => json!({
                        "type": "text",
                        "version": 1,
                        "text": text,
                        "format": format,
                    }),
                    Inline::LineBreak => json!({"type": "linebreak", "version": 1}),
                })
                .collect();
            json!({"type": "paragraph", "version": 1, "children": children})
        })
        .collect();
    json!({"root": {"type": "root", "version": 1, "children": children}})
}

fn registry() -> Arc<NodeRegistry> {
    Arc::new(NodeRegistry::with_builtins())
}

proptest! {
    #[test]
    fn prop_round_trip_is_stable(paragraphs in document()) {
        let source = to_json(&paragraphs).to_string();
        let first = EditorState::from_json_str(registry(), &source).unwrap();
        let exported = first.to_json_string().unwrap();
        let second = EditorState::from_json_str(registry(), &exported).unwrap();

        prop_assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
        prop_assert_eq!(first.root_text_content(), second.root_text_content());
        prop_assert_eq!(first.len(), second.len());
        prop_assert_eq!(
            first.children(NodeKey::ROOT).unwrap().len(),
            paragraphs.len()
        );
    }
}

#[test]
fn test_builder_loads_initial_state() {
    let json = to_json(&[vec![Inline::Text {
        text: "loaded".into(),
        format: 1,
    }]])
    .to_string();
    let editor = Editor::builder().initial_state(json).build().unwrap();
    let state = editor.get_editor_state();

    assert_eq!(state.root_text_content(), "loaded");
    let p = state.first_child(NodeKey::ROOT).unwrap().unwrap();
    let t = state.first_child(p).unwrap().unwrap();
    assert_eq!(state.text_data(t).unwrap().format().bits(), 1);
}

#[test]
fn test_parse_editor_state_rejects_unknown_types() {
    let editor = Editor::new();
    let json = json!({"root": {"type": "root", "children": [{"type": "table", "children": []}]}});
    let result = editor.parse_editor_state(&json.to_string());
    assert_eq!(
        result.err(),
        Some(EditorError::UnregisteredNodeType("table".to_string()))
    );
}

#[test]
fn test_parse_editor_state_reports_bad_json() {
    let editor = Editor::new();
    let result = editor.parse_editor_state("{\"root\": ");
    assert!(matches!(result, Err(EditorError::Serialization(_))));
}

#[test]
fn test_serialized_form_uses_type_and_version() {
    let state = EditorState::from_json_str(
        registry(),
        &to_json(&[vec![Inline::LineBreak]]).to_string(),
    )
    .unwrap();
    let value: Value = serde_json::from_str(&state.to_json_string().unwrap()).unwrap();

    assert_eq!(value["root"]["type"], "root");
    let paragraph = &value["root"]["children"][0];
    assert_eq!(paragraph["type"], "paragraph");
    assert_eq!(paragraph["version"], 1);
    assert_eq!(paragraph["children"][0]["type"], "linebreak");
    assert!(paragraph["children"][0].get("children").is_none());
}
