//! Command dispatch and listener notification

use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use weft_editor::node::{Node, NodeBase, NodeBehavior, NodeData, RenderContext};
use weft_editor::weft_dom::{shared_document, DomNodeId};
use weft_editor::{
    create_command, Command, CommandPriority, Editor, EditorError, EditorResult, NodeKey,
    NodeMutation, StateRead, CONTROLLED_TEXT_INSERTION_COMMAND, FOCUS_COMMAND,
};

const PING: Command<u32> = create_command("PING");

fn seeded(text: &str) -> (Editor, NodeKey, NodeKey) {
    let editor = Editor::new();
    let keys = Rc::new(Cell::new(None));
    let out = keys.clone();
    let text = text.to_string();
    editor
        .update(move |ctx| {
            let p = ctx.create_paragraph()?;
            let t = ctx.create_text_node(text)?;
            ctx.append(p, t)?;
            ctx.append(NodeKey::ROOT, p)?;
            out.set(Some((p, t)));
            Ok(())
        })
        .unwrap();
    editor.flush().unwrap();
    let (p, t) = keys.get().unwrap();
    (editor, p, t)
}

#[derive(Debug)]
struct EmojiBehavior;

impl NodeBehavior for EmojiBehavior {
    fn node_type(&self) -> &str {
        "emoji"
    }

    fn base(&self) -> NodeBase {
        NodeBase::Decorator
    }

    fn create_dom(&self, _node: &Node, cx: &mut RenderContext<'_>) -> EditorResult<DomNodeId> {
        Ok(cx.document.create_element("span"))
    }

    fn update_dom(
        &self,
        _prev: &Node,
        _next: &Node,
        _dom: DomNodeId,
        _cx: &mut RenderContext<'_>,
    ) -> EditorResult<bool> {
        Ok(false)
    }
}

#[test]
fn test_handlers_run_by_priority_and_stop_when_handled() {
    let editor = Editor::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let log = order.clone();
    let _low = editor.register_command(&PING, CommandPriority::Low, move |n, _| {
        log.borrow_mut().push(format!("low {n}"));
        Ok(false)
    });
    let log = order.clone();
    let _high = editor.register_command(&PING, CommandPriority::High, move |n, _| {
        log.borrow_mut().push(format!("high {n}"));
        Ok(*n == 2)
    });
    let log = order.clone();
    let _editor_level = editor.register_command(&PING, CommandPriority::Editor, move |n, _| {
        log.borrow_mut().push(format!("editor {n}"));
        Ok(true)
    });

    assert!(editor.dispatch_command(&PING, 1).unwrap());
    assert!(editor.dispatch_command(&PING, 2).unwrap());
    assert_eq!(
        *order.borrow(),
        vec!["high 1", "low 1", "editor 1", "high 2"]
    );
}

#[test]
fn test_dispatch_without_handlers_is_unhandled() {
    let editor = Editor::new();
    assert!(!editor.dispatch_command(&PING, 0).unwrap());
}

#[test]
fn test_unregister_is_idempotent() {
    let editor = Editor::new();
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let first = editor.register_command(&PING, CommandPriority::Normal, move |_, _| {
        counter.set(counter.get() + 1);
        Ok(false)
    });
    let counter = calls.clone();
    let _second = editor.register_command(&PING, CommandPriority::Normal, move |_, _| {
        counter.set(counter.get() + 10);
        Ok(false)
    });

    first.unregister();
    first.unregister();
    editor.dispatch_command(&PING, 0).unwrap();
    assert_eq!(calls.get(), 10);
}

#[test]
fn test_payload_command_edits_inside_update() {
    let (editor, _, t) = seeded("hi");
    let _handle = editor.register_command(
        &CONTROLLED_TEXT_INSERTION_COMMAND,
        CommandPriority::Editor,
        |text, ctx| {
            ctx.insert_text(text)?;
            Ok(true)
        },
    );
    editor
        .update(move |ctx| ctx.select_text(t, 2, 2).map(|_| ()))
        .unwrap();

    let handled = editor
        .dispatch_command(&CONTROLLED_TEXT_INSERTION_COMMAND, "!".to_string())
        .unwrap();
    editor.flush().unwrap();

    assert!(handled);
    assert_eq!(editor.get_editor_state().root_text_content(), "hi!");
}

#[test]
fn test_handler_errors_surface_from_dispatch() {
    let editor = Editor::new();
    let _handle = editor.register_command(&PING, CommandPriority::Normal, |_, ctx| {
        ctx.remove(NodeKey::ROOT)?;
        Ok(true)
    });
    let result = editor.dispatch_command(&PING, 0);
    assert_eq!(result, Err(EditorError::RootOperation("remove")));
}

#[test]
fn test_focus_dispatches_focus_command() {
    let (editor, _, t) = seeded("hi");
    let document = shared_document();
    let root = document.borrow_mut().create_element("div");
    editor.set_root_element(&document, root).unwrap();

    let focused = Rc::new(Cell::new(false));
    let flag = focused.clone();
    let _handle = editor.register_command(&FOCUS_COMMAND, CommandPriority::Editor, move |_, _| {
        flag.set(true);
        Ok(false)
    });
    editor.focus().unwrap();

    assert!(focused.get());
    assert_eq!(document.borrow().active_element(), Some(root));
    let state = editor.get_editor_state();
    let range = state.selection().and_then(|s| s.as_range()).unwrap();
    assert_eq!(range.anchor.key, t);
    assert_eq!(range.anchor.offset, 0);
}

#[test]
fn test_mutation_listener_reports_lifecycle() {
    let (editor, p, t) = seeded("one");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let _handle = editor
        .register_mutation_listener("text", move |mutations, _| {
            log.borrow_mut().push(mutations.clone());
        })
        .unwrap();

    let created = Rc::new(Cell::new(None));
    let out = created.clone();
    editor
        .update(move |ctx| {
            let token = ctx.create_text_node("two")?;
            ctx.set_text_mode(token, weft_editor::node::TextMode::Token)?;
            ctx.append(p, token)?;
            out.set(Some(token));
            Ok(())
        })
        .unwrap();
    editor.flush().unwrap();
    editor
        .update(move |ctx| ctx.set_text_content(t, "uno"))
        .unwrap();
    editor.flush().unwrap();
    editor.update(move |ctx| ctx.remove(t)).unwrap();
    editor.flush().unwrap();

    let token = created.get().unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![
            BTreeMap::from([(token, NodeMutation::Created)]),
            BTreeMap::from([(t, NodeMutation::Updated)]),
            BTreeMap::from([(t, NodeMutation::Destroyed)]),
        ]
    );
}

#[test]
fn test_mutation_listener_requires_registered_type() {
    let editor = Editor::new();
    let result = editor.register_mutation_listener("table", |_, _| {});
    assert!(matches!(result, Err(EditorError::UnregisteredNodeType(_))));
}

#[test]
fn test_text_content_listener_fires_on_change_only() {
    let (editor, p, t) = seeded("abc");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let _handle = editor.register_text_content_listener(move |text| {
        log.borrow_mut().push(text.to_string());
    });

    editor
        .update(move |ctx| ctx.set_element_format(p, weft_editor::node::ElementFormat::Right))
        .unwrap();
    editor.flush().unwrap();
    editor
        .update(move |ctx| ctx.set_text_content(t, "abcd"))
        .unwrap();
    editor.flush().unwrap();

    assert_eq!(*seen.borrow(), vec!["abcd".to_string()]);
}

#[test]
fn test_decorator_listener_tracks_payloads() {
    let editor = Editor::builder()
        .register_node(Arc::new(EmojiBehavior))
        .unwrap()
        .build()
        .unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let _handle = editor.register_decorator_listener(move |decorators| {
        log.borrow_mut().push(decorators.clone());
    });

    let created = Rc::new(Cell::new(None));
    let out = created.clone();
    editor
        .update(move |ctx| {
            let p = ctx.create_paragraph()?;
            let emoji = ctx.create_node("emoji", NodeData::Decorator(json!({"name": "wave"})))?;
            ctx.append(p, emoji)?;
            ctx.append(NodeKey::ROOT, p)?;
            out.set(Some(emoji));
            Ok(())
        })
        .unwrap();
    editor.flush().unwrap();
    let emoji = created.get().unwrap();
    editor.update(move |ctx| ctx.remove(emoji)).unwrap();
    editor.flush().unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![
            BTreeMap::from([(emoji, json!({"name": "wave"}))]),
            BTreeMap::new(),
        ]
    );
    assert!(editor.decorators().is_empty());
}

#[test]
fn test_duplicate_node_type_is_rejected() {
    let result = Editor::builder()
        .register_node(Arc::new(EmojiBehavior))
        .and_then(|builder| builder.register_node(Arc::new(EmojiBehavior)));
    assert!(matches!(result, Err(EditorError::DuplicateNodeType(_))));
}

#[test]
fn test_update_listener_sees_tags_and_dirty_nodes() {
    let (editor, _, t) = seeded("x");
    let seen = Rc::new(RefCell::new(None));
    let log = seen.clone();
    let _handle = editor.register_update_listener(move |payload| {
        *log.borrow_mut() = Some((
            payload.has_tag("paste"),
            payload.dirty_leaves.contains(&t),
            payload.prev_editor_state.root_text_content(),
        ));
    });

    editor
        .update_with(weft_editor::UpdateOptions::tag("paste"), move |ctx| {
            ctx.set_text_content(t, "y")
        })
        .unwrap();
    editor.flush().unwrap();

    assert_eq!(*seen.borrow(), Some((true, true, "x".to_string())));
}
