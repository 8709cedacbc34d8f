//! Update pipeline: batching, rollback, transforms, normalization

use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;
use weft_editor::node::TextMode;
use weft_editor::selection::Point;
use weft_editor::{
    Editor, EditorConfig, EditorError, NodeKey, StateRead, UpdateContext, UpdateOptions,
};

fn paragraph_with_text(ctx: &mut UpdateContext<'_>, text: &str) -> (NodeKey, NodeKey) {
    let p = ctx.create_paragraph().unwrap();
    let t = ctx.create_text_node(text).unwrap();
    ctx.append(p, t).unwrap();
    ctx.append(NodeKey::ROOT, p).unwrap();
    (p, t)
}

fn seeded(text: &str) -> (Editor, NodeKey, NodeKey) {
    let editor = Editor::new();
    let keys = Rc::new(Cell::new(None));
    let out = keys.clone();
    let text = text.to_string();
    editor
        .update(move |ctx| {
            out.set(Some(paragraph_with_text(ctx, &text)));
            Ok(())
        })
        .unwrap();
    editor.flush().unwrap();
    let (p, t) = keys.get().unwrap();
    (editor, p, t)
}

#[test]
fn test_noop_update_is_discarded() {
    let (editor, _, _) = seeded("hello");
    let before = editor.get_editor_state();
    let version = editor.version();
    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    let _handle = editor.register_update_listener(move |_| counter.set(counter.get() + 1));

    editor.update(|_| Ok(())).unwrap();
    editor.flush().unwrap();

    assert_eq!(editor.version(), version);
    assert_eq!(fired.get(), 0);
    assert!(editor
        .get_editor_state()
        .node_map()
        .ptr_eq(before.node_map()));
}

#[test]
fn test_writes_are_copy_on_write() {
    let (editor, p, t) = seeded("hello");
    editor
        .update(|ctx| {
            paragraph_with_text(ctx, "other");
            Ok(())
        })
        .unwrap();
    editor.flush().unwrap();
    let prev = editor.get_editor_state();
    let q = prev
        .children(NodeKey::ROOT)
        .unwrap()
        .iter()
        .copied()
        .find(|key| *key != p)
        .unwrap();

    editor
        .update(move |ctx| ctx.set_text_content(t, "changed"))
        .unwrap();
    editor.flush().unwrap();
    let next = editor.get_editor_state();

    assert!(!Arc::ptr_eq(prev.node_arc(t).unwrap(), next.node_arc(t).unwrap()));
    assert!(Arc::ptr_eq(prev.node_arc(q).unwrap(), next.node_arc(q).unwrap()));
    assert_eq!(prev.text_data(t).unwrap().text(), "hello");
    assert_eq!(next.text_data(t).unwrap().text(), "changed");
}

#[test]
fn test_nested_updates_coalesce_into_one_commit() {
    let editor = Editor::new();
    let commits = Rc::new(Cell::new(0));
    let counter = commits.clone();
    let _handle = editor.register_update_listener(move |_| counter.set(counter.get() + 1));

    let inner = editor.clone();
    editor
        .update(move |ctx| {
            paragraph_with_text(ctx, "outer");
            inner.update(|ctx| {
                paragraph_with_text(ctx, "inner");
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
    editor
        .update(|ctx| {
            paragraph_with_text(ctx, "batched");
            Ok(())
        })
        .unwrap();
    editor.flush().unwrap();

    assert_eq!(commits.get(), 1);
    let text = editor.read(|state| state.root_text_content()).unwrap();
    assert_eq!(text, "outer\n\ninner\n\nbatched");
}

#[test]
fn test_discrete_update_commits_immediately() {
    let editor = Editor::new();
    editor
        .update_with(UpdateOptions::new().discrete(), |ctx| {
            paragraph_with_text(ctx, "now");
            Ok(())
        })
        .unwrap();
    assert_eq!(editor.version(), 1);
    assert_eq!(editor.get_editor_state().root_text_content(), "now");
}

#[test]
fn test_failed_update_rolls_back_only_itself() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = errors.clone();
    let editor = Editor::builder()
        .on_error(move |err, _| sink.borrow_mut().push(err.clone()))
        .build()
        .unwrap();

    editor
        .update(|ctx| {
            paragraph_with_text(ctx, "kept");
            Ok(())
        })
        .unwrap();
    let missing = NodeKey::ROOT;
    let result = editor.update(move |ctx| {
        paragraph_with_text(ctx, "dropped");
        ctx.remove(missing)
    });
    editor.flush().unwrap();

    assert_eq!(result, Err(EditorError::RootOperation("remove")));
    assert_eq!(errors.borrow().len(), 1);
    assert_eq!(editor.get_editor_state().root_text_content(), "kept");
}

#[test]
fn test_on_update_runs_after_commit() {
    let editor = Editor::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let _handle = editor.register_update_listener(move |_| log.borrow_mut().push("listener"));
    let log = seen.clone();
    editor
        .update_with(
            UpdateOptions::new().with_on_update(move || log.borrow_mut().push("on_update")),
            |ctx| {
                paragraph_with_text(ctx, "x");
                Ok(())
            },
        )
        .unwrap();
    assert!(seen.borrow().is_empty());
    editor.flush().unwrap();
    assert_eq!(*seen.borrow(), vec!["listener", "on_update"]);
}

#[test]
fn test_adjacent_text_is_merged() {
    let (editor, p, t) = seeded("ab");
    editor
        .update(move |ctx| {
            let c = ctx.create_text_node("cd")?;
            ctx.append(p, c)?;
            ctx.select_text(c, 1, 1)?;
            Ok(())
        })
        .unwrap();
    editor.flush().unwrap();

    let state = editor.get_editor_state();
    assert_eq!(state.children(p).unwrap(), &[t]);
    assert_eq!(state.text_data(t).unwrap().text(), "abcd");
    let range = state.selection().and_then(|s| s.as_range()).unwrap();
    assert_eq!(range.anchor, Point::text(t, 3));
}

#[test]
fn test_token_text_is_not_merged() {
    let (editor, p, t) = seeded("ab");
    editor
        .update(move |ctx| {
            let c = ctx.create_text_node("@mention")?;
            ctx.set_text_mode(c, TextMode::Token)?;
            ctx.append(p, c)?;
            Ok(())
        })
        .unwrap();
    editor.flush().unwrap();
    let state = editor.get_editor_state();
    assert_eq!(state.children(p).unwrap().len(), 2);
    assert_eq!(state.text_data(t).unwrap().text(), "ab");
}

#[test]
fn test_empty_text_is_removed() {
    let (editor, p, t) = seeded("ab");
    editor
        .update(move |ctx| ctx.set_text_content(t, ""))
        .unwrap();
    editor.flush().unwrap();
    let state = editor.get_editor_state();
    assert!(state.children(p).unwrap().is_empty());
    assert!(!state.contains(t));
}

#[test]
fn test_split_text_moves_caret() {
    let (editor, _, t) = seeded("hello");
    let parts = Rc::new(RefCell::new(Vec::new()));
    let out = parts.clone();
    editor
        .update(move |ctx| {
            ctx.select_text(t, 3, 3)?;
            let split = ctx.split_text(t, &[2])?;
            assert_eq!(ctx.text_data(split[0])?.text(), "he");
            assert_eq!(ctx.text_data(split[1])?.text(), "llo");
            let range = ctx.range_selection().unwrap();
            assert_eq!(range.anchor, Point::text(split[1], 1));
            *out.borrow_mut() = split;
            Ok(())
        })
        .unwrap();
    assert_eq!(parts.borrow()[0], t);
    assert_ne!(parts.borrow()[1], t);
}

#[test]
fn test_transform_runs_on_dirty_nodes() {
    let (editor, _, t) = seeded("hello");
    let _handle = editor
        .register_node_transform("text", |ctx, key| {
            let text = ctx.text_data(key)?.text().to_string();
            if text.contains("teh") {
                ctx.set_text_content(key, text.replace("teh", "the"))?;
            }
            Ok(())
        })
        .unwrap();
    editor
        .update(move |ctx| ctx.set_text_content(t, "teh cat"))
        .unwrap();
    editor.flush().unwrap();
    assert_eq!(editor.get_editor_state().root_text_content(), "the cat");
}

#[test]
fn test_oscillating_transform_is_capped() {
    let editor = Editor::builder()
        .config(EditorConfig {
            transform_iteration_limit: 8,
            ..EditorConfig::default()
        })
        .build()
        .unwrap();
    let _handle = editor
        .register_node_transform("text", |ctx, key| {
            let text = ctx.text_data(key)?.text().to_string();
            let next = if text == "ping" { "pong" } else { "ping" };
            ctx.set_text_content(key, next)
        })
        .unwrap();

    let result = editor.update(|ctx| {
        paragraph_with_text(ctx, "ping");
        Ok(())
    });
    assert_eq!(result, Err(EditorError::InfiniteTransform(8)));
    editor.flush().unwrap();
    assert_eq!(editor.get_editor_state().root_text_content(), "");
}

#[test]
fn test_unknown_transform_type_is_rejected() {
    let editor = Editor::new();
    let result = editor.register_node_transform("heading", |_, _| Ok(()));
    assert!(matches!(result, Err(EditorError::UnregisteredNodeType(_))));
}

#[test]
fn test_detached_dirty_nodes_are_collected() {
    let (editor, p, _) = seeded("gone");
    editor.update(move |ctx| ctx.remove(p)).unwrap();
    editor.flush().unwrap();
    let state = editor.get_editor_state();
    assert_eq!(state.len(), 1);
    assert!(state.children(NodeKey::ROOT).unwrap().is_empty());
}

#[test]
fn test_selection_survives_anchor_removal() {
    let (editor, p, t) = seeded("ab");
    let second = Rc::new(Cell::new(None));
    let out = second.clone();
    editor
        .update(move |ctx| {
            let c = ctx.create_text_node("cd")?;
            ctx.set_text_mode(c, TextMode::Token)?;
            ctx.append(p, c)?;
            ctx.select_text(c, 1, 1)?;
            out.set(Some(c));
            Ok(())
        })
        .unwrap();
    editor.flush().unwrap();
    let c = second.get().unwrap();

    editor.update(move |ctx| ctx.remove(c)).unwrap();
    editor.flush().unwrap();
    let state = editor.get_editor_state();
    let range = state.selection().and_then(|s| s.as_range()).unwrap();
    assert_eq!(range.anchor, Point::text(t, 2));
}

#[test]
fn test_set_editor_state_replaces_document() {
    let (editor, _, _) = seeded("old");
    let other = Editor::new();
    other
        .update(|ctx| {
            paragraph_with_text(ctx, "new");
            Ok(())
        })
        .unwrap();
    other.flush().unwrap();

    editor.set_editor_state(other.get_editor_state()).unwrap();
    assert_eq!(editor.get_editor_state().root_text_content(), "new");
}

#[test]
fn test_update_from_transform_joins_the_transaction() {
    let editor = Editor::new();
    let commits = Rc::new(Cell::new(0));
    let counter = commits.clone();
    let _listener = editor.register_update_listener(move |_| counter.set(counter.get() + 1));
    let _transform = editor
        .register_node_transform("text", |ctx, key| {
            let text = ctx.text_data(key)?.text().to_string();
            match text.as_str() {
                "outer" => ctx.editor().update(|ctx| {
                    paragraph_with_text(ctx, "inner");
                    Ok(())
                }),
                "inner" => ctx.set_text_content(key, "INNER"),
                _ => Ok(()),
            }
        })
        .unwrap();

    editor
        .update(|ctx| {
            paragraph_with_text(ctx, "outer");
            Ok(())
        })
        .unwrap();
    editor.flush().unwrap();

    assert_eq!(commits.get(), 1);
    assert_eq!(editor.get_editor_state().root_text_content(), "outer\n\nINNER");
}

#[test]
fn test_panicking_update_releases_the_editor() {
    let (editor, _, _) = seeded("kept");
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _ = editor.update(|ctx| {
            paragraph_with_text(ctx, "lost");
            panic!("callback failed");
        });
    }));
    assert!(outcome.is_err());

    editor
        .update(|ctx| {
            paragraph_with_text(ctx, "after");
            Ok(())
        })
        .unwrap();
    editor.flush().unwrap();
    assert_eq!(editor.get_editor_state().root_text_content(), "kept\n\nafter");
}

#[test]
fn test_panicking_listener_releases_the_editor() {
    let (editor, _, t) = seeded("a");
    let armed = Rc::new(Cell::new(true));
    let trigger = armed.clone();
    let _handle = editor.register_update_listener(move |_| {
        if trigger.replace(false) {
            panic!("listener failed");
        }
    });

    editor.update(move |ctx| ctx.set_text_content(t, "b")).unwrap();
    let outcome = catch_unwind(AssertUnwindSafe(|| editor.flush()));
    assert!(outcome.is_err());
    assert!(!armed.get());

    let version = editor.version();
    editor.update(move |ctx| ctx.set_text_content(t, "c")).unwrap();
    editor.flush().unwrap();
    assert_eq!(editor.version(), version + 1);
    assert_eq!(editor.get_editor_state().root_text_content(), "c");
}

#[test]
fn test_failed_update_restores_composition_key() {
    let (editor, _, t) = seeded("ab");
    let result = editor.update(move |ctx| {
        ctx.set_composition_key(Some(t));
        ctx.remove(NodeKey::ROOT)
    });
    assert_eq!(result, Err(EditorError::RootOperation("remove")));
    assert_eq!(editor.composition_key(), None);
}
