use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::cell::Cell;
use std::rc::Rc;
use weft_editor::weft_dom::shared_document;
use weft_editor::{Editor, NodeKey, UpdateOptions};

/// An attached editor holding `paragraphs` paragraphs of text. Returns the
/// key of a text node in the middle of the document.
fn document(paragraphs: usize) -> (Editor, NodeKey) {
    let editor = Editor::new();
    let dom = shared_document();
    let root = dom.borrow_mut().create_element("div");
    editor.set_root_element(&dom, root).unwrap();

    let middle = Rc::new(Cell::new(None));
    let out = middle.clone();
    editor
        .update_with(UpdateOptions::new().discrete(), move |ctx| {
            for i in 0..paragraphs {
                let p = ctx.create_paragraph()?;
                let t = ctx.create_text_node(format!("paragraph number {i}"))?;
                ctx.append(p, t)?;
                ctx.append(NodeKey::ROOT, p)?;
                if i == paragraphs / 2 {
                    out.set(Some(t));
                }
            }
            Ok(())
        })
        .unwrap();
    (editor, middle.get().unwrap())
}

fn initial_render(c: &mut Criterion) {
    let json = {
        let (editor, _) = document(200);
        editor.get_editor_state().to_json_string().unwrap()
    };

    c.bench_function("initial_render_200_paragraphs", |b| {
        b.iter(|| {
            let editor = Editor::builder()
                .initial_state(json.clone())
                .build()
                .unwrap();
            let dom = shared_document();
            let root = dom.borrow_mut().create_element("div");
            editor.set_root_element(black_box(&dom), root).unwrap();
        })
    });
}

fn single_leaf_edit(c: &mut Criterion) {
    let (editor, text) = document(1000);
    let mut n = 0usize;

    c.bench_function("single_leaf_edit_1000_paragraphs", |b| {
        b.iter(|| {
            n += 1;
            let content = format!("edit {n}");
            editor
                .update_with(UpdateOptions::new().discrete(), move |ctx| {
                    ctx.set_text_content(text, content)
                })
                .unwrap();
        })
    });
}

fn typing_at_caret(c: &mut Criterion) {
    let (editor, text) = document(100);
    editor
        .update_with(UpdateOptions::new().discrete(), move |ctx| {
            ctx.select_end(text).map(|_| ())
        })
        .unwrap();

    c.bench_function("insert_character_at_caret", |b| {
        b.iter(|| {
            editor
                .update_with(UpdateOptions::new().discrete(), |ctx| {
                    ctx.insert_text(black_box("x"))
                })
                .unwrap();
        })
    });
}

criterion_group!(benches, initial_render, single_leaf_edit, typing_at_caret);
criterion_main!(benches);
