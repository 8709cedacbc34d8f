//! HTML serialization of document subtrees.

use crate::document::{DomNodeKind, Document};
use crate::DomNodeId;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn write_node(doc: &Document, id: DomNodeId, out: &mut String) {
    match doc.kind(id) {
        Ok(DomNodeKind::Text { data }) => escape_text(data, out),
        Ok(DomNodeKind::Element { tag, attributes }) => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attribute(value, out);
                out.push('"');
            }
            out.push('>');
            if is_void_element(tag) {
                return;
            }
            for child in doc.children(id) {
                write_node(doc, *child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Err(_) => {}
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_void_elements_have_no_closing_tag() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let br = doc.create_element("br");
        doc.append_child(p, br).unwrap();
        assert_eq!(doc.outer_html(p), "<p><br></p>");
    }

    #[test]
    fn test_attribute_escaping() {
        let mut doc = Document::new();
        let span = doc.create_element("span");
        doc.set_attribute(span, "title", "\"quoted\" & more").unwrap();
        assert_eq!(
            doc.outer_html(span),
            r#"<span title="&quot;quoted&quot; &amp; more"></span>"#
        );
    }
}
