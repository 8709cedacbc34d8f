//! Node types every editor registers.

use super::behavior::{
    ConvertFn, DomConversion, DomConversionOutput, ForChildFn, NodeBehavior, RenderContext,
};
use super::{ElementData, ElementFormat, Node, NodeBase, TextData, TextFormat};
use crate::read::StateRead;
use crate::update::UpdateContext;
use crate::{EditorError, EditorResult, NodeKey};
use weft_dom::{Document, DomNodeId};

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "blockquote", "pre",
];

/// Inline `style` for an element's alignment and indentation.
pub(crate) fn element_style(data: &ElementData) -> Option<String> {
    let mut style = String::new();
    if let Some(align) = data.format().as_css() {
        style.push_str(&format!("text-align: {};", align));
    }
    if data.indent() > 0 {
        if !style.is_empty() {
            style.push(' ');
        }
        style.push_str(&format!("padding-inline-start: calc({} * 40px);", data.indent()));
    }
    if style.is_empty() {
        None
    } else {
        Some(style)
    }
}

#[derive(Debug, Default)]
pub struct RootBehavior;

impl NodeBehavior for RootBehavior {
    fn node_type(&self) -> &str {
        "root"
    }

    fn base(&self) -> NodeBase {
        NodeBase::Root
    }

    fn create_dom(&self, _node: &Node, cx: &mut RenderContext<'_>) -> EditorResult<DomNodeId> {
        Ok(cx.document.create_element("div"))
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

#[derive(Debug, Default)]
pub struct ParagraphBehavior;

impl NodeBehavior for ParagraphBehavior {
    fn node_type(&self) -> &str {
        "paragraph"
    }

    fn base(&self) -> NodeBase {
        NodeBase::Element
    }

    fn insert_new_after(&self) -> Option<&str> {
        Some("paragraph")
    }

    fn create_dom(&self, node: &Node, cx: &mut RenderContext<'_>) -> EditorResult<DomNodeId> {
        cx.create_themed_element("p", node.node_type())
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

    fn export_dom(&self, node: &Node, cx: &mut RenderContext<'_>) -> EditorResult<Option<DomNodeId>> {
        let dom = self.create_dom(node, cx)?;
        if let Some(data) = node.as_element() {
            if let Some(style) = element_style(data) {
                cx.document.set_attribute(dom, "style", style)?;
            }
            if let Some(direction) = data.direction() {
                cx.document.set_attribute(dom, "dir", direction.as_str())?;
            }
        }
        Ok(Some(dom))
    }

    fn import_dom(&self) -> Vec<DomConversion> {
        vec![DomConversion {
            tag: "p",
            priority: 0,
            convert: convert_paragraph,
        }]
    }
}

fn convert_paragraph(
    ctx: &mut UpdateContext<'_>,
    doc: &Document,
    dom: DomNodeId,
) -> EditorResult<Option<DomConversionOutput>> {
    let key = ctx.create_paragraph()?;
    if let Some(align) = doc.get_attribute(dom, "style").and_then(text_align) {
        ctx.set_element_format(key, align)?;
    }
    Ok(Some(DomConversionOutput::node(key)))
}

fn text_align(style: &str) -> Option<ElementFormat> {
    let value = style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .find(|(name, _)| name.trim() == "text-align")
        .map(|(_, value)| value.trim())?;
    serde_json::from_value(serde_json::Value::String(value.to_string())).ok()
}

#[derive(Debug, Default)]
pub struct TextBehavior;

/// The element tag a text node renders as, strongest format first.
pub(crate) fn text_tag(format: TextFormat) -> &'static str {
    if format.contains(TextFormat::CODE) {
        "code"
    } else if format.contains(TextFormat::HIGHLIGHT) {
        "mark"
    } else if format.contains(TextFormat::SUBSCRIPT) {
        "sub"
    } else if format.contains(TextFormat::SUPERSCRIPT) {
        "sup"
    } else if format.contains(TextFormat::BOLD) {
        "strong"
    } else if format.contains(TextFormat::ITALIC) {
        "em"
    } else {
        "span"
    }
}

fn text_data(node: &Node) -> EditorResult<&TextData> {
    node.as_text().ok_or_else(|| EditorError::NotText {
        key: node.key(),
        node_type: node.node_type().to_string(),
    })
}

fn apply_text_attributes(
    cx: &mut RenderContext<'_>,
    node: &Node,
    text: &TextData,
    dom: DomNodeId,
) -> EditorResult<()> {
    let mut classes: Vec<String> = Vec::new();
    if let Some(class) = cx.theme_class(node.node_type()) {
        classes.push(class.to_string());
    }
    if let Some(class) = cx.config.theme.text_format_classes(text.format()) {
        classes.push(class);
    }
    if classes.is_empty() {
        cx.document.remove_attribute(dom, "class")?;
    } else {
        cx.document.set_attribute(dom, "class", classes.join(" "))?;
    }
    if text.style().is_empty() {
        cx.document.remove_attribute(dom, "style")?;
    } else {
        cx.document.set_attribute(dom, "style", text.style())?;
    }
    Ok(())
}

impl NodeBehavior for TextBehavior {
    fn node_type(&self) -> &str {
        "text"
    }

    fn base(&self) -> NodeBase {
        NodeBase::Text
    }

    fn create_dom(&self, node: &Node, cx: &mut RenderContext<'_>) -> EditorResult<DomNodeId> {
        let text = text_data(node)?;
        let dom = cx.document.create_element(text_tag(text.format()));
        cx.document.set_attribute(dom, "data-weft-text", "true")?;
        apply_text_attributes(cx, node, text, dom)?;
        let inner = cx.document.create_text_node(text.text());
        cx.document.append_child(dom, inner)?;
        Ok(dom)
    }

    fn update_dom(
        &self,
        prev: &Node,
        next: &Node,
        dom: DomNodeId,
        cx: &mut RenderContext<'_>,
    ) -> EditorResult<bool> {
        let prev_text = text_data(prev)?;
        let next_text = text_data(next)?;
        if text_tag(prev_text.format()) != text_tag(next_text.format()) {
            return Ok(true);
        }

        // Compare against the DOM itself so foreign edits are reverted too.
        let inner = cx
            .document
            .first_child(dom)
            .filter(|child| cx.document.is_text(*child));
        match inner {
            Some(inner) => {
                if cx.document.text(inner) != Some(next_text.text()) {
                    cx.document.set_text(inner, next_text.text())?;
                }
            }
            None => {
                let inner = cx.document.create_text_node(next_text.text());
                let first = cx.document.first_child(dom);
                cx.document.insert_before(dom, inner, first)?;
            }
        }

        if prev_text.format() != next_text.format() || prev_text.style() != next_text.style() {
            apply_text_attributes(cx, next, next_text, dom)?;
        }
        Ok(false)
    }

    fn import_dom(&self) -> Vec<DomConversion> {
        let format = |tag: &'static str, convert: ConvertFn| DomConversion {
            tag,
            priority: 0,
            convert,
        };
        vec![
            format("#text", convert_text),
            format("span", convert_span),
            format("b", convert_format::<{ TextFormat::BOLD.bits() }>),
            format("strong", convert_format::<{ TextFormat::BOLD.bits() }>),
            format("i", convert_format::<{ TextFormat::ITALIC.bits() }>),
            format("em", convert_format::<{ TextFormat::ITALIC.bits() }>),
            format("u", convert_format::<{ TextFormat::UNDERLINE.bits() }>),
            format("s", convert_format::<{ TextFormat::STRIKETHROUGH.bits() }>),
            format("del", convert_format::<{ TextFormat::STRIKETHROUGH.bits() }>),
            format("code", convert_format::<{ TextFormat::CODE.bits() }>),
            format("sub", convert_format::<{ TextFormat::SUBSCRIPT.bits() }>),
            format("sup", convert_format::<{ TextFormat::SUPERSCRIPT.bits() }>),
            format("mark", convert_format::<{ TextFormat::HIGHLIGHT.bits() }>),
        ]
    }
}

fn collapse_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;
    for c in raw.chars() {
        if matches!(c, ' ' | '\t' | '\n' | '\r') {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn is_block_dom(doc: &Document, dom: Option<DomNodeId>) -> bool {
    match dom {
        None => true,
        Some(dom) => doc
            .tag_name(dom)
            .map(|tag| BLOCK_TAGS.contains(&tag))
            .unwrap_or(false),
    }
}

fn convert_text(
    ctx: &mut UpdateContext<'_>,
    doc: &Document,
    dom: DomNodeId,
) -> EditorResult<Option<DomConversionOutput>> {
    let Some(raw) = doc.text(dom) else {
        return Ok(None);
    };
    let text = collapse_whitespace(raw);
    if text.trim().is_empty()
        && (is_block_dom(doc, doc.previous_sibling(dom)) || is_block_dom(doc, doc.next_sibling(dom)))
    {
        return Ok(None);
    }
    let key = ctx.create_text_node(text)?;
    Ok(Some(DomConversionOutput::node(key)))
}

fn convert_format<const BITS: u32>(
    _ctx: &mut UpdateContext<'_>,
    _doc: &Document,
    _dom: DomNodeId,
) -> EditorResult<Option<DomConversionOutput>> {
    Ok(Some(DomConversionOutput {
        node: None,
        for_child: Some(apply_format::<BITS>),
        after: None,
    }))
}

/// `<span>` carries formatting only through inline `font-weight` and
/// `font-style`.
fn convert_span(
    _ctx: &mut UpdateContext<'_>,
    doc: &Document,
    dom: DomNodeId,
) -> EditorResult<Option<DomConversionOutput>> {
    let style = doc.get_attribute(dom, "style").unwrap_or_default();
    let declaration = |name: &str| {
        style
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .find(|(prop, _)| prop.trim() == name)
            .map(|(_, value)| value.trim().to_string())
    };
    let bold = matches!(declaration("font-weight").as_deref(), Some("bold" | "700"));
    let italic = declaration("font-style").as_deref() == Some("italic");

    const BOLD: u32 = TextFormat::BOLD.bits();
    const ITALIC: u32 = TextFormat::ITALIC.bits();
    const BOTH: u32 = BOLD | ITALIC;
    let for_child: Option<ForChildFn> = match (bold, italic) {
        (true, true) => Some(apply_format::<BOTH>),
        (true, false) => Some(apply_format::<BOLD>),
        (false, true) => Some(apply_format::<ITALIC>),
        (false, false) => None,
    };
    Ok(Some(DomConversionOutput {
        node: None,
        for_child,
        after: None,
    }))
}

fn apply_format<const BITS: u32>(
    ctx: &mut UpdateContext<'_>,
    key: NodeKey,
    _parent: Option<NodeKey>,
) -> EditorResult<Option<NodeKey>> {
    let flag = TextFormat::from_bits_truncate(BITS);
    if let Some(format) = ctx.node(key)?.as_text().map(|t| t.format()) {
        if !format.contains(flag) {
            ctx.set_text_format(key, format | flag)?;
        }
    }
    Ok(Some(key))
}

#[derive(Debug, Default)]
pub struct LineBreakBehavior;

impl NodeBehavior for LineBreakBehavior {
    fn node_type(&self) -> &str {
        "linebreak"
    }

    fn base(&self) -> NodeBase {
        NodeBase::LineBreak
    }

    fn create_dom(&self, _node: &Node, cx: &mut RenderContext<'_>) -> EditorResult<DomNodeId> {
        Ok(cx.document.create_element("br"))
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

    fn import_dom(&self) -> Vec<DomConversion> {
        vec![DomConversion {
            tag: "br",
            priority: 0,
            convert: convert_line_break,
        }]
    }
}

fn convert_line_break(
    ctx: &mut UpdateContext<'_>,
    _doc: &Document,
    _dom: DomNodeId,
) -> EditorResult<Option<DomConversionOutput>> {
    let key = ctx.create_line_break()?;
    Ok(Some(DomConversionOutput::node(key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_tag_precedence() {
        assert_eq!(text_tag(TextFormat::empty()), "span");
        assert_eq!(text_tag(TextFormat::BOLD | TextFormat::ITALIC), "strong");
        assert_eq!(text_tag(TextFormat::BOLD | TextFormat::CODE), "code");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a \n\t b"), "a b");
        assert_eq!(collapse_whitespace("\n\n"), " ");
    }

    #[test]
    fn test_element_style() {
        let data = ElementData::default()
            .with_format(ElementFormat::Center)
            .with_indent(2);
        assert_eq!(
            element_style(&data).as_deref(),
            Some("text-align: center; padding-inline-start: calc(2 * 40px);")
        );
        assert_eq!(element_style(&ElementData::default()), None);
    }

    #[test]
    fn test_text_align_parsing() {
        assert_eq!(text_align("color: red; text-align: right"), Some(ElementFormat::Right));
        assert_eq!(text_align("color: red"), None);
    }
}
