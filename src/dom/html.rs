use scraper::{ElementRef, Html, Node};

use super::document::{Document, NodeId, Rect};

pub const LINE_HEIGHT: f64 = 20.0;
const CHAR_WIDTH: f64 = 8.0;

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Imports an HTML page into a fresh document. Scripts and styles are dropped.
pub fn parse_html(source: &str) -> Document {
    let html = Html::parse_document(source);
    let mut doc = Document::new();

    for child in html.root_element().children() {
        let Some(element) = ElementRef::wrap(child) else {
            continue;
        };
        let target = match element.value().name() {
            "head" => doc.head(),
            _ => doc.body(),
        };
        for (name, value) in element.value().attrs() {
            doc.set_attribute(target, name, value);
        }
        import_children(&mut doc, target, element);
    }
    doc
}

fn import_children(doc: &mut Document, parent: NodeId, element: ElementRef<'_>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let content: &str = text;
                if !content.is_empty() {
                    let node = doc.create_text(content);
                    doc.append_child(parent, node);
                }
            }
            Node::Element(el) if SKIPPED_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    let node = doc.create_element(child_ref.value().name());
                    for (name, value) in child_ref.value().attrs() {
                        doc.set_attribute(node, name, value);
                    }
                    doc.append_child(parent, node);
                    import_children(doc, node, child_ref);
                }
            }
            _ => {}
        }
    }
}

/// Stacks every element of `<body>` vertically, one line per `width / 8`
/// characters of text. Returns the page height.
pub fn layout_blocks(doc: &mut Document, width: f64) -> f64 {
    let body = doc.body();
    layout_node(doc, body, 0.0, width)
}

fn layout_node(doc: &mut Document, node: NodeId, y: f64, width: f64) -> f64 {
    if let Some(text) = doc.text(node) {
        let len = text.trim().chars().count();
        if len == 0 {
            return 0.0;
        }
        let per_line = (width / CHAR_WIDTH).floor().max(1.0);
        return (len as f64 / per_line).ceil() * LINE_HEIGHT;
    }

    let mut height = 0.0;
    for child in doc.children(node).to_vec() {
        height += layout_node(doc, child, y + height, width);
    }
    doc.set_rect(node, Rect::new(0.0, y, width, height));
    height
}

/// Serializes the whole document, markers included.
pub fn to_html(doc: &Document) -> String {
    let mut out = String::from("<!DOCTYPE html>");
    write_node(doc, doc.root(), &mut out);
    out
}

fn write_node(doc: &Document, node: NodeId, out: &mut String) {
    if let Some(text) = doc.text(node) {
        let raw_parent = doc
            .parent(node)
            .and_then(|parent| doc.tag(parent))
            .is_some_and(|tag| matches!(tag, "style" | "script"));
        if raw_parent {
            out.push_str(text);
        } else {
            out.push_str(&escape_html(text));
        }
        return;
    }
    let Some(tag) = doc.tag(node) else {
        return;
    };
    out.push('<');
    out.push_str(tag);
    for (name, value) in doc.attributes(node) {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_html(value));
        out.push('"');
    }
    out.push('>');
    if VOID_TAGS.contains(&tag) {
        return;
    }
    for child in doc.children(node) {
        write_node(doc, *child, out);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Selector;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Feed</title><script>var x = 1;</script></head>
  <body class="feed">
    <article id="post-1">
      <span class="author">alice</span>
      <p>You are the worst person here</p>
    </article>
    <p>Nice weather today</p>
  </body>
</html>"#;

    #[test]
    fn imports_elements_and_attributes() {
        let doc = parse_html(PAGE);
        assert_eq!(doc.attribute(doc.body(), "class"), Some("feed"));
        let article = doc.element_by_id("post-1").expect("article imported");
        let author = doc
            .query_selector(article, &Selector::parse(".author").unwrap())
            .expect("author imported");
        assert_eq!(doc.text_content(author).trim(), "alice");
        let scripts = doc.query_selector_all(doc.root(), &Selector::parse("script").unwrap());
        assert!(scripts.is_empty());
    }

    #[test]
    fn layout_assigns_rects_in_document_order() {
        let mut doc = parse_html(PAGE);
        let height = layout_blocks(&mut doc, 800.0);
        assert!(height >= 3.0 * LINE_HEIGHT);

        let paragraphs = doc.query_selector_all(doc.body(), &Selector::parse("p").unwrap());
        assert_eq!(paragraphs.len(), 2);
        let first = doc.rect(paragraphs[0]).unwrap();
        let second = doc.rect(paragraphs[1]).unwrap();
        assert_eq!(first.height, LINE_HEIGHT);
        assert!(second.y >= first.y + first.height);
    }

    #[test]
    fn serializes_with_escaping() {
        let mut doc = Document::new();
        let body = doc.body();
        let p = doc.append_element_with_text(body, "p", "a < b & \"c\"");
        doc.set_attribute(p, "data-note", "x\"y");
        let html = to_html(&doc);
        assert!(html.contains(r#"<p data-note="x&quot;y">a &lt; b &amp; &quot;c&quot;</p>"#));
        assert!(html.starts_with("<!DOCTYPE html><html><head></head><body>"));
    }
}
