use super::document::{Document, NodeId};

pub const PROCESSING_CLASS: &str = "sybau-processing";
pub const FLAGGED_CLASS: &str = "sybau";
pub const BLURRED_CLASS: &str = "sybau-blurred";
pub const REVEALED_CLASS: &str = "revealed";
pub const CLEAR_CLASS: &str = "sybau-safe";
pub const BADGE_CLASS: &str = "sybau-badge";
pub const STYLE_ID: &str = "sybau-styles";
pub const ID_ATTRIBUTE: &str = "data-sybau-id";
pub const RESULT_ATTRIBUTE: &str = "data-bullying-result";

const MARKER_CLASSES: &[&str] = &[
    PROCESSING_CLASS,
    FLAGGED_CLASS,
    BLURRED_CLASS,
    REVEALED_CLASS,
    CLEAR_CLASS,
];

const STYLESHEET: &str = r#"
.sybau {
  color: #dc2626 !important;
  background-color: #fee2e2 !important;
  padding: 2px 4px !important;
  border-radius: 3px !important;
  border-left: 3px solid #dc2626 !important;
}
.sybau-blurred { filter: blur(5px) !important; cursor: pointer !important; user-select: none !important; }
.sybau-blurred.revealed { filter: blur(0px) !important; }
.sybau-processing { opacity: 0.6; }
.sybau-safe { filter: blur(0px) !important; }
.sybau-badge {
  display: inline-block;
  background: #dc2626;
  color: white;
  font-size: 10px;
  padding: 2px 6px;
  border-radius: 10px;
  margin-left: 6px;
  font-weight: bold;
}
"#;

/// Adds the detector stylesheet to `<head>` unless it is already there.
pub fn inject_stylesheet(doc: &mut Document) -> bool {
    if doc.element_by_id(STYLE_ID).is_some() {
        return false;
    }
    let head = doc.head();
    let style = doc.append_element_with_text(head, "style", STYLESHEET);
    doc.set_attribute(style, "id", STYLE_ID);
    true
}

pub fn is_badge(doc: &Document, node: NodeId) -> bool {
    doc.has_class(node, BADGE_CLASS)
}

pub fn has_badge(doc: &Document, node: NodeId) -> bool {
    doc.descendants(node).into_iter().any(|id| is_badge(doc, id))
}

/// Text of `node` without the badges appended to it.
pub fn candidate_text(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    collect_text(doc, node, &mut out);
    out
}

fn collect_text(doc: &Document, node: NodeId, out: &mut String) {
    if let Some(text) = doc.text(node) {
        out.push_str(text);
        return;
    }
    if is_badge(doc, node) {
        return;
    }
    for child in doc.children(node) {
        collect_text(doc, *child, out);
    }
}

/// Gives the element exactly one confidence badge showing `percent`.
pub fn set_badge(doc: &mut Document, node: NodeId, percent: u32) {
    let view: &Document = doc;
    let stale: Vec<NodeId> = view
        .children(node)
        .iter()
        .copied()
        .filter(|child| is_badge(view, *child))
        .collect();
    for badge in stale {
        doc.remove(badge);
    }

    let badge = doc.append_element_with_text(node, "span", &format!("{percent}%"));
    doc.set_attribute(badge, "class", BADGE_CLASS);
    doc.set_attribute(
        badge,
        "title",
        &format!("Bullying detected with {percent}% confidence"),
    );
}

/// Removes every marker class, badge, result and identifier attribute.
/// Returns the number of elements that carried any markup.
pub fn strip_markup(doc: &mut Document) -> usize {
    let view: &Document = doc;
    let badges: Vec<NodeId> = view
        .elements()
        .into_iter()
        .filter(|id| is_badge(view, *id))
        .collect();
    for badge in &badges {
        doc.remove(*badge);
    }

    let mut touched = 0;
    for node in doc.elements() {
        let mut changed = false;
        for class in MARKER_CLASSES {
            changed |= doc.remove_class(node, class);
        }
        changed |= doc.remove_attribute(node, RESULT_ATTRIBUTE).is_some();
        changed |= doc.remove_attribute(node, ID_ATTRIBUTE).is_some();
        if changed {
            touched += 1;
        }
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylesheet_injected_once() {
        let mut doc = Document::new();
        assert!(inject_stylesheet(&mut doc));
        assert!(!inject_stylesheet(&mut doc));
        let styles = doc
            .children(doc.head())
            .iter()
            .filter(|id| doc.tag(**id) == Some("style"))
            .count();
        assert_eq!(styles, 1);
    }

    #[test]
    fn badge_replaced_not_duplicated() {
        let mut doc = Document::new();
        let body = doc.body();
        let p = doc.append_element_with_text(body, "p", "mean words here");
        set_badge(&mut doc, p, 87);
        set_badge(&mut doc, p, 90);

        let badges: Vec<NodeId> = doc
            .children(p)
            .iter()
            .copied()
            .filter(|child| is_badge(&doc, *child))
            .collect();
        assert_eq!(badges.len(), 1);
        assert_eq!(doc.text_content(badges[0]), "90%");
        assert_eq!(
            doc.attribute(badges[0], "title"),
            Some("Bullying detected with 90% confidence")
        );
        assert_eq!(candidate_text(&doc, p), "mean words here");
    }

    #[test]
    fn strip_removes_all_markup() {
        let mut doc = Document::new();
        let body = doc.body();
        let flagged = doc.append_element_with_text(body, "p", "flagged text");
        let clear = doc.append_element_with_text(body, "p", "clear text");
        doc.add_class(flagged, FLAGGED_CLASS);
        doc.set_attribute(flagged, ID_ATTRIBUTE, "sybau_1_abc");
        set_badge(&mut doc, flagged, 50);
        doc.add_class(clear, CLEAR_CLASS);
        doc.add_class(clear, "author-note");

        assert_eq!(strip_markup(&mut doc), 2);
        assert!(!has_badge(&doc, flagged));
        assert!(!doc.has_class(flagged, FLAGGED_CLASS));
        assert_eq!(doc.attribute(flagged, ID_ATTRIBUTE), None);
        assert_eq!(doc.classes(clear), vec!["author-note"]);
    }
}
