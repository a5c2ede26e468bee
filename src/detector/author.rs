use crate::{
    config::Profile,
    dom::{Document, NodeId, Selector},
};

pub const AUTHOR_PATTERNS: &[&str] = &[
    ".author",
    ".username",
    ".user-name",
    "[data-author]",
    "[data-username]",
];
const MAX_ANCESTOR_LEVELS: usize = 3;

/// Best-effort author lookup near a text node.
#[derive(Debug, Clone)]
pub struct AuthorExtractor {
    patterns: Vec<Selector>,
    /// Enclosing post container and the author marker inside it.
    container: Option<(Selector, Selector)>,
    placeholder: String,
}

impl AuthorExtractor {
    pub fn for_profile(profile: Profile) -> Self {
        let patterns = AUTHOR_PATTERNS
            .iter()
            .filter_map(|raw| Selector::parse(raw))
            .collect();
        match profile {
            Profile::Generic => Self {
                patterns,
                container: None,
                placeholder: String::new(),
            },
            Profile::Social => Self {
                patterns,
                container: Selector::parse("article")
                    .zip(Selector::parse(r#"[data-testid="User-Name"]"#)),
                placeholder: "Unknown".to_string(),
            },
        }
    }

    pub fn extract(&self, doc: &Document, node: NodeId) -> String {
        let mut current = Some(node);
        for _ in 0..MAX_ANCESTOR_LEVELS {
            let Some(scope) = current else {
                break;
            };
            for pattern in &self.patterns {
                if let Some(found) = doc.query_selector(scope, pattern) {
                    let text = doc.text_content(found);
                    let text = text.trim();
                    if !text.is_empty() {
                        return text.to_string();
                    }
                }
            }
            current = doc.parent(scope);
        }

        if let Some((container, marker)) = &self.container {
            let found = doc
                .closest(node, container)
                .and_then(|post| doc.query_selector(post, marker));
            if let Some(found) = found {
                let text = doc.text_content(found);
                if !text.trim().is_empty() {
                    return text.trim().to_string();
                }
            }
        }

        self.placeholder.clone()
    }
}
