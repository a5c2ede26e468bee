use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::dom::{markup::ID_ATTRIBUTE, Document, NodeId};

/// Identifiers handed out for nodes, with the reverse index used to route
/// verdicts back.
#[derive(Debug, Default)]
pub struct IdRegistry {
    by_id: HashMap<String, NodeId>,
}

impl IdRegistry {
    /// Native `id` if present, otherwise a token persisted as `data-sybau-id`.
    pub fn identify(&mut self, doc: &mut Document, node: NodeId) -> String {
        let existing = doc
            .id(node)
            .or_else(|| doc.attribute(node, ID_ATTRIBUTE).filter(|id| !id.is_empty()))
            .map(str::to_string);

        let id = match existing {
            Some(id) => id,
            None => {
                let token = generate_token();
                doc.set_attribute(node, ID_ATTRIBUTE, &token);
                token
            }
        };
        self.by_id.insert(id.clone(), node);
        id
    }

    /// Live node carrying `element_id`, if any.
    pub fn resolve(&self, doc: &Document, element_id: &str) -> Option<NodeId> {
        if let Some(node) = self.by_id.get(element_id).copied() {
            let still_tagged = doc.id(node) == Some(element_id)
                || doc.attribute(node, ID_ATTRIBUTE) == Some(element_id);
            if still_tagged {
                return Some(node);
            }
        }
        doc.element_by_id(element_id)
            .or_else(|| doc.find_by_attribute(ID_ATTRIBUTE, element_id))
    }

    /// Drops the index entry; the persisted attribute still resolves by scan.
    pub fn forget(&mut self, element_id: &str) -> bool {
        self.by_id.remove(element_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
    }
}

pub fn generate_token() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("sybau_{}_{}", Utc::now().timestamp_millis(), &random[..9])
}
