use chrono::{DateTime, SecondsFormat, Utc};

use crate::dom::NodeId;

/// One visible text node queued for classification.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateText {
    pub node: NodeId,
    pub text: String,
    pub author: String,
    pub captured_at: DateTime<Utc>,
    pub element_id: String,
}

impl CandidateText {
    /// Capture time as ISO-8601 with milliseconds, e.g. `2025-01-31T08:15:00.123Z`.
    pub fn timestamp(&self) -> String {
        self.captured_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Candidates submitted together in one request. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    items: Vec<CandidateText>,
}

impl Batch {
    pub fn new(items: Vec<CandidateText>) -> Option<Self> {
        if items.is_empty() {
            None
        } else {
            Some(Self { items })
        }
    }

    pub fn items(&self) -> &[CandidateText] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.items.iter().map(|item| item.node)
    }

    pub fn node_for(&self, element_id: &str) -> Option<NodeId> {
        self.items
            .iter()
            .find(|item| item.element_id == element_id)
            .map(|item| item.node)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::dom::Document;

    fn candidate(node: NodeId, id: &str) -> CandidateText {
        CandidateText {
            node,
            text: "some text".into(),
            author: String::new(),
            captured_at: Utc.with_ymd_and_hms(2025, 1, 31, 8, 15, 0).unwrap(),
            element_id: id.into(),
        }
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(Batch::new(Vec::new()).is_none());
    }

    #[test]
    fn batch_resolves_ids_to_nodes() {
        let mut doc = Document::new();
        let a = doc.create_element("p");
        let b = doc.create_element("p");
        let batch = Batch::new(vec![candidate(a, "first"), candidate(b, "second")]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.node_for("second"), Some(b));
        assert_eq!(batch.node_for("third"), None);
    }

    #[test]
    fn timestamp_is_iso_with_millis() {
        let doc_node = Document::new().body();
        assert_eq!(
            candidate(doc_node, "x").timestamp(),
            "2025-01-31T08:15:00.000Z"
        );
    }
}
