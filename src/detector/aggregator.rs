use indexmap::IndexMap;

use crate::{
    domain::{Batch, CandidateText},
    dom::NodeId,
};

/// Candidates waiting for the next flush, keyed by node, in arrival order.
/// The debounce timer itself lives in the batch processor task.
#[derive(Debug, Default)]
pub struct BatchAggregator {
    pending: IndexMap<NodeId, CandidateText>,
}

impl BatchAggregator {
    /// Returns false when the node is already pending.
    pub fn add(&mut self, candidate: CandidateText) -> bool {
        if self.pending.contains_key(&candidate.node) {
            return false;
        }
        self.pending.insert(candidate.node, candidate);
        true
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.pending.contains_key(&node)
    }

    pub fn remove(&mut self, node: NodeId) -> Option<CandidateText> {
        self.pending.shift_remove(&node)
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.pending.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Moves everything pending into one batch, leaving the set empty.
    pub fn take_batch(&mut self) -> Option<Batch> {
        let items: Vec<CandidateText> = std::mem::take(&mut self.pending).into_values().collect();
        Batch::new(items)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::dom::Document;

    fn candidate(node: NodeId, text: &str) -> CandidateText {
        CandidateText {
            node,
            text: text.into(),
            author: String::new(),
            captured_at: Utc::now(),
            element_id: format!("{node:?}"),
        }
    }

    #[test]
    fn duplicate_nodes_are_ignored() {
        let mut doc = Document::new();
        let node = doc.create_element("p");
        let mut aggregator = BatchAggregator::default();
        assert!(aggregator.add(candidate(node, "first")));
        assert!(!aggregator.add(candidate(node, "second")));
        assert_eq!(aggregator.len(), 1);
    }

    #[test]
    fn take_batch_preserves_order_and_empties() {
        let mut doc = Document::new();
        let a = doc.create_element("p");
        let b = doc.create_element("p");
        let mut aggregator = BatchAggregator::default();
        aggregator.add(candidate(b, "b"));
        aggregator.add(candidate(a, "a"));

        let batch = aggregator.take_batch().unwrap();
        let texts: Vec<&str> = batch.items().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "a"]);
        assert!(aggregator.is_empty());
        assert!(aggregator.take_batch().is_none());
    }
}
