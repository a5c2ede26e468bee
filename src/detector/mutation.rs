use indexmap::IndexSet;

use crate::dom::{Document, MutationRecord, NodeId};

/// Discovers elements inserted after the initial scan.
#[derive(Debug, Default)]
pub struct DynamicContentTracker {
    connected: bool,
}

impl DynamicContentTracker {
    pub fn connect(&mut self, doc: &mut Document) {
        self.connected = true;
        doc.take_mutations();
        doc.set_mutation_recording(true);
    }

    pub fn disconnect(&mut self, doc: &mut Document) {
        if self.connected {
            self.connected = false;
            doc.set_mutation_recording(false);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Added elements and their element descendants, in document order,
    /// each listed once.
    pub fn added_elements(&self, doc: &Document, records: &[MutationRecord]) -> Vec<NodeId> {
        if !self.connected {
            return Vec::new();
        }
        let mut seen = IndexSet::new();
        for node in records.iter().flat_map(|record| record.added.iter().copied()) {
            if !doc.is_element(node) || !doc.is_connected(node) {
                continue;
            }
            seen.insert(node);
            for child in doc.descendants(node) {
                if doc.is_element(child) {
                    seen.insert(child);
                }
            }
        }
        seen.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_added_subtrees() {
        let mut doc = Document::new();
        let mut tracker = DynamicContentTracker::default();
        tracker.connect(&mut doc);

        let body = doc.body();
        let card = doc.create_element("div");
        let text = doc.append_element_with_text(card, "p", "loaded later");
        doc.append_child(body, card);
        let loose = doc.create_text("bare text");
        doc.append_child(body, loose);

        let records = doc.take_mutations();
        assert_eq!(tracker.added_elements(&doc, &records), vec![card, text]);
    }

    #[test]
    fn skips_nodes_removed_before_processing() {
        let mut doc = Document::new();
        let mut tracker = DynamicContentTracker::default();
        tracker.connect(&mut doc);
        let body = doc.body();
        let flash = doc.append_element_with_text(body, "p", "gone again");
        doc.remove(flash);

        let records = doc.take_mutations();
        assert!(tracker.added_elements(&doc, &records).is_empty());
    }

    #[test]
    fn disconnect_stops_recording() {
        let mut doc = Document::new();
        let mut tracker = DynamicContentTracker::default();
        tracker.connect(&mut doc);
        tracker.disconnect(&mut doc);
        let body = doc.body();
        doc.append_element_with_text(body, "p", "after disconnect");
        assert!(doc.take_mutations().is_empty());
    }
}
