use indexmap::IndexSet;

use crate::{
    config::ObserverOptions,
    dom::{markup, Document, NodeId, Rect, Selector},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub target: NodeId,
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
}

/// Structural filter a node must pass before it is observed or queued.
/// Processed/pending membership is checked by the caller.
#[derive(Debug, Clone)]
pub struct Eligibility {
    selectors: Vec<Selector>,
    min_text_length: usize,
}

impl Eligibility {
    pub fn new(selectors: Vec<Selector>, min_text_length: usize) -> Self {
        Self {
            selectors,
            min_text_length,
        }
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_element(node)
            && !markup::is_badge(doc, node)
            && self.selectors.iter().any(|s| s.matches(doc, node))
    }

    pub fn has_enough_text(&self, doc: &Document, node: NodeId) -> bool {
        markup::candidate_text(doc, node).trim().chars().count() > self.min_text_length
    }

    pub fn accepts(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_connected(node) && self.matches(doc, node) && self.has_enough_text(doc, node)
    }
}

/// Reports each observed node once, the first time it intersects the root.
#[derive(Debug)]
pub struct VisibilityTracker {
    options: ObserverOptions,
    root: Option<Selector>,
    observed: IndexSet<NodeId>,
    /// Observed nodes that must leave the root before they can be reported.
    awaiting_exit: IndexSet<NodeId>,
    connected: bool,
}

impl VisibilityTracker {
    pub fn new(options: ObserverOptions) -> Self {
        let root = options.root.as_deref().and_then(Selector::parse);
        Self {
            options,
            root,
            observed: IndexSet::new(),
            awaiting_exit: IndexSet::new(),
            connected: false,
        }
    }

    pub fn connect(&mut self) {
        self.connected = true;
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
        self.observed.clear();
        self.awaiting_exit.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn observe(&mut self, node: NodeId) -> bool {
        self.connected && self.observed.insert(node)
    }

    /// Observes a node that is only reported once it has left the root and
    /// entered it again.
    pub fn observe_after_exit(&mut self, node: NodeId) -> bool {
        if !self.connected {
            return false;
        }
        self.awaiting_exit.insert(node);
        self.observed.insert(node)
    }

    pub fn unobserve(&mut self, node: NodeId) -> bool {
        self.awaiting_exit.shift_remove(&node);
        self.observed.shift_remove(&node)
    }

    pub fn is_observed(&self, node: NodeId) -> bool {
        self.observed.contains(&node)
    }

    pub fn observed_len(&self) -> usize {
        self.observed.len()
    }

    /// Root rectangle grown by the margin; `None` when the configured root
    /// element is missing or has no layout.
    pub fn root_rect(&self, doc: &Document) -> Option<Rect> {
        let base = match &self.root {
            Some(selector) => doc
                .elements()
                .into_iter()
                .find(|node| selector.matches(doc, *node))
                .and_then(|node| doc.rect(node))?,
            None => doc.viewport().rect(),
        };
        Some(base.expand(self.options.root_margin))
    }

    pub fn compute_entries(&self, doc: &Document) -> Vec<IntersectionEntry> {
        if !self.connected {
            return Vec::new();
        }
        let root = self.root_rect(doc);
        self.observed
            .iter()
            .map(|&target| {
                let ratio = match (root, doc.rect(target)) {
                    (Some(root), Some(rect)) if doc.is_connected(target) && rect.area() > 0.0 => {
                        rect.intersection(&root)
                            .map(|overlap| overlap.area() / rect.area())
                            .unwrap_or(0.0)
                    }
                    _ => 0.0,
                };
                IntersectionEntry {
                    target,
                    is_intersecting: ratio > 0.0,
                    intersection_ratio: ratio,
                }
            })
            .collect()
    }

    /// Observed targets that crossed the threshold; they stop being observed.
    pub fn take_visible(&mut self, entries: &[IntersectionEntry]) -> Vec<NodeId> {
        if !self.connected {
            return Vec::new();
        }
        let threshold = self.options.threshold;
        let mut visible = Vec::new();
        for entry in entries {
            if !self.observed.contains(&entry.target) {
                continue;
            }
            let crossed = entry.is_intersecting && entry.intersection_ratio >= threshold;
            if self.awaiting_exit.contains(&entry.target) {
                if !entry.is_intersecting {
                    self.awaiting_exit.shift_remove(&entry.target);
                }
                continue;
            }
            if crossed && self.unobserve(entry.target) {
                visible.push(entry.target);
            }
        }
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Viewport;

    fn options(margin: f64, threshold: f64) -> ObserverOptions {
        ObserverOptions {
            root: None,
            root_margin: margin,
            threshold,
        }
    }

    fn page_with_block(y: f64, height: f64) -> (Document, NodeId) {
        let mut doc = Document::new();
        let body = doc.body();
        let p = doc.append_element_with_text(body, "p", "some visible text");
        doc.set_rect(p, Rect::new(0.0, y, 400.0, height));
        doc.set_viewport(Viewport {
            scroll_x: 0.0,
            scroll_y: 0.0,
            width: 800.0,
            height: 600.0,
        });
        (doc, p)
    }

    #[test]
    fn reports_once_then_unobserves() {
        let (doc, p) = page_with_block(100.0, 20.0);
        let mut tracker = VisibilityTracker::new(options(0.0, 0.1));
        tracker.connect();
        assert!(tracker.observe(p));

        let entries = tracker.compute_entries(&doc);
        assert_eq!(entries[0].intersection_ratio, 1.0);
        assert_eq!(tracker.take_visible(&entries), vec![p]);
        assert!(!tracker.is_observed(p));
        assert!(tracker.take_visible(&entries).is_empty());
    }

    #[test]
    fn margin_extends_trigger_region() {
        let (doc, p) = page_with_block(630.0, 20.0);
        let mut strict = VisibilityTracker::new(options(0.0, 0.1));
        strict.connect();
        strict.observe(p);
        assert!(strict.take_visible(&strict.compute_entries(&doc)).is_empty());

        let mut loose = VisibilityTracker::new(options(50.0, 0.1));
        loose.connect();
        loose.observe(p);
        assert_eq!(loose.take_visible(&loose.compute_entries(&doc)), vec![p]);
    }

    #[test]
    fn threshold_requires_enough_overlap() {
        // 10 of 100px inside the viewport.
        let (doc, p) = page_with_block(590.0, 100.0);
        let mut tracker = VisibilityTracker::new(options(0.0, 0.5));
        tracker.connect();
        tracker.observe(p);
        let entries = tracker.compute_entries(&doc);
        assert!(entries[0].is_intersecting);
        assert!((entries[0].intersection_ratio - 0.1).abs() < 1e-9);
        assert!(tracker.take_visible(&entries).is_empty());
        assert!(tracker.is_observed(p));
    }

    #[test]
    fn re_observed_node_waits_for_exit() {
        let (mut doc, p) = page_with_block(100.0, 20.0);
        let mut tracker = VisibilityTracker::new(options(0.0, 0.1));
        tracker.connect();
        tracker.observe_after_exit(p);
        assert!(tracker.take_visible(&tracker.compute_entries(&doc)).is_empty());

        doc.scroll_to(2000.0);
        assert!(tracker.take_visible(&tracker.compute_entries(&doc)).is_empty());
        doc.scroll_to(0.0);
        assert_eq!(tracker.take_visible(&tracker.compute_entries(&doc)), vec![p]);
    }

    #[test]
    fn nodes_without_layout_never_intersect() {
        let mut doc = Document::new();
        let body = doc.body();
        let p = doc.append_element_with_text(body, "p", "no layout here");
        let mut tracker = VisibilityTracker::new(options(100.0, 0.0));
        tracker.connect();
        tracker.observe(p);
        assert!(!tracker.compute_entries(&doc)[0].is_intersecting);
    }

    #[test]
    fn custom_root_element() {
        let (mut doc, p) = page_with_block(1000.0, 20.0);
        let body = doc.body();
        let panel = doc.create_element("div");
        doc.set_attribute(panel, "id", "panel");
        doc.append_child(body, panel);
        doc.set_rect(panel, Rect::new(0.0, 900.0, 800.0, 300.0));

        let mut tracker = VisibilityTracker::new(ObserverOptions {
            root: Some("#panel".to_string()),
            root_margin: 0.0,
            threshold: 0.1,
        });
        tracker.connect();
        tracker.observe(p);
        assert_eq!(tracker.take_visible(&tracker.compute_entries(&doc)), vec![p]);
    }

    #[test]
    fn disconnected_tracker_ignores_everything() {
        let (doc, p) = page_with_block(0.0, 20.0);
        let mut tracker = VisibilityTracker::new(options(0.0, 0.1));
        assert!(!tracker.observe(p));
        tracker.connect();
        tracker.observe(p);
        tracker.disconnect();
        assert_eq!(tracker.observed_len(), 0);
        assert!(tracker.compute_entries(&doc).is_empty());
    }

    #[test]
    fn eligibility_filters_short_text_and_badges() {
        let mut doc = Document::new();
        let body = doc.body();
        let short = doc.append_element_with_text(body, "p", "  abc  ");
        let long = doc.append_element_with_text(body, "p", "abcd");
        let badge = doc.append_element_with_text(body, "span", "87% badge");
        doc.set_attribute(badge, "class", markup::BADGE_CLASS);
        let other = doc.append_element_with_text(body, "section", "not monitored");

        let selectors = ["p", "span"].iter().filter_map(|s| Selector::parse(s)).collect();
        let rules = Eligibility::new(selectors, 3);
        assert!(!rules.accepts(&doc, short));
        assert!(rules.accepts(&doc, long));
        assert!(!rules.accepts(&doc, badge));
        assert!(!rules.accepts(&doc, other));
    }
}
