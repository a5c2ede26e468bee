use serde_json::json;

use crate::{
    config::RevealMode,
    domain::{Batch, ClassificationResult},
    dom::{
        markup::{
            self, BLURRED_CLASS, CLEAR_CLASS, FLAGGED_CLASS, PROCESSING_CLASS, RESULT_ATTRIBUTE,
            REVEALED_CLASS,
        },
        Document, NodeId,
    },
};

use super::state::DetectorState;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ApplyReport {
    pub applied: usize,
    pub flagged: usize,
    pub clean: usize,
    /// Identifiers that matched no live or in-flight node.
    pub unresolved: Vec<String>,
}

/// Writes verdicts back onto the page and into the running statistics.
#[derive(Debug, Clone)]
pub struct ResultApplicator {
    reveal_mode: RevealMode,
}

impl ResultApplicator {
    pub fn new(reveal_mode: RevealMode) -> Self {
        Self { reveal_mode }
    }

    pub(crate) fn apply(
        &self,
        doc: &mut Document,
        state: &mut DetectorState,
        batch: &Batch,
        results: &[ClassificationResult],
    ) -> ApplyReport {
        let mut report = ApplyReport::default();

        for result in results {
            let node = state
                .ids
                .resolve(doc, &result.element_id)
                .or_else(|| batch.node_for(&result.element_id));
            let Some(node) = node else {
                tracing::warn!(
                    target: "applicator",
                    element_id = %result.element_id,
                    "no element for result; skipping"
                );
                report.unresolved.push(result.element_id.clone());
                continue;
            };

            doc.remove_class(node, PROCESSING_CLASS);
            state.pending.remove(node);
            let first_verdict = state.processed.insert(node);

            if result.is_flagged {
                self.mark_flagged(doc, node, result);
                report.flagged += 1;
            } else {
                mark_clear(doc, node);
                report.clean += 1;
            }
            doc.set_attribute(
                node,
                RESULT_ATTRIBUTE,
                &json!({
                    "prediction": result.prediction,
                    "confidence": result.confidence,
                    "is_bullying": result.is_flagged,
                })
                .to_string(),
            );

            if first_verdict {
                state.stats.total += 1;
                if result.is_flagged {
                    state.stats.flagged += 1;
                } else {
                    state.stats.clean += 1;
                }
            }
            report.applied += 1;

            tracing::debug!(
                target: "applicator",
                element_id = %result.element_id,
                flagged = result.is_flagged,
                confidence = result.confidence_percent(),
                text = %preview(&result.text),
                "verdict applied"
            );
        }
        report
    }

    fn mark_flagged(&self, doc: &mut Document, node: NodeId, result: &ClassificationResult) {
        doc.remove_class(node, CLEAR_CLASS);
        doc.add_class(node, FLAGGED_CLASS);
        if self.reveal_mode == RevealMode::Blur && !doc.has_class(node, REVEALED_CLASS) {
            doc.add_class(node, BLURRED_CLASS);
        }
        markup::set_badge(doc, node, result.confidence_percent());
    }
}

fn mark_clear(doc: &mut Document, node: NodeId) {
    for class in [FLAGGED_CLASS, BLURRED_CLASS, REVEALED_CLASS] {
        doc.remove_class(node, class);
    }
    let view: &Document = doc;
    let badges: Vec<NodeId> = view
        .children(node)
        .iter()
        .copied()
        .filter(|child| markup::is_badge(view, *child))
        .collect();
    for badge in badges {
        doc.remove(badge);
    }
    doc.add_class(node, CLEAR_CLASS);
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        config::{DetectorConfig, Profile},
        domain::CandidateText,
        dom::markup::{has_badge, BADGE_CLASS},
    };

    struct Fixture {
        doc: Document,
        state: DetectorState,
        batch: Batch,
        bad: NodeId,
        nice: NodeId,
        bad_id: String,
        nice_id: String,
    }

    fn fixture() -> Fixture {
        let config = DetectorConfig::for_profile("http://localhost", Profile::Generic);
        let mut state = DetectorState::new(&config);
        let mut doc = Document::new();
        let body = doc.body();
        let bad = doc.append_element_with_text(body, "p", "This is bad content");
        let nice = doc.append_element_with_text(body, "p", "Nice weather today");
        let bad_id = state.ids.identify(&mut doc, bad);
        let nice_id = state.ids.identify(&mut doc, nice);
        doc.add_class(bad, PROCESSING_CLASS);
        doc.add_class(nice, PROCESSING_CLASS);

        let items = [(bad, &bad_id), (nice, &nice_id)]
            .into_iter()
            .map(|(node, id)| CandidateText {
                node,
                text: doc.text_content(node),
                author: String::new(),
                captured_at: Utc::now(),
                element_id: id.clone(),
            })
            .collect();
        Fixture {
            doc,
            state,
            batch: Batch::new(items).unwrap(),
            bad,
            nice,
            bad_id,
            nice_id,
        }
    }

    fn verdict(id: &str, flagged: bool, confidence: f64) -> ClassificationResult {
        ClassificationResult {
            element_id: id.to_string(),
            text: String::new(),
            prediction: if flagged { "bullying" } else { "non_bullying" }.to_string(),
            confidence,
            is_flagged: flagged,
        }
    }

    #[test]
    fn applies_terminal_states_and_stats() {
        let mut f = fixture();
        let results = vec![verdict(&f.bad_id, true, 0.87), verdict(&f.nice_id, false, 0.95)];
        let report = ResultApplicator::new(RevealMode::Highlight).apply(
            &mut f.doc,
            &mut f.state,
            &f.batch,
            &results,
        );

        assert_eq!(report.applied, 2);
        assert!(f.doc.has_class(f.bad, FLAGGED_CLASS));
        assert!(!f.doc.has_class(f.bad, PROCESSING_CLASS));
        assert!(!f.doc.has_class(f.bad, BLURRED_CLASS));
        let badge = f.doc.children(f.bad).last().copied().unwrap();
        assert!(f.doc.has_class(badge, BADGE_CLASS));
        assert_eq!(f.doc.text_content(badge), "87%");

        assert!(f.doc.has_class(f.nice, CLEAR_CLASS));
        assert!(!has_badge(&f.doc, f.nice));
        assert!(f.state.processed.contains(&f.nice));

        assert_eq!(f.state.stats.total, 2);
        assert_eq!(f.state.stats.flagged, 1);
        assert_eq!(f.state.stats.clean, 1);
        let stored = f.doc.attribute(f.bad, RESULT_ATTRIBUTE).unwrap();
        assert!(stored.contains("\"is_bullying\":true"));
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let mut f = fixture();
        let applicator = ResultApplicator::new(RevealMode::Highlight);
        let results = vec![verdict(&f.bad_id, true, 0.87)];
        applicator.apply(&mut f.doc, &mut f.state, &f.batch, &results);
        let classes_after_first: Vec<String> =
            f.doc.classes(f.bad).into_iter().map(String::from).collect();

        applicator.apply(&mut f.doc, &mut f.state, &f.batch, &results);
        let badges = f
            .doc
            .children(f.bad)
            .iter()
            .filter(|c| f.doc.has_class(**c, BADGE_CLASS))
            .count();
        assert_eq!(badges, 1);
        assert_eq!(f.doc.classes(f.bad), classes_after_first);
        assert_eq!(f.state.stats.total, 1);
    }

    #[test]
    fn unresolved_results_are_skipped() {
        let mut f = fixture();
        let results = vec![verdict("ghost", true, 0.99), verdict(&f.nice_id, false, 0.9)];
        let report = ResultApplicator::new(RevealMode::Highlight).apply(
            &mut f.doc,
            &mut f.state,
            &f.batch,
            &results,
        );
        assert_eq!(report.unresolved, vec!["ghost".to_string()]);
        assert_eq!(report.applied, 1);
        assert!(f.doc.has_class(f.nice, CLEAR_CLASS));
    }

    #[test]
    fn in_flight_batch_resolves_detached_identifier() {
        let mut f = fixture();
        // Host scripts rewrote the attribute while the request was out.
        f.doc.remove_attribute(f.bad, markup::ID_ATTRIBUTE);
        let results = vec![verdict(&f.bad_id, true, 0.6)];
        let report = ResultApplicator::new(RevealMode::Highlight).apply(
            &mut f.doc,
            &mut f.state,
            &f.batch,
            &results,
        );
        assert_eq!(report.applied, 1);
        assert!(f.doc.has_class(f.bad, FLAGGED_CLASS));
    }

    #[test]
    fn blur_mode_obscures_flagged_text() {
        let mut f = fixture();
        let results = vec![verdict(&f.bad_id, true, 0.7)];
        ResultApplicator::new(RevealMode::Blur).apply(&mut f.doc, &mut f.state, &f.batch, &results);
        assert!(f.doc.has_class(f.bad, BLURRED_CLASS));
    }

    #[test]
    fn reclassified_clear_drops_flag_markup() {
        let mut f = fixture();
        let applicator = ResultApplicator::new(RevealMode::Blur);
        applicator.apply(&mut f.doc, &mut f.state, &f.batch, &[verdict(&f.bad_id, true, 0.7)]);
        applicator.apply(&mut f.doc, &mut f.state, &f.batch, &[verdict(&f.bad_id, false, 0.7)]);
        assert!(!f.doc.has_class(f.bad, FLAGGED_CLASS));
        assert!(!f.doc.has_class(f.bad, BLURRED_CLASS));
        assert!(!has_badge(&f.doc, f.bad));
        assert!(f.doc.has_class(f.bad, CLEAR_CLASS));
    }
}
