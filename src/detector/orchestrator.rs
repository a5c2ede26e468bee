use std::{sync::Arc, time::Duration};

use chrono::Utc;
use parking_lot::Mutex;
use reqwest::Client;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    ai::{ClassificationClient, Classify, ClassifyError},
    config::{ConfigError, DetectorConfig},
    domain::{Batch, BatchResult, CandidateText, Statistics},
    dom::{
        markup::{self, BLURRED_CLASS, FLAGGED_CLASS, PROCESSING_CLASS, REVEALED_CLASS},
        Document, NodeId, Page,
    },
    tasks::processor::{BatchProcessor, Signal},
};

use super::{
    applicator::ResultApplicator,
    author::AuthorExtractor,
    state::{DetectorState, Lifecycle},
    visibility::{Eligibility, IntersectionEntry},
};

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("invalid detector configuration: {0}")]
    Validation(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Lock order is `state` then `page`. Neither lock is held across an await.
pub(crate) struct Shared {
    config: DetectorConfig,
    eligibility: Eligibility,
    authors: AuthorExtractor,
    applicator: ResultApplicator,
    page: Page,
    state: Mutex<DetectorState>,
}

impl Shared {
    pub(crate) fn begin_batch(&self) -> Option<(Batch, u64)> {
        let mut state = self.state.lock();
        if state.in_flight {
            return None;
        }
        let batch = state.pending.take_batch()?;
        state.in_flight = true;
        state.in_flight_nodes = batch.nodes().collect();
        tracing::info!(
            target: "processor",
            total = batch.len(),
            epoch = state.epoch,
            "submitting batch for classification"
        );
        Some((batch, state.epoch))
    }

    pub(crate) fn finish_batch(
        &self,
        batch: Batch,
        epoch: u64,
        outcome: Result<BatchResult, ClassifyError>,
    ) {
        let mut state = self.state.lock();
        state.in_flight = false;
        state.in_flight_nodes.clear();
        if state.epoch != epoch {
            tracing::info!(
                target: "processor",
                total = batch.len(),
                "detector was reset while the batch was in flight; discarding outcome"
            );
            return;
        }
        let mut doc = self.page.lock();

        match outcome {
            Ok(result) => {
                let report = self
                    .applicator
                    .apply(&mut doc, &mut state, &batch, &result.results);
                let orphans: Vec<NodeId> = batch
                    .nodes()
                    .filter(|node| !state.processed.contains(node))
                    .collect();
                if !orphans.is_empty() {
                    tracing::debug!(
                        target: "processor",
                        count = orphans.len(),
                        "service returned no verdict for some candidates; releasing them"
                    );
                    release(&mut state, &mut doc, &orphans);
                }
                tracing::info!(
                    target: "processor",
                    applied = report.applied,
                    flagged = report.flagged,
                    clean = report.clean,
                    unresolved = report.unresolved.len(),
                    "batch classified"
                );
            }
            Err(err) => {
                tracing::warn!(
                    target: "processor",
                    error = %err,
                    kind = err.kind(),
                    total = batch.len(),
                    "batch classification failed"
                );
                state.stats.errors += batch.len() as u64;
                let nodes: Vec<NodeId> = batch.nodes().collect();
                release(&mut state, &mut doc, &nodes);
            }
        }
        for item in batch.items() {
            state.ids.forget(&item.element_id);
        }

        if self.config.verbose {
            tracing::info!(target: "detector", stats = %state.stats, "statistics");
        } else {
            tracing::debug!(target: "detector", stats = %state.stats, "statistics");
        }
    }

    pub(crate) fn has_stranded_candidates(&self) -> bool {
        let state = self.state.lock();
        state.lifecycle == Lifecycle::Running && !state.in_flight && !state.pending.is_empty()
    }

    fn scan(&self, state: &mut DetectorState, doc: &Document) -> usize {
        let mut observed = 0;
        for node in doc.elements() {
            if state.is_tracked(node) || state.visibility.is_observed(node) {
                continue;
            }
            if self.eligibility.accepts(doc, node) && state.visibility.observe(node) {
                observed += 1;
            }
        }
        observed
    }

    /// `None` computes entries from the layout.
    fn intersect(
        &self,
        state: &mut DetectorState,
        doc: &mut Document,
        entries: Option<&[IntersectionEntry]>,
    ) -> usize {
        let computed;
        let entries = match entries {
            Some(entries) => entries,
            None => {
                computed = state.visibility.compute_entries(doc);
                &computed
            }
        };
        let visible = state.visibility.take_visible(entries);
        visible
            .into_iter()
            .filter(|node| self.enqueue(state, doc, *node))
            .count()
    }

    fn enqueue(&self, state: &mut DetectorState, doc: &mut Document, node: NodeId) -> bool {
        if state.is_tracked(node) || !doc.is_connected(node) {
            return false;
        }
        if !self.eligibility.has_enough_text(doc, node) {
            return false;
        }

        let text = markup::candidate_text(doc, node).trim().to_string();
        let author = self.authors.extract(doc, node);
        let element_id = state.ids.identify(doc, node);
        let candidate = CandidateText {
            node,
            text,
            author,
            captured_at: Utc::now(),
            element_id: element_id.clone(),
        };
        if !state.pending.add(candidate) {
            return false;
        }
        doc.add_class(node, PROCESSING_CLASS);
        tracing::debug!(
            target: "detector",
            element_id = %element_id,
            pending = state.pending.len(),
            "candidate queued"
        );
        true
    }
}

fn release(state: &mut DetectorState, doc: &mut Document, nodes: &[NodeId]) {
    for &node in nodes {
        doc.remove_class(node, PROCESSING_CLASS);
        if state.lifecycle == Lifecycle::Running && doc.is_connected(node) {
            state.visibility.observe_after_exit(node);
        }
    }
}

pub struct Detector {
    shared: Arc<Shared>,
    signals: mpsc::UnboundedSender<Signal>,
    processor: JoinHandle<()>,
}

impl Detector {
    /// Must be called inside a Tokio runtime; the batch processor is
    /// spawned immediately.
    pub fn new(
        config: DetectorConfig,
        page: Page,
        classifier: Arc<dyn Classify>,
    ) -> Result<Self, DetectorError> {
        config.validate()?;
        markup::inject_stylesheet(&mut page.lock());

        let shared = Arc::new(Shared {
            eligibility: Eligibility::new(config.selectors(), config.min_text_length),
            authors: AuthorExtractor::for_profile(config.profile),
            applicator: ResultApplicator::new(config.reveal_mode),
            state: Mutex::new(DetectorState::new(&config)),
            page,
            config,
        });

        let (signals, receiver) = mpsc::unbounded_channel();
        let delay = shared.config.batch_delay;
        let processor = BatchProcessor::new(shared.clone(), classifier, delay).spawn(receiver);

        Ok(Self {
            shared,
            signals,
            processor,
        })
    }

    pub fn with_http(config: DetectorConfig, page: Page) -> Result<Self, DetectorError> {
        config.validate()?;
        let http = Client::builder()
            .user_agent(format!("sybau-guard/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DetectorError::HttpClient)?;
        let client = ClassificationClient::new(http, &config);
        Self::new(config, page, Arc::new(client))
    }

    pub fn start(&self) -> Result<(), DetectorError> {
        self.shared.config.validate()?;
        let queued = {
            let mut state = self.shared.state.lock();
            if state.lifecycle == Lifecycle::Running {
                tracing::warn!(target: "detector", "detector already running");
                return Ok(());
            }
            let mut doc = self.shared.page.lock();
            state.lifecycle = Lifecycle::Running;
            state.visibility.connect();
            if self.shared.config.dynamic_content {
                state.mutations.connect(&mut doc);
            }
            let observed = self.shared.scan(&mut state, &doc);
            tracing::info!(
                target: "detector",
                api_url = %self.shared.config.api_url,
                monitored = ?self.shared.config.monitored,
                dynamic_content = self.shared.config.dynamic_content,
                observed,
                "detection started"
            );
            self.shared.intersect(&mut state, &mut doc, None)
        };
        self.arm(queued);
        Ok(())
    }

    pub fn rescan(&self) -> usize {
        let queued = {
            let mut state = self.shared.state.lock();
            if state.lifecycle != Lifecycle::Running {
                return 0;
            }
            let mut doc = self.shared.page.lock();
            let observed = self.shared.scan(&mut state, &doc);
            tracing::debug!(target: "detector", observed, "page rescanned");
            self.shared.intersect(&mut state, &mut doc, None)
        };
        self.arm(queued);
        queued
    }

    pub fn refresh_visibility(&self) -> usize {
        self.intersect(None)
    }

    pub fn handle_intersections(&self, entries: &[IntersectionEntry]) -> usize {
        self.intersect(Some(entries))
    }

    fn intersect(&self, entries: Option<&[IntersectionEntry]>) -> usize {
        let queued = {
            let mut state = self.shared.state.lock();
            if !state.visibility.is_connected() {
                return 0;
            }
            let mut doc = self.shared.page.lock();
            self.shared.intersect(&mut state, &mut doc, entries)
        };
        self.arm(queued);
        queued
    }

    pub fn process_mutations(&self) -> usize {
        let queued = {
            let mut state = self.shared.state.lock();
            if !state.mutations.is_connected() {
                return 0;
            }
            let mut doc = self.shared.page.lock();
            let records = doc.take_mutations();
            if records.is_empty() {
                return 0;
            }
            let mut observed = 0;
            for node in state.mutations.added_elements(&doc, &records) {
                if state.is_tracked(node) || state.visibility.is_observed(node) {
                    continue;
                }
                if self.shared.eligibility.accepts(&doc, node) && state.visibility.observe(node) {
                    observed += 1;
                }
            }
            if observed > 0 {
                tracing::debug!(target: "detector", observed, "new content observed");
            }
            self.shared.intersect(&mut state, &mut doc, None)
        };
        self.arm(queued);
        queued
    }

    /// A request already out still completes.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        if state.lifecycle != Lifecycle::Running {
            return;
        }
        let mut doc = self.shared.page.lock();
        state.visibility.disconnect();
        state.mutations.disconnect(&mut doc);
        if let Some(released) = state.pending.take_batch() {
            for item in released.items() {
                doc.remove_class(item.node, PROCESSING_CLASS);
                state.ids.forget(&item.element_id);
            }
        }
        state.lifecycle = Lifecycle::Stopped;
        let _ = self.signals.send(Signal::CancelTimer);
        tracing::info!(target: "detector", stats = %state.stats, "detection stopped");
    }

    pub fn reset(&self) {
        self.stop();
        let mut state = self.shared.state.lock();
        let mut doc = self.shared.page.lock();
        let cleaned = markup::strip_markup(&mut doc);
        state.pending.clear();
        state.processed.clear();
        state.in_flight_nodes.clear();
        state.stats = Statistics::default();
        state.ids.clear();
        state.epoch += 1;
        state.lifecycle = Lifecycle::Idle;
        tracing::info!(target: "detector", cleaned, "detector reset");
    }

    /// Queues the given elements regardless of visibility and submits them
    /// at once. Elements already classified are classified again.
    pub async fn check_elements(&self, nodes: &[NodeId]) -> usize {
        let queued = {
            let mut state = self.shared.state.lock();
            let mut doc = self.shared.page.lock();
            let mut queued = 0;
            for &node in nodes {
                if state.pending.contains(node)
                    || state.in_flight_nodes.contains(&node)
                    || !doc.is_element(node)
                    || !self.shared.eligibility.has_enough_text(&doc, node)
                {
                    continue;
                }
                state.processed.remove(&node);
                state.visibility.unobserve(node);
                if self.shared.enqueue(&mut state, &mut doc, node) {
                    queued += 1;
                }
            }
            queued
        };
        if queued > 0 {
            self.flush_now().await;
        }
        queued
    }

    pub async fn flush_now(&self) {
        let (done, wait) = oneshot::channel();
        if self.signals.send(Signal::FlushNow(done)).is_ok() {
            let _ = wait.await;
        }
    }

    pub fn reveal(&self, node: NodeId) -> bool {
        let mut doc = self.shared.page.lock();
        if !doc.has_class(node, FLAGGED_CLASS) || !doc.has_class(node, BLURRED_CLASS) {
            return false;
        }
        doc.add_class(node, REVEALED_CLASS)
    }

    pub fn stats(&self) -> Statistics {
        self.shared.state.lock().stats
    }

    pub fn is_processing(&self) -> bool {
        self.shared.state.lock().in_flight
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.state.lock().lifecycle
    }

    pub fn pending_len(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    pub fn is_pending(&self, node: NodeId) -> bool {
        self.shared.state.lock().pending.contains(node)
    }

    pub fn is_processed(&self, node: NodeId) -> bool {
        self.shared.state.lock().processed.contains(&node)
    }

    pub fn observed_len(&self) -> usize {
        self.shared.state.lock().visibility.observed_len()
    }

    /// Stops detection and waits for the processor to finish the request it
    /// may have out, aborting it after `grace`.
    pub async fn shutdown(self, grace: Duration) {
        self.stop();
        let Detector {
            signals,
            mut processor,
            ..
        } = self;
        drop(signals);

        let wait = tokio::time::sleep(grace);
        tokio::pin!(wait);
        tokio::select! {
            res = &mut processor => {
                if let Err(err) = res {
                    if err.is_panic() {
                        tracing::error!(target: "processor", "batch processor panicked");
                    }
                }
            }
            _ = &mut wait => {
                tracing::warn!(
                    target: "processor",
                    "batch processor did not stop within {:?}; aborting",
                    grace
                );
                processor.abort();
            }
        }
    }

    fn arm(&self, queued: usize) {
        if queued > 0 {
            let _ = self.signals.send(Signal::Arrival);
        }
    }
}
