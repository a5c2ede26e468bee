use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{sleep_until, Instant},
};

use crate::{ai::Classify, detector::orchestrator::Shared};

/// Messages from the detector's event handlers to the processor task.
#[derive(Debug)]
pub(crate) enum Signal {
    /// A candidate was queued; restart the quiet period.
    Arrival,
    CancelTimer,
    /// Submit whatever is pending now and acknowledge when done.
    FlushNow(oneshot::Sender<()>),
}

/// Sole consumer of pending candidates. Owns the debounce deadline and
/// awaits each submission inline, so requests never overlap.
pub(crate) struct BatchProcessor {
    shared: Arc<Shared>,
    classifier: Arc<dyn Classify>,
    delay: Duration,
}

impl BatchProcessor {
    pub fn new(shared: Arc<Shared>, classifier: Arc<dyn Classify>, delay: Duration) -> Self {
        Self {
            shared,
            classifier,
            delay,
        }
    }

    pub fn spawn(self, signals: mpsc::UnboundedReceiver<Signal>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop(signals).await;
        })
    }

    async fn run_loop(&self, mut signals: mpsc::UnboundedReceiver<Signal>) {
        let mut deadline: Option<Instant> = None;
        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Some(Signal::Arrival) => {
                        deadline = Some(Instant::now() + self.delay);
                    }
                    Some(Signal::CancelTimer) => {
                        deadline = None;
                    }
                    Some(Signal::FlushNow(done)) => {
                        deadline = None;
                        self.flush().await;
                        let _ = done.send(());
                    }
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    self.flush().await;
                }
            }

            // Candidates queued while a request was out must not wait for
            // another arrival to be flushed.
            if deadline.is_none() && self.shared.has_stranded_candidates() {
                tracing::debug!(target: "processor", "re-arming timer for leftover candidates");
                deadline = Some(Instant::now() + self.delay);
            }
        }
        tracing::info!(target: "processor", "batch processor stopped");
    }

    async fn flush(&self) {
        let Some((batch, epoch)) = self.shared.begin_batch() else {
            return;
        };
        let outcome = self.classifier.classify(&batch).await;
        self.shared.finish_batch(batch, epoch, outcome);
    }
}
