use std::collections::HashSet;

use crate::{
    config::DetectorConfig,
    domain::Statistics,
    dom::NodeId,
};

use super::{
    aggregator::BatchAggregator, identifier::IdRegistry, mutation::DynamicContentTracker,
    visibility::VisibilityTracker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

/// Everything the detector mutates. Guarded by one lock; never held across
/// an await.
#[derive(Debug)]
pub(crate) struct DetectorState {
    pub lifecycle: Lifecycle,
    pub pending: BatchAggregator,
    pub processed: HashSet<NodeId>,
    pub stats: Statistics,
    pub in_flight: bool,
    /// Nodes of the batch currently out.
    pub in_flight_nodes: HashSet<NodeId>,
    /// Bumped by reset; a completion carrying an older epoch is discarded.
    pub epoch: u64,
    pub visibility: VisibilityTracker,
    pub mutations: DynamicContentTracker,
    pub ids: IdRegistry,
}

impl DetectorState {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            lifecycle: Lifecycle::Idle,
            pending: BatchAggregator::default(),
            processed: HashSet::new(),
            stats: Statistics::default(),
            in_flight: false,
            in_flight_nodes: HashSet::new(),
            epoch: 0,
            visibility: VisibilityTracker::new(config.observer.clone()),
            mutations: DynamicContentTracker::default(),
            ids: IdRegistry::default(),
        }
    }

    pub fn is_tracked(&self, node: NodeId) -> bool {
        self.processed.contains(&node)
            || self.pending.contains(node)
            || self.in_flight_nodes.contains(&node)
    }
}
