pub mod candidate;
pub mod types;

pub use candidate::{Batch, CandidateText};
pub use types::{BatchResult, BatchSummary, ClassificationResult, Statistics};
