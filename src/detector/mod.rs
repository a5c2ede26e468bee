pub mod aggregator;
pub mod applicator;
pub mod author;
pub mod identifier;
pub mod mutation;
pub(crate) mod orchestrator;
mod state;
pub mod visibility;

pub use applicator::ApplyReport;
pub use orchestrator::{Detector, DetectorError};
pub use state::Lifecycle;
pub use visibility::IntersectionEntry;
