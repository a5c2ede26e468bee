pub mod ai;
pub mod config;
pub mod detector;
pub mod dom;
pub mod domain;
pub mod infrastructure;
mod tasks;

pub use detector::{Detector, DetectorError, Lifecycle};
