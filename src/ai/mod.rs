pub mod client;
pub mod error;
pub mod inference;

pub use client::{Classify, ClassificationClient};
pub use error::ClassifyError;
