use thiserror::Error;

/// Failure of one batch submission. Never fatal to the detector.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classification service returned HTTP {status}: {reason}")]
    Network { status: u16, reason: String },
    #[error("classification service reported failure: {0}")]
    Api(String),
    #[error("request to classification service failed: {0}")]
    Transport(#[source] reqwest::Error),
}

impl ClassifyError {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifyError::Network { .. } => "network",
            ClassifyError::Api(_) => "api",
            ClassifyError::Transport(_) => "transport",
        }
    }
}
