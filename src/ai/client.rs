use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::{
    config::DetectorConfig,
    domain::{Batch, BatchResult},
};

use super::{
    error::ClassifyError,
    inference::{build_request, detect_url, parse_response},
};

/// Submits one batch and returns its verdicts.
#[async_trait]
pub trait Classify: Send + Sync {
    async fn classify(&self, batch: &Batch) -> Result<BatchResult, ClassifyError>;
}

#[derive(Clone)]
pub struct ClassificationClient {
    http: Client,
    endpoint: String,
    timeout: Option<Duration>,
}

impl ClassificationClient {
    pub fn new(http: Client, config: &DetectorConfig) -> Self {
        Self {
            http,
            endpoint: detect_url(&config.api_url),
            timeout: config.request_timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Classify for ClassificationClient {
    async fn classify(&self, batch: &Batch) -> Result<BatchResult, ClassifyError> {
        let request = build_request(batch);
        let mut builder = self.http.post(&self.endpoint).json(&request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        tracing::debug!(
            target: "classifier",
            endpoint = %self.endpoint,
            comments = batch.len(),
            "sending batch"
        );
        let response = builder.send().await.map_err(ClassifyError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::Network {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body = response.text().await.map_err(ClassifyError::Transport)?;
        let result = parse_response(&body)?;
        tracing::debug!(
            target: "classifier",
            total = result.summary.total,
            flagged = result.summary.flagged,
            clean = result.summary.clean,
            flagged_pct = result.summary.flagged_percentage,
            "response received"
        );
        Ok(result)
    }
}
