use serde::{Deserialize, Serialize};

use super::error::ClassifyError;
use crate::domain::{Batch, BatchResult, BatchSummary, ClassificationResult};

pub const DETECT_PATH: &str = "/detect";

pub fn detect_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim().trim_end_matches('/'), DETECT_PATH)
}

pub fn build_request(batch: &Batch) -> DetectRequest<'_> {
    DetectRequest {
        comments: batch
            .items()
            .iter()
            .map(|item| Comment {
                text: &item.text,
                author: &item.author,
                timestamp: item.timestamp(),
                element_id: &item.element_id,
            })
            .collect(),
    }
}

pub fn parse_response(body: &str) -> Result<BatchResult, ClassifyError> {
    let raw: DetectResponse = serde_json::from_str(body)
        .map_err(|err| ClassifyError::Api(format!("malformed response: {err}")))?;

    if !raw.success {
        return Err(ClassifyError::Api(
            raw.error
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| "API returned error".to_string()),
        ));
    }

    let results: Vec<ClassificationResult> = raw
        .results
        .ok_or_else(|| ClassifyError::Api("malformed response: missing results".to_string()))?
        .into_iter()
        .map(|item| {
            if !(0.0..=1.0).contains(&item.confidence) {
                tracing::warn!(
                    target: "classifier",
                    element_id = %item.element_id,
                    confidence = item.confidence,
                    "confidence outside [0, 1]; clamping"
                );
            }
            ClassificationResult {
                confidence: item.confidence.clamp(0.0, 1.0),
                element_id: item.element_id,
                text: item.text,
                prediction: item.prediction,
                is_flagged: item.is_bullying,
            }
        })
        .collect();

    let flagged = results.iter().filter(|r| r.is_flagged).count() as u64;
    let total = results.len() as u64;
    let summary = BatchSummary {
        total: raw.total_comments.unwrap_or(total),
        flagged: raw.bullying_count.unwrap_or(flagged),
        clean: raw.non_bullying_count.unwrap_or(total - flagged),
        flagged_percentage: raw.bullying_percentage.unwrap_or_else(|| {
            if total == 0 {
                0.0
            } else {
                flagged as f64 * 100.0 / total as f64
            }
        }),
    };

    if summary.total != total || summary.flagged != flagged {
        tracing::warn!(
            target: "classifier",
            reported_total = summary.total,
            reported_flagged = summary.flagged,
            results = total,
            results_flagged = flagged,
            "response summary disagrees with result list"
        );
    }

    Ok(BatchResult { results, summary })
}

#[derive(Debug, Serialize)]
pub struct DetectRequest<'a> {
    pub comments: Vec<Comment<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Comment<'a> {
    pub text: &'a str,
    pub author: &'a str,
    pub timestamp: String,
    pub element_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct DetectResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub total_comments: Option<u64>,
    #[serde(default)]
    pub bullying_count: Option<u64>,
    #[serde(default)]
    pub non_bullying_count: Option<u64>,
    #[serde(default)]
    pub bullying_percentage: Option<f64>,
    #[serde(default)]
    pub results: Option<Vec<DetectResult>>,
}

#[derive(Debug, Deserialize)]
pub struct DetectResult {
    pub element_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub prediction: String,
    pub confidence: f64,
    pub is_bullying: bool,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::{domain::CandidateText, dom::Document};

    #[test]
    fn detect_url_normalizes_trailing_slash() {
        assert_eq!(detect_url("https://x.test/"), "https://x.test/detect");
        assert_eq!(detect_url("https://x.test"), "https://x.test/detect");
    }

    #[test]
    fn request_carries_every_candidate_field() {
        let mut doc = Document::new();
        let node = doc.create_element("p");
        let batch = Batch::new(vec![CandidateText {
            node,
            text: "Nice weather today".into(),
            author: "bob".into(),
            captured_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            element_id: "sybau_1_abc".into(),
        }])
        .unwrap();

        let value = serde_json::to_value(build_request(&batch)).unwrap();
        assert_eq!(
            value,
            json!({
                "comments": [{
                    "text": "Nice weather today",
                    "author": "bob",
                    "timestamp": "2025-03-01T12:00:00.000Z",
                    "element_id": "sybau_1_abc"
                }]
            })
        );
    }

    #[test]
    fn parses_success_payload() {
        let body = json!({
            "success": true,
            "total_comments": 2,
            "bullying_count": 1,
            "non_bullying_count": 1,
            "bullying_percentage": 50.0,
            "results": [
                {"element_id": "a", "text": "x", "prediction": "bullying", "confidence": 0.87, "is_bullying": true},
                {"element_id": "b", "text": "y", "prediction": "non_bullying", "confidence": 0.9, "is_bullying": false}
            ]
        })
        .to_string();

        let result = parse_response(&body).unwrap();
        assert_eq!(result.results.len(), 2);
        assert!(result.results[0].is_flagged);
        assert_eq!(result.summary.flagged, 1);
        assert_eq!(result.summary.flagged_percentage, 50.0);
    }

    #[test]
    fn summary_derived_when_counts_missing() {
        let body = json!({
            "success": true,
            "results": [
                {"element_id": "a", "confidence": 0.2, "is_bullying": false}
            ]
        })
        .to_string();
        let result = parse_response(&body).unwrap();
        assert_eq!(result.summary.total, 1);
        assert_eq!(result.summary.clean, 1);
        assert_eq!(result.summary.flagged_percentage, 0.0);
    }

    #[test]
    fn failure_flag_maps_to_api_error() {
        let body = json!({"success": false, "error": "model not loaded"}).to_string();
        match parse_response(&body) {
            Err(ClassifyError::Api(message)) => assert_eq!(message, "model not loaded"),
            other => panic!("unexpected: {other:?}"),
        }

        let body = json!({"success": false}).to_string();
        match parse_response(&body) {
            Err(ClassifyError::Api(message)) => assert_eq!(message, "API returned error"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn malformed_payload_maps_to_api_error() {
        assert!(matches!(parse_response("<html>"), Err(ClassifyError::Api(_))));
        let missing = json!({"success": true}).to_string();
        assert!(matches!(parse_response(&missing), Err(ClassifyError::Api(_))));
    }

    #[test]
    fn confidence_is_clamped() {
        let body = json!({
            "success": true,
            "results": [{"element_id": "a", "confidence": 1.4, "is_bullying": true}]
        })
        .to_string();
        assert_eq!(parse_response(&body).unwrap().results[0].confidence, 1.0);
    }
}
