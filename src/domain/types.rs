use std::fmt;

use serde::Serialize;

/// One verdict returned by the classification service.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub element_id: String,
    pub text: String,
    pub prediction: String,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub is_flagged: bool,
}

impl ClassificationResult {
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u32
    }
}

/// Service-side counts reported alongside the results.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatchSummary {
    pub total: u64,
    pub flagged: u64,
    pub clean: u64,
    pub flagged_percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub results: Vec<ClassificationResult>,
    pub summary: BatchSummary,
}

/// Running counters, in candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Statistics {
    pub total: u64,
    pub flagged: u64,
    pub clean: u64,
    pub errors: u64,
}

impl Statistics {
    pub fn flagged_percent(&self) -> u64 {
        percentage(self.flagged, self.total)
    }

    pub fn clean_percent(&self) -> u64 {
        percentage(self.clean, self.total)
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} flagged={} ({}%) clean={} ({}%) errors={}",
            self.total,
            self.flagged,
            self.flagged_percent(),
            self.clean,
            self.clean_percent(),
            self.errors
        )
    }
}

fn percentage(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u64
}
