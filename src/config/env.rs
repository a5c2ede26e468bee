use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::dom::Selector;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub detector: DetectorConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub api_url: String,
    pub profile: Profile,
    pub batch_delay: Duration,
    /// Tag names and CSS selectors whose elements are candidates.
    pub monitored: Vec<String>,
    pub observer: ObserverOptions,
    /// Texts whose trimmed length is at or below this are never queued.
    pub min_text_length: usize,
    pub dynamic_content: bool,
    pub reveal_mode: RevealMode,
    pub request_timeout: Option<Duration>,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObserverOptions {
    /// Selector of the element used as intersection root; the viewport when absent.
    pub root: Option<String>,
    pub root_margin: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Generic,
    Social,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealMode {
    Highlight,
    /// Flagged text stays blurred until the reader reveals it.
    Blur,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

pub const GENERIC_TAGS: &[&str] = &[
    "div", "span", "p", "h1", "h2", "h3", "h4", "h5", "h6", "a", "li", "td", "th", "label",
    "button", "strong", "em", "b", "i", "u", "small", "mark", "del", "ins", "sub", "sup",
];

pub const SOCIAL_SELECTORS: &[&str] = &[
    r#"[data-testid="tweetText"]"#,
    "div[lang]",
    r#"article div[dir="auto"]"#,
];

impl Profile {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "generic" | "default" => Some(Profile::Generic),
            "social" | "twitter" => Some(Profile::Social),
            _ => None,
        }
    }
}

impl RevealMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "highlight" => Some(RevealMode::Highlight),
            "blur" => Some(RevealMode::Blur),
            _ => None,
        }
    }
}

impl DetectorConfig {
    pub fn for_profile(api_url: impl Into<String>, profile: Profile) -> Self {
        match profile {
            Profile::Generic => Self {
                api_url: api_url.into(),
                profile,
                batch_delay: Duration::from_millis(500),
                monitored: GENERIC_TAGS.iter().map(|tag| tag.to_string()).collect(),
                observer: ObserverOptions {
                    root: None,
                    root_margin: 50.0,
                    threshold: 0.1,
                },
                min_text_length: 3,
                dynamic_content: false,
                reveal_mode: RevealMode::Highlight,
                request_timeout: None,
                verbose: false,
            },
            Profile::Social => Self {
                api_url: api_url.into(),
                profile,
                batch_delay: Duration::from_millis(1000),
                monitored: SOCIAL_SELECTORS.iter().map(|s| s.to_string()).collect(),
                observer: ObserverOptions {
                    root: None,
                    root_margin: 100.0,
                    threshold: 0.1,
                },
                min_text_length: 5,
                dynamic_content: true,
                reveal_mode: RevealMode::Blur,
                request_timeout: None,
                verbose: false,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let trimmed = self.api_url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Missing("SYBAU_API_URL"));
        }
        match Url::parse(trimmed) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::Invalid {
                    key: "SYBAU_API_URL",
                    value: self.api_url.clone(),
                })
            }
        }

        let threshold = self.observer.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                key: "OBSERVER_THRESHOLD",
                value: threshold.to_string(),
            });
        }
        if !self.observer.root_margin.is_finite() {
            return Err(ConfigError::Invalid {
                key: "OBSERVER_ROOT_MARGIN",
                value: self.observer.root_margin.to_string(),
            });
        }

        if self.monitored.is_empty() {
            return Err(ConfigError::Invalid {
                key: "MONITOR_SELECTORS",
                value: String::new(),
            });
        }
        for raw in self.monitored.iter().chain(self.observer.root.iter()) {
            if Selector::parse(raw).is_none() {
                return Err(ConfigError::Invalid {
                    key: "MONITOR_SELECTORS",
                    value: raw.clone(),
                });
            }
        }
        Ok(())
    }

    /// Compiled monitored selectors. Entries that fail to parse are skipped;
    /// `validate` reports them.
    pub fn selectors(&self) -> Vec<Selector> {
        self.monitored
            .iter()
            .filter_map(|raw| Selector::parse(raw))
            .collect()
    }
}
