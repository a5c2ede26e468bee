use std::{env, time::Duration};

use super::env::{
    AppConfig, ConfigError, DetectorConfig, DirectoryConfig, LoggingConfig, Profile, RevealMode,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_url =
            env::var("SYBAU_API_URL").map_err(|_| ConfigError::Missing("SYBAU_API_URL"))?;

        let profile = match non_empty("DETECTOR_PROFILE") {
            Some(value) => Profile::parse(&value).ok_or(ConfigError::Invalid {
                key: "DETECTOR_PROFILE",
                value,
            })?,
            None => Profile::Generic,
        };

        let mut detector = DetectorConfig::for_profile(api_url, profile);

        if let Some(ms) = parse_num::<u64>("BATCH_DELAY_MS")? {
            detector.batch_delay = Duration::from_millis(ms);
        }

        let tags = parse_list("MONITOR_TAGS", ',');
        let selectors = parse_list("MONITOR_SELECTORS", ';');
        if tags.is_some() || selectors.is_some() {
            detector.monitored = tags
                .into_iter()
                .flatten()
                .map(|tag| tag.to_ascii_lowercase())
                .chain(selectors.into_iter().flatten())
                .collect();
        }

        if let Some(root) = non_empty("OBSERVER_ROOT") {
            detector.observer.root = Some(root);
        }
        if let Some(raw) = non_empty("OBSERVER_ROOT_MARGIN") {
            detector.observer.root_margin = parse_margin(&raw).ok_or(ConfigError::Invalid {
                key: "OBSERVER_ROOT_MARGIN",
                value: raw,
            })?;
        }
        if let Some(threshold) = parse_num::<f64>("OBSERVER_THRESHOLD")? {
            detector.observer.threshold = threshold;
        }
        if let Some(min) = parse_num::<usize>("MIN_TEXT_LENGTH")? {
            detector.min_text_length = min;
        }
        if let Some(flag) = parse_flag("DYNAMIC_CONTENT") {
            detector.dynamic_content = flag;
        }
        if let Some(value) = non_empty("REVEAL_MODE") {
            detector.reveal_mode = RevealMode::parse(&value).ok_or(ConfigError::Invalid {
                key: "REVEAL_MODE",
                value,
            })?;
        }
        detector.request_timeout =
            parse_num::<u64>("REQUEST_TIMEOUT_MS")?.map(Duration::from_millis);
        detector.verbose = parse_flag("DEBUG_MODE").unwrap_or(false);

        let default_level = if detector.verbose { "debug" } else { "info" };
        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| default_level.to_string()),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
        };

        Ok(Self {
            detector,
            directories,
            logging,
        })
    }
}

/// Accepts CSS-style lengths such as `50px` as well as bare numbers.
pub fn parse_margin(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix("px").unwrap_or(trimmed).trim();
    number.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_num<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match non_empty(key) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(None),
    }
}

fn parse_list(key: &str, separator: char) -> Option<Vec<String>> {
    non_empty(key).map(|value| {
        value
            .split(separator)
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect()
    })
}

fn parse_flag(key: &str) -> Option<bool> {
    non_empty(key).map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
