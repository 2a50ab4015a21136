//! Configuration management for the few-shot classifier
//!
//! This module provides runtime configuration loading from JSON files, so
//! the neighbour count, squash constant, extractor geometry and scheduling
//! cadence can be tuned without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ClassifierError;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Class names in fixed vote order
    #[serde(default = "default_classes")]
    pub classes: Vec<String>,
}

fn default_classes() -> Vec<String> {
    vec![
        "class_1".to_string(),
        "class_2".to_string(),
        "class_3".to_string(),
    ]
}

/// k-NN voting parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Upper bound on neighbours per vote (K = min(top_k, total examples))
    pub top_k: usize,
    /// Logits are divided by this before L2 normalization
    pub squash_denominator: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            squash_denominator: 10.0,
        }
    }
}

/// Feature extractor geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Frame width in pixels
    pub input_width: usize,
    /// Frame height in pixels
    pub input_height: usize,
    /// Values per pixel (3 for RGB)
    pub channels: usize,
    /// Length of the logits / feature vector
    pub feature_len: usize,
    /// Seed for the projection weights
    pub seed: u64,
}

impl ExtractorConfig {
    /// Number of values a frame must carry
    pub fn input_len(&self) -> usize {
        self.input_width * self.input_height * self.channels
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            input_width: 32,
            input_height: 32,
            channels: 3,
            feature_len: 1000,
            seed: 42,
        }
    }
}

/// How the engine waits for similarity results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadbackPolicy {
    /// Always wait for true completion
    Await,
    /// Measure latency every N ticks, throttle by it in between
    LatencyProbe,
}

/// Tick loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Base delay between ticks (one display refresh)
    pub frame_interval_ms: u64,
    /// Readback policy used for classification ticks
    pub readback: ReadbackPolicy,
    /// Measure readback latency every N classification ticks
    pub measure_every_n_ticks: u64,
    /// Offload similarity to the blocking pool instead of computing inline
    pub offload_similarity: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            readback: ReadbackPolicy::LatencyProbe,
            measure_every_n_ticks: 20,
            offload_similarity: true,
        }
    }
}

impl Default for AppConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            extractor: ExtractorConfig::default(),
            scheduler: SchedulerConfig::default(),
            classes: default_classes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or defaults if the file is missing,
    /// unparsable or fails validation.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                        config
                    }
                    Err(err) => {
                        log::warn!(
                            "[Config] Rejected configuration from {:?}: {}. Using defaults.",
                            path.as_ref(),
                            err
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Check the invariants the engine relies on
    pub fn validate(&self) -> Result<(), ClassifierError> {
        let reject = |reason: &str| {
            Err(ClassifierError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.classes.is_empty() {
            return reject("at least one class is required");
        }
        if self.classes.iter().any(|name| name.trim().is_empty()) {
            return reject("class names must not be empty");
        }
        if self.classifier.top_k == 0 {
            return reject("top_k must be greater than 0");
        }
        if !self.classifier.squash_denominator.is_finite()
            || self.classifier.squash_denominator <= 0.0
        {
            return reject("squash_denominator must be a positive finite number");
        }
        if self.extractor.input_len() == 0 || self.extractor.feature_len == 0 {
            return reject("extractor dimensions must be non-zero");
        }
        if self.scheduler.measure_every_n_ticks == 0 {
            return reject("measure_every_n_ticks must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.classifier.top_k, 10);
        assert_eq!(config.extractor.feature_len, 1000);
        assert_eq!(config.scheduler.measure_every_n_ticks, 20);
        assert_eq!(config.classes.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.classifier.top_k, config.classifier.top_k);
        assert_eq!(parsed.scheduler.readback, ReadbackPolicy::LatencyProbe);
        assert_eq!(parsed.classes, config.classes);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{ "classes": ["cat", "dog"] }"#).unwrap();
        assert_eq!(parsed.classes, vec!["cat", "dog"]);
        assert_eq!(parsed.classifier.top_k, 10);
        assert_eq!(parsed.extractor.input_len(), 32 * 32 * 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.classifier.top_k = 0;
        assert!(matches!(
            config.validate(),
            Err(ClassifierError::InvalidConfig { .. })
        ));

        let mut config = AppConfig::default();
        config.classes.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.classifier.squash_denominator = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("does/not/exist.json");
        assert_eq!(config.classifier.top_k, 10);
    }
}
