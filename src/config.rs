//! Configuration management for the coaching engine
//!
//! This module provides runtime configuration loading from JSON files so
//! retry policy, resource settings and accuracy tiers can be tuned without
//! recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::engine::backend::LatencyHint;

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub resource: ResourceConfig,
    #[serde(default)]
    pub accuracy: AccuracyThresholds,
    #[serde(default)]
    pub bus: BusConfig,
}

/// Resume retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Consecutive failed resumes before automatic retry stops
    pub max_resume_attempts: u32,
    /// Pause between automatic resume attempts
    pub retry_delay_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_resume_attempts: 3,
            retry_delay_ms: 100,
        }
    }
}

/// Settings handed to the capability-gated resource factory
///
/// These are hints. The platform may pick a different sample rate, and the
/// handle's reported rate is authoritative afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub sample_rate: Option<u32>,
    pub latency_hint: LatencyHint,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            sample_rate: Some(48_000),
            latency_hint: LatencyHint::Interactive,
        }
    }
}

/// Upper bounds (in absolute cents) for each accuracy tier, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyThresholds {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
    pub poor: f64,
}

impl Default for AccuracyThresholds {
    fn default() -> Self {
        Self {
            excellent: 10.0,
            good: 20.0,
            fair: 35.0,
            poor: 50.0,
        }
    }
}

/// Coordination bus settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Stamp envelopes with the resource clock when the caller gives no timestamp
    pub stamp_with_resource_clock: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            stamp_with_resource_clock: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or the
    /// JSON is invalid (a warning is logged in both cases).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<EngineConfig>(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    if let Err(problems) = config.validate() {
                        log::warn!(
                            "[Config] Configuration {:?} has issues: {}",
                            path.as_ref(),
                            problems.join("; ")
                        );
                    }
                    config
                }
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

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.lifecycle.max_resume_attempts == 0 {
            problems.push("lifecycle.max_resume_attempts must be at least 1".to_string());
        }

        let t = &self.accuracy;
        let ascending = t.excellent <= t.good && t.good <= t.fair && t.fair <= t.poor;
        if !ascending {
            problems.push(format!(
                "accuracy thresholds must be ascending (got {}, {}, {}, {})",
                t.excellent, t.good, t.fair, t.poor
            ));
        }
        if t.excellent < 0.0 {
            problems.push("accuracy.excellent must be non-negative".to_string());
        }

        if let Some(rate) = self.resource.sample_rate {
            if rate == 0 {
                problems.push("resource.sample_rate must be positive".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}
