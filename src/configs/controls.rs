use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reaction control surface and feedback message settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ControlsConfig {
    #[serde(default = "default_volume_step")]
    pub volume_step: u8,
    #[serde(default = "default_collector_fallback_secs")]
    pub collector_fallback_secs: u64,
    #[serde(default = "default_feedback_ttl_ms")]
    pub feedback_ttl_ms: u64,
}

impl ControlsConfig {
    /// How long reactions are collected for a track of the given length.
    pub fn listening_window(&self, duration: Option<Duration>) -> Duration {
        match duration {
            Some(d) if !d.is_zero() => d,
            _ => Duration::from_secs(self.collector_fallback_secs),
        }
    }

    pub fn feedback_ttl(&self) -> Duration {
        Duration::from_millis(self.feedback_ttl_ms)
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            volume_step: default_volume_step(),
            collector_fallback_secs: default_collector_fallback_secs(),
            feedback_ttl_ms: default_feedback_ttl_ms(),
        }
    }
}

fn default_volume_step() -> u8 {
    10
}

fn default_collector_fallback_secs() -> u64 {
    600
}

fn default_feedback_ttl_ms() -> u64 {
    5_000
}
