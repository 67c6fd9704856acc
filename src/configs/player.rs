use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlayerConfig {
    #[serde(default = "default_volume")]
    pub default_volume: u8,
    /// Grace period between `stop()` and leaving the channel.
    #[serde(default = "default_stay_time_secs")]
    pub stay_time_secs: u64,
    /// Suppress the "queue ended" and "left channel" notices.
    #[serde(default)]
    pub pruning: bool,
}

impl PlayerConfig {
    pub fn stay_time(&self) -> Duration {
        Duration::from_secs(self.stay_time_secs)
    }

    pub fn initial_volume(&self) -> u8 {
        self.default_volume.min(100)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            stay_time_secs: default_stay_time_secs(),
            pruning: false,
        }
    }
}

fn default_volume() -> u8 {
    100
}

fn default_stay_time_secs() -> u64 {
    30
}
