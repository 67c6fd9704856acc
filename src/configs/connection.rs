use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reconnect and readiness policy for the voice connection.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConnectionConfig {
    #[serde(default = "default_max_rejoin_attempts")]
    pub max_rejoin_attempts: u32,
    #[serde(default = "default_rejoin_backoff_step_ms")]
    pub rejoin_backoff_step_ms: u64,
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
    /// Close codes after which the room is gone and rejoining is pointless.
    #[serde(default = "default_terminal_close_codes")]
    pub terminal_close_codes: Vec<u16>,
}

impl ConnectionConfig {
    /// Linear backoff: `(attempts + 1) * step`.
    pub fn rejoin_delay(&self, attempts: u32) -> Duration {
        Duration::from_millis(self.rejoin_backoff_step_ms * (u64::from(attempts) + 1))
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn is_terminal_close(&self, code: u16) -> bool {
        self.terminal_close_codes.contains(&code)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_rejoin_attempts: default_max_rejoin_attempts(),
            rejoin_backoff_step_ms: default_rejoin_backoff_step_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
            terminal_close_codes: default_terminal_close_codes(),
        }
    }
}

fn default_max_rejoin_attempts() -> u32 {
    5
}

fn default_rejoin_backoff_step_ms() -> u64 {
    5_000
}

fn default_ready_timeout_ms() -> u64 {
    20_000
}

fn default_terminal_close_codes() -> Vec<u16> {
    vec![4014]
}
