use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{common::ConfigError, configs::*};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub controls: ControlsConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Loads `config.toml`, then `config.default.toml`, else built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        for candidate in ["config.toml", "config.default.toml"] {
            if Path::new(candidate).exists() {
                return Self::from_path(candidate);
            }
        }
        tracing::warn!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        tracing::info!("Loading configuration from: {}", path);

        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        if config_str.trim().is_empty() {
            return Err(ConfigError::Empty(path.to_string()));
        }

        Self::parse(&config_str)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sections_fall_back_to_defaults() {
        let config = Config::parse("[player]\nstay_time_secs = 5\n").expect("parse");
        assert_eq!(config.player.stay_time_secs, 5);
        assert_eq!(config.player.default_volume, 100);
        assert_eq!(config.connection.max_rejoin_attempts, 5);
        assert_eq!(config.connection.terminal_close_codes, vec![4014]);
        assert_eq!(config.controls.collector_fallback_secs, 600);
        assert!(config.logging.is_none());
    }

    #[test]
    fn full_file_parses() {
        let raw = r#"
            [player]
            default_volume = 60
            stay_time_secs = 10
            pruning = true

            [connection]
            max_rejoin_attempts = 3
            rejoin_backoff_step_ms = 1000
            ready_timeout_ms = 5000
            terminal_close_codes = [4014, 4004]

            [controls]
            volume_step = 5
            collector_fallback_secs = 120
            feedback_ttl_ms = 2000

            [logging]
            level = "debug"
        "#;
        let config = Config::parse(raw).expect("parse");
        assert!(config.player.pruning);
        assert_eq!(config.connection.terminal_close_codes, vec![4014, 4004]);
        assert_eq!(config.controls.volume_step, 5);
        assert_eq!(
            config.logging.and_then(|l| l.level).as_deref(),
            Some("debug")
        );
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        assert!(matches!(
            Config::parse("[player\nstay_time_secs = "),
            Err(ConfigError::Parse(_))
        ));
    }
}
