use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod formatter;

pub use formatter::*;

use crate::configs::Config;

/// Builds the filter directive from config: `level[,filters]`.
pub fn filter_directive(config: &Config) -> String {
    let level = config
        .logging
        .as_ref()
        .and_then(|l| l.level.as_deref())
        .unwrap_or("info");

    let filters = config
        .logging
        .as_ref()
        .and_then(|l| l.filters.as_deref())
        .unwrap_or("");

    if filters.is_empty() {
        level.to_string()
    } else {
        format!("{},{}", level, filters)
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over the config file.
pub fn init(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));

    let stdout_layer = fmt::layer()
        .event_format(CustomFormatter::new(true))
        .with_ansi(true);

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .try_init()
    {
        eprintln!("Logger already initialised: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::LoggingConfig;

    #[test]
    fn directive_defaults_to_info() {
        assert_eq!(filter_directive(&Config::default()), "info");
    }

    #[test]
    fn directive_appends_filters() {
        let config = Config {
            logging: Some(LoggingConfig {
                level: Some("debug".into()),
                filters: Some("queuelink::voice=trace".into()),
            }),
            ..Config::default()
        };
        assert_eq!(filter_directive(&config), "debug,queuelink::voice=trace");
    }
}
