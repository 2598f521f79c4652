use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{AgentryError, AgentryResult};

/// Builds the filter used by [`init_logging`]. `RUST_LOG` wins over the
/// configured level; `verbose` forces at least debug output.
pub fn build_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    let fallback = if verbose {
        "debug".to_string()
    } else {
        config.level.clone()
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> AgentryResult<()> {
    let filter = build_filter(config, verbose);

    let result = if config.json_format {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_current_span(false))
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .try_init()
    };

    result.map_err(|e| AgentryError::Internal(format!("Failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_uses_configured_level() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig {
            level: "warn".to_string(),
            json_format: false,
        };
        assert_eq!(build_filter(&config, false).to_string(), "warn");
        assert_eq!(build_filter(&config, true).to_string(), "debug");
    }
}
