//! Tracing subscriber setup for hosts embedding the engine.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tripfin_types::{Result, TripfinError};

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns `Ok(false)` if a subscriber was already installed.
pub fn init_tracing(format: LogFormat) -> Result<bool> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) => EnvFilter::try_new(directives)
            .map_err(|e| TripfinError::Configuration(format!("invalid log filter: {e}")))?,
        Err(_) => EnvFilter::new(DEFAULT_FILTER),
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = match format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    Ok(installed.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        let _ = init_tracing(LogFormat::Plain);
        assert!(!init_tracing(LogFormat::Json).unwrap_or(false));
    }

    #[test]
    fn format_parses_from_config() {
        let f: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(f, LogFormat::Json);
    }
}
