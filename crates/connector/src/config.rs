//! Environment-variable configuration.

use std::env;

use crate::error::ConfigError;

pub const POLYGON_API_KEY_VAR: &str = "POLYGON_API_KEY";
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";
pub const DEFAULT_TOPIC: &str = "ohlcv.realtime";

/// Resolved process configuration. Credentials come from the environment
/// only; everything else has a documented default.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub nats_url: String,
    pub topic: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: polygon_api_key()?,
            nats_url: env::var("NATS_URL").unwrap_or_else(|_| DEFAULT_NATS_URL.to_string()),
            topic: env::var("TICKBRIDGE_TOPIC").unwrap_or_else(|_| DEFAULT_TOPIC.to_string()),
        })
    }
}

/// The feed API key; required, never defaulted.
pub fn polygon_api_key() -> Result<String, ConfigError> {
    match env::var(POLYGON_API_KEY_VAR) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ConfigError::MissingVar(POLYGON_API_KEY_VAR)),
    }
}

/// Parse a comma-separated pattern list ("XA.*,XL2.*").
pub fn parse_patterns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_patterns() {
        assert_eq!(parse_patterns("XA.*, XT.BTC-USD ,"), ["XA.*", "XT.BTC-USD"]);
        assert!(parse_patterns("").is_empty());
    }

    #[test]
    fn test_missing_api_key() {
        env::remove_var(POLYGON_API_KEY_VAR);
        assert!(matches!(
            polygon_api_key(),
            Err(ConfigError::MissingVar(POLYGON_API_KEY_VAR))
        ));
    }
}
