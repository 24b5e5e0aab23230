pub mod constants;
pub mod types;

pub use constants::{Cluster, DEVNET, MAINNET, QUOTE_INDEX};
pub use types::*;

use std::path::Path;

use tracing::info;

use crate::core::errors::ConfigError;

/// Environment override for the endpoint URL
pub const ENV_ENDPOINT: &str = "MANGO_FEED_ENDPOINT";

/// Environment override for the commitment level
pub const ENV_COMMITMENT: &str = "MANGO_FEED_COMMITMENT";

impl FeedConfig {
    /// Load configuration from a JSON file, apply environment overrides and validate
    ///
    /// Fields missing from the file keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref();

        let text = std::fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut cfg: FeedConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;

        cfg.apply_env()?;
        cfg.validate()?;

        info!(endpoint = %cfg.endpoint, commitment = %cfg.commitment, "loaded feed config from {}", config_path.display());
        Ok(cfg)
    }

    /// Apply `MANGO_FEED_ENDPOINT` / `MANGO_FEED_COMMITMENT` if set
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(
            std::env::var(ENV_ENDPOINT).ok(),
            std::env::var(ENV_COMMITMENT).ok(),
        )
    }

    fn apply_overrides(
        &mut self,
        endpoint: Option<String>,
        commitment: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(endpoint) = endpoint {
            self.endpoint = endpoint;
        }
        if let Some(commitment) = commitment {
            self.commitment = commitment.parse().map_err(|_| ConfigError::Invalid {
                field: "commitment",
                reason: format!("'{}' is not processed, confirmed or finalized", commitment),
            })?;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(ConfigError::Invalid {
                field: "endpoint",
                reason: format!("'{}' must use ws:// or wss://", self.endpoint),
            });
        }

        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "connect_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "log_level",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_is_valid() {
        let cfg = FeedConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.commitment, Commitment::Finalized);
        assert!(cfg.endpoint.starts_with("wss://"));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let file = write_config(r#"{"endpoint": "ws://127.0.0.1:8900", "commitment": "processed"}"#);
        let cfg: FeedConfig =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.endpoint, "ws://127.0.0.1:8900");
        assert_eq!(cfg.commitment, Commitment::Processed);
        assert_eq!(cfg.poll_interval_ms, constants::DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_load_missing_file() {
        let err = FeedConfig::load("/nonexistent/feed.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_bad_json() {
        let file = write_config("{ not json");
        let err = FeedConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_unknown_commitment_in_file_rejected() {
        let file = write_config(r#"{"commitment": "recent"}"#);
        let err = FeedConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validate_rejects_http_endpoint() {
        let cfg = FeedConfig {
            endpoint: "https://api.mainnet-beta.solana.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "endpoint", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let cfg = FeedConfig {
            connect_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "connect_timeout_ms", .. })
        ));

        let cfg = FeedConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "poll_interval_ms", .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let mut cfg = FeedConfig::default();
        cfg.apply_overrides(
            Some("ws://localhost:8900".to_string()),
            Some("confirmed".to_string()),
        )
        .unwrap();
        assert_eq!(cfg.endpoint, "ws://localhost:8900");
        assert_eq!(cfg.commitment, Commitment::Confirmed);

        let err = cfg
            .apply_overrides(None, Some("max".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "commitment", .. }));
    }

    #[test]
    fn test_commitment_parse_and_display() {
        for c in Commitment::ALL {
            assert_eq!(c.as_str().parse::<Commitment>().unwrap(), c);
            assert_eq!(c.to_string(), c.as_str());
        }
        assert_eq!(
            "Finalized".parse::<Commitment>(),
            Err(crate::core::SubscriptionError::InvalidCommitment("Finalized".to_string()))
        );
    }

    #[test]
    fn test_config_json_roundtrip() {
        let cfg = FeedConfig {
            json_logs: true,
            commitment: Commitment::Confirmed,
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"confirmed\""));
        let back: FeedConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
