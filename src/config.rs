//! Configuration management for the token list tools

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::reconcile::DEFAULT_MAX_CONCURRENCY;

/// File name looked up in `$HOME` when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = ".tokenlist-config.json";

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// chainId → JSON-RPC endpoint, merged over the built-in table
    #[serde(default)]
    pub rpc_urls: BTreeMap<u64, String>,

    /// Symbols exempt from on-chain checks (e.g. tokens without a contract)
    #[serde(default)]
    pub validation_exceptions: Vec<String>,

    /// Upper bound on concurrent RPC calls and logo fetches
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-request timeout; unset means no timeout
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Whether validation probes logo URIs
    #[serde(default = "default_check_logos")]
    pub check_logos: bool,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_check_logos() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_urls: BTreeMap::new(),
            validation_exceptions: vec![],
            max_concurrency: default_max_concurrency(),
            request_timeout_secs: None,
            check_logos: default_check_logos(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file: {}", path_ref.display()))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path_ref.display()))?;

        Ok(config)
    }

    /// Load configuration from the default location.
    ///
    /// Tries `~/.tokenlist-config.json` and falls back to defaults if it is
    /// missing or unreadable.
    pub fn load_default() -> Self {
        if let Ok(home) = std::env::var("HOME") {
            let default_path = Path::new(&home).join(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                match Self::from_file(&default_path) {
                    Ok(config) => {
                        info!("Loaded config from {}", default_path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!(
                            "Failed to parse config at {}: {:#}",
                            default_path.display(),
                            e
                        );
                    }
                }
            }
        }

        info!("Using default config");
        Self::default()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Save configuration to a file in JSON format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;

        std::fs::write(path_ref, json)
            .with_context(|| format!("Failed to write config file: {}", path_ref.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test the default values
    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.rpc_urls.is_empty());
        assert!(config.validation_exceptions.is_empty());
        assert_eq!(config.max_concurrency, 16);
        assert_eq!(config.request_timeout(), None);
        assert!(config.check_logos);
    }

    /// Test that omitted fields take their defaults
    #[test]
    fn test_partial_config() {
        let config: Config =
            serde_json::from_str(r#"{ "validationExceptions": ["ETH"] }"#).unwrap();
        assert_eq!(config.validation_exceptions, vec!["ETH".to_string()]);
        assert_eq!(config.max_concurrency, 16);
        assert!(config.check_logos);
    }

    /// Test that chain IDs are accepted as object keys
    #[test]
    fn test_rpc_urls_keys() {
        let config: Config = serde_json::from_str(
            r#"{ "rpcUrls": { "1": "http://localhost:8545" }, "requestTimeoutSecs": 10 }"#,
        )
        .unwrap();
        assert_eq!(config.rpc_urls[&1], "http://localhost:8545");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(10)));
    }

    /// Test that a saved config loads back unchanged
    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config {
            rpc_urls: BTreeMap::from([(10, "http://localhost:9545".to_string())]),
            validation_exceptions: vec!["NATIVE".to_string()],
            max_concurrency: 4,
            request_timeout_secs: Some(30),
            check_logos: false,
        };
        config.save_to_file(&path).unwrap();

        assert_eq!(Config::from_file(&path).unwrap(), config);
    }

    /// Test that a malformed file is reported with its path
    #[test]
    fn test_from_file_error_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }
}
