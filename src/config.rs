//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::gateway::RpcConfig;
use crate::prefs::FileStore;
use crate::session::{SessionConfig, DEFAULT_INSTALL_URL};
use alloy_primitives::Address;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chain and contract configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_id")]
    pub expected_chain_id: u64,

    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Djed controller address; required for chain access
    #[serde(default)]
    pub contract_address: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_chain_id() -> u64 {
    1
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

fn default_request_timeout() -> u64 {
    10_000
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            expected_chain_id: default_chain_id(),
            rpc_url: default_rpc_url(),
            contract_address: String::new(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

/// Wallet bridge configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_wallet_url")]
    pub url: String,

    #[serde(default = "default_install_url")]
    pub install_url: String,
}

fn default_wallet_url() -> String {
    "http://127.0.0.1:1248".to_string()
}

fn default_install_url() -> String {
    DEFAULT_INSTALL_URL.to_string()
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            url: default_wallet_url(),
            install_url: default_install_url(),
        }
    }
}

/// Refresh periods; 0 disables a task
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_account_interval")]
    pub account_details_interval_ms: u64,

    #[serde(default = "default_coin_interval")]
    pub coin_details_interval_ms: u64,
}

fn default_account_interval() -> u64 {
    10_000
}

fn default_coin_interval() -> u64 {
    15_000
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            account_details_interval_ms: default_account_interval(),
            coin_details_interval_ms: default_coin_interval(),
        }
    }
}

/// Preference storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_prefs_path")]
    pub prefs_path: String,
}

fn default_prefs_path() -> String {
    FileStore::default_path().to_string_lossy().to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefs_path: default_prefs_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("djed-dashboard").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Chain overrides
        override_parsed("DJED_CHAIN_ID", &mut self.chain.expected_chain_id);
        override_string("DJED_RPC_URL", &mut self.chain.rpc_url);
        override_string("DJED_CONTRACT_ADDRESS", &mut self.chain.contract_address);

        // Wallet overrides
        override_string("DJED_WALLET_URL", &mut self.wallet.url);

        // Polling overrides
        override_parsed(
            "DJED_ACCOUNT_DETAILS_INTERVAL_MS",
            &mut self.polling.account_details_interval_ms,
        );
        override_parsed(
            "DJED_COIN_DETAILS_INTERVAL_MS",
            &mut self.polling.coin_details_interval_ms,
        );

        // Storage overrides
        override_string("DJED_PREFS_PATH", &mut self.storage.prefs_path);

        // Logging overrides
        override_string("DJED_LOG_LEVEL", &mut self.logging.level);
        override_string("DJED_LOG_FORMAT", &mut self.logging.format);
    }

    /// Session settings derived from this config
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            expected_chain_id: self.chain.expected_chain_id,
            account_details_interval: Duration::from_millis(self.polling.account_details_interval_ms),
            coin_details_interval: Duration::from_millis(self.polling.coin_details_interval_ms),
            install_url: self.wallet.install_url.clone(),
        }
    }

    /// Gateway settings derived from this config
    pub fn rpc_config(&self) -> Result<RpcConfig, ConfigError> {
        let raw = self.chain.contract_address.trim();
        if raw.is_empty() {
            return Err(ConfigError::Invalid {
                field: "chain.contract_address",
                error: "not set".to_string(),
            });
        }
        let djed_address = Address::from_str(raw).map_err(|e| ConfigError::Invalid {
            field: "chain.contract_address",
            error: e.to_string(),
        })?;

        Ok(RpcConfig {
            rpc_url: self.chain.rpc_url.clone(),
            wallet_url: self.wallet.url.clone(),
            djed_address,
            request_timeout_ms: self.chain.request_timeout_ms,
        })
    }

    pub fn prefs_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.prefs_path)
    }
}

fn override_string(var: &str, target: &mut String) {
    if let Ok(value) = std::env::var(var) {
        *target = value;
    }
}

fn override_parsed<T: FromStr>(var: &str, target: &mut T) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(v) => *target = v,
            Err(_) => tracing::warn!("Ignoring invalid {}: {:?}", var, value),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {field}: {error}")]
    Invalid { field: &'static str, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Djed Dashboard Configuration
#
# Environment variables override these settings:
# - DJED_CHAIN_ID
# - DJED_RPC_URL
# - DJED_CONTRACT_ADDRESS
# - DJED_WALLET_URL
# - DJED_ACCOUNT_DETAILS_INTERVAL_MS
# - DJED_COIN_DETAILS_INTERVAL_MS
# - DJED_PREFS_PATH
# - DJED_LOG_LEVEL
# - DJED_LOG_FORMAT

[chain]
# Chain id the wallet is expected to be on
expected_chain_id = 1

# Node endpoint used for contract reads
rpc_url = "http://localhost:8545"

# Address of the Djed controller contract (required)
contract_address = ""

# Request timeout in milliseconds
request_timeout_ms = 10000

[wallet]
# Wallet bridge endpoint (EIP-1193 over HTTP)
url = "http://127.0.0.1:1248"

# Page opened for users without a wallet
install_url = "https://metamask.io/"

[polling]
# Account details + budgets refresh period (ms, 0 disables)
account_details_interval_ms = 10000

# Coin details refresh period (ms, 0 disables)
coin_details_interval_ms = 15000

[storage]
# File holding the remembered account list
# prefs_path = "~/.local/share/djed-dashboard/prefs.json"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chain.expected_chain_id, 1);
        assert_eq!(config.polling.account_details_interval_ms, 10_000);
        assert_eq!(config.polling.coin_details_interval_ms, 15_000);
        assert_eq!(config.wallet.install_url, DEFAULT_INSTALL_URL);

        let session = config.session_config();
        assert_eq!(session.account_details_interval, Duration::from_secs(10));
        assert_eq!(session.coin_details_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.chain.rpc_url, "http://localhost:8545");
        assert_eq!(config.wallet.url, "http://127.0.0.1:1248");
        assert_eq!(config.logging.format, "pretty");
        assert!(!config.storage.prefs_path.is_empty());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::parse(
            r#"
[chain]
expected_chain_id = 61
contract_address = "0x00000000000000000000000000000000000000d0"

[polling]
coin_details_interval_ms = 0
"#,
        )
        .unwrap();

        assert_eq!(config.chain.expected_chain_id, 61);
        assert_eq!(config.polling.account_details_interval_ms, 10_000);
        assert_eq!(config.polling.coin_details_interval_ms, 0);

        let rpc = config.rpc_config().unwrap();
        assert_eq!(rpc.djed_address, Address::with_last_byte(0xd0));
        assert_eq!(rpc.request_timeout_ms, 10_000);
    }

    #[test]
    fn test_rpc_config_requires_contract_address() {
        let config = Config::default();
        assert!(matches!(
            config.rpc_config(),
            Err(ConfigError::Invalid { field: "chain.contract_address", .. })
        ));

        let mut config = Config::default();
        config.chain.contract_address = "0x1234".to_string();
        assert!(config.rpc_config().is_err());
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[chain\nexpected_chain_id = 1").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            Config::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("DJED_CHAIN_ID", "137");
        std::env::set_var("DJED_COIN_DETAILS_INTERVAL_MS", "not-a-number");
        std::env::set_var("DJED_LOG_FORMAT", "json");

        let config = Config::from_env();

        std::env::remove_var("DJED_CHAIN_ID");
        std::env::remove_var("DJED_COIN_DETAILS_INTERVAL_MS");
        std::env::remove_var("DJED_LOG_FORMAT");

        assert_eq!(config.chain.expected_chain_id, 137);
        assert_eq!(config.polling.coin_details_interval_ms, 15_000);
        assert_eq!(config.logging.format, "json");
    }
}
