//! Configuration management

use crate::error::{BankError, BankResult, ErrorContext};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `ledger.base_url`
pub const API_URL_ENV: &str = "SMARTBANK_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartBankConfig {
    pub ledger: LedgerConfig,
    pub storage: StorageConfig,
}

/// Where and how to reach the ledger service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted session record. `~` is expanded.
    pub data_dir: String,
}

impl Default for SmartBankConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            storage: StorageConfig {
                data_dir: "~/.smartbank".to_string(),
            },
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://smart-bank-system-2.onrender.com".to_string(),
            timeout_seconds: 30,
            user_agent: format!("smartbank/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl SmartBankConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> BankResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BankError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        toml::from_str(&content).map_err(|e| BankError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> BankResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| BankError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| BankError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Apply environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.ledger.base_url = url.trim().to_string();
            }
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> BankResult<()> {
        let parsed = url::Url::parse(&self.ledger.base_url).map_err(|e| BankError::Config {
            message: format!("Invalid ledger base_url '{}': {}", self.ledger.base_url, e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("validate")
                .with_suggestion("Set ledger.base_url to an absolute http(s) URL"),
        })?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(crate::config_error!(
                format!("Unsupported ledger URL scheme: {}", parsed.scheme()),
                "config"
            ));
        }

        if self.ledger.timeout_seconds == 0 {
            return Err(BankError::Config {
                message: "Ledger timeout_seconds must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set ledger.timeout_seconds to a positive value"),
            });
        }

        if self.storage.data_dir.trim().is_empty() {
            return Err(BankError::Config {
                message: "Storage data_dir must not be empty".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set storage.data_dir, e.g. ~/.smartbank"),
            });
        }

        Ok(())
    }

    /// The storage directory with a leading `~` expanded
    pub fn resolve_data_dir(&self) -> PathBuf {
        expand_home(&self.storage.data_dir)
    }
}

/// Default location written by `config --init`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
        .map(|d| d.join("smartbank").join("config.toml"))
}

/// Candidate config files, most specific first
pub fn config_search_paths() -> Vec<PathBuf> {
    [
        dirs::config_dir().map(|d| d.join("smartbank").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".smartbank").join("config.toml")),
        Some(PathBuf::from("smartbank.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches(['/', '\\'])),
        _ => PathBuf::from(path),
    }
}
