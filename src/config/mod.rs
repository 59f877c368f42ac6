//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::services::reconciler::DEFAULT_SOURCE_TAG;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub signing_service: SigningServiceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Signing service connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SigningServiceConfig {
    #[serde(default = "default_signing_url")]
    pub url: String,
    /// Bearer token presented on every call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,
    /// Extra CA bundle trusted for the service endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_ca: Option<PathBuf>,
}

fn default_signing_url() -> String {
    "https://portal.ezca.io".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_ssl_verify() -> bool {
    true
}

impl Default for SigningServiceConfig {
    fn default() -> Self {
        Self {
            url: default_signing_url(),
            token: None,
            timeout_secs: default_timeout(),
            ssl_verify: default_ssl_verify(),
            ssl_ca: None,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite://./data/leafcert.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default)]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl LogFormat {
    fn from_env(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Console,
    File,
    /// Log to both console and file
    Both,
}

impl LogTarget {
    fn from_env(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "file" => LogTarget::File,
            "both" => LogTarget::Both,
            _ => LogTarget::Console,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/leafcert")
}

fn default_log_prefix() -> String {
    "leafcert".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

/// Reconciliation behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcileConfig {
    /// Upper bound on one reconciliation, unbounded when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_timeout_secs: Option<u64>,
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
}

fn default_source_tag() -> String {
    DEFAULT_SOURCE_TAG.to_string()
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: None,
            source_tag: default_source_tag(),
        }
    }
}

impl ReconcileConfig {
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables (prefixed with LEAFCERT_)
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("LEAFCERT_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => Self::load_from(path)?,
            Some(ref path) => {
                anyhow::bail!("Configuration file not found: {:?}", path);
            }
            None => AppConfig::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a YAML configuration file without applying overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            // Current directory
            PathBuf::from("leafcert.yaml"),
            PathBuf::from("config/leafcert.yaml"),
            // System config directory
            PathBuf::from("/etc/leafcert/leafcert.yaml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("leafcert/leafcert.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Signing service overrides
        if let Some(url) = var("LEAFCERT_SIGNING_URL") {
            self.signing_service.url = url;
        }
        if let Some(token) = var("LEAFCERT_SIGNING_TOKEN") {
            self.signing_service.token = Some(token);
        }
        if let Some(timeout) = var("LEAFCERT_SIGNING_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.signing_service.timeout_secs = t;
            }
        }
        if let Some(ca) = var("LEAFCERT_SSL_CA") {
            self.signing_service.ssl_ca = Some(PathBuf::from(ca));
        }
        if let Some(verify) = var("LEAFCERT_SSL_VERIFY") {
            self.signing_service.ssl_verify = !matches!(
                verify.to_lowercase().as_str(),
                "false" | "0" | "no" | "off"
            );
        }

        // Database overrides
        if let Some(url) = var("DATABASE_URL") {
            self.database.url = url;
        }

        // Logging overrides
        if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = var("LEAFCERT_LOG_FORMAT") {
            self.logging.format = LogFormat::from_env(&format);
        }
        if let Some(target) = var("LEAFCERT_LOG_TARGET") {
            self.logging.target = LogTarget::from_env(&target);
        }
        if let Some(dir) = var("LEAFCERT_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(dir);
        }

        // Reconcile overrides
        if let Some(timeout) = var("LEAFCERT_OPERATION_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.reconcile.operation_timeout_secs = Some(t);
            }
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.signing_service.url).with_context(|| {
            format!("Invalid signing service URL: {:?}", self.signing_service.url)
        })?;
        if url.scheme() != "https" && url.scheme() != "http" {
            anyhow::bail!(
                "Signing service URL must use http or https, got {:?}",
                url.scheme()
            );
        }

        if self.signing_service.timeout_secs == 0 {
            anyhow::bail!("Signing service timeout cannot be 0");
        }

        if let Some(ref ca) = self.signing_service.ssl_ca {
            if !ca.exists() {
                anyhow::bail!("CA bundle not found: {:?}", ca);
            }
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections cannot be 0");
        }

        if self.reconcile.operation_timeout_secs == Some(0) {
            anyhow::bail!("Operation timeout cannot be 0");
        }

        if !self.signing_service.ssl_verify {
            tracing::warn!("TLS verification for the signing service is disabled");
        }

        Ok(())
    }
}
