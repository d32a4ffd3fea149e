//! Loader configuration.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::entities::{CachePolicy, Precision, RequestDefaults};
use crate::infrastructure::memory::DEFAULT_MAX_SIZE_BYTES;

use super::args::CliArgs;

const APP_NAME: &str = "pixelpipe";
const APP_QUALIFIER: &str = "dev";
const APP_ORGANIZATION: &str = "pixelpipe";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Where CPU-bound pipeline work runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionContext {
    /// On the attempt's own task.
    Inline,
    /// On tokio's blocking pool.
    #[default]
    Blocking,
}

/// Loader configuration, read from TOML and overridable from the CLI.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    pub log_level: LogLevel,

    /// Strong memory cache budget in bytes.
    pub memory_cache_max_bytes: u64,

    /// Keep evicted images reachable while something else holds them.
    pub weak_references_enabled: bool,

    /// Default memory cache policy.
    pub memory_cache_policy: CachePolicy,

    /// Default disk cache policy, passed to fetchers.
    pub disk_cache_policy: CachePolicy,

    /// Default network cache policy, passed to fetchers.
    pub network_cache_policy: CachePolicy,

    /// Include file modification times in file cache keys.
    pub add_file_last_modified_to_cache_key: bool,

    /// Let network fetchers honour HTTP cache headers.
    pub respect_network_cache_headers: bool,

    /// Maximum concurrent fetches.
    pub fetch_parallelism: usize,

    /// Allow hardware-backed images by default.
    pub allow_hardware: bool,

    /// Default precision.
    pub precision: Precision,

    /// Where decoders run.
    pub decoder_context: ExecutionContext,

    /// Where transformations run.
    pub transformation_context: ExecutionContext,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            memory_cache_max_bytes: DEFAULT_MAX_SIZE_BYTES,
            weak_references_enabled: true,
            memory_cache_policy: CachePolicy::Enabled,
            disk_cache_policy: CachePolicy::Enabled,
            network_cache_policy: CachePolicy::Enabled,
            add_file_last_modified_to_cache_key: true,
            respect_network_cache_headers: true,
            fetch_parallelism: 4,
            allow_hardware: true,
            precision: Precision::Automatic,
            decoder_context: ExecutionContext::Blocking,
            transformation_context: ExecutionContext::Blocking,
        }
    }
}

impl LoaderConfig {
    /// Loads configuration from `path_override` or the default location.
    ///
    /// A missing file yields the defaults; an unparsable one is logged and
    /// replaced by the defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` if an existing file cannot be read.
    pub fn load(path_override: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(config_path) = path_override
            .map(Path::to_path_buf)
            .or_else(Self::default_config_path)
        else {
            return Ok(Self::default());
        };

        if !config_path.exists() {
            info!(path = %config_path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let mut config = match toml::from_str::<Self>(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %config_path.display(), error = %e, "Failed to parse config file, using defaults");
                Self::default()
            }
        };
        config.config = Some(config_path);
        Ok(config)
    }

    /// Serializes the configuration as TOML.
    ///
    /// # Errors
    /// Returns `ConfigError` if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(max_bytes) = args.memory_cache_max_bytes {
            self.memory_cache_max_bytes = max_bytes;
        }
        if let Some(weak) = args.weak_references_enabled {
            self.weak_references_enabled = weak;
        }
        if let Some(policy) = args.memory_cache_policy {
            self.memory_cache_policy = policy;
        }
        if let Some(policy) = args.disk_cache_policy {
            self.disk_cache_policy = policy;
        }
        if let Some(policy) = args.network_cache_policy {
            self.network_cache_policy = policy;
        }
        if let Some(flag) = args.add_file_last_modified_to_cache_key {
            self.add_file_last_modified_to_cache_key = flag;
        }
        if let Some(flag) = args.respect_network_cache_headers {
            self.respect_network_cache_headers = flag;
        }
        if let Some(parallelism) = args.fetch_parallelism {
            self.fetch_parallelism = parallelism;
        }
        if let Some(allow_hardware) = args.allow_hardware {
            self.allow_hardware = allow_hardware;
        }
        if let Some(precision) = args.precision {
            self.precision = precision;
        }
        if let Some(context) = args.decoder_context {
            self.decoder_context = context;
        }
        if let Some(context) = args.transformation_context {
            self.transformation_context = context;
        }
    }

    /// Request defaults implied by this configuration.
    #[must_use]
    pub fn request_defaults(&self) -> RequestDefaults {
        RequestDefaults {
            precision: self.precision,
            memory_cache_policy: self.memory_cache_policy,
            disk_cache_policy: self.disk_cache_policy,
            network_cache_policy: self.network_cache_policy,
            allow_hardware: self.allow_hardware,
            ..RequestDefaults::default()
        }
    }

    /// Fetch parallelism, never below one.
    #[must_use]
    pub fn effective_fetch_parallelism(&self) -> usize {
        self.fetch_parallelism.max(1)
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("pixelpipe.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
            memory_cache_max_bytes = 1024
            memory_cache_policy = "read_only"
            precision = "exact"
            decoder_context = "inline"
        "#;

        let config: LoaderConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.memory_cache_max_bytes, 1024);
        assert_eq!(config.memory_cache_policy, CachePolicy::ReadOnly);
        assert_eq!(config.precision, Precision::Exact);
        assert_eq!(config.decoder_context, ExecutionContext::Inline);
        assert_eq!(config.fetch_parallelism, 4);
        assert!(config.weak_references_enabled);
    }

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();

        assert_eq!(config.memory_cache_max_bytes, DEFAULT_MAX_SIZE_BYTES);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.transformation_context, ExecutionContext::Blocking);
        assert!(config.add_file_last_modified_to_cache_key);
    }

    #[test]
    fn test_merge_with_args() {
        let args = CliArgs::parse_from([
            "pixelpipe",
            "--memory-cache-max-bytes",
            "2048",
            "--fetch-parallelism",
            "0",
            "--disk-cache-policy",
            "disabled",
            "--weak-references-enabled",
            "false",
        ]);
        let mut config = LoaderConfig::default();
        config.merge_with_args(&args);

        assert_eq!(config.memory_cache_max_bytes, 2048);
        assert_eq!(config.disk_cache_policy, CachePolicy::Disabled);
        assert!(!config.weak_references_enabled);
        assert_eq!(config.effective_fetch_parallelism(), 1);
        assert_eq!(config.memory_cache_policy, CachePolicy::Enabled);
    }

    #[test]
    fn test_request_defaults() {
        let config = LoaderConfig {
            allow_hardware: false,
            network_cache_policy: CachePolicy::WriteOnly,
            ..LoaderConfig::default()
        };
        let defaults = config.request_defaults();
        assert!(!defaults.allow_hardware);
        assert_eq!(defaults.network_cache_policy, CachePolicy::WriteOnly);
    }

    #[test]
    fn test_load_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "fetch_parallelism = 9")?;

        let config = LoaderConfig::load(Some(file.path()))?;
        assert_eq!(config.fetch_parallelism, 9);
        assert_eq!(config.config.as_deref(), Some(file.path()));
        Ok(())
    }

    #[test]
    fn test_load_invalid_file_falls_back() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "fetch_parallelism = \"many\"")?;

        let config = LoaderConfig::load(Some(file.path()))?;
        assert_eq!(config.fetch_parallelism, 4);
        Ok(())
    }

    #[test]
    fn test_toml_round_trip_keeps_policies() -> Result<(), Box<dyn std::error::Error>> {
        let config = LoaderConfig {
            memory_cache_policy: CachePolicy::WriteOnly,
            ..LoaderConfig::default()
        };
        let parsed: LoaderConfig = toml::from_str(&config.to_toml_string()?)?;
        assert_eq!(parsed.memory_cache_policy, CachePolicy::WriteOnly);
        Ok(())
    }
}
