//! Configuration management for Beacon
//!
//! Settings are layered: an optional YAML file first, then environment
//! variables prefixed with `BEACON_` (sections separated by `__`, e.g.
//! `BEACON_REGISTRY__NAME=east`). Each section deserializes into a typed
//! struct whose missing fields fall back to defaults.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use beacon_common::{BeaconError, ENV_PREFIX, Result};
use beacon_registry::RegistryConfig;

/// Bootstrap loader settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Load records at startup (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// YAML or JSON file with a list of instance records
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Logging settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset (default: "info")
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for the rolling log file; file logging is off when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Log file name (default: "beacon.log")
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Write to stdout (default: true)
    #[serde(default = "default_console")]
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
            file_name: default_file_name(),
            console: default_console(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_name() -> String {
    "beacon.log".to_string()
}

fn default_console() -> bool {
    true
}

/// Application configuration loaded from a config file and the environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load from an optional YAML file plus `BEACON_` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
        }
        builder = builder.add_source(Self::environment());

        let config = builder
            .build()
            .map_err(|e| BeaconError::ConfigError(e.to_string()))?;
        Ok(Self { config })
    }

    /// Load from YAML text plus `BEACON_` environment variables
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .add_source(Self::environment())
            .build()
            .map_err(|e| BeaconError::ConfigError(e.to_string()))?;
        Ok(Self { config })
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Deserialize a section, using its defaults when the section is absent
    fn section<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.config.get::<T>(key) {
            Ok(value) => Ok(value),
            Err(ConfigError::NotFound(_)) => Ok(T::default()),
            Err(e) => Err(BeaconError::ConfigError(format!("{}: {}", key, e))),
        }
    }

    pub fn registry(&self) -> Result<RegistryConfig> {
        self.section("registry")
    }

    pub fn bootstrap(&self) -> Result<BootstrapConfig> {
        self.section("bootstrap")
    }

    pub fn logging(&self) -> Result<LoggingConfig> {
        self.section("logging")
    }
}
