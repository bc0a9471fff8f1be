//! Configuration for pipelines and the collector.
//!
//! YAML with per-field defaults; a missing or unreadable file falls back to
//! [`Config::default`].
//!
//! ```yaml
//! version: 1
//! executive:
//!   parallel: true
//!   worker_threads: 4
//!   defer_collection: true
//!   release_data_by_default: false
//! collector:
//!   enabled: true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Highest configuration version this crate understands.
pub const CONFIG_VERSION: u32 = 1;

/// Settings that shape how a pipeline executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutiveConfig {
    /// Run stages of one topological level on worker threads. Needs the
    /// `parallel` feature.
    #[serde(default)]
    pub parallel: bool,

    /// Worker threads for parallel execution. Zero uses rayon's default.
    #[serde(default)]
    pub worker_threads: usize,

    /// Wrap every update in a deferred-collection scope.
    #[serde(default = "default_defer_collection")]
    pub defer_collection: bool,

    /// Initial release-data flag of new stages.
    #[serde(default)]
    pub release_data_by_default: bool,
}

fn default_defer_collection() -> bool {
    true
}

impl Default for ExecutiveConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            worker_threads: 0,
            defer_collection: default_defer_collection(),
            release_data_by_default: false,
        }
    }
}

/// Cycle collector settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Search for cycles when a participant is released.
    #[serde(default = "default_collector_enabled")]
    pub enabled: bool,
}

fn default_collector_enabled() -> bool {
    true
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self { enabled: default_collector_enabled() }
    }
}

impl CollectorConfig {
    /// Push these settings to the process-wide collector.
    ///
    /// Affects every object in the process, so nothing calls this implicitly.
    pub fn apply(&self) {
        crate::gc::set_enabled(self.enabled);
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Executive settings.
    #[serde(default)]
    pub executive: ExecutiveConfig,

    /// Collector settings.
    #[serde(default)]
    pub collector: CollectorConfig,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            executive: ExecutiveConfig::default(),
            collector: CollectorConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .map_err(|_| Error::ConfigNotFound(path.display().to_string()))?;

        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error with line number if parsing fails.
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| {
            let line = e.location().map_or(0, |l| l.line());
            Error::ConfigParse { line, message: e.to_string() }
        })
    }

    /// Loads configuration with fallback to defaults.
    #[must_use]
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "config.fallback");
                Self::default()
            }
        }
    }

    /// Writes this configuration as YAML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml_ng::to_string(self)
            .map_err(|e| Error::ConfigInvalid { key: "config".to_string(), message: e.to_string() })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, yaml)?;
        debug!(path = %path.display(), "config.saved");
        Ok(())
    }

    /// Platform configuration file location, if a config directory exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("trueno-flow").join("config.yaml"))
    }

    /// Check values that parse but make no sense.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(Error::ConfigInvalid {
                key: "version".to_string(),
                message: format!("unsupported version {} (expected 1..={CONFIG_VERSION})", self.version),
            });
        }
        if self.executive.worker_threads > 1024 {
            return Err(Error::ConfigInvalid {
                key: "executive.worker_threads".to_string(),
                message: format!("{} exceeds the limit of 1024", self.executive.worker_threads),
            });
        }
        Ok(())
    }
}
