//! Notifier configuration
//!
//! Loaded from TOML:
//! ```toml
//! paths = ["/srv/site", ["/srv/assets", "/srv/templates"]]
//! latency = 0.25
//! backend = "native"
//! ```

use crate::error::Error;
use crate::paths::{flatten, PathSpec};
use crate::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default latency window in seconds
pub const DEFAULT_LATENCY: f64 = 0.5;

/// Which notification primitive backs the event source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Kernel notification API for the current platform
    #[default]
    Native,
    /// Periodic directory scanning, polling at the latency interval
    Poll,
}

/// Notifier configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifierConfig {
    /// Directories to watch (nested lists allowed)
    #[serde(default)]
    pub paths: Vec<PathSpec>,

    /// Latency window in seconds (default: 0.5)
    #[serde(default = "default_latency")]
    pub latency: f64,

    /// Notification backend (default: native)
    #[serde(default)]
    pub backend: Backend,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            latency: DEFAULT_LATENCY,
            backend: Backend::default(),
        }
    }
}

impl NotifierConfig {
    /// Configuration for the given paths with default latency and backend
    pub fn for_paths(paths: impl Into<PathSpec>) -> Self {
        Self {
            paths: vec![paths.into()],
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Flattened, deduplicated path list
    pub fn directories(&self) -> Result<Vec<PathBuf>> {
        flatten(PathSpec::List(self.paths.clone()))
    }

    /// Latency as a duration, validated
    pub fn latency_duration(&self) -> Result<Duration> {
        latency_duration(self.latency)
    }

    /// Check every invariant a run relies on
    pub fn validate(&self) -> Result<()> {
        let dirs = self.directories()?;
        if dirs.is_empty() {
            return Err(Error::config("no directories to watch"));
        }
        self.latency_duration()?;
        Ok(())
    }
}

/// Convert a latency in seconds into a window duration
///
/// Fails unless the latency is finite and strictly positive.
pub fn latency_duration(latency: f64) -> Result<Duration> {
    if !(latency.is_finite() && latency > 0.0) {
        return Err(Error::config(format!(
            "latency must be a positive number of seconds (got {latency})"
        )));
    }
    let window = Duration::try_from_secs_f64(latency)
        .map_err(|e| Error::config(format!("latency {latency} out of range: {e}")))?;
    if window.is_zero() {
        return Err(Error::config(format!(
            "latency {latency} is below timer resolution"
        )));
    }
    Ok(window)
}

/// Example configuration file contents
pub fn example_config() -> &'static str {
    r#"# dirwatch configuration

# Directories to watch recursively. Nested lists are flattened.
paths = ["/path/to/project"]

# Seconds to accumulate changes before delivering one batch.
latency = 0.5

# "native" uses the platform notification API, "poll" scans periodically.
backend = "native"
"#
}

fn default_latency() -> f64 {
    DEFAULT_LATENCY
}
