//! Runtime settings.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `LEVEL_MONITOR_`:
//!
//! ```toml
//! api_url = "http://localhost:3000"
//! warning_threshold = 45
//! critical_threshold = 70
//! reconnect_delay_ms = 1000
//! ```
//!
//! They are read once at startup; the thresholds are fixed for the lifetime
//! of a [`LevelMonitor`](crate::LevelMonitor).

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::SettingsError;
use crate::monitor::Thresholds;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "LEVEL_MONITOR";

/// Default server address.
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Monitor settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// Base address of the push server.
    pub api_url: String,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    /// Delay between reconnect attempts; 0 disables reconnecting.
    pub reconnect_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let thresholds = Thresholds::default();
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            warning_threshold: thresholds.warning,
            critical_threshold: thresholds.critical,
            reconnect_delay_ms: 1000,
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, SettingsError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("api_url", defaults.api_url)?
            .set_default("warning_threshold", defaults.warning_threshold)?
            .set_default("critical_threshold", defaults.critical_threshold)?
            .set_default("reconnect_delay_ms", defaults.reconnect_delay_ms)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder.add_source(env).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.api_url.trim().is_empty() {
            return Err(SettingsError::Invalid("api_url is empty".to_string()));
        }
        if !self.warning_threshold.is_finite() || !self.critical_threshold.is_finite() {
            return Err(SettingsError::Invalid(
                "thresholds must be finite numbers".to_string(),
            ));
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.warning_threshold, self.critical_threshold)
    }

    pub fn reconnect_delay(&self) -> Option<Duration> {
        match self.reconnect_delay_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
