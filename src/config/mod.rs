//! Configuration module
//!
//! Harness defaults, loaded from a config file and overridden by environment
//! variables.

pub mod env;
pub mod file;

pub use env::{EnvBuilder, EnvConfig, EnvGuard};
pub use file::ConfigFile;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::assertion::Dumper;
use crate::utils::LogLevel;

/// Harness configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// When false, suites are not run at all
    pub enabled: bool,

    /// Default scheduler delay in milliseconds; 0 runs cases synchronously
    pub delay_ms: u64,

    /// Default per-case timeout in milliseconds; unset means ten times the delay
    pub timeout_ms: Option<u64>,

    /// Rendering of values in verdict messages
    pub dump: Dumper,

    pub log_level: LogLevel,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 0,
            timeout_ms: None,
            dump: Dumper::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl HarnessConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == Some(0) {
            anyhow::bail!("timeout_ms must be greater than zero");
        }
        if self.dump.max_length == 0 {
            anyhow::bail!("dump.max_length must be greater than zero");
        }
        Ok(())
    }

    /// Apply environment overrides
    pub fn with_env(mut self, env: &EnvConfig) -> Self {
        if let Some(enabled) = env.enabled {
            self.enabled = enabled;
        }
        if let Some(delay) = env.delay {
            self.delay_ms = delay;
        }
        if let Some(timeout) = env.timeout {
            self.timeout_ms = Some(timeout);
        }
        if let Some(max_length) = env.dump_max_length {
            self.dump.max_length = max_length;
        }
        if let Some(level) = env.log.as_deref().and_then(LogLevel::from_str) {
            self.log_level = level;
        }
        self
    }

    /// Load from the file named by `UTEST_CONFIG` or the first standard
    /// location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let env = EnvConfig::load();
        let file = match &env.config_file {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::load_default()?,
        };
        let config = file.harness.with_env(&env);
        config.validate()?;
        debug!("Loaded harness configuration: {:?}", config);
        Ok(config)
    }

    /// Like [`HarnessConfig::load`], falling back to defaults on error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            warn!("Ignoring harness configuration: {:#}", e);
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert!(config.enabled);
        assert_eq!(config.delay(), Duration::ZERO);
        assert_eq!(config.timeout(), None);
        assert_eq!(config.dump.max_length, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env = EnvConfig {
            enabled: Some(false),
            delay: Some(50),
            timeout: Some(500),
            dump_max_length: Some(40),
            log: Some("debug".to_string()),
            ..Default::default()
        };
        let config = HarnessConfig::default().with_env(&env);
        assert!(!config.enabled);
        assert_eq!(config.delay(), Duration::from_millis(50));
        assert_eq!(config.timeout(), Some(Duration::from_millis(500)));
        assert_eq!(config.dump.max_length, 40);
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_unknown_log_level_is_ignored() {
        let env = EnvConfig {
            log: Some("loud".to_string()),
            ..Default::default()
        };
        let config = HarnessConfig::default().with_env(&env);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_validate() {
        let config = HarnessConfig {
            timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml() {
        let config: HarnessConfig = serde_yaml::from_str("delay_ms: 20\ndump:\n  indent: \"    \"\n").unwrap();
        assert_eq!(config.delay_ms, 20);
        assert!(config.enabled);
        assert_eq!(config.dump.indent, "    ");
        assert_eq!(config.dump.max_length, 16);
    }
}
