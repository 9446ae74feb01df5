//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "UTEST";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Global toggle from UTEST_ENABLE
    pub enabled: Option<bool>,
    /// Scheduler delay (ms) from UTEST_DELAY
    pub delay: Option<u64>,
    /// Per-case timeout (ms) from UTEST_TIMEOUT
    pub timeout: Option<u64>,
    /// Dumper line limit from UTEST_DUMP_MAX_LENGTH
    pub dump_max_length: Option<usize>,
    /// Log level from UTEST_LOG
    pub log: Option<String>,
    /// Config file from UTEST_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::load_prefixed(ENV_PREFIX)
    }

    /// Load from variables named `<prefix>_<NAME>`
    pub fn load_prefixed(prefix: &str) -> Self {
        let vars = Vars { prefix };
        Self {
            enabled: vars.get_bool("ENABLE"),
            delay: vars.get_parse("DELAY"),
            timeout: vars.get_parse("TIMEOUT"),
            dump_max_length: vars.get_parse("DUMP_MAX_LENGTH"),
            log: vars.get("LOG"),
            config_file: vars.get("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.enabled.is_some()
            || self.delay.is_some()
            || self.timeout.is_some()
            || self.dump_max_length.is_some()
            || self.log.is_some()
            || self.config_file.is_some()
    }
}

struct Vars<'a> {
    prefix: &'a str,
}

impl Vars<'_> {
    /// Get environment variable with prefix
    fn get(&self, name: &str) -> Option<String> {
        env::var(format!("{}_{}", self.prefix, name)).ok()
    }

    /// Get environment variable and parse to type
    fn get_parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| v.trim().parse().ok())
    }

    /// Get environment variable as boolean
    fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| parse_bool(&v))
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "enabled"
    )
}

/// Builder for setting environment variables (useful for testing)
pub struct EnvBuilder {
    prefix: String,
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    /// Create a new environment builder
    pub fn new() -> Self {
        Self::with_prefix(ENV_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            vars: Vec::new(),
        }
    }

    fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars
            .push((format!("{}_{}", self.prefix, name), value.into()));
        self
    }

    pub fn enabled(self, enabled: bool) -> Self {
        self.var("ENABLE", enabled.to_string())
    }

    pub fn delay(self, delay_ms: u64) -> Self {
        self.var("DELAY", delay_ms.to_string())
    }

    pub fn timeout(self, timeout_ms: u64) -> Self {
        self.var("TIMEOUT", timeout_ms.to_string())
    }

    pub fn dump_max_length(self, max_length: usize) -> Self {
        self.var("DUMP_MAX_LENGTH", max_length.to_string())
    }

    pub fn log(self, level: impl Into<String>) -> Self {
        self.var("LOG", level)
    }

    pub fn config_file(self, path: impl Into<String>) -> Self {
        self.var("CONFIG", path)
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

impl Default for EnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Describe the recognized environment variables
pub fn env_help() -> String {
    [
        ("ENABLE", "Run suites at all (true/false)"),
        ("DELAY", "Default scheduler delay in milliseconds"),
        ("TIMEOUT", "Default per-case timeout in milliseconds"),
        ("DUMP_MAX_LENGTH", "Inline length limit of dumped values"),
        ("LOG", "Log level (trace, debug, info, warn, error)"),
        ("CONFIG", "Path to configuration file"),
    ]
    .iter()
    .map(|(name, help)| format!("  {:24} {}", format!("{ENV_PREFIX}_{name}"), help))
    .collect::<Vec<_>>()
    .join("\n")
}
