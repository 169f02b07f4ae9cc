//! Harness configuration
//!
//! Defaults, then an optional YAML file, then `DOMPROBE_*` environment
//! variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::result::{ProbeError, ProbeResult};
use crate::wait::{
    RetryOptions, WaitOptions, DEFAULT_GRACE_DELAY_MS, DEFAULT_MAX_ITERATIONS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};

/// Default wait timeout override
pub const ENV_TIMEOUT_MS: &str = "DOMPROBE_TIMEOUT_MS";
/// Poll interval override
pub const ENV_POLL_MS: &str = "DOMPROBE_POLL_MS";
/// Grace delay override
pub const ENV_GRACE_MS: &str = "DOMPROBE_GRACE_MS";
/// Retry bound override
pub const ENV_MAX_ITERATIONS: &str = "DOMPROBE_MAX_ITERATIONS";
/// Warning capture override
pub const ENV_CAPTURE_WARNINGS: &str = "DOMPROBE_CAPTURE_WARNINGS";

/// Harness-wide defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Wait timeout when a step gives none
    pub default_timeout_ms: u64,
    /// Poll interval when a step gives none
    pub poll_interval_ms: u64,
    /// Fixed delay after an action with no explicit wait
    pub grace_delay_ms: u64,
    /// Bound for action-then-check loops
    pub max_iterations: usize,
    /// Record console warnings as well as errors
    pub capture_warnings: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            grace_delay_ms: DEFAULT_GRACE_DELAY_MS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            capture_warnings: true,
        }
    }
}

impl HarnessConfig {
    /// Defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default timeout
    #[must_use]
    pub const fn with_timeout(mut self, ms: u64) -> Self {
        self.default_timeout_ms = ms;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the grace delay
    #[must_use]
    pub const fn with_grace_delay(mut self, ms: u64) -> Self {
        self.grace_delay_ms = ms;
        self
    }

    /// Set the retry bound
    #[must_use]
    pub const fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Enable or disable warning capture
    #[must_use]
    pub const fn with_capture_warnings(mut self, capture: bool) -> Self {
        self.capture_warnings = capture;
        self
    }

    /// Parse YAML; missing keys keep their defaults
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        let config: Self = crate::yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file
    pub fn load(path: impl AsRef<Path>) -> ProbeResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> ProbeResult<Self> {
        Self::default().apply_env()
    }

    /// Apply `DOMPROBE_*` overrides from the process environment
    pub fn apply_env(self) -> ProbeResult<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> ProbeResult<Self> {
        if let Some(v) = parse_var(&lookup, ENV_TIMEOUT_MS)? {
            self.default_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_POLL_MS)? {
            self.poll_interval_ms = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_GRACE_MS)? {
            self.grace_delay_ms = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_MAX_ITERATIONS)? {
            self.max_iterations = v;
        }
        if let Some(raw) = lookup(ENV_CAPTURE_WARNINGS) {
            self.capture_warnings = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(ProbeError::config(format!(
                        "{ENV_CAPTURE_WARNINGS}: expected a boolean, got {other:?}"
                    )))
                }
            };
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject settings that would make every wait meaningless
    pub fn validate(&self) -> ProbeResult<()> {
        if self.default_timeout_ms == 0 {
            return Err(ProbeError::config("default_timeout_ms must be greater than 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ProbeError::config("poll_interval_ms must be greater than 0"));
        }
        if self.max_iterations == 0 {
            return Err(ProbeError::config("max_iterations must be greater than 0"));
        }
        Ok(())
    }

    /// Wait options from the defaults
    #[must_use]
    pub const fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout_ms: self.default_timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
        }
    }

    /// Retry options from the defaults
    #[must_use]
    pub const fn retry_options(&self) -> RetryOptions {
        RetryOptions {
            max_iterations: self.max_iterations,
            settle_ms: self.grace_delay_ms,
        }
    }

    /// Serialize as YAML
    pub fn to_yaml(&self) -> ProbeResult<String> {
        Ok(crate::yaml::to_string(self)?)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> ProbeResult<Option<T>> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ProbeError::config(format!("{key}: expected a number, got {raw:?}")))
        })
        .transpose()
}
