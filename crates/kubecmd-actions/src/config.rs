use std::time::Duration;

use kubecmd_core::config::{ConfigError, parse_var};

pub const POLL_INTERVAL_VAR: &str = "KUBECMD_POD_POLL_INTERVAL_MS";
pub const MAX_WAIT_VAR: &str = "KUBECMD_POD_MAX_WAIT_SECS";

/// Timing of the pod recreation wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecreateConfig {
    /// Time between two "is the pod gone" checks.
    pub poll_interval: Duration,
    /// Give up once the pod has been polled for this long.
    pub max_wait: Duration,
}

impl Default for RecreateConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(360),
        }
    }
}

impl RecreateConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            poll_interval: parse_var::<u64, _>(&lookup, POLL_INTERVAL_VAR)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            max_wait: parse_var::<u64, _>(&lookup, MAX_WAIT_VAR)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_wait),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Zero {
                var: POLL_INTERVAL_VAR,
            });
        }
        Ok(())
    }
}
