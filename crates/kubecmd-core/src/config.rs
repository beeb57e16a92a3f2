use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;

pub const POOL_SLOTS_VAR: &str = "KUBECMD_POOL_SLOTS";
pub const QUEUE_CAPACITY_VAR: &str = "KUBECMD_QUEUE_CAPACITY";
pub const EVENT_CAPACITY_VAR: &str = "KUBECMD_EVENT_CAPACITY";

/// Each slot is a spawned worker task.
pub const MAX_POOL_SLOTS: usize = 4096;
/// Largest buffer a tokio channel accepts.
pub const MAX_CHANNEL_CAPACITY: usize = Semaphore::MAX_PERMITS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: cannot parse {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },

    #[error("{var} must be at most {max}, got {value}")]
    TooLarge {
        var: &'static str,
        value: usize,
        max: usize,
    },
}

/// Sizing of the dispatcher queue, the delay pool and the event channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of tasks waiting out a delay at the same time.
    pub pool_slots: usize,
    /// Capacity of the dispatcher input queue.
    pub queue_capacity: usize,
    /// Capacity of the round event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_slots: 10,
            queue_capacity: 1024,
            event_capacity: 256,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from `lookup`, falling back to defaults for unset variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            pool_slots: parse_var(&lookup, POOL_SLOTS_VAR)?.unwrap_or(defaults.pool_slots),
            queue_capacity: parse_var(&lookup, QUEUE_CAPACITY_VAR)?
                .unwrap_or(defaults.queue_capacity),
            event_capacity: parse_var(&lookup, EVENT_CAPACITY_VAR)?
                .unwrap_or(defaults.event_capacity),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(POOL_SLOTS_VAR, self.pool_slots, MAX_POOL_SLOTS)?;
        check_range(QUEUE_CAPACITY_VAR, self.queue_capacity, MAX_CHANNEL_CAPACITY)?;
        check_range(EVENT_CAPACITY_VAR, self.event_capacity, MAX_CHANNEL_CAPACITY)
    }
}

fn check_range(var: &'static str, value: usize, max: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero { var });
    }
    if value > max {
        return Err(ConfigError::TooLarge { var, value, max });
    }
    Ok(())
}

/// Reads `var` through `lookup` and parses it; `Ok(None)` when unset.
pub fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = SchedulerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.pool_slots, 10);
    }

    #[test]
    fn overrides_from_lookup() {
        let config = SchedulerConfig::from_lookup(lookup(&[
            (POOL_SLOTS_VAR, "3"),
            (QUEUE_CAPACITY_VAR, " 16 "),
        ]))
        .unwrap();
        assert_eq!(config.pool_slots, 3);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn rejects_garbage_and_zero() {
        let err = SchedulerConfig::from_lookup(lookup(&[(POOL_SLOTS_VAR, "ten")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: POOL_SLOTS_VAR,
                value: "ten".into()
            }
        );

        let err = SchedulerConfig::from_lookup(lookup(&[(POOL_SLOTS_VAR, "0")])).unwrap_err();
        assert_eq!(err, ConfigError::Zero { var: POOL_SLOTS_VAR });
    }

    #[test]
    fn rejects_oversized_pool_and_channels() {
        let huge = usize::MAX.to_string();
        let err =
            SchedulerConfig::from_lookup(lookup(&[(POOL_SLOTS_VAR, huge.as_str())])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::TooLarge {
                var: POOL_SLOTS_VAR,
                value: usize::MAX,
                max: MAX_POOL_SLOTS,
            }
        );

        let config = SchedulerConfig {
            event_capacity: MAX_CHANNEL_CAPACITY + 1,
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooLarge {
                var: EVENT_CAPACITY_VAR,
                ..
            })
        ));

        let config = SchedulerConfig {
            pool_slots: MAX_POOL_SLOTS,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }
}
