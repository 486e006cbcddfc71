//! Runtime settings loaded from environment variables.
//!
//! Every setting has a default, so an empty environment is valid. A variable
//! that is present but not a number is a configuration error rather than a
//! silent fallback.

use crate::core::retry::RetryPolicy;
use crate::errors::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

/// Tunables for retries, per-operation timeouts and the idle-binding sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub retry_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Upper bound applied to every service call
    pub operation_timeout: Duration,
    /// Bindings older than this are released by the idle sweep
    pub idle_unbind_after: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_base_delay_ms: 25,
            retry_max_delay_ms: 400,
            operation_timeout: Duration::from_millis(5_000),
            idle_unbind_after: Duration::from_secs(20 * 60),
        }
    }
}

impl RuntimeSettings {
    /// Reads `CANTEEN_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let timeout_ms: u64 = parse_var(&lookup, "CANTEEN_OPERATION_TIMEOUT_MS")?
            .unwrap_or(5_000);
        let idle_minutes: u64 = parse_var(&lookup, "CANTEEN_IDLE_UNBIND_MINUTES")?.unwrap_or(20);
        let idle_secs = idle_minutes.checked_mul(60).ok_or_else(|| Error::Config {
            message: format!("CANTEEN_IDLE_UNBIND_MINUTES={idle_minutes} is too large"),
        })?;

        Ok(Self {
            retry_attempts: parse_var(&lookup, "CANTEEN_RETRY_ATTEMPTS")?
                .unwrap_or(defaults.retry_attempts),
            retry_base_delay_ms: parse_var(&lookup, "CANTEEN_RETRY_BASE_DELAY_MS")?
                .unwrap_or(defaults.retry_base_delay_ms),
            retry_max_delay_ms: parse_var(&lookup, "CANTEEN_RETRY_MAX_DELAY_MS")?
                .unwrap_or(defaults.retry_max_delay_ms),
            operation_timeout: Duration::from_millis(timeout_ms),
            idle_unbind_after: Duration::from_secs(idle_secs),
        })
    }

    /// Retry policy described by these settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            self.retry_base_delay_ms,
            self.retry_max_delay_ms,
            0.2,
        )
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| Error::Config {
                message: format!("{key}={raw:?} is invalid: {e}"),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let settings = RuntimeSettings::from_lookup(|_| None).unwrap();
        assert_eq!(settings, RuntimeSettings::default());
        assert_eq!(settings.retry_policy().max_attempts, 3);
        assert_eq!(settings.idle_unbind_after, Duration::from_secs(1200));
    }

    #[test]
    fn test_overrides_are_applied() {
        let settings = RuntimeSettings::from_lookup(lookup_from(&[
            ("CANTEEN_RETRY_ATTEMPTS", "5"),
            ("CANTEEN_OPERATION_TIMEOUT_MS", " 250 "),
            ("CANTEEN_IDLE_UNBIND_MINUTES", "15"),
        ]))
        .unwrap();
        assert_eq!(settings.retry_attempts, 5);
        assert_eq!(settings.operation_timeout, Duration::from_millis(250));
        assert_eq!(settings.idle_unbind_after, Duration::from_secs(900));
        assert_eq!(settings.retry_base_delay_ms, 25);
    }

    #[test]
    fn test_malformed_value_is_config_error() {
        let result =
            RuntimeSettings::from_lookup(lookup_from(&[("CANTEEN_RETRY_ATTEMPTS", "three")]));
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_idle_minutes_overflowing_seconds_is_config_error() {
        let max = u64::MAX.to_string();
        let lookup = lookup_from(&[("CANTEEN_IDLE_UNBIND_MINUTES", max.as_str())]);
        let result = RuntimeSettings::from_lookup(lookup);
        assert!(matches!(result, Err(Error::Config { .. })));

        // the largest whole-minute value still converts
        let largest = (u64::MAX / 60).to_string();
        let lookup = lookup_from(&[("CANTEEN_IDLE_UNBIND_MINUTES", largest.as_str())]);
        let settings = RuntimeSettings::from_lookup(lookup).unwrap();
        assert_eq!(settings.idle_unbind_after.as_secs(), (u64::MAX / 60) * 60);
    }
}
