//! ABOUTME: `LACQUER_*` environment-variable overrides, the highest-precedence config layer
//! ABOUTME: Mirrors the teacher's env_registry.rs pattern: one named var per overridable field

use crate::EngineConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvOverrideError {
    #[error("{var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

const MAX_CONCURRENT_STEPS: &str = "LACQUER_MAX_CONCURRENT_STEPS";
const DEFAULT_TIMEOUT_SECS: &str = "LACQUER_DEFAULT_TIMEOUT_SECS";
const MAX_TURNS: &str = "LACQUER_MAX_TURNS";
const PROVIDER: &str = "LACQUER_PROVIDER";
const MODEL: &str = "LACQUER_MODEL";
const SANDBOX_CACHE_DIR: &str = "LACQUER_SANDBOX_CACHE_DIR";

/// Apply every recognized `LACQUER_*` variable found in the process
/// environment on top of `config`, in place.
pub fn apply_env_overrides(config: &mut EngineConfig) -> Result<(), EnvOverrideError> {
    if let Some(value) = read(MAX_CONCURRENT_STEPS) {
        config.scheduler.max_concurrent_steps = parse_usize(MAX_CONCURRENT_STEPS, &value)?;
    }
    if let Some(value) = read(DEFAULT_TIMEOUT_SECS) {
        config.scheduler.default_timeout_secs = parse_u64(DEFAULT_TIMEOUT_SECS, &value)?;
    }
    if let Some(value) = read(MAX_TURNS) {
        config.agent.max_turns = parse_u32(MAX_TURNS, &value)?;
    }
    if let Some(value) = read(PROVIDER) {
        config.providers.provider = Some(value);
    }
    if let Some(value) = read(MODEL) {
        config.providers.model = Some(value);
    }
    if let Some(value) = read(SANDBOX_CACHE_DIR) {
        config.sandbox.cache_dir = Some(value);
    }
    Ok(())
}

fn read(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn parse_usize(var: &'static str, value: &str) -> Result<usize, EnvOverrideError> {
    value.parse().map_err(|_| EnvOverrideError::InvalidValue {
        var,
        expected: "a non-negative integer",
        value: value.to_string(),
    })
}

fn parse_u64(var: &'static str, value: &str) -> Result<u64, EnvOverrideError> {
    value.parse().map_err(|_| EnvOverrideError::InvalidValue {
        var,
        expected: "a non-negative integer",
        value: value.to_string(),
    })
}

fn parse_u32(var: &'static str, value: &str) -> Result<u32, EnvOverrideError> {
    value.parse().map_err(|_| EnvOverrideError::InvalidValue {
        var,
        expected: "a non-negative integer",
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_vars_leave_defaults_untouched() {
        let mut config = EngineConfig::default();
        apply_env_overrides(&mut config).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn invalid_numeric_value_is_reported() {
        std::env::set_var(MAX_TURNS, "not-a-number");
        let mut config = EngineConfig::default();
        let result = apply_env_overrides(&mut config);
        std::env::remove_var(MAX_TURNS);
        assert!(matches!(result, Err(EnvOverrideError::InvalidValue { .. })));
    }
}
