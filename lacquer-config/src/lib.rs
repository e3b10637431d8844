//! ABOUTME: Layered configuration for engine-wide tunables
//! ABOUTME: TOML base + env-var overrides, merged the way the teacher's layered config does it

mod env;
mod merge;

pub use env::EnvOverrideError;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// `MaxConcurrentSteps` default per §5 of the engine spec.
pub const DEFAULT_MAX_CONCURRENT_STEPS: usize = 3;

/// `DefaultTimeout` default per §5 of the engine spec (30 minutes).
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 30 * 60;

/// `maxTurns` default per §4.7 of the engine spec.
pub const DEFAULT_MAX_TURNS: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    EnvOverride(#[from] EnvOverrideError),
}

/// Scheduler tunables (C8): concurrency bound and per-step timeout default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub max_concurrent_steps: usize,
    pub default_timeout_secs: u64,
}

impl SchedulerConfig {
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_steps: DEFAULT_MAX_CONCURRENT_STEPS,
            default_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
        }
    }
}

/// Agent conversation loop tunables (C7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub max_turns: u32,
    pub default_temperature: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            default_temperature: 0.7,
        }
    }
}

/// Sandbox limits applied to script/container step runners (C6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Cap on the stdout/stderr bytes read back from a script/container
    /// invocation before it's treated as `MalformedOutput`.
    pub max_output_bytes: usize,
    /// Directory used to cache compiled Go binaries (content-hash keyed).
    pub cache_dir: Option<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_output_bytes: 10 * 1024 * 1024,
            cache_dir: None,
        }
    }
}

/// Default provider/model selection when a workflow's `agents:` entry
/// doesn't fully specify one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderDefaultsConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
}

impl Default for ProviderDefaultsConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
        }
    }
}

/// Top-level engine configuration, assembled by layering (in increasing
/// precedence): compiled-in defaults, an optional TOML file, then process
/// environment variables (`LACQUER_*`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub agent: AgentConfig,
    pub sandbox: SandboxConfig,
    pub providers: ProviderDefaultsConfig,
}

impl EngineConfig {
    /// Load the compiled-in defaults, no file, no env overrides.
    #[must_use]
    pub fn defaults() -> Self {
        Self::default()
    }

    /// Load from a TOML file on disk, then apply `LACQUER_*` env overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let text = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text, &path_ref.display().to_string())
    }

    /// Parse a TOML document directly (used by tests and by callers that
    /// already have the file contents in memory), then apply env overrides.
    pub fn from_toml_str(text: &str, path_for_errors: &str) -> Result<Self, ConfigError> {
        let file_config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path_for_errors.to_string(),
            source,
        })?;
        let mut merged = Self::default();
        merge::merge_config(&mut merged, file_config);
        env::apply_env_overrides(&mut merged)?;
        Ok(merged)
    }

    /// Load using only env overrides on top of the compiled-in defaults
    /// (no config file present on disk, which is a valid deployment mode).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        env::apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Merge another layer (e.g. a workflow-local override file) on top of
    /// this one, returning the combined configuration.
    #[must_use]
    pub fn merged_with(mut self, other: Self) -> Self {
        merge::merge_config(&mut self, other);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_constants() {
        let config = EngineConfig::defaults();
        assert_eq!(config.scheduler.max_concurrent_steps, 3);
        assert_eq!(config.scheduler.default_timeout(), Duration::from_secs(1800));
        assert_eq!(config.agent.max_turns, 10);
    }

    #[test]
    fn partial_toml_file_only_overrides_named_fields() {
        let toml = r#"
[scheduler]
max_concurrent_steps = 8
"#;
        let config = EngineConfig::from_toml_str(toml, "<test>").unwrap();
        assert_eq!(config.scheduler.max_concurrent_steps, 8);
        assert_eq!(config.scheduler.default_timeout_secs, DEFAULT_STEP_TIMEOUT_SECS);
        assert_eq!(config.agent.max_turns, DEFAULT_MAX_TURNS);
    }

    #[test]
    fn load_missing_file_is_a_read_error() {
        let err = EngineConfig::load("/nonexistent/lacquer.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn merged_with_lets_later_layer_win() {
        let base = EngineConfig::defaults();
        let mut override_layer = EngineConfig::default();
        override_layer.scheduler.max_concurrent_steps = 16;
        let merged = base.merged_with(override_layer);
        assert_eq!(merged.scheduler.max_concurrent_steps, 16);
    }
}
