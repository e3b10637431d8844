//! ABOUTME: Configuration merging - later layers override earlier ones, field by field
//! ABOUTME: Mirrors the teacher's override-if-non-default merge strategy, scaled to this crate's size

use crate::{AgentConfig, EngineConfig, ProviderDefaultsConfig, SandboxConfig, SchedulerConfig};

/// Apply `source` on top of `base`, with `source` values taking precedence
/// wherever they differ from the compiled-in default.
pub fn merge_config(base: &mut EngineConfig, source: EngineConfig) {
    merge_scheduler(&mut base.scheduler, source.scheduler);
    merge_agent(&mut base.agent, source.agent);
    merge_sandbox(&mut base.sandbox, source.sandbox);
    merge_providers(&mut base.providers, source.providers);
}

fn merge_scheduler(base: &mut SchedulerConfig, source: SchedulerConfig) {
    let default = SchedulerConfig::default();
    if source.max_concurrent_steps != default.max_concurrent_steps {
        base.max_concurrent_steps = source.max_concurrent_steps;
    }
    if source.default_timeout_secs != default.default_timeout_secs {
        base.default_timeout_secs = source.default_timeout_secs;
    }
}

fn merge_agent(base: &mut AgentConfig, source: AgentConfig) {
    let default = AgentConfig::default();
    if source.max_turns != default.max_turns {
        base.max_turns = source.max_turns;
    }
    if (source.default_temperature - default.default_temperature).abs() > f64::EPSILON {
        base.default_temperature = source.default_temperature;
    }
}

fn merge_sandbox(base: &mut SandboxConfig, source: SandboxConfig) {
    let default = SandboxConfig::default();
    if source.max_output_bytes != default.max_output_bytes {
        base.max_output_bytes = source.max_output_bytes;
    }
    if source.cache_dir.is_some() {
        base.cache_dir = source.cache_dir;
    }
}

fn merge_providers(base: &mut ProviderDefaultsConfig, source: ProviderDefaultsConfig) {
    if source.provider.is_some() {
        base.provider = source.provider;
    }
    if source.model.is_some() {
        base.model = source.model;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_overrides_non_default_scheduler_fields() {
        let mut base = SchedulerConfig::default();
        let source = SchedulerConfig {
            max_concurrent_steps: 10,
            ..SchedulerConfig::default()
        };
        merge_scheduler(&mut base, source);
        assert_eq!(base.max_concurrent_steps, 10);
        assert_eq!(base.default_timeout_secs, SchedulerConfig::default().default_timeout_secs);
    }

    #[test]
    fn merge_providers_overrides_only_set_fields() {
        let mut base = ProviderDefaultsConfig {
            provider: Some("anthropic".into()),
            model: Some("claude".into()),
        };
        let source = ProviderDefaultsConfig {
            provider: None,
            model: Some("claude-new".into()),
        };
        merge_providers(&mut base, source);
        assert_eq!(base.provider.as_deref(), Some("anthropic"));
        assert_eq!(base.model.as_deref(), Some("claude-new"));
    }
}
