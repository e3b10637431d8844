//! ABOUTME: Provider abstraction - the narrow capability surface agents call through
//! ABOUTME: Concrete model-provider SDKs register an impl; the engine never sees SDK shapes

use async_trait::async_trait;
use lacquer_core::types::ToolDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// A single turn in the conversation handed to (and accumulated from) a
/// provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    #[must_use]
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// The last text block, used as a step's rendered output when the turn
    /// has no tool-use blocks.
    #[must_use]
    pub fn last_text(&self) -> Option<&str> {
        self.content.iter().rev().find_map(|block| match block {
            ContentBlock::Text(text) => Some(text.as_str()),
            ContentBlock::ToolUse { .. } | ContentBlock::ToolResult { .. } => None,
        })
    }

    #[must_use]
    pub fn tool_uses(&self) -> Vec<&ToolUse> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse(tool_use) => Some(tool_use),
                ContentBlock::Text(_) | ContentBlock::ToolResult { .. } => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One content block. Maps in both directions to each provider's native
/// wire shape (OpenAI-style `{id, name, arguments}`, Anthropic-style
/// `{id, name, input}` + `tool_result` blocks) by the provider impl, never
/// by engine code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(String),
    ToolUse(ToolUse),
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// A request to generate the next conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolDescriptor>,
}

/// Token usage for a single provider call; the agent loop accumulates these
/// across turns into the step's [`TokenUsage`] total.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    #[must_use]
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn accumulate(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// The response to a [`GenerateRequest`]: the assistant's turn plus usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub message: Message,
    pub usage: TokenUsage,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider '{provider}' call failed: {message}")]
    Call { provider: String, message: String },
    #[error("provider '{provider}' rejected the request: {message}")]
    InvalidRequest { provider: String, message: String },
    #[error("unknown provider '{name}'")]
    UnknownProvider { name: String },
}

/// The capability surface every concrete model-provider SDK implements.
/// `local` providers run their own tool-execution loop internally (the
/// agent conversation loop calls them exactly once per step).
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this provider handles its own tool-calling internally; the
    /// conversation loop runs exactly one turn against such a provider.
    fn is_local(&self) -> bool {
        false
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError>;
}

/// Per-(provider,model) configuration resolved from `agents:` entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub model: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    #[serde(default)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            endpoint: None,
            api_key: None,
            custom: HashMap::new(),
        }
    }
}

type ProviderFactory = Box<dyn Fn(ProviderConfig) -> Arc<dyn Provider> + Send + Sync>;

/// Registry of provider factories, keyed by provider name (`anthropic`,
/// `openai`, `local`, ...). Concrete SDKs register themselves here; the
/// engine only ever resolves through this registry.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: RwLock<HashMap<String, ProviderFactory>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(ProviderConfig) -> Arc<dyn Provider> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .await
            .insert(name.into(), Box::new(factory));
    }

    pub async fn create(&self, config: ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
        let factories = self.factories.read().await;
        let factory = factories
            .get(&config.name)
            .ok_or_else(|| ProviderError::UnknownProvider {
                name: config.name.clone(),
            })?;
        Ok(factory(config))
    }

    pub async fn available(&self) -> Vec<String> {
        self.factories.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_text_ignores_tool_blocks() {
        let msg = Message::assistant(vec![
            ContentBlock::Text("thinking".into()),
            ContentBlock::ToolUse(ToolUse {
                id: "1".into(),
                name: "calc".into(),
                input: serde_json::json!({}),
            }),
            ContentBlock::Text("the answer is 5".into()),
        ]);
        assert_eq!(msg.last_text(), Some("the answer is 5"));
    }

    #[test]
    fn tool_uses_extracts_all_blocks() {
        let msg = Message::assistant(vec![
            ContentBlock::ToolUse(ToolUse {
                id: "1".into(),
                name: "a".into(),
                input: serde_json::json!(null),
            }),
            ContentBlock::ToolUse(ToolUse {
                id: "2".into(),
                name: "b".into(),
                input: serde_json::json!(null),
            }),
        ]);
        assert_eq!(msg.tool_uses().len(), 2);
    }

    #[tokio::test]
    async fn registry_round_trips_a_factory() {
        struct Noop;
        #[async_trait]
        impl Provider for Noop {
            fn name(&self) -> &str {
                "noop"
            }
            async fn generate(
                &self,
                _request: GenerateRequest,
            ) -> Result<GenerateResponse, ProviderError> {
                Ok(GenerateResponse {
                    message: Message::assistant(vec![ContentBlock::Text("ok".into())]),
                    usage: TokenUsage::default(),
                })
            }
        }

        let registry = ProviderRegistry::new();
        registry.register("noop", |_cfg| Arc::new(Noop)).await;
        let provider = registry
            .create(ProviderConfig::new("noop", "noop-model"))
            .await
            .unwrap();
        assert_eq!(provider.name(), "noop");
    }

    #[tokio::test]
    async fn unknown_provider_is_an_error() {
        let registry = ProviderRegistry::new();
        let err = registry
            .create(ProviderConfig::new("nope", "m"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownProvider { .. }));
    }
}
