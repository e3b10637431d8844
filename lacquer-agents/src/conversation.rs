//! ABOUTME: The multi-turn model+tool loop: generate, detect tool-use, dispatch, repeat
//! ABOUTME: A `local` provider (is_local() == true) is called exactly once, no tool loop driven here

use lacquer_core::error::ExecutionError;
use lacquer_core::types::ToolDescriptor;
use lacquer_providers::{ContentBlock, GenerateRequest, Message, Provider, TokenUsage};
use lacquer_tools::{ToolCallContext, ToolRegistry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default per-step turn budget (distilled spec §4.7), overridable by an
/// agent's declared config.
pub const DEFAULT_MAX_TURNS: u32 = 10;

/// Everything the loop needs for a single step invocation.
pub struct AgentRunRequest<'a> {
    pub agent_name: String,
    pub step_id: String,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolDescriptor>,
    pub max_turns: u32,
    pub provider: Arc<dyn Provider>,
    pub tool_registry: &'a ToolRegistry,
}

/// The loop's final outcome: the last assistant text turn plus accumulated
/// token usage across every provider call made for this step.
#[derive(Debug, Clone)]
pub struct AgentRunOutcome {
    pub response: String,
    pub usage: TokenUsage,
    pub turns_used: u32,
}

pub async fn run(
    request: AgentRunRequest<'_>,
    cancellation: &CancellationToken,
) -> Result<AgentRunOutcome, ExecutionError> {
    let mut messages = vec![Message::user(request.prompt.clone())];
    let mut usage = TokenUsage::default();

    if request.provider.is_local() {
        let response = generate(&request, &messages, cancellation).await?;
        usage.accumulate(response.usage);
        let text = response.message.last_text().unwrap_or_default().to_string();
        return Ok(AgentRunOutcome { response: text, usage, turns_used: 1 });
    }

    for turn in 1..=request.max_turns {
        let response = generate(&request, &messages, cancellation).await?;
        usage.accumulate(response.usage);

        let tool_uses = response.message.tool_uses();
        if tool_uses.is_empty() {
            let text = response.message.last_text().unwrap_or_default().to_string();
            return Ok(AgentRunOutcome { response: text, usage, turns_used: turn });
        }

        let tool_calls: Vec<_> = tool_uses.into_iter().cloned().collect();
        messages.push(response.message);

        let ctx = ToolCallContext {
            workflow_id: request.agent_name.clone(),
            step_id: request.step_id.clone(),
            env: std::collections::HashMap::new(),
        };

        let mut result_blocks = Vec::with_capacity(tool_calls.len());
        for tool_use in &tool_calls {
            let outcome = request
                .tool_registry
                .call(&tool_use.name, tool_use.input.clone(), &ctx)
                .await;
            let (content, is_error) = match outcome {
                Ok(value) => (value.to_string(), false),
                Err(err) => (err.to_string(), true),
            };
            result_blocks.push(ContentBlock::ToolResult {
                tool_use_id: tool_use.id.clone(),
                content,
                is_error,
            });
        }
        messages.push(Message { role: lacquer_providers::Role::Tool, content: result_blocks });
    }

    Err(ExecutionError::MaxTurnsExceeded {
        agent: request.agent_name.clone(),
        max_turns: request.max_turns,
    })
}

async fn generate(
    request: &AgentRunRequest<'_>,
    messages: &[Message],
    cancellation: &CancellationToken,
) -> Result<lacquer_providers::GenerateResponse, ExecutionError> {
    let generate_request = GenerateRequest {
        system_prompt: request.system_prompt.clone(),
        messages: messages.to_vec(),
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: request.max_tokens,
        tools: request.tools.clone(),
    };

    tokio::select! {
        biased;
        () = cancellation.cancelled() => Err(ExecutionError::Cancelled { step: request.step_id.clone() }),
        result = request.provider.generate(generate_request) => {
            result.map_err(|err| ExecutionError::Provider { message: err.to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lacquer_providers::{GenerateResponse, ProviderError, ToolUse};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedProvider {
        turns: Mutex<Vec<GenerateResponse>>,
        local: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        fn is_local(&self) -> bool {
            self.local
        }
        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            self.turns
                .lock()
                .unwrap()
                .get(index)
                .cloned()
                .ok_or_else(|| ProviderError::Call { provider: "scripted".into(), message: "exhausted script".into() })
        }
    }

    fn text_response(text: &str) -> GenerateResponse {
        GenerateResponse {
            message: Message::assistant(vec![ContentBlock::Text(text.to_string())]),
            usage: TokenUsage { prompt_tokens: 10, completion_tokens: 5 },
        }
    }

    fn make_request<'a>(provider: Arc<dyn Provider>, registry: &'a ToolRegistry) -> AgentRunRequest<'a> {
        AgentRunRequest {
            agent_name: "researcher".into(),
            step_id: "fetch".into(),
            system_prompt: None,
            prompt: "go".into(),
            temperature: None,
            top_p: None,
            max_tokens: None,
            tools: vec![],
            max_turns: DEFAULT_MAX_TURNS,
            provider,
            tool_registry: registry,
        }
    }

    #[tokio::test]
    async fn local_provider_runs_exactly_one_turn() {
        let provider = Arc::new(ScriptedProvider {
            turns: Mutex::new(vec![text_response("done")]),
            local: true,
            calls: AtomicUsize::new(0),
        });
        let registry = ToolRegistry::new();
        let request = make_request(provider, &registry);
        let outcome = run(request, &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.response, "done");
        assert_eq!(outcome.turns_used, 1);
    }

    #[tokio::test]
    async fn non_local_provider_without_tool_use_stops_after_first_turn() {
        let provider = Arc::new(ScriptedProvider {
            turns: Mutex::new(vec![text_response("final answer")]),
            local: false,
            calls: AtomicUsize::new(0),
        });
        let registry = ToolRegistry::new();
        let request = make_request(provider, &registry);
        let outcome = run(request, &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.response, "final answer");
        assert_eq!(outcome.turns_used, 1);
    }

    #[tokio::test]
    async fn tool_use_turn_dispatches_then_continues_the_loop() {
        let tool_call = Message::assistant(vec![ContentBlock::ToolUse(ToolUse {
            id: "call-1".into(),
            name: "echo".into(),
            input: serde_json::json!({"value": 1}),
        })]);
        let provider = Arc::new(ScriptedProvider {
            turns: Mutex::new(vec![
                GenerateResponse { message: tool_call, usage: TokenUsage::default() },
                text_response("used the tool"),
            ]),
            local: false,
            calls: AtomicUsize::new(0),
        });

        struct Echo(ToolDescriptor);
        #[async_trait]
        impl lacquer_tools::ToolHandler for Echo {
            fn descriptor(&self) -> &ToolDescriptor {
                &self.0
            }
            async fn call(
                &self,
                input: serde_json::Value,
                _ctx: &ToolCallContext,
            ) -> Result<serde_json::Value, lacquer_tools::ToolError> {
                Ok(input)
            }
        }
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo(ToolDescriptor::new("echo", "echoes", serde_json::json!({})))));

        let request = make_request(provider, &registry);
        let outcome = run(request, &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.response, "used the tool");
        assert_eq!(outcome.turns_used, 2);
    }

    #[tokio::test]
    async fn exhausting_max_turns_on_repeated_tool_use_is_an_error() {
        let tool_call = || {
            Message::assistant(vec![ContentBlock::ToolUse(ToolUse {
                id: "x".into(),
                name: "echo".into(),
                input: serde_json::json!({}),
            })])
        };
        let scripted: Vec<_> = (0..3)
            .map(|_| GenerateResponse { message: tool_call(), usage: TokenUsage::default() })
            .collect();
        let provider = Arc::new(ScriptedProvider { turns: Mutex::new(scripted), local: false, calls: AtomicUsize::new(0) });

        struct Echo(ToolDescriptor);
        #[async_trait]
        impl lacquer_tools::ToolHandler for Echo {
            fn descriptor(&self) -> &ToolDescriptor {
                &self.0
            }
            async fn call(&self, input: serde_json::Value, _ctx: &ToolCallContext) -> Result<serde_json::Value, lacquer_tools::ToolError> {
                Ok(input)
            }
        }
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo(ToolDescriptor::new("echo", "", serde_json::json!({})))));

        let mut request = make_request(provider, &registry);
        request.max_turns = 3;
        let err = run(request, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::MaxTurnsExceeded { max_turns: 3, .. }));
    }
}
