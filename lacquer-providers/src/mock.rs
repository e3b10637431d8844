//! ABOUTME: Scripted provider test double for exercising the agent conversation loop
//! ABOUTME: Not a real model-provider SDK; returns a pre-programmed sequence of turns

use crate::abstraction::{GenerateRequest, GenerateResponse, Provider, ProviderError, TokenUsage};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Replays a fixed sequence of responses, one per `generate()` call, cycling
/// back to the last response if called more times than scripted.
pub struct ScriptedProvider {
    name: String,
    local: bool,
    responses: Mutex<Vec<GenerateResponse>>,
    calls: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedProvider {
    #[must_use]
    pub fn new(name: impl Into<String>, responses: Vec<GenerateResponse>) -> Self {
        Self {
            name: name.into(),
            local: false,
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_local(&self) -> bool {
        self.local
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let index = {
            let mut calls = self.calls.lock().await;
            calls.push(request);
            calls.len() - 1
        };
        let responses = self.responses.lock().await;
        let last = index.min(responses.len().saturating_sub(1));
        responses
            .get(last)
            .cloned()
            .ok_or_else(|| ProviderError::Call {
                provider: self.name.clone(),
                message: "no scripted responses configured".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstraction::{ContentBlock, Message};

    #[tokio::test]
    async fn replays_scripted_turns_in_order() {
        let provider = ScriptedProvider::new(
            "test",
            vec![
                GenerateResponse {
                    message: Message::assistant(vec![ContentBlock::Text("first".into())]),
                    usage: TokenUsage::default(),
                },
                GenerateResponse {
                    message: Message::assistant(vec![ContentBlock::Text("second".into())]),
                    usage: TokenUsage::default(),
                },
            ],
        );

        let req = GenerateRequest {
            system_prompt: None,
            messages: vec![],
            temperature: None,
            top_p: None,
            max_tokens: None,
            tools: vec![],
        };

        let r1 = provider.generate(req.clone()).await.unwrap();
        assert_eq!(r1.message.last_text(), Some("first"));
        let r2 = provider.generate(req).await.unwrap();
        assert_eq!(r2.message.last_text(), Some("second"));
        assert_eq!(provider.call_count().await, 2);
    }
}
