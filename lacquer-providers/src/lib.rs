//! ABOUTME: Model-provider capability surface for the lacquer workflow engine
//! ABOUTME: Concrete provider SDKs (Anthropic/OpenAI/local) are external collaborators; this crate
//! ABOUTME: only defines the Generate/Call surface and a registry concrete providers plug into

pub mod abstraction;
pub mod mock;

pub use abstraction::{
    ContentBlock, GenerateRequest, GenerateResponse, Message, Provider, ProviderConfig,
    ProviderError, ProviderRegistry, Role, TokenUsage, ToolUse,
};
pub use mock::ScriptedProvider;
