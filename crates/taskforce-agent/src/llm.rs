use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskforce_core::TaskforceResult;

/// A single generation request sent to the LLM invocation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Agent identity and instructions.
    pub system_prompt: String,
    /// The task prompt, including upstream context.
    pub user_prompt: String,
    /// Model selector.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Token accounting reported by the LLM invocation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub input_tokens: u64,
    /// Tokens produced by the completion.
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Accumulate another usage record into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// A completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateReply {
    /// The generated text.
    pub content: String,
    /// Token accounting for this call.
    #[serde(default)]
    pub usage: TokenUsage,
}

/// The external text-generation collaborator.
///
/// Transport, authentication, and provider error mapping are the
/// implementor's concern; the engine only sees [`GenerateReply`] or an
/// error.
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Produce a completion for the given request.
    async fn generate(&self, request: GenerateRequest) -> TaskforceResult<GenerateReply>;
}
