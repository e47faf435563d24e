//! Backend trait: the abstraction over text-generation engines.
//!
//! A Backend takes a fully assembled prompt string plus sampling parameters
//! and returns the raw completion text. It knows nothing about turns,
//! history or context snippets.
//!
//! Implementations: local GGUF inference (Candle), OpenAI-compatible
//! text-completion servers (llama.cpp server, vLLM, Ollama).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::BackendError;

/// Per-call sampling parameters chosen by the front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Temperature (0.0 = deterministic, higher = more creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on generated tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Key into the backend registry
    pub model: String,
}

impl SamplingConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            model: model.into(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    150
}

/// A single generation call as seen by a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The complete prompt text
    pub prompt: String,

    /// Temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Generation halts at the first occurrence of any of these.
    /// The stop sequence itself is not part of the completion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

/// Why generation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// A stop sequence or end-of-sequence token was produced
    Stop,
    /// The token budget ran out
    Length,
}

/// Raw completion returned by a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text, untrimmed
    pub text: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// A completion carrying only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
            finish_reason: None,
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Backend trait.
///
/// Every generation engine implements this trait. The turn runner calls
/// `generate()` without knowing which engine serves the model.
#[async_trait]
pub trait Backend: Send + Sync {
    /// A human-readable name for this backend (the configured model or server name).
    fn name(&self) -> &str;

    /// Generate a completion for the given prompt.
    async fn generate(&self, request: GenerationRequest) -> std::result::Result<Completion, BackendError>;

    /// Health check: is the engine ready to serve?
    async fn health_check(&self) -> std::result::Result<bool, BackendError> {
        Ok(true)
    }
}
