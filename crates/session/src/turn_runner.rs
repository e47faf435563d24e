//! The turn runner: one user utterance in, one normalized reply out.
//!
//! Each call is self-contained:
//!
//! 1. **Retrieve** a context snippet from the optional document
//! 2. **Assemble** persona + snippet + history + utterance into a prompt
//! 3. **Resolve** the backend for the requested model
//! 4. **Generate** with the stop marker and the next user tag as stop sequences
//! 5. **Normalize** the completion and append the turn to a copy of history
//!
//! Retrieval and assembly run even when the model is unavailable; the call
//! then fails before generation and the caller's history is left as it was.

use std::path::Path;
use std::sync::Arc;
use recurchat_backends::BackendRegistry;
use recurchat_config::AppConfig;
use recurchat_core::backend::{GenerationRequest, SamplingConfig};
use recurchat_core::error::{Error, Result};
use recurchat_core::persona::Persona;
use recurchat_core::turn::{History, Turn, STOP_MARKER};
use tracing::{debug, info, warn};

use crate::context::{estimate_tokens, ContextRetriever, PromptAssembler, USER_TAG};
use crate::normalize::normalize;

/// What a successful turn hands back to the front-end.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The caller's history with the new turn appended
    pub history: History,
    /// The context snippet used for this turn (empty if none)
    pub snippet: String,
    /// The normalized reply
    pub reply: String,
}

impl TurnOutcome {
    /// The turn that was just completed.
    pub fn turn(&self) -> Option<&Turn> {
        self.history.turns().last()
    }
}

/// The fixed stop sequences passed to every backend call.
pub fn stop_sequences() -> Vec<String> {
    vec![STOP_MARKER.to_string(), format!("\n{USER_TAG}")]
}

/// Orchestrates a single chat turn against the backend registry.
pub struct TurnRunner {
    /// Loaded backends, shared read-only
    registry: Arc<BackendRegistry>,

    /// System instruction at the head of every prompt
    persona: Persona,

    /// Snippet extraction settings
    retriever: ContextRetriever,

    /// Prompt layout settings
    assembler: PromptAssembler,
}

impl TurnRunner {
    /// Create a runner with the default persona, window, and full history.
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self {
            registry,
            persona: Persona::default(),
            retriever: ContextRetriever::default(),
            assembler: PromptAssembler::new(),
        }
    }

    /// Create a runner configured from the `[persona]`, `[context]`, and
    /// `[history]` sections.
    pub fn from_config(config: &AppConfig, registry: Arc<BackendRegistry>) -> Self {
        let persona = Persona::from_override(config.persona.system_prompt.as_deref());
        if !persona.mentions_stop_marker() {
            warn!(
                marker = STOP_MARKER,
                "persona.system_prompt never mentions the stop marker; replies may run on"
            );
        }

        Self::new(registry)
            .with_persona(persona)
            .with_window(config.context.window)
            .with_history_limit(config.history.max_turns)
    }

    /// Replace the system instruction.
    pub fn with_persona(mut self, persona: Persona) -> Self {
        self.persona = persona;
        self
    }

    /// Set the number of lines kept on each side of a match.
    pub fn with_window(mut self, window: usize) -> Self {
        self.retriever = ContextRetriever::new(window);
        self
    }

    /// Cap how many past turns are sent to the model.
    pub fn with_history_limit(mut self, max_turns: Option<usize>) -> Self {
        self.assembler = self.assembler.with_history_limit(max_turns);
        self
    }

    /// Snippet for `query`, or empty when no document is supplied.
    pub fn retrieve(&self, document: Option<&Path>, query: &str) -> String {
        match document {
            Some(path) => self.retriever.retrieve(path, query),
            None => String::new(),
        }
    }

    /// Build the prompt for `utterance` without calling any backend.
    pub fn build_prompt(&self, snippet: &str, history: &History, utterance: &str) -> String {
        self.assembler
            .assemble(&self.persona.system_prompt, snippet, history, utterance)
    }

    /// Run one turn.
    ///
    /// On success the returned history is `history` plus one turn; `history`
    /// itself is never modified.
    pub async fn run_turn(
        &self,
        history: &History,
        utterance: &str,
        sampling: &SamplingConfig,
        document: Option<&Path>,
    ) -> Result<TurnOutcome> {
        let snippet = self.retrieve(document, utterance);
        let prompt = self.build_prompt(&snippet, history, utterance);

        debug!(
            model = %sampling.model,
            history_turns = history.len(),
            snippet_lines = if snippet.is_empty() { 0 } else { snippet.lines().count() },
            prompt_tokens_est = estimate_tokens(&prompt),
            "Prompt assembled"
        );

        let backend = self
            .registry
            .get(&sampling.model)
            .ok_or_else(|| Error::BackendUnavailable {
                model: sampling.model.clone(),
            })?;

        let completion = backend
            .generate(GenerationRequest {
                prompt,
                temperature: sampling.temperature,
                max_tokens: sampling.max_tokens,
                stop: stop_sequences(),
            })
            .await?;

        let reply = normalize(&completion.text);

        info!(
            backend = backend.name(),
            model = %sampling.model,
            reply_chars = reply.len(),
            finish_reason = ?completion.finish_reason,
            "Turn complete"
        );

        Ok(TurnOutcome {
            history: history.with_turn(Turn::new(utterance, reply.clone())),
            snippet,
            reply,
        })
    }
}
