//! Persona: the fixed system instruction placed at the top of every prompt.
//!
//! The built-in instruction can be replaced from configuration. Whatever the
//! source, it should tell the model to end each reply with the stop marker,
//! since the backend halts generation on it.

use serde::{Deserialize, Serialize};

/// The instruction used when no override is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = concat!(
    "You are a helpful AI model. Respond clearly, respectfully, and intelligently to the user's questions.\n",
    "Use structured reasoning when needed and end each response with [StopSignal].",
);

/// The system instruction for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub system_prompt: String,
}

impl Persona {
    /// Use `system_prompt` when given, otherwise the built-in instruction.
    pub fn from_override(system_prompt: Option<&str>) -> Self {
        match system_prompt {
            Some(prompt) if !prompt.trim().is_empty() => Self {
                system_prompt: prompt.to_string(),
            },
            _ => Self::default(),
        }
    }

    /// Whether the instruction mentions the stop marker at all.
    pub fn mentions_stop_marker(&self) -> bool {
        self.system_prompt.contains(crate::turn::STOP_MARKER)
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}
