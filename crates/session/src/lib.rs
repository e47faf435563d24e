//! The chat session pipeline for recurchat.
//!
//! Every turn runs the same fixed sequence:
//!
//! 1. **Retrieve** lines around keyword matches in an optional document
//! 2. **Assemble** the persona, snippet, history, and utterance into a prompt
//! 3. **Generate** with the backend registered for the chosen model
//! 4. **Normalize** the completion so it ends with the stop marker
//! 5. **Return** a new history with the turn appended
//!
//! Completed turns can be appended to a plain-text transcript by the caller.

pub mod context;
pub mod normalize;
pub mod transcript;
pub mod turn_runner;

#[cfg(test)]
mod test_helpers;

pub use context::{extract_snippet, ContextRetriever, PromptAssembler};
pub use normalize::normalize;
pub use transcript::TranscriptLog;
pub use turn_runner::{stop_sequences, TurnOutcome, TurnRunner};
