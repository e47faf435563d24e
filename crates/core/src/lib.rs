//! # recurchat core
//!
//! Domain types, traits, and error definitions for recurchat.
//! This crate has **no engine dependencies**: it defines the domain model
//! that the backend and session crates implement against.
//!
//! The generation engine is a trait here so the turn pipeline can be driven
//! by a mock in tests and by a local model or HTTP server in production.

pub mod error;
pub mod turn;
pub mod backend;
pub mod persona;

// Re-export key types at crate root for ergonomics
pub use error::{BackendError, ContextError, Error, Result, TranscriptError};
pub use turn::{History, SessionId, Turn, STOP_MARKER};
pub use backend::{Backend, Completion, FinishReason, GenerationRequest, SamplingConfig, Usage};
pub use persona::{Persona, DEFAULT_SYSTEM_PROMPT};
