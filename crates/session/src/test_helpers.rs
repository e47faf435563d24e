//! Shared test helpers for session tests.

use recurchat_backends::BackendRegistry;
use recurchat_core::backend::{Backend, Completion, GenerationRequest};
use recurchat_core::error::BackendError;
use recurchat_core::turn::{History, Turn};
use std::sync::{Arc, Mutex};

/// A mock backend that answers every request the same way and records
/// what it was asked.
pub struct RecordingBackend {
    outcome: Result<String, BackendError>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl RecordingBackend {
    /// Always complete with `text`.
    pub fn replying(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always fail with `error`.
    pub fn failing(error: BackendError) -> Self {
        Self {
            outcome: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl Backend for RecordingBackend {
    fn name(&self) -> &str {
        "recording_mock"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Completion, BackendError> {
        self.requests.lock().unwrap().push(request);
        self.outcome.clone().map(Completion::text)
    }
}

/// A registry holding a single backend.
pub fn registry_with(model: &str, backend: Arc<RecordingBackend>) -> Arc<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    registry.register(model, backend);
    Arc::new(registry)
}

/// Build a history from (utterance, reply) pairs.
pub fn history_with(pairs: &[(&str, &str)]) -> History {
    History::from(
        pairs
            .iter()
            .map(|(u, r)| Turn::new(*u, *r))
            .collect::<Vec<_>>(),
    )
}
