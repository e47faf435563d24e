//! Backend registry: the lookup table from model identifier to engine.
//!
//! Built once at startup from configuration and then shared read-only
//! (behind an `Arc`) with the turn runner. A backend that fails to load is
//! logged and left out, so turns that ask for it report the model as
//! unavailable instead of aborting startup.

use std::collections::BTreeMap;
use std::sync::Arc;
use recurchat_config::{AppConfig, BackendConfig};
use recurchat_core::backend::Backend;
use recurchat_core::error::BackendError;
use tracing::{debug, info, warn};

use crate::openai_compat::OpenAiCompatBackend;

/// Maps model identifiers to loaded backends.
#[derive(Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn Backend>>,
    failed: BTreeMap<String, String>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loaded backend under a model identifier.
    pub fn register(&mut self, model: impl Into<String>, backend: Arc<dyn Backend>) {
        self.backends.insert(model.into(), backend);
    }

    /// Record that a configured backend could not be loaded.
    pub fn record_failure(&mut self, model: impl Into<String>, reason: impl Into<String>) {
        self.failed.insert(model.into(), reason.into());
    }

    /// Get the backend for a model identifier.
    pub fn get(&self, model: &str) -> Option<Arc<dyn Backend>> {
        self.backends.get(model).cloned()
    }

    /// List loaded model identifiers.
    pub fn list(&self) -> Vec<&str> {
        self.backends.keys().map(|s| s.as_str()).collect()
    }

    /// Configured models that failed to load, with the reason.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.failed.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Ask every loaded backend whether it can serve requests, in model order.
    pub async fn health_report(&self) -> Vec<(String, Result<bool, BackendError>)> {
        let mut report = Vec::with_capacity(self.backends.len());
        for (model, backend) in &self.backends {
            let status = backend.health_check().await;
            debug!(model = %model, ?status, "Health check");
            report.push((model.clone(), status));
        }
        report
    }
}

/// Build one backend from its configuration entry.
fn build_backend(model: &str, config: &BackendConfig) -> Result<Arc<dyn Backend>, BackendError> {
    match config {
        BackendConfig::Local {
            model: source,
            tokenizer,
            seed,
        } => build_local(source, tokenizer.as_deref(), *seed),
        BackendConfig::OpenaiCompat {
            api_url,
            api_key,
            remote_model,
        } => {
            let remote = remote_model.clone().unwrap_or_else(|| model.to_string());
            let mut backend = OpenAiCompatBackend::new(model, api_url, remote)?;
            if let Some(key) = api_key {
                backend = backend.with_api_key(key);
            }
            Ok(Arc::new(backend))
        }
    }
}

#[cfg(feature = "local")]
fn build_local(
    source: &str,
    tokenizer: Option<&std::path::Path>,
    seed: u64,
) -> Result<Arc<dyn Backend>, BackendError> {
    let backend = crate::local::LocalBackend::load(source, tokenizer, seed)?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "local"))]
fn build_local(
    source: &str,
    _tokenizer: Option<&std::path::Path>,
    _seed: u64,
) -> Result<Arc<dyn Backend>, BackendError> {
    Err(BackendError::LoadFailed(format!(
        "cannot load '{source}': built without the `local` feature"
    )))
}

/// Build the registry from configuration, loading every backend eagerly.
pub fn build_from_config(config: &AppConfig) -> BackendRegistry {
    let mut registry = BackendRegistry::new();

    for (model, backend_config) in &config.backends {
        match build_backend(model, backend_config) {
            Ok(backend) => {
                info!(model = %model, kind = backend_config.kind(), "Backend ready");
                registry.register(model.clone(), backend);
            }
            Err(e) => {
                warn!(model = %model, error = %e, "Backend failed to load");
                registry.record_failure(model.clone(), e.to_string());
            }
        }
    }

    registry
}
