//! Local inference backend: runs GGUF models directly on your hardware.
//!
//! Uses [Candle](https://github.com/huggingface/candle) (Rust-native ML) to run
//! quantized Llama-family models with no server and no network once the
//! weights are cached.
//!
//! The prompt is tokenized exactly as assembled: no chat template is applied,
//! since the session already lays out the persona, context, and turns.
//!
//! Models are loaded eagerly, once, when the backend registry is built.

use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama as qlm;
use hf_hub::api::sync::Api;
use recurchat_core::backend::{Backend, Completion, FinishReason, GenerationRequest, Usage};
use recurchat_core::error::BackendError;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Maximum context length the quantized Llama implementation supports.
const MAX_CONTEXT_TOKENS: usize = qlm::MAX_SEQ_LEN;

// ── Well-known model aliases ───────────────────────────────────────────

/// Model presets: friendly aliases that resolve to HuggingFace repos + filenames.
struct ModelPreset {
    repo: &'static str,
    gguf_file: &'static str,
    tokenizer_repo: &'static str,
}

fn resolve_preset(alias: &str) -> Option<ModelPreset> {
    let alias_lower = alias.to_lowercase();
    match alias_lower.as_str() {
        "mythomax" | "mythomax-l2-13b" => Some(ModelPreset {
            repo: "TheBloke/MythoMax-L2-13B-GGUF",
            gguf_file: "mythomax-l2-13b.Q4_K_M.gguf",
            tokenizer_repo: "Gryphe/MythoMax-L2-13b",
        }),
        "tinyllama" | "tiny-llama" | "tinyllama-1.1b" => Some(ModelPreset {
            repo: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
            gguf_file: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
            tokenizer_repo: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
        }),
        "llama2-7b" | "llama-2-7b" => Some(ModelPreset {
            repo: "TheBloke/Llama-2-7B-Chat-GGUF",
            gguf_file: "llama-2-7b-chat.Q4_K_M.gguf",
            tokenizer_repo: "hf-internal-testing/llama-tokenizer",
        }),
        _ => None,
    }
}

// ── Stop sequences ─────────────────────────────────────────────────────

/// Byte offset of the earliest stop sequence in `text`, if any.
fn find_stop(text: &str, stop: &[String]) -> Option<usize> {
    stop.iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
}

// ── Local Backend ──────────────────────────────────────────────────────

/// A backend that runs a GGUF-quantized language model locally via Candle.
///
/// The model is behind a Mutex because Candle inference mutates the
/// KV cache and is single-threaded on CPU.
pub struct LocalBackend {
    inner: Arc<Mutex<LocalModelState>>,
    model_name: String,
}

/// The loaded model state (tokenizer + weights).
struct LocalModelState {
    model: qlm::ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_id: u32,
    seed: u64,
}

impl LocalBackend {
    /// Load a model and return a ready backend.
    ///
    /// `model` can be:
    /// - A preset alias: `"mythomax-l2-13b"`, `"tinyllama"`, `"llama2-7b"`
    /// - A path to a local GGUF file: `"/models/mythomax-l2-13b.Q4_K_M.gguf"`
    ///
    /// This blocks while weights are downloaded (presets) and read.
    pub fn load(model: &str, tokenizer: Option<&Path>, seed: u64) -> Result<Self, BackendError> {
        let state = LocalModelState::load(model, tokenizer, seed)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(state)),
            model_name: model.to_string(),
        })
    }
}

impl LocalModelState {
    /// Load a model by name or path.
    fn load(model: &str, tokenizer: Option<&Path>, seed: u64) -> Result<Self, BackendError> {
        let device = Device::Cpu;

        let path = Path::new(model);
        if path.extension().is_some_and(|ext| ext == "gguf") {
            if !path.exists() {
                return Err(BackendError::ModelNotFound(format!(
                    "GGUF file not found: {}",
                    path.display()
                )));
            }
            let tokenizer_path = tokenizer
                .map(Path::to_path_buf)
                .unwrap_or_else(|| path.with_file_name("tokenizer.json"));
            return Self::load_from_paths(path, &tokenizer_path, &device, seed);
        }

        let preset = resolve_preset(model).ok_or_else(|| {
            BackendError::ModelNotFound(format!(
                "Unknown local model '{model}'. Available presets: mythomax-l2-13b, \
                 tinyllama, llama2-7b. Or provide a path to a .gguf file."
            ))
        })?;

        info!(
            model,
            repo = preset.repo,
            file = preset.gguf_file,
            "Downloading/loading local model"
        );

        // Download via HuggingFace Hub (cached automatically)
        let api = Api::new().map_err(|e| {
            BackendError::Network(format!("Failed to initialize HuggingFace Hub API: {e}"))
        })?;

        let model_path = api
            .model(preset.repo.to_string())
            .get(preset.gguf_file)
            .map_err(|e| {
                BackendError::Network(format!(
                    "Failed to download model '{}' from '{}': {e}",
                    preset.gguf_file, preset.repo
                ))
            })?;

        let tokenizer_path = match tokenizer {
            Some(explicit) => explicit.to_path_buf(),
            None => api
                .model(preset.tokenizer_repo.to_string())
                .get("tokenizer.json")
                .map_err(|e| {
                    BackendError::Network(format!(
                        "Failed to download tokenizer from '{}': {e}",
                        preset.tokenizer_repo
                    ))
                })?,
        };

        Self::load_from_paths(&model_path, &tokenizer_path, &device, seed)
    }

    fn load_from_paths(
        model_path: &Path,
        tokenizer_path: &Path,
        device: &Device,
        seed: u64,
    ) -> Result<Self, BackendError> {
        info!(path = %model_path.display(), "Loading local GGUF model");

        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            BackendError::LoadFailed(format!(
                "Failed to load tokenizer {}: {e}",
                tokenizer_path.display()
            ))
        })?;

        let mut file = std::fs::File::open(model_path)
            .map_err(|e| BackendError::LoadFailed(format!("Failed to open GGUF file: {e}")))?;

        let gguf = gguf_file::Content::read(&mut file)
            .map_err(|e| BackendError::LoadFailed(format!("Failed to parse GGUF file: {e}")))?;

        let model = qlm::ModelWeights::from_gguf(gguf, &mut file, device).map_err(|e| {
            BackendError::LoadFailed(format!("Failed to load model weights: {e}"))
        })?;

        let eos_token_id = tokenizer
            .token_to_id("</s>")
            .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
            .or_else(|| tokenizer.token_to_id("<|eot_id|>"))
            .unwrap_or(2);

        info!(eos_token_id, "Local model loaded successfully");

        Ok(Self {
            model,
            tokenizer,
            device: device.clone(),
            eos_token_id,
            seed,
        })
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, BackendError> {
        self.tokenizer
            .decode(tokens, true)
            .map_err(|e| BackendError::Inference(format!("Detokenization failed: {e}")))
    }

    /// Run inference: tokenize → generate tokens → decode.
    ///
    /// Stops at EOS, at the first stop sequence (which is cut from the
    /// output), or when `max_tokens` have been produced.
    fn generate(&mut self, request: &GenerationRequest) -> Result<Completion, BackendError> {
        let encoding = self
            .tokenizer
            .encode(request.prompt.as_str(), true)
            .map_err(|e| BackendError::Inference(format!("Tokenization failed: {e}")))?;

        let prompt_tokens = encoding.get_ids().to_vec();
        let prompt_len = prompt_tokens.len();

        if prompt_len >= MAX_CONTEXT_TOKENS {
            return Err(BackendError::Inference(format!(
                "Prompt is {prompt_len} tokens, the model context holds {MAX_CONTEXT_TOKENS}"
            )));
        }

        let budget = (request.max_tokens as usize).min(MAX_CONTEXT_TOKENS - prompt_len);

        debug!(
            prompt_tokens = prompt_len,
            max_tokens = budget,
            temperature = request.temperature,
            "Starting local generation"
        );

        let mut logits_processor = if request.temperature <= 0.0 {
            LogitsProcessor::new(self.seed, None, None)
        } else {
            LogitsProcessor::new(self.seed, Some(request.temperature as f64), None)
        };

        let mut generated: Vec<u32> = Vec::new();
        let mut input = Tensor::new(prompt_tokens.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(map_candle_err)?;
        let mut finish_reason = FinishReason::Length;
        let mut output = String::new();

        for step in 0..budget {
            // Position 0 resets the KV cache left over from the previous call.
            let index_pos = if step == 0 { 0 } else { prompt_len + step - 1 };
            let logits = self
                .model
                .forward(&input, index_pos)
                .and_then(|l| l.squeeze(0))
                .map_err(map_candle_err)?;

            let next_token = logits_processor.sample(&logits).map_err(map_candle_err)?;
            if next_token == self.eos_token_id {
                finish_reason = FinishReason::Stop;
                break;
            }
            generated.push(next_token);

            output = self.decode(&generated)?;
            if let Some(cut) = find_stop(&output, &request.stop) {
                output.truncate(cut);
                finish_reason = FinishReason::Stop;
                break;
            }

            input = Tensor::new(&[next_token][..], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(map_candle_err)?;
        }

        let completion_tokens = generated.len() as u32;
        debug!(
            completion_tokens,
            output_len = output.len(),
            ?finish_reason,
            "Generation complete"
        );

        Ok(Completion {
            text: output,
            usage: Some(Usage {
                prompt_tokens: prompt_len as u32,
                completion_tokens,
                total_tokens: prompt_len as u32 + completion_tokens,
            }),
            finish_reason: Some(finish_reason),
        })
    }
}

/// Map Candle errors to BackendError.
fn map_candle_err(e: candle_core::Error) -> BackendError {
    BackendError::Inference(format!("Candle inference error: {e}"))
}

// ── Backend trait implementation ───────────────────────────────────────

#[async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<Completion, BackendError> {
        // Run inference on a blocking thread (Candle is CPU-bound)
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut state = inner.blocking_lock();
            state.generate(&request)
        })
        .await
        .map_err(|e| BackendError::Inference(format!("Inference task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_preset_aliases() {
        assert!(resolve_preset("mythomax-l2-13b").is_some());
        assert!(resolve_preset("MythoMax").is_some());
        assert!(resolve_preset("tinyllama").is_some());
        assert!(resolve_preset("nonexistent").is_none());
    }

    #[test]
    fn find_stop_picks_earliest() {
        let stop = vec!["[StopSignal]".to_string(), "\n[User prompt]:".to_string()];
        let text = "Sure thing.\n[User prompt]: next [StopSignal]";
        assert_eq!(find_stop(text, &stop), Some(11));
    }

    #[test]
    fn find_stop_ignores_empty_sequences() {
        let stop = vec![String::new()];
        assert_eq!(find_stop("anything", &stop), None);
    }

    #[test]
    fn missing_gguf_is_model_not_found() {
        let err = LocalBackend::load("/nonexistent/model.gguf", None, 42)
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::ModelNotFound(_)));
    }

    #[test]
    fn unknown_alias_is_model_not_found() {
        let err = LocalBackend::load("not-a-real-model", None, 42).err().unwrap();
        assert!(matches!(err, BackendError::ModelNotFound(_)));
    }
}
