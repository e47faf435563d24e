//! OpenAI-compatible text-completion backend.
//!
//! Works with any server exposing the legacy `/v1/completions` endpoint:
//! llama.cpp server, vLLM, Ollama, LM Studio. The prompt is sent verbatim,
//! so no chat template is applied on the server side.

use async_trait::async_trait;
use recurchat_core::backend::{Backend, Completion, FinishReason, GenerationRequest, Usage};
use recurchat_core::error::BackendError;
use serde::Deserialize;
use tracing::{debug, warn};

/// An HTTP text-completion backend.
pub struct OpenAiCompatBackend {
    name: String,
    base_url: String,
    api_key: Option<String>,
    remote_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    /// Create a new backend talking to `base_url` (e.g. `http://localhost:8080/v1`).
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        remote_model: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            remote_model: remote_model.into(),
            client,
        })
    }

    /// Attach a bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/completions", self.base_url)
    }

    /// Build the JSON body for a `/completions` request.
    fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.remote_model,
            "prompt": request.prompt,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "echo": false,
            "stream": false,
        });

        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        body
    }

    /// Turn a decoded API response into a [`Completion`].
    fn into_completion(api_response: ApiResponse) -> Result<Completion, BackendError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") => Some(FinishReason::Stop),
            Some("length") => Some(FinishReason::Length),
            _ => None,
        };

        Ok(Completion {
            text: choice.text,
            usage: api_response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason,
        })
    }
}

#[async_trait]
impl Backend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<Completion, BackendError> {
        let body = self.request_body(&request);

        debug!(
            backend = %self.name,
            model = %self.remote_model,
            prompt_chars = request.prompt.len(),
            "Sending completion request"
        );

        let mut http = self
            .client
            .post(self.completions_url())
            .header("Content-Type", "application/json")
            .json(&body);

        if let Some(key) = &self.api_key {
            http = http.header("Authorization", format!("Bearer {key}"));
        }

        let response = http.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(e.to_string())
            } else {
                BackendError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(BackendError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(BackendError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            return Err(BackendError::ModelNotFound(self.remote_model.clone()));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Backend returned error");
            return Err(BackendError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| BackendError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        Self::into_completion(api_response)
    }

    async fn health_check(&self) -> std::result::Result<bool, BackendError> {
        let url = format!("{}/models", self.base_url);
        let mut http = self.client.get(&url);
        if let Some(key) = &self.api_key {
            http = http.header("Authorization", format!("Bearer {key}"));
        }

        let response = http
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// ── API wire types ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    text: String,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(stop: Vec<String>) -> GenerationRequest {
        GenerationRequest {
            prompt: "[User prompt]: hi\n[Assistant response]:".into(),
            temperature: 0.7,
            max_tokens: 150,
            stop,
        }
    }

    fn llama_server(remote_model: &str) -> OpenAiCompatBackend {
        OpenAiCompatBackend::new("llama-server", "http://localhost:8080/v1", remote_model).unwrap()
    }

    #[test]
    fn name_and_completions_url() {
        let backend = llama_server("mythomax");
        assert_eq!(backend.name(), "llama-server");
        assert_eq!(backend.completions_url(), "http://localhost:8080/v1/completions");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let backend = OpenAiCompatBackend::new("x", "http://host:1234/v1/", "m").unwrap();
        assert_eq!(backend.completions_url(), "http://host:1234/v1/completions");
    }

    #[test]
    fn body_carries_prompt_and_stop_sequences() {
        let backend = llama_server("mythomax");
        let body = backend.request_body(&request(vec![
            "[StopSignal]".into(),
            "\n[User prompt]:".into(),
        ]));
        assert_eq!(body["model"], "mythomax");
        assert_eq!(body["max_tokens"], 150);
        assert_eq!(body["echo"], false);
        assert_eq!(body["stop"][0], "[StopSignal]");
        assert_eq!(body["stop"][1], "\n[User prompt]:");
        assert!(body["prompt"].as_str().unwrap().ends_with("[Assistant response]:"));
    }

    #[test]
    fn body_omits_empty_stop() {
        let backend = llama_server("m");
        let body = backend.request_body(&request(vec![]));
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn parse_completion_response() {
        let json = r#"{
            "id": "cmpl-1",
            "object": "text_completion",
            "choices": [{"text": " I am fine", "index": 0, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 4, "total_tokens": 44}
        }"#;
        let api: ApiResponse = serde_json::from_str(json).unwrap();
        let completion = OpenAiCompatBackend::into_completion(api).unwrap();
        assert_eq!(completion.text, " I am fine");
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
        assert_eq!(completion.usage.unwrap().total_tokens, 44);
    }

    #[test]
    fn parse_length_finish() {
        let json = r#"{"choices": [{"text": "cut off", "finish_reason": "length"}]}"#;
        let api: ApiResponse = serde_json::from_str(json).unwrap();
        let completion = OpenAiCompatBackend::into_completion(api).unwrap();
        assert_eq!(completion.finish_reason, Some(FinishReason::Length));
        assert!(completion.usage.is_none());
    }

    #[test]
    fn empty_choices_is_an_error() {
        let api: ApiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            OpenAiCompatBackend::into_completion(api),
            Err(BackendError::ApiError { .. })
        ));
    }
}
