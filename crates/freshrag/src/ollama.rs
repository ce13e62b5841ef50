//! Ollama clients: embeddings and answer generation.
//!
//! The embedder retries on 429 and 5xx with exponential backoff, since
//! a busy local model server recovers quickly. The generator never
//! retries; generation failures belong to the caller.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use freshrag_core::embedding::Embedder;
use freshrag_core::error::{EmbedError, GenerationError};
use freshrag_core::generator::{GenerationMode, GenerationRequest, Generator};

const CONTEXT_PROMPT: &str = "Use the context to answer the question.";

/// Probe an Ollama endpoint. Used by the health command and at startup
/// before a batch of embedding calls.
pub async fn check_connection(client: &Client, base_url: &str) -> Result<String, String> {
    #[derive(Deserialize)]
    struct VersionResponse {
        version: String,
    }

    let url = format!("{}/api/version", base_url.trim_end_matches('/'));
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| format!("{base_url}: {e}"))?;
    if !response.status().is_success() {
        return Err(format!("{base_url}: status {}", response.status()));
    }
    let version: VersionResponse = response
        .json()
        .await
        .map_err(|e| format!("{base_url}: invalid version response: {e}"))?;
    Ok(version.version)
}

/// [`Embedder`] backed by Ollama's `/api/embed` endpoint.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(
        base_url: &str,
        model: &str,
        dims: usize,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, EmbedError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbedError(format!("client build failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dims,
            max_retries,
        })
    }

    async fn embed_once(&self, texts: &[String]) -> Result<reqwest::Response, reqwest::Error> {
        let body = json!({
            "model": self.model,
            "input": texts,
        });
        self.client
            .post(format!("{}/api/embed", self.base_url))
            .json(&body)
            .send()
            .await
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt: u32 = 0;
        loop {
            match self.embed_once(texts).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed: EmbedResponse = response
                            .json()
                            .await
                            .map_err(|e| EmbedError(format!("invalid response: {e}")))?;
                        if parsed.embeddings.len() != texts.len() {
                            return Err(EmbedError(format!(
                                "expected {} embeddings, got {}",
                                texts.len(),
                                parsed.embeddings.len()
                            )));
                        }
                        return Ok(parsed.embeddings);
                    }

                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable || attempt >= self.max_retries {
                        let detail = response.text().await.unwrap_or_default();
                        return Err(EmbedError(format!("status {status}: {detail}")));
                    }
                    warn!(%status, attempt, "embedding request rejected, retrying");
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(EmbedError(e.to_string()));
                    }
                    warn!(error = %e, attempt, "embedding request failed, retrying");
                }
            }

            let backoff = Duration::from_secs(1 << attempt.min(5));
            debug!(?backoff, "backing off before retry");
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

/// [`Generator`] backed by Ollama's chat and generate endpoints.
///
/// Chat mode streams NDJSON and concatenates the message fragments;
/// completion mode asks for a single unstreamed response.
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    persona: Option<String>,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn new(
        base_url: &str,
        model: &str,
        persona: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError(format!("client build failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            persona,
        })
    }

    fn user_prompt(request: &GenerationRequest) -> String {
        format!(
            "{CONTEXT_PROMPT}\n\nContext:\n{}\n\nQuestion: {}",
            request.context, request.question
        )
    }

    async fn generate_chat(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut messages = Vec::new();
        if let Some(persona) = &self.persona {
            messages.push(json!({ "role": "system", "content": persona }));
        }
        messages.push(json!({ "role": "user", "content": Self::user_prompt(request) }));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError(format!("status {status}: {detail}")));
        }

        // The stream is NDJSON: one chunk object per line, each carrying a
        // fragment of the answer in message.content.
        let raw = response
            .text()
            .await
            .map_err(|e| GenerationError(format!("stream read failed: {e}")))?;
        let mut answer = String::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            let chunk: ChatChunk = serde_json::from_str(line)
                .map_err(|e| GenerationError(format!("invalid stream chunk: {e}")))?;
            if let Some(message) = chunk.message {
                answer.push_str(&message.content);
            }
        }
        Ok(answer)
    }

    async fn generate_completion(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, GenerationError> {
        let body = json!({
            "model": self.model,
            "prompt": Self::user_prompt(request),
            "stream": false,
        });
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError(format!("status {status}: {detail}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError(format!("invalid response: {e}")))?;
        Ok(parsed.response)
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        match request.mode {
            GenerationMode::Chat => self.generate_chat(request).await,
            GenerationMode::Completion => self.generate_completion(request).await,
        }
    }
}
