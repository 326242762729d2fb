//! Ollama HTTP API client and backend

use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use vlm_core::{imagery, GenerateRequest, VlmError};

use crate::backend::{TextStream, VlmBackend};

const TRACING_TARGET: &str = "vlm_bridge::ollama";

/// Configuration for Ollama client
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for Ollama API (default: http://localhost:11434)
    pub base_url: String,
    /// Model tag to run; must be pulled into the daemon
    pub model: String,
    /// Timeout in seconds for a whole generation (default: 120)
    pub timeout_secs: u64,
    /// Sampling temperature (default: 0.0 for reproducible output)
    pub temperature: f32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5vl:7b".to_string(),
            timeout_secs: 120,
            temperature: 0.0,
        }
    }
}

/// Ollama API client
pub struct OllamaClient {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: OllamaConfig) -> Result<Self, VlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VlmError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// List the model tags the daemon has pulled
    ///
    /// Doubles as the reachability probe: a daemon that answers
    /// `/api/tags` is up, whatever models it holds.
    pub async fn list_models(&self) -> Result<Vec<String>, VlmError> {
        let url = format!("{}/api/tags", self.config.base_url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            VlmError::Unavailable(format!(
                "Ollama daemon unreachable at {}: {e}",
                self.config.base_url
            ))
        })?;

        if !response.status().is_success() {
            return Err(VlmError::Unavailable(format!(
                "Ollama tag listing failed: {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| VlmError::Unavailable(format!("bad tag listing from Ollama: {e}")))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Send a generate request and decode the NDJSON reply line by line
    pub async fn generate_stream(&self, request: ApiGenerateRequest) -> Result<TextStream, VlmError> {
        let url = format!("{}/api/generate", self.config.base_url);

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            VlmError::Unavailable(format!(
                "Ollama daemon unreachable at {}: {e}",
                self.config.base_url
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(VlmError::Inference(format!(
                "Ollama API error ({status}): {detail}"
            )));
        }

        let stream = try_stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            let mut finished = false;

            'receive: while let Some(chunk) = bytes.next().await {
                let chunk = chunk
                    .map_err(|e| VlmError::Inference(format!("Ollama stream read failed: {e}")))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // One JSON object per newline-terminated line
                while let Some(line_end) = buffer.find('\n') {
                    let line: String = buffer.drain(..=line_end).collect();
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    let piece = decode_chunk_line(line)?;
                    if !piece.response.is_empty() {
                        yield piece.response;
                    }
                    if piece.done {
                        finished = true;
                        break 'receive;
                    }
                }
            }

            // A daemon that closes the connection without a trailing
            // newline still owes us whatever is left in the buffer
            if !finished {
                let line = buffer.trim().to_string();
                if !line.is_empty() {
                    let piece = decode_chunk_line(&line)?;
                    if !piece.response.is_empty() {
                        yield piece.response;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Parse one NDJSON line from the generate endpoint
fn decode_chunk_line(line: &str) -> Result<GenerateChunk, VlmError> {
    let chunk: GenerateChunk = serde_json::from_str(line)
        .map_err(|e| VlmError::Inference(format!("undecodable Ollama chunk: {e}")))?;

    if let Some(message) = chunk.error {
        return Err(VlmError::Inference(format!("Ollama reported: {message}")));
    }

    Ok(chunk)
}

/// Generate request to Ollama
#[derive(Debug, Clone, Serialize)]
pub struct ApiGenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

/// Generation options forwarded to the model runner
#[derive(Debug, Clone, Serialize)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// One streamed chunk from the generate endpoint
#[derive(Debug, Clone, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Model tag listing from `/api/tags`
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// Backend that forwards generation to a local Ollama daemon
pub struct OllamaBackend {
    client: OllamaClient,
}

impl OllamaBackend {
    /// Build the client and probe the daemon once
    ///
    /// Fails when the daemon is unreachable; a missing model tag only
    /// warns, since the daemon may pull it later.
    pub async fn connect(config: OllamaConfig) -> Result<Self, VlmError> {
        let client = OllamaClient::new(config)?;
        let models = client.list_models().await?;

        let wanted = client.config().model.clone();
        if models.iter().any(|name| name == &wanted) {
            tracing::info!(target: TRACING_TARGET, model = %wanted, "Ollama daemon ready");
        } else {
            tracing::warn!(
                target: TRACING_TARGET,
                model = %wanted,
                "model not in daemon tag list; run `ollama pull {wanted}`"
            );
        }

        Ok(Self { client })
    }
}

#[async_trait]
impl VlmBackend for OllamaBackend {
    fn id(&self) -> &'static str {
        "ollama"
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
        max_tokens: usize,
    ) -> Result<TextStream, VlmError> {
        // The daemon rejects some upload encodings, so always re-encode
        // the normalized image as PNG before shipping it
        let images = match request.image() {
            Some(image) => {
                let png = imagery::encode_png(image)?;
                Some(vec![general_purpose::STANDARD.encode(png)])
            }
            None => None,
        };

        let config = self.client.config();
        let body = ApiGenerateRequest {
            model: config.model.clone(),
            prompt: request.prompt_or_default().to_string(),
            images,
            stream: Some(true),
            options: Some(GenerateOptions {
                num_predict: Some(max_tokens as u32),
                temperature: Some(config.temperature),
            }),
        };

        self.client.generate_stream(body).await
    }
}
