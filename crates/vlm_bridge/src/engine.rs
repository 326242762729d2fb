//! Process-wide generation engine
//!
//! One backend, constructed once at startup, shared by every request.
//! A single inference slot serializes generations: local runtimes own
//! the whole device and a one-request queue keeps the daemon honest
//! about latency instead of thrashing it.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use vlm_core::{GenerateRequest, VlmError, DEFAULT_MAX_TOKENS};

use crate::backend::{BackendKind, TextStream, VlmBackend};
use crate::echo::EchoBackend;
use crate::ollama::{OllamaBackend, OllamaConfig};

const TRACING_TARGET: &str = "vlm_bridge::engine";

/// Startup configuration for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Which backend to construct
    pub backend: BackendKind,
    /// Ollama connection settings (used by the `ollama` backend)
    pub ollama: OllamaConfig,
    /// Cap on generated tokens per request
    pub max_tokens: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ollama,
            ollama: OllamaConfig::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// The process-wide model handle
///
/// Initialization happens exactly once; the caller keeps the outcome
/// and serves requests from it. A failed load stays failed until the
/// process restarts.
pub struct VlmEngine {
    backend: Box<dyn VlmBackend>,
    slot: Arc<Semaphore>,
    max_tokens: usize,
}

impl VlmEngine {
    /// Construct the configured backend
    pub async fn initialize(config: &EngineConfig) -> Result<Self, VlmError> {
        let backend: Box<dyn VlmBackend> = match config.backend {
            BackendKind::Ollama => {
                Box::new(OllamaBackend::connect(config.ollama.clone()).await?)
            }
            BackendKind::Echo => Box::new(EchoBackend),
            #[cfg(feature = "local")]
            BackendKind::SmolVlm => Box::new(crate::local::SmolVlmBackend::load()?),
            #[cfg(feature = "local")]
            BackendKind::Paligemma => Box::new(crate::local::PaligemmaBackend::load()?),
            #[cfg(not(feature = "local"))]
            BackendKind::SmolVlm | BackendKind::Paligemma => {
                return Err(VlmError::Unavailable(format!(
                    "backend '{}' needs the `local` cargo feature (rebuild with --features local)",
                    config.backend
                )));
            }
        };

        tracing::info!(
            target: TRACING_TARGET,
            backend = backend.id(),
            max_tokens = config.max_tokens,
            "engine ready"
        );

        Ok(Self::with_backend(backend, config.max_tokens))
    }

    /// Wrap an already-built backend
    pub fn with_backend(backend: Box<dyn VlmBackend>, max_tokens: usize) -> Self {
        Self {
            backend,
            slot: Arc::new(Semaphore::new(1)),
            max_tokens,
        }
    }

    pub fn backend_id(&self) -> &'static str {
        self.backend.id()
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Start one generation, waiting for the inference slot first
    ///
    /// The returned stream owns the slot permit. Dropping it early, as
    /// happens when a client disconnects, releases the slot and
    /// abandons the generation.
    pub async fn stream(&self, request: GenerateRequest) -> Result<GenerationStream, VlmError> {
        let permit = Arc::clone(&self.slot)
            .acquire_owned()
            .await
            .map_err(|_| VlmError::Unavailable("engine is shutting down".to_string()))?;

        let inner = self.backend.generate(&request, self.max_tokens).await?;

        Ok(GenerationStream {
            inner,
            _permit: permit,
        })
    }

    /// Run one generation to completion and return the whole text
    ///
    /// Exactly the streamed chunks joined in order, so streaming and
    /// non-streaming callers always see the same answer.
    pub async fn generate(&self, request: GenerateRequest) -> Result<String, VlmError> {
        let mut stream = self.stream(request).await?;
        let mut text = String::new();
        while let Some(piece) = stream.next().await {
            text.push_str(&piece?);
        }
        Ok(text)
    }
}

/// Finite, non-restartable sequence of generated text fragments
///
/// Holds the engine's inference slot until dropped.
pub struct GenerationStream {
    inner: TextStream,
    _permit: OwnedSemaphorePermit,
}

impl Stream for GenerationStream {
    type Item = Result<String, VlmError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}
