//! Backend abstraction
//!
//! Every model runtime implements [`VlmBackend`]: one validated
//! request in, one finite stream of text fragments out.

use std::pin::Pin;
use std::str::FromStr;

use async_trait::async_trait;
use futures::{stream, Stream};
use vlm_core::{chunk, GenerateRequest, VlmError, STREAM_CHUNK_CHARS};

/// Ordered text fragments from one generation call
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, VlmError>> + Send>>;

/// A model runtime that can serve generation requests
#[async_trait]
pub trait VlmBackend: Send + Sync {
    /// Stable identifier used in logs and configuration
    fn id(&self) -> &'static str;

    /// Run one generation, yielding decoded text fragments in order
    ///
    /// The returned stream is finite and not restartable. Dropping it
    /// before the end abandons the generation.
    async fn generate(
        &self,
        request: &GenerateRequest,
        max_tokens: usize,
    ) -> Result<TextStream, VlmError>;
}

/// Wrap already-complete text as a chunked stream
pub(crate) fn chunked_stream(text: String) -> TextStream {
    let chunks = chunk::chunk_text(&text, STREAM_CHUNK_CHARS);
    Box::pin(stream::iter(chunks.into_iter().map(Ok)))
}

/// Which backend implementation to construct at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Local Ollama daemon over HTTP
    Ollama,
    /// SmolVLM weights in the in-process candle runtime
    SmolVlm,
    /// PaliGemma weights in the in-process candle runtime
    Paligemma,
    /// Deterministic model-free backend
    Echo,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ollama => "ollama",
            BackendKind::SmolVlm => "smolvlm",
            BackendKind::Paligemma => "paligemma",
            BackendKind::Echo => "echo",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(BackendKind::Ollama),
            "smolvlm" => Ok(BackendKind::SmolVlm),
            "paligemma" => Ok(BackendKind::Paligemma),
            "echo" => Ok(BackendKind::Echo),
            other => Err(format!(
                "unknown backend '{other}' (expected ollama, smolvlm, paligemma, or echo)"
            )),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_backend_kind_parses_known_names() {
        assert_eq!("ollama".parse::<BackendKind>().unwrap(), BackendKind::Ollama);
        assert_eq!(" ECHO ".parse::<BackendKind>().unwrap(), BackendKind::Echo);
        assert_eq!(
            "smolvlm".parse::<BackendKind>().unwrap(),
            BackendKind::SmolVlm
        );
        assert_eq!(
            "paligemma".parse::<BackendKind>().unwrap(),
            BackendKind::Paligemma
        );
    }

    #[test]
    fn test_backend_kind_rejects_unknown_names() {
        let err = "gpt4".parse::<BackendKind>().unwrap_err();
        assert!(err.contains("gpt4"));
    }

    #[test]
    fn test_backend_kind_roundtrips_through_display() {
        for kind in [
            BackendKind::Ollama,
            BackendKind::SmolVlm,
            BackendKind::Paligemma,
            BackendKind::Echo,
        ] {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[tokio::test]
    async fn test_chunked_stream_preserves_text() {
        let text = "a".repeat(125);
        let mut stream = chunked_stream(text.clone());

        let mut pieces = Vec::new();
        while let Some(piece) = stream.next().await {
            pieces.push(piece.unwrap());
        }

        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces.concat(), text);
    }
}
