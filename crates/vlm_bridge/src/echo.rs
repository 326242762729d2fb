//! Deterministic model-free backend

use async_trait::async_trait;
use vlm_core::{GenerateRequest, VlmError};

use crate::backend::{chunked_stream, TextStream, VlmBackend};

/// Backend that reflects its inputs back as text
///
/// Needs no daemon and no weights, so the transport stack and clients
/// can be exercised end to end with output that is a pure function of
/// the request.
pub struct EchoBackend;

#[async_trait]
impl VlmBackend for EchoBackend {
    fn id(&self) -> &'static str {
        "echo"
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
        max_tokens: usize,
    ) -> Result<TextStream, VlmError> {
        let mut reply = String::new();

        if let Some(image) = request.image() {
            reply.push_str(&format!(
                "Received a {}x{} image. ",
                image.width(),
                image.height()
            ));
        }
        match request.prompt() {
            Some(prompt) => reply.push_str(&format!("Prompt: {prompt}")),
            None => reply.push_str("No prompt given."),
        }

        let capped: String = reply.chars().take(max_tokens).collect();
        Ok(chunked_stream(capped))
    }
}
