//! In-process model backends built on kornia-vlm
//!
//! These run SmolVLM or PaliGemma inside the server process through
//! the candle runtime. Weights download into the Hugging Face hub
//! cache on first load (override the location with `HF_HOME`).
//!
//! Inference is synchronous and owns the whole device, so calls run
//! under `spawn_blocking` with the model behind a mutex.

use std::sync::Arc;

use async_trait::async_trait;
use kornia_image::{allocator::CpuAllocator, Image, ImageSize};
use kornia_vlm::paligemma::{Paligemma, PaligemmaConfig};
use kornia_vlm::smolvlm::{SmolVlm, SmolVlmConfig};
use parking_lot::Mutex;
use vlm_core::{GenerateRequest, VlmError};

use crate::backend::{chunked_stream, TextStream, VlmBackend};

const TRACING_TARGET: &str = "vlm_bridge::local";

/// Convert a normalized RGB image into the kornia tensor layout
fn to_kornia_image(image: &image::RgbImage) -> Result<Image<u8, 3, CpuAllocator>, VlmError> {
    let size = ImageSize {
        width: image.width() as usize,
        height: image.height() as usize,
    };
    Image::new(size, image.as_raw().clone(), CpuAllocator)
        .map_err(|e| VlmError::Inference(format!("image tensor conversion failed: {e}")))
}

/// SmolVLM running in the server process
pub struct SmolVlmBackend {
    model: Arc<Mutex<SmolVlm>>,
}

impl SmolVlmBackend {
    /// Load the model weights; slow on first run while they download
    pub fn load() -> Result<Self, VlmError> {
        tracing::info!(target: TRACING_TARGET, "loading SmolVLM weights");
        let model = SmolVlm::new(SmolVlmConfig::default())
            .map_err(|e| VlmError::Unavailable(format!("SmolVLM load failed: {e}")))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait]
impl VlmBackend for SmolVlmBackend {
    fn id(&self) -> &'static str {
        "smolvlm"
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
        max_tokens: usize,
    ) -> Result<TextStream, VlmError> {
        let image = request.image().map(to_kornia_image).transpose()?;
        let prompt = request.prompt_or_default().to_string();
        let model = Arc::clone(&self.model);

        let text = tokio::task::spawn_blocking(move || {
            let mut model = model.lock();
            model
                .inference(image, &prompt, max_tokens, false)
                .map_err(|e| VlmError::Inference(format!("SmolVLM inference failed: {e}")))
        })
        .await
        .map_err(|e| VlmError::Inference(format!("inference task failed: {e}")))??;

        Ok(chunked_stream(text))
    }
}

/// PaliGemma running in the server process
///
/// PaliGemma is caption-oriented and always needs an image; prompt-only
/// requests are rejected before touching the model.
pub struct PaligemmaBackend {
    model: Arc<Mutex<Paligemma>>,
}

impl PaligemmaBackend {
    /// Load the model weights; slow on first run while they download
    pub fn load() -> Result<Self, VlmError> {
        tracing::info!(target: TRACING_TARGET, "loading PaliGemma weights");
        let model = Paligemma::new(PaligemmaConfig::default())
            .map_err(|e| VlmError::Unavailable(format!("PaliGemma load failed: {e}")))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait]
impl VlmBackend for PaligemmaBackend {
    fn id(&self) -> &'static str {
        "paligemma"
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
        max_tokens: usize,
    ) -> Result<TextStream, VlmError> {
        let Some(image) = request.image() else {
            return Err(VlmError::InvalidInput(
                "the paligemma backend requires an image".to_string(),
            ));
        };
        let image = to_kornia_image(image)?;
        let prompt = request.prompt_or_default().to_string();
        let model = Arc::clone(&self.model);

        let text = tokio::task::spawn_blocking(move || {
            let mut model = model.lock();
            model
                .inference(&image, &prompt, max_tokens, false)
                .map_err(|e| VlmError::Inference(format!("PaliGemma inference failed: {e}")))
        })
        .await
        .map_err(|e| VlmError::Inference(format!("inference task failed: {e}")))??;

        Ok(chunked_stream(text))
    }
}
