//! Request model for visionchat
//!
//! A [`GenerateRequest`] is the validated unit of work handed to a
//! model backend: the image (if any) is already decoded and normalized,
//! and the nothing-to-do case has already been rejected.

use image::RgbImage;

use crate::error::VlmError;
use crate::imagery;

/// Default cap on generated tokens per request
pub const DEFAULT_MAX_TOKENS: usize = 500;

/// Characters per streamed chunk for backends that generate the whole
/// answer before streaming it out
pub const STREAM_CHUNK_CHARS: usize = 50;

/// Instruction used when the caller supplies an image but no prompt
pub const DEFAULT_IMAGE_PROMPT: &str = "Describe the image.";

/// A validated generation request
///
/// At least one of image and prompt is present. Whitespace-only prompts
/// count as absent.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    image: Option<RgbImage>,
    prompt: Option<String>,
}

impl GenerateRequest {
    /// Build a request from raw upload parts
    ///
    /// Decodes and normalizes the image before any backend sees the
    /// request, so decode failures surface as client errors and never
    /// reach a model.
    pub fn from_parts(
        image_bytes: Option<&[u8]>,
        prompt: Option<String>,
    ) -> Result<Self, VlmError> {
        let prompt = prompt
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        let image = match image_bytes {
            Some(bytes) if !bytes.is_empty() => Some(imagery::decode_rgb(bytes)?),
            _ => None,
        };

        if image.is_none() && prompt.is_none() {
            return Err(VlmError::InvalidInput(
                "no image or text prompt provided".to_string(),
            ));
        }

        Ok(Self { image, prompt })
    }

    /// The normalized image, if one was uploaded
    pub fn image(&self) -> Option<&RgbImage> {
        self.image.as_ref()
    }

    /// The trimmed prompt, if one was provided
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// The prompt to send to a vision model, falling back to the
    /// caption instruction for image-only requests
    pub fn prompt_or_default(&self) -> &str {
        self.prompt().unwrap_or(DEFAULT_IMAGE_PROMPT)
    }
}
