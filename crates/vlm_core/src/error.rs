//! Error taxonomy for the generation pipeline
//!
//! Every backend and transport maps its failures into [`VlmError`] so
//! callers can distinguish bad requests from broken infrastructure.

use thiserror::Error;

/// Failures that can occur between receiving a request and finishing
/// a generation.
#[derive(Debug, Error)]
pub enum VlmError {
    /// The request cannot be served no matter which model is loaded
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The uploaded bytes could not be decoded as an image
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The backend never initialized or its daemon is unreachable
    #[error("model unavailable: {0}")]
    Unavailable(String),

    /// The model accepted the request but generation failed
    #[error("inference failed: {0}")]
    Inference(String),
}

impl VlmError {
    /// True when the caller can fix the failure by changing the request
    pub fn is_client_error(&self) -> bool {
        matches!(self, VlmError::InvalidInput(_) | VlmError::Decode(_))
    }
}
