//! Core types for visionchat
//!
//! This crate provides the request model, error taxonomy, and image
//! handling shared by every model backend and by the HTTP service.

pub mod chunk;
pub mod error;
pub mod imagery;
pub mod types;

pub use error::VlmError;
pub use types::*;
