//! Model backends for visionchat
//!
//! Bridges validated generation requests to a concrete model runtime:
//! a local Ollama daemon over HTTP, in-process SmolVLM/PaliGemma
//! (behind the `local` feature), or a deterministic echo backend for
//! development and tests. The [`engine::VlmEngine`] wraps whichever
//! backend is configured and serializes access to it.

pub mod backend;
pub mod echo;
pub mod engine;
#[cfg(feature = "local")]
pub mod local;
pub mod ollama;

pub use backend::{BackendKind, TextStream, VlmBackend};
pub use echo::EchoBackend;
pub use engine::{EngineConfig, GenerationStream, VlmEngine};
pub use ollama::{OllamaBackend, OllamaClient, OllamaConfig};
