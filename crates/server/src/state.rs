//! Shared application state

use std::sync::Arc;

use vlm_bridge::VlmEngine;
use vlm_core::VlmError;

/// Outcome of the one-time engine initialization
///
/// Captured at startup and never retried: a failed load answers every
/// generation request with the same error until the process restarts.
pub enum EngineSlot {
    Ready(VlmEngine),
    Failed(String),
}

/// State handed to every request handler
#[derive(Clone)]
pub struct AppState {
    engine: Arc<EngineSlot>,
}

impl AppState {
    /// Capture the engine initialization outcome
    pub fn new(outcome: Result<VlmEngine, VlmError>) -> Self {
        let slot = match outcome {
            Ok(engine) => {
                tracing::info!(backend = engine.backend_id(), "model backend initialized");
                EngineSlot::Ready(engine)
            }
            Err(error) => {
                tracing::error!(
                    %error,
                    "model backend failed to initialize; requests will be rejected until restart"
                );
                EngineSlot::Failed(error.to_string())
            }
        };

        Self {
            engine: Arc::new(slot),
        }
    }

    /// The engine, or the captured initialization failure
    pub fn engine(&self) -> Result<&VlmEngine, VlmError> {
        match self.engine.as_ref() {
            EngineSlot::Ready(engine) => Ok(engine),
            EngineSlot::Failed(reason) => Err(VlmError::Unavailable(reason.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlm_bridge::EchoBackend;

    #[test]
    fn test_ready_state_exposes_engine() {
        let state = AppState::new(Ok(VlmEngine::with_backend(Box::new(EchoBackend), 500)));
        assert!(state.engine().is_ok());
    }

    #[test]
    fn test_failed_state_repeats_the_failure() {
        let state = AppState::new(Err(VlmError::Unavailable("weights missing".into())));

        for _ in 0..2 {
            match state.engine() {
                Err(VlmError::Unavailable(reason)) => {
                    assert!(reason.contains("weights missing"))
                }
                _ => panic!("expected unavailable error"),
            }
        }
    }
}
