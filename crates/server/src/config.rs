//! Environment-driven server configuration

use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use vlm_bridge::{BackendKind, EngineConfig, OllamaConfig};

/// Runtime configuration, read once at startup
///
/// Every knob has a default, so a bare `visionchat-server` serves on
/// localhost against a local Ollama daemon.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind (`VISIONCHAT_ADDR`, default 127.0.0.1:8000)
    pub listen_addr: SocketAddr,
    /// Engine settings assembled from the `VISIONCHAT_BACKEND`,
    /// `OLLAMA_*` and `MAX_NEW_TOKENS` variables
    pub engine: EngineConfig,
    /// Directory of built frontend assets to host
    /// (`VISIONCHAT_STATIC_DIR`, default none)
    pub static_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let listen_addr = match env::var("VISIONCHAT_ADDR") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("VISIONCHAT_ADDR '{raw}': {e}"))?,
            Err(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000),
        };

        let backend = match env::var("VISIONCHAT_BACKEND") {
            Ok(raw) => raw
                .parse::<BackendKind>()
                .map_err(|e| anyhow::anyhow!("VISIONCHAT_BACKEND: {e}"))?,
            Err(_) => BackendKind::Ollama,
        };

        let mut ollama = OllamaConfig::default();
        if let Ok(url) = env::var("OLLAMA_URL") {
            ollama.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = env::var("OLLAMA_MODEL") {
            ollama.model = model;
        }
        if let Some(timeout) = env::var("OLLAMA_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            ollama.timeout_secs = timeout;
        }

        let max_tokens = env::var("MAX_NEW_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(vlm_core::DEFAULT_MAX_TOKENS);

        let static_dir = env::var("VISIONCHAT_STATIC_DIR").ok().map(PathBuf::from);

        Ok(Self {
            listen_addr,
            engine: EngineConfig {
                backend,
                ollama,
                max_tokens,
            },
            static_dir,
        })
    }
}
