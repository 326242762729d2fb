//! visionchat CLI
//!
//! Command-line interface for the visionchat stack: serve the HTTP
//! API, run one-shot generations without a server, or probe a running
//! instance.

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use vlm_bridge::{BackendKind, VlmEngine};
use vlm_core::GenerateRequest;

use visionchat_server::ServerConfig;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

fn long_version() -> String {
    format!(
        "{} (commit {}, built {})",
        built_info::PKG_VERSION,
        env!("BUILT_GIT_COMMIT_HASH"),
        env!("BUILT_TIME_UTC"),
    )
}

#[derive(Parser)]
#[command(name = "visionchat")]
#[command(version = built_info::PKG_VERSION, long_version = long_version())]
#[command(about = "Image + prompt -> text via a local vision-language model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on (overrides VISIONCHAT_ADDR)
        #[arg(short, long)]
        addr: Option<SocketAddr>,

        /// Backend: ollama, smolvlm, paligemma, or echo
        /// (overrides VISIONCHAT_BACKEND)
        #[arg(short, long)]
        backend: Option<BackendKind>,

        /// Ollama daemon base URL (overrides OLLAMA_URL)
        #[arg(long)]
        ollama_url: Option<String>,

        /// Ollama model tag (overrides OLLAMA_MODEL)
        #[arg(long)]
        ollama_model: Option<String>,

        /// Cap on generated tokens (overrides MAX_NEW_TOKENS)
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Directory of built frontend assets to host
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Generate text for an image and/or prompt without a server
    Infer {
        /// Path to the image file
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Text prompt
        #[arg(short, long)]
        prompt: Option<String>,

        /// Backend: ollama, smolvlm, paligemma, or echo
        #[arg(short, long, default_value = "ollama")]
        backend: BackendKind,

        /// Cap on generated tokens
        #[arg(long, default_value_t = vlm_core::DEFAULT_MAX_TOKENS)]
        max_tokens: usize,
    },

    /// Probe a running server's liveness endpoint
    Health {
        /// Server base URL
        #[arg(short, long, default_value = "http://localhost:8000")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    visionchat_server::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            addr,
            backend,
            ollama_url,
            ollama_model,
            max_tokens,
            static_dir,
        } => {
            let mut config = ServerConfig::from_env()?;
            if let Some(addr) = addr {
                config.listen_addr = addr;
            }
            if let Some(backend) = backend {
                config.engine.backend = backend;
            }
            if let Some(url) = ollama_url {
                config.engine.ollama.base_url = url.trim_end_matches('/').to_string();
            }
            if let Some(model) = ollama_model {
                config.engine.ollama.model = model;
            }
            if let Some(max_tokens) = max_tokens {
                config.engine.max_tokens = max_tokens;
            }
            if let Some(dir) = static_dir {
                config.static_dir = Some(dir);
            }
            visionchat_server::run(config).await
        }
        Commands::Infer {
            image,
            prompt,
            backend,
            max_tokens,
        } => infer(image, prompt, backend, max_tokens).await,
        Commands::Health { url } => health(&url).await,
    }
}

/// Run one generation directly against a backend, streaming to stdout
async fn infer(
    image: Option<PathBuf>,
    prompt: Option<String>,
    backend: BackendKind,
    max_tokens: usize,
) -> Result<()> {
    let image_bytes = match &image {
        Some(path) => {
            Some(std::fs::read(path).with_context(|| format!("reading {}", path.display()))?)
        }
        None => None,
    };
    let request = GenerateRequest::from_parts(image_bytes.as_deref(), prompt)?;

    let mut engine_config = ServerConfig::from_env()?.engine;
    engine_config.backend = backend;
    engine_config.max_tokens = max_tokens;

    let engine = VlmEngine::initialize(&engine_config).await?;
    let mut stream = engine.stream(request).await?;

    let mut stdout = std::io::stdout();
    while let Some(piece) = stream.next().await {
        stdout.write_all(piece?.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    Ok(())
}

/// Hit `/health` on a running server and report the outcome
async fn health(url: &str) -> Result<()> {
    let endpoint = format!("{}/health", url.trim_end_matches('/'));
    let response = reqwest::get(&endpoint)
        .await
        .with_context(|| format!("requesting {endpoint}"))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{status}: {json}"),
        Err(_) => println!("{status}: {body}"),
    }

    if !status.is_success() {
        anyhow::bail!("health probe failed");
    }
    Ok(())
}
