//! visionchat REST API server binary

use visionchat_server::{init_tracing, run, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        addr = %config.listen_addr,
        backend = %config.engine.backend,
        "starting visionchat server"
    );

    run(config).await
}
