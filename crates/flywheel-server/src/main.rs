//! Flywheel server binary.

use anyhow::Context;
use clap::Parser;
use flywheel_server::{router, AppState, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "flywheel-server", about = "Fine-tuning job orchestrator and experiment aggregator")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address, overriding the configuration file.
    #[arg(long)]
    address: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServerConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ServerConfig::default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.as_deref().unwrap_or("info")))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state = Arc::new(AppState::new());
    for name in &config.base_models {
        let model = state.registry.register_base(name).await?;
        info!(model_id = %model.id, model = %name, "Seeded base model");
    }

    let mut app = router(state);
    if config.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = args.address.unwrap_or(config.address);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Flywheel server started");
    axum::serve(listener, app).await?;
    Ok(())
}
