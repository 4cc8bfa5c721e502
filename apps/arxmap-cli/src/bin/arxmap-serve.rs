use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use arxmap_cli::artifacts::read_json;
use arxmap_cli::init_tracing;
use arxmap_cli::serve::router;
use arxmap_core::config::{expand_path, Config};
use arxmap_viz::VisualizationPayload;

#[derive(Parser, Debug)]
#[command(name = "arxmap-serve", about = "Serve paper details from a visualization payload")]
struct ServeCli {
    /// Address to bind (host:port). Overrides `server.bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Payload JSON. Overrides `server.payload_path`.
    #[arg(long)]
    payload: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = ServeCli::parse();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.settings()?;

    let payload_path = cli.payload.unwrap_or_else(|| match &settings.server.payload_path {
        Some(p) => expand_path(p),
        None => settings.output.path(&settings.output.payload_file),
    });
    let payload: VisualizationPayload = read_json(&payload_path)?;
    tracing::info!(path = %payload_path.display(), papers = payload.details.len(), "loaded payload");

    let bind = cli.bind.unwrap_or(settings.server.bind);
    let addr: SocketAddr = bind.parse().with_context(|| format!("invalid bind address {bind}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    println!("arxmap-serve listening on http://{addr}");
    axum::serve(listener, router(payload)).await.context("server shutdown")?;
    Ok(())
}
