//! # Web Registry Node
//!
//! `wr-node --config node.toml`
//!
//! Serves the peer protocol on `network.peer_listen` and the client JSON-RPC
//! API plus `/metrics` on `network.client_listen` until Ctrl+C.

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use node_runtime::{peer_router, NodeConfig, RegistryNode, Transport};
use registry_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use shared_types::NodeId;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use wr_05_client_api::build_router;

/// Replicated web-bundle registry node.
#[derive(Debug, Parser)]
#[command(name = "wr-node", version, about)]
struct Cli {
    /// Node configuration file (TOML).
    #[arg(short, long, env = "WR_CONFIG")]
    config: PathBuf,

    /// Overrides `node.data_dir`.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Overrides `node.key_seed` (hex).
    #[arg(long)]
    key_seed: Option<String>,
}

async fn metrics() -> impl IntoResponse {
    match encode_metrics() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = NodeConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(dir) = cli.data_dir {
        config.node.data_dir = Some(dir);
    }
    if let Some(seed) = cli.key_seed {
        config.node.key_seed = seed;
    }
    config.validate()?;

    let node_label = NodeId::from(config.key_pair()?.public_key()).to_hex();
    let _telemetry = init_telemetry(TelemetryConfig::for_node(&node_label[..8]))?;

    let node = RegistryNode::open(
        config.clone(),
        Transport::Http {
            request_timeout: config.network.request_timeout(),
        },
    )?;
    node.start();

    let (stop, stopped) = watch::channel(false);

    let peer_listener = TcpListener::bind(&config.network.peer_listen)
        .await
        .with_context(|| format!("binding peer listener {}", config.network.peer_listen))?;
    let client_listener = TcpListener::bind(&config.network.client_listen)
        .await
        .with_context(|| format!("binding client listener {}", config.network.client_listen))?;

    let peer_app = peer_router(node.clone());
    let client_app = build_router(node.client()).route("/metrics", get(metrics));

    let peer_server = tokio::spawn(serve(peer_listener, peer_app, stopped.clone()));
    let client_server = tokio::spawn(serve(client_listener, client_app, stopped));

    info!(
        node = %node.node_id(),
        peer = %config.network.peer_listen,
        client = %config.network.client_listen,
        "Node is running. Press Ctrl+C to stop."
    );
    tokio::signal::ctrl_c().await?;

    info!("Initiating graceful shutdown...");
    let _ = stop.send(true);
    node.stop().await;
    for server in [peer_server, client_server] {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Server failed"),
            Err(e) => error!(error = %e, "Server task panicked"),
        }
    }
    Ok(())
}

async fn serve(
    listener: TcpListener,
    app: axum::Router,
    mut stopped: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = stopped.wait_for(|stop| *stop).await;
        })
        .await
}
