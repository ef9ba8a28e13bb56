//! EscrowCore Engine Binary
//!
//! Serves the escrow protocol over line-delimited JSON, runs the
//! pending-timeout sweeper, and exposes Prometheus metrics.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use escrowcore_engine::{EngineConfig, EscrowEngine, EscrowService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting EscrowCore engine");

    // Load configuration
    let config = EngineConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    // Generate node ID if not provided
    let node_id = config
        .node_id
        .clone()
        .unwrap_or_else(|| format!("engine-{}", uuid::Uuid::new_v4()));
    info!(node_id = %node_id, "Node ID assigned");

    let engine = Arc::new(EscrowEngine::new(config.clone()));
    let service = Arc::new(EscrowService::new(engine.clone()));

    // Background sweeper
    let sweeper = tokio::spawn(escrowcore_engine::sweeper::run_sweep_loop(engine.clone()));

    // Metrics exposition
    let metrics_task = if config.server.metrics_enabled {
        let listener = TcpListener::bind((
            config.server.listen_addr.as_str(),
            config.server.metrics_port,
        ))
        .await?;
        info!(port = config.server.metrics_port, "Metrics listener started");
        Some(tokio::spawn(serve_metrics(listener, engine.clone())))
    } else {
        None
    };

    let listener = TcpListener::bind((
        config.server.listen_addr.as_str(),
        config.server.listen_port,
    ))
    .await?;
    info!(
        node_id = %node_id,
        listen_addr = %config.server.listen_addr,
        listen_port = config.server.listen_port,
        "Engine accepting requests"
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "Client connected");
                        let service = service.clone();
                        tokio::spawn(serve_connection(service, stream));
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    sweeper.abort();
    if let Some(task) = metrics_task {
        task.abort();
    }
    info!("Engine shutdown complete");
    Ok(())
}

/// Serve one client: one JSON request per line, one JSON response per line.
async fn serve_connection(service: Arc<EscrowService>, stream: TcpStream) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let mut response = service.handle_line(&line);
                response.push('\n');
                if writer.write_all(response.as_bytes()).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Read failed, dropping connection");
                break;
            }
        }
    }
}

/// Minimal Prometheus text exposition. One response per connection.
async fn serve_metrics(listener: TcpListener, engine: Arc<EscrowEngine>) {
    loop {
        match listener.accept().await {
            Ok((mut stream, _)) => {
                let body = engine.metrics().to_prometheus();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
            Err(e) => {
                warn!(error = %e, "Metrics accept failed");
            }
        }
    }
}
