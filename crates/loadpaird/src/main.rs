//! loadpaird — loadpair peer node daemon.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use loadpair_core::config::LoadpairConfig;
use loadpair_services::Node;

mod display;
mod status;

/// How long each task gets to wind down after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load config
    if let Err(e) = LoadpairConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = LoadpairConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        LoadpairConfig::default()
    });
    tracing::info!(
        port_base = config.network.port_base,
        port_count = config.network.port_count,
        subnet_scan = config.discovery.subnet_scan,
        "loadpaird starting"
    );

    // ── Node ─────────────────────────────────────────────────────────────────
    let (snapshot_tx, snapshot_rx) = mpsc::channel::<String>(config.queues.snapshot_buffer.max(1));
    let node = Node::new(config.clone()).start(snapshot_tx);
    tracing::info!(listen_port = node.listen_port(), listening = node.is_listening(), "node ready");

    let mut display_task = tokio::spawn(display::run(snapshot_rx, config.display.clone()));

    // ── Status endpoint ──────────────────────────────────────────────────────
    if config.status.port != 0 {
        let state = status::StatusState {
            identity: node.identity(),
            store: node.store().clone(),
            binding: node.binding().clone(),
        };
        let port = config.status.port;
        tokio::spawn(async move {
            if let Err(e) = status::serve(state, port).await {
                tracing::error!(error = %e, "status server failed");
            }
        });
    }

    // ── Wait for exit ────────────────────────────────────────────────────────
    tokio::select! {
        r = tokio::signal::ctrl_c() => match r {
            Ok(()) => tracing::info!("shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
        },
        r = &mut display_task => tracing::error!("display task exited: {:?}", r),
    }

    node.shutdown(SHUTDOWN_GRACE).await;
    if !display_task.is_finished() {
        // The broadcaster is gone, so the stream ends and the task returns.
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, display_task).await;
    }

    Ok(())
}
