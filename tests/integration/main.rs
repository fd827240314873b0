//! loadpair integration test harness.
//!
//! Every test runs real nodes in-process on loopback. Each test owns a
//! distinct port range so tests can run in parallel without one node
//! discovering another test's nodes. Subnet scanning is always off.
//!
//!   cargo test --test integration

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::mpsc;

use loadpair_core::config::LoadpairConfig;
use loadpair_services::{Node, NodeHandle};

mod lifecycle;
mod pairing;
mod traffic;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const GRACE: Duration = Duration::from_secs(2);

/// Loopback-only config over `port_base..port_base + port_count`.
pub fn node_config(port_base: u16, port_count: u16) -> LoadpairConfig {
    let mut config = LoadpairConfig::default();
    config.network.bind_host = "127.0.0.1".into();
    config.network.port_base = port_base;
    config.network.port_count = port_count;
    config.network.connect_timeout_ms = 300;
    config.network.read_timeout_ms = 500;
    config.discovery.subnet_scan = false;
    config.discovery.retry_window_ms = 300;
    config
}

/// A running node together with its snapshot stream.
pub struct TestNode {
    pub handle: NodeHandle,
    pub snapshots: mpsc::Receiver<String>,
}

impl TestNode {
    pub fn start(config: LoadpairConfig) -> Self {
        let (tx, snapshots) = mpsc::channel(config.queues.snapshot_buffer.max(1));
        let handle = Node::new(config).start(tx);
        assert!(handle.is_listening(), "node failed to bind its listen port");
        Self { handle, snapshots }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.handle.listen_port()))
    }

    pub async fn stop(self) {
        self.handle.shutdown(GRACE).await;
    }
}

/// Poll `check` every 20ms until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, what: &str, check: impl Fn() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("timed out after {:?} waiting for {}", timeout, what);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
