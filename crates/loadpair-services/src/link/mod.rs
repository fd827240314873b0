//! Peer link — the one-message-per-connection TCP protocol.
//!
//! The listener side answers handshakes and feeds traffic into the queue
//! store; the client side probes candidates and sends traffic.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use loadpair_core::config::NetworkConfig;

pub mod client;
pub mod listener;

pub use client::{probe, send_message};
pub use listener::LinkListener;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("connect to {0} failed: {1}")]
    Connect(SocketAddr, io::Error),
    #[error("connect to {0} timed out")]
    ConnectTimeout(SocketAddr),
    #[error("write to {0} failed: {1}")]
    Write(SocketAddr, io::Error),
    #[error("read from {0} failed: {1}")]
    Read(SocketAddr, io::Error),
    #[error("no response from {0} in time")]
    ReadTimeout(SocketAddr),
    #[error("{0} did not acknowledge the handshake")]
    NoAcknowledgment(SocketAddr),
}

/// Timeouts for short-lived outbound connections.
#[derive(Debug, Clone, Copy)]
pub struct LinkTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl LinkTimeouts {
    pub fn from_config(network: &NetworkConfig) -> Self {
        Self {
            connect: network.connect_timeout(),
            read: network.read_timeout(),
        }
    }
}

impl Default for LinkTimeouts {
    fn default() -> Self {
        Self::from_config(&NetworkConfig::default())
    }
}
