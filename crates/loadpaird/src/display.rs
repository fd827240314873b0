//! Snapshot consumer.
//!
//! Reads the node's snapshot stream, reports link transitions and, when
//! enabled, prints each snapshot as a JSON line on stdout for an external
//! renderer to pick up.

use tokio::sync::mpsc;

use loadpair_core::config::DisplayConfig;
use loadpair_core::QueueSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkChange {
    Up,
    Down,
}

/// Tracks the last link state seen on the stream.
#[derive(Debug, Default)]
pub struct DisplayState {
    connected: Option<bool>,
    received: u64,
}

impl DisplayState {
    /// Record a snapshot; returns the link change it represents, if any.
    /// The very first snapshot always reports its state.
    pub fn observe(&mut self, snapshot: &QueueSnapshot) -> Option<LinkChange> {
        self.received += 1;
        if self.connected == Some(snapshot.connected) {
            return None;
        }
        self.connected = Some(snapshot.connected);
        Some(if snapshot.connected {
            LinkChange::Up
        } else {
            LinkChange::Down
        })
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

pub async fn run(mut rx: mpsc::Receiver<String>, settings: DisplayConfig) {
    let mut state = DisplayState::default();

    while let Some(json) = rx.recv().await {
        let snapshot = match QueueSnapshot::from_json(&json) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable snapshot");
                continue;
            }
        };

        match state.observe(&snapshot) {
            Some(LinkChange::Up) => tracing::info!("peer link up"),
            Some(LinkChange::Down) => tracing::info!("waiting for peer"),
            None => {}
        }

        tracing::trace!(
            fast = snapshot.fast,
            dynamic = snapshot.dynamic,
            slow = snapshot.slow,
            connected = snapshot.connected,
            "snapshot"
        );

        if settings.print_snapshots {
            println!("{json}");
        }
    }

    tracing::debug!(received = state.received(), "snapshot stream closed");
}
