//! State broadcaster — periodic queue snapshots for the display.
//!
//! Snapshots go out as JSON strings on a bounded channel. A consumer that
//! falls behind loses snapshots rather than slowing the tick.

use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::peer::PeerBinding;
use crate::queue::QueueStore;

/// Result of a single emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    Sent,
    /// Channel full; this snapshot was discarded.
    Dropped,
    /// Serialization failed; nothing was sent.
    Skipped,
    /// The consumer is gone.
    Closed,
}

pub struct StateBroadcaster {
    store: QueueStore,
    binding: PeerBinding,
    tx: mpsc::Sender<String>,
    dropped: u64,
}

impl StateBroadcaster {
    pub fn new(store: QueueStore, binding: PeerBinding, tx: mpsc::Sender<String>) -> Self {
        Self {
            store,
            binding,
            tx,
            dropped: 0,
        }
    }

    /// Snapshot the counters and link state and push them without waiting.
    pub fn emit(&mut self) -> Emit {
        let snapshot = self.store.snapshot(self.binding.is_bound());
        let json = match snapshot.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize snapshot");
                return Emit::Skipped;
            }
        };

        match self.tx.try_send(json) {
            Ok(()) => Emit::Sent,
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                tracing::debug!(dropped = self.dropped, "snapshot consumer behind, dropping");
                Emit::Dropped
            }
            Err(TrySendError::Closed(_)) => Emit::Closed,
        }
    }

    /// Emit every `period`, starting one period from now. The caller is
    /// expected to have emitted the startup snapshot already.
    ///
    /// Runs until shutdown, or until the consumer goes away.
    pub async fn run(mut self, period: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::debug!(dropped = self.dropped, "state broadcaster shutting down");
                    return;
                }
                _ = interval.tick() => {
                    if self.emit() == Emit::Closed {
                        tracing::info!("snapshot consumer closed, state broadcaster stopping");
                        return;
                    }
                }
            }
        }
    }
}
