//! Queue store — three independently decaying traffic counters.
//!
//! Inbound traffic increments a counter by one; a fixed-period decay tick
//! pulls every counter down by one. A counter found above the ceiling on a
//! tick resets to zero instead, giving a sawtooth rather than a plateau.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use loadpair_core::{Category, QueueSnapshot};

struct Counters {
    fast: AtomicU32,
    dynamic: AtomicU32,
    slow: AtomicU32,
    ceiling: u32,
}

impl Counters {
    fn slot(&self, category: Category) -> &AtomicU32 {
        match category {
            Category::Fast => &self.fast,
            Category::Dynamic => &self.dynamic,
            Category::Slow => &self.slow,
        }
    }
}

/// Shared handle to the three counters.
#[derive(Clone)]
pub struct QueueStore {
    counters: Arc<Counters>,
}

impl QueueStore {
    pub fn new(initial_value: u32, ceiling: u32) -> Self {
        Self {
            counters: Arc::new(Counters {
                fast: AtomicU32::new(initial_value),
                dynamic: AtomicU32::new(initial_value),
                slow: AtomicU32::new(initial_value),
                ceiling,
            }),
        }
    }

    /// Record one arrival. Returns the new value, which may exceed the ceiling
    /// until the next decay tick.
    pub fn increment(&self, category: Category) -> u32 {
        self.counters
            .slot(category)
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1)
    }

    /// Apply one decay step to every counter.
    pub fn decay(&self) {
        let ceiling = self.counters.ceiling;
        for category in Category::ALL {
            let before = self
                .counters
                .slot(category)
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                    Some(decayed(v, ceiling))
                })
                .unwrap_or_else(|v| v);
            if before > ceiling {
                tracing::debug!(%category, before, "queue over ceiling, reset");
            }
        }
    }

    pub fn value(&self, category: Category) -> u32 {
        self.counters.slot(category).load(Ordering::Acquire)
    }

    pub fn ceiling(&self) -> u32 {
        self.counters.ceiling
    }

    pub fn snapshot(&self, connected: bool) -> QueueSnapshot {
        QueueSnapshot {
            fast: self.value(Category::Fast),
            dynamic: self.value(Category::Dynamic),
            slow: self.value(Category::Slow),
            connected,
        }
    }
}

fn decayed(value: u32, ceiling: u32) -> u32 {
    if value > ceiling {
        0
    } else {
        value.saturating_sub(1)
    }
}

/// Decay all counters once per `period`. The first step happens one period
/// after start.
///
/// Runs until the shutdown signal fires.
pub async fn decay_loop(
    store: QueueStore,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!("decay loop shutting down");
                return;
            }
            _ = interval.tick() => store.decay(),
        }
    }
}
