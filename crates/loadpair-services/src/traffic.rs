//! Traffic generators — one timer loop per category.
//!
//! Interval shapes:
//!   fast     uniform around 200 ms (± 50)
//!   dynamic  50 ms with probability 0.8, otherwise 3000 ms
//!   slow     uniform around 1000 ms (± 200)
//!
//! Each tick sends the category tag to the bound peer over a fresh
//! connection. Nothing is sent while unbound. Failures are logged and the
//! next tick proceeds as scheduled.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast;

use loadpair_core::config::TrafficConfig;
use loadpair_core::Category;

use crate::link::send_message;
use crate::peer::PeerBinding;

/// How a generator picks its next sleep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    /// Uniform on `[base - jitter, base + jitter]`.
    Jitter { base: Duration, jitter: Duration },
    /// `short` with probability `short_probability`, otherwise `long`.
    TwoPoint {
        short: Duration,
        long: Duration,
        short_probability: f64,
    },
}

impl Schedule {
    pub fn for_category(category: Category, config: &TrafficConfig) -> Self {
        match category {
            Category::Fast => Schedule::Jitter {
                base: Duration::from_millis(config.fast_base_ms),
                jitter: Duration::from_millis(config.fast_jitter_ms),
            },
            Category::Dynamic => Schedule::TwoPoint {
                short: Duration::from_millis(config.dynamic_short_ms),
                long: Duration::from_millis(config.dynamic_long_ms),
                short_probability: if config.dynamic_short_probability.is_nan() {
                    0.0
                } else {
                    config.dynamic_short_probability.clamp(0.0, 1.0)
                },
            },
            Category::Slow => Schedule::Jitter {
                base: Duration::from_millis(config.slow_base_ms),
                jitter: Duration::from_millis(config.slow_jitter_ms),
            },
        }
    }

    pub fn next_interval<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            Schedule::Jitter { base, jitter } => {
                let low = base.saturating_sub(jitter);
                let high = base + jitter;
                rng.gen_range(low..=high)
            }
            Schedule::TwoPoint {
                short,
                long,
                short_probability,
            } => {
                if rng.gen_bool(short_probability) {
                    short
                } else {
                    long
                }
            }
        }
    }
}

/// One generator loop.
pub struct TrafficGenerator {
    category: Category,
    schedule: Schedule,
    binding: PeerBinding,
    connect_timeout: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl TrafficGenerator {
    pub fn new(
        category: Category,
        schedule: Schedule,
        binding: PeerBinding,
        connect_timeout: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            category,
            schedule,
            binding,
            connect_timeout,
            shutdown,
        }
    }

    /// Runs until the shutdown signal fires.
    pub async fn run(mut self) {
        let mut rng = StdRng::from_entropy();
        let mut sent: u64 = 0;
        let mut failed: u64 = 0;

        tracing::debug!(category = %self.category, schedule = ?self.schedule, "traffic generator starting");

        loop {
            let wait = self.schedule.next_interval(&mut rng);

            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::debug!(category = %self.category, sent, failed, "traffic generator shutting down");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            let Some(peer) = self.binding.get() else {
                continue;
            };

            match send_message(peer, self.category.tag(), self.connect_timeout).await {
                Ok(()) => {
                    sent += 1;
                    tracing::trace!(category = %self.category, %peer, sent, "traffic sent");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(category = %self.category, error = %e, "failed to send to peer");
                }
            }
        }
    }
}
