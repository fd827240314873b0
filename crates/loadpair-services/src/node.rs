//! Node — composition root for one loadpair instance.
//!
//! Owns the queue store and peer binding, allocates the listen port and
//! starts every background task. The returned handle can signal shutdown
//! and join them all.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use loadpair_core::config::LoadpairConfig;
use loadpair_core::{Category, QueueSnapshot};

use crate::broadcaster::StateBroadcaster;
use crate::discovery::{DiscoveryState, PeerDiscovery};
use crate::link::LinkListener;
use crate::peer::PeerBinding;
use crate::port::find_free_port;
use crate::queue::{decay_loop, QueueStore};
use crate::traffic::{Schedule, TrafficGenerator};

/// Fixed for the lifetime of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeIdentity {
    pub listen_port: u16,
}

pub struct Node {
    config: LoadpairConfig,
}

struct NamedTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Running node. Dropping it also stops every task, since the shutdown
/// channel closes with it.
pub struct NodeHandle {
    identity: NodeIdentity,
    store: QueueStore,
    binding: PeerBinding,
    shutdown: broadcast::Sender<()>,
    tasks: Vec<NamedTask>,
    listening: bool,
}

impl Node {
    pub fn new(config: LoadpairConfig) -> Self {
        Self { config }
    }

    /// Allocate a port and start every task. Must be called inside a tokio
    /// runtime.
    ///
    /// The first snapshot is pushed to `snapshots` before this returns.
    pub fn start(self, snapshots: mpsc::Sender<String>) -> NodeHandle {
        let config = self.config;
        let network = &config.network;

        let store = QueueStore::new(config.queues.initial_value, config.queues.ceiling);
        let binding = PeerBinding::new();
        let (shutdown, _) = broadcast::channel::<()>(1);
        let mut tasks = Vec::new();

        let listen_port = find_free_port(&network.bind_host, network.port_base, network.port_end());
        let identity = NodeIdentity { listen_port };
        tracing::info!(port = listen_port, "starting node");

        let mut broadcaster = StateBroadcaster::new(store.clone(), binding.clone(), snapshots);
        broadcaster.emit();

        // ── Peer link listener ───────────────────────────────────────────────
        let listening = match LinkListener::bind(
            &network.bind_host,
            listen_port,
            store.clone(),
            binding.clone(),
            network.read_timeout(),
            network.max_message_bytes,
            shutdown.subscribe(),
        ) {
            Ok(listener) => {
                tasks.push(NamedTask {
                    name: "listener",
                    handle: tokio::spawn(listener.run()),
                });
                true
            }
            Err(e) => {
                tracing::error!(
                    critical = true,
                    port = listen_port,
                    error = %e,
                    "failed to start peer link listener, node is undiscoverable"
                );
                false
            }
        };

        // ── Discovery ────────────────────────────────────────────────────────
        let discovery = PeerDiscovery::new(listen_port, &config, binding.clone(), shutdown.subscribe());
        tasks.push(NamedTask {
            name: "discovery",
            handle: tokio::spawn(async move {
                match discovery.run().await {
                    DiscoveryState::Bound(peer) => {
                        tracing::info!(%peer, "peer discovery complete")
                    }
                    DiscoveryState::Searching => {
                        tracing::debug!("peer discovery stopped before finding a peer")
                    }
                }
            }),
        });

        // ── Traffic generators ───────────────────────────────────────────────
        for category in Category::ALL {
            let generator = TrafficGenerator::new(
                category,
                Schedule::for_category(category, &config.traffic),
                binding.clone(),
                network.connect_timeout(),
                shutdown.subscribe(),
            );
            tasks.push(NamedTask {
                name: generator_task_name(category),
                handle: tokio::spawn(generator.run()),
            });
        }

        // ── Queue decay and snapshots ────────────────────────────────────────
        tasks.push(NamedTask {
            name: "decay",
            handle: tokio::spawn(decay_loop(
                store.clone(),
                config.queues.decay_interval(),
                shutdown.subscribe(),
            )),
        });
        tasks.push(NamedTask {
            name: "broadcaster",
            handle: tokio::spawn(
                broadcaster.run(config.queues.snapshot_interval(), shutdown.subscribe()),
            ),
        });

        NodeHandle {
            identity,
            store,
            binding,
            shutdown,
            tasks,
            listening,
        }
    }
}

fn generator_task_name(category: Category) -> &'static str {
    match category {
        Category::Fast => "traffic-fast",
        Category::Dynamic => "traffic-dynamic",
        Category::Slow => "traffic-slow",
    }
}

impl NodeHandle {
    pub fn identity(&self) -> NodeIdentity {
        self.identity
    }

    pub fn listen_port(&self) -> u16 {
        self.identity.listen_port
    }

    /// False when the listen port could not be bound.
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.binding.get()
    }

    pub fn binding(&self) -> &PeerBinding {
        &self.binding
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.store.snapshot(self.binding.is_bound())
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name).collect()
    }

    /// Signal every task to stop and wait for them, giving each up to
    /// `grace` before it is aborted.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown.send(());

        for task in self.tasks {
            let abort = task.handle.abort_handle();
            match tokio::time::timeout(grace, task.handle).await {
                Ok(Ok(())) => tracing::debug!(task = task.name, "task stopped"),
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => tracing::error!(task = task.name, error = %e, "task panicked"),
                Err(_) => {
                    tracing::warn!(task = task.name, "task did not stop in time, aborting");
                    abort.abort();
                }
            }
        }
        tracing::info!(port = self.identity.listen_port, "node stopped");
    }
}
