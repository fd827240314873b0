//! Peer binding — the single peer address this node talks to.
//!
//! Starts unbound and is set at most once for the lifetime of the node.
//! Both the discovery client path and the inbound DISCOVER path race to set
//! it; the first writer wins and every later attempt is a no-op.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Shared handle to the bind-once peer address.
#[derive(Clone)]
pub struct PeerBinding {
    tx: Arc<watch::Sender<Option<SocketAddr>>>,
}

impl PeerBinding {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Bind `addr` if nothing is bound yet. Returns true for the winning call.
    ///
    /// The check and the write happen under the channel's lock, so concurrent
    /// callers can never both observe "unbound".
    pub fn try_bind(&self, addr: SocketAddr) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(addr);
            true
        })
    }

    pub fn get(&self) -> Option<SocketAddr> {
        *self.tx.borrow()
    }

    pub fn is_bound(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until a peer is bound and return its address.
    pub async fn bound(&self) -> SocketAddr {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(addr) = *rx.borrow_and_update() {
                return addr;
            }
            // `self` owns the sender, so `changed` cannot report closed here.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Wait up to `window` for a peer to be bound.
    pub async fn bound_within(&self, window: Duration) -> Option<SocketAddr> {
        tokio::time::timeout(window, self.bound()).await.ok()
    }
}

impl Default for PeerBinding {
    fn default() -> Self {
        Self::new()
    }
}
