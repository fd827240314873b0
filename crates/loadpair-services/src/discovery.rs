//! Peer discovery — find the one sibling node.
//!
//! Each round probes every port of the range on loopback in parallel, then,
//! if nothing answered, every host of the local /24 on every port. Between
//! rounds it waits for the listener to be discovered by someone else. The
//! search ends for good once the peer binding is set by either path.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Semaphore};

use loadpair_core::config::LoadpairConfig;

use crate::link::{probe, LinkTimeouts};
use crate::peer::PeerBinding;

/// Where discovery ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Searching,
    Bound(SocketAddr),
}

pub struct PeerDiscovery {
    search: Search,
    shutdown: broadcast::Receiver<()>,
}

/// Everything a round needs, kept apart from the shutdown receiver so both
/// can be borrowed at once.
struct Search {
    own_port: u16,
    ports: Range<u16>,
    binding: PeerBinding,
    timeouts: LinkTimeouts,
    subnet_scan: bool,
    retry_window: Duration,
    max_concurrent_probes: usize,
}

impl PeerDiscovery {
    pub fn new(
        own_port: u16,
        config: &LoadpairConfig,
        binding: PeerBinding,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            search: Search {
                own_port,
                ports: config.network.port_base..config.network.port_end(),
                binding,
                timeouts: LinkTimeouts::from_config(&config.network),
                subnet_scan: config.discovery.subnet_scan,
                retry_window: config.discovery.retry_window(),
                max_concurrent_probes: config.discovery.max_concurrent_probes.max(1),
            },
            shutdown,
        }
    }

    /// Search until a peer is bound or shutdown is signalled.
    ///
    /// Returns `Searching` only when interrupted by shutdown.
    pub async fn run(mut self) -> DiscoveryState {
        let search = &self.search;
        let mut round: u64 = 0;

        loop {
            if let Some(peer) = search.binding.get() {
                tracing::info!(%peer, "already connected to peer");
                return DiscoveryState::Bound(peer);
            }

            round += 1;
            tracing::debug!(round, ports = ?search.ports, "discovery round starting");

            let found = tokio::select! {
                _ = self.shutdown.recv() => return search.interrupted(),
                found = search.round() => found,
            };
            if let Some(peer) = search.settled(found) {
                return DiscoveryState::Bound(peer);
            }

            tracing::info!(
                round,
                retry_ms = search.retry_window.as_millis() as u64,
                "no peers found, waiting before next round"
            );

            let bound = tokio::select! {
                _ = self.shutdown.recv() => return search.interrupted(),
                bound = search.binding.bound_within(search.retry_window) => bound,
            };
            if let Some(peer) = bound {
                tracing::info!(%peer, "peer connected to us while waiting");
                return DiscoveryState::Bound(peer);
            }
        }
    }
}

impl Search {
    fn interrupted(&self) -> DiscoveryState {
        tracing::info!("discovery shutting down");
        match self.binding.get() {
            Some(peer) => DiscoveryState::Bound(peer),
            None => DiscoveryState::Searching,
        }
    }

    /// Peer at the end of a round: our own find, or whoever bound us through
    /// the listener while the round ran.
    fn settled(&self, found: Option<SocketAddr>) -> Option<SocketAddr> {
        found.or_else(|| {
            let peer = self.binding.get()?;
            tracing::info!(%peer, "peer connected to us during round");
            Some(peer)
        })
    }

    /// One full round: loopback first, then the local subnet.
    async fn round(&self) -> Option<SocketAddr> {
        let loopback = loopback_targets(self.ports.clone(), self.own_port);
        if let Some(peer) = self.probe_all(loopback).await {
            return Some(peer);
        }

        if !self.subnet_scan {
            return None;
        }
        let Some(local) = local_ipv4() else {
            tracing::debug!("no local IPv4 address, skipping subnet scan");
            return None;
        };

        let targets = subnet_targets(local, self.ports.clone(), self.own_port);
        tracing::debug!(%local, targets = targets.len(), "scanning local subnet");
        self.probe_all(targets).await
    }

    /// Probe every target in parallel and fan the outcomes back in.
    ///
    /// The first acknowledgment is bound; outstanding probes are aborted.
    async fn probe_all(&self, targets: Vec<SocketAddr>) -> Option<SocketAddr> {
        if targets.is_empty() {
            return None;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Option<SocketAddr>>();
        let permits = Arc::new(Semaphore::new(self.max_concurrent_probes));
        let mut handles = Vec::with_capacity(targets.len());

        for target in targets {
            let tx = tx.clone();
            let permits = permits.clone();
            let binding = self.binding.clone();
            let own_port = self.own_port;
            let timeouts = self.timeouts;

            handles.push(tokio::spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    // Someone found us in the meantime; don't offer ourselves again.
                    Ok(_permit) if binding.is_bound() => None,
                    Ok(_permit) => match probe(target.ip(), target.port(), own_port, timeouts).await {
                        Ok(addr) => Some(addr),
                        Err(e) => {
                            tracing::trace!(%target, error = %e, "probe failed");
                            None
                        }
                    },
                    Err(_) => None,
                };
                let _ = tx.send(outcome);
            }));
        }
        drop(tx);

        let mut found = None;
        while let Some(outcome) = rx.recv().await {
            if let Some(addr) = outcome {
                found = Some(addr);
                break;
            }
        }
        for handle in &handles {
            handle.abort();
        }

        let candidate = found?;
        if self.binding.try_bind(candidate) {
            tracing::info!(peer = %candidate, "found peer");
            Some(candidate)
        } else {
            // The listener bound someone first; that binding stands.
            let peer = self.binding.get();
            tracing::debug!(%candidate, ?peer, "probe acknowledged but already bound");
            peer
        }
    }
}

/// Every port of the range on 127.0.0.1, except our own.
fn loopback_targets(ports: Range<u16>, own_port: u16) -> Vec<SocketAddr> {
    ports
        .filter(|p| *p != own_port)
        .map(|p| SocketAddr::from((Ipv4Addr::LOCALHOST, p)))
        .collect()
}

/// Every other host of `local`'s /24 on every port of the range except ours.
fn subnet_targets(local: Ipv4Addr, ports: Range<u16>, own_port: u16) -> Vec<SocketAddr> {
    let hosts: Vec<Ipv4Addr> = subnet_hosts(local).collect();
    ports
        .filter(|p| *p != own_port)
        .flat_map(|p| hosts.iter().map(move |h| SocketAddr::from((*h, p))))
        .collect()
}

/// Hosts .1 through .254 of `local`'s /24, excluding `local` itself.
fn subnet_hosts(local: Ipv4Addr) -> impl Iterator<Item = Ipv4Addr> {
    let [a, b, c, _] = local.octets();
    (1..=254u8)
        .map(move |d| Ipv4Addr::new(a, b, c, d))
        .filter(move |ip| *ip != local)
}

/// The IPv4 address the OS would use for outbound traffic, if any.
///
/// Connecting a UDP socket only selects a route; nothing is sent.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}
