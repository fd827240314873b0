//! Inbound side of the peer link.
//!
//! Accepts connections forever, one task per connection. Each connection
//! carries exactly one message: a DISCOVER handshake or a traffic tag.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use loadpair_core::wire::{Inbound, PEER_RESPONSE};

use crate::peer::PeerBinding;
use crate::queue::QueueStore;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Per-connection handler state, cloned into every connection task.
#[derive(Clone)]
struct Inbox {
    store: QueueStore,
    binding: PeerBinding,
    read_timeout: Duration,
    max_message_bytes: usize,
}

pub struct LinkListener {
    listener: TcpListener,
    inbox: Inbox,
    shutdown: broadcast::Receiver<()>,
}

impl LinkListener {
    /// Bind the listening socket. Must be called inside a tokio runtime.
    pub fn bind(
        host: &str,
        port: u16,
        store: QueueStore,
        binding: PeerBinding,
        read_timeout: Duration,
        max_message_bytes: usize,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .with_context(|| format!("failed to resolve {host}:{port}"))?
            .next()
            .with_context(|| format!("{host}:{port} resolved to nothing"))?;

        let socket = make_listener_socket(addr)
            .with_context(|| format!("failed to listen on {addr}"))?;
        let listener =
            TcpListener::from_std(socket).context("failed to convert to tokio TcpListener")?;

        Ok(Self {
            listener,
            inbox: Inbox {
                store,
                binding,
                read_timeout,
                max_message_bytes,
            },
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("listener has no local address")
    }

    /// Accept connections until the shutdown signal fires.
    pub async fn run(mut self) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, "peer link listening");
        }

        loop {
            let result = tokio::select! {
                _ = self.shutdown.recv() => break,
                result = self.listener.accept() => result,
            };

            match result {
                Ok((stream, remote)) => {
                    let inbox = self.inbox.clone();
                    tokio::spawn(async move { inbox.handle(stream, remote).await });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    if !accept_backoff(&mut self.shutdown).await {
                        break;
                    }
                }
            }
        }

        tracing::info!("peer link listener shutting down");
    }
}

/// Pause after a failed accept so a persistent error (EMFILE) doesn't spin.
/// Returns false if shutdown fired during the pause.
async fn accept_backoff(shutdown: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = shutdown.recv() => false,
        _ = tokio::time::sleep(ACCEPT_BACKOFF) => true,
    }
}

impl Inbox {
    async fn handle(self, mut stream: TcpStream, remote: SocketAddr) {
        let mut buf = vec![0u8; self.max_message_bytes];
        let n = match tokio::time::timeout(self.read_timeout, stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                tracing::trace!(%remote, "connection closed without a message");
                return;
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                tracing::debug!(%remote, error = %e, "read failed");
                return;
            }
            Err(_) => {
                tracing::debug!(%remote, "no message before read timeout");
                return;
            }
        };

        let message = String::from_utf8_lossy(&buf[..n]);
        match Inbound::parse(&message) {
            Ok(Inbound::Discover { port }) => self.handle_discover(&mut stream, remote, port).await,
            Ok(Inbound::Traffic(category)) => {
                let value = self.store.increment(category);
                tracing::trace!(%remote, %category, value, "traffic received");
            }
            Ok(Inbound::Unrecognized) => {
                tracing::warn!(%remote, message = %message, "unrecognized message");
            }
            Err(e) => {
                tracing::warn!(%remote, error = %e, "malformed handshake");
            }
        }
    }

    async fn handle_discover(&self, stream: &mut TcpStream, remote: SocketAddr, port: u16) {
        let candidate = SocketAddr::new(remote.ip(), port);

        if let Some(current) = self.binding.get() {
            tracing::debug!(%candidate, peer = %current, "already bound, ignoring DISCOVER");
            return;
        }

        // Only the winner of the bind answers, so a second discoverer never
        // sees an acknowledgment.
        if !self.binding.try_bind(candidate) {
            tracing::debug!(%candidate, "lost bind race, ignoring DISCOVER");
            return;
        }
        tracing::info!(peer = %candidate, "accepted peer");

        if let Err(e) = stream.write_all(PEER_RESPONSE.as_bytes()).await {
            tracing::warn!(peer = %candidate, error = %e, "failed to acknowledge peer");
        }
    }
}

/// Create a TCP listening socket on `addr`.
fn make_listener_socket(addr: SocketAddr) -> Result<std::net::TcpListener> {
    let socket =
        Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;
    socket.bind(&addr.into()).context("bind()")?;
    socket.listen(1024).context("listen()")?;

    Ok(socket.into())
}
