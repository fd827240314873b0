//! Outbound side of the peer link.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use loadpair_core::wire::{self, MAX_MESSAGE_BYTES, PEER_RESPONSE};

use super::{LinkError, LinkTimeouts};

async fn connect(addr: SocketAddr, limit: Duration) -> Result<TcpStream, LinkError> {
    match timeout(limit, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(LinkError::Connect(addr, e)),
        Err(_) => Err(LinkError::ConnectTimeout(addr)),
    }
}

/// Offer ourselves as a peer to `ip:port`.
///
/// Returns the target address if it answered with the acknowledgment token.
/// Every failure is an ordinary `Err`; callers treat it as "no peer here".
pub async fn probe(
    ip: IpAddr,
    port: u16,
    own_port: u16,
    timeouts: LinkTimeouts,
) -> Result<SocketAddr, LinkError> {
    let addr = SocketAddr::new(ip, port);
    let mut stream = connect(addr, timeouts.connect).await?;

    stream
        .write_all(wire::discover(own_port).as_bytes())
        .await
        .map_err(|e| LinkError::Write(addr, e))?;

    let mut buf = vec![0u8; MAX_MESSAGE_BYTES];
    let n = match timeout(timeouts.read, stream.read(&mut buf)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(LinkError::Read(addr, e)),
        Err(_) => return Err(LinkError::ReadTimeout(addr)),
    };

    if &buf[..n] == PEER_RESPONSE.as_bytes() {
        Ok(addr)
    } else {
        Err(LinkError::NoAcknowledgment(addr))
    }
}

/// Fire-and-forget delivery of one message to `addr`.
pub async fn send_message(
    addr: SocketAddr,
    message: &str,
    connect_timeout: Duration,
) -> Result<(), LinkError> {
    let mut stream = connect(addr, connect_timeout).await?;
    stream
        .write_all(message.as_bytes())
        .await
        .map_err(|e| LinkError::Write(addr, e))?;
    // Close errors after a complete write don't affect delivery.
    let _ = stream.shutdown().await;
    Ok(())
}
