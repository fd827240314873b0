use crate::*;

use loadpair_core::wire::{discover, PEER_RESPONSE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Two nodes in one range find each other and each binds the other's
/// listen port.
#[tokio::test]
async fn test_two_nodes_pair() -> Result<()> {
    let a = TestNode::start(node_config(53100, 4));
    let b = TestNode::start(node_config(53100, 4));
    assert_ne!(a.handle.listen_port(), b.handle.listen_port());

    wait_until(Duration::from_secs(5), "both nodes bound", || {
        a.handle.peer().is_some() && b.handle.peer().is_some()
    })
    .await?;

    assert_eq!(a.handle.peer(), Some(b.addr()));
    assert_eq!(b.handle.peer(), Some(a.addr()));
    assert!(a.handle.snapshot().connected);
    assert!(b.handle.snapshot().connected);

    a.stop().await;
    b.stop().await;
    Ok(())
}

/// A third node finds only nodes that are already bound; they stay silent
/// and it never pairs.
#[tokio::test]
async fn test_third_node_stays_unbound() -> Result<()> {
    let a = TestNode::start(node_config(53110, 4));
    let b = TestNode::start(node_config(53110, 4));
    wait_until(Duration::from_secs(5), "pair formed", || {
        a.handle.peer().is_some() && b.handle.peer().is_some()
    })
    .await?;
    let pair = (a.handle.peer(), b.handle.peer());

    let c = TestNode::start(node_config(53110, 4));
    // Several discovery rounds.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(c.handle.peer(), None);
    assert!(!c.handle.snapshot().connected);
    assert_eq!((a.handle.peer(), b.handle.peer()), pair);

    c.stop().await;
    a.stop().await;
    b.stop().await;
    Ok(())
}

/// Many simultaneous DISCOVER messages against one node: exactly one is
/// acknowledged and that sender becomes the peer.
#[tokio::test]
async fn test_concurrent_discovers_single_ack() -> Result<()> {
    let node = TestNode::start(node_config(53120, 1));
    let target = node.addr();

    let mut tasks = Vec::new();
    for announced in 54000..54016u16 {
        tasks.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(target).await.ok()?;
            stream.write_all(discover(announced).as_bytes()).await.ok()?;
            let mut buf = Vec::new();
            let read = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut buf)).await;
            match read {
                Ok(Ok(_)) if buf == PEER_RESPONSE.as_bytes() => Some(announced),
                _ => None,
            }
        }));
    }

    let mut acked = Vec::new();
    for task in tasks {
        if let Some(port) = task.await? {
            acked.push(port);
        }
    }

    assert_eq!(acked.len(), 1, "acknowledged: {:?}", acked);
    assert_eq!(
        node.handle.peer(),
        Some(SocketAddr::from(([127, 0, 0, 1], acked[0])))
    );

    node.stop().await;
    Ok(())
}
