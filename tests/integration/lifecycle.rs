use crate::*;

use loadpair_core::QueueSnapshot;
use tokio::net::TcpStream;

/// The snapshot stream starts disconnected and flips once the pair forms.
#[tokio::test]
async fn test_snapshots_track_connectivity() -> Result<()> {
    let mut a = TestNode::start(node_config(53300, 2));

    let first = QueueSnapshot::from_json(&a.snapshots.recv().await.expect("stream closed"))?;
    assert!(!first.connected);
    assert_eq!(first.fast, 50);

    let b = TestNode::start(node_config(53300, 2));

    let connected = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(json) = a.snapshots.recv().await {
            if QueueSnapshot::from_json(&json).map(|s| s.connected).unwrap_or(false) {
                return true;
            }
        }
        false
    })
    .await?;
    assert!(connected, "no connected snapshot seen");

    a.stop().await;
    b.stop().await;
    Ok(())
}

/// A restarted node comes back unbound; its old partner keeps its binding
/// and does not answer again.
#[tokio::test]
async fn test_restarted_node_starts_unbound() -> Result<()> {
    let a = TestNode::start(node_config(53310, 3));
    let b = TestNode::start(node_config(53310, 3));
    wait_until(Duration::from_secs(5), "pair formed", || {
        a.handle.peer().is_some() && b.handle.peer().is_some()
    })
    .await?;
    let b_peer = b.handle.peer();

    a.stop().await;

    let restarted = TestNode::start(node_config(53310, 3));
    assert_eq!(restarted.handle.peer(), None);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(restarted.handle.peer(), None);
    assert_eq!(b.handle.peer(), b_peer);

    restarted.stop().await;
    b.stop().await;
    Ok(())
}

/// After shutdown the listen port no longer accepts connections.
#[tokio::test]
async fn test_shutdown_closes_listener() -> Result<()> {
    let node = TestNode::start(node_config(53320, 1));
    let addr = node.addr();
    assert!(TcpStream::connect(addr).await.is_ok());

    tokio::time::timeout(Duration::from_secs(5), node.stop()).await?;

    assert!(TcpStream::connect(addr).await.is_err());
    Ok(())
}
