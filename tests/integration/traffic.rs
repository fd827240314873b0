use crate::*;

use loadpair_core::Category;

fn quiet_queues(mut config: LoadpairConfig) -> LoadpairConfig {
    config.queues.initial_value = 0;
    config.queues.ceiling = 1_000;
    // Long enough that no decay tick lands inside a test.
    config.queues.decay_interval_ms = 60_000;
    config.traffic.slow_base_ms = 300;
    config.traffic.slow_jitter_ms = 50;
    config.traffic.dynamic_long_ms = 300;
    config
}

/// Once paired, every generator's messages land in the peer's matching
/// counter.
#[tokio::test]
async fn test_traffic_reaches_peer_counters() -> Result<()> {
    let a = TestNode::start(quiet_queues(node_config(53200, 2)));
    let b = TestNode::start(quiet_queues(node_config(53200, 2)));

    wait_until(Duration::from_secs(5), "pair formed", || {
        a.handle.peer().is_some() && b.handle.peer().is_some()
    })
    .await?;

    wait_until(Duration::from_secs(5), "all counters on b rise", || {
        Category::ALL.iter().all(|c| b.handle.store().value(*c) > 0)
    })
    .await?;
    wait_until(Duration::from_secs(5), "all counters on a rise", || {
        Category::ALL.iter().all(|c| a.handle.store().value(*c) > 0)
    })
    .await?;

    a.stop().await;
    b.stop().await;
    Ok(())
}

/// At the default schedule and decay rate, fast traffic outruns decay: over
/// four seconds decay removes at most four, arrivals add roughly twenty.
#[tokio::test]
async fn test_fast_traffic_outpaces_decay() -> Result<()> {
    let mut config = node_config(53230, 2);
    config.queues.initial_value = 0;
    let a = TestNode::start(config.clone());
    let b = TestNode::start(config);

    wait_until(Duration::from_secs(5), "pair formed", || {
        a.handle.peer().is_some() && b.handle.peer().is_some()
    })
    .await?;

    tokio::time::sleep(Duration::from_secs(4)).await;

    let fast = b.handle.store().value(Category::Fast);
    assert!(fast >= 8, "fast counter on peer only reached {fast}");
    assert!(fast <= b.handle.store().ceiling());

    a.stop().await;
    b.stop().await;
    Ok(())
}

/// With no peer there is no traffic, so counters hold at their start value.
#[tokio::test]
async fn test_unbound_node_sends_nothing() -> Result<()> {
    let lonely = TestNode::start(quiet_queues(node_config(53210, 1)));

    tokio::time::sleep(Duration::from_millis(800)).await;

    assert_eq!(lonely.handle.peer(), None);
    for category in Category::ALL {
        assert_eq!(lonely.handle.store().value(category), 0);
    }

    lonely.stop().await;
    Ok(())
}

/// Decay pulls counters back down once traffic is gone.
#[tokio::test]
async fn test_counters_decay_without_traffic() -> Result<()> {
    let mut config = node_config(53220, 1);
    config.queues.initial_value = 5;
    config.queues.decay_interval_ms = 50;
    let node = TestNode::start(config);

    wait_until(Duration::from_secs(3), "counters drained", || {
        Category::ALL.iter().all(|c| node.handle.store().value(*c) == 0)
    })
    .await?;

    node.stop().await;
    Ok(())
}
