mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use tron_alert_relay::blockchain::{BlockFetch, NodeError, StepOutcome};
use tron_alert_relay::database::DbError;
use tron_alert_relay::{
    AlertHub, BackoffConfig, BlockPoller, BlockPollerConfig, BlockProcessor, ConnectionHandle,
    ConnectionRegistry, Database, ProgressStore,
};

struct Relay {
    node: Arc<ScriptedNode>,
    store: Arc<Database>,
    hub: Arc<AlertHub>,
    poller: Arc<BlockPoller>,
}

fn relay(script: Vec<Result<BlockFetch, NodeError>>, store: Database) -> Relay {
    let node = Arc::new(ScriptedNode::new(script));
    let store = Arc::new(store);
    let registry = Arc::new(ConnectionRegistry::new());
    let hub = Arc::new(AlertHub::new(registry));
    let poller = Arc::new(BlockPoller::new(
        node.clone(),
        store.clone(),
        BlockProcessor::new(Arc::clone(&hub)),
        Some(BlockPollerConfig {
            backoff: BackoffConfig::fixed(Duration::from_secs(1)),
        }),
    ));

    Relay { node, store, hub, poller }
}

fn produced(height: u64, transactions: Vec<serde_json::Value>) -> Result<BlockFetch, NodeError> {
    Ok(BlockFetch::Block(block(height, transactions)))
}

#[tokio::test]
async fn test_fresh_start_alerts_only_touched_subscriber() {
    let relay = relay(
        vec![
            produced(0, vec![transfer(ZERO_HEX, ZERO_HEX)]),
            produced(1, vec![transfer(USDT_HEX, ZERO_HEX)]),
            produced(2, vec![]),
        ],
        Database::new_in_memory().unwrap(),
    );

    let (handle, mut alerts) = ConnectionHandle::channel();
    let connection = relay.hub.registry().insert(handle);
    relay.hub.subscribe(USDT, "alice", connection).unwrap();

    for _ in 0..3 {
        assert!(matches!(relay.poller.poll_once().await.unwrap(), StepOutcome::Processed(_)));
    }

    assert_eq!(relay.node.requested_heights(), vec![0, 1, 2]);
    assert_eq!(relay.store.load().unwrap(), Some(2));
    assert_eq!(
        alerts.try_recv().unwrap(),
        format!(r#"{{"cmd":"ADDRESS_EVENT","address":"{}"}}"#, USDT)
    );
    assert!(alerts.try_recv().is_err(), "exactly one alert expected");
}

#[tokio::test]
async fn test_fetch_failure_retries_same_height() {
    let relay = relay(
        vec![
            Err(NodeError::Connection("connection refused".to_string())),
            produced(0, vec![]),
        ],
        Database::new_in_memory().unwrap(),
    );

    assert!(matches!(relay.poller.poll_once().await.unwrap(), StepOutcome::FetchFailed));
    assert_eq!(relay.store.load().unwrap(), None);

    assert!(matches!(relay.poller.poll_once().await.unwrap(), StepOutcome::Processed(_)));
    assert_eq!(relay.node.requested_heights(), vec![0, 0]);
    assert_eq!(relay.store.load().unwrap(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_waits_one_second_between_empty_polls_and_none_after_a_block() {
    let relay = relay(
        vec![
            Ok(BlockFetch::NotYetProduced),
            Ok(BlockFetch::NotYetProduced),
            Ok(BlockFetch::NotYetProduced),
            produced(0, vec![]),
        ],
        Database::new_in_memory().unwrap(),
    );

    let runner = {
        let poller = Arc::clone(&relay.poller);
        tokio::spawn(async move { poller.start().await })
    };

    tokio::time::sleep(Duration::from_millis(3500)).await;
    relay.poller.shutdown();
    runner.await.unwrap().unwrap();

    let calls = relay.node.calls();
    let heights: Vec<u64> = calls.iter().map(|(height, _)| *height).collect();
    assert_eq!(&heights[..5], &[0, 0, 0, 0, 1]);

    for pair in calls[..4].windows(2) {
        let gap = pair[1].1 - pair[0].1;
        assert!(gap >= Duration::from_secs(1), "gap {:?} shorter than the backoff", gap);
        assert!(gap < Duration::from_millis(1100), "gap {:?} longer than the backoff", gap);
    }

    // the height after a processed block is requested without waiting
    assert!(calls[4].1 - calls[3].1 < Duration::from_millis(100));
    assert_eq!(relay.store.load().unwrap(), Some(0));
}

#[tokio::test]
async fn test_restart_resumes_after_persisted_height() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relay.db");
    let path = path.to_str().unwrap();

    {
        let first = relay(
            vec![produced(0, vec![]), produced(1, vec![]), produced(2, vec![])],
            Database::new(path).unwrap(),
        );
        for _ in 0..3 {
            first.poller.poll_once().await.unwrap();
        }
        assert_eq!(first.store.load().unwrap(), Some(2));
    }

    let second = relay(vec![produced(3, vec![])], Database::new(path).unwrap());
    assert_eq!(second.poller.resume().unwrap(), Some(2));
    assert_eq!(second.poller.next_height(), Some(3));

    assert!(matches!(second.poller.poll_once().await.unwrap(), StepOutcome::Processed(_)));
    assert_eq!(second.node.requested_heights(), vec![3]);
    assert_eq!(second.store.load().unwrap(), Some(3));

    // progress never moves backwards
    assert!(matches!(
        second.store.save(1),
        Err(DbError::Regression { current: 3, attempted: 1 })
    ));
    assert_eq!(second.store.load().unwrap(), Some(3));
}

#[tokio::test]
async fn test_dead_connection_does_not_block_live_subscriber() {
    let relay = relay(
        vec![
            produced(0, vec![transfer(USDT_HEX, ZERO_HEX)]),
            produced(1, vec![transfer(ZERO_HEX, USDT_HEX)]),
        ],
        Database::new_in_memory().unwrap(),
    );
    let registry = relay.hub.registry();

    let (live, mut live_rx) = ConnectionHandle::channel();
    let (dead, dead_rx) = ConnectionHandle::channel();
    let live_id = registry.insert(live);
    let dead_id = registry.insert(dead);
    relay.hub.subscribe(USDT, "alice", live_id).unwrap();
    relay.hub.subscribe(USDT, "bob", dead_id).unwrap();
    relay.hub.subscribe(ZERO, "bob", dead_id).unwrap();
    drop(dead_rx);

    let StepOutcome::Processed(summary) = relay.poller.poll_once().await.unwrap() else {
        panic!("block 0 should be processed");
    };
    assert_eq!(summary.addresses_touched, 2);
    assert_eq!(summary.alerts_delivered, 1);
    assert_eq!(summary.alerts_pruned, 2);
    assert_eq!(relay.hub.subscription_count(), 1);
    assert!(!relay.hub.is_watched(ZERO));

    assert!(matches!(relay.poller.poll_once().await.unwrap(), StepOutcome::Processed(_)));
    assert_eq!(relay.store.load().unwrap(), Some(1));

    let expected = format!(r#"{{"cmd":"ADDRESS_EVENT","address":"{}"}}"#, USDT);
    assert_eq!(live_rx.try_recv().unwrap(), expected);
    assert_eq!(live_rx.try_recv().unwrap(), expected);
}
