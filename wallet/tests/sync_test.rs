//! Refresh loop behavior: ranking, block window, last-known-good merging,
//! faucet-driven refresh and overlap handling.

mod common;

use std::time::Duration;

use common::{wait_for_cycle, TestEnvironment};
use node_mock::WEI_PER_TETH;
use teth_wallet::config::ReconnectPolicy;
use teth_wallet::identity::{Account, KeyManager};
use teth_wallet::rpc::ConnectionState;
use teth_wallet::sync::{block_feed, top_accounts, SyncManager, SyncOptions};
use teth_wallet::WalletError;

fn test_options() -> SyncOptions {
    SyncOptions {
        block_window: 7,
        top_accounts: 5,
        reconnect: ReconnectPolicy::FixedDelay(Duration::from_millis(50)),
    }
}

fn test_account() -> Account {
    KeyManager::generate()
}

#[tokio::test]
async fn test_ranking_preserves_remote_order() {
    let env = TestEnvironment::new().await.unwrap();
    env.chain.set_balance("0xaaaa", 100);
    env.chain.set_balance("0xbbbb", 50);

    let conn = env.transport().connect().await.unwrap();
    let entries = top_accounts::fetch_top(&conn, 5).await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].address, "0xaaaa");
    assert_eq!(entries[0].amount, 100);
    assert_eq!(entries[1].address, "0xbbbb");
    assert_eq!(entries[1].amount, 50);
}

#[tokio::test]
async fn test_malformed_ranking_is_rejected_whole() {
    let env = TestEnvironment::new().await.unwrap();
    env.chain.set_malformed_top_accounts(true);

    let conn = env.transport().connect().await.unwrap();
    let err = top_accounts::fetch_top(&conn, 5).await.unwrap_err();
    assert!(matches!(err, WalletError::MalformedResponse { .. }), "{err}");
}

#[tokio::test]
async fn test_block_feed_stops_at_genesis() {
    let env = TestEnvironment::new().await.unwrap();
    // Genesis exists already; extend the chain to block 3.
    env.chain.push_block(1_600_000_100, 1);
    env.chain.push_block(1_600_000_200, 0);
    env.chain.push_block(1_600_000_300, 2);

    let conn = env.transport().connect().await.unwrap();
    let blocks = block_feed::refresh(&conn, 6).await.unwrap();

    let numbers: Vec<u64> = blocks.iter().map(|b| b.number).collect();
    assert_eq!(numbers, vec![3, 2, 1, 0]);
}

#[tokio::test]
async fn test_snapshot_starts_not_yet_loaded() {
    let env = TestEnvironment::new().await.unwrap();
    let manager = SyncManager::new(env.transport(), test_account(), test_options());

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.cycle, 0);
    assert!(snapshot.balance.is_none());
    assert!(snapshot.ranking.is_none());
    assert!(snapshot.blocks.is_none());
}

#[tokio::test]
async fn test_failed_fetch_keeps_last_known_good() {
    let env = TestEnvironment::new().await.unwrap();
    let account = test_account();
    env.chain.set_balance(&account.address, 42);
    env.chain.set_balance("0xcccc", 100);

    let manager = SyncManager::new(env.transport(), account.clone(), test_options());
    manager.start(Duration::from_millis(100));

    let before = wait_for_cycle(&manager, 1).await.unwrap();
    let prior_ranking = before.ranking.clone().unwrap();
    assert!(!prior_ranking.is_empty());

    // Ranking responses turn to garbage; the balance keeps flowing.
    env.chain.set_malformed_top_accounts(true);
    env.chain.set_balance(&account.address, 7);

    let after = wait_for_cycle(&manager, before.cycle + 2).await.unwrap();
    manager.stop();

    assert_eq!(after.ranking.unwrap(), prior_ranking);
    assert_eq!(after.balance.unwrap().amount, 7);
    assert_eq!(after.connection, ConnectionState::Connected);
}

#[tokio::test]
async fn test_faucet_triggers_out_of_band_refresh() {
    let env = TestEnvironment::new().await.unwrap();
    let account = test_account();
    let manager = SyncManager::new(env.transport(), account.clone(), test_options());

    // One immediate cycle, then nothing for an hour.
    manager.start(Duration::from_secs(3600));
    let before = wait_for_cycle(&manager, 1).await.unwrap();
    assert_eq!(before.balance.as_ref().unwrap().amount, 0);

    manager.request_funds().await.unwrap();

    // No timer tick has fired; the merge came from the faucet path.
    let after = manager.snapshot();
    assert!(after.cycle > before.cycle);
    assert_eq!(after.balance.unwrap().amount, WEI_PER_TETH);
    manager.stop();
}

#[tokio::test]
async fn test_faucet_rejects_funded_accounts() {
    let env = TestEnvironment::new().await.unwrap();
    let account = test_account();
    env.chain.set_balance(&account.address, 5);

    let manager = SyncManager::new(env.transport(), account, test_options());
    manager.start(Duration::from_secs(3600));
    wait_for_cycle(&manager, 1).await.unwrap();

    let err = manager.request_funds().await.unwrap_err();
    assert!(matches!(err, WalletError::Rpc { .. }), "{err}");
    manager.stop();
}

#[tokio::test]
async fn test_overlapping_ticks_merge_once_per_cycle() {
    let env = TestEnvironment::new().await.unwrap();
    let account = test_account();
    env.chain.set_response_delay(Duration::from_millis(200));

    let options = SyncOptions {
        block_window: 1,
        ..test_options()
    };
    let manager = SyncManager::new(env.transport(), account, options);

    // Ticks fire far faster than a cycle can finish.
    manager.start(Duration::from_millis(25));
    tokio::time::sleep(Duration::from_millis(1200)).await;
    manager.stop();

    let snapshot = manager.snapshot();
    assert!(snapshot.cycle >= 1, "no cycle completed");
    assert!(snapshot.cycle <= 3, "cycles queued up: {}", snapshot.cycle);

    // Exactly one balance request per cycle, plus at most one from a cycle
    // cut short by stop().
    let balance_calls = env.chain.calls("eth_getBalance");
    assert!(
        balance_calls == snapshot.cycle || balance_calls == snapshot.cycle + 1,
        "{} balance calls for {} merged cycles",
        balance_calls,
        snapshot.cycle
    );
}

#[tokio::test]
async fn test_stop_discards_inflight_cycle() {
    let env = TestEnvironment::new().await.unwrap();
    env.chain.set_response_delay(Duration::from_millis(300));

    let options = SyncOptions {
        block_window: 1,
        ..test_options()
    };
    let manager = SyncManager::new(env.transport(), test_account(), options);

    manager.start(Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(100)).await;
    manager.stop();
    let at_stop = manager.snapshot();

    tokio::time::sleep(Duration::from_millis(700)).await;
    let later = manager.snapshot();
    assert_eq!(later.cycle, at_stop.cycle);
}

#[tokio::test]
async fn test_disconnect_keeps_stale_data_with_indicator() {
    let env = TestEnvironment::new().await.unwrap();
    let account = test_account();
    env.chain.set_balance(&account.address, 42);
    env.chain.set_balance("0xdddd", 100);

    let options = SyncOptions {
        reconnect: ReconnectPolicy::None,
        ..test_options()
    };
    let manager = SyncManager::new(env.transport(), account, options);
    manager.start(Duration::from_millis(100));

    let healthy = wait_for_cycle(&manager, 1).await.unwrap();
    assert_eq!(healthy.connection, ConnectionState::Connected);

    env.node.shutdown();

    let mut rx = manager.subscribe();
    let degraded = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.connection == ConnectionState::Disconnected),
    )
    .await
    .expect("no disconnected snapshot observed")
    .unwrap()
    .clone();
    manager.stop();

    // Stale but present, never blanked.
    assert_eq!(degraded.balance.unwrap().amount, 42);
    assert!(degraded.ranking.unwrap().iter().any(|e| e.address == "0xdddd"));
}
