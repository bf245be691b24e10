//! Connection lifecycle and multiplexing against the mock node.

mod common;

use std::time::Duration;

use common::TestEnvironment;
use teth_wallet::rpc::{BlockSelector, ConnectionState};
use teth_wallet::WalletError;

#[tokio::test]
async fn test_connect_reports_connected() {
    let env = TestEnvironment::new().await.unwrap();
    let transport = env.transport();

    let conn = transport.connect().await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Connected);
    assert_eq!(transport.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_second_connect_is_rejected_while_live() {
    let env = TestEnvironment::new().await.unwrap();
    let transport = env.transport();

    let _conn = transport.connect().await.unwrap();
    let err = transport.connect().await.unwrap_err();
    assert!(matches!(err, WalletError::AlreadyConnected), "{err}");
}

#[tokio::test]
async fn test_server_close_transitions_to_disconnected() {
    let env = TestEnvironment::new().await.unwrap();
    let transport = env.transport();
    let conn = transport.connect().await.unwrap();

    env.node.shutdown();

    let mut state_rx = conn.state_changes();
    tokio::time::timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| *s == ConnectionState::Disconnected),
    )
    .await
    .expect("no disconnect observed")
    .unwrap();

    // The instance is terminal; calls on it now fail fast.
    let err = conn.get_balance("0xabc").await.unwrap_err();
    assert!(matches!(err, WalletError::NotConnected), "{err}");
}

#[tokio::test]
async fn test_concurrent_calls_share_one_socket() {
    let env = TestEnvironment::new().await.unwrap();
    env.chain.set_balance("0xaaaa", 11);
    env.chain.set_balance("0xbbbb", 22);
    env.chain.set_response_delay(Duration::from_millis(50));

    let conn = env.transport().connect().await.unwrap();
    let (a, b) = tokio::join!(conn.get_balance("0xaaaa"), conn.get_balance("0xbbbb"));
    assert_eq!(a.unwrap(), 11);
    assert_eq!(b.unwrap(), 22);
}

#[tokio::test]
async fn test_get_block_latest_and_missing() {
    let env = TestEnvironment::new().await.unwrap();
    env.chain.push_block(1_600_000_100, 3);

    let conn = env.transport().connect().await.unwrap();

    let latest = conn.get_block(BlockSelector::Latest).await.unwrap().unwrap();
    assert_eq!(latest.number, 1);
    assert_eq!(latest.tx_count, 3);

    let missing = conn.get_block(BlockSelector::Number(9)).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_remote_error_is_surfaced() {
    let env = TestEnvironment::new().await.unwrap();
    let conn = env.transport().connect().await.unwrap();

    let err = conn
        .invoke("eth_mine", serde_json::json!([]))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::Rpc { code: -32601, .. }), "{err}");
}
