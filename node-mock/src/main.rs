/// Mock teth node
///
/// Standalone WebSocket JSON-RPC server over a seeded in-memory chain, for
/// local wallet development without a real node.
use std::env;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use node_mock::{run_server, ChainState, WEI_PER_TETH};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    dotenv::dotenv().ok();

    let addr = env::var("NODE_MOCK_BIND").unwrap_or_else(|_| "0.0.0.0:8546".to_string());

    let state = Arc::new(ChainState::new());
    seed_chain(&state);

    run_server(state, &addr).await
}

/// A few funded accounts and a short block history, so the wallet has
/// something to show right away.
fn seed_chain(state: &ChainState) {
    state.set_balance("0x1000000000000000000000000000000000000001", 5 * WEI_PER_TETH);
    state.set_balance("0x1000000000000000000000000000000000000002", 3 * WEI_PER_TETH);
    state.set_balance("0x1000000000000000000000000000000000000003", WEI_PER_TETH);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    for i in 1..=5u64 {
        state.push_block(now.saturating_sub((5 - i) * 15), (i % 3) as usize);
    }
    log::info!("seeded chain with 3 funded accounts and 6 blocks");
}
