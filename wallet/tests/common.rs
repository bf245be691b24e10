/// Common test utilities for wallet integration tests
///
/// Each test gets a temp data directory and its own in-process mock node on
/// an ephemeral port. Chain state is mutated directly through the shared
/// handle.
use std::sync::Arc;
use std::time::Duration;

use node_mock::{ChainState, MockNode};
use tempfile::TempDir;
use teth_wallet::identity::IdentityStore;
use teth_wallet::rpc::ChainTransport;
use teth_wallet::sync::{SyncManager, SyncSnapshot};

pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub chain: Arc<ChainState>,
    pub node: MockNode,
}

impl TestEnvironment {
    pub async fn new() -> anyhow::Result<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        let temp_dir = TempDir::new()?;
        let chain = Arc::new(ChainState::new());
        let node = MockNode::spawn(chain.clone()).await?;
        Ok(Self {
            temp_dir,
            chain,
            node,
        })
    }

    #[allow(dead_code)]
    pub fn identity_store(&self) -> IdentityStore {
        IdentityStore::new_with_base_dir(self.temp_dir.path().to_path_buf())
    }

    pub fn transport(&self) -> ChainTransport {
        ChainTransport::new(self.node.ws_url())
    }
}

/// Block until the snapshot has merged at least `min_cycle` cycles.
#[allow(dead_code)]
pub async fn wait_for_cycle(
    manager: &SyncManager,
    min_cycle: u64,
) -> anyhow::Result<SyncSnapshot> {
    let mut rx = manager.subscribe();
    let snapshot = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|snapshot| snapshot.cycle >= min_cycle),
    )
    .await
    .map_err(|_| anyhow::anyhow!("timed out waiting for cycle {}", min_cycle))??;
    Ok(snapshot.clone())
}
