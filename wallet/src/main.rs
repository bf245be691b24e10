use std::env;
use std::sync::Arc;

use anyhow::Context;
use teth_wallet::api::server;
use teth_wallet::config::WalletConfig;
use teth_wallet::identity::IdentityStore;
use teth_wallet::rpc::ChainTransport;
use teth_wallet::sync::{SyncManager, SyncOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = WalletConfig::from_env();

    let store = IdentityStore::new_with_base_dir(config.data_dir.clone());
    let account = store
        .resolve()
        .context("failed to resolve the local account")?;
    log::info!("wallet address: {}", account.address);

    let transport = ChainTransport::new(config.node_ws_url.clone());
    let manager = Arc::new(SyncManager::new(
        transport,
        account,
        SyncOptions::from(&config),
    ));
    manager.start(config.refresh_interval);

    // Use BIND_ADDRESS=127.0.0.1:3000 for local development
    let addr = env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    server::start_server(&addr, manager).await?;
    Ok(())
}
