//! Headless wallet client for a teth node.
//!
//! Keeps one locally persisted account, one WebSocket JSON-RPC connection,
//! and a periodically refreshed snapshot of derived state (own balance, top
//! accounts, recent blocks). A thin HTTP surface exposes the snapshot and a
//! faucet action to the rendering layer.

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod rpc;
pub mod sync;

pub use config::WalletConfig;
pub use error::WalletError;
