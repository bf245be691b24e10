//! Synchronization core
//!
//! - `state.rs` - the externally visible snapshot
//! - `top_accounts.rs` - richest-accounts query
//! - `block_feed.rs` - trailing block window
//! - `manager.rs` - the refresh loop merging everything

pub mod block_feed;
pub mod manager;
pub mod state;
pub mod top_accounts;

pub use manager::{SyncManager, SyncOptions};
pub use state::{BalanceReading, SyncSnapshot};
pub use top_accounts::RankingEntry;
