//! The externally visible state of the sync core.

use serde::Serialize;

use super::top_accounts::RankingEntry;
use crate::identity::Account;
use crate::rpc::{BlockRecord, ConnectionState};

/// One observed balance. Superseded by any later reading for the same
/// address; never retroactively invalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceReading {
    pub owner: String,
    /// Amount in base units
    pub amount: u128,
    /// Cycle counter value at the time of observation. Comparing it against
    /// the snapshot's current cycle tells how stale the reading is.
    pub observed_cycle: u64,
}

/// Aggregate of everything the view layer may read. Fields hold the most
/// recent successful fetch; a failed fetch leaves the prior value in place.
/// `None` means not yet loaded, never "cleared".
#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    pub account: Account,
    pub connection: ConnectionState,
    pub balance: Option<BalanceReading>,
    pub ranking: Option<Vec<RankingEntry>>,
    pub blocks: Option<Vec<BlockRecord>>,
    /// Number of completed refresh cycles merged so far.
    pub cycle: u64,
}

impl SyncSnapshot {
    pub fn initial(account: Account) -> Self {
        Self {
            account,
            connection: ConnectionState::Connecting,
            balance: None,
            ranking: None,
            blocks: None,
            cycle: 0,
        }
    }
}
