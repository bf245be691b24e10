//! Response types of the HTTP surface.
//!
//! Amounts are decimal strings of base units so renderers never hit JSON
//! number precision limits. The private key is never part of a response.

use serde::Serialize;

use crate::rpc::{BlockRecord, ConnectionState};
use crate::sync::SyncSnapshot;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub address: String,
    pub connection: ConnectionState,
    pub balance: Option<BalanceView>,
    pub ranking: Option<Vec<RankingView>>,
    pub blocks: Option<Vec<BlockRecord>>,
    pub cycle: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub amount: String,
    pub observed_cycle: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingView {
    pub address: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetResponse {
    pub funded: bool,
    pub balance: Option<String>,
}

impl From<SyncSnapshot> for SnapshotResponse {
    fn from(snapshot: SyncSnapshot) -> Self {
        Self {
            address: snapshot.account.address,
            connection: snapshot.connection,
            balance: snapshot.balance.map(|reading| BalanceView {
                amount: reading.amount.to_string(),
                observed_cycle: reading.observed_cycle,
            }),
            ranking: snapshot.ranking.map(|entries| {
                entries
                    .into_iter()
                    .map(|entry| RankingView {
                        address: entry.address,
                        amount: entry.amount.to_string(),
                    })
                    .collect()
            }),
            blocks: snapshot.blocks,
            cycle: snapshot.cycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::KeyManager;

    #[test]
    fn test_projection_never_leaks_the_private_key() {
        let account = KeyManager::generate();
        let secret = account.private_key.clone();
        let snapshot = SyncSnapshot::initial(account);

        let response = SnapshotResponse::from(snapshot);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains(&secret));
        assert!(json.contains(&response.address));
    }
}
