//! Richest-accounts ranking via the node's `teth_topAccounts` method.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::WalletError;
use crate::rpc::{parse_quantity, Connection};

const METHOD: &str = "teth_topAccounts";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub address: String,
    /// Balance in base units
    pub amount: u128,
}

/// Fetch the ranking. The node returns the list already sorted descending by
/// balance; order is preserved as-is and the list is truncated to `limit`.
/// Anything that is not a well-formed list of pairs fails with
/// `MalformedResponse` and produces nothing.
pub async fn fetch_top(conn: &Connection, limit: usize) -> Result<Vec<RankingEntry>, WalletError> {
    let raw = conn.invoke(METHOD, json!([])).await?;
    let mut entries = parse_ranking(&raw).map_err(|reason| WalletError::malformed(METHOD, reason))?;
    entries.truncate(limit);
    Ok(entries)
}

fn parse_ranking(raw: &Value) -> Result<Vec<RankingEntry>, String> {
    let rows = raw.as_array().ok_or("expected an array of pairs")?;
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let pair = row.as_array().ok_or("expected [address, amount] pair")?;
        if pair.len() != 2 {
            return Err(format!("expected pair, got {} elements", pair.len()));
        }
        let address = pair[0]
            .as_str()
            .ok_or("expected address string")?
            .to_string();
        let amount = parse_quantity(&pair[1])?;
        entries.push(RankingEntry { address, amount });
    }
    Ok(entries)
}
