//! Trailing window of recent blocks.

use futures::future::join_all;

use crate::error::WalletError;
use crate::rpc::{BlockRecord, BlockSelector, Connection};

/// Fetch the latest block plus up to `window - 1` trailing blocks by
/// descending number, stopping at block zero. Trailing fetches run
/// concurrently and fail independently: a missing or failed block shortens
/// the result, it never aborts the refresh or leaves a placeholder. Only a
/// failure on the latest block fails the whole call.
pub async fn refresh(conn: &Connection, window: usize) -> Result<Vec<BlockRecord>, WalletError> {
    if window == 0 {
        return Ok(Vec::new());
    }

    let Some(latest) = conn.get_block(BlockSelector::Latest).await? else {
        return Ok(Vec::new());
    };

    let first_trailing = latest.number.checked_sub(1);
    let mut records = vec![latest];

    if let Some(first) = first_trailing {
        let take = (window - 1).min(first as usize + 1);
        let numbers: Vec<u64> = (0..take as u64).map(|i| first - i).collect();
        let fetched = join_all(
            numbers
                .iter()
                .map(|&number| conn.get_block(BlockSelector::Number(number))),
        )
        .await;

        for (number, outcome) in numbers.into_iter().zip(fetched) {
            match outcome {
                Ok(Some(block)) => records.push(block),
                Ok(None) => log::debug!("block {} not available, skipping", number),
                Err(e) => log::debug!("fetch of block {} failed: {}", number, e),
            }
        }
    }

    Ok(records)
}
