//! In-memory chain state with test controls.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Base units per whole TETH.
pub const WEI_PER_TETH: u128 = 1_000_000_000_000_000_000;

/// How much one faucet call grants.
const FAUCET_GRANT: u128 = WEI_PER_TETH;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockBlock {
    pub number: u64,
    pub timestamp: u64,
    pub tx_count: usize,
    pub hash: String,
}

#[derive(Default)]
struct ChainInner {
    balances: HashMap<String, u128>,
    blocks: Vec<MockBlock>,
    /// Artificial delay before each response
    response_delay: Duration,
    /// When set, `teth_topAccounts` answers with garbage
    malformed_top_accounts: bool,
    /// Requests served, per method
    calls: HashMap<String, u64>,
}

/// The whole chain behind one lock. Handles are shared via `Arc`.
pub struct ChainState {
    inner: Mutex<ChainInner>,
}

fn block_hash(number: u64) -> String {
    format!("0x{:064x}", u128::from(number).wrapping_mul(0x9e37_79b9))
}

impl ChainState {
    /// A chain holding only a genesis block and no funded accounts.
    pub fn new() -> Self {
        let mut inner = ChainInner::default();
        inner.blocks.push(MockBlock {
            number: 0,
            timestamp: 1_600_000_000,
            tx_count: 0,
            hash: block_hash(0),
        });
        Self {
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChainInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_balance(&self, address: &str, amount: u128) {
        self.lock()
            .balances
            .insert(address.to_lowercase(), amount);
    }

    pub fn balance(&self, address: &str) -> u128 {
        self.lock()
            .balances
            .get(&address.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// Append a block with the next number.
    pub fn push_block(&self, timestamp: u64, tx_count: usize) {
        let mut inner = self.lock();
        let number = inner.blocks.last().map(|b| b.number + 1).unwrap_or(0);
        inner.blocks.push(MockBlock {
            number,
            timestamp,
            tx_count,
            hash: block_hash(number),
        });
    }

    pub fn latest_block(&self) -> Option<MockBlock> {
        self.lock().blocks.last().cloned()
    }

    pub fn block_by_number(&self, number: u64) -> Option<MockBlock> {
        self.lock()
            .blocks
            .iter()
            .find(|b| b.number == number)
            .cloned()
    }

    /// Balances sorted descending, capped at `limit`.
    pub fn top_accounts(&self, limit: usize) -> Vec<(String, u128)> {
        let mut entries: Vec<(String, u128)> = self
            .lock()
            .balances
            .iter()
            .map(|(address, amount)| (address.clone(), *amount))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(limit);
        entries
    }

    /// Credit the faucet grant. Only empty accounts qualify.
    pub fn faucet(&self, address: &str) -> Result<u128, &'static str> {
        let mut inner = self.lock();
        let entry = inner.balances.entry(address.to_lowercase()).or_insert(0);
        if *entry > 0 {
            return Err("faucet only funds empty accounts");
        }
        *entry += FAUCET_GRANT;
        Ok(*entry)
    }

    pub fn set_response_delay(&self, delay: Duration) {
        self.lock().response_delay = delay;
    }

    pub fn response_delay(&self) -> Duration {
        self.lock().response_delay
    }

    pub fn set_malformed_top_accounts(&self, malformed: bool) {
        self.lock().malformed_top_accounts = malformed;
    }

    pub fn malformed_top_accounts(&self) -> bool {
        self.lock().malformed_top_accounts
    }

    pub fn record_call(&self, method: &str) {
        *self.lock().calls.entry(method.to_string()).or_insert(0) += 1;
    }

    /// How many times `method` has been served.
    pub fn calls(&self, method: &str) -> u64 {
        self.lock().calls.get(method).copied().unwrap_or(0)
    }
}

impl Default for ChainState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faucet_only_funds_empty_accounts() {
        let chain = ChainState::new();
        assert_eq!(chain.faucet("0xAB").unwrap(), WEI_PER_TETH);
        assert!(chain.faucet("0xab").is_err());
        assert_eq!(chain.balance("0xAB"), WEI_PER_TETH);
    }

    #[test]
    fn test_top_accounts_sorted_descending() {
        let chain = ChainState::new();
        chain.set_balance("0xa", 50);
        chain.set_balance("0xb", 100);
        chain.set_balance("0xc", 75);
        let top = chain.top_accounts(2);
        assert_eq!(top[0], ("0xb".to_string(), 100));
        assert_eq!(top[1], ("0xc".to_string(), 75));
    }

    #[test]
    fn test_push_block_numbers_are_sequential() {
        let chain = ChainState::new();
        chain.push_block(1_600_000_100, 2);
        chain.push_block(1_600_000_200, 0);
        assert_eq!(chain.latest_block().unwrap().number, 2);
        assert_eq!(chain.block_by_number(1).unwrap().tx_count, 2);
        assert!(chain.block_by_number(9).is_none());
    }
}
