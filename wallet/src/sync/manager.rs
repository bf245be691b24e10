//! The refresh loop.
//!
//! Owns the derived state and keeps it synchronized with the node: one cycle
//! fetches balance, ranking and the block window concurrently, then merges
//! the successes into the snapshot. Failed fetches keep the prior value.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::state::{BalanceReading, SyncSnapshot};
use super::{block_feed, top_accounts};
use crate::config::{ReconnectPolicy, WalletConfig};
use crate::error::WalletError;
use crate::identity::Account;
use crate::rpc::{ChainTransport, Connection, ConnectionState};

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Copy, Debug)]
pub struct SyncOptions {
    pub block_window: usize,
    pub top_accounts: usize,
    pub reconnect: ReconnectPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        let config = WalletConfig::default();
        Self {
            block_window: config.block_window,
            top_accounts: config.top_accounts,
            reconnect: config.reconnect,
        }
    }
}

impl From<&WalletConfig> for SyncOptions {
    fn from(config: &WalletConfig) -> Self {
        Self {
            block_window: config.block_window,
            top_accounts: config.top_accounts,
            reconnect: config.reconnect,
        }
    }
}

struct SyncShared {
    transport: ChainTransport,
    account: Account,
    options: SyncOptions,
    snapshot: watch::Sender<SyncSnapshot>,
    /// Held for the duration of one cycle. Timer ticks skip when contended.
    cycle_gate: AsyncMutex<()>,
    /// Serializes snapshot publication against `stop()`.
    merge_lock: Mutex<()>,
    /// Bumped by `stop()`; cycles that started under an older epoch discard
    /// their results instead of merging.
    epoch: AtomicU64,
    connect_failures: AtomicU32,
    last_attempt: Mutex<Option<Instant>>,
}

/// Orchestrates refresh cycles and exposes the snapshot to the view layer.
/// Receives its transport and account explicitly; holds no globals.
pub struct SyncManager {
    shared: Arc<SyncShared>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl SyncManager {
    pub fn new(transport: ChainTransport, account: Account, options: SyncOptions) -> Self {
        let (snapshot, _) = watch::channel(SyncSnapshot::initial(account.clone()));
        Self {
            shared: Arc::new(SyncShared {
                transport,
                account,
                options,
                snapshot,
                cycle_gate: AsyncMutex::new(()),
                merge_lock: Mutex::new(()),
                epoch: AtomicU64::new(0),
                connect_failures: AtomicU32::new(0),
                last_attempt: Mutex::new(None),
            }),
            timer: Mutex::new(None),
        }
    }

    /// Begin the repeating refresh cycle. The first cycle runs immediately;
    /// ticks that fire while a cycle is still in flight are skipped.
    pub fn start(&self, interval: Duration) {
        let mut timer = lock_unpoisoned(&self.timer);
        if timer.is_some() {
            log::warn!("sync loop already running");
            return;
        }
        log::info!(
            "starting sync loop against {} (every {:?})",
            self.shared.transport.endpoint(),
            interval
        );
        let shared = self.shared.clone();
        *timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                run_cycle(&shared, false).await;
            }
        }));
    }

    /// Halt the timer. No merge from a cycle that was in flight when this
    /// was called lands after it returns.
    pub fn stop(&self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        drop(lock_unpoisoned(&self.shared.merge_lock));
        if let Some(task) = lock_unpoisoned(&self.timer).take() {
            task.abort();
            log::debug!("sync loop stopped");
        }
    }

    /// The last fully merged snapshot. Synchronous and non-blocking.
    pub fn snapshot(&self) -> SyncSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Change notifications for the view layer.
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Ask the node's faucet to fund the account, then run one immediate
    /// refresh cycle so the next snapshot already reflects the new balance.
    pub async fn request_funds(&self) -> Result<(), WalletError> {
        let conn = self
            .shared
            .transport
            .current()
            .ok_or(WalletError::NotConnected)?;
        conn.invoke("teth_faucet", json!([self.shared.account.address]))
            .await?;
        log::info!("faucet granted funds to {}", self.shared.account.address);
        run_cycle(&self.shared, true).await;
        Ok(())
    }
}

async fn run_cycle(shared: &Arc<SyncShared>, forced: bool) {
    let _gate = if forced {
        shared.cycle_gate.lock().await
    } else {
        match shared.cycle_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                log::debug!("previous refresh cycle still running, skipping tick");
                return;
            }
        }
    };

    let epoch = shared.epoch.load(Ordering::SeqCst);
    let conn = ensure_connection(shared).await;

    let (balance, ranking, blocks) = match conn.as_ref() {
        Some(conn) if conn.state() == ConnectionState::Connected => {
            tokio::join!(
                conn.get_balance(&shared.account.address),
                top_accounts::fetch_top(conn, shared.options.top_accounts),
                block_feed::refresh(conn, shared.options.block_window),
            )
        }
        _ => (
            Err(WalletError::NotConnected),
            Err(WalletError::NotConnected),
            Err(WalletError::NotConnected),
        ),
    };

    let connection = conn
        .map(|conn| conn.state())
        .unwrap_or(ConnectionState::Disconnected);

    // Publish in one step: readers see the pre-cycle or post-cycle
    // aggregate, never a half-merged one.
    let _merge = lock_unpoisoned(&shared.merge_lock);
    if shared.epoch.load(Ordering::SeqCst) != epoch {
        log::debug!("discarding results from a cycle outlived by stop()");
        return;
    }

    let mut next = shared.snapshot.borrow().clone();
    next.cycle += 1;
    next.connection = connection;

    match balance {
        Ok(amount) => {
            next.balance = Some(BalanceReading {
                owner: shared.account.address.clone(),
                amount,
                observed_cycle: next.cycle,
            });
        }
        Err(e) => log_fetch_failure("balance", &e),
    }
    match ranking {
        Ok(entries) => next.ranking = Some(entries),
        Err(e) => log_fetch_failure("ranking", &e),
    }
    match blocks {
        Ok(history) => next.blocks = Some(history),
        Err(e) => log_fetch_failure("block history", &e),
    }

    shared.snapshot.send_replace(next);
}

/// Return a usable connection, honoring the reconnect policy when the
/// current instance is gone or dead.
async fn ensure_connection(shared: &SyncShared) -> Option<Connection> {
    let current = shared.transport.current();
    if let Some(conn) = current.as_ref() {
        if conn.state() != ConnectionState::Disconnected {
            return current;
        }
        let failures = shared.connect_failures.load(Ordering::SeqCst);
        let Some(delay) = shared.options.reconnect.delay_before(failures) else {
            return current;
        };
        let due = {
            let last = lock_unpoisoned(&shared.last_attempt);
            (*last).map(|at| at.elapsed() >= delay).unwrap_or(true)
        };
        if !due {
            return current;
        }
    }

    *lock_unpoisoned(&shared.last_attempt) = Some(Instant::now());
    match shared.transport.connect().await {
        Ok(conn) => {
            shared.connect_failures.store(0, Ordering::SeqCst);
            Some(conn)
        }
        Err(e) => {
            let failures = shared.connect_failures.fetch_add(1, Ordering::SeqCst) + 1;
            log::warn!("node connection attempt {} failed: {}", failures, e);
            shared.transport.current()
        }
    }
}

fn log_fetch_failure(what: &str, error: &WalletError) {
    match error {
        WalletError::NotConnected => log::debug!("{} refresh skipped: {}", what, error),
        _ => log::warn!("{} refresh failed, keeping last known value: {}", what, error),
    }
}
