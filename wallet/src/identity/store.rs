use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use super::keys::KeyManager;
use super::models::Account;
use crate::error::{StorageError, WalletError};

/// File name of the single account slot inside the data directory.
const ACCOUNT_SLOT: &str = "local-account.json";

/// Owns the persisted local account. One slot, one account; repeated
/// resolution within a session always returns the same record.
pub struct IdentityStore {
    base_path: PathBuf,
    cached: Mutex<Option<Account>>,
}

impl IdentityStore {
    /// Create a store over the default data directory ("./wallet-data")
    pub fn new() -> Self {
        Self::new_with_base_dir(PathBuf::from("./wallet-data"))
    }

    /// Create a store with a custom base directory (for testing)
    pub fn new_with_base_dir(base_path: PathBuf) -> Self {
        Self {
            base_path,
            cached: Mutex::new(None),
        }
    }

    pub fn slot_path(&self) -> PathBuf {
        self.base_path.join(ACCOUNT_SLOT)
    }

    /// Restore the persisted account, or create and persist a new one if the
    /// slot is empty. A slot holding data that does not deserialize to a
    /// valid account fails with `CorruptIdentity` and is left untouched:
    /// regenerating over it would orphan any funds the old address holds.
    pub fn resolve(&self) -> Result<Account, WalletError> {
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(account) = cached.as_ref() {
            return Ok(account.clone());
        }

        let path = self.slot_path();
        let account = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(StorageError::Io)?;
            let account: Account = serde_json::from_str(&contents).map_err(|e| {
                WalletError::CorruptIdentity(format!("{}: {}", path.display(), e))
            })?;
            account
                .validate()
                .map_err(WalletError::CorruptIdentity)?;
            log::info!("restored account {}", account.address);
            account
        } else {
            let account = KeyManager::generate();
            fs::create_dir_all(&self.base_path).map_err(StorageError::Io)?;
            let json = serde_json::to_string_pretty(&account).map_err(StorageError::Json)?;
            fs::write(&path, json).map_err(StorageError::Io)?;
            log::info!("created account {}", account.address);
            account
        };

        *cached = Some(account.clone());
        Ok(account)
    }
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}
