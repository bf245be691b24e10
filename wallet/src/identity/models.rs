//! Data model for the persisted account record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single local account. Field names follow the JSON layout of the
/// persisted slot, which is fixed and unversioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// 0x-prefixed 20-byte address
    pub address: String,
    /// 0x-prefixed 32-byte secret key
    pub private_key: String,
    /// 0x-prefixed uncompressed public key
    pub public_key: String,
    pub created_at: DateTime<Utc>,
}

fn is_hex_with_prefix(value: &str, hex_len: usize) -> bool {
    value.len() == 2 + hex_len
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

impl Account {
    /// Shape check for records loaded from the slot file.
    pub fn validate(&self) -> Result<(), String> {
        if !is_hex_with_prefix(&self.address, 40) {
            return Err(format!("invalid address: {}", self.address));
        }
        if !is_hex_with_prefix(&self.private_key, 64) {
            return Err("invalid private key".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::KeyManager;

    #[test]
    fn test_generated_account_is_valid() {
        let account = KeyManager::generate();
        assert!(account.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_address() {
        let mut account = KeyManager::generate();
        account.address = "0x1234".to_string();
        assert!(account.validate().is_err());
    }

    #[test]
    fn test_slot_roundtrip_is_bit_identical() {
        let account = KeyManager::generate();
        let json = serde_json::to_string(&account).unwrap();
        let restored: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(account, restored);
    }
}
