use chrono::Utc;
use secp256k1::rand;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};

use super::models::Account;
use crate::error::WalletError;

pub struct KeyManager;

impl KeyManager {
    /// Generate a fresh random account
    pub fn generate() -> Account {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut rand::thread_rng());
        Self::build_account(&secret_key, &public_key)
    }

    /// Rebuild an account from a bare hex secret key
    pub fn from_secret_hex(secret_hex: &str) -> Result<Account, WalletError> {
        let bytes = hex::decode(secret_hex.trim_start_matches("0x"))
            .map_err(|e| WalletError::Internal(format!("invalid secret key hex: {}", e)))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| WalletError::Internal(format!("invalid secret key: {}", e)))?;
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Ok(Self::build_account(&secret_key, &public_key))
    }

    fn build_account(secret_key: &SecretKey, public_key: &PublicKey) -> Account {
        Account {
            address: derive_address(public_key),
            private_key: format!("0x{}", hex::encode(secret_key.secret_bytes())),
            public_key: format!("0x{}", hex::encode(public_key.serialize_uncompressed())),
            created_at: Utc::now(),
        }
    }
}

/// Address is the low 20 bytes of Keccak-256 over the public key body
/// (uncompressed encoding without the 0x04 tag).
fn derive_address(public_key: &PublicKey) -> String {
    let uncompressed = public_key.serialize_uncompressed();
    let digest = Keccak256::digest(&uncompressed[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}
