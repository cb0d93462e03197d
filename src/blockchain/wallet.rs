//! Key management and transaction signing.
//!
//! # Security
//! - Keys are held in memory only and never logged or serialized
//! - Every use of a key requires its password

use alloy::primitives::keccak256;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use base64::Engine;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::blockchain::types::{TxError, TxResult};

/// Resolves signer names and signs transaction bytes.
#[async_trait]
pub trait KeyManager: Send + Sync {
    /// Address of the key stored under `name`.
    async fn resolve_address(&self, name: &str, password: &str) -> TxResult<String>;

    /// Sign `sign_bytes` with the key stored under `name`, returning the
    /// encoded signed transaction.
    async fn sign(&self, name: &str, sign_bytes: &[u8], password: &str) -> TxResult<Vec<u8>>;
}

/// Encoded signed transaction produced by [`LocalKeyring`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    /// Base64 of the sign bytes.
    pub body: String,
    /// Hex of the 65-byte recoverable signature over keccak256(body).
    pub signature: String,
    pub signer: String,
}

impl SignedTx {
    pub fn decode(bytes: &[u8]) -> TxResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn sign_bytes(&self) -> TxResult<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.body)
            .map_err(|e| TxError::Codec(format!("signed tx body: {}", e)))
    }
}

struct KeyEntry {
    signer: PrivateKeySigner,
    password: String,
}

/// In-memory keyring of secp256k1 keys, each guarded by a password.
#[derive(Clone, Default)]
pub struct LocalKeyring {
    keys: Arc<DashMap<String, KeyEntry>>,
}

impl LocalKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Import a hex-encoded private key (with or without 0x prefix) under `name`.
    pub fn import_private_key(
        &self,
        name: &str,
        private_key_hex: &str,
        password: &str,
    ) -> TxResult<String> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);
        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| TxError::Signing(format!("Invalid private key format: {}", e)))?;
        Ok(self.insert(name, signer, password))
    }

    /// Generate a fresh key under `name` and return its address.
    pub fn generate(&self, name: &str, password: &str) -> String {
        self.insert(name, PrivateKeySigner::random(), password)
    }

    fn insert(&self, name: &str, signer: PrivateKeySigner, password: &str) -> String {
        let address = signer.address().to_string();
        tracing::info!(name = name, address = %address, "Key added to keyring");
        self.keys.insert(
            name.to_string(),
            KeyEntry {
                signer,
                password: password.to_string(),
            },
        );
        address
    }

    fn unlock(&self, name: &str, password: &str) -> Result<PrivateKeySigner, String> {
        let entry = self
            .keys
            .get(name)
            .ok_or_else(|| format!("key '{}' not found", name))?;
        if entry.password != password {
            return Err(format!("wrong password for key '{}'", name));
        }
        Ok(entry.signer.clone())
    }
}

impl std::fmt::Debug for LocalKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeyring")
            .field("keys", &self.keys.len())
            .finish()
    }
}

#[async_trait]
impl KeyManager for LocalKeyring {
    async fn resolve_address(&self, name: &str, password: &str) -> TxResult<String> {
        self.unlock(name, password)
            .map(|signer| signer.address().to_string())
            .map_err(TxError::AddressResolution)
    }

    async fn sign(&self, name: &str, sign_bytes: &[u8], password: &str) -> TxResult<Vec<u8>> {
        let signer = self.unlock(name, password).map_err(TxError::Signing)?;
        let signature = signer
            .sign_hash(&keccak256(sign_bytes))
            .await
            .map_err(|e| TxError::Signing(format!("Signing failed: {}", e)))?;

        let signed = SignedTx {
            body: base64::engine::general_purpose::STANDARD.encode(sign_bytes),
            signature: hex::encode(signature.as_bytes()),
            signer: signer.address().to_string(),
        };
        Ok(serde_json::to_vec(&signed)?)
    }
}
