//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Root configuration for the transaction client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Tendermint JSON-RPC endpoint (e.g., "http://127.0.0.1:26657").
    pub node_uri: String,

    /// Auxiliary gRPC endpoint (e.g., "http://127.0.0.1:9090").
    pub grpc_addr: String,

    /// Chain ID written into every sign document.
    pub chain_id: String,

    /// Default gas limit when a transaction does not set one.
    pub gas: u64,

    /// Default gas adjustment applied to simulated gas.
    pub gas_adjustment: f64,

    /// Default fee when a transaction does not carry a valid one.
    pub fee: Vec<Coin>,

    /// Default broadcast mode.
    pub mode: BroadcastMode,

    /// RPC request timeout in seconds.
    pub timeout_secs: u64,

    /// Cache account state between builds.
    pub cached: bool,

    /// Maximum number of cached entries.
    pub cache_capacity: usize,

    /// Time-to-live of cached account state in seconds.
    pub cache_ttl_secs: u64,

    /// Number of account lock shards.
    pub lock_shards: usize,

    /// Initial number of messages per transaction in batch sends.
    pub max_batch: usize,

    /// Retry configuration.
    pub retry: RetryConfig,

    /// Credentials sent as metadata on the auxiliary channel.
    pub project: ProjectConfig,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            node_uri: "http://127.0.0.1:26657".to_string(),
            grpc_addr: "http://127.0.0.1:9090".to_string(),
            chain_id: String::new(),
            gas: 200_000,
            gas_adjustment: 1.0,
            fee: Vec::new(),
            mode: BroadcastMode::Sync,
            timeout_secs: 10,
            cached: true,
            cache_capacity: 100,
            cache_ttl_secs: 60,
            lock_shards: 16,
            max_batch: 100,
            retry: RetryConfig::default(),
            project: ProjectConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Project credentials attached to every auxiliary-channel call.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub project_id: String,
    pub project_key: String,
    pub chain_account_address: String,
}

impl fmt::Debug for ProjectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectConfig")
            .field("project_id", &self.project_id)
            .field("project_key", &"<redacted>")
            .field("chain_account_address", &self.chain_account_address)
            .finish()
    }
}

/// How long `broadcast_tx` waits for the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastMode {
    /// Return immediately.
    Async,
    /// Return after CheckTx.
    #[default]
    Sync,
    /// Return after the transaction is committed.
    Commit,
}

impl BroadcastMode {
    /// Tendermint JSON-RPC method for this mode.
    pub fn rpc_method(self) -> &'static str {
        match self {
            BroadcastMode::Async => "broadcast_tx_async",
            BroadcastMode::Sync => "broadcast_tx_sync",
            BroadcastMode::Commit => "broadcast_tx_commit",
        }
    }
}

/// A token amount.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u64,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u64) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// Denom is 3-128 chars, starts with a letter, then `[a-zA-Z0-9/:._-]`.
    pub fn is_valid(&self) -> bool {
        let bytes = self.denom.as_bytes();
        if !(3..=128).contains(&bytes.len()) || !bytes[0].is_ascii_alphabetic() {
            return false;
        }
        bytes[1..]
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'/' | b':' | b'.' | b'_' | b'-'))
            && self.amount > 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// A fee is valid when every coin is valid and denoms are unique.
pub fn coins_valid(coins: &[Coin]) -> bool {
    coins.iter().all(Coin::is_valid)
        && coins
            .iter()
            .enumerate()
            .all(|(i, c)| coins[..i].iter().all(|prev| prev.denom != c.denom))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.lock_shards, 16);
        assert_eq!(config.max_batch, 100);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.mode, BroadcastMode::Sync);
    }

    #[test]
    fn test_coin_validity() {
        assert!(Coin::new("uirita", 10).is_valid());
        assert!(Coin::new("ibc/27394FB0", 1).is_valid());
        assert!(!Coin::new("ui", 10).is_valid());
        assert!(!Coin::new("1abc", 10).is_valid());
        assert!(!Coin::new("uirita", 0).is_valid());
        assert!(!coins_valid(&[Coin::new("uirita", 1), Coin::new("uirita", 2)]));
        assert!(coins_valid(&[]));
    }

    #[test]
    fn test_mode_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: BroadcastMode,
        }
        let w: Wrapper = toml::from_str(r#"mode = "commit""#).unwrap();
        assert_eq!(w.mode, BroadcastMode::Commit);
        assert_eq!(w.mode.rpc_method(), "broadcast_tx_commit");
    }

    #[test]
    fn test_project_key_is_redacted() {
        let project = ProjectConfig {
            project_id: "p1".into(),
            project_key: "secret".into(),
            chain_account_address: "addr".into(),
        };
        assert!(!format!("{:?}", project).contains("secret"));
    }
}
