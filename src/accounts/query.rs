//! Account state lookup backed by the cache.
//!
//! A cache hit hands out the next sequence (cached + 1) and stores it back,
//! so consecutive transactions from one signer need no round trip. The cache
//! is never authoritative: a stale-sequence rejection removes the entry and
//! the next build re-queries the node.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::accounts::cache::Cache;
use crate::blockchain::query::QueryClient;
use crate::blockchain::types::{AccountState, TxResult};
use crate::observability::metrics;

/// Query path answering `{"address": ...}` with `{"account_number", "sequence"}`.
pub const ACCOUNT_QUERY_PATH: &str = "custom/auth/account";

#[derive(Clone)]
pub struct AccountQuery {
    queries: QueryClient,
    cache: Arc<dyn Cache<AccountState>>,
    expiration: Duration,
}

impl AccountQuery {
    pub fn new(
        queries: QueryClient,
        cache: Arc<dyn Cache<AccountState>>,
        expiration: Duration,
    ) -> Self {
        Self {
            queries,
            cache,
            expiration,
        }
    }

    /// Query the node, bypassing the cache.
    pub async fn query_account(&self, address: &str) -> TxResult<AccountState> {
        self.queries
            .query_with_response(ACCOUNT_QUERY_PATH, Some(&json!({ "address": address })))
            .await
    }

    /// Account state for the next transaction of `address`.
    pub async fn query_and_refresh(&self, address: &str) -> TxResult<AccountState> {
        let key = cache_key(address);
        // An exhausted sequence counts as a miss.
        let advanced = self.cache.get(&key).and_then(|cached| {
            cached.sequence.checked_add(1).map(|sequence| AccountState {
                sequence,
                ..cached
            })
        });
        if let Some(next) = advanced {
            metrics::record_cache_lookup(true);
            self.cache.set(&key, next, self.expiration);
            tracing::debug!(
                address = address,
                account_number = next.account_number,
                sequence = next.sequence,
                "Account state from cache"
            );
            return Ok(next);
        }
        metrics::record_cache_lookup(false);
        self.refresh(address).await
    }

    /// Re-query `address` and overwrite its cache entry.
    pub async fn refresh(&self, address: &str) -> TxResult<AccountState> {
        let state = self.query_account(address).await?;
        self.cache.set(&cache_key(address), state, self.expiration);
        tracing::debug!(
            address = address,
            account_number = state.account_number,
            sequence = state.sequence,
            "Account state refreshed from node"
        );
        Ok(state)
    }

    /// Drop the cached state of `address`.
    pub fn remove(&self, address: &str) {
        self.cache.delete(&cache_key(address));
    }
}

fn cache_key(address: &str) -> String {
    format!("account:{}", address)
}
