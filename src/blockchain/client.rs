//! Transaction orchestration.
//!
//! # Responsibilities
//! - Serialize all sends of one signer through the sharded lock
//! - Retry single sends on stale sequence, invalidating the cached account
//! - Split batches into groups, halving the group size on oversize
//! - Contain panics raised while a batch is in flight
//! - Expose node queries (generic, typed, raw store, account)

use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::accounts::{AccountQuery, Cache, ShardedLock, TtlCache};
use crate::blockchain::batch::BatchPlan;
use crate::blockchain::factory::BaseTx;
use crate::blockchain::msg::Msg;
use crate::blockchain::query::QueryClient;
use crate::blockchain::rpc::{HttpNodeRpc, NodeRpc};
use crate::blockchain::transaction::{BuiltTx, TxBuilder};
use crate::blockchain::types::{
    AbciQueryResponse, AccountState, BatchError, ClientConfig, ResultTx, TxError, TxResult,
};
use crate::blockchain::wallet::{KeyManager, LocalKeyring};
use crate::net::{ConnectionManager, GrpcParamsClient, ParamsQuery};
use crate::observability::metrics;
use crate::resilience::{RetryAction, RetryDecision, RetryPolicy};

/// Receives a diagnostic message when a batch panics.
pub type FaultHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Assembles a [`BaseClient`], defaulting every unset collaborator.
pub struct ClientBuilder {
    config: ClientConfig,
    rpc: Option<Arc<dyn NodeRpc>>,
    params: Option<Arc<dyn ParamsQuery>>,
    keys: Option<Arc<dyn KeyManager>>,
    cache: Option<Arc<dyn Cache<AccountState>>>,
    fault_handler: Option<FaultHandler>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            rpc: None,
            params: None,
            keys: None,
            cache: None,
            fault_handler: None,
        }
    }

    pub fn with_rpc(mut self, rpc: Arc<dyn NodeRpc>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    pub fn with_params(mut self, params: Arc<dyn ParamsQuery>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_key_manager(mut self, keys: Arc<dyn KeyManager>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache<AccountState>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_fault_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.fault_handler = Some(Arc::new(handler));
        self
    }

    /// Defaults: JSON-RPC node client, gRPC params over the process-wide
    /// channel, empty in-memory keyring, TTL cache (disabled unless `cached`).
    pub fn build(self) -> TxResult<BaseClient> {
        let config = Arc::new(self.config);

        let rpc: Arc<dyn NodeRpc> = match self.rpc {
            Some(rpc) => rpc,
            None => Arc::new(HttpNodeRpc::new(&config)?),
        };
        let params: Arc<dyn ParamsQuery> = match self.params {
            Some(params) => params,
            None => Arc::new(GrpcParamsClient::new(
                ConnectionManager::shared(&config)?,
                config.timeout(),
            )),
        };
        let keys = self
            .keys
            .unwrap_or_else(|| Arc::new(LocalKeyring::new()) as Arc<dyn KeyManager>);
        let cache = self.cache.unwrap_or_else(|| {
            let cache: TtlCache<AccountState> = if config.cached {
                TtlCache::new(config.cache_capacity)
            } else {
                TtlCache::disabled()
            };
            Arc::new(cache) as Arc<dyn Cache<AccountState>>
        });
        let fault_handler = self.fault_handler.unwrap_or_else(|| {
            Arc::new(|message: &str| tracing::error!(fault = message, "Batch send faulted"))
                as FaultHandler
        });

        let queries = QueryClient::new(rpc);
        let accounts = AccountQuery::new(queries.clone(), cache, config.cache_ttl());
        let builder = TxBuilder::new(config.clone(), queries.clone(), keys, accounts.clone());

        tracing::info!(
            chain_id = %config.chain_id,
            node_uri = %config.node_uri,
            cached = config.cached,
            lock_shards = config.lock_shards,
            max_batch = config.max_batch,
            "Transaction client initialized"
        );

        Ok(BaseClient {
            locks: ShardedLock::new(config.lock_shards),
            single_policy: RetryPolicy::single(&config.retry),
            batch_policy: RetryPolicy::batch(&config.retry),
            config,
            queries,
            accounts,
            builder,
            params,
            fault_handler,
        })
    }
}

/// Builds, signs and broadcasts transactions against one chain.
pub struct BaseClient {
    config: Arc<ClientConfig>,
    queries: QueryClient,
    accounts: AccountQuery,
    builder: TxBuilder,
    params: Arc<dyn ParamsQuery>,
    locks: ShardedLock,
    single_policy: RetryPolicy,
    batch_policy: RetryPolicy,
    fault_handler: FaultHandler,
}

impl BaseClient {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build and sign without broadcasting. Takes no lock and never retries.
    pub async fn build_and_sign(&self, msgs: &[Box<dyn Msg>], base_tx: &BaseTx) -> TxResult<Vec<u8>> {
        let address = self.builder.resolve_address(base_tx).await?;
        let tx = self.builder.build(&address, msgs, base_tx).await?;
        Ok(tx.bytes)
    }

    /// Build, sign and broadcast one transaction.
    ///
    /// A stale-sequence rejection drops the cached account state and the
    /// transaction is rebuilt, up to the configured attempt ceiling.
    pub async fn build_and_send(&self, msgs: &[Box<dyn Msg>], base_tx: &BaseTx) -> TxResult<ResultTx> {
        let _guard = self.locks.lock(&base_tx.from).await;
        let address = self.builder.resolve_address(base_tx).await?;

        let mut attempt = 1;
        loop {
            let err = match self.sign_and_broadcast(&address, msgs, base_tx).await {
                Ok(result) => return Ok(result),
                Err(err) => err,
            };
            // A failed attempt may have consumed a cached sequence.
            self.builder.invalidate(&address);

            match self.single_policy.decide(attempt, &err) {
                RetryDecision::Retry(_) => {
                    metrics::record_retry("stale_sequence");
                    tracing::warn!(
                        address = %address,
                        attempt = attempt,
                        error = %err,
                        "Stale sequence, retrying with refreshed account"
                    );
                    tokio::time::sleep(self.single_policy.delay(attempt)).await;
                    attempt += 1;
                }
                RetryDecision::Abort => {
                    tracing::error!(address = %address, attempt = attempt, error = %err, "Send failed");
                    return Err(self.single_policy.finish(err, &address, attempt));
                }
            }
        }
    }

    /// Send `msgs` in consecutive groups of at most `max_batch` messages.
    ///
    /// Every message is validated before any network call. On error the
    /// results of groups already broadcast are returned alongside it.
    pub async fn send_batch(
        &self,
        msgs: &[Box<dyn Msg>],
        base_tx: &BaseTx,
    ) -> Result<Vec<ResultTx>, BatchError> {
        if msgs.is_empty() {
            return Err(BatchError::new(Vec::new(), TxError::EmptyBatch));
        }
        validate_msgs(msgs).map_err(|e| BatchError::new(Vec::new(), e))?;

        let _guard = self.locks.lock(&base_tx.from).await;
        let address = self
            .builder
            .resolve_address(base_tx)
            .await
            .map_err(|e| BatchError::new(Vec::new(), e))?;
        let mut sent = Vec::new();
        let outcome = AssertUnwindSafe(self.run_batch(&address, msgs, base_tx, &mut sent))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                tracing::info!(groups = sent.len(), msgs = msgs.len(), "Batch sent");
                Ok(sent)
            }
            Ok(Err(err)) => Err(BatchError::new(sent, err)),
            Err(panic) => {
                let message = format!(
                    "panic while sending batch for {}: {}",
                    base_tx.from,
                    panic_message(panic.as_ref())
                );
                // The unwound build may have advanced the cached sequence.
                self.builder.invalidate(&address);
                (self.fault_handler)(&message);
                Err(BatchError::new(sent, TxError::InternalFault(message)))
            }
        }
    }

    /// Check a signed size against the server limit when any of `msgs`
    /// is size-governed.
    pub async fn validate_tx_size(&self, tx_size: usize, msgs: &[Box<dyn Msg>]) -> TxResult<()> {
        if !msgs.iter().any(|msg| msg.is_size_governed()) {
            return Ok(());
        }
        let limit = self.params.tx_size_limit().await?;
        if tx_size as u64 > limit {
            return Err(TxError::TxTooLarge {
                size: tx_size,
                limit: Some(limit),
            });
        }
        Ok(())
    }

    /// Query `path` with an optional JSON payload, returning the raw value.
    pub async fn query(&self, path: &str, payload: Option<&Value>) -> TxResult<Vec<u8>> {
        self.queries.query(path, payload).await
    }

    pub async fn query_with_response<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: Option<&Value>,
    ) -> TxResult<T> {
        self.queries.query_with_response(path, payload).await
    }

    pub async fn query_store(
        &self,
        key: &[u8],
        store_name: &str,
        height: i64,
        prove: bool,
    ) -> TxResult<AbciQueryResponse> {
        self.queries.query_store(key, store_name, height, prove).await
    }

    /// Current account state from the node, bypassing the cache.
    pub async fn query_account(&self, address: &str) -> TxResult<AccountState> {
        self.accounts.query_account(address).await
    }

    async fn run_batch(
        &self,
        address: &str,
        msgs: &[Box<dyn Msg>],
        base_tx: &BaseTx,
        sent: &mut Vec<ResultTx>,
    ) -> TxResult<()> {
        let mut plan = BatchPlan::new(msgs.len(), self.config.max_batch);
        let mut attempt = 1;

        while let Some(group) = plan.next_group() {
            let group_msgs = &msgs[group.clone()];
            let err = match self.send_group(address, group_msgs, base_tx).await {
                Ok(result) => {
                    sent.push(result);
                    plan.complete(group);
                    continue;
                }
                Err(err) if group.len() == 1 => err.for_single_message(),
                Err(err) => err,
            };
            self.builder.invalidate(address);

            match self.batch_policy.decide(attempt, &err) {
                RetryDecision::Retry(RetryAction::InvalidateAccount) => {
                    metrics::record_retry("stale_sequence");
                }
                RetryDecision::Retry(RetryAction::ShrinkBatch) => {
                    plan.shrink();
                    metrics::record_retry("tx_too_large");
                    metrics::record_batch_size(plan.batch_size());
                }
                RetryDecision::Abort => {
                    tracing::error!(
                        address = %address,
                        attempt = attempt,
                        broadcast = sent.len(),
                        remaining = plan.remaining(),
                        error = %err,
                        "Batch aborted"
                    );
                    return Err(self.batch_policy.finish(err, address, attempt));
                }
            }

            tracing::warn!(
                address = %address,
                attempt = attempt,
                batch_size = plan.batch_size(),
                remaining = plan.remaining(),
                error = %err,
                "Retrying batch"
            );
            tokio::time::sleep(self.batch_policy.delay(attempt)).await;
            attempt += 1;
        }
        Ok(())
    }

    async fn send_group(
        &self,
        address: &str,
        msgs: &[Box<dyn Msg>],
        base_tx: &BaseTx,
    ) -> TxResult<ResultTx> {
        let tx = self.builder.build(address, msgs, base_tx).await?;
        self.validate_tx_size(tx.bytes.len(), msgs).await?;
        self.broadcast(&tx).await
    }

    async fn sign_and_broadcast(
        &self,
        address: &str,
        msgs: &[Box<dyn Msg>],
        base_tx: &BaseTx,
    ) -> TxResult<ResultTx> {
        let tx = self.builder.build(address, msgs, base_tx).await?;
        self.broadcast(&tx).await
    }

    async fn broadcast(&self, tx: &BuiltTx) -> TxResult<ResultTx> {
        let result = self.queries.rpc().broadcast_tx(&tx.bytes, tx.mode).await?;
        if result.is_ok() {
            metrics::record_broadcast("accepted");
            tracing::info!(
                hash = %result.hash,
                height = result.height,
                sequence = tx.sequence,
                "Transaction broadcast"
            );
            return Ok(result);
        }

        metrics::record_broadcast("rejected");
        tracing::debug!(
            hash = %result.hash,
            code = result.code,
            codespace = %result.codespace,
            log = %result.log,
            "Transaction rejected"
        );
        Err(TxError::from_rejection(&result, tx.bytes.len()))
    }
}

impl std::fmt::Debug for BaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseClient")
            .field("chain_id", &self.config.chain_id)
            .field("node_uri", &self.config.node_uri)
            .field("lock_shards", &self.locks.shard_count())
            .finish()
    }
}

fn validate_msgs(msgs: &[Box<dyn Msg>]) -> TxResult<()> {
    for (index, msg) in msgs.iter().enumerate() {
        msg.validate_basic()
            .map_err(|reason| TxError::Validation { index, reason })?;
    }
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
