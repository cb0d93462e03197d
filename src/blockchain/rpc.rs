//! Node RPC: ABCI queries and transaction broadcast.
//!
//! # Responsibilities
//! - Define the query/broadcast seam the client talks through
//! - Speak Tendermint JSON-RPC 2.0 over HTTP for the default implementation
//! - Bound every call with the configured timeout

use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::blockchain::types::{
    de_i64, AbciQueryOptions, AbciQueryResponse, BroadcastMode, ClientConfig, ResultTx, TxError,
    TxResult,
};

/// Request/response protocol of a ledger node.
///
/// `broadcast_tx` reports node-side rejections through `ResultTx::code`, not
/// as `Err`; errors are reserved for transport and protocol failures.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    async fn abci_query(
        &self,
        path: &str,
        data: &[u8],
        opts: AbciQueryOptions,
    ) -> TxResult<AbciQueryResponse>;

    async fn broadcast_tx(&self, tx: &[u8], mode: BroadcastMode) -> TxResult<ResultTx>;
}

/// Tendermint JSON-RPC client.
#[derive(Clone)]
pub struct HttpNodeRpc {
    http: reqwest::Client,
    endpoint: Url,
    timeout_duration: Duration,
}

impl HttpNodeRpc {
    /// Create a client for `config.node_uri`.
    pub fn new(config: &ClientConfig) -> TxResult<Self> {
        let endpoint: Url = config.node_uri.parse().map_err(|e| {
            TxError::Rpc(format!("Invalid node URI '{}': {}", config.node_uri, e))
        })?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TxError::Rpc(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(node_uri = %endpoint, timeout_secs = config.timeout_secs, "Node RPC client initialized");

        Ok(Self {
            http,
            endpoint,
            timeout_duration: config.timeout(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> TxResult<T> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": uuid::Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });

        let fut = async {
            let response = self
                .http
                .post(self.endpoint.clone())
                .json(&request)
                .send()
                .await
                .map_err(|e| TxError::Rpc(format!("{} request failed: {}", method, e)))?;
            let envelope: RpcEnvelope<T> = response
                .json()
                .await
                .map_err(|e| TxError::Codec(format!("{} response: {}", method, e)))?;
            envelope.into_result(method)
        };

        match timeout(self.timeout_duration, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(method = method, "Node RPC timeout");
                Err(TxError::Timeout(self.timeout_duration.as_secs()))
            }
        }
    }
}

impl std::fmt::Debug for HttpNodeRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNodeRpc")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}

#[async_trait]
impl NodeRpc for HttpNodeRpc {
    async fn abci_query(
        &self,
        path: &str,
        data: &[u8],
        opts: AbciQueryOptions,
    ) -> TxResult<AbciQueryResponse> {
        let params = json!({
            "path": path,
            "data": hex::encode(data),
            "height": opts.height.to_string(),
            "prove": opts.prove,
        });
        let result: AbciQueryResult = self.call("abci_query", params).await?;
        result.response.decode()
    }

    async fn broadcast_tx(&self, tx: &[u8], mode: BroadcastMode) -> TxResult<ResultTx> {
        let params = json!({ "tx": base64::engine::general_purpose::STANDARD.encode(tx) });
        match mode {
            BroadcastMode::Commit => {
                let result: BroadcastCommitResult = self.call(mode.rpc_method(), params).await?;
                Ok(result.into())
            }
            BroadcastMode::Sync | BroadcastMode::Async => {
                let result: BroadcastResult = self.call(mode.rpc_method(), params).await?;
                Ok(result.into())
            }
        }
    }
}

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl<T> RpcEnvelope<T> {
    fn into_result(self, method: &str) -> TxResult<T> {
        if let Some(err) = self.error {
            let data = match err.data {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => String::new(),
            };
            return Err(TxError::Rpc(format!(
                "{} failed ({}): {} {}",
                method, err.code, err.message, data
            )));
        }
        self.result
            .ok_or_else(|| TxError::Codec(format!("{} response has no result", method)))
    }
}

#[derive(Deserialize)]
struct AbciQueryResult {
    response: RawAbciResponse,
}

#[derive(Deserialize)]
struct RawAbciResponse {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default, deserialize_with = "de_i64")]
    height: i64,
    #[serde(default)]
    codespace: String,
    #[serde(default, rename = "proofOps")]
    proof_ops: Option<Value>,
}

impl RawAbciResponse {
    fn decode(self) -> TxResult<AbciQueryResponse> {
        let b64 = base64::engine::general_purpose::STANDARD;
        let decode = |field: Option<String>| -> TxResult<Vec<u8>> {
            match field {
                Some(s) if !s.is_empty() => b64
                    .decode(s)
                    .map_err(|e| TxError::Codec(format!("abci_query base64: {}", e))),
                _ => Ok(Vec::new()),
            }
        };
        Ok(AbciQueryResponse {
            code: self.code,
            log: self.log,
            key: decode(self.key)?,
            value: decode(self.value)?,
            height: self.height,
            codespace: self.codespace,
            proof_ops: self.proof_ops.filter(|v| !v.is_null()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct BroadcastResult {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    #[serde(default)]
    codespace: String,
    hash: String,
}

impl From<BroadcastResult> for ResultTx {
    fn from(r: BroadcastResult) -> Self {
        ResultTx {
            hash: r.hash,
            code: r.code,
            codespace: r.codespace,
            log: r.log,
            ..Default::default()
        }
    }
}

#[derive(Deserialize, Default)]
struct TxOutcome {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    #[serde(default)]
    codespace: String,
    #[serde(default, deserialize_with = "de_i64")]
    gas_wanted: i64,
    #[serde(default, deserialize_with = "de_i64")]
    gas_used: i64,
}

#[derive(Deserialize)]
struct BroadcastCommitResult {
    #[serde(default)]
    check_tx: TxOutcome,
    #[serde(default, alias = "tx_result")]
    deliver_tx: Option<TxOutcome>,
    hash: String,
    #[serde(default, deserialize_with = "de_i64")]
    height: i64,
}

impl From<BroadcastCommitResult> for ResultTx {
    fn from(r: BroadcastCommitResult) -> Self {
        // A CheckTx failure means DeliverTx never ran.
        let outcome = match r.deliver_tx {
            Some(deliver) if r.check_tx.code == 0 => deliver,
            _ => r.check_tx,
        };
        ResultTx {
            hash: r.hash,
            code: outcome.code,
            codespace: outcome.codespace,
            log: outcome.log,
            height: r.height,
            gas_wanted: outcome.gas_wanted,
            gas_used: outcome.gas_used,
        }
    }
}
