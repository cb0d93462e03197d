//! Read-only queries against the node.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::blockchain::rpc::NodeRpc;
use crate::blockchain::types::{AbciQueryOptions, AbciQueryResponse, TxError, TxResult};

/// ABCI query helper shared by the client and the account query.
#[derive(Clone)]
pub struct QueryClient {
    rpc: Arc<dyn NodeRpc>,
}

impl QueryClient {
    pub fn new(rpc: Arc<dyn NodeRpc>) -> Self {
        Self { rpc }
    }

    pub fn rpc(&self) -> &Arc<dyn NodeRpc> {
        &self.rpc
    }

    /// Query `path` at the latest height with a JSON-encoded payload.
    pub async fn query(&self, path: &str, payload: Option<&Value>) -> TxResult<Vec<u8>> {
        let data = match payload {
            Some(payload) => serde_json::to_vec(payload)?,
            None => Vec::new(),
        };
        self.query_bytes(path, &data).await
    }

    /// Query `path` at the latest height with raw request bytes.
    pub async fn query_bytes(&self, path: &str, data: &[u8]) -> TxResult<Vec<u8>> {
        let resp = self
            .rpc
            .abci_query(path, data, AbciQueryOptions::default())
            .await?;
        if !resp.is_ok() {
            tracing::debug!(path = path, code = resp.code, log = %resp.log, "Query rejected");
            return Err(TxError::Query(resp.log));
        }
        Ok(resp.value)
    }

    /// Query `path` and decode the JSON value into `T`.
    pub async fn query_with_response<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: Option<&Value>,
    ) -> TxResult<T> {
        let bytes = self.query(path, payload).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| TxError::Codec(format!("decoding response of {}: {}", path, e)))
    }

    /// Raw key lookup in module store `store_name`; `height` 0 means latest.
    pub async fn query_store(
        &self,
        key: &[u8],
        store_name: &str,
        height: i64,
        prove: bool,
    ) -> TxResult<AbciQueryResponse> {
        let path = format!("/store/{}/key", store_name);
        let resp = self
            .rpc
            .abci_query(&path, key, AbciQueryOptions { height, prove })
            .await?;
        if !resp.is_ok() {
            return Err(TxError::Query(resp.log));
        }
        Ok(resp)
    }
}
