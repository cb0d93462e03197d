//! Transaction building and signing.
//!
//! # Responsibilities
//! - Resolve the signer's address through the key manager
//! - Fetch account number and sequence (cache first)
//! - Apply caller options over client defaults
//! - Estimate gas by simulation when asked
//! - Sign and hand back the encoded transaction

use serde::Deserialize;
use std::sync::Arc;

use crate::accounts::AccountQuery;
use crate::blockchain::factory::{BaseTx, TxFactory};
use crate::blockchain::msg::Msg;
use crate::blockchain::query::QueryClient;
use crate::blockchain::types::{de_u64, BroadcastMode, ClientConfig, TxResult};
use crate::blockchain::wallet::KeyManager;

/// Query path that dry-runs unsigned sign bytes and reports gas usage.
pub const SIMULATE_PATH: &str = "/app/simulate";

/// A signed transaction ready to broadcast.
#[derive(Debug, Clone)]
pub struct BuiltTx {
    pub bytes: Vec<u8>,
    pub mode: BroadcastMode,
    pub sequence: u64,
}

#[derive(Debug, Deserialize)]
struct SimulateResponse {
    gas_info: GasInfo,
}

#[derive(Debug, Deserialize)]
struct GasInfo {
    #[serde(deserialize_with = "de_u64")]
    gas_used: u64,
}

/// Builds and signs transactions for one client.
#[derive(Clone)]
pub struct TxBuilder {
    config: Arc<ClientConfig>,
    queries: QueryClient,
    keys: Arc<dyn KeyManager>,
    accounts: AccountQuery,
}

impl TxBuilder {
    pub fn new(
        config: Arc<ClientConfig>,
        queries: QueryClient,
        keys: Arc<dyn KeyManager>,
        accounts: AccountQuery,
    ) -> Self {
        Self {
            config,
            queries,
            keys,
            accounts,
        }
    }

    /// Address of the signer named in `base_tx`.
    pub async fn resolve_address(&self, base_tx: &BaseTx) -> TxResult<String> {
        self.keys
            .resolve_address(&base_tx.from, &base_tx.password)
            .await
    }

    /// Build and sign `msgs` for the signer at `address`.
    pub async fn build(
        &self,
        address: &str,
        msgs: &[Box<dyn Msg>],
        base_tx: &BaseTx,
    ) -> TxResult<BuiltTx> {
        let account = self.accounts.query_and_refresh(address).await?;
        let mut factory = TxFactory::from_config(&self.config)
            .apply(base_tx)
            .with_account_number(account.account_number)
            .with_sequence(account.sequence);

        if factory.simulate_and_execute() {
            let gas_used = self.simulate(&factory, msgs).await?;
            let gas = factory.adjusted_gas(gas_used);
            tracing::debug!(gas_used = gas_used, gas = gas, "Gas estimated by simulation");
            factory = factory.with_gas(gas);
        }

        let sign_bytes = factory.sign_bytes(msgs)?;
        let bytes = self
            .keys
            .sign(&base_tx.from, &sign_bytes, factory.password())
            .await?;

        tracing::debug!(
            address = address,
            sequence = factory.sequence(),
            msgs = msgs.len(),
            size = bytes.len(),
            "Transaction signed"
        );
        Ok(BuiltTx {
            bytes,
            mode: factory.mode(),
            sequence: factory.sequence(),
        })
    }

    /// Drop the cached account state of `address`.
    pub fn invalidate(&self, address: &str) {
        self.accounts.remove(address);
    }

    async fn simulate(&self, factory: &TxFactory, msgs: &[Box<dyn Msg>]) -> TxResult<u64> {
        let sign_bytes = factory.sign_bytes(msgs)?;
        let raw = self.queries.query_bytes(SIMULATE_PATH, &sign_bytes).await?;
        let response: SimulateResponse = serde_json::from_slice(&raw)?;
        Ok(response.gas_info.gas_used)
    }
}
