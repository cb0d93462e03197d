//! Transaction options and the per-build context.
//!
//! # Responsibilities
//! - Carry caller options (`BaseTx`) with client-wide defaults applied
//! - Hold the account number/sequence fetched for this build
//! - Produce the bytes handed to the signer

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::blockchain::msg::Msg;
use crate::blockchain::types::{BroadcastMode, ClientConfig, Coin, TxResult};
use crate::config::schema::coins_valid;

/// Caller-supplied transaction options.
///
/// Unset values fall back to the client configuration: empty or invalid
/// `fee`, zero `gas`, zero `gas_adjustment`, and `mode: None`.
#[derive(Clone, Default)]
pub struct BaseTx {
    /// Key name of the signer.
    pub from: String,
    pub password: String,
    pub fee: Vec<Coin>,
    pub gas: u64,
    pub gas_adjustment: f64,
    pub memo: String,
    pub mode: Option<BroadcastMode>,
    /// Estimate gas by simulation before signing.
    pub simulate_and_execute: bool,
}

impl BaseTx {
    pub fn new(from: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn with_fee(mut self, fee: Vec<Coin>) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_gas_adjustment(mut self, gas_adjustment: f64) -> Self {
        self.gas_adjustment = gas_adjustment;
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn with_mode(mut self, mode: BroadcastMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_simulate_and_execute(mut self, simulate: bool) -> Self {
        self.simulate_and_execute = simulate;
        self
    }
}

impl fmt::Debug for BaseTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseTx")
            .field("from", &self.from)
            .field("fee", &self.fee)
            .field("gas", &self.gas)
            .field("gas_adjustment", &self.gas_adjustment)
            .field("memo", &self.memo)
            .field("mode", &self.mode)
            .field("simulate_and_execute", &self.simulate_and_execute)
            .finish()
    }
}

/// Everything needed to produce sign bytes for one transaction.
#[derive(Clone, Default)]
pub struct TxFactory {
    chain_id: String,
    account_number: u64,
    sequence: u64,
    fee: Vec<Coin>,
    gas: u64,
    gas_adjustment: f64,
    mode: BroadcastMode,
    memo: String,
    password: String,
    simulate_and_execute: bool,
}

impl TxFactory {
    /// Factory seeded with the client-wide defaults.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            chain_id: config.chain_id.clone(),
            fee: config.fee.clone(),
            gas: config.gas,
            gas_adjustment: config.gas_adjustment,
            mode: config.mode,
            ..Default::default()
        }
    }

    /// Overlay caller options on the defaults.
    pub fn apply(mut self, base_tx: &BaseTx) -> Self {
        if !base_tx.fee.is_empty() && coins_valid(&base_tx.fee) {
            self.fee = base_tx.fee.clone();
        }
        if let Some(mode) = base_tx.mode {
            self.mode = mode;
        }
        if base_tx.gas > 0 {
            self.gas = base_tx.gas;
        }
        if base_tx.gas_adjustment > 0.0 {
            self.gas_adjustment = base_tx.gas_adjustment;
        }
        if !base_tx.memo.is_empty() {
            self.memo = base_tx.memo.clone();
        }
        self.password = base_tx.password.clone();
        self.simulate_and_execute = base_tx.simulate_and_execute;
        self
    }

    pub fn with_account_number(mut self, account_number: u64) -> Self {
        self.account_number = account_number;
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = gas;
        self
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn fee(&self) -> &[Coin] {
        &self.fee
    }

    pub fn gas(&self) -> u64 {
        self.gas
    }

    pub fn mode(&self) -> BroadcastMode {
        self.mode
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn simulate_and_execute(&self) -> bool {
        self.simulate_and_execute
    }

    /// Gas limit for a simulated usage of `gas_used`.
    pub fn adjusted_gas(&self, gas_used: u64) -> u64 {
        let adjustment = if self.gas_adjustment > 0.0 {
            self.gas_adjustment
        } else {
            1.0
        };
        (gas_used as f64 * adjustment).ceil() as u64
    }

    /// Deterministic bytes the signer commits to.
    pub fn sign_bytes(&self, msgs: &[Box<dyn Msg>]) -> TxResult<Vec<u8>> {
        let doc = SignDoc {
            chain_id: self.chain_id.clone(),
            account_number: self.account_number,
            sequence: self.sequence,
            fee: StdFee {
                amount: self.fee.clone(),
                gas: self.gas,
            },
            memo: self.memo.clone(),
            msgs: msgs
                .iter()
                .map(|m| AnyMsg {
                    type_url: m.type_url().to_string(),
                    value: m.value(),
                })
                .collect(),
        };
        Ok(serde_json::to_vec(&doc)?)
    }
}

impl fmt::Debug for TxFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxFactory")
            .field("chain_id", &self.chain_id)
            .field("account_number", &self.account_number)
            .field("sequence", &self.sequence)
            .field("fee", &self.fee)
            .field("gas", &self.gas)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Sign document. 64-bit integers are encoded as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignDoc {
    pub chain_id: String,
    #[serde(with = "u64_string")]
    pub account_number: u64,
    #[serde(with = "u64_string")]
    pub sequence: u64,
    pub fee: StdFee,
    pub memo: String,
    pub msgs: Vec<AnyMsg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Vec<Coin>,
    #[serde(with = "u64_string")]
    pub gas: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyMsg {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub value: serde_json::Value,
}

mod u64_string {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        crate::blockchain::types::de_u64(deserializer)
    }
}
