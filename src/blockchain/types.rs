//! Chain-facing types and error definitions.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

// Re-export ClientConfig from config module to avoid duplication
pub use crate::config::schema::{BroadcastMode, ClientConfig, Coin};

/// Cosmos-SDK root codespace.
pub const ROOT_CODESPACE: &str = "sdk";

/// Node codes reporting a sequence mismatch (legacy and current SDKs).
const CODE_INVALID_SEQUENCE: u32 = 3;
const CODE_WRONG_SEQUENCE: u32 = 32;
/// Node code reporting an oversized transaction.
const CODE_TX_TOO_LARGE: u32 = 21;

/// Stable, machine-readable error codes.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    AddressResolution = 101,
    Signing = 102,
    Validation = 103,
    Broadcast = 104,
    StaleSequence = 105,
    TxTooLarge = 106,
    MessageTooLarge = 107,
    EmptyBatch = 108,
    ConnectionInit = 109,
    Query = 110,
    Rpc = 111,
    Timeout = 112,
    Codec = 113,
    InternalFault = 114,
}

impl ErrorCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::AddressResolution => "ADDRESS_RESOLUTION",
            ErrorCode::Signing => "SIGNING",
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::Broadcast => "BROADCAST",
            ErrorCode::StaleSequence => "STALE_SEQUENCE",
            ErrorCode::TxTooLarge => "TX_TOO_LARGE",
            ErrorCode::MessageTooLarge => "MESSAGE_TOO_LARGE",
            ErrorCode::EmptyBatch => "EMPTY_BATCH",
            ErrorCode::ConnectionInit => "CONNECTION_INIT",
            ErrorCode::Query => "QUERY",
            ErrorCode::Rpc => "RPC",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Codec => "CODEC",
            ErrorCode::InternalFault => "INTERNAL_FAULT",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.as_u32())
    }
}

/// Errors that can occur while building, signing, or broadcasting transactions.
#[derive(Debug, Error)]
pub enum TxError {
    /// The signer name/password could not be resolved to an address.
    #[error("Address resolution failed: {0}")]
    AddressResolution(String),

    /// The key manager failed to sign.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// A message failed its self-check and was never sent.
    #[error("Message {index} failed validation: {reason}")]
    Validation { index: usize, reason: String },

    /// The node rejected the transaction.
    #[error("Broadcast rejected (codespace={codespace}, code={code}): {log}")]
    Broadcast {
        codespace: String,
        code: u32,
        log: String,
    },

    /// The node rejected the transaction because the signed sequence is stale.
    #[error("Wrong sequence (code={code}): {log}")]
    StaleSequence { code: u32, log: String },

    /// A signed batch exceeds the transaction size limit.
    #[error("Transaction of {size} bytes exceeds size limit {}", fmt_limit(.limit))]
    TxTooLarge { size: usize, limit: Option<u64> },

    /// A single message alone exceeds the transaction size limit.
    #[error("Single message transaction of {size} bytes exceeds size limit {}", fmt_limit(.limit))]
    MessageTooLarge { size: usize, limit: Option<u64> },

    /// A batch send was requested with no messages.
    #[error("must have at least one message in list")]
    EmptyBatch,

    /// The shared channel could not be established.
    #[error("Connection initialization failed: {0}")]
    ConnectionInit(String),

    /// The node answered a query with a non-OK status.
    #[error("Query failed: {0}")]
    Query(String),

    /// Transport or protocol failure talking to the node.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Payload or response could not be (de)serialized.
    #[error("Codec error: {0}")]
    Codec(String),

    /// A retryable failure persisted through every allowed attempt.
    #[error("Giving up on {address} after {attempts} attempts: {source}")]
    RetriesExhausted {
        address: String,
        attempts: u32,
        #[source]
        source: Box<TxError>,
    },

    /// Unexpected fault caught at the batch boundary.
    #[error("Internal fault: {0}")]
    InternalFault(String),
}

fn fmt_limit(limit: &Option<u64>) -> String {
    match limit {
        Some(limit) => limit.to_string(),
        None => "reported by node".to_string(),
    }
}

impl TxError {
    /// Stable code for this error. Exhausted retries report the code of the last failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            TxError::AddressResolution(_) => ErrorCode::AddressResolution,
            TxError::Signing(_) => ErrorCode::Signing,
            TxError::Validation { .. } => ErrorCode::Validation,
            TxError::Broadcast { .. } => ErrorCode::Broadcast,
            TxError::StaleSequence { .. } => ErrorCode::StaleSequence,
            TxError::TxTooLarge { .. } => ErrorCode::TxTooLarge,
            TxError::MessageTooLarge { .. } => ErrorCode::MessageTooLarge,
            TxError::EmptyBatch => ErrorCode::EmptyBatch,
            TxError::ConnectionInit(_) => ErrorCode::ConnectionInit,
            TxError::Query(_) => ErrorCode::Query,
            TxError::Rpc(_) => ErrorCode::Rpc,
            TxError::Timeout(_) => ErrorCode::Timeout,
            TxError::Codec(_) => ErrorCode::Codec,
            TxError::RetriesExhausted { source, .. } => source.code(),
            TxError::InternalFault(_) => ErrorCode::InternalFault,
        }
    }

    /// The innermost error, looking through `RetriesExhausted`.
    pub fn root(&self) -> &TxError {
        match self {
            TxError::RetriesExhausted { source, .. } => source.root(),
            other => other,
        }
    }

    /// Build the error for a transaction the node refused.
    pub fn from_rejection(result: &ResultTx, tx_size: usize) -> Self {
        let in_root = result.codespace.is_empty() || result.codespace == ROOT_CODESPACE;
        if (in_root && matches!(result.code, CODE_INVALID_SEQUENCE | CODE_WRONG_SEQUENCE))
            || result.log.contains("account sequence mismatch")
        {
            return TxError::StaleSequence {
                code: result.code,
                log: result.log.clone(),
            };
        }
        if in_root && result.code == CODE_TX_TOO_LARGE {
            return TxError::TxTooLarge {
                size: tx_size,
                limit: None,
            };
        }
        TxError::Broadcast {
            codespace: result.codespace.clone(),
            code: result.code,
            log: result.log.clone(),
        }
    }

    /// An oversize failure of a one-message transaction cannot be fixed by
    /// splitting further.
    pub fn for_single_message(self) -> Self {
        match self {
            TxError::TxTooLarge { size, limit } => TxError::MessageTooLarge { size, limit },
            other => other,
        }
    }
}

impl From<serde_json::Error> for TxError {
    fn from(e: serde_json::Error) -> Self {
        TxError::Codec(e.to_string())
    }
}

/// Result type for transaction operations.
pub type TxResult<T> = Result<T, TxError>;

/// Batch failure carrying the groups that were already broadcast.
#[derive(Debug, Error)]
#[error("Batch aborted after {} broadcast group(s): {source}", .sent.len())]
pub struct BatchError {
    /// Results of every group broadcast before the abort, in order.
    pub sent: Vec<ResultTx>,
    #[source]
    pub source: TxError,
}

impl BatchError {
    pub fn new(sent: Vec<ResultTx>, source: TxError) -> Self {
        Self { sent, source }
    }

    pub fn code(&self) -> ErrorCode {
        self.source.code()
    }
}

/// Account metadata needed to sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    #[serde(deserialize_with = "de_u64")]
    pub account_number: u64,
    #[serde(deserialize_with = "de_u64")]
    pub sequence: u64,
}

/// Outcome of a broadcast as reported by the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTx {
    pub hash: String,
    pub code: u32,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub gas_wanted: i64,
    #[serde(default)]
    pub gas_used: i64,
}

impl ResultTx {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Options for an ABCI query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbciQueryOptions {
    /// Block height, 0 = latest.
    pub height: i64,
    pub prove: bool,
}

/// Raw ABCI query response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbciQueryResponse {
    pub code: u32,
    pub log: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub height: i64,
    pub codespace: String,
    /// Proof operations as returned by the node, when requested.
    pub proof_ops: Option<serde_json::Value>,
}

impl AbciQueryResponse {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Accepts both `"42"` and `42`; nodes encode 64-bit integers as strings.
pub(crate) fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(u64),
        Str(String),
    }
    match Repr::deserialize(deserializer)? {
        Repr::Num(n) => Ok(n),
        Repr::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

pub(crate) fn de_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(i64),
        Str(String),
    }
    match Option::<Repr>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Repr::Num(n)) => Ok(n),
        Some(Repr::Str(s)) if s.is_empty() => Ok(0),
        Some(Repr::Str(s)) => s.parse().map_err(serde::de::Error::custom),
    }
}
