//! Transaction lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Caller (msgs + BaseTx)
//!     → client.rs (sender lock, retry loop, batch groups, panic boundary)
//!     → transaction.rs (address, account state, simulation, signing)
//!         → factory.rs (options over defaults, sign bytes)
//!         → wallet.rs (key manager)
//!     → rpc.rs (broadcast, ABCI query)
//!     → ResultTx or TxError
//! ```
//!
//! # Security Constraints
//! - Passwords and private keys are never logged
//! - All node calls have configurable timeouts

pub mod batch;
pub mod client;
pub mod factory;
pub mod msg;
pub mod query;
pub mod rpc;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{BaseClient, ClientBuilder, FaultHandler};
pub use factory::BaseTx;
pub use msg::{JsonMsg, Msg};
pub use rpc::{HttpNodeRpc, NodeRpc};
pub use types::{BatchError, ErrorCode, ResultTx, TxError, TxResult};
pub use wallet::{KeyManager, LocalKeyring};
