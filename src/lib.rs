//! Transaction lifecycle client for Cosmos-SDK style ledgers.

pub mod accounts;
pub mod blockchain;
pub mod config;
pub mod net;
pub mod observability;
pub mod resilience;

pub use blockchain::{BaseClient, BaseTx, BatchError, ClientBuilder, Msg, ResultTx, TxError};
pub use config::schema::ClientConfig;
