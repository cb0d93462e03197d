//! Account state and per-account serialization.
//!
//! # Data Flow
//! ```text
//! client.rs (build for sender)
//!     → lock.rs (take the sender's shard for the whole build/broadcast window)
//!     → query.rs (account number + sequence)
//!         → cache.rs (hit: next sequence)
//!         → node query (miss: populate cache)
//! ```

pub mod cache;
pub mod lock;
pub mod query;

pub use cache::{Cache, TtlCache};
pub use lock::{ShardGuard, ShardedLock};
pub use query::AccountQuery;
