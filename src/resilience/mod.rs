//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Failed build/broadcast attempt:
//!     → retries.rs (classify, pick side effect, enforce attempt ceiling)
//!     → backoff.rs (delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Every RPC call has a deadline (enforced by the callers)
//! - Retries only for failures the node will accept after re-synchronizing
//! - Jittered backoff keeps concurrent signers from retrying in lockstep

pub mod backoff;
pub mod retries;

pub use retries::{RetryAction, RetryDecision, RetryPolicy};
