//! Retry policy for broadcast failures.
//!
//! # Responsibilities
//! - Classify a failed attempt as retryable or terminal
//! - Name the side effect that must run before the next attempt
//! - Enforce the attempt ceiling and backoff delay
//!
//! # Design Decisions
//! - Only stale-sequence (and, for batches, oversize) failures are retried
//! - The side effect is returned to the caller, never executed here, so the
//!   policy is a pure function testable in isolation

use std::time::Duration;

use crate::blockchain::types::TxError;
use crate::config::schema::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Work to do before retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Drop the signer's cached account state so the next build re-queries it.
    InvalidateAccount,
    /// Halve the batch size and resume with the unsent messages.
    ShrinkBatch,
}

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(RetryAction),
    Abort,
}

/// Attempt ceiling plus error classification.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    shrink_on_oversize: bool,
}

impl RetryPolicy {
    /// Policy for single-transaction sends: stale sequence only.
    pub fn single(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            shrink_on_oversize: false,
        }
    }

    /// Policy for batch sends: stale sequence and oversize batches.
    pub fn batch(config: &RetryConfig) -> Self {
        Self {
            shrink_on_oversize: true,
            ..Self::single(config)
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide after `attempt` (1-based) failed with `err`.
    pub fn decide(&self, attempt: u32, err: &TxError) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::Abort;
        }
        match err {
            TxError::StaleSequence { .. } => RetryDecision::Retry(RetryAction::InvalidateAccount),
            TxError::TxTooLarge { .. } if self.shrink_on_oversize => {
                RetryDecision::Retry(RetryAction::ShrinkBatch)
            }
            _ => RetryDecision::Abort,
        }
    }

    /// Whether `err` is one this policy would have retried given more attempts.
    pub fn is_retryable(&self, err: &TxError) -> bool {
        match err {
            TxError::StaleSequence { .. } => true,
            TxError::TxTooLarge { .. } => self.shrink_on_oversize,
            _ => false,
        }
    }

    /// Delay before the attempt following `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms)
    }

    /// Wrap the final error of a retry loop with its context.
    pub fn finish(&self, err: TxError, address: &str, attempts: u32) -> TxError {
        if attempts >= self.max_attempts && self.is_retryable(&err) {
            TxError::RetriesExhausted {
                address: address.to_string(),
                attempts,
                source: Box::new(err),
            }
        } else {
            err
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single(&RetryConfig::default())
    }
}
