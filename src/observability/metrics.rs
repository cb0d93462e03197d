//! Metrics collection.
//!
//! # Metrics
//! - `txclient_broadcasts_total` (counter): broadcasts by outcome
//! - `txclient_retries_total` (counter): retries by reason
//! - `txclient_batch_size` (gauge): current batch size after a shrink
//! - `txclient_account_cache_total` (counter): account cache hits/misses
//! - `txclient_connection_init_total` (counter): channel initializations by outcome
//!
//! Recording is a no-op until the embedding application installs a recorder.

use metrics::{counter, gauge};

pub fn record_broadcast(outcome: &'static str) {
    counter!("txclient_broadcasts_total", "outcome" => outcome).increment(1);
}

pub fn record_retry(reason: &'static str) {
    counter!("txclient_retries_total", "reason" => reason).increment(1);
}

pub fn record_batch_size(size: usize) {
    gauge!("txclient_batch_size").set(size as f64);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("txclient_account_cache_total", "result" => result).increment(1);
}

pub fn record_connection_init(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("txclient_connection_init_total", "outcome" => outcome).increment(1);
}
