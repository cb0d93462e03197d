//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, shard and batch sizes > 0)
//! - Check the default fee is usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::{coins_valid, ClientConfig};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if url::Url::parse(&config.node_uri).is_err() {
        errors.push(ValidationError::new("node_uri", format!("invalid URL '{}'", config.node_uri)));
    }
    if url::Url::parse(&config.grpc_addr).is_err() {
        errors.push(ValidationError::new("grpc_addr", format!("invalid URL '{}'", config.grpc_addr)));
    }
    if config.chain_id.trim().is_empty() {
        errors.push(ValidationError::new("chain_id", "must not be empty"));
    }
    if config.timeout_secs == 0 {
        errors.push(ValidationError::new("timeout_secs", "must be greater than 0"));
    }
    if config.lock_shards == 0 {
        errors.push(ValidationError::new("lock_shards", "must be greater than 0"));
    }
    if config.max_batch == 0 {
        errors.push(ValidationError::new("max_batch", "must be greater than 0"));
    }
    if config.retry.max_attempts == 0 {
        errors.push(ValidationError::new("retry.max_attempts", "must be greater than 0"));
    }
    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        errors.push(ValidationError::new(
            "retry.base_delay_ms",
            "must not exceed retry.max_delay_ms",
        ));
    }
    if !config.gas_adjustment.is_finite() || config.gas_adjustment < 0.0 {
        errors.push(ValidationError::new("gas_adjustment", "must be a non-negative number"));
    }
    if !coins_valid(&config.fee) {
        errors.push(ValidationError::new("fee", "contains an invalid or duplicate coin"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
