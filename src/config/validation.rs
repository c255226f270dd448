//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, delays > 0, lag time finite)
//! - Reject empty addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LoadBalancingConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use crate::config::schema::LoadBalancingConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &LoadBalancingConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.primary.trim().is_empty() {
        errors.push(ValidationError::new("primary", "address must not be empty"));
    }

    for (i, host) in config.hosts.iter().enumerate() {
        if host.trim().is_empty() {
            errors.push(ValidationError::new(format!("hosts[{}]", i), "address must not be empty"));
        }
    }

    if config.replica_check_interval_secs == 0 {
        errors.push(ValidationError::new("replica_check_interval_secs", "must be greater than 0"));
    }

    let lag = config.max_replication_lag_time_secs;
    if !lag.is_finite() || lag < 0.0 {
        errors.push(ValidationError::new(
            "max_replication_lag_time_secs",
            "must be a finite, non-negative number",
        ));
    }

    for (i, delay) in config.backoff.delays_ms.iter().enumerate() {
        if *delay == 0 {
            errors.push(ValidationError::new(format!("backoff.delays_ms[{}]", i), "must be greater than 0"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
