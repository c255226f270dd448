//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the load
//! balancer. All types derive Serde traits for deserialization from config files.

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Root configuration for database load balancing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancingConfig {
    /// Address of the primary (writable) database.
    pub primary: String,

    /// Replica addresses. Order is the round-robin rotation order.
    pub hosts: Vec<String>,

    /// Maximum replication lag, in bytes, for a replica to stay online.
    pub max_replication_difference: u64,

    /// Maximum replication lag, in seconds, for a replica to stay online.
    pub max_replication_lag_time_secs: f64,

    /// Interval between replica status checks in seconds.
    pub replica_check_interval_secs: u64,

    /// Serialization-failure retries granted to every replica before a read
    /// falls back to the primary.
    pub serialization_retries_per_host: usize,

    /// Backoff between retries against the primary.
    pub backoff: BackoffConfig,

    /// Error classification settings.
    pub classifier: ClassifierConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for LoadBalancingConfig {
    fn default() -> Self {
        Self {
            primary: "localhost:5432".to_string(),
            hosts: Vec::new(),
            max_replication_difference: 8 * 1024 * 1024,
            max_replication_lag_time_secs: 60.0,
            replica_check_interval_secs: 60,
            serialization_retries_per_host: 3,
            backoff: BackoffConfig::default(),
            classifier: ClassifierConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl LoadBalancingConfig {
    pub fn replica_check_interval(&self) -> Duration {
        Duration::from_secs(self.replica_check_interval_secs)
    }

    pub fn max_replication_lag_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_replication_lag_time_secs.max(0.0)).unwrap_or(Duration::MAX)
    }
}

/// Backoff configuration for primary retries.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before each retry, in milliseconds. One retry per entry.
    pub delays_ms: Vec<u64>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            delays_ms: vec![2_000, 4_000, 16_000],
        }
    }
}

/// Which errors count as connection errors or serialization failures.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// SQLSTATE codes treated as connection errors.
    pub connection_sqlstates: Vec<String>,

    /// Message fragments that identify a connection error in disguise.
    pub connection_messages: Vec<String>,

    /// SQLSTATE codes treated as serialization failures.
    pub serialization_sqlstates: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            connection_sqlstates: [
                "08000", "08001", "08003", "08004", "08006", "08007", "08P01",
                // admin_shutdown
                "57P01",
                // A primary demoted during failover rejects writes with this.
                "25006",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            connection_messages: vec!["invalid encoding name: unicode".to_string()],
            serialization_sqlstates: vec!["40001".to_string()],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
