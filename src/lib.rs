//! Database load balancing library.
//!
//! Routes writes and freshness-sensitive reads to the primary, spreads other
//! reads across replicas, routes around unhealthy replicas, and exposes the
//! replication positions needed for read-your-writes.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!   read(scope) ──┼─▶ host(scope) ─▶ HostList ─▶ replica Host ───┼──▶ Replica
//!                 │        │                        │           │
//!                 │        ▼                        ▼           │
//!                 │  SelectionCache          ErrorClassifier    │
//!                 │                                 │           │
//! read_write ─────┼─▶ retry_with_backoff ─▶ primary Host ───────┼──▶ Primary
//!                 └──────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod error;
pub mod load_balancer;

// Cross-cutting concerns
pub mod health;
pub mod observability;
pub mod resilience;

pub use config::LoadBalancingConfig;
pub use error::{Error, Result};
pub use health::{ReplicaMonitor, WriteLocation};
pub use load_balancer::{Connection, ConnectionFactory, DbRole, LoadBalancer, Scope};
pub use resilience::classifier::ErrorClassifier;
