//! Replica health subsystem.
//!
//! # Data Flow
//! ```text
//! Passive (load_balancer::balancer):
//!     Connection error observed on a replica
//!     → host marked offline immediately
//!
//! Active (monitor.rs):
//!     Periodic timer
//!     → primary write location (replication.rs)
//!     → lag time / lag size of each replica
//!     → host marked online or offline
//! ```
//!
//! # Design Decisions
//! - Only the monitor brings an offline replica back online
//! - A lag that cannot be measured counts as too much lag
//! - Health state is per-host, shared by every scope

pub mod monitor;
pub mod replication;

pub use monitor::ReplicaMonitor;
pub use replication::WriteLocation;
