//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! read(scope, f)
//!     → balancer.rs host(scope): scope already bound? reuse its replica
//!         → otherwise host_list.rs (rotate to the next online replica)
//!         → scope.rs (bind replica to the scope)
//!     → host.rs (lazily open the replica's connection, enable query cache)
//!     → run f; on failure classify the error:
//!         - serialization failure: release, next replica (bounded)
//!         - connection error: replica offline, fall back to primary
//!         - anything else: return it
//!
//! read_write(scope, f)
//!     → primary host connection
//!     → retry_with_backoff on connection errors
//! ```
//!
//! # Design Decisions
//! - Host health is per-host and process-wide; bindings are per-scope
//! - A scope never switches replicas until its binding is released
//! - The round-robin cursor is the only state shared between scopes
//! - Connections are opened lazily and owned by exactly one host

pub mod balancer;
pub mod connection;
pub mod host;
pub mod host_list;
pub mod scope;

pub use balancer::LoadBalancer;
pub use connection::{Connection, ConnectionFactory, DbRole};
pub use host::{Host, ReplicationLimits};
pub use host_list::HostList;
pub use scope::{Scope, ScopeId, SelectionCache};
