//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!
//! External collaborators consume:
//!     → LoadBalancer::db_role_for_connection (primary/replica per connection)
//! ```
//!
//! # Design Decisions
//! - Structured fields (address, attempt, delay, error) on every event
//! - Metrics are recorded by the caller, not by this crate

pub mod logging;

pub use logging::init_logging;
