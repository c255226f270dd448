//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Block fails inside read / read_write:
//!     → classifier.rs (connection error? serialization failure? neither?)
//!     → connection error on a replica: host offline, fall back to primary
//!     → serialization failure on a replica: next replica, bounded attempts
//!     → connection error on the primary: backoff.rs (sleep, retry)
//!     → anything else: returned to the caller unchanged
//! ```
//!
//! # Design Decisions
//! - Unclassified errors are never retried
//! - Retries are bounded; the original error surfaces when they run out
//! - Backoff sleeps are cancellable and never hold a lock

pub mod backoff;
pub mod classifier;
