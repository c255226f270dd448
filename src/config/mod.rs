//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → LoadBalancingConfig (validated, immutable)
//!     → handed to LoadBalancer::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; host membership never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::BackoffConfig;
pub use schema::ClassifierConfig;
pub use schema::LoadBalancingConfig;
pub use schema::ObservabilityConfig;
