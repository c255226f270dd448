//! Error types for the load balancer.
//!
//! Errors raised by connections are classified by the
//! [`ErrorClassifier`](crate::resilience::classifier::ErrorClassifier), not by
//! their variant alone, so drivers are free to report failures as
//! [`Error::Database`] with a SQLSTATE and let the classifier decide.

use thiserror::Error;

/// Boxed error used as the `source` of wrapped failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for load balancer operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The transport to a host failed (refused, reset, closed).
    #[error("connection to {address} failed: {message}")]
    Connection {
        address: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A connection was requested from a host marked offline.
    #[error("host {address} is offline")]
    HostOffline { address: String },

    /// The database rejected a statement.
    #[error("database error: {message}")]
    Database {
        message: String,
        sqlstate: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    /// Neither the primary nor the fallback query reported a position.
    #[error("failed to determine the write location of the primary database")]
    WriteLocationUnavailable,

    /// A replication position that is not a valid log sequence number.
    #[error("invalid write location: {value:?}")]
    InvalidWriteLocation { value: String },

    /// The scope was cancelled while waiting to retry.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a connection error for the given host.
    pub fn connection(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            address: address.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error wrapping the driver's error.
    pub fn connection_with_source(
        address: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            address: address.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a database error, optionally tagged with a SQLSTATE code.
    pub fn database(message: impl Into<String>, sqlstate: Option<&str>) -> Self {
        Self::Database {
            message: message.into(),
            sqlstate: sqlstate.map(str::to_owned),
            source: None,
        }
    }

    /// The SQLSTATE reported by the database, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Database { sqlstate, .. } => sqlstate.as_deref(),
            _ => None,
        }
    }
}
