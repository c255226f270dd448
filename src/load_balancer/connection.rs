//! Connection abstraction.
//!
//! The driver, its pool, TLS and authentication live behind
//! [`ConnectionFactory`]. The load balancer only needs to run a scalar
//! query and toggle statement caching.

use std::fmt;
use std::sync::Arc;
use async_trait::async_trait;

use crate::error::Result;

/// A live database connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Run a query and return the first column of the first row, or `None`
    /// when the query returned no rows.
    async fn select_value(&self, sql: &str) -> Result<Option<String>>;

    fn enable_query_cache(&self);

    fn disable_query_cache(&self);
}

/// Opens connections to a host address.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Arc<dyn Connection>>;
}

/// Role of the database a connection points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbRole {
    Primary,
    Replica,
}

impl DbRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbRole::Primary => "primary",
            DbRole::Replica => "replica",
        }
    }
}

impl fmt::Display for DbRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity comparison, ignoring vtable pointers.
pub(crate) fn same_connection(a: &Arc<dyn Connection>, b: &Arc<dyn Connection>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
