//! Host abstraction.
//!
//! # Responsibilities
//! - Represent a single database endpoint (the primary or a replica)
//! - Own one lazily opened connection
//! - Track health state (online/offline)
//! - Track whether statement caching is enabled and how many scopes use it
//! - Answer "has this host replayed up to a write location?"

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::health::replication::{self, WriteLocation};
use crate::load_balancer::connection::{same_connection, Connection, ConnectionFactory};

/// Replication lag a replica may have and still receive reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplicationLimits {
    pub max_lag_time: Duration,
    pub max_lag_bytes: u64,
}

/// A single database endpoint.
pub struct Host {
    address: String,
    factory: Arc<dyn ConnectionFactory>,
    /// Cached connection, owned by this host only.
    connection: Mutex<Option<Arc<dyn Connection>>>,
    /// Serializes connection opens.
    connecting: tokio::sync::Mutex<()>,
    online: AtomicBool,
    query_cache: AtomicBool,
    /// Scopes currently bound to this host.
    bindings: Mutex<usize>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("address", &self.address)
            .field("online", &self.is_online())
            .field("query_cache", &self.query_cache_enabled())
            .field("bound_scopes", &self.bound_scopes())
            .field("connected", &self.current_connection().is_some())
            .finish()
    }
}

impl Host {
    /// Create a new host. No connection is opened until first use.
    pub fn new(address: impl Into<String>, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            address: address.into(),
            factory,
            connection: Mutex::new(None),
            connecting: tokio::sync::Mutex::new(()),
            online: AtomicBool::new(true),
            query_cache: AtomicBool::new(false),
            bindings: Mutex::new(0),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Return the host's connection, opening it if needed.
    ///
    /// Fails with [`Error::HostOffline`] when the host is offline.
    pub async fn connection(&self) -> Result<Arc<dyn Connection>> {
        if !self.is_online() {
            return Err(Error::HostOffline {
                address: self.address.clone(),
            });
        }
        self.acquire().await
    }

    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        if let Some(conn) = self.current_connection() {
            return Ok(conn);
        }

        let _opening = self.connecting.lock().await;
        if let Some(conn) = self.current_connection() {
            return Ok(conn);
        }

        tracing::debug!(address = %self.address, "Opening database connection");
        let conn = self.factory.connect(&self.address).await?;
        if self.query_cache_enabled() {
            conn.enable_query_cache();
        }
        *self.slot() = Some(conn.clone());
        Ok(conn)
    }

    /// The open connection, if any. Never opens one.
    pub fn current_connection(&self) -> Option<Arc<dyn Connection>> {
        self.slot().clone()
    }

    /// True if `conn` is the connection this host handed out.
    pub fn owns_connection(&self, conn: &Arc<dyn Connection>) -> bool {
        self.slot().as_ref().is_some_and(|own| same_connection(own, conn))
    }

    /// Drop the cached connection; the next use opens a fresh one.
    pub fn release_connection(&self) {
        if self.slot().take().is_some() {
            tracing::debug!(address = %self.address, "Released database connection");
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<dyn Connection>>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Health Logic ---

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Mark the host offline. Returns true if this changed the state.
    pub fn offline(&self) -> bool {
        let was_online = self.online.swap(false, Ordering::AcqRel);
        if was_online {
            tracing::warn!(address = %self.address, "Marking host as offline");
        }
        was_online
    }

    /// Mark the host online. Returns true if this changed the state.
    pub fn online(&self) -> bool {
        let was_online = self.online.swap(true, Ordering::AcqRel);
        if !was_online {
            tracing::info!(address = %self.address, "Host is online again");
        }
        !was_online
    }

    // --- Query cache ---

    pub fn query_cache_enabled(&self) -> bool {
        self.query_cache.load(Ordering::Acquire)
    }

    pub fn enable_query_cache(&self) {
        self.query_cache.store(true, Ordering::Release);
        if let Some(conn) = self.current_connection() {
            conn.enable_query_cache();
        }
    }

    pub fn disable_query_cache(&self) {
        self.query_cache.store(false, Ordering::Release);
        if let Some(conn) = self.current_connection() {
            conn.disable_query_cache();
        }
    }

    // --- Scope bindings ---

    pub fn bound_scopes(&self) -> usize {
        *self.binding_count()
    }

    /// Record a new scope binding. The first one turns the query cache on.
    pub fn bind(&self) {
        let mut bound = self.binding_count();
        *bound += 1;
        if *bound == 1 {
            self.enable_query_cache();
        }
    }

    /// Drop one scope binding. The last one turns the query cache off, so
    /// the next unit of work starts with an empty cache.
    pub fn unbind(&self) {
        let mut bound = self.binding_count();
        match *bound {
            0 => {}
            1 => {
                *bound = 0;
                self.disable_query_cache();
            }
            _ => *bound -= 1,
        }
    }

    fn binding_count(&self) -> MutexGuard<'_, usize> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Replication ---

    /// Whether this host has replayed up to `location`.
    ///
    /// Anything that prevents an answer (offline host, failed query,
    /// unexpected result) counts as not caught up.
    pub async fn caught_up(&self, location: WriteLocation) -> bool {
        let result = match self.connection().await {
            Ok(conn) => conn.select_value(&replication::caught_up_sql(location)).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(Some(value)) => replication::parse_bool(&value).unwrap_or(false),
            Ok(None) => false,
            Err(e) => {
                tracing::debug!(address = %self.address, location = %location, error = %e, "Could not check replication position");
                false
            }
        }
    }

    /// Seconds since the host last replayed a transaction.
    pub async fn replication_lag_time(&self) -> Result<Option<Duration>> {
        let conn = self.acquire().await?;
        let value = conn.select_value(replication::REPLICATION_LAG_TIME_SQL).await?;
        Ok(value
            .as_deref()
            .and_then(replication::parse_float)
            .map(|secs| Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)))
    }

    /// Bytes the host's replay position trails `location` by.
    pub async fn replication_lag_size(&self, location: WriteLocation) -> Result<Option<u64>> {
        let conn = self.acquire().await?;
        let value = conn
            .select_value(&replication::replication_lag_size_sql(location))
            .await?;
        Ok(value
            .as_deref()
            .and_then(replication::parse_float)
            .map(|bytes| bytes.max(0.0) as u64))
    }

    /// Re-evaluate whether this replica should receive reads.
    ///
    /// Probes even while offline so that a recovered replica comes back. A
    /// replica is up to date when either its lag time or its lag size is
    /// within limits; a lag that cannot be measured counts as too much.
    pub async fn refresh_status(
        &self,
        limits: &ReplicationLimits,
        primary_location: Option<WriteLocation>,
    ) -> bool {
        let lag_time_ok = match self.replication_lag_time().await {
            Ok(Some(lag)) => lag <= limits.max_lag_time,
            Ok(None) => false,
            Err(e) => {
                tracing::debug!(address = %self.address, error = %e, "Could not read replication lag time");
                false
            }
        };

        let up_to_date = lag_time_ok || match primary_location {
            Some(location) => match self.replication_lag_size(location).await {
                Ok(Some(lag)) => lag <= limits.max_lag_bytes,
                Ok(None) => false,
                Err(e) => {
                    tracing::debug!(address = %self.address, error = %e, "Could not read replication lag size");
                    false
                }
            },
            None => false,
        };

        if up_to_date {
            self.online();
        } else {
            self.offline();
            self.release_connection();
        }
        up_to_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Refused;

    #[async_trait]
    impl ConnectionFactory for Refused {
        async fn connect(&self, address: &str) -> Result<Arc<dyn Connection>> {
            Err(Error::connection(address, "connection refused"))
        }
    }

    fn host() -> Host {
        Host::new("replica-1:5432", Arc::new(Refused))
    }

    #[test]
    fn test_health_transitions() {
        let h = host();
        assert!(h.is_online());

        assert!(h.offline());
        assert!(!h.offline());
        assert!(!h.is_online());

        assert!(h.online());
        assert!(!h.online());
        assert!(h.is_online());
    }

    #[tokio::test]
    async fn test_offline_host_refuses_connections() {
        let h = host();
        h.offline();

        let Err(err) = h.connection().await else {
            panic!("offline host handed out a connection");
        };
        assert!(matches!(err, Error::HostOffline { .. }));
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces() {
        let Err(err) = host().connection().await else {
            panic!("refused connect produced a connection");
        };
        assert!(matches!(err, Error::Connection { .. }));
    }

    #[tokio::test]
    async fn test_caught_up_fails_closed() {
        let loc: WriteLocation = "0/1".parse().unwrap();
        assert!(!host().caught_up(loc).await);
    }

    #[test]
    fn test_query_cache_follows_last_binding() {
        let h = host();
        h.bind();
        h.bind();
        assert!(h.query_cache_enabled());
        assert_eq!(h.bound_scopes(), 2);

        h.unbind();
        assert!(h.query_cache_enabled());

        h.unbind();
        assert!(!h.query_cache_enabled());
        assert_eq!(h.bound_scopes(), 0);

        h.unbind();
        assert_eq!(h.bound_scopes(), 0);
    }

    #[test]
    fn test_query_cache_flag_without_connection() {
        let h = host();
        assert!(!h.query_cache_enabled());
        h.enable_query_cache();
        assert!(h.query_cache_enabled());
        h.disable_query_cache();
        assert!(!h.query_cache_enabled());
    }
}
