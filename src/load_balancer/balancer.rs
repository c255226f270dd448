//! Read/write routing across the primary and its replicas.
//!
//! # Responsibilities
//! - Bind one replica per scope for reads
//! - Send writes and freshness-sensitive reads to the primary
//! - Route around replicas that fail with connection errors
//! - Retry serialization failures on other replicas, then the primary
//! - Retry primary connection errors with backoff
//! - Expose replication positions for read-your-writes checks

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::LoadBalancingConfig;
use crate::error::{Error, Result};
use crate::health::replication::{WriteLocation, REPLAY_WRITE_LOCATION_SQL, WRITE_LOCATION_SQL};
use crate::load_balancer::{
    connection::{Connection, ConnectionFactory, DbRole},
    host::{Host, ReplicationLimits},
    host_list::HostList,
    scope::{Scope, SelectionCache},
};
use crate::resilience::backoff::{sleep_or_cancel, BackoffPolicy, Sleeper, TokioSleeper};
use crate::resilience::classifier::ErrorClassifier;

/// Routes database work to the primary or a replica.
///
/// One instance is shared by all concurrent units of work; each unit of work
/// gets its own [`Scope`].
pub struct LoadBalancer {
    primary: Arc<Host>,
    host_list: HostList,
    cache: Arc<SelectionCache>,
    classifier: ErrorClassifier,
    backoff: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
    serialization_retries_per_host: usize,
    limits: ReplicationLimits,
}

impl std::fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("primary", &self.primary)
            .field("host_list", &self.host_list)
            .field("bound_scopes", &self.cache.len())
            .field("backoff", &self.backoff)
            .field("serialization_retries_per_host", &self.serialization_retries_per_host)
            .finish()
    }
}

impl LoadBalancer {
    /// Create a load balancer from configuration.
    pub fn new(config: &LoadBalancingConfig, factory: Arc<dyn ConnectionFactory>) -> Self {
        let hosts = config
            .hosts
            .iter()
            .map(|address| Arc::new(Host::new(address.clone(), factory.clone())))
            .collect();

        tracing::info!(
            primary = %config.primary,
            replicas = config.hosts.len(),
            "Database load balancer configured"
        );

        Self {
            primary: Arc::new(Host::new(config.primary.clone(), factory)),
            host_list: HostList::new(hosts),
            cache: Arc::new(SelectionCache::new()),
            classifier: ErrorClassifier::from_config(&config.classifier),
            backoff: BackoffPolicy::from(&config.backoff),
            sleeper: Arc::new(TokioSleeper),
            serialization_retries_per_host: config.serialization_retries_per_host,
            limits: ReplicationLimits {
                max_lag_time: config.max_replication_lag_time(),
                max_lag_bytes: config.max_replication_difference,
            },
        }
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Start a unit of work.
    pub fn begin_scope(&self) -> Scope {
        self.begin_scope_with_cancellation(CancellationToken::new())
    }

    /// Start a unit of work whose retries stop when `cancel` fires.
    pub fn begin_scope_with_cancellation(&self, cancel: CancellationToken) -> Scope {
        Scope::new(self.cache.clone(), cancel)
    }

    pub fn primary(&self) -> &Arc<Host> {
        &self.primary
    }

    pub fn host_list(&self) -> &HostList {
        &self.host_list
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn replication_limits(&self) -> &ReplicationLimits {
        &self.limits
    }

    /// The replica bound to `scope`, binding the next online one if needed.
    ///
    /// Returns `None` when no replica is online.
    pub fn host(&self, scope: &Scope) -> Option<Arc<Host>> {
        if let Some(host) = self.cache.get(scope.id()) {
            return Some(host);
        }
        let host = self.host_list.next_online()?;
        Some(self.cache.bind(scope.id(), host))
    }

    /// Unbind the scope's replica and disable its query cache.
    pub fn release_host(&self, scope: &Scope) {
        if let Some(host) = self.cache.release(scope.id()) {
            tracing::trace!(scope = %scope.id(), address = %host.address(), "Released replica");
        }
    }

    pub fn release_primary_connection(&self) {
        self.primary.release_connection();
    }

    pub fn is_connection_error(&self, err: &(dyn StdError + 'static)) -> bool {
        self.classifier.is_connection_error(err)
    }

    pub fn is_serialization_failure(&self, err: &(dyn StdError + 'static)) -> bool {
        self.classifier.is_serialization_failure(err)
    }

    /// Run `f` against the scope's replica.
    ///
    /// Serialization failures move on to the next replica, at most
    /// `serialization_retries_per_host` times per replica, before falling
    /// back to the primary. A connection error takes the replica offline
    /// and falls back to the primary at once. Any other error is returned
    /// unchanged.
    pub async fn read<T, E, F, Fut>(&self, scope: &Scope, f: F) -> std::result::Result<T, E>
    where
        F: Fn(Arc<dyn Connection>) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: StdError + From<Error> + 'static,
    {
        let max_conflict_retries = self.host_list.len() * self.serialization_retries_per_host;
        let mut conflict_retried = 0;

        while let Some(host) = self.host(scope) {
            if scope.is_cancelled() {
                return Err(Error::Cancelled.into());
            }
            if !host.query_cache_enabled() {
                host.enable_query_cache();
            }

            let result = match host.connection().await {
                Ok(conn) => f(conn).await,
                Err(e) => Err(E::from(e)),
            };
            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if self.classifier.is_serialization_failure(&err) {
                if conflict_retried >= max_conflict_retries {
                    break;
                }
                conflict_retried += 1;
                tracing::debug!(
                    address = %host.address(),
                    attempt = conflict_retried,
                    error = %err,
                    "Query conflict on replica, retrying on next host"
                );
                self.release_host(scope);
            } else if self.classifier.is_connection_error(&err) {
                tracing::warn!(address = %host.address(), error = %err, "Replica connection failed");
                host.offline();
                host.release_connection();
                self.release_host(scope);
                break;
            } else {
                return Err(err);
            }
        }

        if scope.is_cancelled() {
            return Err(Error::Cancelled.into());
        }

        tracing::warn!(
            event = "no_secondaries_available",
            conflict_retried,
            host_list_length = self.host_list.len(),
            "No secondaries were available, using primary instead"
        );

        self.read_write(scope, f).await
    }

    /// Run `f` against the primary, retrying connection errors with backoff.
    pub async fn read_write<T, E, F, Fut>(&self, scope: &Scope, f: F) -> std::result::Result<T, E>
    where
        F: Fn(Arc<dyn Connection>) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: StdError + From<Error> + 'static,
    {
        let f = &f;
        let primary = &self.primary;
        self.retry_with_backoff(scope, move || async move {
            let conn = primary.connection().await.map_err(E::from)?;
            f(conn).await
        })
        .await
    }

    /// Run `f`, retrying when it fails with a connection error.
    ///
    /// Before each retry the primary connection is released and the task
    /// sleeps for the next backoff delay. When the delays run out, or on any
    /// other error, the error from the last attempt is returned as is. A
    /// cancelled scope makes no further attempts.
    pub async fn retry_with_backoff<T, E, F, Fut>(&self, scope: &Scope, mut f: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: StdError + From<Error> + 'static,
    {
        let mut retried = 0;

        loop {
            if scope.is_cancelled() {
                return Err(Error::Cancelled.into());
            }

            let err = match f().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.classifier.is_connection_error(&err) {
                return Err(err);
            }

            self.release_primary_connection();

            let Some(delay) = self.backoff.delay(retried) else {
                tracing::error!(attempts = retried + 1, error = %err, "Primary connection retries exhausted");
                return Err(err);
            };
            retried += 1;

            tracing::info!(attempt = retried, delay = ?delay, error = %err, "Retrying after primary connection error");
            drop(err);
            sleep_or_cancel(self.sleeper.as_ref(), delay, scope.cancellation())
                .await
                .map_err(E::from)?;
        }
    }

    /// Which database `conn` points at, if this balancer handed it out to
    /// `scope`. Has no side effects.
    pub fn db_role_for_connection(&self, scope: &Scope, conn: &Arc<dyn Connection>) -> Option<DbRole> {
        if self
            .cache
            .get(scope.id())
            .is_some_and(|host| host.owns_connection(conn))
        {
            return Some(DbRole::Replica);
        }
        if self.primary.owns_connection(conn) {
            return Some(DbRole::Primary);
        }
        None
    }

    /// Current replication position of the primary.
    ///
    /// Falls back to the replay position when the insert position cannot be
    /// read, and fails when neither is available.
    pub async fn primary_write_location(&self, scope: &Scope) -> Result<WriteLocation> {
        self.read_write(scope, |conn| async move {
            let location = match conn.select_value(WRITE_LOCATION_SQL).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!(error = %e, "Could not read primary write location, using replay location");
                    None
                }
            };

            let value = match location {
                Some(value) => value,
                None => conn
                    .select_value(REPLAY_WRITE_LOCATION_SQL)
                    .await?
                    .ok_or(Error::WriteLocationUnavailable)?,
            };
            value.parse::<WriteLocation>()
        })
        .await
    }

    /// True only if every replica has replayed up to `location`.
    ///
    /// Vacuously true without replicas.
    pub async fn all_caught_up(&self, location: WriteLocation) -> bool {
        for host in self.host_list.hosts() {
            if !host.caught_up(location).await {
                return false;
            }
        }
        true
    }
}
