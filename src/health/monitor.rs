//! Periodic replica status checks.
//!
//! # Responsibilities
//! - Periodically measure every replica's replication lag
//! - Take lagging replicas offline and bring recovered ones back online

use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::LoadBalancingConfig;
use crate::error::Error;
use crate::load_balancer::LoadBalancer;

pub struct ReplicaMonitor {
    balancer: Arc<LoadBalancer>,
    interval: Duration,
}

impl ReplicaMonitor {
    pub fn new(balancer: Arc<LoadBalancer>, interval: Duration) -> Self {
        Self { balancer, interval }
    }

    /// Monitor checking at the configured `replica_check_interval_secs`.
    pub fn from_config(balancer: Arc<LoadBalancer>, config: &LoadBalancingConfig) -> Self {
        Self::new(balancer, config.replica_check_interval())
    }

    pub async fn run(self, shutdown: CancellationToken) {
        if self.balancer.host_list().is_empty() {
            tracing::info!("No replicas configured, replica monitor not started");
            return;
        }

        tracing::info!(
            interval = ?self.interval,
            replicas = self.balancer.host_list().len(),
            "Replica monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check(shutdown.child_token()).await;
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Replica monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Refresh every replica once. Returns how many are online afterwards.
    pub async fn check_all(&self) -> usize {
        self.check(CancellationToken::new()).await
    }

    async fn check(&self, cancel: CancellationToken) -> usize {
        // Lag size is measured against the primary; without a position only
        // lag time can vouch for a replica.
        let scope = self.balancer.begin_scope_with_cancellation(cancel);
        let location = match self.balancer.primary_write_location(&scope).await {
            Ok(location) => Some(location),
            Err(Error::Cancelled) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Could not determine primary write location for replica checks");
                None
            }
        };

        let limits = self.balancer.replication_limits();
        let mut online = 0;
        for host in self.balancer.host_list().hosts() {
            if scope.is_cancelled() {
                tracing::debug!("Replica check interrupted by shutdown");
                return self.online_count();
            }
            if host.refresh_status(limits, location).await {
                online += 1;
            }
        }

        tracing::debug!(
            online,
            total = self.balancer.host_list().len(),
            "Replica status refreshed"
        );
        online
    }

    fn online_count(&self) -> usize {
        self.balancer
            .host_list()
            .hosts()
            .iter()
            .filter(|host| host.is_online())
            .count()
    }
}
