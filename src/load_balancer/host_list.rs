//! Round-robin host list.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::load_balancer::host::Host;

/// Replica hosts in configuration order.
/// Stores an internal counter to rotate through hosts.
#[derive(Debug, Default)]
pub struct HostList {
    hosts: Vec<Arc<Host>>,
    index: AtomicUsize,
}

impl HostList {
    pub fn new(hosts: Vec<Arc<Host>>) -> Self {
        Self {
            hosts,
            index: AtomicUsize::new(0),
        }
    }

    /// Return the next host in rotation, online or not.
    ///
    /// Health is the caller's concern; skipping offline hosts here would
    /// unbalance the rotation once they recover.
    pub fn next(&self) -> Option<Arc<Host>> {
        if self.hosts.is_empty() {
            return None;
        }
        let ticket = self.index.fetch_add(1, Ordering::Relaxed);
        Some(self.hosts[ticket % self.hosts.len()].clone())
    }

    /// Next online host, trying each host at most once.
    pub fn next_online(&self) -> Option<Arc<Host>> {
        (0..self.hosts.len())
            .filter_map(|_| self.next())
            .find(|host| host.is_online())
    }

    pub fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
