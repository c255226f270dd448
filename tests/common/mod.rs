//! Shared utilities for integration testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use db_load_balancer::config::LoadBalancingConfig;
use db_load_balancer::resilience::backoff::Sleeper;
use db_load_balancer::{Connection, ConnectionFactory, Error, Result};

/// Answers a query for one host.
pub type Handler = Arc<dyn Fn(&str) -> Result<Option<String>> + Send + Sync>;

type Handlers = Arc<Mutex<HashMap<String, Handler>>>;

/// A scripted connection. Unless told otherwise every query returns the
/// host's address, which tells tests which host served them.
pub struct MockConnection {
    address: String,
    handlers: Handlers,
    query_cache: AtomicBool,
    queries: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockConnection {
    pub fn query_cache_enabled(&self) -> bool {
        self.query_cache.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn select_value(&self, sql: &str) -> Result<Option<String>> {
        self.queries.lock().unwrap().push(sql.to_string());
        let handler = self.handlers.lock().unwrap().get(&self.address).cloned();
        match handler {
            Some(handler) => handler(sql),
            None => Ok(Some(self.address.clone())),
        }
    }

    fn enable_query_cache(&self) {
        self.query_cache.store(true, Ordering::SeqCst);
    }

    fn disable_query_cache(&self) {
        self.query_cache.store(false, Ordering::SeqCst);
    }
}

/// Hands out [`MockConnection`]s and counts connects per address.
#[derive(Default)]
pub struct MockFactory {
    handlers: Handlers,
    refused: Mutex<HashSet<String>>,
    connects: Mutex<HashMap<String, usize>>,
    opened: Mutex<HashMap<String, Arc<MockConnection>>>,
}

#[allow(dead_code)]
impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script every query sent to `address`.
    pub fn respond<F>(&self, address: &str, handler: F)
    where
        F: Fn(&str) -> Result<Option<String>> + Send + Sync + 'static,
    {
        self.handlers.lock().unwrap().insert(address.to_string(), Arc::new(handler));
    }

    /// Make connects to `address` fail.
    pub fn refuse(&self, address: &str) {
        self.refused.lock().unwrap().insert(address.to_string());
    }

    pub fn connects(&self, address: &str) -> usize {
        self.connects.lock().unwrap().get(address).copied().unwrap_or(0)
    }

    /// The most recently opened connection to `address`.
    pub fn last_connection(&self, address: &str) -> Option<Arc<MockConnection>> {
        self.opened.lock().unwrap().get(address).cloned()
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn connect(&self, address: &str) -> Result<Arc<dyn Connection>> {
        *self.connects.lock().unwrap().entry(address.to_string()).or_default() += 1;

        if self.refused.lock().unwrap().contains(address) {
            return Err(Error::connection(address, "connection refused"));
        }

        let conn = Arc::new(MockConnection {
            address: address.to_string(),
            handlers: self.handlers.clone(),
            query_cache: AtomicBool::new(false),
            queries: Mutex::new(Vec::new()),
        });
        self.opened.lock().unwrap().insert(address.to_string(), conn.clone());
        Ok(conn)
    }
}

/// Records requested sleeps and returns at once.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

#[allow(dead_code)]
impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

/// Configuration with a primary named `primary` and the given replicas.
pub fn config(hosts: &[&str]) -> LoadBalancingConfig {
    LoadBalancingConfig {
        primary: "primary".to_string(),
        hosts: hosts.iter().map(|h| h.to_string()).collect(),
        ..LoadBalancingConfig::default()
    }
}

#[allow(dead_code)]
pub fn conflict() -> Error {
    Error::database("canceling statement due to conflict with recovery", Some("40001"))
}

#[allow(dead_code)]
pub fn socket_closed(address: &str) -> Error {
    Error::connection(address, "server closed the connection unexpectedly")
}
