//! Units of work and the host bound to each.
//!
//! A [`Scope`] stands for one request or job. The first read in a scope binds
//! a replica; every later read in the same scope uses that replica until the
//! binding is released, so one unit of work never observes two replicas.

use std::fmt;
use std::sync::Arc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::load_balancer::host::Host;

/// Identifier of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(Uuid);

impl ScopeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Which replica each live scope is bound to.
#[derive(Debug, Default)]
pub struct SelectionCache {
    bindings: DashMap<ScopeId, Arc<Host>>,
}

impl SelectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ScopeId) -> Option<Arc<Host>> {
        self.bindings.get(&id).map(|entry| entry.value().clone())
    }

    /// Bind `host` to the scope unless it already has a binding, and return
    /// whichever host ends up bound.
    pub fn bind(&self, id: ScopeId, host: Arc<Host>) -> Arc<Host> {
        match self.bindings.entry(id) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                host.bind();
                entry.insert(host).value().clone()
            }
        }
    }

    /// Drop the scope's binding. The host's query cache goes off once no
    /// scope is bound to it any more.
    pub fn release(&self, id: ScopeId) -> Option<Arc<Host>> {
        let (_, host) = self.bindings.remove(&id)?;
        host.unbind();
        Some(host)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// One unit of work. Dropping the scope releases its binding.
pub struct Scope {
    id: ScopeId,
    cancel: CancellationToken,
    cache: Arc<SelectionCache>,
}

impl Scope {
    pub(crate) fn new(cache: Arc<SelectionCache>, cancel: CancellationToken) -> Self {
        Self {
            id: ScopeId::new(),
            cancel,
            cache,
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Token that aborts retries started on behalf of this scope.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.cache.release(self.id);
    }
}
