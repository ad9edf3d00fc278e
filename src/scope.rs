//! Nested scopes
//!
//! A service whose configuration carries a `services` map gets a private
//! child node, created on first use and kept for the life of the owning
//! node. Lookups made while building that service go to the child first
//! and fall back to the owning node through the parent link.

use crate::{Container, DiError, Instance, Result};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Unique scope identifier.
///
/// Each container node gets a unique ID for tracking and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope(u64);

impl Scope {
    /// Generate a new unique scope ID.
    #[inline]
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// Child nodes keyed by owning service, plus the service that owns this
/// node (if any).
pub(crate) struct Scopes {
    children: DashMap<String, Container, RandomState>,
    parent_service: RwLock<Option<Instance>>,
}

impl Scopes {
    pub(crate) fn new() -> Self {
        Self {
            children: DashMap::with_hasher(RandomState::new()),
            parent_service: RwLock::new(None),
        }
    }

    #[inline]
    pub(crate) fn child(&self, owner: &str) -> Option<Container> {
        self.children.get(owner).map(|entry| entry.value().clone())
    }

    /// Memoize `child` for `owner`. The first insert wins.
    pub(crate) fn insert_child(&self, owner: &str, child: Container) -> Container {
        self.children
            .entry(owner.to_owned())
            .or_insert(child)
            .value()
            .clone()
    }

    #[inline]
    pub(crate) fn parent_service(&self) -> Option<Instance> {
        self.parent_service.read().clone()
    }

    #[inline]
    pub(crate) fn set_parent_service(&self, service: Instance) {
        *self.parent_service.write() = Some(service);
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.children.len()
    }
}

impl Container {
    /// Look up `service` on behalf of `current`, the service being built.
    ///
    /// Goes through `current`'s child scope when its configuration declares
    /// one, creating the child on first use.
    ///
    /// A service asking for itself is a self-dependency unless it is already
    /// cached here or its own child scope configures that name.
    pub(crate) fn traverse_tree(&self, current: &str, service: &str) -> Result<Instance> {
        if current == service && !self.storage().contains(service) {
            let config = self.compiled(current)?;
            if !config.services.has(service) {
                return Err(DiError::self_dependency(service));
            }
        }

        if let Some(child) = self.scopes().child(current) {
            #[cfg(feature = "logging")]
            trace!(
                target: "service_tree",
                owner = current,
                service = service,
                "Resolving through existing child scope"
            );
            return child.get(service);
        }

        let config = self.compiled(current)?;
        if !config.has_services() {
            return self.get(service);
        }

        let child = self.child_scope(current, config.services.clone());
        child.get(service)
    }

    fn child_scope(&self, owner: &str, services: crate::RawConfig) -> Container {
        let child = self.scope(services);

        if let Some(owned) = self.storage().instance(owner) {
            child.scopes().set_parent_service(owned);
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "service_tree",
            owner = owner,
            scope = %child.scope_id(),
            depth = child.depth(),
            "Created child scope for service"
        );

        self.scopes().insert_child(owner, child)
    }
}
