//! Per-node instance cache
//!
//! Uses DashMap for lock-free concurrent access.

use crate::{Container, Instance, Result};
use ahash::RandomState;
use dashmap::DashMap;
use std::fmt;

type PendingFn = Box<dyn FnOnce(&Container) -> Result<Instance> + Send + Sync>;

/// A registered entry that has not been realized yet
pub(crate) enum Pending {
    /// Pre-built value
    Value(Instance),
    /// Closure run once against the owning container
    Closure(PendingFn),
}

impl Pending {
    pub(crate) fn realize(self, container: &Container) -> Result<Instance> {
        match self {
            Pending::Value(instance) => Ok(instance),
            Pending::Closure(build) => build(container),
        }
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pending::Value(instance) => f.debug_tuple("Value").field(instance).finish(),
            Pending::Closure(_) => f.write_str("Closure"),
        }
    }
}

/// Built instances plus registered-but-unrealized entries, keyed by name.
pub(crate) struct ServiceStorage {
    instances: DashMap<String, Instance, RandomState>,
    pending: DashMap<String, Pending, RandomState>,
}

impl ServiceStorage {
    /// Create new empty storage.
    ///
    /// Uses 8 shards: containers rarely hold more than a few dozen
    /// services, and shard creation dominates for small nodes.
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            instances: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
            pending: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
        }
    }

    /// Cached instance, cloned out so no shard lock outlives the call
    #[inline]
    pub(crate) fn instance(&self, name: &str) -> Option<Instance> {
        self.instances.get(name).map(|entry| entry.value().clone())
    }

    /// True if `name` has been realized on this node
    #[inline]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    /// Cache a built instance, replacing any previous one
    #[inline]
    pub(crate) fn store(&self, name: &str, instance: Instance) {
        self.instances.insert(name.to_owned(), instance);
    }

    /// Register an unrealized entry
    #[inline]
    pub(crate) fn register(&self, name: impl Into<String>, pending: Pending) {
        self.pending.insert(name.into(), pending);
    }

    /// Remove and return the unrealized entry for `name`
    #[inline]
    pub(crate) fn take_pending(&self, name: &str) -> Option<Pending> {
        self.pending.remove(name).map(|(_, pending)| pending)
    }

    /// Number of realized services
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.instances.len()
    }
}

impl fmt::Debug for ServiceStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceStorage")
            .field("count", &self.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestService {
        value: i32,
    }

    #[test]
    fn test_storage_store_and_get() {
        let storage = ServiceStorage::new();
        storage.store("test", Instance::new(TestService { value: 42 }));

        let service = storage.instance("test").unwrap().resolve::<TestService>().unwrap();
        assert_eq!(service.value, 42);
        assert!(storage.contains("test"));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_pending_is_taken_once() {
        let storage = ServiceStorage::new();
        storage.register("test", Pending::Value(Instance::new(TestService { value: 1 })));

        assert!(!storage.contains("test"));
        assert!(storage.take_pending("test").is_some());
        assert!(storage.take_pending("test").is_none());
    }
}
