//! Deferred placeholders and wrapped callables
//!
//! A `lazy` service is handed out as a [`LazyService`] presenting the type
//! of the service it stands for. The real instance is built on first
//! [`Instance::resolve`] and reused afterwards. A `wrap` service is handed
//! out as a [`WrappedService`]: calling it runs the build on demand.

use crate::container::Node;
use crate::{Container, Instance, Result};
use once_cell::sync::OnceCell;
use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

type InitFn = Box<dyn Fn() -> Result<Instance> + Send + Sync>;

/// Placeholder that builds its service exactly once, on first access.
pub struct LazyService {
    service: String,
    init: InitFn,
    instance: OnceCell<Instance>,
}

impl LazyService {
    pub(crate) fn new<F>(service: impl Into<String>, init: F) -> Self
    where
        F: Fn() -> Result<Instance> + Send + Sync + 'static,
    {
        Self {
            service: service.into(),
            init: Box::new(init),
            instance: OnceCell::new(),
        }
    }

    /// Name of the service this placeholder stands for
    #[inline]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// True once the real instance has been built
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.instance.get().is_some()
    }

    /// The real instance, building it on the first call.
    ///
    /// A failed build is not cached; the next access retries.
    pub fn instance(&self) -> Result<Instance> {
        if let Some(instance) = self.instance.get() {
            #[cfg(feature = "logging")]
            trace!(
                target: "service_tree",
                service = %self.service,
                "Deferred service already materialized"
            );
            return Ok(instance.clone());
        }

        self.instance
            .get_or_try_init(|| {
                #[cfg(feature = "logging")]
                debug!(
                    target: "service_tree",
                    service = %self.service,
                    "Materializing deferred service on first access"
                );

                (self.init)()
            })
            .cloned()
    }
}

impl fmt::Debug for LazyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyService")
            .field("service", &self.service)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Wrap `init` in a placeholder that presents as `type_id`/`type_name`
pub(crate) fn defer<F>(type_id: TypeId, type_name: &'static str, service: &str, init: F) -> Instance
where
    F: Fn() -> Result<Instance> + Send + Sync + 'static,
{
    Instance::presenting(Arc::new(LazyService::new(service, init)), type_id, type_name)
}

/// Zero-argument callable returned for `wrap: true` services.
///
/// Every [`call`](Self::call) builds the service again through the node
/// that handed it out.
#[derive(Clone)]
pub struct WrappedService {
    node: Weak<Node>,
    service: String,
}

impl WrappedService {
    pub(crate) fn new(container: &Container, service: impl Into<String>) -> Self {
        Self {
            node: container.downgrade(),
            service: service.into(),
        }
    }

    #[inline]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Build the wrapped service
    pub fn call(&self) -> Result<Instance> {
        Container::upgrade(&self.node, &self.service)?.auto_wire(&self.service, None)
    }
}

impl fmt::Debug for WrappedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedService")
            .field("service", &self.service)
            .field("alive", &(self.node.strong_count() > 0))
            .finish()
    }
}
