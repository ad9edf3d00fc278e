//! Hierarchical service container
//!
//! A `Container` is one node of a tree. Each node owns its raw
//! configuration, compiled-config cache, instance cache and child scopes,
//! and holds a non-owning link to its parent. Lookups that a node cannot
//! answer cascade upward.

use crate::config::{Config, RawConfig, ServiceConfig};
use crate::env::{Environment, ProcessEnvironment};
use crate::factory::BuildRequest;
use crate::provider::TypeRegistry;
use crate::scope::{Scope, Scopes};
use crate::storage::{Pending, ServiceStorage};
use crate::{DiError, Injectable, Instance, Result, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// State of one container node
pub(crate) struct Node {
    scope: Scope,
    depth: u32,
    config: Config,
    storage: ServiceStorage,
    scopes: Scopes,
    parent: Option<Weak<Node>>,
    types: Arc<TypeRegistry>,
    env: Arc<dyn Environment>,
}

/// Configuration-driven service container.
///
/// Cloning is cheap and yields a handle to the same node.
///
/// # Examples
///
/// ```rust
/// use service_tree::{Container, Param, RawConfig, ServiceType, TypeRegistry};
/// use serde_json::json;
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// let types = TypeRegistry::new().with(
///     ServiceType::named::<Greeter>("Greeter")
///         .constructor([Param::value("greeting").default_value("hello")], |args| {
///             Ok(Greeter { greeting: args.string("greeting")? })
///         }),
/// );
/// let config = RawConfig::new().with("Greeter", json!({"arguments": {"greeting": "hi"}}));
///
/// let container = Container::new(types, config);
/// let greeter = container.get_as::<Greeter>("Greeter").unwrap();
/// assert_eq!(greeter.greeting, "hi");
///
/// // cached: the same instance comes back
/// assert!(container.get("Greeter").unwrap().ptr_eq(&container.get("Greeter").unwrap()));
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<Node>,
}

impl Container {
    /// Create a root container over `types` and `config`, reading
    /// environment variables from the process.
    pub fn new(types: TypeRegistry, config: RawConfig) -> Self {
        Self::builder().types(types).config(config).build()
    }

    /// Start building a root container
    #[inline]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    fn from_node(node: Node) -> Self {
        Self {
            inner: Arc::new(node),
        }
    }

    /// Create a child node over `config`.
    ///
    /// The child shares this node's types and environment. Lookups it
    /// cannot answer fall back to this node; configuration for a name is
    /// merged across both, the child's fragment winning.
    ///
    /// The child holds only a weak link upward: keep the parent alive for as
    /// long as the child is used.
    pub fn scope(&self, config: RawConfig) -> Self {
        let depth = self.inner.depth + 1;
        let scope = Scope::new();

        #[cfg(feature = "logging")]
        debug!(
            target: "service_tree",
            parent_scope = %self.inner.scope,
            scope = %scope,
            depth = depth,
            services = config.len(),
            "Creating child container"
        );

        Self::from_node(Node {
            scope,
            depth,
            config: Config::new(config),
            storage: ServiceStorage::new(),
            scopes: Scopes::new(),
            parent: Some(Arc::downgrade(&self.inner)),
            types: Arc::clone(&self.inner.types),
            env: Arc::clone(&self.inner.env),
        })
    }

    /// Parent node, if this is a child that is still attached
    pub fn parent(&self) -> Option<Container> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Container { inner })
    }

    /// Nesting depth: 0 for a root
    #[inline]
    pub fn depth(&self) -> u32 {
        self.inner.depth
    }

    /// Unique id of this node
    #[inline]
    pub fn scope_id(&self) -> Scope {
        self.inner.scope
    }

    /// The raw configuration this node was created with
    #[inline]
    pub fn config(&self) -> &RawConfig {
        self.inner.config.raw()
    }

    /// Type descriptors shared by the whole tree
    #[inline]
    pub fn types(&self) -> &TypeRegistry {
        &self.inner.types
    }

    /// Number of realized services on this node
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.storage.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// True only if `name` has been realized on this node. Never builds.
    ///
    /// [`CONTAINER_SERVICE`] is always present.
    #[inline]
    pub fn has(&self, name: &str) -> bool {
        name == CONTAINER_SERVICE || self.inner.storage.contains(name)
    }

    /// Pre-register a value under `name`.
    ///
    /// Fails with [`DiError::ServiceAlreadyExists`] if `name` is already
    /// realized on this node.
    pub fn add<T: Injectable>(&self, name: impl Into<String>, service: T) -> Result<&Self> {
        self.add_instance(name, Instance::new(service))
    }

    /// Pre-register an erased instance under `name`
    pub fn add_instance(&self, name: impl Into<String>, service: Instance) -> Result<&Self> {
        self.register_pending(name.into(), Pending::Value(service))
    }

    /// Pre-register a closure run once, against this container, on first
    /// lookup of `name`.
    pub fn add_with<T, F>(&self, name: impl Into<String>, build: F) -> Result<&Self>
    where
        T: Injectable,
        F: FnOnce(&Container) -> Result<T> + Send + Sync + 'static,
    {
        self.register_pending(
            name.into(),
            Pending::Closure(Box::new(move |container| build(container).map(Instance::new))),
        )
    }

    fn register_pending(&self, name: String, pending: Pending) -> Result<&Self> {
        if self.has(&name) {
            return Err(DiError::already_exists(name));
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "service_tree",
            service = %name,
            scope = %self.inner.scope,
            kind = ?pending,
            "Registering static service"
        );

        self.inner.storage.register(name, pending);
        Ok(self)
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Fetch or build `name`.
    ///
    /// Walks this node (cache, static registrations, configuration, parent
    /// service) and then its ancestors. A registered type that nothing
    /// configures is built here with default configuration.
    pub fn get(&self, name: &str) -> Result<Instance> {
        match self.resolve(name) {
            Err(err) if err.is_not_found(name) && self.inner.types.contains(name) => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "service_tree",
                    service = name,
                    scope = %self.inner.scope,
                    "Autowiring unconfigured service type"
                );

                self.wrap_service(name)
            }
            result => result,
        }
    }

    /// [`get`](Self::get) and downcast, materializing lazy placeholders
    pub fn get_as<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        self.get(name)?.resolve::<T>()
    }

    /// Build a fresh `name` with runtime constructor overrides.
    ///
    /// Overrides win over configured arguments. The result is never cached,
    /// and neither is anything built for it with the same overrides.
    pub fn make(&self, name: &str, overrides: BTreeMap<String, Value>) -> Result<Instance> {
        #[cfg(feature = "logging")]
        debug!(
            target: "service_tree",
            service = name,
            overrides = overrides.len(),
            "Building fresh service instance"
        );

        self.auto_wire(name, Some(&BuildRequest::fresh(overrides)))
    }

    /// One node's lookup, without the autowire fallback
    pub(crate) fn resolve(&self, name: &str) -> Result<Instance> {
        let node = &self.inner;

        if name == CONTAINER_SERVICE {
            return Ok(Instance::new(ContainerRef {
                node: self.downgrade(),
            }));
        }

        if let Some(instance) = node.storage.instance(name) {
            #[cfg(feature = "logging")]
            trace!(
                target: "service_tree",
                service = name,
                depth = node.depth,
                location = "cache",
                "Service resolved from instance cache"
            );
            return Ok(instance);
        }

        if let Some(pending) = node.storage.take_pending(name) {
            return self.add_static_service(name, pending);
        }

        if node.config.has(name) {
            return self.wrap_service(name);
        }

        if let Some(owner) = node.scopes.parent_service() {
            if node.types.instance_is_a(&owner, name) {
                #[cfg(feature = "logging")]
                trace!(
                    target: "service_tree",
                    service = name,
                    depth = node.depth,
                    location = "parent_service",
                    "Service resolved from owning service"
                );
                return Ok(owner);
            }
        }

        match self.parent_node()? {
            Some(parent) => {
                #[cfg(feature = "logging")]
                trace!(
                    target: "service_tree",
                    service = name,
                    depth = node.depth,
                    "Service not in local scope, asking parent"
                );
                parent.resolve(name)
            }
            None => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "service_tree",
                    service = name,
                    "Service not found in service tree"
                );
                Err(DiError::not_found(name))
            }
        }
    }

    fn add_static_service(&self, name: &str, pending: Pending) -> Result<Instance> {
        let instance = pending.realize(self)?;
        self.inner.storage.store(name, instance.clone());

        #[cfg(feature = "logging")]
        debug!(
            target: "service_tree",
            service = name,
            scope = %self.inner.scope,
            "Realized static service"
        );

        Ok(instance)
    }

    /// Compiled configuration of `name`, merged across ancestor nodes
    pub(crate) fn compiled(&self, name: &str) -> Result<Arc<ServiceConfig>> {
        if let Some(compiled) = self.inner.config.cached(name) {
            return Ok(compiled);
        }

        let ancestors = self.ancestors()?;
        let raws: Vec<&RawConfig> = ancestors.iter().map(Container::config).collect();

        self.inner
            .config
            .get(name, &raws, &self.inner.types, self.inner.env.as_ref())
    }

    /// Ancestor nodes, root first
    fn ancestors(&self) -> Result<Vec<Container>> {
        let mut chain = Vec::with_capacity(self.inner.depth as usize);
        let mut current = self.parent_node()?;

        while let Some(node) = current {
            current = node.parent_node()?;
            chain.push(node);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Parent node. A detached parent is an error, not a root.
    fn parent_node(&self) -> Result<Option<Container>> {
        match &self.inner.parent {
            None => Ok(None),
            Some(weak) => weak
                .upgrade()
                .map(|inner| Some(Container { inner }))
                .ok_or(DiError::ParentDropped),
        }
    }

    // =========================================================================
    // Crate internals
    // =========================================================================

    #[inline]
    pub(crate) fn env(&self) -> &dyn Environment {
        self.inner.env.as_ref()
    }

    #[inline]
    pub(crate) fn storage(&self) -> &ServiceStorage {
        &self.inner.storage
    }

    #[inline]
    pub(crate) fn scopes(&self) -> &Scopes {
        &self.inner.scopes
    }

    #[inline]
    pub(crate) fn downgrade(&self) -> Weak<Node> {
        Arc::downgrade(&self.inner)
    }

    /// Re-attach to a node held weakly on behalf of `service`
    pub(crate) fn upgrade(node: &Weak<Node>, service: &str) -> Result<Container> {
        node.upgrade()
            .map(|inner| Container { inner })
            .ok_or_else(|| DiError::ContainerDropped {
                name: service.to_owned(),
            })
    }
}

/// Name under which every node answers with a [`ContainerRef`] to itself
pub const CONTAINER_SERVICE: &str = "ContainerInterface";

/// Non-owning handle to a container node.
///
/// Handed out for [`CONTAINER_SERVICE`], so a service can depend on the
/// container that builds it without keeping that container alive.
#[derive(Clone)]
pub struct ContainerRef {
    node: Weak<Node>,
}

impl ContainerRef {
    /// The node, if it is still alive
    pub fn container(&self) -> Result<Container> {
        Container::upgrade(&self.node, CONTAINER_SERVICE)
    }

    /// [`Container::get`] on the node
    pub fn get(&self, name: &str) -> Result<Instance> {
        self.container()?.get(name)
    }
}

impl fmt::Debug for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRef")
            .field("alive", &(self.node.strong_count() > 0))
            .finish()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("scope", &self.inner.scope)
            .field("depth", &self.inner.depth)
            .field("configured", &self.inner.config.raw().len())
            .field("storage", &self.inner.storage)
            .field("children", &self.inner.scopes.len())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

/// Builder for a root [`Container`].
#[derive(Default)]
pub struct ContainerBuilder {
    types: TypeRegistry,
    config: RawConfig,
    env: Option<Arc<dyn Environment>>,
}

impl ContainerBuilder {
    /// Type descriptors
    pub fn types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    /// Root configuration
    pub fn config(mut self, config: RawConfig) -> Self {
        self.config = config;
        self
    }

    /// Variable source for `ENV(...)` interpolation. Defaults to the process
    /// environment.
    pub fn env(mut self, env: impl Environment + 'static) -> Self {
        self.env = Some(Arc::new(env));
        self
    }

    pub fn build(self) -> Container {
        let scope = Scope::new();

        #[cfg(feature = "logging")]
        debug!(
            target: "service_tree",
            scope = %scope,
            types = self.types.len(),
            services = self.config.len(),
            "Creating root container"
        );

        Container::from_node(Node {
            scope,
            depth: 0,
            config: Config::new(self.config),
            storage: ServiceStorage::new(),
            scopes: Scopes::new(),
            parent: None,
            types: Arc::new(self.types),
            env: self.env.unwrap_or_else(|| Arc::new(ProcessEnvironment)),
        })
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("types", &self.types)
            .field("config", &self.config)
            .field("custom_env", &self.env.is_some())
            .finish()
    }
}
