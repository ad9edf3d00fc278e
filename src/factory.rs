//! Instance construction
//!
//! Builds one service from its compiled configuration: through the type's
//! constructor, through a type-level factory method, or by adopting an
//! already resolved `{reference}`. The "prepare" step runs `selects`, caches
//! the result and applies `calls`.

use crate::config::{FactoryConfig, MethodCall, ServiceConfig};
use crate::lazy::{self, WrappedService};
use crate::provider::{Constructor, ServiceType};
use crate::binder::Arguments;
use crate::{Container, DiError, Instance, Result, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Per-build options: runtime argument overrides, and whether the result
/// bypasses the instance cache.
#[derive(Clone, Debug, Default)]
pub(crate) struct BuildRequest {
    overrides: Arc<BTreeMap<String, Value>>,
    fresh: bool,
}

impl BuildRequest {
    /// Uncached build with overrides
    pub(crate) fn fresh(overrides: BTreeMap<String, Value>) -> Self {
        Self {
            overrides: Arc::new(overrides),
            fresh: true,
        }
    }

    #[inline]
    pub(crate) fn override_for(&self, name: &str) -> Option<&Value> {
        self.overrides.get(name)
    }

    #[inline]
    pub(crate) fn is_fresh(&self) -> bool {
        self.fresh
    }
}

impl Container {
    /// Build a configured service, or hand out a callable for `wrap`.
    pub(crate) fn wrap_service(&self, name: &str) -> Result<Instance> {
        let config = self.compiled(name)?;

        if config.wrap {
            #[cfg(feature = "logging")]
            debug!(
                target: "service_tree",
                service = name,
                scope = %self.scope_id(),
                "Wrapping service in on-demand callable"
            );
            return Ok(Instance::new(WrappedService::new(self, name)));
        }

        self.auto_wire(name, None)
    }

    /// Build `name` from its compiled configuration.
    pub(crate) fn auto_wire(&self, name: &str, request: Option<&BuildRequest>) -> Result<Instance> {
        let config = self.compiled(name)?;

        if let Some(reference) = config.reference() {
            return self.wire_reference(name, reference, &config, request);
        }

        if let Some(factory) = &config.factory {
            return self.invoke_factory(name, factory, &config, request);
        }

        let ty = self.service_type(name, config.use_type())?;
        let constructor = ty.constructor().cloned().ok_or_else(|| {
            DiError::invalid(name, format!("{} is not instantiable", ty.name()))
        })?;
        let args = self.bind(name, "constructor", constructor.params(), &config.arguments, request)?;

        if config.lazy {
            return Ok(self.defer_instance(name, &ty, constructor, args, config, request));
        }

        self.create_instance(name, &constructor, &args, &config, request)
    }

    fn create_instance(
        &self,
        name: &str,
        constructor: &Constructor,
        args: &Arguments,
        config: &ServiceConfig,
        request: Option<&BuildRequest>,
    ) -> Result<Instance> {
        let instance = constructor.call(args)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "service_tree",
            service = name,
            use_type = config.use_type(),
            scope = %self.scope_id(),
            arguments = args.len(),
            "Constructed service instance"
        );

        self.prepare_service(name, instance, config, request)
    }

    /// Cache a placeholder that constructs and prepares on first access.
    fn defer_instance(
        &self,
        name: &str,
        ty: &ServiceType,
        constructor: Constructor,
        args: Arguments,
        config: Arc<ServiceConfig>,
        request: Option<&BuildRequest>,
    ) -> Instance {
        let node = self.downgrade();
        let service = name.to_owned();
        let deferred_config = Arc::clone(&config);
        let deferred_request = request.cloned();

        let placeholder = lazy::defer(ty.type_id(), ty.type_name(), name, move || {
            Container::upgrade(&node, &service)?.create_instance(
                &service,
                &constructor,
                &args,
                &deferred_config,
                deferred_request.as_ref(),
            )
        });

        #[cfg(feature = "logging")]
        debug!(
            target: "service_tree",
            service = name,
            use_type = ty.name(),
            "Deferred service construction until first access"
        );

        self.store_service(name, &config, request, placeholder.clone());
        placeholder
    }

    /// Adopt another service and prepare it with this service's config
    fn wire_reference(
        &self,
        name: &str,
        reference: &str,
        config: &ServiceConfig,
        request: Option<&BuildRequest>,
    ) -> Result<Instance> {
        if reference == name {
            return Err(DiError::self_dependency(name));
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "service_tree",
            service = name,
            reference = reference,
            "Wiring service from reference"
        );

        let service = self.get(reference)?;
        self.prepare_service(name, service, config, request)
    }

    fn invoke_factory(
        &self,
        name: &str,
        factory: &FactoryConfig,
        config: &ServiceConfig,
        request: Option<&BuildRequest>,
    ) -> Result<Instance> {
        let method = factory
            .method()
            .ok_or_else(|| DiError::invalid(name, "method is required for factory"))?;
        let type_name = factory.target().unwrap_or_else(|| config.use_type());
        let ty = self.service_type(name, type_name)?;
        let constructor = ty.factory(method).ok_or_else(|| {
            DiError::invalid(name, format!("factory method {method} is not callable on {type_name}"))
        })?;

        let args = self.bind(name, method, constructor.params(), factory.arguments(config), request)?;
        let instance = constructor.call(&args)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "service_tree",
            service = name,
            factory_type = type_name,
            method = method,
            "Built service through factory method"
        );

        self.prepare_service(name, instance, config, request)
    }

    /// Run `selects`, cache the result, then apply `calls` in order.
    ///
    /// A call with `select: true` replaces the working instance; later calls
    /// operate on the replacement.
    pub(crate) fn prepare_service(
        &self,
        name: &str,
        mut service: Instance,
        config: &ServiceConfig,
        request: Option<&BuildRequest>,
    ) -> Result<Instance> {
        for select in &config.selects {
            service = self.select_call(name, &service, select)?;
        }

        self.store_service(name, config, request, service.clone());

        for call in config.calls.iter().flatten() {
            if call.select {
                service = self.select_call(name, &service, call)?;
            } else {
                self.invoke_call(name, &service, call)?;
            }
        }

        Ok(service)
    }

    fn select_call(&self, name: &str, service: &Instance, call: &MethodCall) -> Result<Instance> {
        self.invoke_call(name, service, call)?.ok_or_else(|| {
            DiError::invalid(
                name,
                format!(
                    "method {} returns nothing that can be selected",
                    call.method.as_deref().unwrap_or_default()
                ),
            )
        })
    }

    fn invoke_call(&self, name: &str, service: &Instance, call: &MethodCall) -> Result<Option<Instance>> {
        let method_name = call
            .method
            .as_deref()
            .ok_or_else(|| DiError::invalid(name, "method is required for setter injection"))?;

        let ty = self.types().of_instance(service).cloned().ok_or_else(|| {
            DiError::invalid(
                name,
                format!("method {method_name} is not callable on unregistered type {}", service.type_name()),
            )
        })?;
        let method = ty.method(method_name).ok_or_else(|| {
            DiError::invalid(
                name,
                format!("method {method_name} is not callable in class {}", ty.name()),
            )
        })?;

        let args = self.bind(name, method_name, method.params(), &call.arguments, None)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "service_tree",
            service = name,
            method = method_name,
            select = call.select,
            "Invoking configured method"
        );

        method.call(service, &args)
    }

    /// Cache `service` unless caching is switched off for it.
    ///
    /// A child scope already opened for `name` learns the instance as its
    /// parent service.
    pub(crate) fn store_service(
        &self,
        name: &str,
        config: &ServiceConfig,
        request: Option<&BuildRequest>,
        service: Instance,
    ) {
        if config.singleton || request.is_some_and(BuildRequest::is_fresh) {
            #[cfg(feature = "logging")]
            trace!(
                target: "service_tree",
                service = name,
                "Instance not cached"
            );
            return;
        }

        if let Some(child) = self.scopes().child(name) {
            child.scopes().set_parent_service(service.clone());
        }
        self.storage().store(name, service);

        #[cfg(feature = "logging")]
        debug!(
            target: "service_tree",
            service = name,
            scope = %self.scope_id(),
            "Cached service instance"
        );
    }

    fn service_type(&self, service: &str, type_name: &str) -> Result<Arc<ServiceType>> {
        self.types().get(type_name).cloned().ok_or_else(|| {
            DiError::invalid(service, format!("{type_name} can not be resolved to a registered type"))
        })
    }
}
