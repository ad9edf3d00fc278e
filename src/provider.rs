//! Service type descriptors
//!
//! A [`ServiceType`] is the static stand-in for runtime reflection: it names
//! a type, lists the supertypes whose configuration it inherits, and carries
//! the constructor, type-level factory methods and instance methods the
//! container may call. Descriptors are collected once into a
//! [`TypeRegistry`] shared by every node of a container tree.

use crate::binder::Arguments;
use crate::{Instance, Result};
use ahash::RandomState;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Marker trait for types that can be stored in the container.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
pub trait Injectable: Send + Sync + 'static {}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// What a parameter expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// Plain configuration value
    Value,
    /// A service of the named type (class or interface name)
    Service(String),
}

/// A declared constructor or method parameter.
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    kind: ParamKind,
    default: Option<serde_json::Value>,
    nullable: bool,
}

impl Param {
    /// A plain value parameter
    pub fn value(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Value,
            default: None,
            nullable: false,
        }
    }

    /// A parameter typed as another service
    pub fn service(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Service(type_name.into()),
            default: None,
            nullable: false,
        }
    }

    /// Declared default value
    pub fn default_value(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Accepts null when nothing else supplies a value
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Nullable with a declared default of exactly `null`
    pub fn optional(self) -> Self {
        self.default_value(serde_json::Value::Null).nullable()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    #[inline]
    pub fn default(&self) -> Option<&serde_json::Value> {
        self.default.as_ref()
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// True only for a declared default of exactly `null`
    #[inline]
    pub fn defaults_to_null(&self) -> bool {
        matches!(self.default, Some(serde_json::Value::Null))
    }
}

type BuildFn = Arc<dyn Fn(&Arguments) -> Result<Instance> + Send + Sync>;
type InvokeFn = Arc<dyn Fn(&Instance, &Arguments) -> Result<Option<Instance>> + Send + Sync>;

/// Constructor or type-level factory method
#[derive(Clone)]
pub struct Constructor {
    params: Vec<Param>,
    build: BuildFn,
}

impl Constructor {
    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[inline]
    pub fn call(&self, args: &Arguments) -> Result<Instance> {
        (self.build)(args)
    }
}

/// Instance method. Returns `Some` when the method produces a value that a
/// `select` call can adopt as the service.
#[derive(Clone)]
pub struct Method {
    params: Vec<Param>,
    invoke: InvokeFn,
}

impl Method {
    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[inline]
    pub fn call(&self, instance: &Instance, args: &Arguments) -> Result<Option<Instance>> {
        (self.invoke)(instance, args)
    }
}

/// Descriptor of one constructible (or abstract) type.
pub struct ServiceType {
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    supertypes: Vec<String>,
    constructor: Option<Constructor>,
    factories: HashMap<String, Constructor, RandomState>,
    methods: HashMap<String, Method, RandomState>,
}

impl ServiceType {
    /// Start describing `T`, named after its Rust type name
    pub fn of<T: Injectable>() -> ServiceTypeBuilder<T> {
        Self::named::<T>(std::any::type_name::<T>())
    }

    /// Start describing `T` under an explicit service-visible name
    pub fn named<T: Injectable>(name: impl Into<String>) -> ServiceTypeBuilder<T> {
        ServiceTypeBuilder {
            ty: ServiceType {
                name: name.into(),
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                supertypes: Vec::new(),
                constructor: None,
                factories: HashMap::default(),
                methods: HashMap::default(),
            },
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Implemented interfaces and ancestors, nearest first
    #[inline]
    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    /// True if this type is `name` or declares it as a supertype
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name || self.supertypes.iter().any(|s| s == name)
    }

    #[inline]
    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    #[inline]
    pub fn factory(&self, name: &str) -> Option<&Constructor> {
        self.factories.get(name)
    }

    #[inline]
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceType")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("supertypes", &self.supertypes)
            .field("instantiable", &self.constructor.is_some())
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Typed builder for a [`ServiceType`].
///
/// # Examples
///
/// ```rust
/// use service_tree::{Param, ServiceType, TypeRegistry};
/// use std::sync::Mutex;
///
/// struct Mailer {
///     host: Mutex<String>,
/// }
///
/// let mut types = TypeRegistry::new();
/// types.register(
///     ServiceType::named::<Mailer>("Mailer")
///         .implements("MailerInterface")
///         .constructor([Param::value("host").default_value("localhost")], |args| {
///             Ok(Mailer { host: Mutex::new(args.string("host")?) })
///         })
///         .method("setHost", [Param::value("host")], |mailer, args| {
///             *mailer.host.lock().unwrap() = args.string("host")?;
///             Ok(())
///         }),
/// );
///
/// assert!(types.get("Mailer").unwrap().is_a("MailerInterface"));
/// ```
pub struct ServiceTypeBuilder<T> {
    ty: ServiceType,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> ServiceTypeBuilder<T> {
    /// Declare an implemented interface or parent type.
    ///
    /// Declare nearest first: configuration registered under later entries
    /// is applied earlier and loses to earlier entries.
    pub fn implements(mut self, supertype: impl Into<String>) -> Self {
        self.ty.supertypes.push(supertype.into());
        self
    }

    /// Constructor with declared parameters
    pub fn constructor<P, F>(mut self, params: P, build: F) -> Self
    where
        P: IntoIterator<Item = Param>,
        F: Fn(&Arguments) -> Result<T> + Send + Sync + 'static,
    {
        self.ty.constructor = Some(Constructor {
            params: params.into_iter().collect(),
            build: Arc::new(move |args| build(args).map(Instance::new)),
        });
        self
    }

    /// Parameterless constructor through `Default`
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor([], |_| Ok(T::default()))
    }

    /// Type-level factory method. The product does not have to be `T`.
    pub fn factory<R, P, F>(mut self, name: impl Into<String>, params: P, build: F) -> Self
    where
        R: Injectable,
        P: IntoIterator<Item = Param>,
        F: Fn(&Arguments) -> Result<R> + Send + Sync + 'static,
    {
        self.ty.factories.insert(
            name.into(),
            Constructor {
                params: params.into_iter().collect(),
                build: Arc::new(move |args| build(args).map(Instance::new)),
            },
        );
        self
    }

    /// Instance method without a selectable result (setter injection)
    pub fn method<P, F>(mut self, name: impl Into<String>, params: P, invoke: F) -> Self
    where
        P: IntoIterator<Item = Param>,
        F: Fn(&T, &Arguments) -> Result<()> + Send + Sync + 'static,
    {
        self.ty.methods.insert(
            name.into(),
            Method {
                params: params.into_iter().collect(),
                invoke: Arc::new(move |instance, args| {
                    let service = instance.resolve::<T>()?;
                    invoke(&service, args)?;
                    Ok(None)
                }),
            },
        );
        self
    }

    /// Instance method whose result can replace the service via `select`
    pub fn method_returning<R, P, F>(mut self, name: impl Into<String>, params: P, invoke: F) -> Self
    where
        R: Injectable,
        P: IntoIterator<Item = Param>,
        F: Fn(&T, &Arguments) -> Result<R> + Send + Sync + 'static,
    {
        self.ty.methods.insert(
            name.into(),
            Method {
                params: params.into_iter().collect(),
                invoke: Arc::new(move |instance, args| {
                    let service = instance.resolve::<T>()?;
                    invoke(&service, args).map(|r| Some(Instance::new(r)))
                }),
            },
        );
        self
    }

    /// Finish the descriptor
    pub fn build(self) -> ServiceType {
        self.ty
    }
}

impl<T: Injectable> From<ServiceTypeBuilder<T>> for ServiceType {
    fn from(builder: ServiceTypeBuilder<T>) -> Self {
        builder.build()
    }
}

/// All service types known to a container tree.
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<ServiceType>, RandomState>,
    names: HashMap<TypeId, String, RandomState>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a descriptor
    pub fn register(&mut self, ty: impl Into<ServiceType>) -> &mut Self {
        let ty = ty.into();

        #[cfg(feature = "logging")]
        debug!(
            target: "service_tree",
            service_type = ty.name(),
            rust_type = ty.type_name(),
            supertypes = ty.supertypes().len(),
            "Registering service type"
        );

        self.names.insert(ty.type_id(), ty.name.clone());
        self.types.insert(ty.name.clone(), Arc::new(ty));
        self
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, ty: impl Into<ServiceType>) -> Self {
        self.register(ty);
        self
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Arc<ServiceType>> {
        self.types.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Descriptor of the type an instance presents
    pub fn of_instance(&self, instance: &Instance) -> Option<&Arc<ServiceType>> {
        self.names
            .get(&instance.type_id())
            .and_then(|name| self.types.get(name))
    }

    /// True if `instance` is of type `name` or one of its supertypes
    pub fn instance_is_a(&self, instance: &Instance, name: &str) -> bool {
        instance.type_name() == name
            || self
                .of_instance(instance)
                .is_some_and(|ty| ty.is_a(name))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("count", &self.len())
            .finish()
    }
}
