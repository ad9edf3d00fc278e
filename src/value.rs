//! Type-erased service handles and resolved argument values

use crate::lazy::LazyService;
use crate::{DiError, Injectable, Result};
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A built service, erased to `Arc<dyn Any>`.
///
/// Cloning is an `Arc` clone: two clones of one instance are the same
/// object (see [`Instance::ptr_eq`]). Deferred placeholders present the type
/// of the service they will become, so method lookup and parent-service
/// matching work before the real instance exists.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl Instance {
    /// Wrap a value
    #[inline]
    pub fn new<T: Injectable>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an existing `Arc` without re-allocating
    #[inline]
    pub fn from_arc<T: Injectable>(value: Arc<T>) -> Self {
        Self {
            value,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Erased value presenting itself as another type (deferred placeholders)
    #[inline]
    pub(crate) fn presenting(
        value: Arc<dyn Any + Send + Sync>,
        type_id: TypeId,
        type_name: &'static str,
    ) -> Self {
        Self {
            value,
            type_id,
            type_name,
        }
    }

    /// `TypeId` of the presented type
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the presented type
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True if this is a deferred placeholder, realized or not
    #[inline]
    pub fn is_lazy(&self) -> bool {
        self.value.is::<LazyService>()
    }

    /// The deferred placeholder behind this handle, if any
    #[inline]
    pub fn as_lazy(&self) -> Option<Arc<LazyService>> {
        Arc::clone(&self.value).downcast::<LazyService>().ok()
    }

    /// Raw downcast. Does not look through deferred placeholders.
    #[inline]
    pub fn downcast<T: Injectable>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    /// Access the service as `T`.
    ///
    /// A deferred placeholder is materialized on the first call and the
    /// real instance is returned from then on.
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>> {
        if let Some(lazy) = self.as_lazy() {
            return lazy.instance()?.resolve::<T>();
        }

        self.downcast::<T>()
            .ok_or_else(|| DiError::type_mismatch::<T>(self.type_name))
    }

    /// Reference identity
    #[inline]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("lazy", &self.is_lazy())
            .finish()
    }
}

/// A resolved configuration value or injected service.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Service(Instance),
}

impl Value {
    /// Short kind name used in mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Service(_) => "service",
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_service(&self) -> Option<&Instance> {
        match self {
            Value::Service(instance) => Some(instance),
            _ => None,
        }
    }

    /// Wrap a service value
    #[inline]
    pub fn service<T: Injectable>(value: T) -> Self {
        Value::Service(Instance::new(value))
    }

    /// Convert back to plain JSON. Services have no JSON form.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;

        Some(match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect::<Option<serde_json::Map<_, _>>>()?,
            ),
            Value::Service(_) => return None,
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Service(a), Value::Service(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Literal conversion: no interpolation, no reference lookup
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::Service(instance)
    }
}
