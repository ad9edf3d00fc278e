//! Argument binding for constructors, factory methods and setter calls

use crate::factory::BuildRequest;
use crate::provider::{Param, ParamKind};
use crate::{Container, DiError, Injectable, Instance, Result, Value};
use serde::de::DeserializeOwned;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Bound arguments, in parameter declaration order.
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    values: Vec<(String, Value)>,
}

impl Arguments {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Append a bound argument
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.values.push((name.into(), value));
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    /// Value by name, failing if the parameter was never bound
    pub fn value(&self, name: &str) -> Result<&Value> {
        self.get(name).ok_or_else(|| DiError::ArgumentMismatch {
            argument: name.to_owned(),
            expected: "bound argument",
            found: "nothing",
        })
    }

    pub fn string(&self, name: &str) -> Result<String> {
        match self.value(name)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch(name, "string", other)),
        }
    }

    pub fn optional_string(&self, name: &str) -> Result<Option<String>> {
        match self.value(name)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            other => Err(mismatch(name, "string or null", other)),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.value(name)? {
            Value::Int(i) => Ok(*i),
            other => Err(mismatch(name, "int", other)),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        match self.value(name)? {
            Value::Float(f) => Ok(*f),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(i) => Ok(*i as f64),
            other => Err(mismatch(name, "float", other)),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        match self.value(name)? {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch(name, "bool", other)),
        }
    }

    /// The injected service handle as bound, placeholders included
    pub fn instance(&self, name: &str) -> Result<Instance> {
        match self.value(name)? {
            Value::Service(instance) => Ok(instance.clone()),
            other => Err(mismatch(name, "service", other)),
        }
    }

    pub fn optional_instance(&self, name: &str) -> Result<Option<Instance>> {
        match self.value(name)? {
            Value::Null => Ok(None),
            Value::Service(instance) => Ok(Some(instance.clone())),
            other => Err(mismatch(name, "service or null", other)),
        }
    }

    /// The injected service as `T`. Materializes deferred placeholders.
    pub fn service<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        self.instance(name)?.resolve::<T>()
    }

    pub fn optional_service<T: Injectable>(&self, name: &str) -> Result<Option<Arc<T>>> {
        self.optional_instance(name)?
            .map(|instance| instance.resolve::<T>())
            .transpose()
    }

    /// Deserialize a structured value with serde
    pub fn deserialize<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.value(name)?;
        value
            .to_json()
            .and_then(|json| serde_json::from_value(json).ok())
            .ok_or_else(|| mismatch(name, std::any::type_name::<T>(), value))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }
}

fn mismatch(name: &str, expected: &'static str, found: &Value) -> DiError {
    DiError::ArgumentMismatch {
        argument: name.to_owned(),
        expected,
        found: found.kind(),
    }
}

impl Container {
    /// Bind declared parameters for `service`.
    ///
    /// Per parameter, first match wins: runtime override, configured
    /// argument, service-typed dependency, declared default, null if
    /// nullable.
    pub(crate) fn bind(
        &self,
        service: &str,
        method: &str,
        params: &[Param],
        arguments: &serde_json::Map<String, serde_json::Value>,
        request: Option<&BuildRequest>,
    ) -> Result<Arguments> {
        let mut bound = Arguments::with_capacity(params.len());

        for param in params {
            let name = param.name();

            let value = if let Some(value) = request.and_then(|r| r.override_for(name)) {
                value.clone()
            } else if let Some(raw) = arguments.get(name) {
                self.parse_param(raw, service)?
            } else if let ParamKind::Service(type_name) = param.kind() {
                self.resolve_service_argument(service, type_name, param)?
            } else if let Some(default) = param.default() {
                Value::from(default.clone())
            } else if param.is_nullable() {
                Value::Null
            } else {
                return Err(DiError::invalid(
                    service,
                    format!("no value found for argument {name} in method {method}"),
                ));
            };

            bound.push(name, value);
        }

        Ok(bound)
    }

    fn resolve_service_argument(&self, service: &str, type_name: &str, param: &Param) -> Result<Value> {
        if type_name == service {
            return Err(DiError::self_dependency(type_name));
        }

        match self.traverse_tree(service, type_name) {
            Ok(instance) => Ok(Value::Service(instance)),
            Err(err) if !err.is_self_dependency() && param.defaults_to_null() => {
                #[cfg(feature = "logging")]
                trace!(
                    target: "service_tree",
                    service = service,
                    argument = param.name(),
                    dependency = type_name,
                    error = %err,
                    "Dependency unavailable, falling back to null default"
                );
                Ok(Value::Null)
            }
            Err(err) => Err(err),
        }
    }
}
