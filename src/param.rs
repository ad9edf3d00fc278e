//! Configuration value resolution
//!
//! Strings go through `ENV(...)` interpolation first. The result is then
//! checked for the two brace forms: `{{name}}` is an escaped literal and
//! yields the text `{name}`, `{name}` is a reference to another service.
//! Lists and maps are resolved element-wise.

use crate::env::{self, Interpolated};
use crate::{Container, Result, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as Json;

#[cfg(feature = "logging")]
use tracing::trace;

static REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\{([^{}]+)\}$").expect("valid reference pattern"));
static ESCAPED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\{\{([^{}]+)\}\}$").expect("valid escape pattern"));

/// Service name inside a `{name}` reference
pub(crate) fn reference(input: &str) -> Option<&str> {
    REFERENCE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Literal text of a `{{name}}` escape, braces reduced to one pair
pub(crate) fn escaped(input: &str) -> Option<String> {
    ESCAPED
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| format!("{{{}}}", m.as_str()))
}

impl Container {
    /// Resolve one raw configuration value on behalf of `service`.
    pub(crate) fn parse_param(&self, raw: &Json, service: &str) -> Result<Value> {
        match raw {
            Json::String(s) => self.parse_string(s, service),
            Json::Array(items) => items
                .iter()
                .map(|item| self.parse_param(item, service))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Json::Object(map) => map
                .iter()
                .map(|(key, item)| Ok((key.clone(), self.parse_param(item, service)?)))
                .collect::<Result<_>>()
                .map(Value::Map),
            other => Ok(Value::from(other.clone())),
        }
    }

    fn parse_string(&self, input: &str, service: &str) -> Result<Value> {
        let text = match env::interpolate(input, self.env(), service)? {
            Interpolated::Typed(value) => return Ok(value),
            Interpolated::Text(text) => text,
        };

        if let Some(literal) = escaped(&text) {
            return Ok(Value::String(literal));
        }

        if let Some(name) = reference(&text) {
            #[cfg(feature = "logging")]
            trace!(
                target: "service_tree",
                service = service,
                reference = name,
                "Resolving service reference"
            );

            return self.traverse_tree(service, name).map(Value::Service);
        }

        Ok(Value::String(text))
    }
}
