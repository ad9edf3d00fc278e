//! Environment variable interpolation
//!
//! Strings may embed `{ENV(NAME)}` or `{ENV(NAME,default)}` markers, each
//! replaced by the variable's value (or the default when it is unset). A
//! trailing tag, `{ENV(PORT,25):int}`, coerces the value when the marker
//! makes up the whole string. Supported tags: `string`, `int`, `float`,
//! `bool`, `json`.

use crate::{DiError, Result, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static ENV_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{ENV\(([A-Za-z0-9_]+)(?:,([^}]*?))?\)(?::([a-z]+))?\}").expect("valid ENV pattern")
});

/// Source of environment variables.
pub trait Environment: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Result of interpolating one string
#[derive(Debug, Clone, PartialEq)]
pub enum Interpolated {
    /// Plain text, markers substituted
    Text(String),
    /// A single tagged marker made up the whole string
    Typed(Value),
}

#[derive(Debug, Clone, Copy)]
enum Cast {
    String,
    Int,
    Float,
    Bool,
    Json,
}

impl Cast {
    fn parse(tag: &str, service: &str) -> Result<Self> {
        match tag {
            "string" => Ok(Cast::String),
            "int" => Ok(Cast::Int),
            "float" => Ok(Cast::Float),
            "bool" => Ok(Cast::Bool),
            "json" => Ok(Cast::Json),
            other => Err(DiError::invalid(service, format!("unknown env coercion tag {other}"))),
        }
    }

    fn apply(self, raw: &str, service: &str) -> Result<Value> {
        let invalid = || DiError::invalid(service, format!("env value {raw:?} can not be cast to {self:?}"));

        match self {
            Cast::String => Ok(Value::String(raw.to_owned())),
            Cast::Int => raw.trim().parse().map(Value::Int).map_err(|_| invalid()),
            Cast::Float => raw.trim().parse().map(Value::Float).map_err(|_| invalid()),
            Cast::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Value::Bool(true)),
                "" | "0" | "false" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            Cast::Json => serde_json::from_str::<serde_json::Value>(raw)
                .map(Value::from)
                .map_err(|_| invalid()),
        }
    }
}

/// Replace every `ENV(...)` marker in `input`, left to right.
///
/// `service` is only used to attribute errors.
pub fn interpolate(input: &str, env: &dyn Environment, service: &str) -> Result<Interpolated> {
    let mut output = String::with_capacity(input.len());
    let mut last = 0;

    for caps in ENV_PATTERN.captures_iter(input) {
        let Some(marker) = caps.get(0) else {
            continue;
        };
        let variable = &caps[1];
        let cast = caps
            .get(3)
            .map(|tag| Cast::parse(tag.as_str(), service))
            .transpose()?;

        let raw = match (env.var(variable), caps.get(2)) {
            (Some(value), _) => value,
            (None, Some(default)) => default.as_str().to_owned(),
            (None, None) => return Err(DiError::env_not_found(variable)),
        };

        // embedded markers are substituted as text, uncoerced
        if let Some(cast) = cast {
            if marker.start() == 0 && marker.end() == input.len() {
                return cast.apply(&raw, service).map(Interpolated::Typed);
            }
        }

        output.push_str(&input[last..marker.start()]);
        output.push_str(&raw);
        last = marker.end();
    }

    if last == 0 {
        return Ok(Interpolated::Text(input.to_owned()));
    }

    output.push_str(&input[last..]);
    Ok(Interpolated::Text(output))
}
