//! Service configuration
//!
//! [`RawConfig`] is what callers hand to a container node: service name to a
//! loosely-typed fragment. [`ServiceConfig`] is the compiled, defaulted
//! record for one service after the supertype merge walk.

use crate::env::{self, Environment, Interpolated};
use crate::param;
use crate::provider::TypeRegistry;
use crate::{DiError, Result, Value};
use ahash::RandomState;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Per-service configuration fragments, keyed by service name.
///
/// # Examples
///
/// ```rust
/// use service_tree::RawConfig;
///
/// let config = RawConfig::from_toml_str(r#"
///     [Mailer]
///     singleton = true
///     arguments = { host = "{ENV(SMTP_HOST,localhost)}" }
/// "#).unwrap();
///
/// assert!(config.has("Mailer"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawConfig(Map<String, Json>);

impl RawConfig {
    /// Empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document whose top level is an object
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| DiError::ConfigParse {
            format: "JSON",
            reason: e.to_string(),
        })
    }

    /// Parse a TOML document, one table per service
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| DiError::ConfigParse {
            format: "TOML",
            reason: e.to_string(),
        })
    }

    /// Wrap a JSON value, which must be an object
    pub fn from_value(value: Json) -> Result<Self> {
        match value {
            Json::Object(map) => Ok(Self(map)),
            other => Err(DiError::ConfigParse {
                format: "JSON",
                reason: format!("expected an object of services, found {other}"),
            }),
        }
    }

    /// True if a fragment is registered under `name`
    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// The raw fragment registered under `name`
    #[inline]
    pub fn fragment(&self, name: &str) -> Option<&Json> {
        self.0.get(name)
    }

    /// Set the fragment for `name`, replacing any previous one
    pub fn insert(&mut self, name: impl Into<String>, fragment: Json) -> &mut Self {
        self.0.insert(name.into(), fragment);
        self
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, name: impl Into<String>, fragment: Json) -> Self {
        self.insert(name, fragment);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Object fragment for `name`. Missing is empty, non-objects are rejected.
    fn object(&self, name: &str, service: &str) -> Result<Option<&Map<String, Json>>> {
        match self.0.get(name) {
            None | Some(Json::Null) => Ok(None),
            Some(Json::Object(map)) => Ok(Some(map)),
            Some(_) => Err(DiError::invalid(
                service,
                format!("configuration of {name} must be a map"),
            )),
        }
    }
}

impl From<Map<String, Json>> for RawConfig {
    fn from(map: Map<String, Json>) -> Self {
        Self(map)
    }
}

/// One setter injection (`calls`) or selection (`selects`) entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodCall {
    pub method: Option<String>,
    pub arguments: Map<String, Json>,
    /// Adopt the call's return value as the service
    pub select: bool,
}

/// Alternate construction through a type-level factory method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactoryConfig {
    /// Method on the service's own type, arguments from the service config
    Method(String),
    /// Method with its own `use` type and arguments
    Detailed {
        #[serde(default)]
        method: Option<String>,
        #[serde(rename = "use", default)]
        target: Option<String>,
        #[serde(default)]
        arguments: Map<String, Json>,
    },
}

impl FactoryConfig {
    pub fn method(&self) -> Option<&str> {
        match self {
            FactoryConfig::Method(method) => Some(method),
            FactoryConfig::Detailed { method, .. } => method.as_deref(),
        }
    }

    /// Type whose factory is invoked, if it differs from the service type
    pub fn target(&self) -> Option<&str> {
        match self {
            FactoryConfig::Method(_) => None,
            FactoryConfig::Detailed { target, .. } => target.as_deref(),
        }
    }

    /// Argument source for the factory call
    pub fn arguments<'a>(&'a self, service: &'a ServiceConfig) -> &'a Map<String, Json> {
        match self {
            FactoryConfig::Method(_) => &service.arguments,
            FactoryConfig::Detailed { arguments, .. } => arguments,
        }
    }
}

/// Compiled configuration of one service.
///
/// `singleton` keeps its historical meaning: `true` skips the instance
/// cache, so every lookup builds a fresh instance. The default `false`
/// shares one instance per node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    #[serde(skip)]
    target: String,
    pub singleton: bool,
    pub lazy: bool,
    pub merge: bool,
    pub wrap: bool,
    pub calls: Vec<Option<MethodCall>>,
    pub selects: Vec<MethodCall>,
    pub arguments: Map<String, Json>,
    pub services: RawConfig,
    pub factory: Option<FactoryConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            singleton: false,
            lazy: false,
            merge: true,
            wrap: false,
            calls: Vec::new(),
            selects: Vec::new(),
            arguments: Map::new(),
            services: RawConfig::new(),
            factory: None,
        }
    }
}

impl ServiceConfig {
    /// The interpolated `use` value: a type name or a `{reference}`
    #[inline]
    pub fn use_type(&self) -> &str {
        &self.target
    }

    /// Referenced service name when `use` is `{name}`
    #[inline]
    pub fn reference(&self) -> Option<&str> {
        param::reference(&self.target)
    }

    /// True if building this service opens a private child scope
    #[inline]
    pub fn has_services(&self) -> bool {
        !self.services.is_empty()
    }
}

/// Raw configuration of one node plus its compiled-config cache.
pub(crate) struct Config {
    raw: RawConfig,
    compiled: DashMap<String, Arc<ServiceConfig>, RandomState>,
}

impl Config {
    pub(crate) fn new(raw: RawConfig) -> Self {
        Self {
            raw,
            compiled: DashMap::with_hasher(RandomState::new()),
        }
    }

    #[inline]
    pub(crate) fn raw(&self) -> &RawConfig {
        &self.raw
    }

    #[inline]
    pub(crate) fn has(&self, name: &str) -> bool {
        self.raw.has(name)
    }

    #[inline]
    pub(crate) fn cached(&self, name: &str) -> Option<Arc<ServiceConfig>> {
        self.compiled.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Compiled configuration for `name`, memoized per node.
    ///
    /// `ancestors` holds the raw configuration of every ancestor node, root
    /// first.
    pub(crate) fn get(
        &self,
        name: &str,
        ancestors: &[&RawConfig],
        types: &TypeRegistry,
        env: &dyn Environment,
    ) -> Result<Arc<ServiceConfig>> {
        if let Some(compiled) = self.cached(name) {
            return Ok(compiled);
        }

        let compiled = Arc::new(self.compile(name, ancestors, types, env)?);

        #[cfg(feature = "logging")]
        debug!(
            target: "service_tree",
            service = name,
            use_type = compiled.use_type(),
            singleton = compiled.singleton,
            lazy = compiled.lazy,
            wrap = compiled.wrap,
            calls = compiled.calls.len(),
            "Compiled service configuration"
        );

        Ok(Arc::clone(
            self.compiled
                .entry(name.to_owned())
                .or_insert(compiled)
                .value(),
        ))
    }

    fn compile(
        &self,
        name: &str,
        ancestors: &[&RawConfig],
        types: &TypeRegistry,
        env: &dyn Environment,
    ) -> Result<ServiceConfig> {
        let fragment = self.raw.object(name, name)?.cloned().unwrap_or_default();
        let target = resolve_use(name, fragment.get("use"), env)?;

        if param::reference(&target).is_some() {
            return finish(name, target, fragment);
        }

        let merge = fragment.get("merge").and_then(Json::as_bool).unwrap_or(true);
        let Some(ty) = types.get(&target) else {
            if has_factory_type(&fragment) {
                return finish(name, target, fragment);
            }
            return Err(DiError::invalid(
                name,
                format!("{target} can not be resolved to a registered type"),
            ));
        };

        if !merge {
            return finish(name, target, fragment);
        }

        let mut merged = Map::new();
        for raw in ancestors.iter().copied().chain(std::iter::once(&self.raw)) {
            for supertype in ty.supertypes().iter().rev() {
                if let Some(layer) = raw.object(supertype, name)? {
                    replace_recursive(&mut merged, layer);
                }
            }
            if let Some(layer) = raw.object(name, name)? {
                replace_recursive(&mut merged, layer);
            }
        }

        finish(name, target, merged)
    }
}

/// Interpolate `use`, which must stay a string
fn resolve_use(name: &str, raw: Option<&Json>, env: &dyn Environment) -> Result<String> {
    let invalid = || DiError::invalid(name, "use must be a string");

    match raw {
        None | Some(Json::Null) => Ok(name.to_owned()),
        Some(Json::String(s)) => match env::interpolate(s, env, name)? {
            Interpolated::Text(target) | Interpolated::Typed(Value::String(target)) => Ok(target),
            Interpolated::Typed(_) => Err(invalid()),
        },
        Some(_) => Err(invalid()),
    }
}

fn has_factory_type(fragment: &Map<String, Json>) -> bool {
    fragment
        .get("factory")
        .and_then(|factory| factory.get("use"))
        .is_some_and(Json::is_string)
}

fn finish(name: &str, target: String, mut merged: Map<String, Json>) -> Result<ServiceConfig> {
    merged.remove("use");

    let mut config: ServiceConfig = serde_json::from_value(Json::Object(merged))
        .map_err(|e| DiError::invalid(name, e.to_string()))?;
    config.target = target;
    Ok(config)
}

/// Recursive replace: maps merge key by key, anything else is replaced.
pub(crate) fn replace_recursive(target: &mut Map<String, Json>, source: &Map<String, Json>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Json::Object(existing)), Json::Object(incoming)) => {
                replace_recursive(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ProcessEnvironment;
    use crate::testing;
    use serde_json::json;
    use std::collections::HashMap;

    fn compile(raw: RawConfig, name: &str) -> Result<Arc<ServiceConfig>> {
        Config::new(raw).get(name, &[], &testing::registry(), &ProcessEnvironment)
    }

    #[test]
    fn test_config_has() {
        let config = Config::new(RawConfig::new().with("StringArguments", json!({"arguments": {"foo": "bar"}})));
        assert!(config.has("StringArguments"));
        assert!(!config.has("IntArguments"));
    }

    #[test]
    fn test_config_get() {
        let raw = RawConfig::new().with("StringArguments", json!({"arguments": {"foo": "bar"}}));
        let service = compile(raw, "StringArguments").unwrap();

        assert_eq!(service.arguments["foo"], json!("bar"));
        assert_eq!(service.use_type(), "StringArguments");
    }

    #[test]
    fn test_config_get_defaults() {
        let raw = RawConfig::new().with("StringArguments", json!({}));
        let service = compile(raw, "StringArguments").unwrap();

        assert!(service.merge);
        assert!(!service.singleton);
        assert!(!service.lazy);
        assert!(!service.wrap);
        assert!(service.calls.is_empty());
        assert!(service.factory.is_none());
    }

    #[test]
    fn test_config_service_merge() {
        let raw = RawConfig::new()
            .with("StringArguments", json!({"arguments": {"foobar": "barfoo"}}))
            .with("StringArgumentsInterface", json!({"arguments": {"foo": "bar"}}))
            .with("StringArgumentsComplexChild", json!({"arguments": {"bar": "foo"}}));

        let service = compile(raw, "StringArgumentsComplexChild").unwrap();

        assert_eq!(service.arguments["foo"], json!("bar"));
        assert_eq!(service.arguments["bar"], json!("foo"));
        assert_eq!(service.arguments["foobar"], json!("barfoo"));
    }

    #[test]
    fn test_interface_fragment_loses_to_concrete() {
        let raw = RawConfig::new()
            .with("StringArgumentsInterface", json!({"arguments": {"bar": "interface"}, "lazy": true}))
            .with("StringArgumentsComplexChild", json!({"arguments": {"bar": "concrete"}}));

        let service = compile(raw, "StringArgumentsComplexChild").unwrap();

        assert_eq!(service.arguments["bar"], json!("concrete"));
        assert!(service.lazy);
    }

    #[test]
    fn test_config_service_merge_disabled() {
        let raw = RawConfig::new()
            .with("StringArgumentsInterface", json!({"arguments": {"bar": "foobar", "foo": "x"}}))
            .with("StringArgumentsComplexChild", json!({"arguments": {"bar": "foo"}, "merge": false}));

        let service = compile(raw, "StringArgumentsComplexChild").unwrap();

        assert_eq!(service.arguments["bar"], json!("foo"));
        assert!(!service.arguments.contains_key("foo"));
        assert!(!service.merge);
    }

    #[test]
    fn test_ancestor_nodes_apply_root_first() {
        let root = RawConfig::new().with(
            "StringArguments",
            json!({"arguments": {"foo": "root"}, "singleton": true}),
        );
        let local = Config::new(RawConfig::new().with("StringArguments", json!({"arguments": {"foo": "local"}})));

        let service = local
            .get("StringArguments", &[&root], &testing::registry(), &ProcessEnvironment)
            .unwrap();

        assert_eq!(service.arguments["foo"], json!("local"));
        assert!(service.singleton);
    }

    #[test]
    fn test_use_must_be_a_string() {
        let raw = RawConfig::new().with("StringArguments", json!({"use": ["IntArguments"]}));
        let err = compile(raw, "StringArguments").unwrap_err();
        assert!(matches!(err, DiError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_use_unknown_type() {
        let raw = RawConfig::new().with("mailer", json!({"use": "NoSuchType"}));
        let err = compile(raw, "mailer").unwrap_err();
        assert!(matches!(err, DiError::InvalidConfiguration { service, .. } if service == "mailer"));
    }

    #[test]
    fn test_use_is_interpolated() {
        let env = HashMap::from([("IMPL".to_owned(), "IntArguments".to_owned())]);
        let raw = RawConfig::new().with("counter", json!({"use": "{ENV(IMPL)}"}));

        let service = Config::new(raw)
            .get("counter", &[], &testing::registry(), &env)
            .unwrap();

        assert_eq!(service.use_type(), "IntArguments");
    }

    #[test]
    fn test_reference_skips_type_merge() {
        let raw = RawConfig::new()
            .with("StringArguments", json!({"arguments": {"foo": "typed"}}))
            .with("alias", json!({"use": "{StringArguments}", "calls": [{"method": "setFoo"}]}));

        let service = compile(raw, "alias").unwrap();

        assert_eq!(service.reference(), Some("StringArguments"));
        assert!(service.arguments.is_empty());
        assert_eq!(service.calls.len(), 1);
    }

    #[test]
    fn test_compiled_config_is_memoized() {
        let config = Config::new(RawConfig::new().with("StringArguments", json!({})));
        let types = testing::registry();

        let a = config.get("StringArguments", &[], &types, &ProcessEnvironment).unwrap();
        let b = config.get("StringArguments", &[], &types, &ProcessEnvironment).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_factory_forms() {
        let raw = RawConfig::new()
            .with("a", json!({"use": "Transport", "factory": "smtp"}))
            .with("b", json!({"factory": {"use": "Transport", "method": "smtp", "arguments": {"host": "x"}}}));

        let a = compile(raw.clone(), "a").unwrap();
        assert_eq!(a.factory.as_ref().and_then(FactoryConfig::method), Some("smtp"));

        let b = compile(raw, "b").unwrap();
        let factory = b.factory.as_ref().unwrap();
        assert_eq!(factory.target(), Some("Transport"));
        assert_eq!(factory.arguments(&b)["host"], json!("x"));
    }

    #[test]
    fn test_bad_field_type() {
        let raw = RawConfig::new().with("StringArguments", json!({"lazy": "sometimes"}));
        assert!(matches!(
            compile(raw, "StringArguments"),
            Err(DiError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_replace_recursive() {
        let mut target = json!({"arguments": {"a": 1, "b": [1, 2]}, "lazy": true});
        let source = json!({"arguments": {"b": [3]}, "lazy": false});

        replace_recursive(target.as_object_mut().unwrap(), source.as_object().unwrap());

        assert_eq!(target, json!({"arguments": {"a": 1, "b": [3]}, "lazy": false}));
    }

    #[test]
    fn test_loaders() {
        let toml = RawConfig::from_toml_str("[Mailer]\nsingleton = true\n").unwrap();
        let json = RawConfig::from_json_str(r#"{"Mailer": {"singleton": true}}"#).unwrap();
        assert_eq!(toml, json);

        assert!(matches!(
            RawConfig::from_json_str("[1, 2]"),
            Err(DiError::ConfigParse { format: "JSON", .. })
        ));
        assert!(RawConfig::from_value(json!("x")).is_err());
    }
}
