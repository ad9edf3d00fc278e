//! # Service Tree - Configuration-Driven Service Container
//!
//! A dependency injection container whose wiring lives in configuration
//! documents rather than code. Types describe how they can be built
//! (constructor parameters, factory methods, setter methods); a keyed
//! configuration says which arguments, dependencies and post-construction
//! calls each service gets.
//!
//! ## Features
//!
//! - **Config-driven** - JSON or TOML service definitions, merged along the
//!   type hierarchy
//! - **Autowiring** - service parameters resolve by type name, through the
//!   container tree
//! - **Nested scopes** - a service's `services` map becomes a private child
//!   container that falls back to its parent
//! - **Lazy and wrapped services** - deferred construction on first use
//! - **Environment interpolation** - `{ENV(NAME,default):int}` markers in
//!   string arguments
//! - **Lock-free** - `DashMap` caches, safe to share across threads
//! - **Observable** - optional `tracing` events under the `service_tree`
//!   target
//!
//! ## Quick Start
//!
//! ```rust
//! use service_tree::{Container, Param, RawConfig, ServiceType, TypeRegistry};
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: std::sync::Arc<Database>,
//! }
//!
//! let types = TypeRegistry::new()
//!     .with(
//!         ServiceType::named::<Database>("Database")
//!             .constructor([Param::value("url")], |args| {
//!                 Ok(Database { url: args.string("url")? })
//!             }),
//!     )
//!     .with(
//!         ServiceType::named::<UserService>("UserService")
//!             .constructor([Param::service("db", "Database")], |args| {
//!                 Ok(UserService { db: args.service("db")? })
//!             }),
//!     );
//!
//! let config = RawConfig::from_toml_str(
//!     r#"
//!     [Database.arguments]
//!     url = "postgres://localhost"
//!     "#,
//! )
//! .unwrap();
//!
//! let container = Container::new(types, config);
//! let users = container.get_as::<UserService>("UserService").unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! ## Nested Scopes
//!
//! ```rust
//! use service_tree::{Container, Param, RawConfig, ServiceType, TypeRegistry};
//! use serde_json::json;
//!
//! struct Greeting(String);
//!
//! struct Greeter {
//!     greeting: std::sync::Arc<Greeting>,
//! }
//!
//! let types = TypeRegistry::new()
//!     .with(
//!         ServiceType::named::<Greeting>("Greeting")
//!             .constructor([Param::value("text").default_value("hello")], |args| {
//!                 Ok(Greeting(args.string("text")?))
//!             }),
//!     )
//!     .with(
//!         ServiceType::named::<Greeter>("Greeter")
//!             .constructor([Param::service("greeting", "Greeting")], |args| {
//!                 Ok(Greeter { greeting: args.service("greeting")? })
//!             }),
//!     );
//!
//! // Greeter sees its own Greeting; everything else sees the default one.
//! let config = RawConfig::new().with(
//!     "Greeter",
//!     json!({"services": {"Greeting": {"arguments": {"text": "hi"}}}}),
//! );
//!
//! let container = Container::new(types, config);
//! let greeter = container.get_as::<Greeter>("Greeter").unwrap();
//! assert_eq!(greeter.greeting.0, "hi");
//! assert_eq!(container.get_as::<Greeting>("Greeting").unwrap().0, "hello");
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - `tracing` events (default)
//! - `logging-json` - JSON log output via `tracing-subscriber`
//! - `logging-pretty` - human-readable log output via `tracing-subscriber`

mod binder;
mod config;
mod container;
mod env;
mod error;
mod factory;
mod lazy;
#[cfg(feature = "logging")]
pub mod logging;
mod param;
mod provider;
mod scope;
mod storage;
mod value;

#[cfg(test)]
mod testing;

pub use binder::Arguments;
pub use config::{FactoryConfig, MethodCall, RawConfig, ServiceConfig};
pub use container::{CONTAINER_SERVICE, Container, ContainerBuilder, ContainerRef};
pub use env::{Environment, Interpolated, ProcessEnvironment, interpolate};
pub use error::{DiError, Result};
pub use lazy::{LazyService, WrappedService};
pub use provider::{
    Constructor, Injectable, Method, Param, ParamKind, ServiceType, ServiceTypeBuilder,
    TypeRegistry,
};
pub use scope::Scope;
pub use value::{Instance, Value};

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Arguments, Container, DiError, Injectable, Instance, Param, RawConfig, Result,
        ServiceType, TypeRegistry, Value,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    struct Database {
        url: String,
    }

    fn types() -> TypeRegistry {
        TypeRegistry::new().with(
            ServiceType::named::<Database>("Database").constructor(
                [Param::value("url").default_value("sqlite::memory:")],
                |args| {
                    Ok(Database {
                        url: args.string("url")?,
                    })
                },
            ),
        )
    }

    #[test]
    fn test_default_arguments() {
        let container = Container::new(types(), RawConfig::new());
        let db = container.get_as::<Database>("Database").unwrap();
        assert_eq!(db.url, "sqlite::memory:");
    }

    #[test]
    fn test_json_config() {
        let config =
            RawConfig::from_json_str(r#"{"Database": {"arguments": {"url": "postgres://db"}}}"#)
                .unwrap();
        let container = Container::new(types(), config);
        assert_eq!(container.get_as::<Database>("Database").unwrap().url, "postgres://db");
    }

    #[test]
    fn test_named_service_over_type() {
        let config = RawConfig::new().with(
            "replica",
            json!({"use": "Database", "arguments": {"url": "postgres://replica"}}),
        );
        let container = Container::new(types(), config);

        let replica = container.get_as::<Database>("replica").unwrap();
        let primary = container.get_as::<Database>("Database").unwrap();
        assert_eq!(replica.url, "postgres://replica");
        assert_eq!(primary.url, "sqlite::memory:");
    }

    #[test]
    fn test_make_is_never_cached() {
        let container = Container::new(types(), RawConfig::new());
        let cached = container.get("Database").unwrap();

        let mut overrides = BTreeMap::new();
        overrides.insert("url".to_owned(), Value::from("postgres://fresh"));
        let fresh = container.make("Database", overrides).unwrap();

        assert_eq!(fresh.resolve::<Database>().unwrap().url, "postgres://fresh");
        assert!(!fresh.ptr_eq(&cached));
        assert!(container.get("Database").unwrap().ptr_eq(&cached));
    }

    #[test]
    fn test_not_found_error() {
        let container = Container::new(types(), RawConfig::new());
        let err = container.get("Cache").unwrap_err();
        assert!(err.is_not_found("Cache"));
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let container = Container::new(TypeRegistry::new(), RawConfig::new());
        container.add("answer", 42_i64).unwrap();
        let answer: Arc<i64> = container.get_as("answer").unwrap();
        assert_eq!(*answer, 42);
    }
}
