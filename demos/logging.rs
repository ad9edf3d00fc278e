//! Example demonstrating logging capabilities
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```

use serde_json::json;
use service_tree::{Container, Param, RawConfig, ServiceType, TypeRegistry, WrappedService};

#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct UserService {
    name: String,
    db: std::sync::Arc<Database>,
}

#[allow(dead_code)]
struct RequestContext {
    request_id: String,
}

fn types() -> TypeRegistry {
    TypeRegistry::new()
        .with(
            ServiceType::named::<Database>("Database")
                .constructor([Param::value("url")], |args| {
                    Ok(Database {
                        url: args.string("url")?,
                    })
                }),
        )
        .with(
            ServiceType::named::<UserService>("UserService").constructor(
                [
                    Param::value("name").default_value("users"),
                    Param::service("db", "Database"),
                ],
                |args| {
                    Ok(UserService {
                        name: args.string("name")?,
                        db: args.service("db")?,
                    })
                },
            ),
        )
        .with(
            ServiceType::named::<RequestContext>("RequestContext").constructor(
                [Param::value("request_id").default_value("default")],
                |args| {
                    println!("  [App] Request context being created...");
                    Ok(RequestContext {
                        request_id: args.string("request_id")?,
                    })
                },
            ),
        )
}

fn main() -> service_tree::Result<()> {
    // JSON if logging-json is enabled, pretty if only logging-pretty is
    service_tree::logging::init();

    println!("=== Service Tree Logging Demo ===\n");

    let config = RawConfig::new()
        .with(
            "Database",
            json!({"arguments": {"url": "{ENV(DATABASE_URL,postgres://localhost/mydb)}"}}),
        )
        .with(
            "UserService",
            json!({"services": {"Database": {"arguments": {"url": "postgres://localhost/users"}}}}),
        )
        .with("RequestContext", json!({"lazy": true}))
        .with("request_factory", json!({"use": "RequestContext", "wrap": true, "lazy": false}));

    // logs: "Creating root container"
    let container = Container::new(types(), config);

    // logs: compilation, construction and caching of Database
    let _db = container.get("Database")?;

    // logs: child scope creation for UserService's private Database
    let users = container.get_as::<UserService>("UserService")?;
    println!("UserService uses {}", users.db.url);

    // logs: "Service not found in service tree"
    assert!(container.get("Missing").is_err());

    // A lazy placeholder: nothing is built until first use
    let ctx = container.get("RequestContext")?;
    println!("Lazy placeholder created, building now:");
    println!("request id: {}", ctx.resolve::<RequestContext>()?.request_id);

    // A wrapped service builds a new instance per call
    let factory = container.get_as::<WrappedService>("request_factory")?;
    factory.call()?;
    factory.call()?;

    // A user scope shadows its parent's configuration
    let request_scope = container.scope(
        RawConfig::new().with("RequestContext", json!({"arguments": {"request_id": "req-12345"}})),
    );
    let ctx = request_scope.get_as::<RequestContext>("RequestContext")?;
    println!("scoped request id: {}", ctx.request_id);

    println!("\n=== Demo Complete ===");
    Ok(())
}
