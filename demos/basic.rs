//! Wiring a small mail stack from a TOML document
//!
//! ```bash
//! SMTP_PORT=2525 cargo run --example basic
//! ```

use service_tree::{Container, Param, RawConfig, ServiceType, TypeRegistry};
use std::sync::Arc;

struct Transport {
    host: String,
    port: i64,
}

struct Mailer {
    transport: Arc<Transport>,
    from: parking_lot::RwLock<String>,
}

const CONFIG: &str = r#"
[Transport.arguments]
host = "{ENV(SMTP_HOST,localhost)}"
port = "{ENV(SMTP_PORT,25):int}"

[Mailer]
calls = [{ method = "setFrom", arguments = { from = "noreply@example.com" } }]

[newsletter]
use = "Mailer"
calls = [{ method = "setFrom", arguments = { from = "news@example.com" } }]
"#;

fn types() -> TypeRegistry {
    TypeRegistry::new()
        .with(ServiceType::named::<Transport>("Transport").constructor(
            [Param::value("host"), Param::value("port")],
            |args| {
                Ok(Transport {
                    host: args.string("host")?,
                    port: args.int("port")?,
                })
            },
        ))
        .with(
            ServiceType::named::<Mailer>("Mailer")
                .constructor([Param::service("transport", "Transport")], |args| {
                    Ok(Mailer {
                        transport: args.service("transport")?,
                        from: parking_lot::RwLock::new(String::new()),
                    })
                })
                .method("setFrom", [Param::value("from")], |mailer, args| {
                    *mailer.from.write() = args.string("from")?;
                    Ok(())
                }),
        )
}

fn main() -> service_tree::Result<()> {
    let container = Container::new(types(), RawConfig::from_toml_str(CONFIG)?);

    for name in ["Mailer", "newsletter"] {
        let mailer = container.get_as::<Mailer>(name)?;
        println!(
            "{name}: {} via {}:{}",
            mailer.from.read(),
            mailer.transport.host,
            mailer.transport.port
        );
    }

    Ok(())
}
