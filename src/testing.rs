//! Fixture types shared by the unit tests

use crate::{
    CONTAINER_SERVICE, Container, ContainerRef, DiError, Instance, Param, RawConfig, Result,
    ServiceType, TypeRegistry,
};
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;

pub struct StringArguments {
    foo: RwLock<String>,
}

impl StringArguments {
    pub fn new(foo: impl Into<String>) -> Self {
        Self {
            foo: RwLock::new(foo.into()),
        }
    }

    pub fn foo(&self) -> String {
        self.foo.read().clone()
    }

    pub fn set_foo(&self, foo: impl Into<String>) {
        *self.foo.write() = foo.into();
    }
}

/// Abstract: registered without a constructor
#[allow(dead_code)]
pub struct StringArgumentsInterface;

pub struct StringArgumentsChild {
    foo: RwLock<String>,
}

impl StringArgumentsChild {
    pub fn foo(&self) -> String {
        self.foo.read().clone()
    }

    pub fn is_child(&self) -> bool {
        true
    }
}

pub struct StringArgumentsComplex {
    bar: RwLock<String>,
    foo: RwLock<String>,
}

#[derive(Deserialize)]
struct FooBar {
    foo: String,
    bar: String,
}

impl StringArgumentsComplex {
    pub fn foo(&self) -> String {
        self.foo.read().clone()
    }

    pub fn bar(&self) -> String {
        self.bar.read().clone()
    }
}

pub struct StringArgumentsComplexChild {
    foo: RwLock<String>,
    bar: String,
    foobar: String,
}

impl StringArgumentsComplexChild {
    pub fn foo(&self) -> String {
        self.foo.read().clone()
    }

    pub fn bar(&self) -> &str {
        &self.bar
    }

    pub fn foobar(&self) -> &str {
        &self.foobar
    }

    pub fn is_child(&self) -> bool {
        true
    }
}

pub struct IntArguments {
    foo: RwLock<i64>,
}

impl IntArguments {
    pub fn foo(&self) -> i64 {
        *self.foo.read()
    }
}

pub struct ClassDependencyRequiredArguments {
    foo: Instance,
}

impl ClassDependencyRequiredArguments {
    pub fn dependency(&self) -> &Instance {
        &self.foo
    }

    pub fn foo(&self) -> Result<String> {
        foo_of(&self.foo)
    }
}

pub struct InterfaceDependencyRequiredArguments {
    foo: Instance,
}

impl InterfaceDependencyRequiredArguments {
    pub fn dependency(&self) -> &Instance {
        &self.foo
    }

    pub fn foo(&self) -> Result<String> {
        foo_of(&self.foo)
    }
}

/// Never constructible: its only parameter is itself
#[allow(dead_code)]
pub struct ClassDependencySelf {
    foo: Instance,
}

pub struct ClassDependencyOptionalArguments {
    foo: RwLock<Option<Instance>>,
}

impl ClassDependencyOptionalArguments {
    pub fn dependency(&self) -> Option<Instance> {
        self.foo.read().clone()
    }

    pub fn foo(&self) -> Result<String> {
        let dependency = self.dependency().ok_or_else(|| DiError::not_found("StringArguments"))?;
        foo_of(&dependency)
    }
}

pub struct Mailer {
    host: String,
    plugin: RwLock<Option<Arc<Plugin>>>,
}

impl Mailer {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn plugin(&self) -> Option<Arc<Plugin>> {
        self.plugin.read().clone()
    }
}

/// Depends on the service that owns its scope
pub struct Plugin {
    owner: Instance,
}

impl Plugin {
    pub fn owner(&self) -> &Instance {
        &self.owner
    }

    pub fn owner_host(&self) -> Result<String> {
        Ok(self.owner.resolve::<Mailer>()?.host().to_owned())
    }
}

pub struct Transport {
    host: String,
    port: i64,
}

impl Transport {
    pub fn dsn(&self) -> String {
        format!("smtp://{}:{}", self.host, self.port)
    }
}

/// Depends on the container that builds it
pub struct ContainerAware {
    container: Arc<ContainerRef>,
}

impl ContainerAware {
    pub fn container(&self) -> &ContainerRef {
        &self.container
    }
}

/// `foo` of any of the string-argument fixtures
pub fn foo_of(instance: &Instance) -> Result<String> {
    let instance = match instance.as_lazy() {
        Some(lazy) => lazy.instance()?,
        None => instance.clone(),
    };

    if let Some(s) = instance.downcast::<StringArguments>() {
        return Ok(s.foo());
    }
    if let Some(s) = instance.downcast::<StringArgumentsChild>() {
        return Ok(s.foo());
    }
    if let Some(s) = instance.downcast::<StringArgumentsComplexChild>() {
        return Ok(s.foo());
    }
    if let Some(s) = instance.downcast::<StringArgumentsComplex>() {
        return Ok(s.foo());
    }

    Err(DiError::type_mismatch::<StringArguments>(instance.type_name()))
}

pub fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .with(
            ServiceType::named::<StringArguments>("StringArguments")
                .constructor([Param::value("foo").default_value("foo")], |args| {
                    Ok(StringArguments::new(args.string("foo")?))
                })
                .method("setFoo", [Param::value("foo")], |s, args| {
                    s.set_foo(args.string("foo")?);
                    Ok(())
                })
                .method_returning("getFoo", [], |s, _| Ok(s.foo())),
        )
        .with(ServiceType::named::<StringArgumentsInterface>("StringArgumentsInterface"))
        .with(
            ServiceType::named::<StringArgumentsChild>("StringArgumentsChild")
                .implements("StringArguments")
                .implements("StringArgumentsInterface")
                .constructor([Param::value("foo").default_value("foo")], |args| {
                    Ok(StringArgumentsChild {
                        foo: RwLock::new(args.string("foo")?),
                    })
                })
                .method("setFoo", [Param::value("foo")], |s, args| {
                    *s.foo.write() = args.string("foo")?;
                    Ok(())
                }),
        )
        .with(
            ServiceType::named::<StringArgumentsComplex>("StringArgumentsComplex")
                .constructor([Param::value("bar"), Param::value("foo")], |args| {
                    Ok(StringArgumentsComplex {
                        bar: RwLock::new(args.string("bar")?),
                        foo: RwLock::new(args.string("foo")?),
                    })
                })
                .method("setFoo", [Param::value("foo")], |s, args| {
                    *s.foo.write() = args.string("foo")?;
                    Ok(())
                })
                .method("setBar", [Param::value("bar")], |s, args| {
                    *s.bar.write() = args.string("bar")?;
                    Ok(())
                })
                .method("setFooBar", [Param::value("foobar")], |s, args| {
                    let foobar: FooBar = args.deserialize("foobar")?;
                    *s.bar.write() = foobar.bar;
                    *s.foo.write() = foobar.foo;
                    Ok(())
                }),
        )
        .with(
            ServiceType::named::<StringArgumentsComplexChild>("StringArgumentsComplexChild")
                .implements("StringArguments")
                .implements("StringArgumentsInterface")
                .constructor(
                    [
                        Param::value("foo").default_value("foo"),
                        Param::value("bar").default_value("bar"),
                        Param::value("foobar").default_value("foobar"),
                    ],
                    |args| {
                        Ok(StringArgumentsComplexChild {
                            foo: RwLock::new(args.string("foo")?),
                            bar: args.string("bar")?,
                            foobar: args.string("foobar")?,
                        })
                    },
                )
                .method("setFoo", [Param::value("foo")], |s, args| {
                    *s.foo.write() = args.string("foo")?;
                    Ok(())
                }),
        )
        .with(
            ServiceType::named::<IntArguments>("IntArguments")
                .constructor([Param::value("foo").default_value(0)], |args| {
                    Ok(IntArguments {
                        foo: RwLock::new(args.int("foo")?),
                    })
                })
                .method("setFoo", [Param::value("foo")], |s, args| {
                    *s.foo.write() = args.int("foo")?;
                    Ok(())
                }),
        )
        .with(
            ServiceType::named::<ClassDependencyRequiredArguments>("ClassDependencyRequiredArguments")
                .constructor([Param::service("foo", "StringArguments")], |args| {
                    Ok(ClassDependencyRequiredArguments {
                        foo: args.instance("foo")?,
                    })
                }),
        )
        .with(
            ServiceType::named::<InterfaceDependencyRequiredArguments>("InterfaceDependencyRequiredArguments")
                .constructor([Param::service("foo", "StringArgumentsInterface")], |args| {
                    Ok(InterfaceDependencyRequiredArguments {
                        foo: args.instance("foo")?,
                    })
                }),
        )
        .with(
            ServiceType::named::<ClassDependencySelf>("ClassDependencySelf")
                .constructor([Param::service("foo", "ClassDependencySelf")], |args| {
                    Ok(ClassDependencySelf {
                        foo: args.instance("foo")?,
                    })
                }),
        )
        .with(
            ServiceType::named::<ClassDependencyOptionalArguments>("ClassDependencyOptionalArguments")
                .constructor([Param::service("foo", "StringArguments").optional()], |args| {
                    Ok(ClassDependencyOptionalArguments {
                        foo: RwLock::new(args.optional_instance("foo")?),
                    })
                })
                .method("setFoo", [Param::service("foo", "StringArguments")], |s, args| {
                    *s.foo.write() = Some(args.instance("foo")?);
                    Ok(())
                }),
        )
        .with(
            ServiceType::named::<Mailer>("Mailer")
                .implements("MailerInterface")
                .constructor([Param::value("host").default_value("localhost")], |args| {
                    Ok(Mailer {
                        host: args.string("host")?,
                        plugin: RwLock::new(None),
                    })
                })
                .method("attach", [Param::service("plugin", "Plugin")], |mailer, args| {
                    *mailer.plugin.write() = Some(args.service::<Plugin>("plugin")?);
                    Ok(())
                })
                .method_returning("transport", [], |mailer, _| {
                    Ok(Transport {
                        host: mailer.host.clone(),
                        port: 25,
                    })
                }),
        )
        .with(
            ServiceType::named::<Plugin>("Plugin")
                .constructor([Param::service("owner", "MailerInterface")], |args| {
                    Ok(Plugin {
                        owner: args.instance("owner")?,
                    })
                }),
        )
        .with(
            ServiceType::named::<ContainerAware>("ContainerAware")
                .constructor([Param::service("container", CONTAINER_SERVICE)], |args| {
                    Ok(ContainerAware {
                        container: args.service("container")?,
                    })
                }),
        )
        .with(ServiceType::named::<Transport>("Transport").factory(
            "smtp",
            [
                Param::value("host").default_value("localhost"),
                Param::value("port").default_value(25),
            ],
            |args| {
                Ok(Transport {
                    host: args.string("host")?,
                    port: args.int("port")?,
                })
            },
        ))
}

pub fn container(config: RawConfig) -> Container {
    Container::new(registry(), config)
}
