//! Error types for service resolution

use thiserror::Error;

/// Errors that can occur while compiling configuration or resolving services
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// Service is neither cached, registered, configured nor buildable
    /// anywhere in the container tree
    #[error("Service {name} was not found in service tree")]
    ServiceNotFound { name: String },

    /// Attempted to register a service that has already been realized
    #[error("Service {name} is already registered")]
    ServiceAlreadyExists { name: String },

    /// The configuration of a service cannot be turned into an instance
    #[error("Invalid configuration for service {service}: {reason}")]
    InvalidConfiguration { service: String, reason: String },

    /// `{ENV(NAME)}` referenced an unset variable without a default
    #[error("Env variable {variable} required but it is neither set nor a default value exists")]
    EnvVariableNotFound { variable: String },

    /// A type declared itself as a direct dependency
    #[error("Type {type_name} can not depend on itself")]
    SelfDependency { type_name: String },

    /// A bound argument was not of the kind the constructor or method expected
    #[error("Argument {argument} has unexpected kind: expected {expected}, found {found}")]
    ArgumentMismatch {
        argument: String,
        expected: &'static str,
        found: &'static str,
    },

    /// An instance was downcast to the wrong Rust type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A configuration document could not be parsed
    #[error("Failed to parse {format} configuration: {reason}")]
    ConfigParse {
        format: &'static str,
        reason: String,
    },

    /// The parent container of a scope was dropped
    #[error("Parent container has been dropped")]
    ParentDropped,

    /// A deferred or wrapped service outlived the container that owns it
    #[error("Container of service {name} has been dropped")]
    ContainerDropped { name: String },
}

impl DiError {
    /// Create a ServiceNotFound error
    #[inline]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::ServiceNotFound { name: name.into() }
    }

    /// Create a ServiceAlreadyExists error
    #[inline]
    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::ServiceAlreadyExists { name: name.into() }
    }

    /// Create an InvalidConfiguration error
    #[inline]
    pub fn invalid(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Create an EnvVariableNotFound error
    #[inline]
    pub fn env_not_found(variable: impl Into<String>) -> Self {
        Self::EnvVariableNotFound {
            variable: variable.into(),
        }
    }

    /// Create a SelfDependency error
    #[inline]
    pub fn self_dependency(type_name: impl Into<String>) -> Self {
        Self::SelfDependency {
            type_name: type_name.into(),
        }
    }

    /// Create a TypeMismatch error for target type `T`
    #[inline]
    pub fn type_mismatch<T: ?Sized + 'static>(found: &'static str) -> Self {
        Self::TypeMismatch {
            expected: std::any::type_name::<T>(),
            found,
        }
    }

    /// True if this error reports that `name` itself is missing, as opposed
    /// to one of its dependencies
    #[inline]
    pub fn is_not_found(&self, name: &str) -> bool {
        matches!(self, Self::ServiceNotFound { name: missing } if missing == name)
    }

    /// Self-dependency is never recovered from, not even by a `null` default
    #[inline]
    pub fn is_self_dependency(&self) -> bool {
        matches!(self, Self::SelfDependency { .. })
    }
}

/// Result type alias for container operations
pub type Result<T> = std::result::Result<T, DiError>;
