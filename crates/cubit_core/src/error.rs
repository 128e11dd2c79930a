//! # ECS Error Types
//!
//! All usage errors the ECS core can report.
//!
//! None of these tear down the caller: the operation that produced one is
//! skipped, the error is logged where it was detected, and the caller decides
//! whether the broader operation should go on.

use thiserror::Error;

/// Errors that can occur while using the ECS.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A structural operation referenced an entity that is not alive.
    #[error("entity {index} (generation {generation}) doesn't exist")]
    DeadEntity {
        /// Index of the stale handle.
        index: u32,
        /// Generation of the stale handle.
        generation: u32,
    },

    /// A component type was used before being registered.
    #[error("component '{0}' is not registered")]
    UnregisteredComponent(&'static str),

    /// Two different types tried to register under the same component name.
    #[error("component name '{0}' is already taken by another type")]
    DuplicateComponentName(&'static str),

    /// No more component ids fit in an entity mask.
    #[error("component limit reached: at most {0} component types can be registered")]
    ComponentLimitReached(usize),

    /// A resource type was registered twice.
    #[error("resource '{0}' is already registered")]
    ResourceAlreadyRegistered(&'static str),

    /// A resource type was accessed before being registered.
    #[error("resource '{0}' is not registered")]
    UnregisteredResource(&'static str),

    /// A query requested the same component type more than once.
    #[error("component '{0}' is requested more than once in the same query")]
    ConflictingAccess(&'static str),

    /// A component storage is already locked in an incompatible mode.
    #[error("storage of component '{0}' is already borrowed")]
    StorageBorrowed(&'static str),

    /// A package named a component no registered type answers to.
    #[error("unknown component '{0}'")]
    UnknownComponent(String),

    /// A component value could not be converted to or from a package value.
    #[error("package error: {0}")]
    Package(String),

    /// Invalid world configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
