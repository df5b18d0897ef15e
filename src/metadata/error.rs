use thiserror::Error;

use crate::metadata::filter::AuthorityTag;

/// Fatal configuration errors, raised while the metadata store is being
/// built. None of these are recoverable at runtime; startup must abort.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A pair or constructor referenced a class never registered by name
    #[error("Class '{name}' has not been registered")]
    UnknownClass { name: String },

    /// The same (local, connected) pair was registered twice
    #[error("Class pair ('{local}', '{connected}') is already registered")]
    DuplicatePair { local: String, connected: String },

    /// Two field declarations in one pair share a field id
    #[error("Field '{field}' is declared more than once for class pair ('{local}', '{connected}')")]
    DuplicateField {
        field: String,
        local: String,
        connected: String,
    },

    /// Fields sharing an update set id disagree on interval or reliability
    #[error("Fields '{first}' and '{second}' share update set {set} but declare different interval or reliability")]
    UpdateSetMismatch {
        set: u16,
        first: String,
        second: String,
    },

    /// A field resolves to the same non-Dominated tag on both sides of the
    /// pair, leaving no defined precedence
    #[error("Field '{field}' resolves to {tag:?} authority on both sides of class pair ('{local}', '{connected}')")]
    AmbiguousAuthority {
        field: String,
        tag: AuthorityTag,
        local: String,
        connected: String,
    },

    /// Two method declarations in one pair share a method id
    #[error("Method '{method}' is declared more than once for class pair ('{local}', '{connected}')")]
    DuplicateMethod {
        method: String,
        local: String,
        connected: String,
    },

    /// A constructor id was registered twice for one class
    #[error("Constructor {constructor} is already registered for class '{class}'")]
    DuplicateConstructor { constructor: u16, class: String },
}
