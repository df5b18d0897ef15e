use thiserror::Error;

use crate::types::ClassId;

/// Errors raised at the entity-registration boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The class id was never registered with the metadata store
    #[error("Class {class:?} has not been registered with the metadata store")]
    UnknownClass { class: ClassId },

    /// The class name carried by a wire message resolved to nothing
    #[error("Class name '{name}' has not been registered with the metadata store")]
    UnknownClassName { name: String },
}
