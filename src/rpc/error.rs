use thiserror::Error;

use crate::types::{ClassId, EntityId, MethodId};

/// Errors raised at the caller's boundary when sending a call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcSendError {
    /// No valid target connections remained after filtering
    #[error("No valid target connections for call")]
    NoTargets,

    /// The entity the call targets is not registered
    #[error("Entity {entity:?} is not registered")]
    UnknownEntity { entity: EntityId },

    /// No metadata pair exists for the caller's class and the target
    /// connection's class
    #[error("No metadata pair registered for ({local:?}, {connected:?})")]
    UnpairedClasses { local: ClassId, connected: ClassId },

    /// The method id is not declared for this class pair
    #[error("Method {method:?} is not declared for this class pair")]
    UnknownMethod { method: MethodId },
}
