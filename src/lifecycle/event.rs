use crate::types::{ClassId, EntityId};

/// Entity lifecycle notifications, dispatched synchronously at the mutation
/// that causes them.
///
/// `InstanceReplacing` fires while the old instance is still installed;
/// `InstanceReplaced` fires after the swap. `Removed` fires while the
/// dynamic record still exists; the record is dropped immediately after.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityEvent {
    Registered { entity: EntityId, class: ClassId },
    InstanceReplacing { entity: EntityId, class: ClassId },
    InstanceReplaced { entity: EntityId, class: ClassId },
    Removed { entity: EntityId, class: ClassId },
}

impl EntityEvent {
    pub fn entity(&self) -> EntityId {
        match self {
            EntityEvent::Registered { entity, .. }
            | EntityEvent::InstanceReplacing { entity, .. }
            | EntityEvent::InstanceReplaced { entity, .. }
            | EntityEvent::Removed { entity, .. } => *entity,
        }
    }

    pub fn class(&self) -> ClassId {
        match self {
            EntityEvent::Registered { class, .. }
            | EntityEvent::InstanceReplacing { class, .. }
            | EntityEvent::InstanceReplaced { class, .. }
            | EntityEvent::Removed { class, .. } => *class,
        }
    }
}
