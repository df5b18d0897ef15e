use std::{collections::HashMap, time::Duration};

use log::info;

use crate::{
    key_generator::KeyGenerator,
    types::{ClassId, ConnectionId, EntityId},
    world::{entity_record::EntityRecord, instance::Instance},
};

/// How long a released entity id is withheld before it may be generated
/// again, so no holder can confuse a recycled id with its previous owner.
const ENTITY_ID_RECYCLE_TTL: Duration = Duration::from_secs(60);

/// Owns entity identity: the arena of dynamic records indexed by entity id,
/// and allocation/release of ids. Exclusively owned by the tick thread.
pub struct EntityRegistry {
    generator: KeyGenerator<EntityId>,
    records: HashMap<EntityId, EntityRecord>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            generator: KeyGenerator::new(ENTITY_ID_RECYCLE_TTL),
            records: HashMap::new(),
        }
    }

    /// Register a locally-owned entity, allocating its id.
    pub fn register(&mut self, instance: Box<dyn Instance>, class: ClassId) -> EntityId {
        let entity = self.generator.generate();
        if self.records.contains_key(&entity) {
            panic!("Entity id generator produced an id that is still registered!");
        }
        info!("EntityRegistry: registered entity {:?} of class {:?}", entity, class);
        self.records
            .insert(entity, EntityRecord::new(class, instance, None));
        entity
    }

    /// Register an entity replicated from a connection, under the id the
    /// authority assigned. The id belongs to the remote allocator and is
    /// never recycled locally.
    pub fn register_remote(
        &mut self,
        entity: EntityId,
        instance: Box<dyn Instance>,
        class: ClassId,
        origin: ConnectionId,
    ) {
        if self.records.contains_key(&entity) {
            panic!("Cannot register remote entity {:?}: id is already registered!", entity);
        }
        self.records
            .insert(entity, EntityRecord::new(class, instance, Some(origin)));
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.records.contains_key(&entity)
    }

    pub fn record(&self, entity: EntityId) -> Option<&EntityRecord> {
        self.records.get(&entity)
    }

    pub fn record_mut(&mut self, entity: EntityId) -> Option<&mut EntityRecord> {
        self.records.get_mut(&entity)
    }

    /// Swap the entity's local instance, returning the old one. The entity
    /// remains the same logical entity.
    pub fn replace_instance(
        &mut self,
        entity: EntityId,
        instance: Box<dyn Instance>,
        class: ClassId,
    ) -> Box<dyn Instance> {
        let record = self
            .records
            .get_mut(&entity)
            .expect("Cannot replace instance of an entity which is not registered!");
        record.replace_instance(instance, class)
    }

    /// Remove the entity and drop its dynamic record. Unregistering an id
    /// that is not registered is a caller contract violation.
    pub fn unregister(&mut self, entity: EntityId) -> EntityRecord {
        let record = self
            .records
            .remove(&entity)
            .expect("Cannot unregister an entity which is not registered!");
        if record.origin().is_none() {
            self.generator.recycle_key(&entity);
        }
        info!("EntityRegistry: unregistered entity {:?}", entity);
        record
    }

    /// Ids of all currently-registered entities.
    pub fn entities(&self) -> Vec<EntityId> {
        self.records.keys().copied().collect()
    }

    /// Ids of all entities replicated from the given connection.
    pub fn entities_from(&self, origin: ConnectionId) -> Vec<EntityId> {
        self.records
            .iter()
            .filter(|(_, record)| record.origin() == Some(origin))
            .map(|(entity, _)| *entity)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
