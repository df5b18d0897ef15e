use std::collections::HashMap;

use log::warn;

use crate::{
    connection::connection::Connection,
    messages::{
        interpreter::ValueInterpreter,
        value::Value,
        wire::{PackedValue, WireMessage},
    },
    metadata::{field::FieldDescriptor, store::MetadataStore},
    sync::authority::{combine, SyncBehavior},
    types::{ClassId, ClockMillis, ConnectionId, EntityId, FieldId, SetId},
    world::registry::EntityRegistry,
};

/// Drives the periodic read/send and receive/write cycles of the state
/// synchronization engine.
pub struct SyncEngine;

impl SyncEngine {
    /// One outbound pass. For every entity, running connections are grouped
    /// by their advertised class; each due update set is read once per
    /// group — hooks firing once per batch — and the resulting message is
    /// broadcast to every group member with the entity in scope.
    pub fn send_updates(
        now: ClockMillis,
        metadata: &MetadataStore,
        registry: &mut EntityRegistry,
        connections: &mut HashMap<ConnectionId, Connection>,
        interpreter: &dyn ValueInterpreter,
    ) {
        // shuffled so no connection is systematically served last
        let mut running: Vec<ConnectionId> = connections
            .values()
            .filter(|connection| connection.is_running())
            .map(|connection| connection.id())
            .collect();
        fastrand::shuffle(&mut running);

        let mut groups: Vec<(ClassId, Vec<ConnectionId>)> = Vec::new();
        for id in running {
            let class = connections[&id].remote_class();
            match groups.iter_mut().find(|(grouped, _)| *grouped == class) {
                Some((_, members)) => members.push(id),
                None => groups.push((class, vec![id])),
            }
        }

        let mut outgoing: Vec<(ConnectionId, WireMessage, bool)> = Vec::new();
        for entity in registry.entities() {
            for (remote_class, members) in &groups {
                let targets: Vec<ConnectionId> = members
                    .iter()
                    .copied()
                    .filter(|id| {
                        connections
                            .get(id)
                            .is_some_and(|connection| connection.has_in_scope(entity))
                    })
                    .collect();
                if targets.is_empty() {
                    continue;
                }

                let Some(record) = registry.record_mut(entity) else {
                    continue;
                };
                let Some(pair) = metadata.pair(record.class(), *remote_class) else {
                    continue;
                };

                for set_info in pair.sets() {
                    if !record.set_due(set_info.id, *remote_class, now, set_info.interval_millis)
                    {
                        continue;
                    }

                    let sendable: Vec<&FieldDescriptor> = set_info
                        .members
                        .iter()
                        .filter_map(|field_id| pair.field(*field_id))
                        .filter(|field| {
                            combine(pair.local_tag(field), pair.remote_tag(field))
                                == SyncBehavior::Send
                        })
                        .collect();
                    if sendable.is_empty() {
                        continue;
                    }

                    record.instance_mut().before_sync_read(set_info.id);
                    let values: Vec<Value> = sendable
                        .iter()
                        .map(|field| record.instance().read_field(field.id))
                        .collect();
                    record.instance_mut().after_sync_read(set_info.id);
                    record.mark_sent(set_info.id, *remote_class, now);

                    // a set whose tracked members are all bitwise-unchanged
                    // (and which has no untracked member) sends nothing
                    let unchanged = sendable.iter().zip(&values).all(|(field, value)| {
                        field.track_changes
                            && record.sent_value(field.id, *remote_class) == Some(value)
                    });
                    if unchanged {
                        continue;
                    }

                    for (field, value) in sendable.iter().zip(&values) {
                        if field.track_changes {
                            record.record_sent_value(field.id, *remote_class, value.clone());
                        }
                    }

                    let message = WireMessage::UpdateSet {
                        local_time: now,
                        entity,
                        set: set_info.id,
                        fields: sendable.iter().map(|field| field.id).collect(),
                        values: values.iter().map(|value| interpreter.pack(value)).collect(),
                    };
                    for target in &targets {
                        outgoing.push((*target, message.clone(), set_info.reliable));
                    }
                }
            }
        }

        for (target, message, reliable) in outgoing {
            if let Some(connection) = connections.get_mut(&target) {
                connection.send(&message, reliable);
            }
        }
    }

    /// Apply one received `UpdateSet` message. All carried fields are
    /// written together; a value whose type is incompatible with the
    /// declared field type is logged and replaced by the declared type's
    /// zero value rather than rejecting the whole message.
    #[allow(clippy::too_many_arguments)]
    pub fn receive_update(
        from_class: ClassId,
        local_time: ClockMillis,
        entity: EntityId,
        set: SetId,
        fields: &[FieldId],
        values: &[PackedValue],
        metadata: &MetadataStore,
        registry: &mut EntityRegistry,
        interpreter: &dyn ValueInterpreter,
    ) {
        let Some(record) = registry.record_mut(entity) else {
            warn!("UpdateSet for unknown entity {:?} dropped", entity);
            return;
        };
        let Some(pair) = metadata.pair(record.class(), from_class) else {
            warn!(
                "UpdateSet for entity {:?} has no metadata pair ({:?}, {:?})",
                entity,
                record.class(),
                from_class
            );
            return;
        };
        if !pair.sets().iter().any(|info| info.id == set) {
            warn!("UpdateSet names undeclared set {:?} for entity {:?}", set, entity);
            return;
        }
        if !record.accept_remote_stamp(set, local_time) {
            // stale delivery, an unreliable transport may reorder
            return;
        }

        record.instance_mut().before_sync_write(set);
        for (field_id, payload) in fields.iter().zip(values.iter()) {
            let Some(field) = pair.field(*field_id) else {
                warn!("UpdateSet carries undeclared field {:?}", field_id);
                continue;
            };
            if combine(pair.local_tag(field), pair.remote_tag(field)) != SyncBehavior::Receive {
                warn!(
                    "UpdateSet carries field '{}' the local side is authoritative over",
                    field.name
                );
                continue;
            }

            let value = match interpreter.unpack(payload) {
                Ok(value) if field.kind.accepts(value.kind()) => value,
                Ok(value) => {
                    warn!(
                        "Field '{}' received {:?} but declares {:?}; writing zero value",
                        field.name,
                        value.kind(),
                        field.kind
                    );
                    field.kind.zero_value()
                }
                Err(error) => {
                    warn!(
                        "Field '{}' payload could not be unpacked ({}); writing zero value",
                        field.name, error
                    );
                    field.kind.zero_value()
                }
            };
            record.instance_mut().write_field(*field_id, value);
        }
        record.instance_mut().after_sync_write(set);
    }
}
