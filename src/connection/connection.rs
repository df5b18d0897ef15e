use std::collections::HashSet;

use crate::{
    connection::{clock_sync::ClockSync, transport::PeerTransport},
    messages::wire::WireMessage,
    types::{ClassId, ConnectionId, EntityId},
};

/// A connected peer process: its advertised class, its clock-sync state,
/// the set of entities currently visible to it, and the transport used to
/// reach it. Created on transport-level connect, destroyed on disconnect.
pub struct Connection {
    id: ConnectionId,
    remote_class: ClassId,
    /// While false, sends are dropped instead of enqueued.
    running: bool,
    transport: Box<dyn PeerTransport>,
    pub(crate) clock: ClockSync,
    scope: HashSet<EntityId>,
}

impl Connection {
    pub fn new(id: ConnectionId, remote_class: ClassId, transport: Box<dyn PeerTransport>) -> Self {
        Self {
            id,
            remote_class,
            running: true,
            transport,
            clock: ClockSync::new(),
            scope: HashSet::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_class(&self) -> ClassId {
        self.remote_class
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Hand a message to the transport. No-op while the connection is not
    /// running.
    pub fn send(&mut self, message: &WireMessage, reliable: bool) {
        if !self.running {
            return;
        }
        self.transport.send(message, reliable);
    }

    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    // Scope membership

    pub fn has_in_scope(&self, entity: EntityId) -> bool {
        self.scope.contains(&entity)
    }

    /// Returns false if the entity was already in scope.
    pub fn add_to_scope(&mut self, entity: EntityId) -> bool {
        self.scope.insert(entity)
    }

    /// Returns false if the entity was not in scope.
    pub fn remove_from_scope(&mut self, entity: EntityId) -> bool {
        self.scope.remove(&entity)
    }
}
