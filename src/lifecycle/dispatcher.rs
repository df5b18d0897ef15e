use log::warn;
use thiserror::Error;

use crate::{
    lifecycle::event::EntityEvent,
    types::{ClassId, ConnectionId, EntityId},
};

/// Failure reported by a listener callback. It never aborts processing of
/// the remaining listeners or the remaining queued events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("listener failed: {0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// What a listener wants to happen to itself after handling an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerFlow {
    Continue,
    /// Unregister this listener. A listener that detaches during the
    /// replacing phase of an instance change does not receive the paired
    /// replaced notification.
    Detach,
}

pub trait EntityListener {
    fn on_event(
        &mut self,
        event: &EntityEvent,
        origin: Option<ConnectionId>,
    ) -> Result<ListenerFlow, ListenerError>;
}

/// Handle for removing a previously added listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey(u32);

/// Which events a listener observes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerScope {
    Global,
    Class(ClassId),
    Connection(ConnectionId),
    Entity(EntityId),
}

impl ListenerScope {
    fn matches(&self, event: &EntityEvent, origin: Option<ConnectionId>) -> bool {
        match self {
            ListenerScope::Global => true,
            ListenerScope::Class(class) => event.class() == *class,
            ListenerScope::Connection(connection) => origin == Some(*connection),
            ListenerScope::Entity(entity) => event.entity() == *entity,
        }
    }
}

struct ListenerEntry {
    key: ListenerKey,
    scope: ListenerScope,
    sort_key: i32,
    listener: Box<dyn EntityListener>,
}

/// Dispatches entity lifecycle events to listeners in a total order:
/// registration-scoped (per-entity) listeners first, in insertion order,
/// then instance-lifecycle listeners ascending by sort key, ties broken by
/// insertion sequence.
///
/// The listener set for an event is captured before the first callback runs,
/// so mutation during dispatch never affects the current pass.
pub struct LifecycleDispatcher {
    next_key: u32,
    registration: Vec<ListenerEntry>,
    instance: Vec<ListenerEntry>,
}

impl LifecycleDispatcher {
    pub fn new() -> Self {
        Self {
            next_key: 0,
            registration: Vec::new(),
            instance: Vec::new(),
        }
    }

    /// Add a registration-scoped listener for one entity. These fire before
    /// every instance-lifecycle listener, in insertion order.
    pub fn add_entity_listener(
        &mut self,
        entity: EntityId,
        listener: Box<dyn EntityListener>,
    ) -> ListenerKey {
        let key = self.allocate_key();
        self.registration.push(ListenerEntry {
            key,
            scope: ListenerScope::Entity(entity),
            sort_key: 0,
            listener,
        });
        key
    }

    /// Add an instance-lifecycle listener with the given scope and sort key.
    pub fn add_listener(
        &mut self,
        scope: ListenerScope,
        sort_key: i32,
        listener: Box<dyn EntityListener>,
    ) -> ListenerKey {
        let key = self.allocate_key();
        self.instance.push(ListenerEntry {
            key,
            scope,
            sort_key,
            listener,
        });
        // stable sort: equal sort keys keep insertion order, keys ascend
        self.instance.sort_by_key(|entry| (entry.sort_key, entry.key));
        key
    }

    pub fn remove_listener(&mut self, key: ListenerKey) {
        self.registration.retain(|entry| entry.key != key);
        self.instance.retain(|entry| entry.key != key);
    }

    /// Drop every listener scoped to a connection that went away.
    pub fn remove_connection_listeners(&mut self, connection: ConnectionId) {
        let scope = ListenerScope::Connection(connection);
        self.registration.retain(|entry| entry.scope != scope);
        self.instance.retain(|entry| entry.scope != scope);
    }

    /// Drop every listener scoped to an entity that was unregistered.
    pub fn remove_entity_listeners(&mut self, entity: EntityId) {
        let scope = ListenerScope::Entity(entity);
        self.registration.retain(|entry| entry.scope != scope);
        self.instance.retain(|entry| entry.scope != scope);
    }

    /// Dispatch one event to every matching listener. Listeners that return
    /// [`ListenerFlow::Detach`] are removed once the pass completes; listener
    /// errors are reported and processing continues.
    pub fn dispatch(&mut self, event: &EntityEvent, origin: Option<ConnectionId>) {
        let captured: Vec<ListenerKey> = self
            .registration
            .iter()
            .filter(|entry| entry.scope.matches(event, origin))
            .map(|entry| entry.key)
            .chain(
                self.instance
                    .iter()
                    .filter(|entry| entry.scope.matches(event, origin))
                    .map(|entry| entry.key),
            )
            .collect();

        let mut detached = Vec::new();
        for key in captured {
            // a listener removed mid-pass by an earlier callback is skipped
            let Some(entry) = self.find_mut(key) else {
                continue;
            };
            match entry.listener.on_event(event, origin) {
                Ok(ListenerFlow::Continue) => {}
                Ok(ListenerFlow::Detach) => detached.push(key),
                Err(error) => {
                    warn!("Listener {:?} failed during {:?}: {}", key, event, error);
                }
            }
        }
        for key in detached {
            self.remove_listener(key);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registration.len() + self.instance.len()
    }

    fn allocate_key(&mut self) -> ListenerKey {
        let key = ListenerKey(self.next_key);
        self.next_key += 1;
        key
    }

    fn find_mut(&mut self, key: ListenerKey) -> Option<&mut ListenerEntry> {
        self.registration
            .iter_mut()
            .chain(self.instance.iter_mut())
            .find(|entry| entry.key == key)
    }
}

impl Default for LifecycleDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
