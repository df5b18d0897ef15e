use std::collections::HashMap;

use log::{info, warn};

use crate::{
    backends::LocalClock,
    connection::{connection::Connection, transport::PeerTransport},
    lifecycle::{
        dispatcher::{EntityListener, LifecycleDispatcher, ListenerKey, ListenerScope},
        event::EntityEvent,
    },
    messages::{
        interpreter::{BasicInterpreter, ValueInterpreter},
        queue::{InboundQueue, MessageSink},
        value::Value,
        wire::WireMessage,
    },
    metadata::store::MetadataStore,
    rpc::{
        call_registry::{CallRegistry, ResponseHandler},
        engine::RpcEngine,
        error::RpcSendError,
    },
    sync::engine::SyncEngine,
    types::{
        CallId, ClassId, ClockMillis, ConnectionId, ConstructorId, EntityId, HostRole,
        MethodId,
    },
    world::{error::RegistryError, instance::Instance, registry::EntityRegistry},
};

/// Contains config properties which will be used by an [`Endpoint`]
#[derive(Clone)]
pub struct EndpointConfig {
    /// Whether this process is the authoritative side or a connected peer.
    pub role: HostRole,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            role: HostRole::Authority,
        }
    }
}

/// One process's side of the synchronization system: the entity registry,
/// lifecycle dispatcher, connections with their clock sync, the state
/// engine, and the RPC engine, all driven by one cooperative [`tick`].
///
/// [`tick`]: Endpoint::tick
pub struct Endpoint {
    role: HostRole,
    metadata: MetadataStore,
    registry: EntityRegistry,
    dispatcher: LifecycleDispatcher,
    connections: HashMap<ConnectionId, Connection>,
    calls: CallRegistry,
    inbound: InboundQueue,
    interpreter: Box<dyn ValueInterpreter>,
    clock: LocalClock,
}

impl Endpoint {
    /// Create a new Endpoint around an already-built metadata store. The
    /// store is immutable from here on.
    pub fn new(config: EndpointConfig, metadata: MetadataStore) -> Self {
        Self::with_interpreter(config, metadata, Box::new(BasicInterpreter))
    }

    /// Create a new Endpoint with a custom value interpreter (the pluggable
    /// encode/decode step entity and asset references pass through).
    pub fn with_interpreter(
        config: EndpointConfig,
        metadata: MetadataStore,
        interpreter: Box<dyn ValueInterpreter>,
    ) -> Self {
        Self {
            role: config.role,
            metadata,
            registry: EntityRegistry::new(),
            dispatcher: LifecycleDispatcher::new(),
            connections: HashMap::new(),
            calls: CallRegistry::new(),
            inbound: InboundQueue::new(),
            interpreter,
            clock: LocalClock::new(),
        }
    }

    pub fn role(&self) -> HostRole {
        self.role
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// The handle the transport uses to deliver inbound messages from its
    /// I/O threads.
    pub fn message_sink(&self) -> MessageSink {
        self.inbound.sink()
    }

    // Connections

    /// Register a newly connected peer advertising `remote_class_name`.
    pub fn connect(
        &mut self,
        id: ConnectionId,
        remote_class_name: &str,
        transport: Box<dyn PeerTransport>,
    ) -> Result<(), RegistryError> {
        let remote_class = self.metadata.class_id(remote_class_name).ok_or_else(|| {
            RegistryError::UnknownClassName {
                name: remote_class_name.to_string(),
            }
        })?;
        info!("Endpoint: connection {:?} up as '{}'", id, remote_class_name);
        self.connections
            .insert(id, Connection::new(id, remote_class, transport));
        Ok(())
    }

    /// Tear down a connection. Every pending call entry naming it is
    /// force-resolved as timed out, its scoped listeners are dropped, and
    /// every entity replicated from it is removed.
    pub fn disconnect(&mut self, id: ConnectionId) {
        let Some(mut connection) = self.connections.remove(&id) else {
            return;
        };
        connection.set_running(false);
        info!("Endpoint: connection {:?} down", id);

        self.calls.drop_connection(id);

        for entity in self.registry.entities_from(id) {
            let class = self.registry.record(entity).map(|record| record.class());
            if let Some(class) = class {
                self.dispatcher
                    .dispatch(&EntityEvent::Removed { entity, class }, Some(id));
            }
            self.registry.unregister(entity);
            self.dispatcher.remove_entity_listeners(entity);
        }

        self.dispatcher.remove_connection_listeners(id);
    }

    /// Gate whether sends to this connection are handed to the transport.
    pub fn set_running(&mut self, id: ConnectionId, running: bool) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.set_running(running);
        }
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    // Entities

    /// Register a locally-owned entity. Fires `Registered` synchronously,
    /// before any update-set work of the current tick can touch the entity.
    pub fn register_entity(
        &mut self,
        instance: Box<dyn Instance>,
        class: ClassId,
    ) -> Result<EntityId, RegistryError> {
        if !self.metadata.has_class(class) {
            return Err(RegistryError::UnknownClass { class });
        }
        let entity = self.registry.register(instance, class);
        self.dispatcher
            .dispatch(&EntityEvent::Registered { entity, class }, None);
        Ok(entity)
    }

    /// Replace the entity's local instance while it remains the same
    /// entity. `InstanceReplacing` fires with the old instance still
    /// installed, then the swap happens, then `InstanceReplaced` — skipping
    /// listeners that detached during the replacing phase. Scoped peers are
    /// told through `EntityChange`.
    pub fn replace_instance(
        &mut self,
        entity: EntityId,
        instance: Box<dyn Instance>,
        class: ClassId,
    ) -> Result<(), RegistryError> {
        if !self.metadata.has_class(class) {
            return Err(RegistryError::UnknownClass { class });
        }
        let origin = self
            .registry
            .record(entity)
            .expect("Cannot replace instance of an entity which is not registered!")
            .origin();
        let old_class = self.registry.record(entity).unwrap().class();

        self.dispatcher.dispatch(
            &EntityEvent::InstanceReplacing {
                entity,
                class: old_class,
            },
            origin,
        );
        let (constructor, params) = {
            let _old = self.registry.replace_instance(entity, instance, class);
            self.registry
                .record(entity)
                .unwrap()
                .instance()
                .construction()
        };
        self.dispatcher
            .dispatch(&EntityEvent::InstanceReplaced { entity, class }, origin);

        let new_local_class = self
            .metadata
            .class_name(class)
            .unwrap_or_default()
            .to_string();
        let params: Vec<Vec<u8>> = params
            .iter()
            .map(|value| self.interpreter.pack(value))
            .collect();
        let message = WireMessage::EntityChange {
            entity,
            new_local_class,
            constructor,
            params,
        };
        for connection in self.connections.values_mut() {
            if connection.has_in_scope(entity) {
                connection.send(&message, true);
            }
        }
        Ok(())
    }

    /// Unregister an entity: scoped peers are told through `EntityEnd`,
    /// `Removed` fires, then the dynamic record is dropped. Unregistering an
    /// id that is not registered is a caller contract violation.
    pub fn unregister_entity(&mut self, entity: EntityId) {
        let class = self
            .registry
            .record(entity)
            .expect("Cannot unregister an entity which is not registered!")
            .class();

        let message = WireMessage::EntityEnd { entity };
        for connection in self.connections.values_mut() {
            if connection.remove_from_scope(entity) {
                connection.send(&message, true);
            }
        }

        self.dispatcher
            .dispatch(&EntityEvent::Removed { entity, class }, None);
        self.registry.unregister(entity);
        self.dispatcher.remove_entity_listeners(entity);
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    // Visibility scoping

    /// Make an entity visible to a connection, announcing it through
    /// `EntityInit`. Visibility is decided by the authoritative side.
    pub fn add_to_scope(&mut self, id: ConnectionId, entity: EntityId) {
        if self.role != HostRole::Authority {
            warn!("Only the authoritative endpoint decides entity visibility");
            return;
        }
        let Some(record) = self.registry.record(entity) else {
            warn!("Cannot scope unregistered entity {:?}", entity);
            return;
        };
        let local_class = self
            .metadata
            .class_name(record.class())
            .unwrap_or_default()
            .to_string();
        let (constructor, params) = record.instance().construction();
        let params: Vec<Vec<u8>> = params
            .iter()
            .map(|value| self.interpreter.pack(value))
            .collect();

        let Some(connection) = self.connections.get_mut(&id) else {
            warn!("Cannot scope entity to unknown connection {:?}", id);
            return;
        };
        if !connection.add_to_scope(entity) {
            return;
        }
        let connected_class = self
            .metadata
            .class_name(connection.remote_class())
            .unwrap_or_default()
            .to_string();
        connection.send(
            &WireMessage::EntityInit {
                entity,
                local_class,
                connected_class,
                constructor,
                params,
            },
            true,
        );
    }

    /// Withdraw an entity from a connection's view, announcing it through
    /// `EntityEnd`.
    pub fn remove_from_scope(&mut self, id: ConnectionId, entity: EntityId) {
        let Some(connection) = self.connections.get_mut(&id) else {
            return;
        };
        if connection.remove_from_scope(entity) {
            connection.send(&WireMessage::EntityEnd { entity }, true);
        }
    }

    // Listeners

    /// Add a registration-scoped listener for one entity; these fire before
    /// every instance-lifecycle listener.
    pub fn add_entity_listener(
        &mut self,
        entity: EntityId,
        listener: Box<dyn EntityListener>,
    ) -> ListenerKey {
        self.dispatcher.add_entity_listener(entity, listener)
    }

    /// Add an instance-lifecycle listener, ordered by ascending sort key.
    pub fn add_listener(
        &mut self,
        scope: ListenerScope,
        sort_key: i32,
        listener: Box<dyn EntityListener>,
    ) -> ListenerKey {
        self.dispatcher.add_listener(scope, sort_key, listener)
    }

    pub fn remove_listener(&mut self, key: ListenerKey) {
        self.dispatcher.remove_listener(key);
    }

    // RPC

    /// Send a call on `entity`'s method to `targets`. Passing a handler
    /// allocates a call id and registers per-connection timeouts; `None`
    /// sends the call with no response expected.
    pub fn send_call(
        &mut self,
        entity: EntityId,
        method: MethodId,
        params: &[Value],
        targets: &[ConnectionId],
        handler: Option<Box<dyn ResponseHandler>>,
    ) -> Result<Option<CallId>, RpcSendError> {
        let now = self.clock.now_millis();
        RpcEngine::send_call(
            now,
            &self.metadata,
            &mut self.registry,
            &mut self.calls,
            &mut self.connections,
            self.interpreter.as_ref(),
            entity,
            method,
            params,
            targets,
            handler,
        )
    }

    pub fn calls(&self) -> &CallRegistry {
        &self.calls
    }

    // Tick

    /// The cooperative tick, invoked once per frame/interval by the host.
    /// Drains and processes inbound messages in arrival order, runs the
    /// update-set send cycle, sweeps RPC timeouts (after inbound processing,
    /// so a just-in-time result beats the sweep), then steps clock sync once
    /// per connection.
    pub fn tick(&mut self) {
        let now = self.clock.now_millis();
        self.tick_at(now);
    }

    /// Tick with an explicit clock reading.
    pub fn tick_at(&mut self, now: ClockMillis) {
        for (from, message) in self.inbound.drain() {
            self.process_message(from, message, now);
        }

        SyncEngine::send_updates(
            now,
            &self.metadata,
            &mut self.registry,
            &mut self.connections,
            self.interpreter.as_ref(),
        );

        self.calls.sweep(now);

        for connection in self.connections.values_mut() {
            if let Some(sequence) = connection.clock.on_tick(now) {
                connection.send(&WireMessage::TimeSyncRequest { sequence }, false);
            }
        }
    }

    fn process_message(&mut self, from: ConnectionId, message: WireMessage, now: ClockMillis) {
        match message {
            WireMessage::EntityInit {
                entity,
                local_class,
                connected_class,
                constructor,
                params,
            } => {
                self.on_entity_init(from, entity, &local_class, &connected_class, constructor, &params);
            }
            WireMessage::EntityChange {
                entity,
                new_local_class,
                constructor,
                params,
            } => {
                self.on_entity_change(from, entity, &new_local_class, constructor, &params);
            }
            WireMessage::EntityEnd { entity } => {
                self.on_entity_end(from, entity);
            }
            WireMessage::UpdateSet {
                local_time,
                entity,
                set,
                fields,
                values,
            } => {
                let Some(from_class) = self.connection_class(from) else {
                    return;
                };
                SyncEngine::receive_update(
                    from_class,
                    local_time,
                    entity,
                    set,
                    &fields,
                    &values,
                    &self.metadata,
                    &mut self.registry,
                    self.interpreter.as_ref(),
                );
            }
            WireMessage::RpcCall {
                entity,
                method,
                call,
                params,
                reliable,
                estd_receiver_time,
            } => {
                let Some(caller_class) = self.connection_class(from) else {
                    return;
                };
                let response = RpcEngine::receive_call(
                    now,
                    &self.metadata,
                    &mut self.registry,
                    self.interpreter.as_ref(),
                    caller_class,
                    entity,
                    method,
                    call,
                    &params,
                    reliable,
                    estd_receiver_time,
                );
                if let Some(response) = response {
                    let reliable = matches!(
                        response,
                        WireMessage::RpcResult { reliable: true, .. }
                            | WireMessage::RpcError { reliable: true, .. }
                    );
                    if let Some(connection) = self.connections.get_mut(&from) {
                        connection.send(&response, reliable);
                    }
                }
            }
            WireMessage::RpcResult { call, result, .. } => {
                match self.interpreter.unpack(&result) {
                    Ok(value) => self.calls.deliver_result(call, from, value),
                    Err(error) => self.calls.deliver_error(
                        call,
                        from,
                        &format!("result payload could not be unpacked: {error}"),
                    ),
                }
            }
            WireMessage::RpcError { call, message, .. } => {
                self.calls.deliver_error(call, from, &message);
            }
            WireMessage::TimeSyncRequest { sequence } => {
                if let Some(connection) = self.connections.get_mut(&from) {
                    connection.send(
                        &WireMessage::TimeSyncResponse {
                            sequence,
                            sender_local_time: now,
                        },
                        false,
                    );
                }
            }
            WireMessage::TimeSyncResponse {
                sequence,
                sender_local_time,
            } => {
                if let Some(connection) = self.connections.get_mut(&from) {
                    connection
                        .clock
                        .receive_response(sequence, sender_local_time, now);
                }
            }
        }
    }

    fn on_entity_init(
        &mut self,
        from: ConnectionId,
        entity: EntityId,
        local_class: &str,
        connected_class: &str,
        constructor: ConstructorId,
        params: &[Vec<u8>],
    ) {
        let Some(class) = self.metadata.class_id(connected_class) else {
            warn!("EntityInit names unknown class '{}'", connected_class);
            return;
        };
        if let Some(connection) = self.connections.get(&from) {
            if self.metadata.class_id(local_class) != Some(connection.remote_class()) {
                warn!(
                    "EntityInit from {:?} advertises class '{}' but the connection registered another",
                    from, local_class
                );
            }
        }
        if self.registry.contains(entity) {
            warn!("EntityInit for already-registered entity {:?} dropped", entity);
            return;
        }

        let unpacked = match self.unpack_params(params) {
            Some(values) => values,
            None => return,
        };
        let instance = match self.metadata.construct(class, constructor, &unpacked) {
            Ok(instance) => instance,
            Err(error) => {
                warn!("EntityInit constructor failed: {}", error);
                return;
            }
        };

        self.registry.register_remote(entity, instance, class, from);
        self.dispatcher
            .dispatch(&EntityEvent::Registered { entity, class }, Some(from));
    }

    fn on_entity_change(
        &mut self,
        from: ConnectionId,
        entity: EntityId,
        new_local_class: &str,
        constructor: ConstructorId,
        params: &[Vec<u8>],
    ) {
        let Some(record) = self.registry.record(entity) else {
            warn!("EntityChange for unknown entity {:?} dropped", entity);
            return;
        };
        if record.origin() != Some(from) {
            warn!(
                "EntityChange for entity {:?} from a connection that does not own it",
                entity
            );
            return;
        }
        let old_class = record.class();
        // the entity keeps being represented through this side's registered
        // class; the sender's new class only has to stay consistent with
        // what the connection advertised
        if let Some(connection) = self.connections.get(&from) {
            if self.metadata.class_id(new_local_class) != Some(connection.remote_class()) {
                warn!(
                    "EntityChange from {:?} names class '{}' but the connection registered another",
                    from, new_local_class
                );
            }
        }

        let unpacked = match self.unpack_params(params) {
            Some(values) => values,
            None => return,
        };
        let instance = match self.metadata.construct(old_class, constructor, &unpacked) {
            Ok(instance) => instance,
            Err(error) => {
                warn!("EntityChange constructor failed: {}", error);
                return;
            }
        };

        self.dispatcher.dispatch(
            &EntityEvent::InstanceReplacing {
                entity,
                class: old_class,
            },
            Some(from),
        );
        self.registry.replace_instance(entity, instance, old_class);
        self.dispatcher.dispatch(
            &EntityEvent::InstanceReplaced {
                entity,
                class: old_class,
            },
            Some(from),
        );
    }

    fn on_entity_end(&mut self, from: ConnectionId, entity: EntityId) {
        let Some(record) = self.registry.record(entity) else {
            warn!("EntityEnd for unknown entity {:?} dropped", entity);
            return;
        };
        if record.origin() != Some(from) {
            warn!(
                "EntityEnd for entity {:?} from a connection that does not own it",
                entity
            );
            return;
        }
        let class = record.class();
        self.dispatcher
            .dispatch(&EntityEvent::Removed { entity, class }, Some(from));
        self.registry.unregister(entity);
        self.dispatcher.remove_entity_listeners(entity);
    }

    fn connection_class(&self, id: ConnectionId) -> Option<ClassId> {
        let class = self.connections.get(&id).map(|c| c.remote_class());
        if class.is_none() {
            warn!("Message from unknown connection {:?} dropped", id);
        }
        class
    }

    fn unpack_params(&self, params: &[Vec<u8>]) -> Option<Vec<Value>> {
        let mut unpacked = Vec::with_capacity(params.len());
        for payload in params {
            match self.interpreter.unpack(payload) {
                Ok(value) => unpacked.push(value),
                Err(error) => {
                    warn!("Construction parameter could not be unpacked: {}", error);
                    return None;
                }
            }
        }
        Some(unpacked)
    }
}
