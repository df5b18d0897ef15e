use std::collections::{HashMap, HashSet};

use log::warn;

use crate::{
    connection::connection::Connection,
    messages::{
        interpreter::ValueInterpreter,
        value::Value,
        wire::{PackedValue, WireMessage},
    },
    metadata::{
        method::{LocalInvoke, MethodDescriptor},
        store::MetadataStore,
    },
    rpc::{
        call_registry::{CallRegistry, ResponseHandler},
        error::RpcSendError,
        ERR_EXPIRED_IN_FLIGHT, ERR_INBOUND_NOT_ALLOWED,
    },
    types::{CallId, ClassId, ClockMillis, ConnectionId, EntityId, MethodId},
    world::registry::EntityRegistry,
};

/// Dispatches outbound calls and validates, invokes, and answers inbound
/// ones. Waiting for a result is registry state, never a blocked execution
/// context.
pub struct RpcEngine;

impl RpcEngine {
    /// Send a call on `entity`'s method to `targets`. With a handler, a call
    /// id is allocated, a registry entry opened, and a timeout registered
    /// per target at `now + result_timeout`; without one, the call goes out
    /// with no id and no response is ever expected.
    #[allow(clippy::too_many_arguments)]
    pub fn send_call(
        now: ClockMillis,
        metadata: &MetadataStore,
        registry: &mut EntityRegistry,
        calls: &mut CallRegistry,
        connections: &mut HashMap<ConnectionId, Connection>,
        interpreter: &dyn ValueInterpreter,
        entity: EntityId,
        method: MethodId,
        params: &[Value],
        targets: &[ConnectionId],
        handler: Option<Box<dyn ResponseHandler>>,
    ) -> Result<Option<CallId>, RpcSendError> {
        let valid_targets: Vec<ConnectionId> = targets
            .iter()
            .copied()
            .filter(|id| {
                connections
                    .get(id)
                    .is_some_and(|connection| connection.is_running())
            })
            .collect();
        let Some(first) = valid_targets.first() else {
            return Err(RpcSendError::NoTargets);
        };

        let local_class = registry
            .record(entity)
            .ok_or(RpcSendError::UnknownEntity { entity })?
            .class();
        let connected_class = connections[first].remote_class();
        let pair = metadata
            .pair(local_class, connected_class)
            .ok_or(RpcSendError::UnpairedClasses {
                local: local_class,
                connected: connected_class,
            })?;
        let descriptor = pair
            .method(method)
            .ok_or(RpcSendError::UnknownMethod { method })?;

        if descriptor.local_invoke == LocalInvoke::Before {
            Self::invoke_local(registry, entity, descriptor, params);
        }

        let call = handler.map(|handler| {
            let deadline = now + descriptor.result_timeout.as_millis() as ClockMillis;
            calls.open(
                valid_targets.iter().copied().collect::<HashSet<_>>(),
                deadline,
                handler,
            )
        });

        let packed: Vec<PackedValue> = params.iter().map(|value| interpreter.pack(value)).collect();
        for target in &valid_targets {
            let connection = connections.get_mut(target).unwrap();
            let message = WireMessage::RpcCall {
                entity,
                method,
                call,
                params: packed.clone(),
                reliable: descriptor.reliable,
                estd_receiver_time: connection.clock.estimated_arrival_time(now),
            };
            connection.send(&message, descriptor.reliable);
        }

        if descriptor.local_invoke == LocalInvoke::After {
            Self::invoke_local(registry, entity, descriptor, params);
        }

        Ok(call)
    }

    /// Validate and invoke an inbound call, producing the response to send
    /// back, or `None` when no response is expected. Invocation failures are
    /// converted into an `RpcError` response, never a fault of the engine.
    #[allow(clippy::too_many_arguments)]
    pub fn receive_call(
        now: ClockMillis,
        metadata: &MetadataStore,
        registry: &mut EntityRegistry,
        interpreter: &dyn ValueInterpreter,
        caller_class: ClassId,
        entity: EntityId,
        method: MethodId,
        call: Option<CallId>,
        params: &[PackedValue],
        reliable: bool,
        estd_receiver_time: ClockMillis,
    ) -> Option<WireMessage> {
        let respond = |message: String| {
            call.map(|call| WireMessage::RpcError {
                call,
                message,
                reliable,
            })
        };

        let Some(record) = registry.record_mut(entity) else {
            warn!("RpcCall for unknown entity {:?}", entity);
            return respond(format!("entity {} is not registered", entity.value()));
        };
        let Some(pair) = metadata.pair(record.class(), caller_class) else {
            return respond(format!(
                "no metadata pair for classes ({}, {})",
                record.class().value(),
                caller_class.value()
            ));
        };
        let Some(descriptor) = pair.method(method) else {
            return respond(format!("method {} is not declared", method.value()));
        };

        // 1. the inbound allow-list is evaluated against the caller's
        //    advertised class
        if !descriptor.allow_inbound.allows(caller_class) {
            return respond(ERR_INBOUND_NOT_ALLOWED.to_string());
        }

        // 2. staleness is judged on the receiver's own authoritative clock
        //    against the sender's transmitted estimate
        if let Some(call_timeout) = descriptor.call_timeout {
            let timeout_millis = call_timeout.as_millis() as ClockMillis;
            if estd_receiver_time + timeout_millis < now {
                return respond(ERR_EXPIRED_IN_FLIGHT.to_string());
            }
        }

        // 3. invoke
        let mut unpacked = Vec::with_capacity(params.len());
        for payload in params {
            match interpreter.unpack(payload) {
                Ok(value) => unpacked.push(value),
                Err(error) => return respond(error.to_string()),
            }
        }
        match (descriptor.handler)(record.instance_mut(), &unpacked) {
            Ok(result) => call.map(|call| WireMessage::RpcResult {
                call,
                result: interpreter.pack(&result),
                reliable,
            }),
            Err(error) => respond(error.to_string()),
        }
    }

    fn invoke_local(
        registry: &mut EntityRegistry,
        entity: EntityId,
        descriptor: &MethodDescriptor,
        params: &[Value],
    ) {
        let Some(record) = registry.record_mut(entity) else {
            return;
        };
        if let Err(error) = (descriptor.handler)(record.instance_mut(), params) {
            warn!(
                "Local invocation of method '{}' failed: {}",
                descriptor.name, error
            );
        }
    }
}
