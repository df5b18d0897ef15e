use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use crate::{
    messages::wire::{PackedValue, WireMessage},
    types::{
        CallId, ClockMillis, ConnectionId, ConstructorId, EntityId, FieldId, MethodId,
        SequenceId, SetId,
    },
};

type Gate = Arc<Mutex<VecDeque<(ConnectionId, WireMessage)>>>;

/// Queue of inbound messages, filled from the transport's I/O threads and
/// drained at the start of every tick. The mutex is the only concurrency
/// boundary in the system: once drained, messages are processed synchronously
/// in arrival order.
pub struct InboundQueue {
    gate: Gate,
}

impl InboundQueue {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// A cloneable handle the transport uses to deliver inbound messages.
    pub fn sink(&self) -> MessageSink {
        MessageSink {
            gate: self.gate.clone(),
        }
    }

    /// Swap out everything queued so far, preserving arrival order.
    pub fn drain(&self) -> Vec<(ConnectionId, WireMessage)> {
        let mut queue = self
            .gate
            .lock()
            .expect("inbound message gate poisoned");
        std::mem::take(&mut *queue).into()
    }
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The transport-facing side of the inbound queue: one enqueue callback per
/// wire message type. Safe to call from any thread.
#[derive(Clone)]
pub struct MessageSink {
    gate: Gate,
}

impl MessageSink {
    fn push(&self, from: ConnectionId, message: WireMessage) {
        let mut queue = self
            .gate
            .lock()
            .expect("inbound message gate poisoned");
        queue.push_back((from, message));
    }

    pub fn receive_entity_init(
        &self,
        from: ConnectionId,
        entity: EntityId,
        local_class: String,
        connected_class: String,
        constructor: ConstructorId,
        params: Vec<PackedValue>,
    ) {
        self.push(
            from,
            WireMessage::EntityInit {
                entity,
                local_class,
                connected_class,
                constructor,
                params,
            },
        );
    }

    pub fn receive_entity_change(
        &self,
        from: ConnectionId,
        entity: EntityId,
        new_local_class: String,
        constructor: ConstructorId,
        params: Vec<PackedValue>,
    ) {
        self.push(
            from,
            WireMessage::EntityChange {
                entity,
                new_local_class,
                constructor,
                params,
            },
        );
    }

    pub fn receive_entity_end(&self, from: ConnectionId, entity: EntityId) {
        self.push(from, WireMessage::EntityEnd { entity });
    }

    pub fn receive_update_set(
        &self,
        from: ConnectionId,
        local_time: ClockMillis,
        entity: EntityId,
        set: SetId,
        fields: Vec<FieldId>,
        values: Vec<PackedValue>,
    ) {
        self.push(
            from,
            WireMessage::UpdateSet {
                local_time,
                entity,
                set,
                fields,
                values,
            },
        );
    }

    pub fn receive_rpc_call(
        &self,
        from: ConnectionId,
        entity: EntityId,
        method: MethodId,
        call: Option<CallId>,
        params: Vec<PackedValue>,
        reliable: bool,
        estd_receiver_time: ClockMillis,
    ) {
        self.push(
            from,
            WireMessage::RpcCall {
                entity,
                method,
                call,
                params,
                reliable,
                estd_receiver_time,
            },
        );
    }

    pub fn receive_rpc_result(
        &self,
        from: ConnectionId,
        call: CallId,
        result: PackedValue,
        reliable: bool,
    ) {
        self.push(
            from,
            WireMessage::RpcResult {
                call,
                result,
                reliable,
            },
        );
    }

    pub fn receive_rpc_error(
        &self,
        from: ConnectionId,
        call: CallId,
        message: String,
        reliable: bool,
    ) {
        self.push(
            from,
            WireMessage::RpcError {
                call,
                message,
                reliable,
            },
        );
    }

    pub fn receive_time_sync_request(&self, from: ConnectionId, sequence: SequenceId) {
        self.push(from, WireMessage::TimeSyncRequest { sequence });
    }

    pub fn receive_time_sync_response(
        &self,
        from: ConnectionId,
        sequence: SequenceId,
        sender_local_time: ClockMillis,
    ) {
        self.push(
            from,
            WireMessage::TimeSyncResponse {
                sequence,
                sender_local_time,
            },
        );
    }
}
