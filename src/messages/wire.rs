use crate::types::{
    CallId, ClockMillis, ConstructorId, EntityId, FieldId, MethodId, SequenceId, SetId,
};

/// A value already run through the configured [`ValueInterpreter`](crate::ValueInterpreter).
pub type PackedValue = Vec<u8>;

/// Every message exchanged between endpoints. Transport-level framing of
/// these is the transport's concern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireMessage {
    /// An entity has become visible to the receiving connection. Reliable.
    EntityInit {
        entity: EntityId,
        local_class: String,
        connected_class: String,
        constructor: ConstructorId,
        params: Vec<PackedValue>,
    },
    /// The entity's local instance was replaced; the entity itself persists.
    /// Reliable.
    EntityChange {
        entity: EntityId,
        new_local_class: String,
        constructor: ConstructorId,
        params: Vec<PackedValue>,
    },
    /// The entity is no longer visible to the receiving connection. Reliable.
    EntityEnd { entity: EntityId },
    /// One atomic batch of field values for an update set, at the set's
    /// configured reliability.
    UpdateSet {
        local_time: ClockMillis,
        entity: EntityId,
        set: SetId,
        fields: Vec<FieldId>,
        values: Vec<PackedValue>,
    },
    /// A remote procedure invocation. `call` is `None` when no response is
    /// expected. `estd_receiver_time` is the sender's estimate of the
    /// receiver's clock at the moment this message arrives.
    RpcCall {
        entity: EntityId,
        method: MethodId,
        call: Option<CallId>,
        params: Vec<PackedValue>,
        reliable: bool,
        estd_receiver_time: ClockMillis,
    },
    /// Successful invocation result, at the call's reliability.
    RpcResult {
        call: CallId,
        result: PackedValue,
        reliable: bool,
    },
    /// Failed invocation, at the call's reliability.
    RpcError {
        call: CallId,
        message: String,
        reliable: bool,
    },
    /// Clock-sync probe. Unreliable.
    TimeSyncRequest { sequence: SequenceId },
    /// Clock-sync answer carrying the responder's local clock. Unreliable.
    TimeSyncResponse {
        sequence: SequenceId,
        sender_local_time: ClockMillis,
    },
}
