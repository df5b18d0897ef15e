//! # Replisync
//! Keeps a set of logical entities consistent between one authoritative
//! process and any number of connected peer processes, over a transport
//! offering reliable and unreliable delivery.
//!
//! Three coupled subsystems do the heavy lifting: the state synchronization
//! engine resolves per-field authority and batches co-scheduled fields into
//! atomically delivered update sets; the RPC engine dispatches calls with
//! per-call timeouts and asynchronous result delivery; and per-connection
//! clock sync estimates peer clock offset and latency so both can judge
//! message freshness without assuming synchronized wall clocks.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

mod backends;
mod connection;
mod endpoint;
mod key_generator;
mod lifecycle;
mod messages;
mod metadata;
mod rpc;
mod sync;
mod types;
mod world;

pub use backends::{Instant, LocalClock};
pub use connection::{
    clock_sync::ClockSync, connection::Connection, transport::PeerTransport,
};
pub use endpoint::{Endpoint, EndpointConfig};
pub use key_generator::KeyGenerator;
pub use lifecycle::{
    dispatcher::{
        EntityListener, LifecycleDispatcher, ListenerError, ListenerFlow, ListenerKey,
        ListenerScope,
    },
    event::EntityEvent,
};
pub use messages::{
    interpreter::{BasicInterpreter, InterpretError, ValueInterpreter},
    queue::{InboundQueue, MessageSink},
    value::{Value, ValueKind},
    wire::{PackedValue, WireMessage},
};
pub use metadata::{
    error::ConfigError,
    field::{FieldDescriptor, SetBinding},
    filter::{
        resolve_tag, AllowList, AuthorityFilter, AuthorityTag, ClassFilter, FilterTarget,
    },
    method::{InvokeError, LocalInvoke, MethodDescriptor, MethodHandler},
    store::{Constructor, MetadataStore, PairDescriptor, PairMetadata, UpdateSetInfo},
};
pub use rpc::{
    call_registry::{CallRegistry, ResponseHandler},
    engine::RpcEngine,
    error::RpcSendError,
    ERR_EXPIRED_IN_FLIGHT, ERR_INBOUND_NOT_ALLOWED,
};
pub use sync::{
    authority::{combine, SyncBehavior},
    engine::SyncEngine,
};
pub use types::{
    CallId, ClassId, ClockMillis, ConnectionId, ConstructorId, EntityId, FieldId, HostRole,
    MethodId, SequenceId, SetId,
};
pub use world::{
    entity_record::EntityRecord, error::RegistryError, instance::Instance,
    registry::EntityRegistry,
};
