use std::time::Duration;

use thiserror::Error;

use crate::{
    messages::value::Value,
    metadata::filter::AllowList,
    types::MethodId,
    world::instance::Instance,
};

/// Failure raised by a method handler or replication constructor. Always
/// converted into an `RpcError` response, never propagated as a fault of the
/// engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvokeError(pub String);

impl InvokeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Invocation target registered at startup; no runtime reflection.
pub type MethodHandler = Box<dyn Fn(&mut dyn Instance, &[Value]) -> Result<Value, InvokeError>>;

/// Whether the caller also invokes the handler on its own instance around
/// the send, for local prediction. Before and after are mutually exclusive
/// by construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalInvoke {
    None,
    Before,
    After,
}

/// Declaration of one remote-procedure method within a class pair.
pub struct MethodDescriptor {
    pub id: MethodId,
    pub name: String,
    pub reliable: bool,
    /// Receiver-side staleness bound: a call whose estimated invocation time
    /// plus this timeout is already in the past is rejected unexecuted.
    pub call_timeout: Option<Duration>,
    /// Caller-side wait per connection before a timeout notification fires.
    pub result_timeout: Duration,
    pub allow_inbound: AllowList,
    pub local_invoke: LocalInvoke,
    pub handler: MethodHandler,
}
