pub mod call_registry;
pub mod engine;
pub mod error;

/// Error result tag for a caller the inbound allow-list excludes.
pub const ERR_INBOUND_NOT_ALLOWED: &str = "inbound calls not allowed";

/// Error result tag for a call that expired in flight: judged on the
/// receiver's own clock against the sender's transmitted estimate.
pub const ERR_EXPIRED_IN_FLIGHT: &str = "call not invoked because it timed out";
