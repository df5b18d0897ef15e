use crate::metadata::filter::AuthorityTag;

/// What this side does with a field, given its tag on both sides of the
/// pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncBehavior {
    /// The local value is authoritative: read locally, sent outward.
    Send,
    /// The remote value is authoritative: received, written locally.
    Receive,
    /// No synchronization occurs for this pair.
    Skip,
}

/// Combine the local and remote tags of one field. A relay forwards
/// authoritative values downstream and accepts them from upstream. The
/// same-tag Dominant and Relay combinations carry no defined precedence and
/// are rejected when the pair metadata is registered, so they never reach
/// this table at runtime; they map to `Skip` here to keep the function
/// total.
pub fn combine(local: AuthorityTag, remote: AuthorityTag) -> SyncBehavior {
    use AuthorityTag::*;
    match (local, remote) {
        (Dominant, Dominated) | (Dominant, Relay) | (Relay, Dominated) => SyncBehavior::Send,
        (Dominated, Dominant) | (Dominated, Relay) | (Relay, Dominant) => SyncBehavior::Receive,
        (Dominated, Dominated) | (Dominant, Dominant) | (Relay, Relay) => SyncBehavior::Skip,
    }
}
