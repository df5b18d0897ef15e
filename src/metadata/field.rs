use std::time::Duration;

use crate::{
    messages::value::ValueKind,
    metadata::filter::AuthorityFilter,
    types::{FieldId, SetId},
};

/// A field's membership in an update set, declared per field and validated
/// for consistency across the set at registration time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetBinding {
    pub set: SetId,
    pub interval: Duration,
    pub reliable: bool,
}

impl SetBinding {
    pub fn new(set: SetId, interval: Duration, reliable: bool) -> Self {
        Self {
            set,
            interval,
            reliable,
        }
    }
}

/// Declaration of one replicated field within a class pair.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub name: String,
    pub kind: ValueKind,
    /// Ordered authority declaration; last matching filter wins.
    pub filters: Vec<AuthorityFilter>,
    /// `None` means the field is never synchronized periodically.
    pub set: Option<SetBinding>,
    /// Skip transmission while the value is bitwise-equal to the last value
    /// sent. Combined with unreliable delivery a transient change may never
    /// be observed remotely; that trade-off is intentional.
    pub track_changes: bool,
}
