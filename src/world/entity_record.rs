use std::collections::HashMap;

use crate::{
    messages::value::Value,
    types::{ClassId, ClockMillis, ConnectionId, FieldId, SetId},
    world::instance::Instance,
};

/// The mutable runtime data of one registered entity: its current local
/// instance plus the per-field and per-set bookkeeping the sync engine
/// needs. Discarded wholesale when the entity is unregistered; a later
/// registration under the same id starts from a fresh record.
pub struct EntityRecord {
    class: ClassId,
    instance: Box<dyn Instance>,
    /// The connection this record was replicated from; `None` when the
    /// entity was registered locally.
    origin: Option<ConnectionId>,
    /// Last value sent per (field, connected class); feeds change tracking.
    last_sent: HashMap<(FieldId, ClassId), Value>,
    /// Local send instant per (set, connected class); drives set cadence.
    last_send_at: HashMap<(SetId, ClassId), ClockMillis>,
    /// Highest remote timestamp accepted per set; rejects stale updates.
    last_received: HashMap<SetId, ClockMillis>,
}

impl EntityRecord {
    pub fn new(class: ClassId, instance: Box<dyn Instance>, origin: Option<ConnectionId>) -> Self {
        Self {
            class,
            instance,
            origin,
            last_sent: HashMap::new(),
            last_send_at: HashMap::new(),
            last_received: HashMap::new(),
        }
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn origin(&self) -> Option<ConnectionId> {
        self.origin
    }

    pub fn instance(&self) -> &dyn Instance {
        self.instance.as_ref()
    }

    pub fn instance_mut(&mut self) -> &mut dyn Instance {
        self.instance.as_mut()
    }

    /// Swap in a replacement instance, returning the old one. The value
    /// cache is cleared: nothing has been sent on behalf of the new
    /// instance yet.
    pub fn replace_instance(
        &mut self,
        instance: Box<dyn Instance>,
        class: ClassId,
    ) -> Box<dyn Instance> {
        self.class = class;
        self.last_sent.clear();
        std::mem::replace(&mut self.instance, instance)
    }

    /// Whether the set's interval has elapsed for the given connected class.
    pub fn set_due(
        &self,
        set: SetId,
        connected: ClassId,
        now: ClockMillis,
        interval_millis: u64,
    ) -> bool {
        match self.last_send_at.get(&(set, connected)) {
            Some(last) => now.saturating_sub(*last) >= interval_millis,
            None => true,
        }
    }

    pub fn mark_sent(&mut self, set: SetId, connected: ClassId, now: ClockMillis) {
        self.last_send_at.insert((set, connected), now);
    }

    pub fn sent_value(&self, field: FieldId, connected: ClassId) -> Option<&Value> {
        self.last_sent.get(&(field, connected))
    }

    pub fn record_sent_value(&mut self, field: FieldId, connected: ClassId, value: Value) {
        self.last_sent.insert((field, connected), value);
    }

    /// Accept a remote update-set timestamp, or reject it as stale. An
    /// unreliable transport may reorder set messages; only strictly newer
    /// timestamps are written.
    pub fn accept_remote_stamp(&mut self, set: SetId, remote_time: ClockMillis) -> bool {
        match self.last_received.get(&set) {
            Some(last) if remote_time <= *last => false,
            _ => {
                self.last_received.insert(set, remote_time);
                true
            }
        }
    }
}
