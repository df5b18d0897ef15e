use std::collections::{HashMap, HashSet};
use std::time::Duration;

use log::warn;

use crate::{
    key_generator::KeyGenerator,
    messages::value::Value,
    types::{CallId, ClockMillis, ConnectionId},
};

/// How long a released call id is withheld before reuse.
const CALL_ID_RECYCLE_TTL: Duration = Duration::from_secs(5);

/// Receives the asynchronous outcome of an outbound call, per connection.
pub trait ResponseHandler {
    fn on_result(&mut self, call: CallId, from: ConnectionId, result: Value);

    fn on_error(&mut self, call: CallId, from: ConnectionId, message: &str);

    /// Fired once per (call, connection) pair that never answered — a single
    /// call id may time out several times, once per unanswered peer.
    fn on_timeout(&mut self, call: CallId, connection: ConnectionId);
}

struct CallEntry {
    pending: HashSet<ConnectionId>,
    deadline: ClockMillis,
    handler: Box<dyn ResponseHandler>,
}

/// The set of in-flight outbound calls awaiting responses, keyed by call id.
/// An id is released for reuse only when its pending set drains; while any
/// entry references it, it is never handed out again.
pub struct CallRegistry {
    generator: KeyGenerator<CallId>,
    entries: HashMap<CallId, CallEntry>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self {
            generator: KeyGenerator::new(CALL_ID_RECYCLE_TTL),
            entries: HashMap::new(),
        }
    }

    /// Open an entry for a call sent to `targets`, answering through
    /// `handler`, timing out at `deadline`.
    pub fn open(
        &mut self,
        targets: HashSet<ConnectionId>,
        deadline: ClockMillis,
        handler: Box<dyn ResponseHandler>,
    ) -> CallId {
        let call = self.generator.generate();
        if self.entries.contains_key(&call) {
            panic!("Call id generator produced an id that is still pending!");
        }
        self.entries.insert(
            call,
            CallEntry {
                pending: targets,
                deadline,
                handler,
            },
        );
        call
    }

    pub fn is_pending(&self, call: CallId) -> bool {
        self.entries.contains_key(&call)
    }

    pub fn pending_count(&self, call: CallId) -> usize {
        self.entries
            .get(&call)
            .map_or(0, |entry| entry.pending.len())
    }

    /// Deliver a result for (call, from). Unknown ids and unexpected
    /// responders are reported and dropped.
    pub fn deliver_result(&mut self, call: CallId, from: ConnectionId, result: Value) {
        let Some(entry) = self.entries.get_mut(&call) else {
            warn!("Result for call {:?} arrived after release; dropped", call);
            return;
        };
        if !entry.pending.remove(&from) {
            warn!(
                "Result for call {:?} from {:?} which was not pending; dropped",
                call, from
            );
            return;
        }
        entry.handler.on_result(call, from, result);
        self.release_if_drained(call);
    }

    /// Deliver an error result for (call, from).
    pub fn deliver_error(&mut self, call: CallId, from: ConnectionId, message: &str) {
        let Some(entry) = self.entries.get_mut(&call) else {
            warn!("Error for call {:?} arrived after release; dropped", call);
            return;
        };
        if !entry.pending.remove(&from) {
            warn!(
                "Error for call {:?} from {:?} which was not pending; dropped",
                call, from
            );
            return;
        }
        entry.handler.on_error(call, from, message);
        self.release_if_drained(call);
    }

    /// Expire every entry whose deadline has passed, notifying the handler
    /// once per connection still pending. Runs after inbound processing, so
    /// a result that arrived just in time is honored over the timeout.
    pub fn sweep(&mut self, now: ClockMillis) {
        let due: Vec<CallId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(call, _)| *call)
            .collect();
        for call in due {
            let mut entry = self.entries.remove(&call).unwrap();
            for connection in entry.pending.drain() {
                entry.handler.on_timeout(call, connection);
            }
            self.generator.recycle_key(&call);
        }
    }

    /// A connection went away: every entry with it in the pending set is
    /// force-resolved as if it had timed out for that connection. Entries
    /// pending on other connections stay open.
    pub fn drop_connection(&mut self, connection: ConnectionId) {
        let affected: Vec<CallId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.pending.contains(&connection))
            .map(|(call, _)| *call)
            .collect();
        for call in affected {
            let entry = self.entries.get_mut(&call).unwrap();
            entry.pending.remove(&connection);
            entry.handler.on_timeout(call, connection);
            self.release_if_drained(call);
        }
    }

    fn release_if_drained(&mut self, call: CallId) {
        if self
            .entries
            .get(&call)
            .is_some_and(|entry| entry.pending.is_empty())
        {
            self.entries.remove(&call);
            self.generator.recycle_key(&call);
        }
    }
}

impl Default for CallRegistry {
    fn default() -> Self {
        Self::new()
    }
}
