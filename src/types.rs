/// Milliseconds on an endpoint's local monotonic clock.
pub type ClockMillis = u64;

/// Sequence number carried by clock-sync probes.
pub type SequenceId = u16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostRole {
    Authority,
    Peer,
}

impl HostRole {
    pub fn invert(self) -> Self {
        match self {
            HostRole::Authority => HostRole::Peer,
            HostRole::Peer => HostRole::Authority,
        }
    }
}

macro_rules! id_type {
    ($(#[$docs:meta])* $name:ident) => {
        $(#[$docs])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u16);

        impl $name {
            pub const fn new(value: u16) -> Self {
                Self(value)
            }

            pub const fn value(&self) -> u16 {
                self.0
            }
        }

        impl From<u16> for $name {
            fn from(value: u16) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u16 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

id_type!(
    /// Stable identity of a replicated entity. Unique among currently
    /// registered entities; a recycled id names a distinct logical entity.
    EntityId
);
id_type!(
    /// Identity of an in-flight remote procedure call. Unique while any
    /// registry entry references it.
    CallId
);
id_type!(
    /// A registered entity class, resolved from its name through the
    /// metadata store.
    ClassId
);
id_type!(
    /// A replicated field within a class pair's declaration.
    FieldId
);
id_type!(
    /// An update set: a group of fields sharing one (interval, reliability)
    /// pair.
    SetId
);
id_type!(
    /// A remote-procedure method within a class pair's declaration.
    MethodId
);
id_type!(
    /// A replication constructor registered for an entity class.
    ConstructorId
);

/// Handle for a connected peer process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}
