use std::{cell::RefCell, rc::Rc};

use replisync::{
    ConnectionId, ConstructorId, Endpoint, EndpointConfig, EntityEvent, EntityListener,
    FieldId, HostRole, Instance, ListenerError, ListenerFlow, ListenerScope, MetadataStore,
    PairDescriptor, PeerTransport, Value, ValueInterpreter, WireMessage,
};

struct Puppet;

impl Instance for Puppet {
    fn read_field(&self, _field: FieldId) -> Value {
        Value::Null
    }

    fn write_field(&mut self, _field: FieldId, _value: Value) {}

    fn construction(&self) -> (ConstructorId, Vec<Value>) {
        (ConstructorId::new(0), vec![Value::Int(7)])
    }
}

struct NullTransport;

impl PeerTransport for NullTransport {
    fn send(&mut self, _message: &WireMessage, _reliable: bool) {}
}

type EventLog = Rc<RefCell<Vec<(&'static str, EntityEvent)>>>;

struct NamedListener {
    name: &'static str,
    log: EventLog,
    flow: ListenerFlow,
    detach_on_replacing: bool,
    fail: bool,
}

impl NamedListener {
    fn recording(name: &'static str, log: EventLog) -> Box<Self> {
        Box::new(Self {
            name,
            log,
            flow: ListenerFlow::Continue,
            detach_on_replacing: false,
            fail: false,
        })
    }
}

impl EntityListener for NamedListener {
    fn on_event(
        &mut self,
        event: &EntityEvent,
        _origin: Option<ConnectionId>,
    ) -> Result<ListenerFlow, ListenerError> {
        self.log.borrow_mut().push((self.name, *event));
        if self.fail {
            return Err(ListenerError::new("listener exploded"));
        }
        if self.detach_on_replacing && matches!(event, EntityEvent::InstanceReplacing { .. }) {
            return Ok(ListenerFlow::Detach);
        }
        Ok(self.flow)
    }
}

fn bare_endpoint() -> Endpoint {
    let mut store = MetadataStore::new();
    let local = store.register_class("crewmate");
    let connected = store.register_class("observer");
    store
        .register_pair(PairDescriptor {
            local_class: local,
            connected_class: connected,
            fields: Vec::new(),
            methods: Vec::new(),
        })
        .unwrap();
    Endpoint::new(EndpointConfig::default(), store)
}

#[test]
fn registration_tier_fires_before_sorted_instance_listeners() {
    let mut endpoint = bare_endpoint();
    let class = endpoint.metadata().class_id("crewmate").unwrap();
    let entity = endpoint.register_entity(Box::new(Puppet), class).unwrap();

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    endpoint.add_listener(
        ListenerScope::Global,
        5,
        NamedListener::recording("sorted_five_first", log.clone()),
    );
    endpoint.add_listener(
        ListenerScope::Global,
        -1,
        NamedListener::recording("sorted_minus_one", log.clone()),
    );
    endpoint.add_listener(
        ListenerScope::Global,
        5,
        NamedListener::recording("sorted_five_second", log.clone()),
    );
    endpoint.add_entity_listener(entity, NamedListener::recording("registration", log.clone()));

    endpoint.unregister_entity(entity);

    let order: Vec<&'static str> = log.borrow().iter().map(|(name, _)| *name).collect();
    assert_eq!(
        order,
        vec![
            "registration",
            "sorted_minus_one",
            "sorted_five_first",
            "sorted_five_second",
        ]
    );
    assert!(log
        .borrow()
        .iter()
        .all(|(_, event)| matches!(event, EntityEvent::Removed { .. })));
}

#[test]
fn replace_fires_the_replacing_replaced_pair() {
    let mut endpoint = bare_endpoint();
    let class = endpoint.metadata().class_id("crewmate").unwrap();
    let entity = endpoint.register_entity(Box::new(Puppet), class).unwrap();

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    endpoint.add_listener(
        ListenerScope::Entity(entity),
        0,
        NamedListener::recording("observer", log.clone()),
    );

    endpoint
        .replace_instance(entity, Box::new(Puppet), class)
        .unwrap();

    let events: Vec<EntityEvent> = log.borrow().iter().map(|(_, event)| *event).collect();
    assert_eq!(
        events,
        vec![
            EntityEvent::InstanceReplacing { entity, class },
            EntityEvent::InstanceReplaced { entity, class },
        ]
    );
}

#[test]
fn detaching_during_replacing_suppresses_the_paired_replaced() {
    let mut endpoint = bare_endpoint();
    let class = endpoint.metadata().class_id("crewmate").unwrap();
    let entity = endpoint.register_entity(Box::new(Puppet), class).unwrap();

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    endpoint.add_listener(
        ListenerScope::Global,
        0,
        Box::new(NamedListener {
            name: "detaching",
            log: log.clone(),
            flow: ListenerFlow::Continue,
            detach_on_replacing: true,
            fail: false,
        }),
    );
    endpoint.add_listener(
        ListenerScope::Global,
        1,
        NamedListener::recording("staying", log.clone()),
    );

    endpoint
        .replace_instance(entity, Box::new(Puppet), class)
        .unwrap();

    let seen: Vec<(&'static str, EntityEvent)> = log.borrow().clone();
    // the detaching listener saw only the replacing phase
    assert_eq!(
        seen.iter()
            .filter(|(name, _)| *name == "detaching")
            .count(),
        1
    );
    // the other listener saw both phases of the same change
    assert_eq!(
        seen.iter().filter(|(name, _)| *name == "staying").count(),
        2
    );
}

#[test]
fn a_failing_listener_does_not_abort_the_pass() {
    let mut endpoint = bare_endpoint();
    let class = endpoint.metadata().class_id("crewmate").unwrap();

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    endpoint.add_listener(
        ListenerScope::Global,
        0,
        Box::new(NamedListener {
            name: "failing",
            log: log.clone(),
            flow: ListenerFlow::Continue,
            detach_on_replacing: false,
            fail: true,
        }),
    );
    endpoint.add_listener(
        ListenerScope::Global,
        1,
        NamedListener::recording("after_failure", log.clone()),
    );

    endpoint.register_entity(Box::new(Puppet), class).unwrap();

    let order: Vec<&'static str> = log.borrow().iter().map(|(name, _)| *name).collect();
    assert_eq!(order, vec!["failing", "after_failure"]);
}

#[test]
fn class_scoped_listeners_only_see_their_class() {
    let mut endpoint = bare_endpoint();
    let crewmate = endpoint.metadata().class_id("crewmate").unwrap();
    let observer = endpoint.metadata().class_id("observer").unwrap();

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    endpoint.add_listener(
        ListenerScope::Class(observer),
        0,
        NamedListener::recording("observer_only", log.clone()),
    );

    endpoint.register_entity(Box::new(Puppet), crewmate).unwrap();
    assert!(log.borrow().is_empty());

    endpoint.register_entity(Box::new(Puppet), observer).unwrap();
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn live_entity_ids_are_unique_and_not_immediately_reused() {
    let mut endpoint = bare_endpoint();
    let class = endpoint.metadata().class_id("crewmate").unwrap();

    let first = endpoint.register_entity(Box::new(Puppet), class).unwrap();
    let second = endpoint.register_entity(Box::new(Puppet), class).unwrap();
    assert_ne!(first, second);

    endpoint.unregister_entity(first);
    // the released id is withheld; a new registration is a distinct entity
    let third = endpoint.register_entity(Box::new(Puppet), class).unwrap();
    assert_ne!(third, first);
    assert_ne!(third, second);
}

#[test]
#[should_panic(expected = "not registered")]
fn double_unregistering_is_a_contract_violation() {
    let mut endpoint = bare_endpoint();
    let class = endpoint.metadata().class_id("crewmate").unwrap();
    let entity = endpoint.register_entity(Box::new(Puppet), class).unwrap();
    endpoint.unregister_entity(entity);
    endpoint.unregister_entity(entity);
}

// Remote lifecycle, driven by wire messages

fn peer_endpoint() -> Endpoint {
    let mut store = MetadataStore::new();
    let observer = store.register_class("observer");
    let crewmate = store.register_class("crewmate");
    store
        .register_pair(PairDescriptor {
            local_class: observer,
            connected_class: crewmate,
            fields: Vec::new(),
            methods: Vec::new(),
        })
        .unwrap();
    store
        .register_constructor(
            observer,
            ConstructorId::new(0),
            Box::new(|_params| Ok(Box::new(Puppet) as Box<dyn Instance>)),
        )
        .unwrap();
    Endpoint::new(
        EndpointConfig {
            role: HostRole::Peer,
        },
        store,
    )
}

#[test]
fn entity_init_and_end_drive_the_remote_lifecycle() {
    let mut endpoint = peer_endpoint();
    let conn = ConnectionId::new(6);
    endpoint
        .connect(conn, "crewmate", Box::new(NullTransport))
        .unwrap();

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    endpoint.add_listener(
        ListenerScope::Connection(conn),
        0,
        NamedListener::recording("scoped", log.clone()),
    );

    let entity = replisync::EntityId::new(77);
    let params = vec![replisync::BasicInterpreter.pack(&Value::Int(7))];
    let sink = endpoint.message_sink();
    sink.receive_entity_init(
        conn,
        entity,
        "crewmate".to_string(),
        "observer".to_string(),
        ConstructorId::new(0),
        params,
    );
    endpoint.tick_at(100);

    assert!(endpoint.registry().contains(entity));
    assert_eq!(log.borrow().len(), 1);
    assert!(matches!(
        log.borrow()[0].1,
        EntityEvent::Registered { .. }
    ));

    sink.receive_entity_end(conn, entity);
    endpoint.tick_at(200);

    assert!(!endpoint.registry().contains(entity));
    assert!(matches!(log.borrow()[1].1, EntityEvent::Removed { .. }));
}

#[test]
fn disconnecting_tears_down_entities_replicated_from_that_connection() {
    let mut endpoint = peer_endpoint();
    let conn = ConnectionId::new(6);
    endpoint
        .connect(conn, "crewmate", Box::new(NullTransport))
        .unwrap();

    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    endpoint.add_listener(
        ListenerScope::Global,
        0,
        NamedListener::recording("global", log.clone()),
    );

    let entity = replisync::EntityId::new(78);
    endpoint.message_sink().receive_entity_init(
        conn,
        entity,
        "crewmate".to_string(),
        "observer".to_string(),
        ConstructorId::new(0),
        Vec::new(),
    );
    endpoint.tick_at(100);
    assert!(endpoint.registry().contains(entity));

    endpoint.disconnect(conn);
    assert!(!endpoint.registry().contains(entity));
    assert!(matches!(
        log.borrow().last().unwrap().1,
        EntityEvent::Removed { .. }
    ));
}
