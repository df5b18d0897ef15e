use std::{cell::RefCell, rc::Rc, time::Duration};

use replisync::{
    AllowList, CallId, ClassFilter, ConnectionId, ConstructorId, Endpoint, EndpointConfig,
    FieldId, FilterTarget, Instance, InvokeError, LocalInvoke, MetadataStore,
    MethodDescriptor, MethodId, PairDescriptor, PeerTransport, Value, ValueInterpreter,
    WireMessage, ERR_EXPIRED_IN_FLIGHT, ERR_INBOUND_NOT_ALLOWED,
};

const METHOD_WAVE: MethodId = MethodId::new(3);

struct Puppet;

impl Instance for Puppet {
    fn read_field(&self, _field: FieldId) -> Value {
        Value::Null
    }

    fn write_field(&mut self, _field: FieldId, _value: Value) {}

    fn construction(&self) -> (ConstructorId, Vec<Value>) {
        (ConstructorId::new(0), Vec::new())
    }
}

#[derive(Clone)]
struct RecordingTransport {
    sent: Rc<RefCell<Vec<(WireMessage, bool)>>>,
}

impl RecordingTransport {
    fn new() -> Self {
        Self {
            sent: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn rpc_messages(&self) -> Vec<WireMessage> {
        self.sent
            .borrow()
            .iter()
            .filter(|(message, _)| {
                matches!(
                    message,
                    WireMessage::RpcCall { .. }
                        | WireMessage::RpcResult { .. }
                        | WireMessage::RpcError { .. }
                )
            })
            .map(|(message, _)| message.clone())
            .collect()
    }
}

impl PeerTransport for RecordingTransport {
    fn send(&mut self, message: &WireMessage, reliable: bool) {
        self.sent.borrow_mut().push((message.clone(), reliable));
    }
}

#[derive(Default)]
struct Outcomes {
    results: Vec<(CallId, ConnectionId, Value)>,
    errors: Vec<(CallId, ConnectionId, String)>,
    timeouts: Vec<(CallId, ConnectionId)>,
}

struct RecordingHandler {
    outcomes: Rc<RefCell<Outcomes>>,
}

impl replisync::ResponseHandler for RecordingHandler {
    fn on_result(&mut self, call: CallId, from: ConnectionId, result: Value) {
        self.outcomes.borrow_mut().results.push((call, from, result));
    }

    fn on_error(&mut self, call: CallId, from: ConnectionId, message: &str) {
        self.outcomes
            .borrow_mut()
            .errors
            .push((call, from, message.to_string()));
    }

    fn on_timeout(&mut self, call: CallId, connection: ConnectionId) {
        self.outcomes.borrow_mut().timeouts.push((call, connection));
    }
}

fn wave_method(
    invocations: Rc<RefCell<usize>>,
    local_invoke: LocalInvoke,
    allow_inbound: AllowList,
    fail: bool,
) -> MethodDescriptor {
    MethodDescriptor {
        id: METHOD_WAVE,
        name: "wave".to_string(),
        reliable: true,
        call_timeout: Some(Duration::from_millis(500)),
        result_timeout: Duration::from_millis(200),
        allow_inbound,
        local_invoke,
        handler: Box::new(move |_instance, params| {
            *invocations.borrow_mut() += 1;
            if fail {
                return Err(InvokeError::new("wave refused"));
            }
            Ok(Value::Int(params.len() as i64))
        }),
    }
}

/// An endpoint whose local class is `local` paired against `connected`,
/// declaring only the wave method.
fn endpoint_with_method(
    local: &str,
    connected: &str,
    method: MethodDescriptor,
) -> Endpoint {
    let mut store = MetadataStore::new();
    let local_class = store.register_class(local);
    let connected_class = store.register_class(connected);
    store
        .register_pair(PairDescriptor {
            local_class,
            connected_class,
            fields: Vec::new(),
            methods: vec![method],
        })
        .unwrap();
    Endpoint::new(EndpointConfig::default(), store)
}

fn caller_setup(
    local_invoke: LocalInvoke,
) -> (
    Endpoint,
    Rc<RefCell<usize>>,
    replisync::EntityId,
    RecordingTransport,
    ConnectionId,
) {
    let invocations = Rc::new(RefCell::new(0));
    let method = wave_method(
        invocations.clone(),
        local_invoke,
        AllowList::allow_any(),
        false,
    );
    let mut endpoint = endpoint_with_method("driver", "watcher", method);
    let transport = RecordingTransport::new();
    let conn = ConnectionId::new(1);
    endpoint
        .connect(conn, "watcher", Box::new(transport.clone()))
        .unwrap();
    let class = endpoint.metadata().class_id("driver").unwrap();
    let entity = endpoint.register_entity(Box::new(Puppet), class).unwrap();
    (endpoint, invocations, entity, transport, conn)
}

#[test]
fn a_result_resolves_the_call_and_releases_the_id() {
    let (mut endpoint, _invocations, entity, transport, conn) =
        caller_setup(LocalInvoke::None);

    let outcomes = Rc::new(RefCell::new(Outcomes::default()));
    let call = endpoint
        .send_call(
            entity,
            METHOD_WAVE,
            &[Value::Int(1)],
            &[conn],
            Some(Box::new(RecordingHandler {
                outcomes: outcomes.clone(),
            })),
        )
        .unwrap()
        .expect("a handler was given, a call id must be allocated");

    let sent = transport.rpc_messages();
    assert_eq!(sent.len(), 1);
    let WireMessage::RpcCall {
        call: sent_call,
        reliable,
        ..
    } = &sent[0]
    else {
        panic!("expected an RpcCall message");
    };
    assert_eq!(*sent_call, Some(call));
    assert!(*reliable);
    assert!(endpoint.calls().is_pending(call));

    let packed = replisync::BasicInterpreter.pack(&Value::Int(1));
    endpoint
        .message_sink()
        .receive_rpc_result(conn, call, packed, true);
    endpoint.tick_at(10);

    let outcomes = outcomes.borrow();
    assert_eq!(outcomes.results.len(), 1);
    assert_eq!(outcomes.results[0].0, call);
    assert_eq!(outcomes.results[0].2, Value::Int(1));
    assert!(outcomes.timeouts.is_empty());
    assert!(!endpoint.calls().is_pending(call));
}

#[test]
fn timeouts_fire_once_per_unanswered_connection() {
    let invocations = Rc::new(RefCell::new(0));
    let method = wave_method(
        invocations,
        LocalInvoke::None,
        AllowList::allow_any(),
        false,
    );
    let mut endpoint = endpoint_with_method("driver", "watcher", method);
    let transport_a = RecordingTransport::new();
    let transport_b = RecordingTransport::new();
    let conn_a = ConnectionId::new(1);
    let conn_b = ConnectionId::new(2);
    endpoint
        .connect(conn_a, "watcher", Box::new(transport_a))
        .unwrap();
    endpoint
        .connect(conn_b, "watcher", Box::new(transport_b))
        .unwrap();
    let class = endpoint.metadata().class_id("driver").unwrap();
    let entity = endpoint.register_entity(Box::new(Puppet), class).unwrap();

    let outcomes = Rc::new(RefCell::new(Outcomes::default()));
    let call = endpoint
        .send_call(
            entity,
            METHOD_WAVE,
            &[],
            &[conn_a, conn_b],
            Some(Box::new(RecordingHandler {
                outcomes: outcomes.clone(),
            })),
        )
        .unwrap()
        .unwrap();
    assert_eq!(endpoint.calls().pending_count(call), 2);

    // conn_a answers in time; its response is honored over the sweep
    let packed = replisync::BasicInterpreter.pack(&Value::Int(0));
    endpoint
        .message_sink()
        .receive_rpc_result(conn_a, call, packed, true);
    endpoint.tick_at(10);
    assert_eq!(endpoint.calls().pending_count(call), 1);

    // far past the result timeout: exactly one notification, for conn_b
    endpoint.tick_at(10_000);
    let outcomes = outcomes.borrow();
    assert_eq!(outcomes.results.len(), 1);
    assert_eq!(outcomes.timeouts, vec![(call, conn_b)]);
    assert!(!endpoint.calls().is_pending(call));
}

#[test]
fn disconnecting_force_resolves_only_that_connection() {
    let invocations = Rc::new(RefCell::new(0));
    let method = wave_method(
        invocations,
        LocalInvoke::None,
        AllowList::allow_any(),
        false,
    );
    let mut endpoint = endpoint_with_method("driver", "watcher", method);
    let conn_c = ConnectionId::new(3);
    let conn_d = ConnectionId::new(4);
    endpoint
        .connect(conn_c, "watcher", Box::new(RecordingTransport::new()))
        .unwrap();
    endpoint
        .connect(conn_d, "watcher", Box::new(RecordingTransport::new()))
        .unwrap();
    let class = endpoint.metadata().class_id("driver").unwrap();
    let entity = endpoint.register_entity(Box::new(Puppet), class).unwrap();

    let outcomes = Rc::new(RefCell::new(Outcomes::default()));
    let call = endpoint
        .send_call(
            entity,
            METHOD_WAVE,
            &[],
            &[conn_c, conn_d],
            Some(Box::new(RecordingHandler {
                outcomes: outcomes.clone(),
            })),
        )
        .unwrap()
        .unwrap();

    endpoint.disconnect(conn_c);

    // c's pending entry resolved as timed out, d's remains pending
    assert_eq!(outcomes.borrow().timeouts, vec![(call, conn_c)]);
    assert!(endpoint.calls().is_pending(call));
    assert_eq!(endpoint.calls().pending_count(call), 1);
}

#[test]
fn no_response_calls_allocate_no_id() {
    let (mut endpoint, _invocations, entity, transport, conn) =
        caller_setup(LocalInvoke::None);

    let call = endpoint
        .send_call(entity, METHOD_WAVE, &[], &[conn], None)
        .unwrap();
    assert_eq!(call, None);

    let sent = transport.rpc_messages();
    assert_eq!(sent.len(), 1);
    let WireMessage::RpcCall { call, .. } = &sent[0] else {
        panic!("expected an RpcCall message");
    };
    assert_eq!(*call, None);
}

#[test]
fn local_invocation_runs_on_the_callers_instance() {
    let (mut endpoint, invocations, entity, _transport, conn) =
        caller_setup(LocalInvoke::Before);

    endpoint
        .send_call(entity, METHOD_WAVE, &[], &[conn], None)
        .unwrap();
    assert_eq!(*invocations.borrow(), 1);
}

// Receiver side

fn receiver_setup(
    allow_inbound: AllowList,
    fail: bool,
) -> (
    Endpoint,
    Rc<RefCell<usize>>,
    replisync::EntityId,
    RecordingTransport,
    ConnectionId,
) {
    let invocations = Rc::new(RefCell::new(0));
    let method = wave_method(
        invocations.clone(),
        LocalInvoke::None,
        allow_inbound,
        fail,
    );
    let mut endpoint = endpoint_with_method("watcher", "driver", method);
    let transport = RecordingTransport::new();
    let conn = ConnectionId::new(9);
    endpoint
        .connect(conn, "driver", Box::new(transport.clone()))
        .unwrap();
    let class = endpoint.metadata().class_id("watcher").unwrap();
    let entity = endpoint.register_entity(Box::new(Puppet), class).unwrap();
    (endpoint, invocations, entity, transport, conn)
}

#[test]
fn a_fresh_inbound_call_is_invoked_and_answered() {
    let (mut endpoint, invocations, entity, transport, conn) =
        receiver_setup(AllowList::allow_any(), false);

    let params = vec![
        replisync::BasicInterpreter.pack(&Value::Str("hello".to_string())),
        replisync::BasicInterpreter.pack(&Value::Int(2)),
    ];
    endpoint.message_sink().receive_rpc_call(
        conn,
        entity,
        METHOD_WAVE,
        Some(CallId::new(11)),
        params,
        true,
        1_000,
    );
    endpoint.tick_at(1_200);

    assert_eq!(*invocations.borrow(), 1);
    let sent = transport.rpc_messages();
    assert_eq!(sent.len(), 1);
    let WireMessage::RpcResult { call, result, .. } = &sent[0] else {
        panic!("expected an RpcResult message");
    };
    assert_eq!(*call, CallId::new(11));
    assert_eq!(
        replisync::BasicInterpreter.unpack(result).unwrap(),
        Value::Int(2)
    );
}

#[test]
fn an_expired_call_is_rejected_unexecuted() {
    let (mut endpoint, invocations, entity, transport, conn) =
        receiver_setup(AllowList::allow_any(), false);

    // sender estimated our clock at 100; with a 500ms call timeout the call
    // already expired in flight by local time 1000
    endpoint.message_sink().receive_rpc_call(
        conn,
        entity,
        METHOD_WAVE,
        Some(CallId::new(12)),
        Vec::new(),
        true,
        100,
    );
    endpoint.tick_at(1_000);

    assert_eq!(*invocations.borrow(), 0);
    let sent = transport.rpc_messages();
    assert_eq!(sent.len(), 1);
    let WireMessage::RpcError { call, message, .. } = &sent[0] else {
        panic!("expected an RpcError message");
    };
    assert_eq!(*call, CallId::new(12));
    assert_eq!(message, ERR_EXPIRED_IN_FLIGHT);
}

#[test]
fn an_expired_call_with_no_response_expected_is_dropped_silently() {
    let (mut endpoint, invocations, entity, transport, conn) =
        receiver_setup(AllowList::allow_any(), false);

    endpoint
        .message_sink()
        .receive_rpc_call(conn, entity, METHOD_WAVE, None, Vec::new(), true, 100);
    endpoint.tick_at(1_000);

    assert_eq!(*invocations.borrow(), 0);
    assert!(transport.rpc_messages().is_empty());
}

#[test]
fn disallowed_callers_get_an_error_result() {
    let (mut endpoint, invocations, entity, transport, conn) = receiver_setup(
        AllowList::new(vec![ClassFilter::new(FilterTarget::Any, false)]),
        false,
    );

    endpoint.message_sink().receive_rpc_call(
        conn,
        entity,
        METHOD_WAVE,
        Some(CallId::new(13)),
        Vec::new(),
        true,
        2_000,
    );
    endpoint.tick_at(2_000);

    assert_eq!(*invocations.borrow(), 0);
    let sent = transport.rpc_messages();
    assert_eq!(sent.len(), 1);
    let WireMessage::RpcError { message, .. } = &sent[0] else {
        panic!("expected an RpcError message");
    };
    assert_eq!(message, ERR_INBOUND_NOT_ALLOWED);
}

#[test]
fn invocation_failures_become_error_results() {
    let (mut endpoint, invocations, entity, transport, conn) =
        receiver_setup(AllowList::allow_any(), true);

    endpoint.message_sink().receive_rpc_call(
        conn,
        entity,
        METHOD_WAVE,
        Some(CallId::new(14)),
        Vec::new(),
        true,
        2_000,
    );
    endpoint.tick_at(2_000);

    assert_eq!(*invocations.borrow(), 1);
    let sent = transport.rpc_messages();
    assert_eq!(sent.len(), 1);
    let WireMessage::RpcError { message, .. } = &sent[0] else {
        panic!("expected an RpcError message");
    };
    assert_eq!(message, "wave refused");
}
