//! End-to-end dispatch through `#[controller]`-generated handler methods.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};

use waypoint_core::{InMemorySendingOperations, Message, MessageHeaders, MessageType, SendTarget};
use waypoint_framework::{
    ArgumentResolutionError, DispatchError, DispatchOptions, Dispatched, Dispatcher,
    HandlerRegistry, IgnoreReason, Json, MappingKind, RegistrationError,
};
use waypoint_macros::controller;

/// Records the last invoked method and the arguments it received.
#[derive(Default)]
struct TestController {
    method: Mutex<Option<&'static str>>,
    arguments: Mutex<BTreeMap<&'static str, Value>>,
}

impl TestController {
    fn record(&self, method: &'static str, args: &[(&'static str, Value)]) {
        *self.method.lock() = Some(method);
        let mut arguments = self.arguments.lock();
        arguments.clear();
        arguments.extend(args.iter().cloned());
    }

    fn method(&self) -> Option<&'static str> {
        *self.method.lock()
    }

    fn argument(&self, name: &str) -> Option<Value> {
        self.arguments.lock().get(name).cloned()
    }
}

#[controller(crate = "::waypoint_framework")]
impl TestController {
    #[message_mapping("/headers")]
    fn headers(&self, #[header] foo: String, #[headers] headers: MessageHeaders) {
        let all = serde_json::to_value(&headers).unwrap_or(Value::Null);
        self.record("headers", &[("foo", json!(foo)), ("headers", all)]);
    }

    #[message_mapping("/message/{foo}/{name}")]
    fn message_mapping_destination_variable(
        &self,
        #[path_variable("foo")] param1: String,
        #[path_variable("name")] param2: String,
    ) {
        self.record(
            "messageMappingDestinationVariable",
            &[("foo", json!(param1)), ("name", json!(param2))],
        );
    }

    #[subscribe_mapping("/sub/{foo}/{name}")]
    fn subscribe_event_destination_variable(
        &self,
        #[path_variable("foo")] param1: String,
        #[path_variable("name")] param2: String,
    ) {
        self.record(
            "subscribeEventDestinationVariable",
            &[("foo", json!(param1)), ("name", json!(param2))],
        );
    }

    #[message_mapping("/pathmatch/wildcard/**")]
    fn path_match_wildcard(&self) {
        self.record("pathMatchWildcard", &[]);
    }

    #[message_mapping("/bestmatch/{foo}/path")]
    fn best_match_path(&self, #[path_variable] foo: String) {
        self.record("bestMatch", &[("foo", json!(foo))]);
    }

    #[message_mapping("/bestmatch/**")]
    fn second_best_match(&self) {
        self.record("secondBestMatch", &[]);
    }

    #[message_mapping("/binding/id/{id}")]
    fn simple_binding(&self, #[path_variable] id: i64) {
        self.record("simpleBinding", &[("id", json!(id))]);
    }

    /// Not mapped: ignored by the macro.
    #[allow(dead_code)]
    fn helper(&self) -> usize {
        0
    }
}

struct DuplicateController;

#[controller(crate = "::waypoint_framework")]
impl DuplicateController {
    #[message_mapping("/duplicate")]
    fn first(&self) {}

    #[message_mapping("/duplicate")]
    fn second(&self) {}
}

struct MisnamedVariableController;

#[controller(crate = "::waypoint_framework")]
impl MisnamedVariableController {
    #[message_mapping("/orders/{id}")]
    fn by_id(&self, #[path_variable("idd")] id: i64) -> i64 {
        id
    }
}

struct ReplyController;

#[derive(serde::Serialize, serde::Deserialize)]
struct Quote {
    symbol: String,
    price: f64,
}

#[controller(prefix = "/desk", crate = "::waypoint_framework")]
impl ReplyController {
    #[message_mapping]
    fn index(&self) -> String {
        "desk".to_string()
    }

    #[message_mapping("/greet/{name}")]
    fn greet(&self, #[path_variable] name: String) -> String {
        format!("hello {name}")
    }

    #[message_mapping("/quote")]
    #[send_to("/topic/quotes")]
    fn quote(&self, #[payload] quote: Json<Quote>) -> Json<Quote> {
        Json(Quote {
            symbol: quote.symbol.to_uppercase(),
            price: quote.price,
        })
    }

    #[subscribe_mapping("/positions")]
    fn positions(&self, #[header(name = "limit", default = "10")] limit: u32) -> String {
        format!("limit={limit}")
    }

    #[message_mapping("/fail")]
    fn fail(&self) -> Result<String, std::io::Error> {
        Err(std::io::Error::other("handler failed"))
    }

    #[message_mapping("/optional")]
    fn optional(&self, #[header] trace: Option<String>, body: Option<String>) -> String {
        format!("{}|{}", trace.unwrap_or_default(), body.unwrap_or_default())
    }
}

fn setup() -> (Arc<TestController>, Dispatcher, Arc<InMemorySendingOperations>) {
    let controller = Arc::new(TestController::default());
    let mut registry = HandlerRegistry::new();
    registry.register_handler(controller.clone()).unwrap();

    let sender = Arc::new(InMemorySendingOperations::new());
    let dispatcher = Dispatcher::new(registry, sender.clone());
    (controller, dispatcher, sender)
}

fn message(destination: &str) -> Message {
    Message::builder().destination(destination).build()
}

#[test]
fn test_header_arguments() {
    let (controller, dispatcher, _) = setup();
    let msg = Message::builder()
        .destination("/headers")
        .header("foo", "bar")
        .build();

    dispatcher.handle_message(&msg).unwrap();

    assert_eq!(controller.method(), Some("headers"));
    assert_eq!(controller.argument("foo"), Some(json!("bar")));
    let headers = controller.argument("headers").unwrap();
    assert_eq!(headers["foo"], json!("bar"));
}

#[test]
fn test_duplicate_pattern_mapping() {
    let mut registry = HandlerRegistry::new();
    let err = registry
        .register_handler(Arc::new(DuplicateController))
        .unwrap_err();

    assert!(matches!(
        err,
        RegistrationError::DuplicateMapping { kind: MappingKind::Message, ref pattern, .. }
            if pattern == "/duplicate"
    ));
    assert_eq!(registry.method_count(), 0);
}

#[test]
fn test_message_mapping_destination_variable() {
    let (controller, dispatcher, _) = setup();

    dispatcher
        .handle_message(&message("/message/bar/value"))
        .unwrap();

    assert_eq!(controller.method(), Some("messageMappingDestinationVariable"));
    assert_eq!(controller.argument("foo"), Some(json!("bar")));
    assert_eq!(controller.argument("name"), Some(json!("value")));
}

#[test]
fn test_subscribe_event_destination_variable() {
    let (controller, dispatcher, _) = setup();
    let msg = Message::builder()
        .message_type(MessageType::Subscribe)
        .destination("/sub/bar/value")
        .build();

    dispatcher.handle_message(&msg).unwrap();

    assert_eq!(controller.method(), Some("subscribeEventDestinationVariable"));
    assert_eq!(controller.argument("foo"), Some(json!("bar")));
    assert_eq!(controller.argument("name"), Some(json!("value")));

    // The same destination as a plain message has no mapping.
    let outcome = dispatcher.handle_message(&message("/sub/bar/value")).unwrap();
    assert_eq!(outcome, Dispatched::Ignored(IgnoreReason::NoMatch));
}

#[test]
fn test_antstyle_path_match() {
    let (controller, dispatcher, _) = setup();

    dispatcher
        .handle_message(&message("/pathmatch/wildcard/test"))
        .unwrap();

    assert_eq!(controller.method(), Some("pathMatchWildcard"));
    assert!(controller.arguments.lock().is_empty());
}

#[test]
fn test_best_match_wildcard_path() {
    let (controller, dispatcher, _) = setup();

    dispatcher
        .handle_message(&message("/bestmatch/bar/path"))
        .unwrap();

    assert_eq!(controller.method(), Some("bestMatch"));
    assert_eq!(controller.argument("foo"), Some(json!("bar")));

    dispatcher
        .handle_message(&message("/bestmatch/bar/other"))
        .unwrap();
    assert_eq!(controller.method(), Some("secondBestMatch"));
}

#[test]
fn test_simple_binding() {
    let (controller, dispatcher, _) = setup();

    dispatcher.handle_message(&message("/binding/id/12")).unwrap();

    assert_eq!(controller.method(), Some("simpleBinding"));
    let id = controller.argument("id").unwrap();
    assert!(id.is_i64());
    assert_eq!(id, json!(12));
}

#[test]
fn test_binding_type_mismatch() {
    let (controller, dispatcher, sender) = setup();

    let err = dispatcher
        .handle_message(&message("/binding/id/twelve"))
        .unwrap_err();

    assert!(matches!(
        err,
        DispatchError::Resolution {
            source: ArgumentResolutionError::TypeMismatch { .. },
            ..
        }
    ));
    assert_eq!(controller.method(), None);
    assert!(sender.is_empty());
}

#[test]
fn test_missing_header_is_reported() {
    let (_, dispatcher, _) = setup();

    let err = dispatcher.handle_message(&message("/headers")).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Resolution {
            source: ArgumentResolutionError::MissingHeader { ref name },
            ..
        } if name == "foo"
    ));
}

#[test]
fn test_repeated_dispatch_is_independent() {
    let (controller, dispatcher, _) = setup();
    let msg = message("/message/bar/value");

    dispatcher.handle_message(&msg).unwrap();
    let first: Vec<_> = controller.arguments.lock().clone().into_iter().collect();
    dispatcher.handle_message(&msg).unwrap();
    let second: Vec<_> = controller.arguments.lock().clone().into_iter().collect();

    assert_eq!(first, second);
}

#[test]
fn test_concurrent_dispatch() {
    let (dispatcher, sender) = reply_setup();

    std::thread::scope(|scope| {
        for t in 0..4 {
            let dispatcher = dispatcher.clone();
            scope.spawn(move || {
                for i in 0..25 {
                    let dest = format!("/app/desk/greet/u{t}-{i}");
                    let outcome = dispatcher.handle_message(&message(&dest)).unwrap();
                    assert_eq!(outcome.method(), Some("ReplyController::greet"));
                }
            });
        }
    });

    let sent = sender.take();
    assert_eq!(sent.len(), 100);
    for out in &sent {
        let name = out.target.destination().trim_start_matches("/topic/desk/greet/");
        assert_eq!(
            out.message.payload().as_str(),
            Some(format!("hello {name}").as_str())
        );
    }
}

#[test]
fn test_uncaptured_path_variable_fails_registration() {
    let mut registry = HandlerRegistry::new();
    let err = registry
        .register_handler(Arc::new(MisnamedVariableController))
        .unwrap_err();

    assert!(matches!(
        err,
        RegistrationError::UnsupportedParameter { ref method, .. }
            if method == "MisnamedVariableController::by_id"
    ));
    assert_eq!(registry.method_count(), 0);
}

fn reply_setup() -> (Dispatcher, Arc<InMemorySendingOperations>) {
    let mut registry = HandlerRegistry::new();
    registry
        .register_handler(Arc::new(ReplyController))
        .unwrap();
    let sender = Arc::new(InMemorySendingOperations::new());
    let dispatcher = Dispatcher::with_options(
        registry,
        sender.clone(),
        DispatchOptions::new().with_destination_prefixes(["/app"]),
    );
    (dispatcher, sender)
}

#[test]
fn test_controller_prefix_and_broker_reply() {
    let (dispatcher, sender) = reply_setup();

    let outcome = dispatcher
        .handle_message(&message("/app/desk/greet/ann"))
        .unwrap();
    assert_eq!(
        outcome,
        Dispatched::Forwarded {
            method: "ReplyController::greet".into(),
            target: SendTarget::Destination("/topic/desk/greet/ann".into()),
        }
    );
    assert_eq!(sender.take()[0].message.payload().as_str(), Some("hello ann"));

    // Without the controller prefix nothing matches.
    assert!(
        dispatcher
            .handle_message(&message("/app/greet/ann"))
            .unwrap()
            .is_ignored()
    );
}

#[test]
fn test_send_to_with_json() {
    let (dispatcher, sender) = reply_setup();
    let msg = Message::builder()
        .destination("/app/desk/quote")
        .payload(r#"{"symbol":"abc","price":1.5}"#)
        .build();

    dispatcher.handle_message(&msg).unwrap();

    let sent = sender.take();
    assert_eq!(sent[0].target, SendTarget::Destination("/topic/quotes".into()));
    let body: Value = serde_json::from_slice(sent[0].message.payload().as_bytes()).unwrap();
    assert_eq!(body, json!({ "symbol": "ABC", "price": 1.5 }));
    assert_eq!(
        sent[0].message.headers().content_type(),
        Some("application/json")
    );
}

#[test]
fn test_subscribe_reply_to_session_with_header_default() {
    let (dispatcher, sender) = reply_setup();
    let msg = Message::builder()
        .message_type(MessageType::Subscribe)
        .destination("/app/desk/positions")
        .session_id("sess-1")
        .subscription_id("sub-1")
        .build();

    dispatcher.handle_message(&msg).unwrap();

    let sent = sender.take();
    assert_eq!(
        sent[0].target,
        SendTarget::Session {
            session_id: "sess-1".into(),
            destination: "/app/desk/positions".into(),
        }
    );
    assert_eq!(sent[0].message.payload().as_str(), Some("limit=10"));
    assert_eq!(sent[0].message.headers().subscription_id(), Some("sub-1"));
}

#[test]
fn test_handler_error_sends_nothing() {
    let (dispatcher, sender) = reply_setup();

    let err = dispatcher
        .handle_message(&message("/app/desk/fail"))
        .unwrap_err();

    let DispatchError::Invocation { method, source } = err else {
        panic!("expected an invocation error");
    };
    assert_eq!(method, "ReplyController::fail");
    assert!(source.downcast_ref::<std::io::Error>().is_some());
    assert!(sender.is_empty());
}

#[test]
fn test_optional_arguments() {
    let (dispatcher, sender) = reply_setup();

    dispatcher
        .handle_message(&message("/app/desk/optional"))
        .unwrap();
    dispatcher
        .handle_message(
            &Message::builder()
                .destination("/app/desk/optional")
                .header("trace", "t-1")
                .payload("body")
                .build(),
        )
        .unwrap();

    let sent = sender.take();
    assert_eq!(sent[0].message.payload().as_str(), Some("|"));
    assert_eq!(sent[1].message.payload().as_str(), Some("t-1|body"));
}

#[test]
fn test_bare_mapping_uses_controller_prefix() {
    let (dispatcher, sender) = reply_setup();

    let outcome = dispatcher.handle_message(&message("/app/desk")).unwrap();
    assert_eq!(
        outcome,
        Dispatched::Forwarded {
            method: "ReplyController::index".into(),
            target: SendTarget::Destination("/topic/desk".into()),
        }
    );
    assert_eq!(sender.take()[0].message.payload().as_str(), Some("desk"));
}
