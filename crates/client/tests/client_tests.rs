//! Tests for the client's service method cache.
//!
//! # Test Coverage
//!
//! - Build once, invoke many: repeated lookups share one `ServiceMethod`
//! - Concurrent first use converges on a single cached instance
//! - `discard` evicts, the next use rebuilds
//! - Eager validation surfaces declaration errors at construction
//! - Unknown, duplicate and malformed declarations
//! - Only the declared descriptor may populate the cache under its id
//! - Declared methods issue requests built from their path template

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use adapters::JsonConverterFactory;
use async_trait::async_trait;
use bytes::Bytes;
use client::{Client, ClientConfig, ClientError};
use dispatch::{
    Arguments, CallFactory, ConfigurationError, DeclaredReturn, MethodDescriptor, MethodId,
    ParameterBinding, RawCall, RawResponse, Request, RequestError, RequestFactory, TransportError,
    TypeRef,
};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Answers every request with `{"ok": true}` and records the URIs it saw.
#[derive(Default)]
struct RecordingTransport {
    uris: Arc<Mutex<Vec<String>>>,
    calls: AtomicUsize,
}

struct RecordedCall;

impl CallFactory for RecordingTransport {
    fn new_call(&self, request: Request) -> Box<dyn RawCall> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.uris.lock().unwrap().push(request.uri().to_string());
        Box::new(RecordedCall)
    }
}

#[async_trait]
impl RawCall for RecordedCall {
    async fn execute(&self) -> Result<RawResponse, TransportError> {
        Ok(http::Response::new(Bytes::from_static(br#"{"ok": true}"#)))
    }

    fn cancel(&self) {}
}

struct EmptyRequests;

impl RequestFactory for EmptyRequests {
    fn new_request(&self, _args: &Arguments) -> Result<Request, RequestError> {
        Ok(http::Request::new(Bytes::new()))
    }
}

fn config() -> ClientConfig {
    ClientConfig::from_toml_str(r#"base_url = "https://api.example.com/v1/""#).unwrap()
}

fn id(name: &str) -> MethodId {
    MethodId::new(name).unwrap()
}

fn get_user() -> MethodDescriptor {
    MethodDescriptor::new(
        id("Users.get"),
        http::Method::GET,
        "users/{name}",
        DeclaredReturn::Suspending(TypeRef::named("Json")),
    )
    .with_parameter("name", ParameterBinding::Path)
}

fn head_user_with_body() -> MethodDescriptor {
    MethodDescriptor::new(
        id("Users.exists"),
        http::Method::HEAD,
        "users/{name}",
        DeclaredReturn::Suspending(TypeRef::named("Json")),
    )
    .with_parameter("name", ParameterBinding::Path)
}

fn client_with(transport: Arc<RecordingTransport>, config: ClientConfig) -> Result<Client, ClientError> {
    Client::builder(config)
        .add_converter_factory(Arc::new(JsonConverterFactory::new()))
        .call_factory(transport)
        .declare(get_user())
        .declare(head_user_with_body())
        .build()
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[test]
fn repeated_lookups_share_one_service_method() {
    let client = client_with(Arc::default(), config()).unwrap();
    assert_eq!(client.cached_methods(), 0);

    let first = client.method(&id("Users.get")).unwrap();
    let second = client.method(&id("Users.get")).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(client.cached_methods(), 1);
}

#[test]
fn concurrent_first_use_converges_on_one_instance() {
    let client = client_with(Arc::default(), config()).unwrap();

    let methods: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| client.method(&id("Users.get")).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let cached = client.method(&id("Users.get")).unwrap();
    assert!(methods.iter().all(|m| Arc::ptr_eq(m, &cached)));
}

#[test]
fn discard_forces_a_rebuild() {
    let client = client_with(Arc::default(), config()).unwrap();
    let before = client.method(&id("Users.get")).unwrap();

    assert!(client.discard(&id("Users.get")));
    assert!(!client.discard(&id("Users.get")));
    assert_eq!(client.cached_methods(), 0);

    let after = client.method(&id("Users.get")).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn lazy_client_defers_declaration_errors_to_first_use() {
    let client = client_with(Arc::default(), config()).unwrap();

    let err = client.method(&id("Users.exists")).err().unwrap();
    match err {
        ClientError::Configuration(ConfigurationError::BodylessVerb { method, .. }) => {
            assert_eq!(method, id("Users.exists"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn eager_validation_fails_at_construction() {
    let mut config = config();
    config.validate_eagerly = true;

    let err = client_with(Arc::default(), config).err().unwrap();
    assert!(matches!(
        err,
        ClientError::Configuration(ConfigurationError::BodylessVerb { .. })
    ));
    assert!(err.to_string().ends_with("for method Users.exists"));
}

#[test]
fn unknown_method_is_reported() {
    let client = client_with(Arc::default(), config()).unwrap();
    let err = client.method(&id("Users.delete")).err().unwrap();
    assert!(matches!(err, ClientError::UnknownMethod { .. }));
}

#[test]
fn duplicate_declaration_is_rejected() {
    let err = Client::builder(config())
        .call_factory(Arc::new(RecordingTransport::default()))
        .declare(get_user())
        .declare(get_user())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, ClientError::DuplicateDeclaration { .. }));
}

#[test]
fn malformed_template_names_the_method() {
    let broken = MethodDescriptor::new(
        id("Users.broken"),
        http::Method::GET,
        "users/{name}",
        DeclaredReturn::Suspending(TypeRef::named("Json")),
    );
    let client = Client::builder(config())
        .call_factory(Arc::new(RecordingTransport::default()))
        .declare(broken)
        .build()
        .unwrap();

    let err = client.method(&id("Users.broken")).err().unwrap();
    assert!(matches!(err, ClientError::Template { .. }));
    assert!(err.to_string().contains("Users.broken"));
}

#[test]
fn foreign_descriptor_cannot_shadow_declaration() {
    let client = client_with(Arc::default(), config()).unwrap();
    let foreign = MethodDescriptor::new(
        id("Users.get"),
        http::Method::HEAD,
        "elsewhere",
        DeclaredReturn::Suspending(TypeRef::unit()),
    );

    let err = client
        .service_method(&foreign, Arc::new(EmptyRequests))
        .err()
        .unwrap();
    assert!(matches!(err, ClientError::DescriptorMismatch { .. }));
    assert_eq!(client.cached_methods(), 0);

    let declared = client.method(&id("Users.get")).unwrap();
    assert_eq!(declared.response_type(), &TypeRef::named("Json"));
}

#[test]
fn undeclared_descriptor_is_rejected() {
    let client = client_with(Arc::default(), config()).unwrap();
    let undeclared = MethodDescriptor::new(
        id("Users.list"),
        http::Method::GET,
        "users",
        DeclaredReturn::Suspending(TypeRef::named("Json")),
    );

    let err = client
        .service_method(&undeclared, Arc::new(EmptyRequests))
        .err()
        .unwrap();
    assert!(matches!(err, ClientError::UnknownMethod { .. }));
}

#[test]
fn declared_descriptor_shares_the_cached_method() {
    let client = client_with(Arc::default(), config()).unwrap();
    let via_descriptor = client
        .service_method(&get_user(), Arc::new(EmptyRequests))
        .unwrap();
    let via_id = client.method(&id("Users.get")).unwrap();
    assert!(Arc::ptr_eq(&via_descriptor, &via_id));
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invoke_builds_request_from_template_and_base_url() {
    let transport = Arc::new(RecordingTransport::default());
    let client = client_with(Arc::clone(&transport), config()).unwrap();

    let body: Value = client
        .invoke(&id("Users.get"), Arguments::new(vec![json!("octo cat")]))
        .unwrap()
        .resolve_as()
        .await
        .unwrap();
    assert_eq!(body, json!({"ok": true}));

    let uris = transport.uris.lock().unwrap().clone();
    assert_eq!(uris, vec!["https://api.example.com/v1/users/octo%20cat".to_owned()]);
}

#[tokio::test]
async fn each_invocation_gets_a_fresh_call() {
    let transport = Arc::new(RecordingTransport::default());
    let client = client_with(Arc::clone(&transport), config()).unwrap();

    for name in ["a", "b", "c"] {
        client
            .invoke(&id("Users.get"), Arguments::new(vec![json!(name)]))
            .unwrap()
            .resolve()
            .await
            .unwrap();
    }
    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    assert_eq!(client.cached_methods(), 1);
}
