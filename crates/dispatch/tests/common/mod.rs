//! In-memory fakes of every port trait, shared by the dispatch integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use dispatch::{
    AdapterRegistry, Annotations, AnyValue, Arguments, Call, CallAdapter, CallError, CallFactory,
    ConversionError, LookupKind, RawCall, RawResponse, RegistryError, Request, RequestError,
    RequestFactory, ResponseConverter, SuspendCallAdapter, TransportError, TypeRef,
};
use http::StatusCode;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Request factory
// ---------------------------------------------------------------------------

/// Records every argument list it is asked to bind.
#[derive(Default)]
pub struct RecordingRequestFactory {
    pub seen: Mutex<Vec<Arguments>>,
}

impl RecordingRequestFactory {
    pub fn seen(&self) -> Vec<Arguments> {
        self.seen.lock().unwrap().clone()
    }
}

impl RequestFactory for RecordingRequestFactory {
    fn new_request(&self, args: &Arguments) -> Result<Request, RequestError> {
        self.seen.lock().unwrap().push(args.clone());
        http::Request::builder()
            .method(http::Method::GET)
            .uri(format!("http://test.local/items?argc={}", args.len()))
            .body(Bytes::new())
            .map_err(|e| RequestError::Other(Box::new(e)))
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Answers every request with the same status and body.
pub struct CannedCallFactory {
    pub status: StatusCode,
    pub body: Bytes,
    pub calls: AtomicUsize,
}

impl CannedCallFactory {
    pub fn new(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            body: Bytes::from_static(body.as_bytes()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn ok_json(body: &'static str) -> Self {
        Self::new(StatusCode::OK, body)
    }
}

impl CallFactory for CannedCallFactory {
    fn new_call(&self, _request: Request) -> Box<dyn RawCall> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::new(CannedCall {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

struct CannedCall {
    status: StatusCode,
    body: Bytes,
}

#[async_trait]
impl RawCall for CannedCall {
    async fn execute(&self) -> Result<RawResponse, TransportError> {
        let mut response = http::Response::new(self.body.clone());
        *response.status_mut() = self.status;
        Ok(response)
    }

    fn cancel(&self) {}
}

/// Never answers; records whether the transport saw a cancel.
#[derive(Default)]
pub struct HangingCallFactory {
    pub started: AtomicBool,
    pub canceled: Arc<AtomicBool>,
}

impl CallFactory for HangingCallFactory {
    fn new_call(&self, _request: Request) -> Box<dyn RawCall> {
        self.started.store(true, Ordering::SeqCst);
        Box::new(HangingCall {
            canceled: Arc::clone(&self.canceled),
        })
    }
}

struct HangingCall {
    canceled: Arc<AtomicBool>,
}

#[async_trait]
impl RawCall for HangingCall {
    async fn execute(&self) -> Result<RawResponse, TransportError> {
        std::future::pending().await
    }

    fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Converters
// ---------------------------------------------------------------------------

pub struct JsonValueConverter {
    pub target: TypeRef,
}

impl ResponseConverter for JsonValueConverter {
    fn convert(&self, body: Bytes) -> Result<AnyValue, ConversionError> {
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| ConversionError::new(self.target.clone(), e))?;
        Ok(Box::new(value))
    }
}

pub struct UnitConverter;

impl ResponseConverter for UnitConverter {
    fn convert(&self, _body: Bytes) -> Result<AnyValue, ConversionError> {
        Ok(Box::new(()))
    }
}

// ---------------------------------------------------------------------------
// Adapters
// ---------------------------------------------------------------------------

/// `Call<T>` adapter: hands back the unexecuted call.
pub struct PassthroughCallAdapter {
    pub response_type: TypeRef,
}

impl CallAdapter for PassthroughCallAdapter {
    fn response_type(&self) -> &TypeRef {
        &self.response_type
    }

    fn adapt(&self, call: Call) -> AnyValue {
        Box::new(call)
    }
}

/// Suspending adapter yielding the decoded body of a 2xx response.
pub struct BodySuspendAdapter {
    pub response_type: TypeRef,
}

#[async_trait]
impl SuspendCallAdapter for BodySuspendAdapter {
    fn response_type(&self) -> &TypeRef {
        &self.response_type
    }

    async fn adapt(&self, call: Call) -> Result<AnyValue, CallError> {
        let response = call.execute().await?;
        if !response.is_successful() {
            return Err(CallError::Http {
                status: response.status(),
                body: response.error_body().cloned().unwrap_or_default(),
            });
        }
        let status = response.status();
        response.into_body().ok_or_else(|| CallError::MissingBody {
            status,
            response_type: self.response_type.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Resolves `Call<T>` conventionally, anything awaited via the body adapter,
/// and `()` / JSON converters. Individual lookups can be forced to fail.
#[derive(Default)]
pub struct TestRegistry {
    pub fail_converter: bool,
    pub fail_suspend: bool,
    pub lookups: AtomicUsize,
}

impl AdapterRegistry for TestRegistry {
    fn call_adapter(
        &self,
        return_type: &TypeRef,
        _annotations: &Annotations,
    ) -> Result<Arc<dyn CallAdapter>, RegistryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match return_type.single_arg_of(TypeRef::CALL) {
            Some(inner) => Ok(Arc::new(PassthroughCallAdapter {
                response_type: inner.clone(),
            })),
            None => Err(RegistryError::NotFound {
                kind: LookupKind::CallAdapter,
                type_ref: return_type.clone(),
                tried: vec!["passthrough".to_owned()],
            }),
        }
    }

    fn suspend_call_adapter(
        &self,
        awaited_type: &TypeRef,
        _annotations: &Annotations,
    ) -> Result<Arc<dyn SuspendCallAdapter>, RegistryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_suspend {
            return Err(RegistryError::NotFound {
                kind: LookupKind::SuspendCallAdapter,
                type_ref: awaited_type.clone(),
                tried: vec!["body".to_owned()],
            });
        }
        Ok(Arc::new(BodySuspendAdapter {
            response_type: awaited_type.clone(),
        }))
    }

    fn response_body_converter(
        &self,
        response_type: &TypeRef,
        _annotations: &Annotations,
    ) -> Result<Arc<dyn ResponseConverter>, RegistryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_converter {
            return Err(RegistryError::FactoryFailed {
                kind: LookupKind::ResponseConverter,
                type_ref: response_type.clone(),
                factory: "json".to_owned(),
                source: "schema not registered".into(),
            });
        }
        if response_type.is_unit() {
            return Ok(Arc::new(UnitConverter));
        }
        Ok(Arc::new(JsonValueConverter {
            target: response_type.clone(),
        }))
    }
}
