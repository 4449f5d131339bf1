//! Suspend call adapters: resolve a call into the value a suspending method awaits.

use std::sync::Arc;

use async_trait::async_trait;
use dispatch::{
    Annotations, AnyValue, BoxError, Call, CallError, SuspendCallAdapter, TypeRef,
};

use crate::SuspendCallAdapterFactory;

/// Executes `call` and yields its converted body.
///
/// Non-2xx responses become [`CallError::Http`]. A 2xx response without a
/// body is only acceptable when the response type is `()`.
pub async fn await_body(call: Call, response_type: &TypeRef) -> Result<AnyValue, CallError> {
    let response = call.execute().await?;
    let status = response.status();
    if !response.is_successful() {
        return Err(CallError::Http {
            status,
            body: response.error_body().cloned().unwrap_or_default(),
        });
    }

    match response.into_body() {
        Some(body) => Ok(body),
        None if response_type.is_unit() => Ok(Box::new(())),
        None => Err(CallError::MissingBody {
            status,
            response_type: response_type.clone(),
        }),
    }
}

/// Executes `call` and yields the whole `Response<AnyValue>` envelope,
/// whatever its status.
pub async fn await_response(call: Call) -> Result<AnyValue, CallError> {
    let response = call.execute().await?;
    Ok(Box::new(response))
}

// ---------------------------------------------------------------------------

/// Awaits the response body directly (`suspend fn repo() -> Repo`).
pub struct PlainSuspendCallAdapter {
    response_type: TypeRef,
}

impl PlainSuspendCallAdapter {
    pub fn new(response_type: TypeRef) -> Self {
        Self { response_type }
    }
}

#[async_trait]
impl SuspendCallAdapter for PlainSuspendCallAdapter {
    fn response_type(&self) -> &TypeRef {
        &self.response_type
    }

    async fn adapt(&self, call: Call) -> Result<AnyValue, CallError> {
        await_body(call, &self.response_type).await
    }
}

/// Awaits the full envelope (`suspend fn repo() -> Response<Repo>`).
///
/// The response type is the envelope's type argument; HTTP errors are not
/// raised but returned inside the envelope.
pub struct ResponseSuspendCallAdapter {
    response_type: TypeRef,
}

impl ResponseSuspendCallAdapter {
    pub fn new(response_type: TypeRef) -> Self {
        Self { response_type }
    }
}

#[async_trait]
impl SuspendCallAdapter for ResponseSuspendCallAdapter {
    fn response_type(&self) -> &TypeRef {
        &self.response_type
    }

    async fn adapt(&self, call: Call) -> Result<AnyValue, CallError> {
        await_response(call).await
    }
}

// ---------------------------------------------------------------------------

/// Claims every awaited type: `Response<T>` gets the envelope adapter with
/// response type `T`, anything else the plain adapter.
///
/// A bare `Response` falls through to the plain adapter, whose response type
/// is then rejected when the service method is built.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSuspendCallAdapterFactory;

impl SuspendCallAdapterFactory for DefaultSuspendCallAdapterFactory {
    fn name(&self) -> &str {
        "default-suspend"
    }

    fn get(
        &self,
        awaited_type: &TypeRef,
        _annotations: &Annotations,
    ) -> Result<Option<Arc<dyn SuspendCallAdapter>>, BoxError> {
        let adapter: Arc<dyn SuspendCallAdapter> =
            match awaited_type.single_arg_of(TypeRef::RESPONSE) {
                Some(inner) => Arc::new(ResponseSuspendCallAdapter::new(inner.clone())),
                None => Arc::new(PlainSuspendCallAdapter::new(awaited_type.clone())),
            };
        Ok(Some(adapter))
    }
}
