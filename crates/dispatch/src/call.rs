//! The per-invocation call object and the typed response envelope.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::{
    AnyValue, Arguments, CallError, CallFactory, CallId, RawResponse, Request, RequestFactory,
    ResponseConverter,
};

/// Downcasts a type-erased value, reporting the expected type on mismatch.
pub fn downcast_value<T: Any>(value: AnyValue) -> Result<T, CallError> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| CallError::UnexpectedType {
            expected: std::any::type_name::<T>(),
        })
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CancelState {
    canceled: AtomicBool,
    notify: Notify,
}

/// Shared cancellation flag for one call.
///
/// Handles are cheap to clone; canceling through any clone cancels the call.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        if !self.state.canceled.swap(true, Ordering::SeqCst) {
            self.state.notify.notify_waiters();
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.state.canceled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel cannot slip between.
            let notified = self.state.notify.notified();
            if self.is_canceled() {
                return;
            }
            notified.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------------

/// One executable HTTP exchange, created fresh for every invocation.
///
/// A call owns its argument list and nothing else of substance; the request
/// is built from those arguments only when the call executes. Calls are never
/// pooled or shared between invocations, and [`execute`](Call::execute)
/// consumes the call, so each one runs at most once. Use
/// [`duplicate`](Call::duplicate) to run the same exchange again.
pub struct Call {
    id: CallId,
    arguments: Arguments,
    request_factory: Arc<dyn RequestFactory>,
    call_factory: Arc<dyn CallFactory>,
    converter: Arc<dyn ResponseConverter>,
    cancel: CancelHandle,
}

impl Call {
    pub fn new(
        request_factory: Arc<dyn RequestFactory>,
        arguments: Arguments,
        call_factory: Arc<dyn CallFactory>,
        converter: Arc<dyn ResponseConverter>,
    ) -> Self {
        Self {
            id: CallId::new_random(),
            arguments,
            request_factory,
            call_factory,
            converter,
            cancel: CancelHandle::default(),
        }
    }

    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Builds the request this call would send, without sending it.
    pub fn request(&self) -> Result<Request, CallError> {
        Ok(self.request_factory.new_request(&self.arguments)?)
    }

    /// Returns a handle that can cancel this call from elsewhere, including
    /// while it is executing.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    /// Creates a new, unexecuted call with the same arguments and collaborators.
    ///
    /// The duplicate gets its own id and its own cancellation state.
    #[must_use]
    pub fn duplicate(&self) -> Call {
        Call::new(
            Arc::clone(&self.request_factory),
            self.arguments.clone(),
            Arc::clone(&self.call_factory),
            Arc::clone(&self.converter),
        )
    }

    /// Builds the request, performs the exchange and converts the body.
    ///
    /// Non-2xx responses are returned as `Ok` with an error body; deciding
    /// whether that is a failure is the adapter's job.
    pub async fn execute(self) -> Result<Response<AnyValue>, CallError> {
        if self.cancel.is_canceled() {
            return Err(CallError::Canceled);
        }

        let request = self.request_factory.new_request(&self.arguments)?;
        trace!(call = %self.id, method = %request.method(), uri = %request.uri(), "executing call");

        let raw = self.call_factory.new_call(request);
        let raw_response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                raw.cancel();
                debug!(call = %self.id, "call canceled during execution");
                return Err(CallError::Canceled);
            }
            result = raw.execute() => result?,
        };

        self.parse_response(raw_response)
    }

    fn parse_response(&self, raw: RawResponse) -> Result<Response<AnyValue>, CallError> {
        let (parts, body) = raw.into_parts();
        let status = parts.status;
        trace!(call = %self.id, status = status.as_u16(), "response received");

        if !status.is_success() {
            return Ok(Response::error(status, parts.headers, body));
        }

        if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            return Ok(Response::success(status, parts.headers, None));
        }

        let value = self.converter.convert(body)?;
        Ok(Response::success(status, parts.headers, Some(value)))
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.id)
            .field("arguments", &self.arguments)
            .field("canceled", &self.is_canceled())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// The typed response envelope: status, headers and either a converted body
/// (2xx) or the raw error body (anything else).
#[derive(Debug)]
pub struct Response<T> {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<T>,
    error_body: Option<Bytes>,
}

impl<T> Response<T> {
    pub fn success(status: StatusCode, headers: HeaderMap, body: Option<T>) -> Self {
        Self {
            status,
            headers,
            body,
            error_body: None,
        }
    }

    pub fn error(status: StatusCode, headers: HeaderMap, error_body: Bytes) -> Self {
        Self {
            status,
            headers,
            body: None,
            error_body: Some(error_body),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns `true` if the status is in `[200, 300)`.
    pub fn is_successful(&self) -> bool {
        self.status.is_success()
    }

    pub fn body(&self) -> Option<&T> {
        self.body.as_ref()
    }

    pub fn into_body(self) -> Option<T> {
        self.body
    }

    pub fn error_body(&self) -> Option<&Bytes> {
        self.error_body.as_ref()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body.map(f),
            error_body: self.error_body,
        }
    }
}

impl Response<AnyValue> {
    /// Downcasts the body to the concrete type the declaration promised.
    pub fn downcast_body<T: Any>(self) -> Result<Response<T>, CallError> {
        let Response {
            status,
            headers,
            body,
            error_body,
        } = self;
        let body = body.map(downcast_value::<T>).transpose()?;
        Ok(Response {
            status,
            headers,
            body,
            error_body,
        })
    }
}
