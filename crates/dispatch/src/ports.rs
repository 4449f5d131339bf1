//! Port traits for the collaborators the build/invoke engine consumes.
//!
//! The engine never builds requests, opens connections or decodes bodies
//! itself. It is handed implementations of these traits and wires them
//! together. The `transport` crate supplies an HTTP implementation of
//! [`CallFactory`] and [`RequestFactory`]; the `adapters` crate supplies the
//! registry and the built-in adapters and converters.
//!
//! Every trait here is `Send + Sync`: a built service method is shared across
//! threads and all of its collaborators are shared with it.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    Annotations, AnyValue, Arguments, Call, CallError, ConversionError, RegistryError,
    RequestError, TransportError, TypeRef,
};

/// A fully built transport-level request.
pub type Request = http::Request<Bytes>;

/// A transport-level response with its body fully read.
pub type RawResponse = http::Response<Bytes>;

// ---------------------------------------------------------------------------
// Request building and transport
// ---------------------------------------------------------------------------

/// Turns the argument list of one invocation into a request.
pub trait RequestFactory: Send + Sync {
    /// Builds a request from `args`, one value per declared parameter.
    fn new_request(&self, args: &Arguments) -> Result<Request, RequestError>;
}

/// One executable exchange handed out by a [`CallFactory`].
#[async_trait]
pub trait RawCall: Send + Sync {
    /// Performs the exchange and reads the full response body.
    async fn execute(&self) -> Result<RawResponse, TransportError>;

    /// Aborts an in-flight [`execute`](RawCall::execute). Must be safe to call
    /// from any thread, at any time, any number of times.
    fn cancel(&self);
}

/// The underlying execution primitive.
pub trait CallFactory: Send + Sync {
    fn new_call(&self, request: Request) -> Box<dyn RawCall>;
}

// ---------------------------------------------------------------------------
// Pluggable components
// ---------------------------------------------------------------------------

/// Converts a raw response body into the declared response type.
pub trait ResponseConverter: Send + Sync {
    fn convert(&self, body: Bytes) -> Result<AnyValue, ConversionError>;
}

/// Adapts an unexecuted [`Call`] into a conventional method's return value.
///
/// The adapter owns every decision about synchronous versus asynchronous
/// execution and error translation once it has the call.
pub trait CallAdapter: Send + Sync {
    /// The type the call's response body is converted to. For `Call<Repo>`
    /// this is `Repo`.
    fn response_type(&self) -> &TypeRef;

    fn adapt(&self, call: Call) -> AnyValue;
}

/// Adapts an unexecuted [`Call`] into the value a suspending method awaits.
#[async_trait]
pub trait SuspendCallAdapter: Send + Sync {
    /// The type the call's response body is converted to. For an awaited
    /// `Response<Repo>` this is `Repo`.
    fn response_type(&self) -> &TypeRef;

    async fn adapt(&self, call: Call) -> Result<AnyValue, CallError>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered lookup of pluggable components, populated by the owning client.
///
/// Implementations report "nothing matched" and "a factory failed" alike as
/// [`RegistryError`]; the builder attributes either to the declaring method.
pub trait AdapterRegistry: Send + Sync {
    fn call_adapter(
        &self,
        return_type: &TypeRef,
        annotations: &Annotations,
    ) -> Result<Arc<dyn CallAdapter>, RegistryError>;

    fn suspend_call_adapter(
        &self,
        awaited_type: &TypeRef,
        annotations: &Annotations,
    ) -> Result<Arc<dyn SuspendCallAdapter>, RegistryError>;

    fn response_body_converter(
        &self,
        response_type: &TypeRef,
        annotations: &Annotations,
    ) -> Result<Arc<dyn ResponseConverter>, RegistryError>;
}
