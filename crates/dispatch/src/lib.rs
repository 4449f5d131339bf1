//! Core resolution-and-dispatch engine for Courier.
//!
//! A declared client method (verb, path template, parameter bindings, return
//! shape) is described by a [`MethodDescriptor`]. [`ServiceMethodBuilder`]
//! turns it into an immutable [`ServiceMethod`] exactly once; the service
//! method is then invoked many times, each invocation producing a fresh
//! [`Call`] that is routed through the single adapter chosen at build time.
//!
//! ## Architectural Layer
//!
//! **Domain + port definitions.** This crate performs no network I/O. Request
//! building, transport, and the registry of adapters and converters are
//! consumed through the traits in [`ports`]; infrastructure crates implement
//! them.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | `MethodId`, `AnnotationName`, `CallId` |
//! | [`types`] | `TypeRef`, `MethodDescriptor`, `Arguments`, annotations |
//! | [`errors`] | Build-time, registry and invocation error types |
//! | [`ports`] | Collaborator traits (request factory, transport, adapters, registry) |
//! | [`call`] | The per-invocation `Call` and the `Response<T>` envelope |
//! | [`service_method`] | `ServiceMethodBuilder`, `ServiceMethod`, `Invocation` |

pub mod call;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod service_method;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use call::{downcast_value, Call, CancelHandle, Response};
pub use errors::{
    BoxError, CallError, ConfigurationError, ConversionError, LookupKind, RegistryError,
    RequestError, TransportError,
};
pub use identifiers::{AnnotationName, CallId, EmptyIdentifier, MethodId};
pub use ports::{
    AdapterRegistry, CallAdapter, CallFactory, RawCall, RawResponse, Request, RequestFactory,
    ResponseConverter, SuspendCallAdapter,
};
pub use service_method::{
    AdapterBinding, Invocation, PendingResult, ServiceMethod, ServiceMethodBuilder,
};
pub use types::{
    Annotation, Annotations, AnyValue, Arguments, DeclaredReturn, MethodDescriptor,
    ParameterBinding, ParameterDescriptor, TypeParseError, TypeRef,
};
