//! Error types for building and invoking service methods.
//!
//! There are two failure classes, and they never mix:
//!
//! - [`ConfigurationError`] is produced at build time, when a declared method
//!   is first resolved. It is fatal and non-retryable: the declaration itself
//!   has to change. Every variant names the declaring method.
//! - [`CallError`] is produced at invocation time, and only by a [`crate::Call`]
//!   or by the adapter a service method delegates to. The build/invoke engine
//!   itself never creates one.
//!
//! [`RegistryError`] sits between the two: it is what an
//! [`crate::AdapterRegistry`] reports, and the builder wraps it into a
//! [`ConfigurationError`] carrying method context.

use std::fmt;

use bytes::Bytes;
use http::StatusCode;
use thiserror::Error;

use crate::{MethodId, TypeRef};

/// Boxed error from user-supplied code (factories, converters, transports).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// Registry lookups
// ---------------------------------------------------------------------------

/// Which of the three registry lookups failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    CallAdapter,
    SuspendCallAdapter,
    ResponseConverter,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LookupKind::CallAdapter => "call adapter",
            LookupKind::SuspendCallAdapter => "suspend call adapter",
            LookupKind::ResponseConverter => "response converter",
        };
        f.write_str(s)
    }
}

/// Failure of an adapter or converter lookup.
///
/// "Nothing matched" and "a factory matched but failed" are both
/// configuration failures; they differ only in what the message says.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No registered factory accepted the type.
    #[error("Could not locate {kind} for {type_ref}. Tried: [{}]", .tried.join(", "))]
    NotFound {
        kind: LookupKind,
        type_ref: TypeRef,
        /// Names of the factories consulted, in lookup order.
        tried: Vec<String>,
    },

    /// A factory accepted the type but returned an error while constructing
    /// the component.
    #[error("Factory '{factory}' failed to create {kind} for {type_ref}: {source}")]
    FactoryFailed {
        kind: LookupKind,
        type_ref: TypeRef,
        factory: String,
        #[source]
        source: BoxError,
    },

    /// A factory panicked during lookup. The panic is captured so one broken
    /// factory cannot take the calling thread down with it.
    #[error("Factory '{factory}' panicked while creating {kind} for {type_ref}: {message}")]
    FactoryPanicked {
        kind: LookupKind,
        type_ref: TypeRef,
        factory: String,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Build-time errors
// ---------------------------------------------------------------------------

/// A declared method could not be turned into a service method.
///
/// Produced once, when a client first resolves a declared method. The only
/// fix is to change the declaration or the client's registered factories.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No call adapter could be resolved for a conventional method's return type.
    #[error("Unable to create call adapter for {return_type}\n    for method {method}")]
    CallAdapter {
        method: MethodId,
        return_type: TypeRef,
        #[source]
        source: RegistryError,
    },

    /// No suspend call adapter could be resolved for a suspending method.
    #[error("Unable to create suspend call adapter for {awaited_type}\n    for method {method}")]
    SuspendCallAdapter {
        method: MethodId,
        awaited_type: TypeRef,
        #[source]
        source: RegistryError,
    },

    /// The resolved response type is the un-typed transport envelope.
    #[error(
        "'{response_type}' is not a valid response body type. Did you mean {}?\n    for method {method}",
        TypeRef::BODY
    )]
    RawResponseBody {
        method: MethodId,
        response_type: TypeRef,
    },

    /// The resolved response type is the typed envelope with no type argument.
    #[error("Response must include generic type (e.g., Response<String>), found '{response_type}'\n    for method {method}")]
    UntypedResponseEnvelope {
        method: MethodId,
        response_type: TypeRef,
    },

    /// A body-less verb was paired with a response type other than `()`.
    #[error("{verb} method must use () as response type, found '{response_type}'\n    for method {method}")]
    BodylessVerb {
        method: MethodId,
        verb: http::Method,
        response_type: TypeRef,
    },

    /// No response converter could be resolved for the response type.
    #[error("Unable to create converter for {response_type}\n    for method {method}")]
    Converter {
        method: MethodId,
        response_type: TypeRef,
        #[source]
        source: RegistryError,
    },
}

impl ConfigurationError {
    /// Returns the declared method this error is attributed to.
    pub fn method(&self) -> &MethodId {
        match self {
            ConfigurationError::CallAdapter { method, .. }
            | ConfigurationError::SuspendCallAdapter { method, .. }
            | ConfigurationError::RawResponseBody { method, .. }
            | ConfigurationError::UntypedResponseEnvelope { method, .. }
            | ConfigurationError::BodylessVerb { method, .. }
            | ConfigurationError::Converter { method, .. } => method,
        }
    }
}

// ---------------------------------------------------------------------------
// Invocation-time errors
// ---------------------------------------------------------------------------

/// The request factory could not turn an argument list into a request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Expected {expected} arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("Path parameter '{name}' must not be null")]
    NullPathParameter { name: String },

    #[error("Parameter '{name}' cannot be bound as {binding}: {reason}")]
    InvalidParameter {
        name: String,
        binding: crate::ParameterBinding,
        reason: String,
    },

    #[error("Invalid request URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request construction failed: {0}")]
    Other(#[source] BoxError),
}

/// The transport failed to complete an exchange.
#[derive(Debug, Error)]
#[error("Transport failure: {message}")]
pub struct TransportError {
    pub message: String,
    #[source]
    pub source: Option<BoxError>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// A response converter could not decode a body.
#[derive(Debug, Error)]
#[error("Unable to convert response body to {target}: {source}")]
pub struct ConversionError {
    pub target: TypeRef,
    #[source]
    pub source: BoxError,
}

impl ConversionError {
    pub fn new(target: TypeRef, source: impl Into<BoxError>) -> Self {
        Self {
            target,
            source: source.into(),
        }
    }
}

/// Failure of one invocation, reported by a call or by the adapter that ran it.
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}")]
    Http { status: StatusCode, body: Bytes },

    /// A 2xx response had no body although the declared type requires one.
    #[error("Response with status {status} had no body, but the response type {response_type} requires one")]
    MissingBody {
        status: StatusCode,
        response_type: TypeRef,
    },

    #[error("Call was canceled")]
    Canceled,

    /// A type-erased value did not have the type the caller asked for.
    #[error("Expected a value of type {expected}")]
    UnexpectedType { expected: &'static str },
}

impl CallError {
    /// Returns the HTTP status if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CallError::Http { status, .. } | CallError::MissingBody { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, CallError::Canceled)
    }
}
