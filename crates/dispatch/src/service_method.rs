//! Resolution and dispatch of declared methods.
//!
//! [`ServiceMethodBuilder::build`] inspects a [`MethodDescriptor`] once,
//! validates it, and wires exactly one adaptation path. The resulting
//! [`ServiceMethod`] is immutable and is invoked any number of times, from any
//! number of threads, each invocation producing a fresh [`Call`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, trace};

use crate::{
    downcast_value, AdapterRegistry, AnyValue, Arguments, Call, CallAdapter, CallError,
    CallFactory, ConfigurationError, DeclaredReturn, MethodDescriptor, MethodId, RequestFactory,
    ResponseConverter, SuspendCallAdapter, TypeRef,
};

/// Future returned by a suspending service method.
pub type PendingResult = BoxFuture<'static, Result<AnyValue, CallError>>;

// ---------------------------------------------------------------------------
// Adapter binding
// ---------------------------------------------------------------------------

/// The single adaptation path selected for a service method.
///
/// Exactly one adapter kind is present; a method can be neither both nor
/// neither.
#[derive(Clone)]
pub enum AdapterBinding {
    /// Conventional calling convention: the adapter turns the call into the
    /// declared return value directly.
    Conventional(Arc<dyn CallAdapter>),
    /// Suspending calling convention: the adapter resolves the call into the
    /// awaited value asynchronously.
    Suspending(Arc<dyn SuspendCallAdapter>),
}

impl AdapterBinding {
    /// The response type reported by whichever adapter is bound.
    pub fn response_type(&self) -> &TypeRef {
        match self {
            AdapterBinding::Conventional(adapter) => adapter.response_type(),
            AdapterBinding::Suspending(adapter) => adapter.response_type(),
        }
    }

    /// Returns `true` for the suspending calling convention.
    pub fn is_suspending(&self) -> bool {
        matches!(self, AdapterBinding::Suspending(_))
    }
}

impl fmt::Debug for AdapterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            AdapterBinding::Conventional(_) => "Conventional",
            AdapterBinding::Suspending(_) => "Suspending",
        };
        f.debug_tuple(kind).field(self.response_type()).finish()
    }
}

// ---------------------------------------------------------------------------
// Invocation result
// ---------------------------------------------------------------------------

/// What one invocation of a service method produced.
pub enum Invocation {
    /// The value returned by a conventional call adapter. It may itself be an
    /// unexecuted [`Call`] or a future; that is the adapter's choice.
    Ready(AnyValue),
    /// The pending result of a suspending method.
    Pending(PendingResult),
}

impl Invocation {
    /// Returns `true` if the result still has to be awaited.
    pub fn is_pending(&self) -> bool {
        matches!(self, Invocation::Pending(_))
    }

    /// Downcasts a conventional result to the declared return type.
    ///
    /// Fails with [`CallError::UnexpectedType`] if the method is suspending
    /// or the value has a different type.
    pub fn into_ready<T: Any>(self) -> Result<T, CallError> {
        match self {
            Invocation::Ready(value) => downcast_value(value),
            Invocation::Pending(_) => Err(CallError::UnexpectedType {
                expected: std::any::type_name::<T>(),
            }),
        }
    }

    /// Resolves either variant to its value, awaiting a pending result.
    pub async fn resolve(self) -> Result<AnyValue, CallError> {
        match self {
            Invocation::Ready(value) => Ok(value),
            Invocation::Pending(pending) => pending.await,
        }
    }

    /// Resolves and downcasts in one step.
    pub async fn resolve_as<T: Any>(self) -> Result<T, CallError> {
        downcast_value(self.resolve().await?)
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Ready(_) => f.write_str("Invocation::Ready(..)"),
            Invocation::Pending(_) => f.write_str("Invocation::Pending(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds [`ServiceMethod`]s against one registry and one call factory.
///
/// Building is a pure function of the descriptor, the request factory and the
/// registry's state. Building the same descriptor twice yields two
/// independent, behaviourally identical service methods; callers cache the
/// result so the lookups are paid once per method.
pub struct ServiceMethodBuilder {
    registry: Arc<dyn AdapterRegistry>,
    call_factory: Arc<dyn CallFactory>,
}

impl ServiceMethodBuilder {
    pub fn new(registry: Arc<dyn AdapterRegistry>, call_factory: Arc<dyn CallFactory>) -> Self {
        Self {
            registry,
            call_factory,
        }
    }

    /// Resolves `descriptor` into a reusable service method.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if no adapter or converter can be
    /// resolved, or if the resolved response type is the raw transport
    /// envelope, an un-parameterised `Response`, or anything but `()` on a
    /// HEAD method.
    #[tracing::instrument(skip_all, fields(method = %descriptor.id))]
    pub fn build(
        &self,
        descriptor: &MethodDescriptor,
        request_factory: Arc<dyn RequestFactory>,
    ) -> Result<ServiceMethod, ConfigurationError> {
        let method = &descriptor.id;
        let annotations = &descriptor.annotations;

        let binding = match &descriptor.returns {
            DeclaredReturn::Suspending(awaited_type) => {
                let adapter = self
                    .registry
                    .suspend_call_adapter(awaited_type, annotations)
                    .map_err(|source| ConfigurationError::SuspendCallAdapter {
                        method: method.clone(),
                        awaited_type: awaited_type.clone(),
                        source,
                    })?;
                AdapterBinding::Suspending(adapter)
            }
            DeclaredReturn::Direct(return_type) => {
                let adapter = self
                    .registry
                    .call_adapter(return_type, annotations)
                    .map_err(|source| ConfigurationError::CallAdapter {
                        method: method.clone(),
                        return_type: return_type.clone(),
                        source,
                    })?;
                AdapterBinding::Conventional(adapter)
            }
        };

        let response_type = binding.response_type().clone();
        validate_response_type(descriptor, &response_type)?;

        let converter = self
            .registry
            .response_body_converter(&response_type, annotations)
            .map_err(|source| ConfigurationError::Converter {
                method: method.clone(),
                response_type: response_type.clone(),
                source,
            })?;

        debug!(
            suspending = binding.is_suspending(),
            response_type = %response_type,
            "service method built"
        );

        Ok(ServiceMethod {
            id: method.clone(),
            response_type,
            request_factory,
            call_factory: Arc::clone(&self.call_factory),
            binding,
            converter,
        })
    }
}

/// Rejects response types that can never be decoded from a body.
///
/// A `()` response on a verb that does carry a body is allowed.
fn validate_response_type(
    descriptor: &MethodDescriptor,
    response_type: &TypeRef,
) -> Result<(), ConfigurationError> {
    if response_type.raw_name() == TypeRef::RAW_RESPONSE {
        return Err(ConfigurationError::RawResponseBody {
            method: descriptor.id.clone(),
            response_type: response_type.clone(),
        });
    }
    if response_type.raw_name() == TypeRef::RESPONSE && !response_type.is_parameterized() {
        return Err(ConfigurationError::UntypedResponseEnvelope {
            method: descriptor.id.clone(),
            response_type: response_type.clone(),
        });
    }
    if descriptor.has_bodyless_verb() && !response_type.is_unit() {
        return Err(ConfigurationError::BodylessVerb {
            method: descriptor.id.clone(),
            verb: descriptor.verb.clone(),
            response_type: response_type.clone(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Service method
// ---------------------------------------------------------------------------

/// An immutable, reusable adapter from argument lists to HTTP calls.
///
/// Holds no mutable state; invoke it concurrently from as many threads as
/// needed.
pub struct ServiceMethod {
    id: MethodId,
    response_type: TypeRef,
    request_factory: Arc<dyn RequestFactory>,
    call_factory: Arc<dyn CallFactory>,
    binding: AdapterBinding,
    converter: Arc<dyn ResponseConverter>,
}

impl ServiceMethod {
    pub fn id(&self) -> &MethodId {
        &self.id
    }

    /// The type response bodies are converted to.
    pub fn response_type(&self) -> &TypeRef {
        &self.response_type
    }

    pub fn binding(&self) -> &AdapterBinding {
        &self.binding
    }

    /// Runs one invocation with `args`.
    ///
    /// A fresh, unexecuted [`Call`] is created and handed to the bound
    /// adapter. Every argument is a declared parameter and all of them reach
    /// the request factory. Failures surface only through the adapter.
    pub fn invoke(&self, args: Arguments) -> Invocation {
        let call = Call::new(
            Arc::clone(&self.request_factory),
            args,
            Arc::clone(&self.call_factory),
            Arc::clone(&self.converter),
        );
        trace!(method = %self.id, call = %call.id(), "invoking service method");

        match &self.binding {
            AdapterBinding::Conventional(adapter) => Invocation::Ready(adapter.adapt(call)),
            AdapterBinding::Suspending(adapter) => {
                let adapter = Arc::clone(adapter);
                Invocation::Pending(async move { adapter.adapt(call).await }.boxed())
            }
        }
    }
}

impl fmt::Debug for ServiceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMethod")
            .field("id", &self.id)
            .field("response_type", &self.response_type)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}
