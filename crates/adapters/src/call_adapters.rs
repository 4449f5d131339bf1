//! Conventional call adapters.
//!
//! - `Call<T>` returns the unexecuted [`Call`] itself; the caller decides
//!   when and whether to execute it.
//! - `Future<T>` and `Future<Response<T>>` return a [`PendingResult`] that
//!   executes the call when first polled.

use std::sync::Arc;

use dispatch::{
    Annotations, AnyValue, BoxError, Call, CallAdapter, PendingResult, TypeRef,
};
use futures::FutureExt;

use crate::{await_body, await_response, CallAdapterFactory};

/// Returns the call unchanged.
pub struct CallPassthroughAdapter {
    response_type: TypeRef,
}

impl CallAdapter for CallPassthroughAdapter {
    fn response_type(&self) -> &TypeRef {
        &self.response_type
    }

    fn adapt(&self, call: Call) -> AnyValue {
        Box::new(call)
    }
}

/// Handles `Call<T>` return types.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCallAdapterFactory;

impl CallAdapterFactory for DefaultCallAdapterFactory {
    fn name(&self) -> &str {
        "call"
    }

    fn get(
        &self,
        return_type: &TypeRef,
        _annotations: &Annotations,
    ) -> Result<Option<Arc<dyn CallAdapter>>, BoxError> {
        if return_type.raw_name() != TypeRef::CALL {
            return Ok(None);
        }
        let inner = return_type
            .single_arg_of(TypeRef::CALL)
            .ok_or("Call return type must be parameterized as Call<Foo>")?;
        Ok(Some(Arc::new(CallPassthroughAdapter {
            response_type: inner.clone(),
        })))
    }
}

// ---------------------------------------------------------------------------

/// What a `Future<..>` return value resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FutureMode {
    Body,
    Response,
}

/// Wraps the call in a boxed future.
pub struct FutureCallAdapter {
    response_type: TypeRef,
    mode: FutureMode,
}

impl CallAdapter for FutureCallAdapter {
    fn response_type(&self) -> &TypeRef {
        &self.response_type
    }

    fn adapt(&self, call: Call) -> AnyValue {
        let pending: PendingResult = match self.mode {
            FutureMode::Body => {
                let response_type = self.response_type.clone();
                async move { await_body(call, &response_type).await }.boxed()
            }
            FutureMode::Response => await_response(call).boxed(),
        };
        Box::new(pending)
    }
}

/// Handles `Future<T>` and `Future<Response<T>>` return types.
#[derive(Debug, Default, Clone, Copy)]
pub struct FutureCallAdapterFactory;

impl CallAdapterFactory for FutureCallAdapterFactory {
    fn name(&self) -> &str {
        "future"
    }

    fn get(
        &self,
        return_type: &TypeRef,
        _annotations: &Annotations,
    ) -> Result<Option<Arc<dyn CallAdapter>>, BoxError> {
        if return_type.raw_name() != TypeRef::FUTURE {
            return Ok(None);
        }
        let inner = return_type.single_arg_of(TypeRef::FUTURE).ok_or(
            "Future return type must be parameterized as Future<Foo> or Future<Response<Foo>>",
        )?;

        let adapter = if inner.raw_name() == TypeRef::RESPONSE {
            let body_type = inner
                .single_arg_of(TypeRef::RESPONSE)
                .ok_or("Response must be parameterized as Response<Foo>")?;
            FutureCallAdapter {
                response_type: body_type.clone(),
                mode: FutureMode::Response,
            }
        } else {
            FutureCallAdapter {
                response_type: inner.clone(),
                mode: FutureMode::Body,
            }
        };
        Ok(Some(Arc::new(adapter)))
    }
}
