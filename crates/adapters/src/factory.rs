//! Factory traits consulted by the [`crate::Registry`].
//!
//! Each factory inspects a declared type and either claims it (`Ok(Some)`),
//! declines it (`Ok(None)`) so the next factory is consulted, or fails
//! (`Err`) because the type is one it owns but cannot handle as declared.

use std::sync::Arc;

use dispatch::{Annotations, BoxError, CallAdapter, ResponseConverter, SuspendCallAdapter, TypeRef};

/// Creates [`CallAdapter`]s for conventional return types.
pub trait CallAdapterFactory: Send + Sync {
    /// Short name used in "not found" diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn get(
        &self,
        return_type: &TypeRef,
        annotations: &Annotations,
    ) -> Result<Option<Arc<dyn CallAdapter>>, BoxError>;
}

/// Creates [`SuspendCallAdapter`]s for awaited types.
pub trait SuspendCallAdapterFactory: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn get(
        &self,
        awaited_type: &TypeRef,
        annotations: &Annotations,
    ) -> Result<Option<Arc<dyn SuspendCallAdapter>>, BoxError>;
}

/// Creates [`ResponseConverter`]s for response body types.
pub trait ConverterFactory: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn response_body_converter(
        &self,
        response_type: &TypeRef,
        annotations: &Annotations,
    ) -> Result<Option<Arc<dyn ResponseConverter>>, BoxError>;
}
