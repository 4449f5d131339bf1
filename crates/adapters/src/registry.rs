//! Ordered-lookup registry of adapter and converter factories.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use dispatch::{
    AdapterRegistry, Annotations, BoxError, CallAdapter, LookupKind, RegistryError,
    ResponseConverter, SuspendCallAdapter, TypeRef,
};
use tracing::{debug, warn};

use crate::{
    BuiltInConverters, CallAdapterFactory, ConverterFactory, DefaultCallAdapterFactory,
    DefaultSuspendCallAdapterFactory, FutureCallAdapterFactory, SuspendCallAdapterFactory,
};

/// The factories a client consults, in lookup order.
///
/// Call adapter and suspend call adapter factories: user-registered first,
/// then the built-in defaults. Converter factories: built-in converters
/// first (so `()` and `Body` can never be shadowed), then user-registered.
/// The first factory that claims a type wins.
pub struct Registry {
    call_adapter_factories: Vec<Arc<dyn CallAdapterFactory>>,
    suspend_call_adapter_factories: Vec<Arc<dyn SuspendCallAdapterFactory>>,
    converter_factories: Vec<Arc<dyn ConverterFactory>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// A registry with only the built-in factories.
    pub fn with_defaults() -> Self {
        RegistryBuilder::default().build()
    }

    pub fn call_adapter_factory_names(&self) -> Vec<String> {
        self.call_adapter_factories.iter().map(|f| f.name().to_owned()).collect()
    }

    pub fn converter_factory_names(&self) -> Vec<String> {
        self.converter_factories.iter().map(|f| f.name().to_owned()).collect()
    }
}

impl AdapterRegistry for Registry {
    fn call_adapter(
        &self,
        return_type: &TypeRef,
        annotations: &Annotations,
    ) -> Result<Arc<dyn CallAdapter>, RegistryError> {
        lookup(
            LookupKind::CallAdapter,
            return_type,
            &self.call_adapter_factories,
            |f| f.name(),
            |f| f.get(return_type, annotations),
        )
    }

    fn suspend_call_adapter(
        &self,
        awaited_type: &TypeRef,
        annotations: &Annotations,
    ) -> Result<Arc<dyn SuspendCallAdapter>, RegistryError> {
        lookup(
            LookupKind::SuspendCallAdapter,
            awaited_type,
            &self.suspend_call_adapter_factories,
            |f| f.name(),
            |f| f.get(awaited_type, annotations),
        )
    }

    fn response_body_converter(
        &self,
        response_type: &TypeRef,
        annotations: &Annotations,
    ) -> Result<Arc<dyn ResponseConverter>, RegistryError> {
        lookup(
            LookupKind::ResponseConverter,
            response_type,
            &self.converter_factories,
            |f| f.name(),
            |f| f.response_body_converter(response_type, annotations),
        )
    }
}

/// Consults `factories` in order. Factory code is user code, so a panic is
/// captured and reported like any other factory failure.
fn lookup<F, T>(
    kind: LookupKind,
    type_ref: &TypeRef,
    factories: &[Arc<F>],
    name: impl Fn(&F) -> &str,
    get: impl Fn(&F) -> Result<Option<Arc<T>>, BoxError>,
) -> Result<Arc<T>, RegistryError>
where
    F: ?Sized,
    T: ?Sized,
{
    let mut tried = Vec::with_capacity(factories.len());
    for factory in factories {
        let factory = &**factory;
        let factory_name = name(factory);
        match catch_unwind(AssertUnwindSafe(|| get(factory))) {
            Ok(Ok(Some(found))) => {
                debug!(%kind, %type_ref, factory = factory_name, "registry lookup resolved");
                return Ok(found);
            }
            Ok(Ok(None)) => tried.push(factory_name.to_owned()),
            Ok(Err(source)) => {
                return Err(RegistryError::FactoryFailed {
                    kind,
                    type_ref: type_ref.clone(),
                    factory: factory_name.to_owned(),
                    source,
                });
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(%kind, %type_ref, factory = factory_name, %message, "factory panicked during lookup");
                return Err(RegistryError::FactoryPanicked {
                    kind,
                    type_ref: type_ref.clone(),
                    factory: factory_name.to_owned(),
                    message,
                });
            }
        }
    }

    Err(RegistryError::NotFound {
        kind,
        type_ref: type_ref.clone(),
        tried,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects user factories; [`build`](RegistryBuilder::build) appends and
/// prepends the built-ins.
#[derive(Default)]
pub struct RegistryBuilder {
    call_adapter_factories: Vec<Arc<dyn CallAdapterFactory>>,
    suspend_call_adapter_factories: Vec<Arc<dyn SuspendCallAdapterFactory>>,
    converter_factories: Vec<Arc<dyn ConverterFactory>>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn add_call_adapter_factory(mut self, factory: Arc<dyn CallAdapterFactory>) -> Self {
        self.call_adapter_factories.push(factory);
        self
    }

    #[must_use]
    pub fn add_suspend_call_adapter_factory(
        mut self,
        factory: Arc<dyn SuspendCallAdapterFactory>,
    ) -> Self {
        self.suspend_call_adapter_factories.push(factory);
        self
    }

    #[must_use]
    pub fn add_converter_factory(mut self, factory: Arc<dyn ConverterFactory>) -> Self {
        self.converter_factories.push(factory);
        self
    }

    pub fn build(self) -> Registry {
        let mut call_adapter_factories = self.call_adapter_factories;
        call_adapter_factories.push(Arc::new(FutureCallAdapterFactory));
        call_adapter_factories.push(Arc::new(DefaultCallAdapterFactory));

        let mut suspend_call_adapter_factories = self.suspend_call_adapter_factories;
        suspend_call_adapter_factories.push(Arc::new(DefaultSuspendCallAdapterFactory));

        let mut converter_factories: Vec<Arc<dyn ConverterFactory>> =
            Vec::with_capacity(self.converter_factories.len() + 1);
        converter_factories.push(Arc::new(BuiltInConverters));
        converter_factories.extend(self.converter_factories);

        Registry {
            call_adapter_factories,
            suspend_call_adapter_factories,
            converter_factories,
        }
    }
}
