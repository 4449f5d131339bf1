//! The owning client: build-once, invoke-many.

use std::collections::HashMap;
use std::sync::Arc;

use adapters::{CallAdapterFactory, ConverterFactory, Registry, SuspendCallAdapterFactory};
use dashmap::DashMap;
use dispatch::{
    Arguments, CallFactory, ConfigurationError, Invocation, MethodDescriptor, MethodId,
    RequestFactory, ServiceMethod, ServiceMethodBuilder,
};
use thiserror::Error;
use tracing::{debug, info};
use transport::{ReqwestCallFactory, TemplateError, TemplateRequestFactory, TransportSetupError};

use crate::ClientConfig;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to set up HTTP transport")]
    Transport(#[from] TransportSetupError),

    #[error("Method {method} is declared more than once")]
    DuplicateDeclaration { method: MethodId },

    #[error("Method {method} is not declared on this client")]
    UnknownMethod { method: MethodId },

    #[error("Descriptor for {method} differs from the one declared on this client")]
    DescriptorMismatch { method: MethodId },

    #[error("Invalid request template\n    for method {method}")]
    Template {
        method: MethodId,
        #[source]
        source: TemplateError,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Resolves declared methods into [`ServiceMethod`]s and caches them.
///
/// A method is built the first time it is used (or at construction time with
/// `validate_eagerly`). Concurrent first uses may each build it; the first to
/// reach the cache wins and every caller receives that one.
pub struct Client {
    config: ClientConfig,
    builder: ServiceMethodBuilder,
    declarations: HashMap<MethodId, MethodDescriptor>,
    methods: DashMap<MethodId, Arc<ServiceMethod>>,
}

impl Client {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            registry: Registry::builder(),
            call_factory: None,
            declarations: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn declaration(&self, id: &MethodId) -> Option<&MethodDescriptor> {
        self.declarations.get(id)
    }

    /// Returns the cached service method for a declared `descriptor`,
    /// building it with `request_factory` if this is its first use.
    ///
    /// The descriptor must be the one declared under its id; the cache is
    /// keyed by id, so any other descriptor would shadow the declaration.
    pub fn service_method(
        &self,
        descriptor: &MethodDescriptor,
        request_factory: Arc<dyn RequestFactory>,
    ) -> Result<Arc<ServiceMethod>, ClientError> {
        let declared = self
            .declarations
            .get(&descriptor.id)
            .ok_or_else(|| ClientError::UnknownMethod {
                method: descriptor.id.clone(),
            })?;
        if declared != descriptor {
            return Err(ClientError::DescriptorMismatch {
                method: descriptor.id.clone(),
            });
        }
        Ok(self.cached_or_build(declared, request_factory)?)
    }

    /// The service method for a declared method, requests built from its
    /// path template against the configured base URL.
    pub fn method(&self, id: &MethodId) -> Result<Arc<ServiceMethod>, ClientError> {
        if let Some(cached) = self.methods.get(id) {
            return Ok(Arc::clone(cached.value()));
        }

        let descriptor = self
            .declarations
            .get(id)
            .ok_or_else(|| ClientError::UnknownMethod { method: id.clone() })?;
        let request_factory = TemplateRequestFactory::new(self.config.base_url.clone(), descriptor)
            .map_err(|source| ClientError::Template {
                method: id.clone(),
                source,
            })?;
        Ok(self.cached_or_build(descriptor, Arc::new(request_factory))?)
    }

    fn cached_or_build(
        &self,
        descriptor: &MethodDescriptor,
        request_factory: Arc<dyn RequestFactory>,
    ) -> Result<Arc<ServiceMethod>, ConfigurationError> {
        if let Some(cached) = self.methods.get(&descriptor.id) {
            return Ok(Arc::clone(cached.value()));
        }

        let built = Arc::new(self.builder.build(descriptor, request_factory)?);
        let entry = self
            .methods
            .entry(descriptor.id.clone())
            .or_insert_with(|| built);
        Ok(Arc::clone(entry.value()))
    }

    pub fn invoke(&self, id: &MethodId, args: Arguments) -> Result<Invocation, ClientError> {
        Ok(self.method(id)?.invoke(args))
    }

    /// Builds every declared method that is not cached yet.
    pub fn validate_eagerly(&self) -> Result<(), ClientError> {
        let mut ids: Vec<&MethodId> = self.declarations.keys().collect();
        ids.sort();
        for id in ids {
            self.method(id)?;
        }
        debug!(methods = self.methods.len(), "declared methods validated");
        Ok(())
    }

    /// Drops the cached service method; the next use builds it again.
    pub fn discard(&self, id: &MethodId) -> bool {
        let removed = self.methods.remove(id).is_some();
        if removed {
            info!(method = %id, "discarded cached service method");
        }
        removed
    }

    pub fn cached_methods(&self) -> usize {
        self.methods.len()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct ClientBuilder {
    config: ClientConfig,
    registry: adapters::RegistryBuilder,
    call_factory: Option<Arc<dyn CallFactory>>,
    declarations: Vec<MethodDescriptor>,
}

impl ClientBuilder {
    #[must_use]
    pub fn add_call_adapter_factory(mut self, factory: Arc<dyn CallAdapterFactory>) -> Self {
        self.registry = self.registry.add_call_adapter_factory(factory);
        self
    }

    #[must_use]
    pub fn add_suspend_call_adapter_factory(
        mut self,
        factory: Arc<dyn SuspendCallAdapterFactory>,
    ) -> Self {
        self.registry = self.registry.add_suspend_call_adapter_factory(factory);
        self
    }

    #[must_use]
    pub fn add_converter_factory(mut self, factory: Arc<dyn ConverterFactory>) -> Self {
        self.registry = self.registry.add_converter_factory(factory);
        self
    }

    /// Replaces the reqwest transport built from the config.
    #[must_use]
    pub fn call_factory(mut self, call_factory: Arc<dyn CallFactory>) -> Self {
        self.call_factory = Some(call_factory);
        self
    }

    #[must_use]
    pub fn declare(mut self, descriptor: MethodDescriptor) -> Self {
        self.declarations.push(descriptor);
        self
    }

    pub fn build(self) -> Result<Client, ClientError> {
        let call_factory = match self.call_factory {
            Some(call_factory) => call_factory,
            None => Arc::new(ReqwestCallFactory::from_settings(&self.config.http_settings())?),
        };

        let mut declarations = HashMap::with_capacity(self.declarations.len());
        for descriptor in self.declarations {
            let id = descriptor.id.clone();
            if declarations.insert(id.clone(), descriptor).is_some() {
                return Err(ClientError::DuplicateDeclaration { method: id });
            }
        }

        let client = Client {
            builder: ServiceMethodBuilder::new(Arc::new(self.registry.build()), call_factory),
            config: self.config,
            declarations,
            methods: DashMap::new(),
        };

        if client.config.validate_eagerly {
            client.validate_eagerly()?;
        }
        Ok(client)
    }
}
