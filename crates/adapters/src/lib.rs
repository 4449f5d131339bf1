//! Courier pluggable components.
//!
//! Implements [`dispatch::AdapterRegistry`] as an ordered list of factories
//! ([`Registry`]) and provides the adapters and converters every client gets
//! by default.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Factories here decide *which* component handles a
//! declared type. The [`dispatch`] crate only sees the resolved
//! [`dispatch::CallAdapter`], [`dispatch::SuspendCallAdapter`] and
//! [`dispatch::ResponseConverter`] trait objects.
//!
//! ## Defaults
//!
//! | Lookup | Built-in factories (in order) |
//! |--------|-------------------------------|
//! | Call adapter | user factories, [`FutureCallAdapterFactory`], [`DefaultCallAdapterFactory`] |
//! | Suspend call adapter | user factories, [`DefaultSuspendCallAdapterFactory`] |
//! | Converter | [`BuiltInConverters`], user factories |

pub mod call_adapters;
pub mod converters;
pub mod factory;
pub mod registry;
pub mod suspend;

pub use call_adapters::{
    CallPassthroughAdapter, DefaultCallAdapterFactory, FutureCallAdapter, FutureCallAdapterFactory,
};
pub use converters::{
    BuiltInConverters, BytesConverter, JsonConverterFactory, ScalarConverterFactory,
    UnitConverter, JSON_VALUE,
};
pub use factory::{CallAdapterFactory, ConverterFactory, SuspendCallAdapterFactory};
pub use registry::{Registry, RegistryBuilder};
pub use suspend::{
    await_body, await_response, DefaultSuspendCallAdapterFactory, PlainSuspendCallAdapter,
    ResponseSuspendCallAdapter,
};
