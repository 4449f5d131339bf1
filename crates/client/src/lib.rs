//! Courier client.
//!
//! Owns the pieces a declared method needs at runtime: the factory
//! [`adapters::Registry`], the transport, and a cache of built
//! [`dispatch::ServiceMethod`]s keyed by [`dispatch::MethodId`].
//!
//! ```no_run
//! use client::{Client, ClientConfig};
//! use dispatch::{DeclaredReturn, MethodDescriptor, MethodId, TypeRef};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::load("courier.toml")?;
//! let user = MethodDescriptor::new(
//!     MethodId::new("GitHub.user").ok_or("empty id")?,
//!     http::Method::GET,
//!     "users/{name}",
//!     DeclaredReturn::Suspending(TypeRef::named("Json")),
//! )
//! .with_parameter("name", dispatch::ParameterBinding::Path);
//!
//! let client = Client::builder(config)
//!     .add_converter_factory(std::sync::Arc::new(adapters::JsonConverterFactory::new()))
//!     .declare(user)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;

pub use client::{Client, ClientBuilder, ClientError};
pub use config::{ClientConfig, ConfigLoadError};
