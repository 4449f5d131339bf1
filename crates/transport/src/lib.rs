//! Courier HTTP infrastructure.
//!
//! Implements the [`dispatch::CallFactory`] and [`dispatch::RequestFactory`]
//! ports for real HTTP traffic.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Connection management, TLS and redirects are reqwest's
//! concern. The [`dispatch`] crate sees only `http::Request<Bytes>` going in
//! and `http::Response<Bytes>` coming out.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`http_call`] | [`ReqwestCallFactory`], [`ReqwestCall`], [`HttpSettings`] |
//! | [`template`] | [`TemplateRequestFactory`]: path placeholders, query, header and JSON body bindings |

pub mod http_call;
pub mod template;

pub use http_call::{HttpSettings, ReqwestCall, ReqwestCallFactory, TransportSetupError};
pub use template::{TemplateError, TemplateRequestFactory};
