//! reqwest-backed implementation of the transport ports.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dispatch::{CallFactory, CancelHandle, RawCall, RawResponse, Request, TransportError};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use tracing::{debug, trace};

/// Client-wide HTTP settings applied to every call.
#[derive(Debug, Clone, Default)]
pub struct HttpSettings {
    /// Whole-exchange timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
    /// Sent with every request unless the request sets the same header.
    pub default_headers: Vec<(String, String)>,
}

/// The HTTP client could not be constructed from [`HttpSettings`].
#[derive(Debug, Error)]
pub enum TransportSetupError {
    #[error("Invalid default header name '{name}'")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },

    #[error("Invalid value for default header '{name}'")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: http::header::InvalidHeaderValue,
    },

    #[error("Failed to build HTTP client")]
    Client(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Hands out one [`ReqwestCall`] per request, all sharing a connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestCallFactory {
    client: reqwest::Client,
}

impl ReqwestCallFactory {
    /// Wraps an already-configured client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_settings(settings: &HttpSettings) -> Result<Self, TransportSetupError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &settings.default_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|source| {
                TransportSetupError::InvalidHeaderName {
                    name: name.clone(),
                    source,
                }
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|source| {
                TransportSetupError::InvalidHeaderValue {
                    name: name.clone(),
                    source,
                }
            })?;
            headers.append(header_name, header_value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &settings.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        Ok(Self::new(builder.build()?))
    }
}

impl CallFactory for ReqwestCallFactory {
    fn new_call(&self, request: Request) -> Box<dyn RawCall> {
        Box::new(ReqwestCall::new(self.client.clone(), request))
    }
}

// ---------------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------------

/// A single exchange over a shared [`reqwest::Client`].
///
/// The request is consumed by the first [`execute`](RawCall::execute); a
/// second attempt fails without touching the network.
pub struct ReqwestCall {
    client: reqwest::Client,
    request: Mutex<Option<Request>>,
    cancel: CancelHandle,
}

impl ReqwestCall {
    pub fn new(client: reqwest::Client, request: Request) -> Self {
        Self {
            client,
            request: Mutex::new(Some(request)),
            cancel: CancelHandle::default(),
        }
    }

    async fn send(&self, request: reqwest::Request) -> Result<RawResponse, TransportError> {
        let method = request.method().clone();
        let url = request.url().clone();
        trace!(%method, %url, "sending request");

        let response = self.client.execute(request).await.map_err(|e| {
            TransportError::with_source(format!("{method} {url} failed"), e)
        })?;

        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            TransportError::with_source(format!("reading body of {method} {url} failed"), e)
        })?;
        debug!(%method, %url, status = status.as_u16(), bytes = body.len(), "response read");

        let mut raw = http::Response::new(body);
        *raw.status_mut() = status;
        *raw.version_mut() = version;
        *raw.headers_mut() = headers;
        Ok(raw)
    }
}

#[async_trait]
impl RawCall for ReqwestCall {
    async fn execute(&self) -> Result<RawResponse, TransportError> {
        let request = self
            .request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| TransportError::new("call already executed"))?;
        let request = reqwest::Request::try_from(request)
            .map_err(|e| TransportError::with_source("request is not valid for transport", e))?;

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(TransportError::new("exchange canceled")),
            result = self.send(request) => result,
        }
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}
