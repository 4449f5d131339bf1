//! Path-template request factory.
//!
//! Turns the declared parameters of a [`MethodDescriptor`] into a request:
//!
//! | Binding | Effect | `null` argument |
//! |---------|--------|-----------------|
//! | path | replaces `{name}` in the path, percent-encoded | error |
//! | query | appended as `name=value`; arrays repeat the name | skipped |
//! | header | set as a request header | skipped |
//! | body | serialised as JSON with `content-type: application/json` | error |
//!
//! The template is checked once, when the factory is created, so that a bad
//! declaration fails before any call is made.

use bytes::Bytes;
use dispatch::{
    Arguments, MethodDescriptor, ParameterBinding, Request, RequestError, RequestFactory,
};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// The declaration's path or parameters cannot produce a valid request.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Unterminated placeholder in path template '{path}'")]
    UnterminatedPlaceholder { path: String },

    #[error("Path template '{path}' uses placeholder '{placeholder}' but no path parameter has that name")]
    UnboundPlaceholder { path: String, placeholder: String },

    #[error("Path parameter '{name}' does not appear in path template '{path}'")]
    UnusedPathParameter { path: String, name: String },

    #[error("Multiple body parameters: '{first}' and '{second}'")]
    MultipleBodies { first: String, second: String },

    #[error("{verb} requests cannot carry a body parameter ('{name}')")]
    BodyNotAllowed { verb: http::Method, name: String },

    #[error("Invalid header name '{name}'")]
    InvalidHeaderName { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { name: String, index: usize },
}

/// Builds requests for one declared method against a base URL.
#[derive(Debug, Clone)]
pub struct TemplateRequestFactory {
    base_url: Url,
    verb: http::Method,
    segments: Vec<Segment>,
    queries: Vec<(String, usize)>,
    headers: Vec<(HeaderName, usize)>,
    body: Option<(String, usize)>,
    arity: usize,
}

impl TemplateRequestFactory {
    pub fn new(base_url: Url, descriptor: &MethodDescriptor) -> Result<Self, TemplateError> {
        let path = &descriptor.path;
        let mut queries = Vec::new();
        let mut headers = Vec::new();
        let mut body: Option<(String, usize)> = None;

        for (index, parameter) in descriptor.parameters.iter().enumerate() {
            match parameter.binding {
                ParameterBinding::Path => {}
                ParameterBinding::Query => queries.push((parameter.name.clone(), index)),
                ParameterBinding::Header => {
                    let name = HeaderName::from_bytes(parameter.name.as_bytes()).map_err(|_| {
                        TemplateError::InvalidHeaderName {
                            name: parameter.name.clone(),
                        }
                    })?;
                    headers.push((name, index));
                }
                ParameterBinding::Body => {
                    if descriptor.verb == http::Method::GET || descriptor.verb == http::Method::HEAD {
                        return Err(TemplateError::BodyNotAllowed {
                            verb: descriptor.verb.clone(),
                            name: parameter.name.clone(),
                        });
                    }
                    if let Some((first, _)) = &body {
                        return Err(TemplateError::MultipleBodies {
                            first: first.clone(),
                            second: parameter.name.clone(),
                        });
                    }
                    body = Some((parameter.name.clone(), index));
                }
            }
        }

        let segments = parse_template(path, |placeholder| {
            descriptor.parameters.iter().position(|p| {
                p.binding == ParameterBinding::Path && p.name == placeholder
            })
        })?;

        for parameter in &descriptor.parameters {
            let used = segments.iter().any(|segment| {
                matches!(segment, Segment::Placeholder { name, .. } if *name == parameter.name)
            });
            if parameter.binding == ParameterBinding::Path && !used {
                return Err(TemplateError::UnusedPathParameter {
                    path: path.clone(),
                    name: parameter.name.clone(),
                });
            }
        }

        Ok(Self {
            base_url,
            verb: descriptor.verb.clone(),
            segments,
            queries,
            headers,
            body,
            arity: descriptor.parameters.len(),
        })
    }

    fn url(&self, args: &Arguments) -> Result<Url, RequestError> {
        let mut relative = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => relative.push_str(text),
                Segment::Placeholder { name, index } => {
                    let value = &args.as_slice()[*index];
                    if value.is_null() {
                        return Err(RequestError::NullPathParameter { name: name.clone() });
                    }
                    let text = scalar_text(name, ParameterBinding::Path, value)?;
                    relative.push_str(&urlencoding::encode(&text));
                }
            }
        }

        let mut url = self.base_url.join(&relative).map_err(|e| RequestError::InvalidUrl {
            url: format!("{}{relative}", self.base_url),
            reason: e.to_string(),
        })?;

        let mut pairs = Vec::new();
        for (name, index) in &self.queries {
            match &args.as_slice()[*index] {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items.iter().filter(|item| !item.is_null()) {
                        pairs.push((name.as_str(), scalar_text(name, ParameterBinding::Query, item)?));
                    }
                }
                value => pairs.push((name.as_str(), scalar_text(name, ParameterBinding::Query, value)?)),
            }
        }
        if !pairs.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(pairs.iter().map(|(name, value)| (*name, value.as_str())));
        }

        Ok(url)
    }
}

impl RequestFactory for TemplateRequestFactory {
    fn new_request(&self, args: &Arguments) -> Result<Request, RequestError> {
        if args.len() != self.arity {
            return Err(RequestError::ArgumentCount {
                expected: self.arity,
                actual: args.len(),
            });
        }

        let url = self.url(args)?;

        let body = match &self.body {
            Some((name, index)) => {
                let value = &args.as_slice()[*index];
                if value.is_null() {
                    return Err(RequestError::InvalidParameter {
                        name: name.clone(),
                        binding: ParameterBinding::Body,
                        reason: "body must not be null".to_owned(),
                    });
                }
                let encoded = serde_json::to_vec(value).map_err(|e| RequestError::Other(Box::new(e)))?;
                Some(Bytes::from(encoded))
            }
            None => None,
        };

        let mut builder = http::Request::builder()
            .method(self.verb.clone())
            .uri(url.as_str());
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        let mut request = builder
            .body(body.unwrap_or_default())
            .map_err(|e| RequestError::Other(Box::new(e)))?;

        for (name, index) in &self.headers {
            let value = &args.as_slice()[*index];
            if value.is_null() {
                continue;
            }
            let text = scalar_text(name.as_str(), ParameterBinding::Header, value)?;
            let header = HeaderValue::from_str(&text).map_err(|e| RequestError::InvalidParameter {
                name: name.to_string(),
                binding: ParameterBinding::Header,
                reason: e.to_string(),
            })?;
            request.headers_mut().append(name.clone(), header);
        }

        Ok(request)
    }
}

/// Splits `path` into literal runs and `{name}` placeholders.
fn parse_template(
    path: &str,
    resolve: impl Fn(&str) -> Option<usize>,
) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        if open > 0 {
            segments.push(Segment::Literal(rest[..open].to_owned()));
        }
        let close = rest[open..]
            .find('}')
            .ok_or_else(|| TemplateError::UnterminatedPlaceholder {
                path: path.to_owned(),
            })?;
        let name = &rest[open + 1..open + close];
        let index = resolve(name).ok_or_else(|| TemplateError::UnboundPlaceholder {
            path: path.to_owned(),
            placeholder: name.to_owned(),
        })?;
        segments.push(Segment::Placeholder {
            name: name.to_owned(),
            index,
        });
        rest = &rest[open + close + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_owned()));
    }
    Ok(segments)
}

/// Renders a scalar argument as text. Strings are used verbatim.
fn scalar_text(name: &str, binding: ParameterBinding, value: &Value) -> Result<String, RequestError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(_) | Value::Number(_) => Ok(value.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(RequestError::InvalidParameter {
            name: name.to_owned(),
            binding,
            reason: "expected a string, number or boolean".to_owned(),
        }),
    }
}
