//! Declared-method value types.
//!
//! A [`MethodDescriptor`] is the already-parsed description of one client
//! operation: verb, path template, parameter bindings, annotations and the
//! declared return shape. The declaration syntax that produces it is not this
//! crate's concern; everything here is plain data carried into the
//! [`crate::ServiceMethodBuilder`].

use std::any::Any;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{AnnotationName, MethodId};

/// Type-erased value produced by converters and adapters.
///
/// Callers downcast to the concrete type their declaration promised.
pub type AnyValue = Box<dyn Any + Send>;

// ---------------------------------------------------------------------------
// Declared types
// ---------------------------------------------------------------------------

/// A declared type: a raw name plus ordered generic arguments.
///
/// `TypeRef` replaces runtime type introspection. Declarations record their
/// types once, when they are parsed, and the core only ever compares names
/// and arguments.
///
/// ```
/// use dispatch::TypeRef;
///
/// let ty: TypeRef = "Response<Vec<Repo>>".parse().unwrap();
/// assert_eq!(ty.raw_name(), TypeRef::RESPONSE);
/// assert_eq!(ty.to_string(), "Response<Vec<Repo>>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    args: Vec<TypeRef>,
}

impl TypeRef {
    /// The un-typed transport response envelope. Never a valid body type.
    pub const RAW_RESPONSE: &'static str = "RawResponse";
    /// The typed response envelope; must always carry one type argument.
    pub const RESPONSE: &'static str = "Response";
    /// The explicit "no body" marker.
    pub const UNIT: &'static str = "()";
    /// Raw response bytes, delivered without decoding.
    pub const BODY: &'static str = "Body";
    /// An unexecuted call object.
    pub const CALL: &'static str = "Call";
    /// A boxed future resolving to the call's result.
    pub const FUTURE: &'static str = "Future";

    /// Creates a non-generic type.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Creates a generic type with the given type arguments.
    pub fn generic(name: impl Into<String>, args: impl IntoIterator<Item = TypeRef>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    pub fn unit() -> Self {
        Self::named(Self::UNIT)
    }

    pub fn raw_response() -> Self {
        Self::named(Self::RAW_RESPONSE)
    }

    pub fn body() -> Self {
        Self::named(Self::BODY)
    }

    /// `Response<inner>`.
    pub fn response(inner: TypeRef) -> Self {
        Self::generic(Self::RESPONSE, [inner])
    }

    /// `Call<inner>`.
    pub fn call(inner: TypeRef) -> Self {
        Self::generic(Self::CALL, [inner])
    }

    /// `Future<inner>`.
    pub fn future(inner: TypeRef) -> Self {
        Self::generic(Self::FUTURE, [inner])
    }

    /// Returns the raw (un-parameterised) name, e.g. `Response` for `Response<Repo>`.
    pub fn raw_name(&self) -> &str {
        &self.name
    }

    /// Returns the generic type arguments, in declaration order.
    pub fn type_args(&self) -> &[TypeRef] {
        &self.args
    }

    pub fn is_parameterized(&self) -> bool {
        !self.args.is_empty()
    }

    /// Returns `true` if this is the explicit no-body marker `()`.
    pub fn is_unit(&self) -> bool {
        self.name == Self::UNIT && self.args.is_empty()
    }

    /// If this type is `raw<T>` with exactly one argument, returns `T`.
    pub fn single_arg_of(&self, raw: &str) -> Option<&TypeRef> {
        match self.args.as_slice() {
            [inner] if self.name == raw => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some((first, rest)) = self.args.split_first() {
            write!(f, "<{first}")?;
            for arg in rest {
                write!(f, ", {arg}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

/// Failure to parse a [`TypeRef`] from its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeParseError {
    #[error("Empty type name in '{input}'")]
    EmptyName { input: String },

    #[error("Unbalanced generic brackets in '{input}'")]
    Unbalanced { input: String },

    #[error("Unexpected trailing input '{trailing}' in '{input}'")]
    TrailingInput { input: String, trailing: String },
}

impl FromStr for TypeRef {
    type Err = TypeParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (ty, rest) = parse_type(input, input)?;
        let rest = rest.trim();
        if rest.is_empty() {
            Ok(ty)
        } else if rest.starts_with('>') || rest.starts_with(',') {
            Err(TypeParseError::Unbalanced {
                input: input.to_owned(),
            })
        } else {
            Err(TypeParseError::TrailingInput {
                input: input.to_owned(),
                trailing: rest.to_owned(),
            })
        }
    }
}

fn parse_type<'a>(s: &'a str, input: &str) -> Result<(TypeRef, &'a str), TypeParseError> {
    let s = s.trim_start();
    let end = s.find(['<', '>', ',']).unwrap_or(s.len());
    let name = s[..end].trim();
    if name.is_empty() {
        return Err(TypeParseError::EmptyName {
            input: input.to_owned(),
        });
    }

    let mut rest = &s[end..];
    let mut args = Vec::new();
    if let Some(inner) = rest.strip_prefix('<') {
        rest = inner;
        loop {
            let (arg, after) = parse_type(rest, input)?;
            args.push(arg);
            let after = after.trim_start();
            if let Some(next) = after.strip_prefix(',') {
                rest = next;
            } else if let Some(next) = after.strip_prefix('>') {
                rest = next;
                break;
            } else {
                return Err(TypeParseError::Unbalanced {
                    input: input.to_owned(),
                });
            }
        }
    }

    Ok((TypeRef::generic(name, args), rest))
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// One annotation attached to a declared method, with an optional value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub name: AnnotationName,
    pub value: Option<String>,
}

impl Annotation {
    pub fn marker(name: AnnotationName) -> Self {
        Self { name, value: None }
    }

    pub fn with_value(name: AnnotationName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: Some(value.into()),
        }
    }
}

/// The ordered annotation list of a declared method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations(Vec<Annotation>);

impl Annotations {
    pub fn new(annotations: Vec<Annotation>) -> Self {
        Self(annotations)
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.0.push(annotation);
    }

    /// Returns the first annotation with the given name.
    pub fn get(&self, name: &str) -> Option<&Annotation> {
        self.0.iter().find(|a| a.name.as_str() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parameters and arguments
// ---------------------------------------------------------------------------

/// Where a declared parameter's value ends up in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterBinding {
    /// Substituted into a `{name}` segment of the path template.
    Path,
    /// Appended to the query string.
    Query,
    /// Sent as a request header.
    Header,
    /// Serialised as the request body.
    Body,
}

impl fmt::Display for ParameterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParameterBinding::Path => "path",
            ParameterBinding::Query => "query",
            ParameterBinding::Header => "header",
            ParameterBinding::Body => "body",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub binding: ParameterBinding,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, binding: ParameterBinding) -> Self {
        Self {
            name: name.into(),
            binding,
        }
    }
}

/// The argument list of one invocation, one value per declared parameter.
///
/// Arguments are values rather than references so that a call can outlive
/// the stack frame that invoked it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Vec<Value>);

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for Arguments {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Method descriptors
// ---------------------------------------------------------------------------

/// The declared return shape of a method, fixed when the declaration is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "convention", content = "type")]
pub enum DeclaredReturn {
    /// Conventional calling convention: the method returns this type directly
    /// (`Call<Repo>`, `Future<Response<Repo>>`, ...). A call adapter decides
    /// how it is produced.
    Direct(TypeRef),
    /// Suspending calling convention: the method awaits a value of this type
    /// (`Repo`, `Response<Repo>`, ...). A suspend call adapter produces it.
    Suspending(TypeRef),
}

impl DeclaredReturn {
    pub fn is_suspending(&self) -> bool {
        matches!(self, DeclaredReturn::Suspending(_))
    }

    /// Returns the declared type regardless of convention.
    pub fn declared_type(&self) -> &TypeRef {
        match self {
            DeclaredReturn::Direct(ty) | DeclaredReturn::Suspending(ty) => ty,
        }
    }
}

/// Immutable description of one declared client method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Identity of the declaration; the cache key and error attribution.
    pub id: MethodId,

    /// HTTP verb.
    #[serde(with = "verb_serde")]
    pub verb: http::Method,

    /// Relative path template with `{name}` placeholders.
    pub path: String,

    /// Declared parameters, in argument order.
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,

    #[serde(default)]
    pub annotations: Annotations,

    pub returns: DeclaredReturn,
}

impl MethodDescriptor {
    pub fn new(
        id: MethodId,
        verb: http::Method,
        path: impl Into<String>,
        returns: DeclaredReturn,
    ) -> Self {
        Self {
            id,
            verb,
            path: path.into(),
            parameters: Vec::new(),
            annotations: Annotations::default(),
            returns,
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, binding: ParameterBinding) -> Self {
        self.parameters.push(ParameterDescriptor::new(name, binding));
        self
    }

    #[must_use]
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Returns `true` if the verb never carries a response body (HEAD).
    pub fn has_bodyless_verb(&self) -> bool {
        self.verb == http::Method::HEAD
    }
}

mod verb_serde {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(verb: &http::Method, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(verb.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<http::Method, D::Error> {
        let raw = String::deserialize(d)?;
        http::Method::from_bytes(raw.to_ascii_uppercase().as_bytes()).map_err(D::Error::custom)
    }
}
