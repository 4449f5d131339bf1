//! Response body converters.
//!
//! | Factory | Types |
//! |---------|-------|
//! | [`BuiltInConverters`] | `()`, `Body` |
//! | [`ScalarConverterFactory`] | `String`, `bool`, `i64`, `u64`, `f64` |
//! | [`JsonConverterFactory`] | `Json` (untyped) and every type registered on it |

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use dispatch::{Annotations, AnyValue, BoxError, ConversionError, ResponseConverter, TypeRef};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ConverterFactory;

/// Declared name of an untyped JSON document (`serde_json::Value`).
pub const JSON_VALUE: &str = "Json";

// ---------------------------------------------------------------------------
// Built-ins
// ---------------------------------------------------------------------------

/// Discards the body; used for `()`.
pub struct UnitConverter;

impl ResponseConverter for UnitConverter {
    fn convert(&self, _body: Bytes) -> Result<AnyValue, ConversionError> {
        Ok(Box::new(()))
    }
}

/// Hands the raw bytes through; used for `Body`.
pub struct BytesConverter;

impl ResponseConverter for BytesConverter {
    fn convert(&self, body: Bytes) -> Result<AnyValue, ConversionError> {
        Ok(Box::new(body))
    }
}

/// Always consulted first, so these types cannot be claimed by user factories.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltInConverters;

impl ConverterFactory for BuiltInConverters {
    fn name(&self) -> &str {
        "built-in"
    }

    fn response_body_converter(
        &self,
        response_type: &TypeRef,
        _annotations: &Annotations,
    ) -> Result<Option<Arc<dyn ResponseConverter>>, BoxError> {
        if response_type.is_unit() {
            return Ok(Some(Arc::new(UnitConverter)));
        }
        if response_type.raw_name() == TypeRef::BODY && !response_type.is_parameterized() {
            return Ok(Some(Arc::new(BytesConverter)));
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// Returns the body as UTF-8 text, unchanged.
struct TextConverter {
    target: TypeRef,
}

impl ResponseConverter for TextConverter {
    fn convert(&self, body: Bytes) -> Result<AnyValue, ConversionError> {
        let text = String::from_utf8(body.to_vec())
            .map_err(|e| ConversionError::new(self.target.clone(), e))?;
        Ok(Box::new(text))
    }
}

/// Parses a plain-text body into a scalar, ignoring surrounding whitespace.
struct ScalarConverter<T> {
    target: TypeRef,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> ResponseConverter for ScalarConverter<T>
where
    T: FromStr + Send + 'static,
    T::Err: Display,
{
    fn convert(&self, body: Bytes) -> Result<AnyValue, ConversionError> {
        let text = std::str::from_utf8(&body)
            .map_err(|e| ConversionError::new(self.target.clone(), e))?;
        let value = text
            .trim()
            .parse::<T>()
            .map_err(|e| ConversionError::new(self.target.clone(), e.to_string()))?;
        Ok(Box::new(value))
    }
}

fn scalar<T>(target: &TypeRef) -> Arc<dyn ResponseConverter>
where
    T: FromStr + Send + 'static,
    T::Err: Display,
{
    Arc::new(ScalarConverter::<T> {
        target: target.clone(),
        _marker: std::marker::PhantomData,
    })
}

/// Converts plain-text bodies to `String` (verbatim) and primitive scalars.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScalarConverterFactory;

impl ConverterFactory for ScalarConverterFactory {
    fn name(&self) -> &str {
        "scalars"
    }

    fn response_body_converter(
        &self,
        response_type: &TypeRef,
        _annotations: &Annotations,
    ) -> Result<Option<Arc<dyn ResponseConverter>>, BoxError> {
        if response_type.is_parameterized() {
            return Ok(None);
        }
        let converter: Arc<dyn ResponseConverter> = match response_type.raw_name() {
            "String" => Arc::new(TextConverter {
                target: response_type.clone(),
            }),
            "bool" => scalar::<bool>(response_type),
            "i64" => scalar::<i64>(response_type),
            "u64" => scalar::<u64>(response_type),
            "f64" => scalar::<f64>(response_type),
            _ => return Ok(None),
        };
        Ok(Some(converter))
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

type DecodeFn = fn(&[u8]) -> Result<AnyValue, serde_json::Error>;

fn decode<T: DeserializeOwned + Send + 'static>(bytes: &[u8]) -> Result<AnyValue, serde_json::Error> {
    Ok(Box::new(serde_json::from_slice::<T>(bytes)?))
}

struct JsonConverter {
    target: TypeRef,
    decode: DecodeFn,
}

impl ResponseConverter for JsonConverter {
    fn convert(&self, body: Bytes) -> Result<AnyValue, ConversionError> {
        (self.decode)(&body).map_err(|e| ConversionError::new(self.target.clone(), e))
    }
}

/// Decodes JSON bodies with `serde_json`.
///
/// `Json` always decodes to [`serde_json::Value`]. Concrete types are
/// registered by name, so the declared `Repo` decodes to the Rust `Repo`:
///
/// ```
/// use adapters::JsonConverterFactory;
/// use dispatch::TypeRef;
///
/// #[derive(serde::Deserialize)]
/// struct Repo { name: String }
///
/// let json = JsonConverterFactory::new().register::<Repo>(TypeRef::named("Repo"));
/// ```
#[derive(Clone)]
pub struct JsonConverterFactory {
    types: HashMap<TypeRef, DecodeFn>,
}

impl JsonConverterFactory {
    pub fn new() -> Self {
        let mut types: HashMap<TypeRef, DecodeFn> = HashMap::new();
        types.insert(TypeRef::named(JSON_VALUE), decode::<Value>);
        Self { types }
    }

    /// Decodes the declared type `declared` into `T`.
    #[must_use]
    pub fn register<T: DeserializeOwned + Send + 'static>(mut self, declared: TypeRef) -> Self {
        self.types.insert(declared, decode::<T>);
        self
    }
}

impl Default for JsonConverterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterFactory for JsonConverterFactory {
    fn name(&self) -> &str {
        "json"
    }

    fn response_body_converter(
        &self,
        response_type: &TypeRef,
        _annotations: &Annotations,
    ) -> Result<Option<Arc<dyn ResponseConverter>>, BoxError> {
        Ok(self.types.get(response_type).map(|decode| {
            Arc::new(JsonConverter {
                target: response_type.clone(),
                decode: *decode,
            }) as Arc<dyn ResponseConverter>
        }))
    }
}
