//! Newtype identifiers.
//!
//! Declared methods and individual calls each have an identity. Both are
//! represented as distinct newtypes so a [`MethodId`] can never be passed
//! where a [`CallId`] is expected, even though both end up in the same log
//! lines.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A string identifier was empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("identifier must not be empty")]
pub struct EmptyIdentifier;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String")]
        pub struct $name(String);

        impl TryFrom<String> for $name {
            type Error = EmptyIdentifier;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(EmptyIdentifier)
            }
        }

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (declaration names)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies one declared client method, conventionally
    /// `"<Service>.<method>"` (e.g. `"GitHub.list_repos"`).
    ///
    /// This is the key under which a client caches the built service method
    /// and the name every configuration error points back to.
    MethodId
}

string_id! {
    /// Names an annotation attached to a declared method (e.g. `"streaming"`).
    ///
    /// Annotations are opaque to the core; they are forwarded to every
    /// registry lookup so factories can select on them.
    AnnotationName
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single call object.
///
/// Generated fresh for every invocation of a service method (and for every
/// duplicate of a call) so log lines and spans from one exchange can be
/// correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(Uuid);

impl CallId {
    /// Generates a new random call identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
