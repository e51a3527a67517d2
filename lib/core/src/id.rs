//! Strongly-typed identifiers for backend entities.
//!
//! The generation backend assigns both job ids and node ids, so they are
//! opaque strings here. Parsing rejects ids that cannot name a single path
//! segment: empty ids, ids containing `/`, and the dot segments `.` and
//! `..`. Other reserved characters are percent-encoded when a URL is built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to generate a strongly-typed wrapper around a backend-assigned string.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a backend-assigned identifier without validation.
            ///
            /// Use [`FromStr`] for identifiers coming from callers.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.is_empty() {
                    return Err(ParseIdError {
                        id_type: stringify!($name),
                        reason: "identifier is empty".to_string(),
                    });
                }
                if s.contains('/') {
                    return Err(ParseIdError {
                        id_type: stringify!($name),
                        reason: format!("identifier '{s}' contains '/'"),
                    });
                }
                if s == "." || s == ".." {
                    return Err(ParseIdError {
                        id_type: stringify!($name),
                        reason: format!("identifier '{s}' is a dot segment"),
                    });
                }
                Ok(Self(s.to_string()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Identifier the backend assigns to a submitted job (its `prompt_id`).
    JobId
);

define_id!(
    /// Identifier of one stage (node) of a submitted payload graph.
    NodeId
);
