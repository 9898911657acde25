//! Identifier Types with NewType Pattern
//!
//! Application references and remote endpoint ids are both plain strings on
//! the wire. Wrapping them prevents passing one where the other is expected,
//! and construction rejects empty values so an [`EndpointId`] only exists once
//! the platform has actually assigned one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CertError;

/// Macro to generate non-empty NewType identifier wrappers
macro_rules! domain_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse an identifier, rejecting empty or whitespace-only values
            pub fn parse(s: impl Into<String>) -> Result<Self, CertError> {
                let s = s.into();
                if s.trim().is_empty() {
                    return Err(CertError::validation_field(
                        concat!($field, " cannot be empty"),
                        $field,
                    ));
                }
                Ok(Self(s))
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Convert to inner string value
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = CertError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CertError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(s)
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

domain_id!(
    /// Name or id of the application that owns a certificate endpoint
    AppRef,
    "app"
);

domain_id!(
    /// Platform-assigned identifier of a certificate endpoint
    EndpointId,
    "id"
);
