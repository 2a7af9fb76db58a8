//! Strongly-typed identifiers for domain entities
//!
//! Ledger-generated identifiers wrap time-ordered UUIDs. Claims and documents
//! are keyed by the identifiers assigned at intake, which external systems
//! echo back in their webhook payloads, so those wrap validated strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

/// Maximum length accepted for an externally assigned key
pub const MAX_KEY_LEN: usize = 128;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a new time-ordered identifier (v7)
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the identifier prefix for display
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new_v7()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Strip prefix if present
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

macro_rules! define_key {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parses and validates an externally assigned key
            ///
            /// Surrounding whitespace is trimmed. Empty keys, keys longer than
            /// [`MAX_KEY_LEN`], and keys containing control characters are rejected.
            pub fn parse(value: impl AsRef<str>) -> Result<Self, CoreError> {
                let trimmed = value.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(CoreError::validation(concat!($label, " must not be empty")));
                }
                if trimmed.len() > MAX_KEY_LEN {
                    return Err(CoreError::validation(format!(
                        "{} exceeds {} characters",
                        $label, MAX_KEY_LEN
                    )));
                }
                if trimmed.chars().any(char::is_control) {
                    return Err(CoreError::validation(concat!(
                        $label,
                        " contains control characters"
                    )));
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Returns the key as a string slice
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
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Keys assigned at intake
define_key!(ClaimId, "claim id");
define_key!(DocumentId, "document id");

// Ledger identifiers
define_id!(AuditEntryId, "AUD");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_entry_id_display() {
        let id = AuditEntryId::new_v7();
        assert!(id.to_string().starts_with("AUD-"));
    }

    #[test]
    fn test_audit_entry_id_parsing() {
        let original = AuditEntryId::new_v7();
        let parsed: AuditEntryId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_claim_id_trims_whitespace() {
        let id = ClaimId::parse("  C1 ").unwrap();
        assert_eq!(id.as_str(), "C1");
        assert_eq!(id.to_string(), "C1");
    }

    #[test]
    fn test_claim_id_rejects_empty() {
        assert!(ClaimId::parse("").is_err());
        assert!(ClaimId::parse("   ").is_err());
    }
}
