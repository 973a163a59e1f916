//! Entity identifiers
//!
//! Every sender and recipient is addressed by a URN of the form
//! `urn:<namespace>:<entity-type>:<opaque-id>`. The canonical string form
//! is stable and case-sensitive; it is the key for presence lookups,
//! device-token lookups, and the offline store.
//!
//! Older clients send bare ids (`user-bob`). Those are accepted wherever a
//! URN string is accepted and resolve to `urn:sm:user:<id>`, so the two
//! spellings address the same entity.

use crate::error::UrnError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Fixed namespace for all identifiers in this deployment
pub const NAMESPACE: &str = "sm";

/// Entity type for end users
pub const ENTITY_USER: &str = "user";

const URN_PREFIX: &str = "urn:";

/// A parsed entity identifier
///
/// The zero value (`Urn::default()`) has all components empty and is used
/// to represent an absent identity; it never round-trips through `parse`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Urn {
    namespace: String,
    entity_type: String,
    id: String,
}

impl Urn {
    /// Create a URN from components. All components must be non-empty.
    pub fn new(
        namespace: impl Into<String>,
        entity_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<Self, UrnError> {
        let urn = Self {
            namespace: namespace.into(),
            entity_type: entity_type.into(),
            id: id.into(),
        };
        if urn.namespace.is_empty() || urn.entity_type.is_empty() || urn.id.is_empty() {
            return Err(UrnError(urn.to_components_string()));
        }
        Ok(urn)
    }

    /// Create a user URN in the fixed namespace
    pub fn user(id: impl Into<String>) -> Result<Self, UrnError> {
        Self::new(NAMESPACE, ENTITY_USER, id)
    }

    /// Parse a URN from either accepted spelling.
    ///
    /// Strings starting with `urn:` must be the full four-part form with
    /// non-empty components. Anything else is treated as a bare legacy id
    /// and resolves to `urn:sm:user:<id>`. The opaque id may itself
    /// contain colons.
    pub fn parse(s: &str) -> Result<Self, UrnError> {
        if s.is_empty() {
            return Err(UrnError(s.to_string()));
        }
        match s.strip_prefix(URN_PREFIX) {
            Some(rest) => {
                let mut parts = rest.splitn(3, ':');
                let namespace = parts.next().unwrap_or_default();
                let entity_type = parts.next().unwrap_or_default();
                let id = parts.next().unwrap_or_default();
                Self::new(namespace, entity_type, id).map_err(|_| UrnError(s.to_string()))
            }
            None => Self::user(s),
        }
    }

    /// True iff all components are empty
    pub fn is_zero(&self) -> bool {
        self.namespace.is_empty() && self.entity_type.is_empty() && self.id.is_empty()
    }

    /// Namespace component
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Entity-type component
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Opaque id component
    pub fn id(&self) -> &str {
        &self.id
    }

    fn to_components_string(&self) -> String {
        format!(
            "{URN_PREFIX}{}:{}:{}",
            self.namespace, self.entity_type, self.id
        )
    }
}

impl fmt::Display for Urn {
    /// Canonical string form. The zero URN renders as the empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return Ok(());
        }
        write!(f, "{}", self.to_components_string())
    }
}

impl FromStr for Urn {
    type Err = UrnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Urn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Urn {
    /// Accepts a full URN string, a bare legacy id, or the empty string
    /// (decoded as the zero URN so absent fields survive decoding and are
    /// rejected by validation instead).
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(Urn::default());
        }
        Urn::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_form() {
        let urn = Urn::parse("urn:sm:user:user-bob").unwrap();
        assert_eq!(urn.namespace(), "sm");
        assert_eq!(urn.entity_type(), "user");
        assert_eq!(urn.id(), "user-bob");
        assert_eq!(urn.to_string(), "urn:sm:user:user-bob");
    }

    #[test]
    fn test_parse_round_trip() {
        for s in ["urn:sm:user:alice", "user-bob", "urn:sm:device:tablet-1"] {
            let first = Urn::parse(s).unwrap();
            let second = Urn::parse(&first.to_string()).unwrap();
            assert_eq!(first, second, "round trip failed for {s}");
        }
    }

    #[test]
    fn test_legacy_id_resolves_to_user_urn() {
        let legacy = Urn::parse("user-bob").unwrap();
        let full = Urn::parse("urn:sm:user:user-bob").unwrap();
        assert_eq!(legacy, full);
    }

    #[test]
    fn test_id_may_contain_colons() {
        let urn = Urn::parse("urn:sm:user:tenant:42").unwrap();
        assert_eq!(urn.id(), "tenant:42");
        assert_eq!(
            Urn::parse(&urn.to_string()).unwrap(),
            urn,
            "colon ids must round trip"
        );
    }

    #[test]
    fn test_malformed() {
        for s in ["", "urn:", "urn:sm", "urn:sm:user", "urn:sm:user:", "urn::user:x"] {
            assert!(Urn::parse(s).is_err(), "expected '{s}' to be malformed");
        }
    }

    #[test]
    fn test_urn_prefix_is_never_a_legacy_id() {
        // A truncated URN must not be silently rewritten to urn:sm:user:...
        assert!(Urn::parse("urn:sm:user").is_err());
    }

    #[test]
    fn test_zero_value() {
        let zero = Urn::default();
        assert!(zero.is_zero());
        assert_eq!(zero.to_string(), "");
        assert!(!Urn::parse("user-bob").unwrap().is_zero());
    }

    #[test]
    fn test_case_sensitive() {
        let lower = Urn::parse("urn:sm:user:bob").unwrap();
        let upper = Urn::parse("urn:sm:user:Bob").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_serde_accepts_both_forms() {
        let from_urn: Urn = serde_json::from_str(r#""urn:sm:user:user-bob""#).unwrap();
        let from_legacy: Urn = serde_json::from_str(r#""user-bob""#).unwrap();
        assert_eq!(from_urn, from_legacy);
    }

    #[test]
    fn test_serde_empty_string_is_zero() {
        let urn: Urn = serde_json::from_str(r#""""#).unwrap();
        assert!(urn.is_zero());
        assert_eq!(serde_json::to_string(&urn).unwrap(), r#""""#);
    }

    #[test]
    fn test_serde_canonical_form() {
        let urn = Urn::user("alice").unwrap();
        assert_eq!(
            serde_json::to_string(&urn).unwrap(),
            r#""urn:sm:user:alice""#
        );
    }

    #[test]
    fn test_usable_as_map_key() {
        let mut map = std::collections::HashMap::new();
        map.insert(Urn::user("user-bob").unwrap(), 1);
        assert_eq!(map.get(&Urn::parse("user-bob").unwrap()).copied(), Some(1));
    }
}
