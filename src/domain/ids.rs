//! Domain identifier types with validation
//!
//! Newtype wrappers keep SKUs, store slugs and the various UUID keys from
//! being mixed up at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stock keeping unit, the natural key of a catalog item across sync cycles
///
/// # Examples
///
/// ```
/// use catalog_sync::domain::ids::Sku;
/// use std::str::FromStr;
///
/// let sku = Sku::from_str("RAY-3025-58").unwrap();
/// assert_eq!(sku.as_str(), "RAY-3025-58");
/// assert!(Sku::new("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Creates a new Sku, rejecting blank values
    pub fn new(sku: impl Into<String>) -> Result<Self, String> {
        let sku = sku.into();
        if sku.trim().is_empty() {
            return Err("SKU cannot be empty".to_string());
        }
        Ok(Self(sku))
    }

    /// Returns the SKU as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Sku {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Sku {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the inner UUID
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| format!("Invalid {}: {}", stringify!($name), e))
            }
        }
    };
}

uuid_id!(
    /// Identifier of one OperationRecord (one invocation of one operation kind)
    OperationId
);
uuid_id!(
    /// Identifier of a queued unit of work
    TaskId
);
uuid_id!(
    /// Internal catalog item identifier
    ItemId
);
uuid_id!(
    /// Internal store identifier
    StoreId
);
uuid_id!(
    /// Category or brand identifier
    TaxonId
);
uuid_id!(
    /// Internal order identifier
    OrderId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_rejects_blank() {
        assert!(Sku::new("").is_err());
        assert!(Sku::new("  ").is_err());
        assert_eq!(Sku::new("A-1").unwrap().to_string(), "A-1");
    }

    #[test]
    fn test_uuid_ids_are_distinct_types() {
        let op = OperationId::new();
        let parsed = OperationId::from_str(&op.to_string()).unwrap();
        assert_eq!(op, parsed);
        assert!(TaskId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn test_sku_serializes_transparently() {
        let sku = Sku::new("X-9").unwrap();
        assert_eq!(serde_json::to_string(&sku).unwrap(), "\"X-9\"");
    }
}
