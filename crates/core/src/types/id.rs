//! Newtype IDs for type-safe entity references.
//!
//! The Palermo API hands out numeric identifiers for every entity. Wrapping
//! them keeps a product ID from being passed where a sale ID is expected.

/// Macro to define a type-safe ID wrapper around an `i64`.
///
/// Generated types are `Copy`, hashable, ordered, serialize as a bare number
/// (`#[serde(transparent)]`) and parse from decimal strings, which is how
/// they arrive in HTML form posts.
///
/// # Example
///
/// ```rust
/// # use palermo_core::define_id;
/// define_id!(BranchId);
///
/// let id: BranchId = "42".parse().unwrap();
/// assert_eq!(id.as_i64(), 42);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(ProductId);
define_id!(SaleId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_numbers() {
        let json = serde_json::to_string(&ProductId::new(7)).unwrap();
        assert_eq!(json, "7");

        let parsed: SaleId = serde_json::from_str("1024").unwrap();
        assert_eq!(parsed, SaleId::new(1024));
    }

    #[test]
    fn test_parse_from_form_value() {
        let id: ProductId = " 15 ".parse().unwrap();
        assert_eq!(id.as_i64(), 15);
        assert!("sofa".parse::<ProductId>().is_err());
    }
}
