//! Newtype IDs for type-safe entity references.
//!
//! The bookstore API hands out opaque string identifiers (document ids), so
//! every ID wraps a `String`. Use the `define_id!` macro to keep product and
//! order identifiers from being mixed up.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>`, `Display` and `AsRef<str>`
///
/// # Example
///
/// ```rust
/// # use crafted_chapter_core::define_id;
/// define_id!(ShelfId);
/// define_id!(ReviewId);
///
/// let shelf = ShelfId::new("65f1c0");
/// let review = ReviewId::new("65f1c0");
///
/// // These are different types, so this won't compile:
/// // let _: ShelfId = review;
/// assert_eq!(shelf.as_str(), review.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the underlying string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(ProductId);
define_id!(OrderId);

impl ProductId {
    /// Short suffix used to label products that are not in the loaded catalog.
    ///
    /// Returns the last five characters (or the whole id if shorter).
    #[must_use]
    pub fn short_suffix(&self) -> &str {
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(4)
            .map_or(0, |(index, _)| index);
        self.0.get(start..).unwrap_or(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_is_transparent_in_json() {
        let id = ProductId::new("65a1f3c2");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"65a1f3c2\"");

        let parsed: ProductId = serde_json::from_str("\"65a1f3c2\"").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_short_suffix() {
        assert_eq!(ProductId::new("65a1f3c2d9e8").short_suffix(), "2d9e8");
        assert_eq!(ProductId::new("abc").short_suffix(), "abc");
        assert_eq!(ProductId::new("").short_suffix(), "");
    }

    #[test]
    fn test_ids_order_lexically() {
        let mut ids = vec![ProductId::new("b"), ProductId::new("a")];
        ids.sort();
        assert_eq!(ids, vec![ProductId::new("a"), ProductId::new("b")]);
    }
}
