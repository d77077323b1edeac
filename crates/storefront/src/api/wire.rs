//! Shared wire-format helpers.

use crafted_chapter_core::ProductId;
use serde::Deserialize;

/// A product reference as the server sends it: either a bare id or an
/// embedded (populated) product document carrying `id` and/or `_id`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProductRef {
    Id(String),
    Embedded {
        id: Option<String>,
        #[serde(rename = "_id")]
        legacy_id: Option<String>,
    },
}

impl ProductRef {
    /// Canonical product id, if the reference carries one.
    pub(crate) fn into_id(self) -> Option<ProductId> {
        let raw = match self {
            Self::Id(id) => canonical_id(Some(id), None),
            Self::Embedded { id, legacy_id } => canonical_id(id, legacy_id),
        };
        raw.map(ProductId::new)
    }
}

/// Pick the canonical identifier from `id ?? _id`.
pub(crate) fn canonical_id(id: Option<String>, legacy_id: Option<String>) -> Option<String> {
    id.filter(|id| !id.is_empty())
        .or_else(|| legacy_id.filter(|id| !id.is_empty()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_id_reference() {
        let r: ProductRef = serde_json::from_str("\"b1\"").unwrap();
        assert_eq!(r.into_id(), Some(ProductId::new("b1")));
    }

    #[test]
    fn test_embedded_reference_prefers_id() {
        let r: ProductRef = serde_json::from_str(r#"{"id":"b1","_id":"legacy","title":"Dune"}"#).unwrap();
        assert_eq!(r.into_id(), Some(ProductId::new("b1")));
    }

    #[test]
    fn test_embedded_reference_falls_back_to_underscore_id() {
        let r: ProductRef = serde_json::from_str(r#"{"_id":"b2","price":10}"#).unwrap();
        assert_eq!(r.into_id(), Some(ProductId::new("b2")));
    }

    #[test]
    fn test_reference_without_id() {
        let r: ProductRef = serde_json::from_str(r#"{"title":"Dune"}"#).unwrap();
        assert_eq!(r.into_id(), None);
    }

    #[test]
    fn test_canonical_id_skips_empty() {
        assert_eq!(
            canonical_id(Some(String::new()), Some("x".to_string())),
            Some("x".to_string())
        );
        assert_eq!(canonical_id(None, None), None);
    }
}
