//! Product catalog endpoint.

use crafted_chapter_core::{Price, ProductId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::wire::canonical_id;
use crate::http::{ApiClient, ApiError};

/// A book in the catalog.
///
/// Immutable once fetched; the catalog is read once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Canonical identifier (`id`, or `_id` when the server omits `id`).
    pub id: ProductId,
    pub title: String,
    pub author: String,
    pub price: Price,
    pub description: String,
    /// Cover image URL as sent by the server.
    pub cover_image: String,
    /// Genres in display order.
    pub genres: Vec<String>,
}

/// Product record as the server sends it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawProduct {
    id: Option<String>,
    #[serde(rename = "_id")]
    legacy_id: Option<String>,
    title: String,
    #[serde(default)]
    author: String,
    price: Price,
    #[serde(default)]
    description: String,
    #[serde(default)]
    cover_image: String,
    #[serde(default)]
    genres: Vec<String>,
}

impl RawProduct {
    fn normalize(self) -> Option<Product> {
        let Some(id) = canonical_id(self.id, self.legacy_id) else {
            tracing::warn!(title = %self.title, "Skipping product without an identifier");
            return None;
        };

        Some(Product {
            id: ProductId::new(id),
            title: self.title,
            author: self.author,
            price: self.price,
            description: self.description,
            cover_image: self.cover_image,
            genres: self.genres,
        })
    }
}

/// Decode a product list, dropping records that carry no identifier.
pub(crate) fn decode_products(raw: Vec<RawProduct>) -> Vec<Product> {
    raw.into_iter().filter_map(RawProduct::normalize).collect()
}

impl ApiClient {
    // =========================================================================
    // Product Methods
    // =========================================================================

    /// Fetch the full product list.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a product list.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        let raw: Vec<RawProduct> = self.get(&["products"]).await?;
        let products = decode_products(raw);
        tracing::debug!(count = products.len(), "Fetched products");
        Ok(products)
    }
}
