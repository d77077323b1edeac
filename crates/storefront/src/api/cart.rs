//! Server cart endpoints.
//!
//! Every mutating endpoint answers with the full cart, which the cart engine
//! adopts wholesale. Nothing here computes quantities.

use crafted_chapter_core::ProductId;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::wire::ProductRef;
use crate::cart::CartItems;
use crate::http::{ApiClient, ApiError};

/// One cart line as the server sends it.
#[derive(Debug, Deserialize)]
struct WireCartLine {
    product: Option<ProductRef>,
    #[serde(default)]
    quantity: i64,
}

/// Cart response body (`{ items: [...] }`).
#[derive(Debug, Deserialize)]
pub struct CartPayload {
    #[serde(default)]
    items: Vec<WireCartLine>,
}

impl CartPayload {
    /// Normalize the payload into the local mapping.
    ///
    /// Product references collapse to canonical ids; lines whose product is
    /// missing (e.g. deleted from the catalog) or whose quantity is not
    /// positive are dropped; duplicate lines are summed.
    #[must_use]
    pub fn into_items(self) -> CartItems {
        CartItems::from_lines(self.items.into_iter().filter_map(|line| {
            let Some(product) = line.product.and_then(ProductRef::into_id) else {
                tracing::warn!(quantity = line.quantity, "Dropping cart line without a product");
                return None;
            };
            Some((product, line.quantity))
        }))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddToCartBody<'a> {
    product_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<u32>,
}

impl ApiClient {
    // =========================================================================
    // Cart Methods (not cached - server is authoritative)
    // =========================================================================

    /// Fetch the server cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a cart.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) -> Result<CartItems, ApiError> {
        let payload: CartPayload = self.get(&["cart"]).await?;
        Ok(payload.into_items())
    }

    /// Ask the server to add `quantity` units (server default: one).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a cart.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_cart_item(
        &self,
        product_id: &ProductId,
        quantity: Option<u32>,
    ) -> Result<CartItems, ApiError> {
        let body = AddToCartBody {
            product_id: product_id.as_str(),
            quantity,
        };
        let payload: CartPayload = self.post(&["cart"], &body).await?;
        Ok(payload.into_items())
    }

    /// Ask the server to remove one unit (or the line, at quantity 1).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a cart.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_cart_item(&self, product_id: &ProductId) -> Result<CartItems, ApiError> {
        let payload: CartPayload = self.delete(&["cart", product_id.as_str()]).await?;
        Ok(payload.into_items())
    }

    /// Ask the server to empty the cart. The response body is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn clear_server_cart(&self) -> Result<(), ApiError> {
        self.post_unit(&["cart", "clear"]).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn items(json: &str) -> CartItems {
        serde_json::from_str::<CartPayload>(json).unwrap().into_items()
    }

    #[test]
    fn test_mixed_product_reference_shapes() {
        let cart = items(
            r#"{"items":[
                {"product":"A","quantity":2},
                {"product":{"_id":"B","title":"Emma"},"quantity":1},
                {"product":{"id":"C"},"quantity":4}
            ]}"#,
        );
        assert_eq!(cart.quantity(&ProductId::new("A")), 2);
        assert_eq!(cart.quantity(&ProductId::new("B")), 1);
        assert_eq!(cart.quantity(&ProductId::new("C")), 4);
    }

    #[test]
    fn test_drops_null_products_and_zero_quantities() {
        let cart = items(
            r#"{"items":[{"product":null,"quantity":3},{"product":"A","quantity":0},{"product":"B","quantity":1}]}"#,
        );
        assert_eq!(cart.len(), 1);
        assert!(cart.contains(&ProductId::new("B")));
    }

    #[test]
    fn test_missing_items_is_empty_cart() {
        assert!(items("{}").is_empty());
    }

    #[test]
    fn test_add_body_shape() {
        let body = AddToCartBody {
            product_id: "A",
            quantity: Some(1),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"productId":"A","quantity":1}"#
        );

        let body = AddToCartBody {
            product_id: "A",
            quantity: None,
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"productId":"A"}"#);
    }
}
