//! Order endpoints.

use chrono::{DateTime, Utc};
use crafted_chapter_core::{OrderId, OrderStatus, Price, ProductId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::wire::{ProductRef, canonical_id};
use crate::http::{ApiClient, ApiError};

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOrder")]
pub struct Order {
    pub id: OrderId,
    pub items: Vec<OrderLine>,
    pub total_amount: Price,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub created_at: Option<DateTime<Utc>>,
}

/// One line of a placed order, priced at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product: Option<ProductId>,
    pub quantity: u32,
    pub price: Price,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrder {
    id: Option<String>,
    #[serde(rename = "_id")]
    legacy_id: Option<String>,
    #[serde(default)]
    items: Vec<RawOrderLine>,
    #[serde(default)]
    total_amount: Price,
    #[serde(default)]
    shipping_address: String,
    #[serde(default)]
    status: OrderStatus,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawOrderLine {
    product: Option<ProductRef>,
    #[serde(default)]
    quantity: u32,
    #[serde(default)]
    price: Price,
}

impl TryFrom<RawOrder> for Order {
    type Error = String;

    fn try_from(raw: RawOrder) -> Result<Self, Self::Error> {
        let id = canonical_id(raw.id, raw.legacy_id).ok_or("order without an identifier")?;
        Ok(Self {
            id: OrderId::new(id),
            items: raw
                .items
                .into_iter()
                .map(|line| OrderLine {
                    product: line.product.and_then(ProductRef::into_id),
                    quantity: line.quantity,
                    price: line.price,
                })
                .collect(),
            total_amount: raw.total_amount,
            shipping_address: raw.shipping_address,
            status: raw.status,
            created_at: raw.created_at,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderBody<'a> {
    shipping_address: &'a str,
}

impl ApiClient {
    // =========================================================================
    // Order Methods
    // =========================================================================

    /// Place an order for the current server cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is rejected or the request fails.
    #[instrument(skip(self, shipping_address))]
    pub async fn create_order(&self, shipping_address: &str) -> Result<Order, ApiError> {
        self.post(&["orders"], &CreateOrderBody { shipping_address })
            .await
    }

    /// Fetch the shopper's order history.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a list.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.get(&["orders"]).await
    }

    /// Fetch a single order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order does not exist or the request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: &OrderId) -> Result<Order, ApiError> {
        self.get(&["orders", id.as_str()]).await
    }
}
