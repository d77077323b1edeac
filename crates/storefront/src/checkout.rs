//! Checkout and order history.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::Order;
use crate::cart::CartEngine;
use crate::catalog::CatalogProvider;
use crate::error::{ClientError, Result, add_breadcrumb};
use crate::http::ApiClient;
use crate::navigation::{Navigator, routes};
use crate::notify::Notifier;
use crate::session::SessionManager;
use crate::task::TaskHandle;

const ORDER_FAILED: &str = "Failed to place order";
const ORDERS_FAILED: &str = "Server connection failed";

/// Shipping address as entered at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
}

impl ShippingAddress {
    /// Check that every field is filled in.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("Street", &self.street),
            ("City", &self.city),
            ("State", &self.state),
            ("Zipcode", &self.zipcode),
            ("Country", &self.country),
        ];
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(ClientError::InvalidInput(format!("{name} is required"))),
            None => Ok(()),
        }
    }

    /// The single-line form the order endpoint expects.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{}, {}, {}, {}, {}",
            self.street.trim(),
            self.city.trim(),
            self.state.trim(),
            self.zipcode.trim(),
            self.country.trim()
        )
    }
}

/// Places orders and reads order history.
#[derive(Clone)]
pub struct Checkout {
    api: ApiClient,
    session: SessionManager,
    cart: CartEngine,
    catalog: CatalogProvider,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for Checkout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout").finish_non_exhaustive()
    }
}

impl Checkout {
    #[must_use]
    pub fn new(
        api: ApiClient,
        session: SessionManager,
        cart: CartEngine,
        catalog: CatalogProvider,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api,
            session,
            cart,
            catalog,
            navigator,
            notifier,
        }
    }

    /// Place an order for the current cart.
    ///
    /// Refuses without sending anything when no cart line resolves against
    /// the catalog. On success the cart is cleared silently (the server may
    /// already have emptied it) and the shopper is sent to order history.
    ///
    /// # Errors
    ///
    /// `EmptyCart`, `InvalidInput` for a blank address field, or the API
    /// error. Every error is also reported through the notifier.
    #[instrument(skip(self, address))]
    pub async fn place_order(&self, address: &ShippingAddress) -> Result<Order> {
        match self.submit(address).await {
            Ok(order) => {
                self.notifier.success("Order Placed Successfully!");
                self.navigator.redirect(routes::ORDERS);
                Ok(order)
            }
            Err(err) => {
                self.notifier.error(&err.user_message(ORDER_FAILED));
                err.capture();
                Err(err)
            }
        }
    }

    async fn submit(&self, address: &ShippingAddress) -> Result<Order> {
        self.cart.sync_session().await;
        if self.cart.details(&self.catalog).is_empty() {
            return Err(ClientError::EmptyCart);
        }
        address.validate()?;

        let order = self.api.create_order(&address.to_line()).await?;
        tracing::info!(order_id = %order.id, total = %order.total_amount, "Order placed");
        add_breadcrumb("checkout", "Order placed", &[("order_id", order.id.as_str())]);

        self.cart.clear_cart(true).await?;
        Ok(order)
    }

    /// The shopper's order history. Empty without a session (no request).
    ///
    /// # Errors
    ///
    /// Returns the API error after reporting `Order History: <message>`.
    #[instrument(skip(self))]
    pub async fn orders(&self) -> Result<Vec<Order>> {
        if !self.session.is_authenticated() {
            return Ok(Vec::new());
        }

        match self.api.list_orders().await {
            Ok(orders) => Ok(orders),
            Err(e) => {
                let err = ClientError::from(e);
                self.notifier
                    .error(&format!("Order History: {}", err.user_message(ORDERS_FAILED)));
                err.capture();
                Err(err)
            }
        }
    }

    /// Fetch order history in the background; dropping the handle cancels
    /// the request and nothing is reported for it.
    pub fn spawn_orders(&self) -> TaskHandle<Result<Vec<Order>>> {
        let checkout = self.clone();
        TaskHandle::spawn(async move { checkout.orders().await })
    }
}
