//! Checkout and order history commands.

use crafted_chapter_storefront::navigation::routes;
use crafted_chapter_storefront::{Access, ClientConfig, ShippingAddress};

use super::{CliError, open};

/// Place an order for the current cart.
///
/// # Errors
///
/// Returns an error if there is no session, the cart is empty or the order
/// is rejected.
pub async fn checkout(config: ClientConfig, address: &ShippingAddress) -> Result<(), CliError> {
    let (storefront, _running) = open(config, routes::CART).await?;
    if storefront.guard().navigate(routes::CHECKOUT) != Access::Granted {
        return Err(CliError::Usage("Please login to continue".to_string()));
    }
    storefront.catalog().load().await;

    let order = storefront.checkout().place_order(address).await?;
    println!(
        "Order {} placed: {} ({})",
        order.id,
        order.total_amount,
        order.status.as_str()
    );
    Ok(())
}

/// Print order history, labelling lines with catalog titles.
///
/// # Errors
///
/// Returns an error if there is no session or the history cannot be loaded.
pub async fn history(config: ClientConfig) -> Result<(), CliError> {
    let (storefront, _running) = open(config, routes::ORDERS).await?;
    if storefront.guard().navigate(routes::ORDERS) != Access::Granted {
        return Err(CliError::Usage("Please login to continue".to_string()));
    }
    storefront.catalog().load().await;

    let orders = storefront.checkout().spawn_orders().join().await.transpose()?;
    let orders = orders.unwrap_or_default();
    if orders.is_empty() {
        println!("No orders yet.");
        return Ok(());
    }

    for order in &orders {
        let placed = order
            .created_at
            .map(|t| t.format("%d %b %Y").to_string())
            .unwrap_or_default();
        println!(
            "#{} {} {} {}",
            order.id,
            placed,
            order.status.as_str(),
            order.total_amount
        );
        for line in &order.items {
            let title = line.product.as_ref().map_or_else(
                || "Unavailable product".to_string(),
                |id| storefront.catalog().title_for(id),
            );
            println!("    {:>3} x {title} @ {}", line.quantity, line.price);
        }
        println!("    Ship to: {}", order.shipping_address);
    }
    Ok(())
}
