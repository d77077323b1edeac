//! Catalog, cart and wishlist commands.

use crafted_chapter_core::ProductId;
use crafted_chapter_storefront::ClientConfig;
use crafted_chapter_storefront::api::Product;
use crafted_chapter_storefront::navigation::routes;

use super::{CliError, open};

fn print_product(product: &Product) {
    println!(
        "{:<26} {:>10}  {} - {}",
        product.id.to_string(),
        product.price.to_string(),
        product.title,
        product.author
    );
}

fn product_id(raw: &str) -> Result<ProductId, CliError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CliError::Usage("Product id is required".to_string()));
    }
    Ok(ProductId::new(raw))
}

/// List the catalog, optionally filtered by genre (case-insensitive).
///
/// # Errors
///
/// Returns an error if the storefront cannot be opened.
pub async fn products(config: ClientConfig, genre: Option<&str>) -> Result<(), CliError> {
    let (storefront, _running) = open(config, routes::HOME).await?;
    storefront.catalog().load().await;

    let products = storefront.catalog().products();
    let mut shown = 0;
    for product in products.iter().filter(|p| {
        genre.is_none_or(|g| p.genres.iter().any(|pg| pg.eq_ignore_ascii_case(g)))
    }) {
        print_product(product);
        shown += 1;
    }

    if shown == 0 {
        println!("No books found.");
    }
    Ok(())
}

/// Print the cart with resolved lines and the total.
///
/// # Errors
///
/// Returns an error if the storefront cannot be opened.
pub async fn show_cart(config: ClientConfig) -> Result<(), CliError> {
    let (storefront, _running) = open(config, routes::CART).await?;
    storefront.catalog().load().await;

    let cart = storefront.cart();
    let details = cart.details(storefront.catalog());
    if details.is_empty() {
        println!("Your cart is empty.");
        return Ok(());
    }

    for line in &details {
        println!(
            "{:>3} x {:<40} {:>10}",
            line.quantity,
            line.product.title,
            line.subtotal.to_string()
        );
    }
    let unresolved = cart.count().saturating_sub(details.len());
    if unresolved > 0 {
        println!("({unresolved} line(s) not in the catalog)");
    }
    println!("Total: {}", cart.total_amount(storefront.catalog()));
    Ok(())
}

/// Add one unit.
///
/// # Errors
///
/// Returns an error if there is no session or the server rejects the change.
pub async fn add(config: ClientConfig, raw_id: &str) -> Result<(), CliError> {
    let id = product_id(raw_id)?;
    let (storefront, _running) = open(config, routes::CART).await?;
    storefront.cart().add_to_cart(&id).await?;
    println!("{id}: {} in cart", storefront.cart().items().quantity(&id));
    Ok(())
}

/// Remove one unit.
///
/// # Errors
///
/// Returns an error if there is no session or the server rejects the change.
pub async fn remove(config: ClientConfig, raw_id: &str) -> Result<(), CliError> {
    let id = product_id(raw_id)?;
    let (storefront, _running) = open(config, routes::CART).await?;
    storefront.cart().remove_from_cart(&id).await?;
    println!("{id}: {} in cart", storefront.cart().items().quantity(&id));
    Ok(())
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the server clear fails (the local cart is emptied
/// anyway).
pub async fn clear(config: ClientConfig) -> Result<(), CliError> {
    let (storefront, _running) = open(config, routes::CART).await?;
    storefront.cart().clear_cart(false).await?;
    println!("Cart cleared.");
    Ok(())
}

/// List wishlisted books.
///
/// # Errors
///
/// Returns an error if the storefront cannot be opened.
pub async fn wishlist(config: ClientConfig) -> Result<(), CliError> {
    let (storefront, _running) = open(config, routes::HOME).await?;
    storefront.catalog().load().await;

    let products = storefront.wishlist().products(storefront.catalog());
    if products.is_empty() {
        println!("Your wishlist is empty.");
    }
    for product in &products {
        print_product(product);
    }
    Ok(())
}

/// Add or remove a wishlist entry.
///
/// # Errors
///
/// Returns an error if the id is blank or the storefront cannot be opened.
pub async fn toggle_wishlist(config: ClientConfig, raw_id: &str) -> Result<(), CliError> {
    let id = product_id(raw_id)?;
    let (storefront, _running) = open(config, routes::HOME).await?;
    if storefront.wishlist().toggle(&id) {
        println!("Added {id} to wishlist.");
    } else {
        println!("Removed {id} from wishlist.");
    }
    Ok(())
}
