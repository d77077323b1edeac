//! Cart synchronization against the scripted backend.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use crafted_chapter_core::{AuthToken, ProductId};
use crafted_chapter_integration_tests::{Client, ScriptedBackend, eventually};
use crafted_chapter_storefront::storage::{KeyValueStore, MemoryStore, keys};
use crafted_chapter_storefront::{CartItems, CartState, ClientError};

fn as_map(items: &CartItems) -> BTreeMap<String, i64> {
    items
        .iter()
        .map(|(id, q)| (id.to_string(), i64::from(q)))
        .collect()
}

fn id(s: &str) -> ProductId {
    ProductId::new(s)
}

/// A signed-in client whose cart has been fetched once.
async fn signed_in(backend: &ScriptedBackend) -> (Client, String) {
    let token = backend.add_user("Asha", "asha@example.com", "pw");
    let client = Client::new(backend, "/cart");
    client
        .storefront
        .session()
        .login(AuthToken::new(token.clone()))
        .unwrap();
    client.storefront.cart().sync_session().await;
    (client, token)
}

// =============================================================================
// Replace-from-response
// =============================================================================

#[tokio::test]
async fn test_every_mutation_adopts_the_server_mapping() {
    let backend = ScriptedBackend::start().await;
    let (client, token) = signed_in(&backend).await;
    let cart = client.storefront.cart();

    cart.add_to_cart(&id("b1")).await.unwrap();
    assert_eq!(as_map(&cart.items()), backend.cart(&token));

    cart.add_to_cart(&id("b2")).await.unwrap();
    cart.add_to_cart(&id("b1")).await.unwrap();
    assert_eq!(as_map(&cart.items()), backend.cart(&token));

    // Another session changes the server cart behind our back.
    backend.set_cart(&token, &[("b1", 7), ("b3", 1)]);
    cart.add_to_cart(&id("b1")).await.unwrap();
    assert_eq!(
        as_map(&cart.items()),
        BTreeMap::from([("b1".to_string(), 8), ("b3".to_string(), 1)])
    );

    cart.remove_from_cart(&id("b3")).await.unwrap();
    assert_eq!(as_map(&cart.items()), backend.cart(&token));
    assert!(!cart.items().contains(&id("b3")));
    assert_eq!(cart.state(), CartState::Synced);
}

#[tokio::test]
async fn test_remove_one_unit_of_a_multi_unit_line() {
    let backend = ScriptedBackend::start().await;
    let token = backend.add_user("Asha", "asha@example.com", "pw");
    backend.set_cart(&token, &[("A", 2), ("B", 1)]);

    let client = Client::new(&backend, "/cart");
    client.storefront.session().login(AuthToken::new(token)).unwrap();
    let cart = client.storefront.cart();
    cart.sync_session().await;
    assert_eq!(cart.items().quantity(&id("A")), 2);

    cart.remove_from_cart(&id("A")).await.unwrap();

    assert_eq!(
        as_map(&cart.items()),
        BTreeMap::from([("A".to_string(), 1), ("B".to_string(), 1)])
    );
}

#[tokio::test]
async fn test_failed_mutation_leaves_cart_untouched() {
    let backend = ScriptedBackend::start().await;
    let (client, token) = signed_in(&backend).await;
    let cart = client.storefront.cart();
    cart.add_to_cart(&id("b1")).await.unwrap();
    let before = cart.items();

    backend.fail(Method::POST, "/cart", StatusCode::BAD_REQUEST, Some("Out of stock"));
    let err = cart.add_to_cart(&id("b1")).await.unwrap_err();

    assert!(matches!(err, ClientError::Api(_)));
    assert_eq!(cart.items(), before);
    assert_eq!(client.notifier.errors(), vec!["Out of stock".to_string()]);
    assert_eq!(backend.cart(&token).get("b1"), Some(&1));

    backend.fail(Method::DELETE, "/cart/b1", StatusCode::BAD_GATEWAY, None);
    cart.remove_from_cart(&id("b1")).await.unwrap_err();
    assert_eq!(cart.items(), before);
    assert_eq!(
        client.notifier.errors().last().map(String::as_str),
        Some("Failed to remove item from cart")
    );
}

#[tokio::test]
async fn test_control_is_pending_while_request_in_flight() {
    let backend = ScriptedBackend::start().await;
    let (client, _) = signed_in(&backend).await;
    backend.delay(Method::POST, "/cart", Duration::from_millis(150));

    let cart = client.storefront.cart().clone();
    let add = tokio::spawn({
        let cart = cart.clone();
        async move { cart.add_to_cart(&ProductId::new("b2")).await }
    });

    assert!(eventually(|| cart.is_pending(&id("b2"))).await);
    assert!(!cart.is_pending(&id("b1")));
    add.await.unwrap().unwrap();
    assert!(!cart.is_pending(&id("b2")));
    assert_eq!(cart.items().quantity(&id("b2")), 1);
}

// =============================================================================
// Session transitions
// =============================================================================

#[tokio::test]
async fn test_token_transition_fetches_exactly_once() {
    let backend = ScriptedBackend::start().await;
    let token = backend.add_user("Asha", "asha@example.com", "pw");
    backend.set_cart(&token, &[("b1", 1)]);

    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::with_entries([(
        keys::TOKEN,
        format!("\"{token}\""),
    )]));
    let client = Client::with_store(&backend, "/", store);

    let _running = client.storefront.start().await;
    assert_eq!(backend.count(&Method::GET, "/cart"), 1);
    assert_eq!(client.storefront.cart().count(), 1);

    client.storefront.cart().sync_session().await;
    client.storefront.cart().sync_session().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.count(&Method::GET, "/cart"), 1);
}

#[tokio::test]
async fn test_logout_empties_cart_without_network() {
    let backend = ScriptedBackend::start().await;
    let (client, token) = signed_in(&backend).await;
    let cart = client.storefront.cart();
    cart.add_to_cart(&id("b1")).await.unwrap();
    cart.add_to_cart(&id("b2")).await.unwrap();
    backend.clear_requests();

    client.storefront.session().logout().unwrap();

    assert!(cart.items().is_empty());
    assert!(cart.display_items().is_empty());
    assert_eq!(cart.state(), CartState::Unauthenticated);
    assert!(backend.requests().is_empty());
    assert_eq!(backend.cart(&token).len(), 2);
    assert!(client.store.get(keys::CART).unwrap().is_none());
}

#[tokio::test]
async fn test_watch_drops_response_for_previous_account() {
    let backend = ScriptedBackend::start().await;
    let first = backend.add_user("Asha", "asha@example.com", "pw");
    let second = backend.add_user("Ravi", "ravi@example.com", "pw");
    backend.set_cart(&first, &[("b1", 5)]);
    backend.set_cart(&second, &[("b2", 1)]);
    backend.delay(Method::GET, "/cart", Duration::from_millis(100));

    let client = Client::new(&backend, "/");
    let _running = client.storefront.start().await;
    let session = client.storefront.session();
    let cart = client.storefront.cart();

    session.login(AuthToken::new(first)).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.login(AuthToken::new(second.clone())).unwrap();

    assert!(eventually(|| cart.state() == CartState::Synced).await);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(as_map(&cart.items()), backend.cart(&second));
}

#[tokio::test]
async fn test_provisional_snapshot_until_first_fetch() {
    let backend = ScriptedBackend::start().await;
    let token = backend.add_user("Asha", "asha@example.com", "pw");
    backend.set_cart(&token, &[("b2", 2)]);
    backend.delay(Method::GET, "/cart", Duration::from_millis(150));

    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::with_entries([
        (keys::TOKEN, format!("\"{token}\"")),
        (keys::CART, r#"{"b9":4}"#.to_string()),
    ]));
    let client = Client::with_store(&backend, "/cart", store);
    let cart = client.storefront.cart().clone();

    let starting = tokio::spawn({
        let storefront = client.storefront.clone();
        async move { storefront.start().await }
    });
    assert!(eventually(|| cart.state() == CartState::Syncing).await);
    assert_eq!(cart.display_items().quantity(&id("b9")), 4);
    assert!(cart.items().is_empty());

    let _running = starting.await.unwrap();
    assert_eq!(as_map(&cart.display_items()), backend.cart(&token));
    assert_eq!(
        client.store.get(keys::CART).unwrap().as_deref(),
        Some(r#"{"b2":2}"#)
    );
}

// =============================================================================
// Unauthenticated use and clearing
// =============================================================================

#[tokio::test]
async fn test_add_without_session_sends_nothing() {
    let backend = ScriptedBackend::start().await;
    let client = Client::new(&backend, "/");

    let err = client
        .storefront
        .cart()
        .add_to_cart(&id("X"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::NotAuthenticated));
    assert!(backend.requests().is_empty());
    assert_eq!(
        client.notifier.errors(),
        vec!["Please login to continue".to_string()]
    );
    assert!(client.storefront.cart().items().is_empty());
}

#[tokio::test]
async fn test_silent_clear_swallows_server_error() {
    let backend = ScriptedBackend::start().await;
    let (client, _) = signed_in(&backend).await;
    let cart = client.storefront.cart();
    cart.add_to_cart(&id("b1")).await.unwrap();
    backend.fail(Method::POST, "/cart/clear", StatusCode::INTERNAL_SERVER_ERROR, None);

    cart.clear_cart(true).await.unwrap();

    assert!(cart.items().is_empty());
    assert!(client.notifier.errors().is_empty());
    assert_eq!(backend.count(&Method::POST, "/cart/clear"), 1);
}

#[tokio::test]
async fn test_loud_clear_reports_server_error_and_still_empties() {
    let backend = ScriptedBackend::start().await;
    let (client, _) = signed_in(&backend).await;
    let cart = client.storefront.cart();
    cart.add_to_cart(&id("b1")).await.unwrap();
    backend.fail(Method::POST, "/cart/clear", StatusCode::INTERNAL_SERVER_ERROR, None);

    let err = cart.clear_cart(false).await.unwrap_err();

    assert!(matches!(err, ClientError::Api(_)));
    assert!(cart.items().is_empty());
    assert_eq!(client.notifier.errors(), vec!["Failed to clear cart".to_string()]);
}

#[tokio::test]
async fn test_successful_clear_empties_server_and_local() {
    let backend = ScriptedBackend::start().await;
    let (client, token) = signed_in(&backend).await;
    let cart = client.storefront.cart();
    cart.add_to_cart(&id("b1")).await.unwrap();

    cart.clear_cart(false).await.unwrap();

    assert!(cart.items().is_empty());
    assert!(backend.cart(&token).is_empty());
}

#[tokio::test]
async fn test_clear_for_previous_account_keeps_new_cart() {
    let backend = ScriptedBackend::start().await;
    let (client, first) = signed_in(&backend).await;
    let second = backend.add_user("Ravi", "ravi@example.com", "pw");
    backend.set_cart(&first, &[("b1", 1)]);
    backend.set_cart(&second, &[("b2", 3)]);
    backend.delay(Method::POST, "/cart/clear", Duration::from_millis(200));
    let cart = client.storefront.cart().clone();

    let clearing = tokio::spawn({
        let cart = cart.clone();
        async move { cart.clear_cart(true).await }
    });
    assert!(eventually(|| backend.count(&Method::POST, "/cart/clear") == 1).await);

    client
        .storefront
        .session()
        .login(AuthToken::new(second.clone()))
        .unwrap();
    cart.sync_session().await;
    assert_eq!(as_map(&cart.items()), backend.cart(&second));

    clearing.await.unwrap().unwrap();
    assert_eq!(cart.state(), CartState::Synced);
    assert_eq!(cart.items().quantity(&id("b2")), 3);
    assert!(backend.cart(&first).is_empty());
}
