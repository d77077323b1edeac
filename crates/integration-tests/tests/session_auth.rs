//! Session lifecycle, request interceptors and account flows.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::http::Method;
use crafted_chapter_core::AuthToken;
use crafted_chapter_integration_tests::{Client, ScriptedBackend};
use crafted_chapter_storefront::storage::{KeyValueStore, MemoryStore, keys};
use crafted_chapter_storefront::{CartState, ClientError};
use secrecy::SecretString;

fn password(s: &str) -> SecretString {
    SecretString::from(s)
}

// =============================================================================
// Interceptors
// =============================================================================

#[tokio::test]
async fn test_bearer_token_attached_once_session_exists() {
    let backend = ScriptedBackend::start().await;
    backend.add_user("Asha", "asha@example.com", "pw");
    let client = Client::new(&backend, "/login");

    client.storefront.catalog().load().await;
    client
        .storefront
        .sign_in("asha@example.com", &password("pw"))
        .await
        .unwrap();
    let token = client.storefront.session().current_token().unwrap();

    let requests = backend.requests();
    let products = requests.iter().find(|r| r.path == "/products").unwrap();
    assert!(products.authorization.is_none());

    let login = requests.iter().find(|r| r.path == "/auth/login").unwrap();
    assert!(login.authorization.is_none());

    let cart = requests
        .iter()
        .find(|r| r.method == Method::GET && r.path == "/cart")
        .unwrap();
    assert_eq!(
        cart.authorization.as_deref(),
        Some(format!("Bearer {}", token.expose()).as_str())
    );
}

#[tokio::test]
async fn test_unauthorized_on_protected_surface_signs_out_and_redirects() {
    let backend = ScriptedBackend::start().await;
    let store: Arc<dyn KeyValueStore> =
        Arc::new(MemoryStore::with_entries([(keys::TOKEN, "\"expired-token\"")]));
    let client = Client::with_store(&backend, "/cart", Arc::clone(&store));

    let _running = client.storefront.start().await;

    assert!(!client.storefront.session().is_authenticated());
    assert!(store.get(keys::TOKEN).unwrap().is_none());
    assert_eq!(client.navigator.redirects(), vec!["/login".to_string()]);
    assert_eq!(client.storefront.cart().state(), CartState::Unauthenticated);
}

#[tokio::test]
async fn test_unauthorized_on_login_surface_does_not_redirect_again() {
    let backend = ScriptedBackend::start().await;
    let store: Arc<dyn KeyValueStore> =
        Arc::new(MemoryStore::with_entries([(keys::TOKEN, "\"expired-token\"")]));
    let client = Client::with_store(&backend, "/cart", store);
    let _running = client.storefront.start().await;
    assert_eq!(client.navigator.redirects().len(), 1);

    // Now on /login; a rejected login is a 401 too.
    let err = client
        .storefront
        .sign_in("asha@example.com", &password("wrong"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Api(_)));
    assert_eq!(client.navigator.redirects().len(), 1);
    assert_eq!(
        client.notifier.errors(),
        vec!["Invalid email or password".to_string()]
    );
}

#[tokio::test]
async fn test_non_auth_errors_pass_through_untouched() {
    let backend = ScriptedBackend::start().await;
    let token = backend.add_user("Asha", "asha@example.com", "pw");
    let client = Client::new(&backend, "/cart");
    client.storefront.session().login(AuthToken::new(token)).unwrap();

    let err = client
        .storefront
        .cart()
        .remove_from_cart(&"missing".into())
        .await
        .unwrap_err();

    assert!(matches!(&err, ClientError::Api(api) if api.status().map(|s| s.as_u16()) == Some(404)));
    assert!(client.storefront.session().is_authenticated());
    assert!(client.navigator.redirects().is_empty());
    assert_eq!(client.notifier.errors(), vec!["Item not in cart".to_string()]);
}

// =============================================================================
// Account flows
// =============================================================================

#[tokio::test]
async fn test_sign_in_persists_token_and_goes_home() {
    let backend = ScriptedBackend::start().await;
    backend.add_user("Asha", "asha@example.com", "pw");
    let client = Client::new(&backend, "/login");

    client
        .storefront
        .sign_in("  asha@example.com ", &password("pw"))
        .await
        .unwrap();

    let token = client.storefront.session().current_token().unwrap();
    assert_eq!(
        client.store.get(keys::TOKEN).unwrap(),
        Some(format!("\"{}\"", token.expose()))
    );
    assert_eq!(client.navigator.redirects(), vec!["/".to_string()]);
    assert_eq!(client.storefront.cart().state(), CartState::Synced);
    assert_eq!(backend.count(&Method::GET, "/cart"), 1);
}

#[tokio::test]
async fn test_sign_up_then_duplicate_is_rejected_with_server_message() {
    let backend = ScriptedBackend::start().await;
    let client = Client::new(&backend, "/register");

    client
        .storefront
        .sign_up("Ravi", "ravi@example.com", &password("pw"))
        .await
        .unwrap();
    assert!(client.storefront.session().is_authenticated());

    let other = Client::new(&backend, "/register");
    other
        .storefront
        .sign_up("Ravi", "ravi@example.com", &password("pw"))
        .await
        .unwrap_err();
    assert_eq!(other.notifier.errors(), vec!["User already exists".to_string()]);
    assert!(!other.storefront.session().is_authenticated());
}

#[tokio::test]
async fn test_sign_up_requires_name() {
    let backend = ScriptedBackend::start().await;
    let client = Client::new(&backend, "/register");

    let err = client
        .storefront
        .sign_up("  ", "ravi@example.com", &password("pw"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::InvalidInput(_)));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_profile_for_signed_in_shopper() {
    let backend = ScriptedBackend::start().await;
    backend.add_user("Asha", "asha@example.com", "pw");
    let client = Client::new(&backend, "/login");
    client
        .storefront
        .sign_in("asha@example.com", &password("pw"))
        .await
        .unwrap();

    let profile = client.storefront.profile().await.unwrap();
    assert_eq!(profile.name, "Asha");
    assert_eq!(profile.email, "asha@example.com");
    assert_eq!(profile.role.as_deref(), Some("user"));
    assert!(profile.created_at.is_some());
}

#[tokio::test]
async fn test_sign_out_clears_session_but_not_server_cart() {
    let backend = ScriptedBackend::start().await;
    let token = backend.add_user("Asha", "asha@example.com", "pw");
    backend.set_cart(&token, &[("b1", 1)]);
    let client = Client::new(&backend, "/cart");
    client.storefront.session().login(AuthToken::new(token.clone())).unwrap();
    client.storefront.cart().sync_session().await;
    backend.clear_requests();

    client.storefront.sign_out().await.unwrap();

    assert!(client.storefront.cart().items().is_empty());
    assert!(backend.requests().is_empty());
    assert_eq!(backend.cart(&token).len(), 1);
    assert_eq!(client.navigator.redirects(), vec!["/login".to_string()]);
}
