//! Cart synchronization engine.
//!
//! The local cart is a mirror of the server cart. It is never patched
//! locally: every successful mutation replaces the whole mapping with the one
//! in the server's response, so local arithmetic can never drift from
//! server-side rules (stock limits, line merging, price changes).
//!
//! # States
//!
//! | state | token | mapping |
//! |---|---|---|
//! | [`CartState::Unauthenticated`] | absent | forced empty |
//! | [`CartState::Syncing`] | present | fetch in flight (or failed) |
//! | [`CartState::Synced`] | present | last server response |
//!
//! Session transitions are picked up by [`CartEngine::sync_session`] (called
//! at the start of every operation) and by the task returned from
//! [`CartEngine::watch_session`]. Each transition bumps a generation counter;
//! a response that arrives after a later transition is discarded, so a cart
//! fetched for one account is never shown under another.

mod items;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crafted_chapter_core::{AuthToken, Price, ProductId};
use serde::Serialize;
use tracing::instrument;

pub use items::CartItems;

use crate::api::Product;
use crate::catalog::CatalogProvider;
use crate::error::{ClientError, Result, add_breadcrumb};
use crate::http::{ApiClient, ApiError};
use crate::notify::Notifier;
use crate::session::SessionManager;
use crate::storage::{KeyValueStore, keys, load_json, save_json};
use crate::task::TaskHandle;

const ADD_FAILED: &str = "Failed to add item to cart";
const REMOVE_FAILED: &str = "Failed to remove item from cart";
const CLEAR_FAILED: &str = "Failed to clear cart";

/// Synchronization state of the local cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CartState {
    Unauthenticated,
    Syncing,
    Synced,
}

/// A cart line resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineDetail {
    pub product: Product,
    pub quantity: u32,
    pub subtotal: Price,
}

/// Shared handle to the cart engine. Cheap to clone.
#[derive(Clone)]
pub struct CartEngine {
    inner: Arc<CartInner>,
}

struct CartInner {
    api: ApiClient,
    session: SessionManager,
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    snapshot: RwLock<Snapshot>,
    pending: Mutex<HashMap<ProductId, usize>>,
}

#[derive(Debug)]
struct Snapshot {
    state: CartState,
    /// Authoritative mapping (empty until the first server response).
    items: CartItems,
    /// Stored snapshot from an earlier run, shown only while syncing.
    provisional: Option<CartItems>,
    /// Token the current state was derived from.
    observed: Option<AuthToken>,
    generation: u64,
}

impl std::fmt::Debug for CartEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.read();
        f.debug_struct("CartEngine")
            .field("state", &snapshot.state)
            .field("lines", &snapshot.items.len())
            .finish_non_exhaustive()
    }
}

impl CartEngine {
    /// Create the engine.
    ///
    /// The engine starts `Unauthenticated`; the first [`sync_session`]
    /// picks up a token restored by the session manager. A cart snapshot
    /// left in storage by an earlier run is kept as provisional display data.
    ///
    /// [`sync_session`]: Self::sync_session
    #[must_use]
    pub fn new(
        api: ApiClient,
        session: SessionManager,
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let provisional = match load_json::<CartItems>(store.as_ref(), keys::CART) {
            Ok(items) => items.filter(|items| !items.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored cart snapshot");
                None
            }
        };

        Self {
            inner: Arc::new(CartInner {
                api,
                session,
                store,
                notifier,
                snapshot: RwLock::new(Snapshot {
                    state: CartState::Unauthenticated,
                    items: CartItems::new(),
                    provisional,
                    observed: None,
                    generation: 0,
                }),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    // =========================================================================
    // Read side
    // =========================================================================

    #[must_use]
    pub fn state(&self) -> CartState {
        self.settle();
        self.read().state
    }

    /// The authoritative mapping: empty while unauthenticated or before the
    /// first server response.
    #[must_use]
    pub fn items(&self) -> CartItems {
        self.settle();
        let snapshot = self.read();
        match snapshot.state {
            CartState::Unauthenticated => CartItems::new(),
            CartState::Syncing | CartState::Synced => snapshot.items.clone(),
        }
    }

    /// What the cart view should show: the authoritative mapping, or the
    /// provisional snapshot while a first fetch is outstanding.
    #[must_use]
    pub fn display_items(&self) -> CartItems {
        self.settle();
        let snapshot = self.read();
        match snapshot.state {
            CartState::Unauthenticated => CartItems::new(),
            CartState::Syncing => snapshot
                .provisional
                .clone()
                .unwrap_or_else(|| snapshot.items.clone()),
            CartState::Synced => snapshot.items.clone(),
        }
    }

    /// Number of distinct lines (the cart badge).
    #[must_use]
    pub fn count(&self) -> usize {
        self.display_items().len()
    }

    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.display_items().total_quantity()
    }

    /// Whether an add or remove for `product_id` is in flight.
    #[must_use]
    pub fn is_pending(&self, product_id: &ProductId) -> bool {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(product_id)
            .is_some_and(|&n| n > 0)
    }

    /// Displayed lines resolved against the catalog.
    ///
    /// Lines whose product is not in the catalog (not loaded yet, or removed)
    /// are left out rather than treated as errors.
    #[must_use]
    pub fn details(&self, catalog: &CatalogProvider) -> Vec<CartLineDetail> {
        let products = catalog.products();
        self.display_items()
            .iter()
            .filter_map(|(id, quantity)| {
                let product = products.iter().find(|p| &p.id == id)?;
                Some(CartLineDetail {
                    product: product.clone(),
                    quantity,
                    subtotal: product.price.times(quantity),
                })
            })
            .collect()
    }

    /// Sum of resolved line subtotals.
    #[must_use]
    pub fn total_amount(&self, catalog: &CatalogProvider) -> Price {
        self.details(catalog).iter().map(|line| line.subtotal).sum()
    }

    // =========================================================================
    // Session transitions
    // =========================================================================

    /// Bring the cart in line with the current session token.
    ///
    /// - token absent: clear immediately, no request
    /// - token changed: fetch the server cart once
    /// - token unchanged: nothing
    #[instrument(skip(self))]
    pub async fn sync_session(&self) {
        if let Some(generation) = self.observe(self.inner.session.current_token()) {
            self.fetch(generation).await;
        }
    }

    /// Follow session transitions in the background.
    ///
    /// Logout clears the cart as soon as it is published. Fetches for a new
    /// token run on their own task so a later transition is never queued
    /// behind a slow response.
    pub fn watch_session(&self) -> TaskHandle<()> {
        let engine = self.clone();
        let mut rx = self.inner.session.subscribe();
        TaskHandle::spawn(async move {
            loop {
                let token = rx.borrow_and_update().clone();
                if let Some(generation) = engine.observe(token) {
                    let fetcher = engine.clone();
                    tokio::spawn(async move { fetcher.fetch(generation).await });
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Apply a logout that has not been observed yet, so readers never see
    /// a cart after the session has ended. Needs no request.
    fn settle(&self) {
        if !self.inner.session.is_authenticated() && self.read().observed.is_some() {
            self.observe(None);
        }
    }

    /// Apply the transition table for `token`. Returns the generation to
    /// fetch with when a server fetch is needed.
    fn observe(&self, token: Option<AuthToken>) -> Option<u64> {
        let mut snapshot = self.write();
        if snapshot.observed == token {
            return None;
        }

        snapshot.generation += 1;
        match token {
            None => {
                snapshot.state = CartState::Unauthenticated;
                snapshot.items = CartItems::new();
                snapshot.provisional = None;
                snapshot.observed = None;
                drop(snapshot);

                if let Err(e) = self.inner.store.remove(keys::CART) {
                    tracing::warn!(error = %e, "Failed to remove stored cart snapshot");
                }
                tracing::debug!("Session ended, cart cleared");
                None
            }
            Some(token) => {
                if snapshot.observed.is_some() {
                    // A different account: the old snapshot is not theirs.
                    snapshot.provisional = None;
                }
                snapshot.state = CartState::Syncing;
                snapshot.items = CartItems::new();
                snapshot.observed = Some(token);
                tracing::debug!(generation = snapshot.generation, "Session changed, syncing cart");
                Some(snapshot.generation)
            }
        }
    }

    async fn fetch(&self, generation: u64) {
        match self.inner.api.fetch_cart().await {
            Ok(items) => {
                if self.apply(generation, items) {
                    tracing::debug!("Cart synced");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch cart");
                if e.is_server_side() {
                    ClientError::from(e).capture();
                }
            }
        }
    }

    /// Adopt a server mapping unless the session moved on since `generation`.
    fn apply(&self, generation: u64, items: CartItems) -> bool {
        let token = self.inner.session.current_token();
        let mut snapshot = self.write();
        if snapshot.generation != generation || snapshot.observed != token {
            tracing::debug!(
                generation,
                current = snapshot.generation,
                "Discarding cart response from an earlier session"
            );
            return false;
        }

        snapshot.state = CartState::Synced;
        snapshot.provisional = None;
        snapshot.items = items;
        let persisted = save_json(self.inner.store.as_ref(), keys::CART, &snapshot.items);
        drop(snapshot);

        if let Err(e) = persisted {
            tracing::warn!(error = %e, "Failed to store cart snapshot");
        }
        true
    }

    /// Empty the cart regardless of server state, unless the session moved
    /// on since `generation`.
    fn force_empty(&self, generation: u64) -> bool {
        let token = self.inner.session.current_token();
        let mut snapshot = self.write();
        if snapshot.generation != generation || snapshot.observed != token {
            tracing::debug!(
                generation,
                current = snapshot.generation,
                "Not clearing cart of a later session"
            );
            return false;
        }
        snapshot.items = CartItems::new();
        snapshot.provisional = None;
        if snapshot.state == CartState::Syncing {
            snapshot.state = CartState::Synced;
        }
        let persisted = save_json(self.inner.store.as_ref(), keys::CART, &snapshot.items);
        drop(snapshot);

        if let Err(e) = persisted {
            tracing::warn!(error = %e, "Failed to store cart snapshot");
        }
        true
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Ask the server for one more unit of `product_id`.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a session (no request is sent); otherwise
    /// the API error. Errors are also reported through the notifier and leave
    /// the cart unchanged.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_to_cart(&self, product_id: &ProductId) -> Result<()> {
        let api = self.inner.api.clone();
        let id = product_id.clone();
        self.mutate(product_id, ADD_FAILED, "Added to cart", async move {
            api.add_cart_item(&id, Some(1)).await
        })
        .await
    }

    /// Ask the server to remove one unit of `product_id` (the whole line at
    /// quantity 1).
    ///
    /// # Errors
    ///
    /// Same as [`add_to_cart`](Self::add_to_cart).
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_cart(&self, product_id: &ProductId) -> Result<()> {
        let api = self.inner.api.clone();
        let id = product_id.clone();
        self.mutate(product_id, REMOVE_FAILED, "Removed from cart", async move {
            api.remove_cart_item(&id).await
        })
        .await
    }

    /// Clear the server cart, then empty the local cart whatever the outcome.
    ///
    /// In silent mode a failure is only logged and `Ok` is returned; this is
    /// the mode used after an order has been placed.
    ///
    /// # Errors
    ///
    /// Non-silent mode returns the API error (after reporting it).
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, silent: bool) -> Result<()> {
        self.sync_session().await;

        let (state, generation) = {
            let snapshot = self.read();
            (snapshot.state, snapshot.generation)
        };
        let outcome = if state == CartState::Unauthenticated {
            Ok(())
        } else {
            self.inner.api.clear_server_cart().await
        };
        self.force_empty(generation);

        match outcome {
            Ok(()) => {
                add_breadcrumb("cart", "Cleared cart", &[]);
                Ok(())
            }
            Err(e) if silent => {
                tracing::warn!(error = %e, "Failed to clear server cart");
                Ok(())
            }
            Err(e) => {
                let err = ClientError::from(e);
                self.inner.notifier.error(&err.user_message(CLEAR_FAILED));
                err.capture();
                Err(err)
            }
        }
    }

    async fn mutate<F>(
        &self,
        product_id: &ProductId,
        fallback: &str,
        action: &str,
        request: F,
    ) -> Result<()>
    where
        F: Future<Output = std::result::Result<CartItems, ApiError>>,
    {
        self.sync_session().await;

        let generation = {
            let snapshot = self.read();
            if snapshot.state == CartState::Unauthenticated {
                drop(snapshot);
                let err = ClientError::NotAuthenticated;
                self.inner.notifier.error(&err.user_message(fallback));
                return Err(err);
            }
            snapshot.generation
        };

        let result = {
            let _pending = PendingGuard::new(&self.inner.pending, product_id);
            request.await
        };

        match result {
            Ok(items) => {
                if self.apply(generation, items) {
                    add_breadcrumb("cart", action, &[("product_id", product_id.as_str())]);
                }
                Ok(())
            }
            Err(e) => {
                let unauthorized = matches!(e, ApiError::Unauthorized { .. });
                let err = ClientError::from(e);
                self.inner.notifier.error(&err.user_message(fallback));
                err.capture();
                if unauthorized {
                    // The interceptor may have ended the session.
                    self.sync_session().await;
                }
                Err(err)
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks a product as in flight until dropped.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<ProductId, usize>>,
    product_id: ProductId,
}

impl<'a> PendingGuard<'a> {
    fn new(pending: &'a Mutex<HashMap<ProductId, usize>>, product_id: &ProductId) -> Self {
        *pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(product_id.clone())
            .or_default() += 1;
        Self {
            pending,
            product_id: product_id.clone(),
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = pending.get_mut(&self.product_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                pending.remove(&self.product_id);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::config::ClientConfig;
    use crate::navigation::MemoryNavigator;
    use crate::notify::RecordingNotifier;
    use crate::storage::MemoryStore;

    use super::*;

    struct Harness {
        engine: CartEngine,
        session: SessionManager,
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<RecordingNotifier>,
    }

    /// Engine pointed at an unroutable address; only offline paths are
    /// exercised here.
    fn harness(entries: &[(&str, &str)]) -> Harness {
        let store: Arc<dyn KeyValueStore> =
            Arc::new(MemoryStore::with_entries(entries.iter().copied()));
        let session = SessionManager::load(Arc::clone(&store));
        let config = ClientConfig::for_api_url("http://127.0.0.1:9/api").unwrap();
        let api = ApiClient::new(
            &config,
            session.clone(),
            Arc::new(MemoryNavigator::default()),
        )
        .unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = CartEngine::new(
            api,
            session.clone(),
            Arc::clone(&store),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        );
        Harness {
            engine,
            session,
            store,
            notifier,
        }
    }

    fn cart(lines: &[(&str, i64)]) -> CartItems {
        CartItems::from_lines(lines.iter().map(|&(id, q)| (ProductId::new(id), q)))
    }

    /// Log in and observe the new token, returning the fetch generation.
    fn sign_in(h: &Harness, token: &str) -> Option<u64> {
        h.session.login(AuthToken::new(token)).unwrap();
        h.engine.observe(h.session.current_token())
    }

    #[tokio::test]
    async fn test_add_without_session_reports_login_required() {
        let h = harness(&[]);
        let err = h.engine.add_to_cart(&ProductId::new("X")).await.unwrap_err();

        assert!(matches!(err, ClientError::NotAuthenticated));
        assert_eq!(h.notifier.errors(), vec!["Please login to continue".to_string()]);
        assert!(h.engine.items().is_empty());
        assert!(!h.engine.is_pending(&ProductId::new("X")));
    }

    #[test]
    fn test_observe_same_token_is_noop() {
        let h = harness(&[]);
        assert_eq!(sign_in(&h, "jwt-1"), Some(1));
        assert_eq!(h.engine.observe(h.session.current_token()), None);
        assert_eq!(h.engine.state(), CartState::Syncing);
    }

    #[test]
    fn test_logout_is_visible_immediately() {
        let h = harness(&[]);
        let generation = sign_in(&h, "jwt-1").unwrap();
        assert!(h.engine.apply(generation, cart(&[("A", 2), ("B", 1)])));
        assert_eq!(h.engine.count(), 2);
        assert_eq!(h.engine.total_quantity(), 3);

        h.session.logout().unwrap();
        assert_eq!(h.engine.state(), CartState::Unauthenticated);
        assert!(h.engine.display_items().is_empty());
        assert!(h.store.get(keys::CART).unwrap().is_none());
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let h = harness(&[]);
        let first = sign_in(&h, "jwt-1").unwrap();
        let second = sign_in(&h, "jwt-2").unwrap();

        assert!(!h.engine.apply(first, cart(&[("A", 1)])));
        assert!(h.engine.items().is_empty());
        assert!(h.engine.apply(second, cart(&[("B", 3)])));
        assert_eq!(h.engine.items(), cart(&[("B", 3)]));
    }

    #[test]
    fn test_provisional_snapshot_shown_only_while_syncing() {
        let h = harness(&[(keys::CART, r#"{"A":2}"#)]);
        assert!(h.engine.display_items().is_empty());

        let generation = sign_in(&h, "jwt-1").unwrap();
        assert_eq!(h.engine.display_items(), cart(&[("A", 2)]));
        assert!(h.engine.items().is_empty());

        h.engine.apply(generation, cart(&[("C", 1)]));
        assert_eq!(h.engine.display_items(), cart(&[("C", 1)]));
        assert_eq!(h.store.get(keys::CART).unwrap().as_deref(), Some(r#"{"C":1}"#));
    }

    #[test]
    fn test_account_switch_drops_provisional_snapshot() {
        let h = harness(&[(keys::CART, r#"{"A":2}"#)]);
        sign_in(&h, "jwt-1");
        sign_in(&h, "jwt-2");
        assert!(h.engine.display_items().is_empty());
    }

    #[tokio::test]
    async fn test_clear_without_session_empties_locally() {
        let h = harness(&[]);
        h.engine.clear_cart(false).await.unwrap();
        assert!(h.engine.items().is_empty());
        assert!(h.notifier.errors().is_empty());
    }

    #[test]
    fn test_force_empty_ignores_later_session() {
        let h = harness(&[]);
        let first = sign_in(&h, "jwt-1").unwrap();
        let second = sign_in(&h, "jwt-2").unwrap();
        assert!(h.engine.apply(second, cart(&[("B", 3)])));

        assert!(!h.engine.force_empty(first));
        assert_eq!(h.engine.items(), cart(&[("B", 3)]));

        assert!(h.engine.force_empty(second));
        assert!(h.engine.items().is_empty());
    }

    #[tokio::test]
    async fn test_watch_follows_login() {
        let h = harness(&[]);
        let _watch = h.engine.watch_session();
        h.session.login(AuthToken::new("jwt-1")).unwrap();

        for _ in 0..50 {
            if h.engine.read().observed.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        // The fetch cannot reach anything, so the cart stays syncing and empty.
        assert_eq!(h.engine.state(), CartState::Syncing);
        assert!(h.engine.items().is_empty());
    }

    #[test]
    fn test_pending_guard_counts() {
        let pending = Mutex::new(HashMap::new());
        let id = ProductId::new("A");
        let first = PendingGuard::new(&pending, &id);
        let second = PendingGuard::new(&pending, &id);
        drop(first);
        assert_eq!(pending.lock().unwrap().get(&id), Some(&1));
        drop(second);
        assert!(pending.lock().unwrap().is_empty());
    }
}
