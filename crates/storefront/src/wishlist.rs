//! Wishlist store.
//!
//! A set of product ids kept in local storage. It belongs to the device
//! profile rather than the account, so it survives logout and never talks to
//! the server.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use crafted_chapter_core::ProductId;

use crate::api::Product;
use crate::catalog::CatalogProvider;
use crate::storage::{KeyValueStore, keys, load_json, save_json};

/// Shared handle to the wishlist. Cheap to clone.
#[derive(Clone)]
pub struct WishlistStore {
    inner: Arc<WishlistInner>,
}

struct WishlistInner {
    store: Arc<dyn KeyValueStore>,
    ids: RwLock<BTreeSet<ProductId>>,
}

impl std::fmt::Debug for WishlistStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WishlistStore")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl WishlistStore {
    /// Restore the wishlist from storage (empty if absent or unreadable).
    #[must_use]
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let ids = match load_json::<BTreeSet<ProductId>>(store.as_ref(), keys::WISHLIST) {
            Ok(ids) => ids.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored wishlist");
                BTreeSet::new()
            }
        };

        Self {
            inner: Arc::new(WishlistInner {
                store,
                ids: RwLock::new(ids),
            }),
        }
    }

    /// Add `id` if absent, remove it if present, then persist.
    ///
    /// Returns whether `id` is in the wishlist afterwards. A storage failure
    /// is logged; the in-memory change stands.
    pub fn toggle(&self, id: &ProductId) -> bool {
        let mut ids = self.inner.ids.write().unwrap_or_else(PoisonError::into_inner);
        let present = if ids.remove(id) {
            false
        } else {
            ids.insert(id.clone());
            true
        };

        if let Err(e) = save_json(self.inner.store.as_ref(), keys::WISHLIST, &*ids) {
            tracing::warn!(error = %e, product_id = %id, "Failed to store wishlist");
        }
        present
    }

    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.inner
            .ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.ids.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids in sorted order.
    #[must_use]
    pub fn items(&self) -> Vec<ProductId> {
        self.inner
            .ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Wishlisted products that resolve against the catalog.
    #[must_use]
    pub fn products(&self, catalog: &CatalogProvider) -> Vec<Product> {
        let ids = self.inner.ids.read().unwrap_or_else(PoisonError::into_inner);
        catalog
            .products()
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect()
    }
}
