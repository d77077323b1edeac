//! Catalog provider.
//!
//! The product list is fetched once per provider lifetime. Until the fetch
//! succeeds the list is empty and every lookup simply misses; callers treat
//! "not found" as "not loaded yet", never as an error.

use std::sync::{Arc, PoisonError, RwLock};

use crafted_chapter_core::ProductId;
use tokio::sync::OnceCell;
use tracing::instrument;

use crate::api::Product;
use crate::error::ClientError;
use crate::http::ApiClient;
use crate::task::TaskHandle;

/// Handle to a background catalog load; dropping it cancels the fetch.
pub type LoadHandle = TaskHandle<()>;

/// Shared handle to the product catalog. Cheap to clone.
#[derive(Clone)]
pub struct CatalogProvider {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    api: ApiClient,
    attempted: OnceCell<()>,
    products: RwLock<Arc<[Product]>>,
}

impl std::fmt::Debug for CatalogProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogProvider")
            .field("loaded", &self.is_loaded())
            .field("products", &self.products().len())
            .finish_non_exhaustive()
    }
}

impl CatalogProvider {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            inner: Arc::new(CatalogInner {
                api,
                attempted: OnceCell::new(),
                products: RwLock::new(Arc::from(Vec::new())),
            }),
        }
    }

    /// Fetch the catalog unless a fetch already completed.
    ///
    /// Concurrent callers share one request. A failed fetch is logged and
    /// still counts as the one attempt; the list stays empty. A fetch that
    /// was cancelled before finishing does not count.
    #[instrument(skip(self))]
    pub async fn load(&self) {
        self.inner
            .attempted
            .get_or_init(|| async {
                match self.inner.api.list_products().await {
                    Ok(products) => {
                        tracing::info!(count = products.len(), "Catalog loaded");
                        *self
                            .inner
                            .products
                            .write()
                            .unwrap_or_else(PoisonError::into_inner) = Arc::from(products);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to load catalog");
                        if e.is_server_side() {
                            ClientError::from(e).capture();
                        }
                    }
                }
            })
            .await;
    }

    /// Run [`load`](Self::load) in the background for as long as the
    /// returned handle lives.
    pub fn spawn_load(&self) -> LoadHandle {
        let catalog = self.clone();
        TaskHandle::spawn(async move { catalog.load().await })
    }

    /// Whether the one fetch attempt has finished (successfully or not).
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.attempted.initialized()
    }

    /// The current product list (empty until loaded).
    #[must_use]
    pub fn products(&self) -> Arc<[Product]> {
        Arc::clone(
            &self
                .inner
                .products
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    #[must_use]
    pub fn find(&self, id: &ProductId) -> Option<Product> {
        self.products().iter().find(|p| &p.id == id).cloned()
    }

    /// Label for a product that may not resolve: its title, or
    /// `Product (<last 5 chars of id>)`.
    #[must_use]
    pub fn title_for(&self, id: &ProductId) -> String {
        self.find(id).map_or_else(
            || format!("Product ({})", id.short_suffix()),
            |p| p.title,
        )
    }
}
