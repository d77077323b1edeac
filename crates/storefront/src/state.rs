//! Storefront state shared by every surface of the host UI.

use std::sync::Arc;

use crafted_chapter_core::{AuthToken, Email};
use secrecy::SecretString;
use tracing::instrument;

use crate::api::Profile;
use crate::cart::CartEngine;
use crate::catalog::{CatalogProvider, LoadHandle};
use crate::checkout::Checkout;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::guard::RouteGuard;
use crate::http::{ApiClient, ApiError};
use crate::navigation::{Navigator, routes};
use crate::notify::Notifier;
use crate::session::SessionManager;
use crate::storage::KeyValueStore;
use crate::task::TaskHandle;
use crate::wishlist::WishlistStore;

/// One instance of every storefront component, wired together.
///
/// This struct is cheaply cloneable via `Arc`; all clones share the same
/// session, cart, catalog and wishlist.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: ClientConfig,
    api: ApiClient,
    session: SessionManager,
    catalog: CatalogProvider,
    cart: CartEngine,
    wishlist: WishlistStore,
    guard: RouteGuard,
    checkout: Checkout,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
}

/// Background tasks started by [`Storefront::start`]. Dropping it stops them.
#[derive(Debug)]
pub struct Running {
    pub catalog: LoadHandle,
    pub session_watch: TaskHandle<()>,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Wire up the storefront.
    ///
    /// The session is restored from `store`; nothing touches the network
    /// until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> std::result::Result<Self, ApiError> {
        let session = SessionManager::load(Arc::clone(&store));
        let api = ApiClient::new(&config, session.clone(), Arc::clone(&navigator))?;
        let catalog = CatalogProvider::new(api.clone());
        let cart = CartEngine::new(
            api.clone(),
            session.clone(),
            Arc::clone(&store),
            Arc::clone(&notifier),
        );
        let wishlist = WishlistStore::load(store);
        let guard = RouteGuard::new(session.clone(), Arc::clone(&navigator));
        let checkout = Checkout::new(
            api.clone(),
            session.clone(),
            cart.clone(),
            catalog.clone(),
            Arc::clone(&navigator),
            Arc::clone(&notifier),
        );

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                session,
                catalog,
                cart,
                wishlist,
                guard,
                checkout,
                navigator,
                notifier,
            }),
        })
    }

    /// Load the catalog in the background, sync the cart with the restored
    /// session and keep following session transitions.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Running {
        let catalog = self.inner.catalog.spawn_load();
        self.inner.cart.sync_session().await;
        let session_watch = self.inner.cart.watch_session();
        Running {
            catalog,
            session_watch,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogProvider {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &CartEngine {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistStore {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn guard(&self) -> &RouteGuard {
        &self.inner.guard
    }

    #[must_use]
    pub fn checkout(&self) -> &Checkout {
        &self.inner.checkout
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// Log in and go to the home surface.
    ///
    /// # Errors
    ///
    /// Returns the validation, API or storage error after reporting it
    /// (server message, or "Login failed").
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<()> {
        let result = async {
            let email = Email::parse(email)?;
            let token = self.inner.api.login(&email, password).await?;
            self.establish(token, &email).await
        }
        .await;
        self.report(result, "Login failed")
    }

    /// Create an account, log in and go to the home surface.
    ///
    /// # Errors
    ///
    /// Returns the validation, API or storage error after reporting it
    /// (server message, or "Registration failed").
    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, name: &str, email: &str, password: &SecretString) -> Result<()> {
        let result = async {
            let name = name.trim();
            if name.is_empty() {
                return Err(ClientError::InvalidInput("Name is required".to_string()));
            }
            let email = Email::parse(email)?;
            let token = self.inner.api.register(name, &email, password).await?;
            self.establish(token, &email).await
        }
        .await;
        self.report(result, "Registration failed")
    }

    /// End the session and go to the login surface. The cart is cleared
    /// locally without contacting the server; the wishlist is kept.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the stored token could not be removed;
    /// the in-memory session is cleared regardless.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        let removed = self.inner.session.logout();
        self.inner.cart.sync_session().await;
        clear_sentry_user();
        add_breadcrumb("auth", "Signed out", &[]);
        self.inner.navigator.redirect(routes::LOGIN);

        removed.map_err(|e| {
            let err = ClientError::from(e);
            err.capture();
            err
        })
    }

    /// Fetch the signed-in shopper's profile.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a session; otherwise the API error after
    /// reporting "Failed to load profile information".
    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<Profile> {
        if !self.inner.session.is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }

        match self.inner.api.profile().await {
            Ok(profile) => {
                set_sentry_user(&profile.email);
                Ok(profile)
            }
            Err(e) => {
                let err = ClientError::from(e);
                self.inner.notifier.error("Failed to load profile information");
                err.capture();
                Err(err)
            }
        }
    }

    async fn establish(&self, token: AuthToken, email: &Email) -> Result<()> {
        self.inner.session.login(token)?;
        set_sentry_user(email.as_str());
        add_breadcrumb("auth", "Signed in", &[]);
        self.inner.cart.sync_session().await;
        self.inner.navigator.redirect(routes::HOME);
        Ok(())
    }

    fn report(&self, result: Result<()>, fallback: &str) -> Result<()> {
        result.map_err(|err| {
            self.inner.notifier.error(&err.user_message(fallback));
            err.capture();
            err
        })
    }
}
