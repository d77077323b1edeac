//! Session manager.
//!
//! Owns the bearer token for the whole process. The token is loaded from
//! storage once at startup and changes only through [`SessionManager::login`]
//! and [`SessionManager::logout`]. Dependents either read it on demand via
//! [`SessionManager::current_token`] or observe transitions through
//! [`SessionManager::subscribe`]; none of them keeps its own copy.
//!
//! After every completed mutation the in-memory token equals the persisted
//! token: `login` persists before publishing, and `logout` clears memory and
//! storage together.

use std::sync::Arc;

use crafted_chapter_core::AuthToken;
use tokio::sync::watch;

use crate::storage::{KeyValueStore, StorageError, keys, load_json, save_json};

/// Shared handle to the process-wide session.
///
/// Cheap to clone; all clones observe the same token.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: Arc<dyn KeyValueStore>,
    token: watch::Sender<Option<AuthToken>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Initialize the session from persistent storage.
    ///
    /// A token that cannot be read is treated as absent so startup never
    /// fails on storage problems.
    #[must_use]
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let token = match load_json::<String>(store.as_ref(), keys::TOKEN) {
            Ok(token) => token.filter(|t| !t.is_empty()).map(AuthToken::new),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored session token");
                None
            }
        };

        tracing::debug!(authenticated = token.is_some(), "Session loaded");

        let (sender, _) = watch::channel(token);
        Self {
            inner: Arc::new(SessionInner {
                store,
                token: sender,
            }),
        }
    }

    /// The current token, if any. Never blocks, never fails.
    #[must_use]
    pub fn current_token(&self) -> Option<AuthToken> {
        self.inner.token.borrow().clone()
    }

    /// Whether a token is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.token.borrow().is_some()
    }

    /// Store `token` and notify observers.
    ///
    /// Logging in again with the same token does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be persisted; the in-memory
    /// session is left unchanged in that case.
    pub fn login(&self, token: AuthToken) -> Result<(), StorageError> {
        if self.inner.token.borrow().as_ref() == Some(&token) {
            return Ok(());
        }

        save_json(self.inner.store.as_ref(), keys::TOKEN, token.expose())?;
        self.inner.token.send_replace(Some(token));
        tracing::info!("Session established");
        Ok(())
    }

    /// Clear the token from memory and storage and notify observers.
    ///
    /// Memory is always cleared, even if storage removal fails.
    ///
    /// # Errors
    ///
    /// Returns the storage error after clearing memory if the persisted token
    /// could not be removed.
    pub fn logout(&self) -> Result<(), StorageError> {
        let removed = self.inner.store.remove(keys::TOKEN);
        let changed = self.inner.token.send_if_modified(|token| token.take().is_some());
        if changed {
            tracing::info!("Session cleared");
        }
        removed
    }

    /// Observe token transitions.
    ///
    /// The receiver starts with the current value marked as seen.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthToken>> {
        self.inner.token.subscribe()
    }
}
