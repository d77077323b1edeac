//! Route guard for surfaces that need a session.

use std::sync::Arc;

use crate::navigation::{Navigator, routes};
use crate::session::SessionManager;

/// Outcome of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Render the requested surface unchanged.
    Granted,
    /// Do not render; go here instead.
    Redirect(&'static str),
}

/// Gate protected surfaces on the presence of a session token.
///
/// Stateless: the token is read on every check, nothing is cached.
#[derive(Clone)]
pub struct RouteGuard {
    session: SessionManager,
    navigator: Arc<dyn Navigator>,
    protected: Vec<String>,
}

impl std::fmt::Debug for RouteGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGuard")
            .field("protected", &self.protected)
            .finish_non_exhaustive()
    }
}

impl RouteGuard {
    /// Guard `/checkout`, `/orders` and `/profile`.
    #[must_use]
    pub fn new(session: SessionManager, navigator: Arc<dyn Navigator>) -> Self {
        Self::with_protected(
            session,
            navigator,
            [routes::CHECKOUT, routes::ORDERS, routes::PROFILE],
        )
    }

    /// Guard an explicit set of path prefixes.
    #[must_use]
    pub fn with_protected(
        session: SessionManager,
        navigator: Arc<dyn Navigator>,
        protected: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            session,
            navigator,
            protected: protected.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn check(&self) -> Access {
        if self.session.is_authenticated() {
            Access::Granted
        } else {
            Access::Redirect(routes::LOGIN)
        }
    }

    /// Whether `path` is (or is beneath) a guarded prefix.
    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Evaluate navigation into `path`, redirecting when access is denied.
    pub fn navigate(&self, path: &str) -> Access {
        if !self.is_protected(path) {
            return Access::Granted;
        }

        let access = self.check();
        if let Access::Redirect(target) = access {
            tracing::debug!(path, target, "Guarded route without session");
            self.navigator.redirect(target);
        }
        access
    }
}
