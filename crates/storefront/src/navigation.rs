//! Navigation collaborator.
//!
//! Routing and rendering belong to the host UI. The storefront only needs to
//! ask where the shopper currently is and, on auth failures or guarded
//! navigation, send them somewhere else.

use std::sync::{Mutex, PoisonError};

/// Well-known paths the storefront navigates to or reasons about.
pub mod routes {
    pub const HOME: &str = "/";
    pub const LOGIN: &str = "/login";
    pub const REGISTER: &str = "/register";
    pub const CART: &str = "/cart";
    pub const CHECKOUT: &str = "/checkout";
    pub const ORDERS: &str = "/orders";
    pub const PROFILE: &str = "/profile";

    /// Paths reachable without a session. An authorization failure seen
    /// while on one of these never triggers a redirect.
    pub const UNAUTHENTICATED: &[&str] = &[LOGIN, REGISTER];
}

/// Host-provided navigation surface.
pub trait Navigator: Send + Sync {
    /// Path the shopper is currently viewing.
    fn current_path(&self) -> String;

    /// Force navigation to `path`, replacing the current entry.
    fn redirect(&self, path: &str);
}

/// Navigator for headless hosts and tests.
///
/// Tracks the current path and records every forced redirect.
#[derive(Debug)]
pub struct MemoryNavigator {
    state: Mutex<NavigatorState>,
}

#[derive(Debug)]
struct NavigatorState {
    current: String,
    redirects: Vec<String>,
}

impl MemoryNavigator {
    /// Start at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(NavigatorState {
                current: path.into(),
                redirects: Vec::new(),
            }),
        }
    }

    /// Shopper-initiated navigation (not recorded as a redirect).
    pub fn visit(&self, path: impl Into<String>) {
        self.lock().current = path.into();
    }

    /// Every redirect forced so far, oldest first.
    #[must_use]
    pub fn redirects(&self) -> Vec<String> {
        self.lock().redirects.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NavigatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new(routes::HOME)
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.lock().current.clone()
    }

    fn redirect(&self, path: &str) {
        let mut state = self.lock();
        state.current = path.to_owned();
        state.redirects.push(path.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_is_not_a_redirect() {
        let nav = MemoryNavigator::default();
        nav.visit("/cart");
        assert_eq!(nav.current_path(), "/cart");
        assert!(nav.redirects().is_empty());
    }

    #[test]
    fn test_redirect_moves_and_records() {
        let nav = MemoryNavigator::new("/orders");
        nav.redirect(routes::LOGIN);
        assert_eq!(nav.current_path(), routes::LOGIN);
        assert_eq!(nav.redirects(), vec![routes::LOGIN.to_string()]);
    }
}
