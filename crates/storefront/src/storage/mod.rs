//! Persistent key-value storage.
//!
//! The storefront keeps three pieces of durable state: the session token, a
//! legacy cart snapshot, and the wishlist. Each lives under its own key as a
//! JSON-encoded string, the way a browser keeps them in local storage.
//!
//! All stores implement [`KeyValueStore`], which is deliberately synchronous:
//! callers persist inline after every mutation and never await storage.
//!
//! # Backends
//!
//! - [`MemoryStore`] - process-local, for tests and ephemeral hosts
//! - [`FileStore`] - one JSON document on disk, written through on every change

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Storage keys used by the storefront.
pub mod keys {
    /// Key for the bearer token.
    pub const TOKEN: &str = "token";

    /// Key for the provisional cart snapshot (`{ productId: quantity }`).
    pub const CART: &str = "cartItems";

    /// Key for the wishlist (JSON array of product ids).
    pub const WISHLIST: &str = "wishlist";
}

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing document or a value could not be encoded/decoded.
    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// A string key-value store with durable semantics.
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Load and decode a JSON value.
///
/// A value that fails to decode is treated as absent and logged, so one
/// corrupted entry never blocks startup.
///
/// # Errors
///
/// Returns an error only if the backend itself cannot be read.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding undecodable stored value");
            Ok(None)
        }
    }
}

/// Encode a value as JSON and store it.
///
/// # Errors
///
/// Returns an error if encoding fails or the backend cannot be written.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_json_helpers_round_trip_through_store() {
        let store = MemoryStore::new();
        let mut cart = BTreeMap::new();
        cart.insert("b1".to_string(), 2_u32);

        save_json(&store, keys::CART, &cart).unwrap();
        assert_eq!(store.get(keys::CART).unwrap().unwrap(), r#"{"b1":2}"#);

        let loaded: BTreeMap<String, u32> = load_json(&store, keys::CART).unwrap().unwrap();
        assert_eq!(loaded, cart);
    }

    #[test]
    fn test_undecodable_value_is_absent() {
        let store = MemoryStore::new();
        store.set(keys::WISHLIST, "{not json").unwrap();

        let loaded: Option<Vec<String>> = load_json(&store, keys::WISHLIST).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_missing_value_is_absent() {
        let store = MemoryStore::new();
        let loaded: Option<Vec<String>> = load_json(&store, keys::WISHLIST).unwrap();
        assert!(loaded.is_none());
    }
}
