//! Crafted Chapter storefront client.
//!
//! The client-side core of the bookstore: session, HTTP interceptors,
//! catalog, server-synchronized cart, wishlist, route guard and checkout.
//! Rendering and routing belong to the host, which plugs in through the
//! [`Navigator`](navigation::Navigator) and [`Notifier`](notify::Notifier)
//! traits and a [`KeyValueStore`](storage::KeyValueStore).
//!
//! Start with [`Storefront`], which wires one instance of every component.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod navigation;
pub mod notify;
pub mod session;
pub mod state;
pub mod storage;
pub mod task;
pub mod wishlist;

pub use cart::{CartEngine, CartItems, CartLineDetail, CartState};
pub use catalog::CatalogProvider;
pub use checkout::{Checkout, ShippingAddress};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use guard::{Access, RouteGuard};
pub use http::{ApiClient, ApiError};
pub use session::SessionManager;
pub use state::{Running, Storefront};
pub use wishlist::WishlistStore;
