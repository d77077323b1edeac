//! Crafted Chapter Core - Shared types library.
//!
//! This crate provides the value types shared by the storefront client SDK
//! and the tools built on it:
//! - `storefront` - Session, cart synchronization, catalog and wishlist state
//! - `cli` - Headless terminal driver for the SDK
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access, no HTTP
//! clients. Everything here can be constructed and validated offline.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for identifiers, prices, emails, tokens and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
