//! Command implementations. Results are printed to stdout; diagnostics go
//! through `tracing` to stderr.

#![allow(clippy::print_stdout)]

pub mod account;
pub mod orders;
pub mod shop;

use std::sync::Arc;

use crafted_chapter_storefront::navigation::{MemoryNavigator, Navigator};
use crafted_chapter_storefront::notify::{Notifier, TracingNotifier};
use crafted_chapter_storefront::storage::{FileStore, KeyValueStore, StorageError};
use crafted_chapter_storefront::{ApiError, ClientConfig, ClientError, Running, Storefront};
use thiserror::Error;

/// Errors that can end a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// The storefront reported a failure (already shown as a notice).
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The local store could not be opened.
    #[error("Cannot open local storage: {0}")]
    Storage(#[from] StorageError),

    /// The HTTP client could not be built.
    #[error("Cannot create API client: {0}")]
    Api(#[from] ApiError),

    /// Bad command-line input.
    #[error("{0}")]
    Usage(String),
}

/// A storefront hosted for one command, started at `path`.
///
/// `path` plays the role of the page the command stands in for, so a 401
/// during `login` does not bounce to the login surface.
pub(crate) async fn open(config: ClientConfig, path: &str) -> Result<(Storefront, Running), CliError> {
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(config.storage_path.clone())?);
    let navigator: Arc<dyn Navigator> = Arc::new(MemoryNavigator::new(path));
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);

    let storefront = Storefront::new(config, store, navigator, notifier)?;
    let running = storefront.start().await;
    Ok((storefront, running))
}
