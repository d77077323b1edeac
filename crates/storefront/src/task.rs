//! Background task handles tied to a consumer's lifetime.

use std::future::Future;

use tokio::task::JoinHandle;

/// Handle to a spawned task that is aborted when the handle is dropped.
///
/// Fetches that feed a view (catalog, order history) are spawned behind one
/// of these so that tearing the view down cancels the request and nothing is
/// written for a view that no longer exists.
#[derive(Debug)]
#[must_use = "dropping the handle aborts the task"]
pub struct TaskHandle<T> {
    handle: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> TaskHandle<T> {
    /// Spawn `future` on the current runtime.
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(future)),
        }
    }
}

impl<T> TaskHandle<T> {
    /// Abort the task now.
    pub fn abort(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    /// Wait for the task's output. `None` if it was aborted or panicked.
    pub async fn join(mut self) -> Option<T> {
        let handle = self.handle.take()?;
        handle.await.ok()
    }
}

impl<T> Drop for TaskHandle<T> {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
