//! Unified error handling with Sentry integration.
//!
//! Every user-triggered operation returns `Result<T, ClientError>`. Errors
//! are caught at the operation that triggered them: the operation reports a
//! shopper-facing message through the [`Notifier`](crate::notify::Notifier)
//! and hands the typed error back to the caller. Nothing escapes as an
//! unhandled failure.

use crafted_chapter_core::EmailError;
use thiserror::Error;

use crate::http::ApiError;
use crate::storage::StorageError;

/// Client-level error type for the storefront.
#[derive(Debug, Error)]
pub enum ClientError {
    /// API request failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Persistent storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The operation needs a session and there is none.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Checkout was attempted with nothing resolvable in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Email failed validation before any request was made.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Other input failed validation before any request was made.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ClientError {
    /// Message suitable for a transient user-visible notification.
    ///
    /// Prefers the server's own `message` for rejected requests; internal
    /// details (transport, decoding, storage) are replaced by `fallback`.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Api(err) => err
                .server_message()
                .map_or_else(|| fallback.to_string(), str::to_string),
            Self::NotAuthenticated => "Please login to continue".to_string(),
            Self::EmptyCart => "Your cart is empty".to_string(),
            Self::InvalidEmail(_) => "Invalid email address".to_string(),
            Self::InvalidInput(msg) => msg.clone(),
            Self::Storage(_) => fallback.to_string(),
        }
    }

    /// Whether the failure originated outside the shopper's control
    /// (network, 5xx, undecodable response, local storage).
    #[must_use]
    pub fn is_internal(&self) -> bool {
        match self {
            Self::Api(err) => err.is_server_side(),
            Self::Storage(_) => true,
            _ => false,
        }
    }

    /// Capture internal failures to Sentry and log them.
    ///
    /// Validation and business errors are expected and only logged at debug.
    pub fn capture(&self) {
        if self.is_internal() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront operation failed"
            );
        } else {
            tracing::debug!(error = %self, "Storefront operation rejected");
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context for the signed-in shopper.
///
/// Call this once the profile is known to associate errors with the account.
pub fn set_sentry_user(email: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            email: Some(email.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the shopper.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;

    #[test]
    fn test_user_message_prefers_server_message() {
        let err = ClientError::Api(ApiError::Status {
            status: StatusCode::BAD_REQUEST,
            message: Some("Out of stock".to_string()),
        });
        assert_eq!(err.user_message("Failed to add item to cart"), "Out of stock");
    }

    #[test]
    fn test_user_message_falls_back_without_server_message() {
        let err = ClientError::Api(ApiError::Status {
            status: StatusCode::BAD_GATEWAY,
            message: None,
        });
        assert_eq!(
            err.user_message("Failed to add item to cart"),
            "Failed to add item to cart"
        );
    }

    #[test]
    fn test_user_message_for_local_conditions() {
        assert_eq!(
            ClientError::NotAuthenticated.user_message("x"),
            "Please login to continue"
        );
        assert_eq!(ClientError::EmptyCart.user_message("x"), "Your cart is empty");
        assert_eq!(
            ClientError::InvalidInput("Street is required".to_string()).user_message("x"),
            "Street is required"
        );
    }

    #[test]
    fn test_internal_classification() {
        let server = ClientError::Api(ApiError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: None,
        });
        let business = ClientError::Api(ApiError::Status {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: None,
        });
        assert!(server.is_internal());
        assert!(!business.is_internal());
        assert!(!ClientError::NotAuthenticated.is_internal());
    }
}
