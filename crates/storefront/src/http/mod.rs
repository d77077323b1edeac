//! HTTP client for the bookstore API.
//!
//! # Architecture
//!
//! - One configured `reqwest` client; every endpoint goes through [`ApiClient::send`]
//! - Outbound: the bearer token is read from the [`SessionManager`] for every
//!   request, never cached here
//! - Inbound: a 401 clears the session and redirects to the login surface,
//!   unless the shopper is already on an unauthenticated surface
//! - No automatic retries; every failure is returned to the caller
//!
//! Typed endpoint methods live in [`crate::api`].

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::navigation::{Navigator, routes};
use crate::session::SessionManager;

/// Errors that can occur when talking to the bookstore API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure (connect, timeout, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the session (401).
    #[error("Unauthorized: {}", .message.as_deref().unwrap_or("session rejected"))]
    Unauthorized {
        /// Server-supplied message, if any.
        message: Option<String>,
    },

    /// Any other non-success status.
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Status {
        /// Response status.
        status: StatusCode,
        /// Server-supplied message, if any.
        message: Option<String>,
    },

    /// Response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An endpoint URL could not be built from the base URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Response status, when the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The `message` field of the server's error body, if it sent one.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { message } | Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Whether the failure is the server's or the network's fault rather
    /// than a rejection of the request.
    #[must_use]
    pub fn is_server_side(&self) -> bool {
        match self {
            Self::Http(_) | Self::Parse(_) | Self::InvalidUrl(_) => true,
            Self::Status { status, .. } => status.is_server_error(),
            Self::Unauthorized { .. } => false,
        }
    }
}

/// Error body shape used by the bookstore API.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the bookstore REST API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    session: SessionManager,
    navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the underlying HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        session: SessionManager,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                session,
                navigator,
            }),
        })
    }

    /// Build an endpoint URL from path segments (each segment is escaped).
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // =========================================================================
    // Request pipeline
    // =========================================================================

    /// `GET` an endpoint and decode the JSON response.
    pub(crate) async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let body = self.send(Method::GET, segments, None::<&()>).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// `POST` a JSON body and decode the JSON response.
    pub(crate) async fn post<B, T>(&self, segments: &[&str], body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(Method::POST, segments, Some(body)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// `POST` without a body, ignoring whatever the server answers on success.
    pub(crate) async fn post_unit(&self, segments: &[&str]) -> Result<(), ApiError> {
        self.send(Method::POST, segments, None::<&()>).await?;
        Ok(())
    }

    /// `DELETE` an endpoint and decode the JSON response.
    pub(crate) async fn delete<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<T, ApiError> {
        let body = self.send(Method::DELETE, segments, None::<&()>).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Send a request through both interceptors and return the raw body of a
    /// successful response.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<String, ApiError> {
        let url = self.endpoint(segments)?;
        debug!(method = %method, url = %url, "Sending API request");

        let mut request = self.inner.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self.authorize(request).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(text);
        }

        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty());

        if status == StatusCode::UNAUTHORIZED {
            self.on_unauthorized();
            return Err(ApiError::Unauthorized { message });
        }

        tracing::warn!(
            status = %status,
            body = %text.chars().take(200).collect::<String>(),
            "API returned non-success status"
        );
        Err(ApiError::Status { status, message })
    }

    /// Outbound interceptor: attach the current bearer token, if any.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.inner.session.current_token() {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }

    /// Inbound interceptor for 401 responses.
    ///
    /// Clears the session and forces the login surface, except while the
    /// shopper is already on the login or registration surface (which would
    /// otherwise loop).
    fn on_unauthorized(&self) {
        let current = self.inner.navigator.current_path();
        if routes::UNAUTHENTICATED.contains(&current.as_str()) {
            debug!(path = %current, "401 on unauthenticated surface, not redirecting");
            return;
        }

        tracing::info!(path = %current, "Session rejected by API, signing out");
        if let Err(e) = self.inner.session.logout() {
            tracing::warn!(error = %e, "Failed to remove stored token after 401");
        }
        self.inner.navigator.redirect(routes::LOGIN);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::navigation::MemoryNavigator;
    use crate::storage::MemoryStore;

    use super::*;

    fn client(base: &str) -> ApiClient {
        let config = ClientConfig::for_api_url(base).unwrap();
        let session = SessionManager::load(Arc::new(MemoryStore::new()));
        ApiClient::new(&config, session, Arc::new(MemoryNavigator::default())).unwrap()
    }

    #[test]
    fn test_endpoint_joins_under_base_path() {
        let api = client("https://books.example.com/api");
        assert_eq!(
            api.endpoint(&["cart", "clear"]).unwrap().as_str(),
            "https://books.example.com/api/cart/clear"
        );
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let api = client("https://books.example.com/api/");
        assert_eq!(
            api.endpoint(&["cart", "a/b c"]).unwrap().as_str(),
            "https://books.example.com/api/cart/a%2Fb%20c"
        );
    }

    #[test]
    fn test_error_accessors() {
        let err = ApiError::Status {
            status: StatusCode::CONFLICT,
            message: Some("Email already registered".to_string()),
        };
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert_eq!(err.server_message(), Some("Email already registered"));
        assert!(!err.is_server_side());
        assert_eq!(err.to_string(), "HTTP 409 Conflict: Email already registered");

        let err = ApiError::Unauthorized { message: None };
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(err.to_string(), "Unauthorized: session rejected");
    }
}
