//! Authentication endpoints.

use chrono::{DateTime, Utc};
use crafted_chapter_core::{AuthToken, Email};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::http::{ApiClient, ApiError};

/// Account profile of the signed-in shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

impl ApiClient {
    // =========================================================================
    // Auth Methods
    // =========================================================================

    /// Exchange credentials for a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the request fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<AuthToken, ApiError> {
        let body = LoginBody {
            email: email.as_str(),
            password: password.expose_secret(),
        };
        let response: TokenResponse = self.post(&["auth", "login"], &body).await?;
        Ok(AuthToken::new(response.token))
    }

    /// Create an account and return its token.
    ///
    /// # Errors
    ///
    /// Returns an error if registration is rejected or the request fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn register(
        &self,
        name: &str,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthToken, ApiError> {
        let body = RegisterBody {
            name,
            email: email.as_str(),
            password: password.expose_secret(),
        };
        let response: TokenResponse = self.post(&["auth", "register"], &body).await?;
        Ok(AuthToken::new(response.token))
    }

    /// Fetch the signed-in shopper's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no valid session or the request fails.
    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<Profile, ApiError> {
        self.get(&["auth", "profile"]).await
    }
}
