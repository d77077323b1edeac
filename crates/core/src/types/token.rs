//! Bearer token issued by the bookstore API.

use core::fmt;

use secrecy::{ExposeSecret, SecretString};

/// An authentication token carried as `Authorization: Bearer <token>`.
///
/// Wraps a [`SecretString`] so the value never appears in `Debug` output or
/// logs. Two tokens are equal when their secret values are equal; the session
/// manager relies on this to make repeated logins with the same token no-ops.
#[derive(Clone)]
pub struct AuthToken(SecretString);

impl AuthToken {
    /// Wrap a raw token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Expose the raw token for building the `Authorization` header or
    /// persisting it.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl PartialEq for AuthToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for AuthToken {}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

impl From<String> for AuthToken {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}
