use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::ApiClientError;

/// Boxed error type returned by credential refresh callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared handle to a credential refresh callback.
pub(super) type RefreshCallback =
    Arc<dyn Fn() -> BoxFuture<'static, Result<CredentialUpdate, BoxError>> + Send + Sync>;

/// Secure wrapper for sensitive string data that zeroes memory on drop.
///
/// Credential values are cleared from memory when no longer needed, and are
/// redacted in `Debug` output and masked in `Display` output so they do not
/// leak into logs.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecureString(String);

impl SecureString {
    /// Creates a new secure string from the provided value.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Returns a reference to the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Masks sensitive data for display purposes.
    fn mask_sensitive(value: &str) -> String {
        if value.len() <= 8 {
            "***".to_string()
        } else {
            format!("{}...{}", &value[..4], &value[value.len() - 4..])
        }
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SecureString")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", Self::mask_sensitive(&self.0))
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

/// Cookie-forwarding policy attached to an outgoing request.
///
/// Mirrors the browser fetch credential modes: whether ambient cookies are
/// forwarded never, to same-origin targets only, or always.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, derive_more::Display)]
pub enum CredentialMode {
    /// Never forward cookies.
    #[default]
    #[display("omit")]
    Omit,
    /// Forward cookies to same-origin targets only.
    #[display("same-origin")]
    SameOrigin,
    /// Always forward cookies.
    #[display("include")]
    Include,
}

impl CredentialMode {
    /// The default mode for operations that carry cookie parameters.
    pub(super) fn cookie_default(allow_cors: bool) -> Self {
        if allow_cors {
            Self::Include
        } else {
            Self::SameOrigin
        }
    }
}

impl FromStr for CredentialMode {
    type Err = ApiClientError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "omit" => Ok(Self::Omit),
            "same-origin" => Ok(Self::SameOrigin),
            "include" => Ok(Self::Include),
            other => Err(ApiClientError::InvalidCredentialMode {
                value: other.to_string(),
            }),
        }
    }
}

/// A credential for a declared security scheme.
///
/// Carries the raw secret value, an optional absolute expiry and an optional
/// refresh callback. Without an expiry the credential never expires; without
/// a refresh callback an expired credential is dropped instead of renewed.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use opdeck_core::{Credential, CredentialUpdate};
///
/// // A static token
/// let credential = Credential::new("my-api-key");
///
/// // A short-lived token that knows how to renew itself
/// let credential = Credential::new("initial-token")
///     .expires_in(Duration::from_secs(300))
///     .with_refresh(|| async {
///         // fetch a new token from the token endpoint...
///         Ok(CredentialUpdate::new("renewed-token").expires_in(Duration::from_secs(300)))
///     });
/// ```
#[derive(Clone)]
pub struct Credential {
    pub(super) value: SecureString,
    pub(super) expiry: Option<Instant>,
    pub(super) refresh: Option<RefreshCallback>,
}

impl Credential {
    /// Creates a non-expiring credential from a raw value.
    pub fn new(value: impl Into<SecureString>) -> Self {
        Self {
            value: value.into(),
            expiry: None,
            refresh: None,
        }
    }

    /// Sets the absolute expiry of the credential.
    #[must_use]
    pub fn expires_at(mut self, expiry: Instant) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Sets the expiry relative to now.
    #[must_use]
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expiry = Some(Instant::now() + ttl);
        self
    }

    /// Attaches an asynchronous refresh callback.
    ///
    /// When the credential is observed near expiry the callback is invoked
    /// (once, shared across concurrent calls) and the returned
    /// [`CredentialUpdate`] replaces the stored value and expiry. The
    /// callback itself is kept for subsequent renewals.
    #[must_use]
    pub fn with_refresh<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CredentialUpdate, BoxError>> + Send + 'static,
    {
        self.refresh = Some(Arc::new(move || Box::pin(callback())));
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("value", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .field("refresh", &self.refresh.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Replacement value produced by a credential refresh callback.
#[derive(Debug, Clone)]
pub struct CredentialUpdate {
    pub(super) value: SecureString,
    pub(super) expiry: Option<Instant>,
}

impl CredentialUpdate {
    /// Creates a non-expiring replacement credential value.
    pub fn new(value: impl Into<SecureString>) -> Self {
        Self {
            value: value.into(),
            expiry: None,
        }
    }

    /// Sets the absolute expiry of the renewed credential.
    #[must_use]
    pub fn expires_at(mut self, expiry: Instant) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Sets the expiry relative to now.
    #[must_use]
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expiry = Some(Instant::now() + ttl);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_redact_secure_string_debug() {
        let secure = SecureString::new("secret-password".to_string());
        let debug_str = format!("{secure:?}");
        assert_eq!(debug_str, "SecureString { value: \"[REDACTED]\" }");
        assert!(!debug_str.contains("secret-password"));
    }

    #[test]
    fn should_mask_secure_string_display() {
        let secure = SecureString::new("secret-password-12345".to_string());
        assert_eq!(format!("{secure}"), "secr...2345");

        let short = SecureString::new("short".to_string());
        assert_eq!(format!("{short}"), "***");
    }

    #[test]
    fn should_parse_credential_modes() {
        assert_eq!("omit".parse::<CredentialMode>().unwrap(), CredentialMode::Omit);
        assert_eq!(
            "same-origin".parse::<CredentialMode>().unwrap(),
            CredentialMode::SameOrigin
        );
        assert_eq!(
            "include".parse::<CredentialMode>().unwrap(),
            CredentialMode::Include
        );

        let error = "everywhere".parse::<CredentialMode>().unwrap_err();
        assert!(matches!(
            error,
            ApiClientError::InvalidCredentialMode { value } if value == "everywhere"
        ));
    }

    #[test]
    fn should_display_credential_modes() {
        assert_eq!(CredentialMode::Omit.to_string(), "omit");
        assert_eq!(CredentialMode::SameOrigin.to_string(), "same-origin");
        assert_eq!(CredentialMode::Include.to_string(), "include");
    }

    #[test]
    fn should_pick_cookie_default_from_cors() {
        assert_eq!(CredentialMode::cookie_default(true), CredentialMode::Include);
        assert_eq!(
            CredentialMode::cookie_default(false),
            CredentialMode::SameOrigin
        );
    }

    #[test]
    fn should_build_credential_with_expiry_and_refresh() {
        let credential = Credential::new("token")
            .expires_in(Duration::from_secs(60))
            .with_refresh(|| async { Ok(CredentialUpdate::new("renewed")) });

        assert_eq!(credential.value.as_str(), "token");
        assert!(credential.expiry.is_some());
        assert!(credential.refresh.is_some());
    }

    #[test]
    fn should_redact_credential_debug() {
        let credential = Credential::new("very-secret");
        let debug_str = format!("{credential:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("very-secret"));
    }
}
