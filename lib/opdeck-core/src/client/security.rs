use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use super::ApiClientError;
use super::credential::{Credential, CredentialMode, CredentialUpdate, RefreshCallback, SecureString};

/// How long before its expiry a credential is treated as expired.
pub(super) const REFRESH_THRESHOLD: Duration = Duration::from_secs(60);

/// A security scheme declaration from the document's security-scheme section.
///
/// Parsed leniently: every field is optional at parse time, and unsupported
/// `type`/`in` combinations are only rejected when a credential is attached
/// to the scheme.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemeDefinition {
    /// The scheme type (`http` or `apiKey` are injectable).
    #[serde(rename = "type", default)]
    pub scheme_type: Option<String>,
    /// The HTTP authorization scheme (e.g. `bearer`, `basic`) for `http` schemes.
    #[serde(default)]
    pub scheme: Option<String>,
    /// Where the credential goes (`header`, `query` or `cookie`) for `apiKey` schemes.
    #[serde(rename = "in", default)]
    pub location: Option<String>,
    /// The header, query parameter or cookie name for `apiKey` schemes.
    #[serde(default)]
    pub name: Option<String>,
}

impl SchemeDefinition {
    /// Computes the injection shape for a raw credential value.
    fn injection(
        &self,
        scheme_name: &str,
        value: &SecureString,
        allow_cors: bool,
    ) -> Result<Injection, ApiClientError> {
        let unsupported = |detail: String| ApiClientError::UnsupportedScheme {
            name: scheme_name.to_string(),
            detail,
        };

        match self.scheme_type.as_deref() {
            Some("http") => {
                let scheme = self
                    .scheme
                    .as_deref()
                    .ok_or_else(|| unsupported("missing http authorization scheme".to_string()))?;
                let mut injection = Injection::default();
                injection.headers.insert(
                    "authorization".to_string(),
                    format!("{scheme} {}", value.as_str()),
                );
                Ok(injection)
            }
            Some("apiKey") => {
                let parameter = self
                    .name
                    .as_deref()
                    .ok_or_else(|| unsupported("missing apiKey parameter name".to_string()))?;
                let mut injection = Injection::default();
                match self.location.as_deref() {
                    Some("header") => {
                        injection
                            .headers
                            .insert(parameter.to_lowercase(), value.as_str().to_string());
                    }
                    Some("query") => {
                        injection
                            .query
                            .insert(parameter.to_string(), value.as_str().to_string());
                    }
                    Some("cookie") => {
                        let mode = if value.as_str().is_empty() {
                            CredentialMode::cookie_default(allow_cors)
                        } else {
                            value.as_str().parse()?
                        };
                        injection.mode = Some(mode);
                    }
                    other => {
                        return Err(unsupported(format!(
                            "cannot handle scheme parameter in {}",
                            other.unwrap_or("<unset>")
                        )));
                    }
                }
                Ok(injection)
            }
            other => Err(unsupported(format!(
                "cannot handle scheme type {}",
                other.unwrap_or("<unset>")
            ))),
        }
    }
}

/// Reads the security-scheme declarations from the document.
///
/// Malformed entries are skipped with a warning; missing sections yield an
/// empty map.
pub(super) fn compile_schemes(document: &Value) -> IndexMap<String, SchemeDefinition> {
    let mut schemes = IndexMap::new();
    let Some(entries) = document
        .pointer("/components/securitySchemes")
        .and_then(Value::as_object)
    else {
        return schemes;
    };
    for (name, value) in entries {
        match serde_json::from_value::<SchemeDefinition>(value.clone()) {
            Ok(definition) => {
                schemes.insert(name.clone(), definition);
            }
            Err(error) => warn!(%name, %error, "ignoring malformed security scheme"),
        }
    }
    schemes
}

/// Header/query material and cookie mode derived from one credential.
#[derive(Debug, Clone, Default)]
struct Injection {
    headers: IndexMap<String, String>,
    query: IndexMap<String, String>,
    mode: Option<CredentialMode>,
}

type SharedRefresh = Shared<BoxFuture<'static, Result<(), String>>>;

/// One stored credential and its lifecycle state.
struct CredentialEntry {
    injection: Injection,
    expiry: Option<Instant>,
    refresh: Option<RefreshCallback>,
    in_flight: Option<SharedRefresh>,
    scheme: SchemeDefinition,
}

impl CredentialEntry {
    /// Whether the entry is within the refresh threshold of its expiry.
    fn is_expiring(&self) -> bool {
        self.expiry
            .is_some_and(|expiry| Instant::now() + REFRESH_THRESHOLD >= expiry)
    }
}

impl fmt::Debug for CredentialEntry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CredentialEntry")
            .field("expiry", &self.expiry)
            .field("refreshable", &self.refresh.is_some())
            .field("in_flight", &self.in_flight.is_some())
            .finish_non_exhaustive()
    }
}

/// Credential lifecycle manager for one client runtime.
///
/// Holds the immutable scheme declarations and the mutable credential store.
/// Clones share the same store, so every clone of a built client observes
/// the same credentials.
#[derive(Debug, Clone)]
pub(super) struct SecurityManager {
    schemes: Arc<IndexMap<String, SchemeDefinition>>,
    allow_cors: bool,
    entries: Arc<Mutex<HashMap<String, CredentialEntry>>>,
}

impl SecurityManager {
    pub(super) fn new(schemes: Arc<IndexMap<String, SchemeDefinition>>, allow_cors: bool) -> Self {
        Self {
            schemes,
            allow_cors,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Attaches a credential to a declared scheme, replacing any previous one.
    ///
    /// The injection shape is computed eagerly so that unusable schemes fail
    /// here rather than on the first call.
    pub(super) async fn set(&self, name: &str, credential: Credential) -> Result<(), ApiClientError> {
        let scheme = self
            .schemes
            .get(name)
            .ok_or_else(|| ApiClientError::UnknownScheme {
                name: name.to_string(),
            })?;
        let Credential {
            value,
            expiry,
            refresh,
        } = credential;
        let injection = scheme.injection(name, &value, self.allow_cors)?;
        let entry = CredentialEntry {
            injection,
            expiry,
            refresh,
            in_flight: None,
            scheme: scheme.clone(),
        };
        self.entries.lock().await.insert(name.to_string(), entry);
        Ok(())
    }

    /// Removes one credential; idempotent.
    pub(super) async fn unset(&self, name: &str) {
        self.entries.lock().await.remove(name);
    }

    /// Removes every credential; idempotent.
    pub(super) async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Resolves one scheme for a call, merging its injections into the
    /// outgoing header and query collections.
    ///
    /// Returns `None` when no credential is held for the scheme (the call
    /// proceeds without it). A near-expiry credential is renewed through its
    /// refresh callback first — concurrent callers share a single in-flight
    /// refresh — or dropped when it has no callback.
    pub(super) async fn resolve(
        &self,
        name: &str,
        headers: &mut IndexMap<String, String>,
        query: &mut IndexMap<String, String>,
    ) -> Result<Option<CredentialMode>, ApiClientError> {
        loop {
            let pending = {
                let mut entries = self.entries.lock().await;
                let Some(entry) = entries.get_mut(name) else {
                    return Ok(None);
                };
                if !entry.is_expiring() {
                    for (header, value) in &entry.injection.headers {
                        headers.insert(header.clone(), value.clone());
                    }
                    for (parameter, value) in &entry.injection.query {
                        query.insert(parameter.clone(), value.clone());
                    }
                    return Ok(entry.injection.mode);
                }
                match entry.refresh.clone() {
                    None => {
                        entries.remove(name);
                        continue;
                    }
                    Some(callback) => entry
                        .in_flight
                        .get_or_insert_with(|| self.start_refresh(name, callback))
                        .clone(),
                }
            };
            pending
                .await
                .map_err(|message| ApiClientError::RefreshFailed {
                    scheme: name.to_string(),
                    message,
                })?;
        }
    }

    /// Builds the shared refresh future for one entry.
    ///
    /// The future runs the callback once, then re-enters the store to clear
    /// the in-flight cell (success or failure) and, on success, to apply the
    /// renewed value through the same injection computation as `set`.
    fn start_refresh(&self, name: &str, callback: RefreshCallback) -> SharedRefresh {
        let name = name.to_string();
        let allow_cors = self.allow_cors;
        let entries = Arc::downgrade(&self.entries);
        let future: BoxFuture<'static, Result<(), String>> = Box::pin(async move {
            let outcome = callback().await.map_err(|error| error.to_string());
            let Some(entries) = Weak::upgrade(&entries) else {
                return outcome.map(|_| ());
            };
            let mut entries = entries.lock().await;
            let Some(entry) = entries.get_mut(&name) else {
                return outcome.map(|_| ());
            };
            entry.in_flight = None;
            let CredentialUpdate { value, expiry } = outcome?;
            let injection = entry
                .scheme
                .injection(&name, &value, allow_cors)
                .map_err(|error| error.to_string())?;
            entry.injection = injection;
            entry.expiry = expiry;
            Ok(())
        });
        future.shared()
    }
}
