use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use url::Url;

mod builder;
pub use self::builder::ApiClientBuilder;

mod operations;
pub use self::operations::{OperationDescriptor, OperationTable, SKIP_EXTENSION};

mod credential;
pub use self::credential::{BoxError, Credential, CredentialMode, CredentialUpdate, SecureString};

mod security;
pub use self::security::SchemeDefinition;
use self::security::SecurityManager;

mod request;
use self::request::PreparedRequest;

mod response;
pub use self::response::{CallOutcome, FormData, FormField};
use self::response::interpret;

mod transport;
pub use self::transport::{HttpTransport, Transport, TransportRequest, TransportResponse};

mod error;
pub use self::error::ApiClientError;


/// Transport options applied to every call of a client instance.
#[derive(Debug, Clone, Default)]
pub struct BaseOptions {
    /// Headers added to every outgoing request; caller-supplied headers
    /// override them.
    pub headers: IndexMap<String, String>,
    /// Default cookie-forwarding mode; overrides the operation-derived
    /// default, and is itself overridden by cookie-backed security schemes.
    pub credential_mode: Option<CredentialMode>,
}

/// Generic dispatcher over the operations compiled from a document.
///
/// Every compiled operation is callable through [`invoke`](Self::invoke)
/// with its key of the form `"<method> <pathTemplate>"` and the positional
/// arguments the operation declares (path parameters, then a query mapping,
/// then the body, then a header mapping). Credentials attached with
/// [`set_security`](Self::set_security) are resolved per call, renewing
/// near-expiry credentials through their refresh callback.
///
/// # Example
///
/// ```rust,no_run
/// use opdeck_core::ApiClient;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let document = json!({
///     "openapi": "3.1.0",
///     "paths": {
///         "/pets": { "get": {} },
///         "/pets/{petId}": {
///             "get": {
///                 "parameters": [ { "name": "petId", "in": "path", "required": true } ]
///             }
///         }
///     }
/// });
///
/// let client = ApiClient::builder()
///     .with_document(document)
///     .with_host("api.example.com")
///     .build()?;
///
/// let pets = client.invoke("get /pets", vec![]).await?;
/// let pet = client.invoke("get /pets/{petId}", vec![json!(42)]).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Concurrency
///
/// Clones share the operation table, the scheme declarations and the
/// credential store; base options are per-clone. Concurrent calls racing on
/// the same expired credential trigger exactly one refresh.
#[derive(Debug, Clone)]
pub struct ApiClient {
    operations: Arc<OperationTable>,
    security: SecurityManager,
    transport: Arc<dyn Transport>,
    base_url: Url,
    base_options: BaseOptions,
    allow_cors: bool,
    decode_all_success: bool,
}

// Create
impl ApiClient {
    /// Starts building a client.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }
}

// Dispatch
impl ApiClient {
    /// Whether the compiled table exposes an operation for the key.
    pub fn has_operation(&self, key: &str) -> bool {
        self.operations.contains(key)
    }

    /// Iterates over the callable operation keys.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.operations.keys()
    }

    /// Looks up the compiled descriptor for an operation key.
    pub fn descriptor(&self, key: &str) -> Option<&OperationDescriptor> {
        self.operations.get(key)
    }

    /// Invokes one operation with its positional arguments.
    ///
    /// Builds the request from the arguments, resolves and injects
    /// credentials for every security scheme the operation requires, sends
    /// it through the transport and classifies the response.
    ///
    /// # Errors
    ///
    /// Argument and credential errors ([`UnknownOperation`],
    /// [`MissingParameter`], [`MissingBody`], [`ExtraParameters`], ...) are
    /// raised before any network call. An unsuccessful response yields
    /// [`RequestFailed`].
    ///
    /// [`UnknownOperation`]: ApiClientError::UnknownOperation
    /// [`MissingParameter`]: ApiClientError::MissingParameter
    /// [`MissingBody`]: ApiClientError::MissingBody
    /// [`ExtraParameters`]: ApiClientError::ExtraParameters
    /// [`RequestFailed`]: ApiClientError::RequestFailed
    pub async fn invoke(&self, key: &str, args: Vec<Value>) -> Result<CallOutcome, ApiClientError> {
        let Some(operation) = self.operations.get(key) else {
            return Err(ApiClientError::UnknownOperation {
                key: key.to_string(),
            });
        };

        let mut prepared =
            PreparedRequest::from_args(operation, args, &self.base_options, self.allow_cors)?;

        for scheme in &operation.security {
            if let Some(mode) = self
                .security
                .resolve(scheme, &mut prepared.headers, &mut prepared.query)
                .await?
            {
                prepared.credential_mode = mode;
            }
        }

        let url = prepared.url(&self.base_url)?;
        let request = TransportRequest {
            method: prepared.method,
            headers: prepared.headers,
            credential_mode: prepared.credential_mode,
            body: prepared.body,
        };
        let response = self.transport.send(url, request).await?;
        interpret(response, self.decode_all_success).await
    }
}

// Security
impl ApiClient {
    /// Attaches a credential to a declared security scheme.
    ///
    /// Accepts a plain value for static credentials, or a [`Credential`]
    /// with an expiry and a refresh callback for short-lived ones.
    ///
    /// # Errors
    ///
    /// Fails with [`UnknownScheme`](ApiClientError::UnknownScheme) for an
    /// undeclared name and
    /// [`UnsupportedScheme`](ApiClientError::UnsupportedScheme) for a
    /// scheme the client cannot inject.
    pub async fn set_security(
        &self,
        name: &str,
        credential: impl Into<Credential>,
    ) -> Result<(), ApiClientError> {
        self.security.set(name, credential.into()).await
    }

    /// Removes the credential for one scheme; idempotent.
    pub async fn unset_security(&self, name: &str) {
        self.security.unset(name).await;
    }

    /// Removes every credential; idempotent.
    pub async fn clear_security(&self) {
        self.security.clear().await;
    }
}

// Base options
impl ApiClient {
    /// The base URL calls are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The transport options applied to every call.
    pub fn base_options(&self) -> &BaseOptions {
        &self.base_options
    }

    /// Mutable access to the transport options of this instance.
    pub fn base_options_mut(&mut self) -> &mut BaseOptions {
        &mut self.base_options
    }
}
