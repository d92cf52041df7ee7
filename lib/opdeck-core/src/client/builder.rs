use std::sync::Arc;

use http::uri::Scheme;
use indexmap::IndexMap;
use serde_json::Value;
use url::Url;

use super::security::{SecurityManager, compile_schemes};
use super::{
    ApiClient, ApiClientError, BaseOptions, CredentialMode, HttpTransport, OperationTable,
    Transport,
};

/// Builder for [`ApiClient`] instances.
///
/// Captures the operation document and the transport configuration; `build`
/// compiles the document once and the resulting table is shared by every
/// clone of the built client.
///
/// # Default Configuration
///
/// - **Scheme**: HTTP
/// - **Host**: 127.0.0.1
/// - **Port**: none (scheme default)
/// - **Base path**: none
/// - **Cross-origin cookie forwarding**: disabled
/// - **Transport**: [`HttpTransport`] with a fresh reqwest client
///
/// # Example
///
/// ```rust,no_run
/// use opdeck_core::ApiClient;
/// use serde_json::json;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let document = json!({
///     "openapi": "3.1.0",
///     "paths": { "/pets": { "get": {} } }
/// });
///
/// let client = ApiClient::builder()
///     .with_document(document)
///     .with_host("api.example.com")
///     .with_base_path("/v1")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClientBuilder {
    document: Option<Value>,
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    base_path: Option<String>,
    base_url: Option<Url>,
    allow_cors: bool,
    base_headers: IndexMap<String, String>,
    credential_mode: Option<CredentialMode>,
    transport: Option<Arc<dyn Transport>>,
    decode_all_success: bool,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            document: None,
            scheme: Scheme::HTTP,
            host: "127.0.0.1".to_string(),
            port: None,
            base_path: None,
            base_url: None,
            allow_cors: false,
            base_headers: IndexMap::new(),
            credential_mode: None,
            transport: None,
            decode_all_success: false,
        }
    }
}

impl ApiClientBuilder {
    /// Builds the client, compiling the operation document.
    ///
    /// # Errors
    ///
    /// Fails when the configured scheme/host/port/base-path do not form a
    /// valid base URL.
    pub fn build(self) -> Result<ApiClient, ApiClientError> {
        let Self {
            document,
            scheme,
            host,
            port,
            base_path,
            base_url,
            allow_cors,
            base_headers,
            credential_mode,
            transport,
            decode_all_success,
        } = self;

        let base_url = match base_url {
            Some(url) => url,
            None => {
                let authority = match port {
                    Some(port) => format!("{host}:{port}"),
                    None => host,
                };
                let path = base_path.unwrap_or_default();
                format!("{scheme}://{authority}/{}", path.trim_start_matches('/')).parse()?
            }
        };

        let (operations, schemes) = match &document {
            Some(document) => (OperationTable::compile(document), compile_schemes(document)),
            None => (OperationTable::default(), IndexMap::new()),
        };

        let security = SecurityManager::new(Arc::new(schemes), allow_cors);
        let transport = transport.unwrap_or_else(|| Arc::new(HttpTransport::default()));

        Ok(ApiClient {
            operations: Arc::new(operations),
            security,
            transport,
            base_url,
            base_options: BaseOptions {
                headers: base_headers,
                credential_mode,
            },
            allow_cors,
            decode_all_success,
        })
    }

    /// Sets the operation document (a validated OpenAPI-style value).
    #[must_use]
    pub fn with_document(mut self, document: Value) -> Self {
        self.document = Some(document);
        self
    }

    /// Sets the scheme (protocol) of the base URL.
    #[must_use]
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets the host of the base URL.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port of the base URL.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the path prefix prepended to every operation path.
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Overrides the base URL directly, ignoring scheme/host/port/base-path.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Enables cross-origin cookie forwarding for cookie-backed schemes.
    #[must_use]
    pub fn with_allow_cors(mut self, allow_cors: bool) -> Self {
        self.allow_cors = allow_cors;
        self
    }

    /// Adds a header sent with every call (lower-cased name).
    #[must_use]
    pub fn add_base_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.base_headers
            .insert(name.as_ref().to_lowercase(), value.into());
        self
    }

    /// Sets the default cookie-forwarding mode applied to every call.
    #[must_use]
    pub fn with_credential_mode(mut self, mode: CredentialMode) -> Self {
        self.credential_mode = Some(mode);
        self
    }

    /// Substitutes the transport used to perform network calls.
    #[must_use]
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Widens body decoding from status 200 to every success status.
    #[must_use]
    pub fn with_decode_all_success(mut self, decode_all_success: bool) -> Self {
        self.decode_all_success = decode_all_success;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn should_build_default_base_url() {
        let client = ApiClient::builder().build().unwrap();
        assert_eq!(client.base_url().as_str(), "http://127.0.0.1/");
    }

    #[test]
    fn should_build_base_url_from_parts() {
        let client = ApiClient::builder()
            .with_scheme(Scheme::HTTPS)
            .with_host("api.example.com")
            .with_port(8443)
            .with_base_path("/v1")
            .build()
            .unwrap();
        assert_eq!(client.base_url().as_str(), "https://api.example.com:8443/v1");
    }

    #[test]
    fn should_prefer_explicit_base_url() {
        let client = ApiClient::builder()
            .with_host("ignored.example.com")
            .with_base_url("https://api.example.com/v2".parse().unwrap())
            .build()
            .unwrap();
        assert_eq!(client.base_url().as_str(), "https://api.example.com/v2");
    }

    #[test]
    fn should_compile_document_at_build_time() {
        let client = ApiClient::builder()
            .with_document(json!({
                "paths": {
                    "/pets": { "get": {} }
                }
            }))
            .build()
            .unwrap();
        assert!(client.has_operation("get /pets"));
        assert!(!client.has_operation("post /pets"));
    }

    #[test]
    fn should_build_empty_client_without_document() {
        let client = ApiClient::builder().build().unwrap();
        assert_eq!(client.operations().count(), 0);
    }

    #[test]
    fn should_store_base_headers_lowercased() {
        let client = ApiClient::builder()
            .add_base_header("X-Client", "opdeck")
            .build()
            .unwrap();
        assert_eq!(
            client.base_options().headers.get("x-client").map(String::as_str),
            Some("opdeck")
        );
    }
}
