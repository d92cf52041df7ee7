use std::fmt;

use async_trait::async_trait;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::ApiClientError;
use super::credential::CredentialMode;
use super::response::FormData;

/// The outgoing request handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: Method,
    /// The assembled request headers (lower-cased names).
    pub headers: IndexMap<String, String>,
    /// The cookie-forwarding policy; advisory for transports without a
    /// cookie jar.
    pub credential_mode: CredentialMode,
    /// The serialized request body, if any.
    pub body: Option<String>,
}

/// Performs the actual network call for a client.
///
/// The default implementation is [`HttpTransport`]; tests substitute stubs.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends the request and returns the response handle.
    async fn send(
        &self,
        url: Url,
        request: TransportRequest,
    ) -> Result<Box<dyn TransportResponse>, ApiClientError>;
}

/// A response handle with status/header access and consume-once body readers.
///
/// The body readers take `self` by box, so each response body can be read at
/// most once, in exactly one representation.
#[async_trait]
pub trait TransportResponse: Send + fmt::Debug {
    /// The response status code.
    fn status(&self) -> StatusCode;

    /// Whether the status is a success (2xx).
    fn is_ok(&self) -> bool {
        self.status().is_success()
    }

    /// The status line text (canonical reason phrase when known).
    fn status_text(&self) -> String {
        let status = self.status();
        status
            .canonical_reason()
            .map_or_else(|| status.to_string(), str::to_string)
    }

    /// Looks up a response header value.
    fn header(&self, name: &str) -> Option<String>;

    /// Reads the body as text.
    async fn text(self: Box<Self>) -> Result<String, ApiClientError>;

    /// Reads and decodes the body as JSON.
    async fn json(self: Box<Self>) -> Result<Value, ApiClientError> {
        let text = self.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Reads and parses the body as `multipart/form-data`.
    async fn form_data(self: Box<Self>) -> Result<FormData, ApiClientError> {
        let content_type = self.header(CONTENT_TYPE.as_str()).unwrap_or_default();
        let body = self.text().await?;
        FormData::parse(&content_type, &body)
    }
}

/// Default [`Transport`] backed by a shared reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Wraps an existing reqwest client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        url: Url,
        request: TransportRequest,
    ) -> Result<Box<dyn TransportResponse>, ApiClientError> {
        let TransportRequest {
            method,
            headers,
            credential_mode,
            body,
        } = request;

        debug!(%url, %method, %credential_mode, "sending...");
        let mut builder = self.client.request(method, url);
        for (name, value) in &headers {
            builder = builder.header(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        debug!(status = %response.status(), "...receiving");

        Ok(Box::new(HttpResponse { inner: response }))
    }
}

/// [`TransportResponse`] over a reqwest response.
#[derive(Debug)]
struct HttpResponse {
    inner: reqwest::Response,
}

#[async_trait]
impl TransportResponse for HttpResponse {
    fn status(&self) -> StatusCode {
        self.inner.status()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.inner
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    async fn text(self: Box<Self>) -> Result<String, ApiClientError> {
        Ok(self.inner.text().await?)
    }

    async fn json(self: Box<Self>) -> Result<Value, ApiClientError> {
        Ok(self.inner.json().await?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Canned response for stub transports.
    #[derive(Debug, Clone)]
    pub(crate) struct StubResponse {
        pub(crate) status: StatusCode,
        pub(crate) headers: IndexMap<String, String>,
        pub(crate) body: String,
    }

    impl StubResponse {
        pub(crate) fn new(status: StatusCode) -> Self {
            Self {
                status,
                headers: IndexMap::new(),
                body: String::new(),
            }
        }

        pub(crate) fn json(status: StatusCode, body: impl Into<String>) -> Self {
            Self::new(status)
                .with_header("content-type", "application/json")
                .with_body(body)
        }

        pub(crate) fn text(status: StatusCode, body: impl Into<String>) -> Self {
            Self::new(status)
                .with_header("content-type", "text/plain")
                .with_body(body)
        }

        pub(crate) fn with_header(mut self, name: &str, value: &str) -> Self {
            self.headers.insert(name.to_lowercase(), value.to_string());
            self
        }

        pub(crate) fn with_body(mut self, body: impl Into<String>) -> Self {
            self.body = body.into();
            self
        }
    }

    #[async_trait]
    impl TransportResponse for StubResponse {
        fn status(&self) -> StatusCode {
            self.status
        }

        fn header(&self, name: &str) -> Option<String> {
            self.headers.get(&name.to_lowercase()).cloned()
        }

        async fn text(self: Box<Self>) -> Result<String, ApiClientError> {
            Ok(self.body)
        }
    }

    /// Stub transport that records every request and replies with a canned
    /// response (or echoes the request body back as JSON).
    #[derive(Debug, Clone)]
    pub(crate) struct StubTransport {
        pub(crate) response: StubResponse,
        pub(crate) echo_body: bool,
        pub(crate) calls: Arc<Mutex<Vec<(Url, TransportRequest)>>>,
    }

    impl StubTransport {
        pub(crate) fn replying(response: StubResponse) -> Self {
            Self {
                response,
                echo_body: false,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn echoing() -> Self {
            Self {
                response: StubResponse::json(StatusCode::OK, ""),
                echo_body: true,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn calls(&self) -> Vec<(Url, TransportRequest)> {
            self.calls.lock().expect("stub calls lock").clone()
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send(
            &self,
            url: Url,
            request: TransportRequest,
        ) -> Result<Box<dyn TransportResponse>, ApiClientError> {
            let mut response = self.response.clone();
            if self.echo_body {
                response.body = request.body.clone().unwrap_or_default();
            }
            self.calls
                .lock()
                .expect("stub calls lock")
                .push((url, request));
            Ok(Box::new(response))
        }
    }
}
