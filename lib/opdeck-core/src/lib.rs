//! Runtime HTTP client synthesized from an OpenAPI-style operation document.
//!
//! `opdeck-core` takes a validated operation document (paths, methods,
//! parameters, security schemes) and compiles it once into a compact
//! operation table. The resulting [`ApiClient`] exposes every operation as a
//! callable keyed by `"<method> <pathTemplate>"`, builds the outgoing
//! request from positional arguments, resolves credentials per call — with
//! expiry-aware refresh shared across concurrent callers — and classifies
//! the response into a typed value or a structured error.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use opdeck_core::{ApiClient, Credential, CredentialUpdate};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let document = json!({
//!     "openapi": "3.1.0",
//!     "paths": {
//!         "/pets": {
//!             "get": {
//!                 "parameters": [ { "name": "limit", "in": "query" } ]
//!             },
//!             "post": {
//!                 "requestBody": { "required": true }
//!             }
//!         }
//!     },
//!     "components": {
//!         "securitySchemes": {
//!             "bearerAuth": { "type": "http", "scheme": "bearer" }
//!         }
//!     },
//!     "security": [ { "bearerAuth": [] } ]
//! });
//!
//! let client = ApiClient::builder()
//!     .with_document(document)
//!     .with_host("api.example.com")
//!     .build()?;
//!
//! client
//!     .set_security(
//!         "bearerAuth",
//!         Credential::new("my-token")
//!             .expires_in(Duration::from_secs(300))
//!             .with_refresh(|| async {
//!                 // fetch a fresh token from the token endpoint...
//!                 Ok(CredentialUpdate::new("fresh-token").expires_in(Duration::from_secs(300)))
//!             }),
//!     )
//!     .await?;
//!
//! // Query parameters arrive as a mapping, bodies as a value.
//! let pets = client
//!     .invoke("get /pets", vec![json!({ "limit": 10 })])
//!     .await?;
//! let created = client
//!     .invoke("post /pets", vec![json!({ "name": "rex" })])
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Argument order
//!
//! Arguments are positional and consumed in a fixed order: one scalar per
//! declared path parameter, then a query mapping (when the operation
//! declares query parameters), then the request body (when declared), then
//! an optional header mapping. Surplus arguments are rejected.
//!
//! # Credentials
//!
//! [`Credential`] values can carry an expiry and an asynchronous refresh
//! callback. A credential observed within 60 seconds of its expiry is
//! renewed before the call; calls racing on the same expired credential
//! share a single refresh invocation.

mod client;

pub use self::client::{
    ApiClient, ApiClientBuilder, ApiClientError, BaseOptions, BoxError, CallOutcome, Credential,
    CredentialMode, CredentialUpdate, FormData, FormField, HttpTransport, OperationDescriptor,
    OperationTable, SKIP_EXTENSION, SchemeDefinition, SecureString, Transport, TransportRequest,
    TransportResponse,
};
