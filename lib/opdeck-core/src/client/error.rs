use http::StatusCode;

/// Errors that can occur when compiling or invoking client operations.
///
/// Argument and security errors (`UnknownScheme` through `ExtraParameters`)
/// are raised before any transport call and abort the call with no side
/// effects. `RequestFailed` is raised after an unsuccessful response.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum ApiClientError {
    /// HTTP client error from the underlying reqwest transport.
    ReqwestError(reqwest::Error),

    /// URL parsing error when resolving the request URL against the base.
    UrlError(url::ParseError),

    /// Invalid HTTP header name.
    InvalidHeaderName(http::header::InvalidHeaderName),

    /// Invalid HTTP header value.
    InvalidHeaderValue(http::header::InvalidHeaderValue),

    /// JSON serialization/deserialization error for bodies and responses.
    JsonError(serde_json::Error),

    /// The operation key is not present in the compiled operation table.
    #[display("Unknown operation: {key}")]
    #[from(skip)]
    UnknownOperation {
        /// The operation key that was looked up (`"<method> <path>"`).
        key: String,
    },

    /// The security scheme name is not declared in the document.
    #[display("Unknown security scheme: {name}")]
    #[from(skip)]
    UnknownScheme {
        /// The undeclared scheme name.
        name: String,
    },

    /// The security scheme's type/location combination cannot be injected.
    #[display("Don't know how to handle security scheme '{name}': {detail}")]
    #[from(skip)]
    UnsupportedScheme {
        /// The scheme name as declared in the document.
        name: String,
        /// What made the scheme unusable.
        detail: String,
    },

    /// A cookie-forwarding mode string could not be parsed.
    #[display("Invalid credentials mode: {value}")]
    #[from(skip)]
    InvalidCredentialMode {
        /// The value that failed to parse.
        value: String,
    },

    /// A required path parameter was absent or null.
    #[display("Value for parameter '{name}' is missing")]
    #[from(skip)]
    MissingParameter {
        /// The path parameter name.
        name: String,
    },

    /// A path parameter received a composite (object/array) value.
    #[display("Path parameter '{name}' must be a scalar value")]
    #[from(skip)]
    InvalidParameterType {
        /// The path parameter name.
        name: String,
    },

    /// The operation requires a request body and none was provided.
    #[display("Body is required")]
    #[from(skip)]
    MissingBody,

    /// More positional arguments were supplied than the operation consumes.
    #[display("Extra parameters were provided")]
    #[from(skip)]
    ExtraParameters,

    /// A query parameter received an object value.
    #[display("Unsupported query parameter value for '{name}': objects are not supported. Got: {value}")]
    #[from(skip)]
    UnsupportedQueryParameterValue {
        /// The query parameter name.
        name: String,
        /// The unsupported value.
        value: serde_json::Value,
    },

    /// A credential refresh callback failed.
    ///
    /// Every call awaiting the same in-flight refresh observes this error;
    /// the credential entry is left as it was so a later call may retry.
    #[display("Refreshing credentials for security scheme '{scheme}' failed: {message}")]
    #[from(skip)]
    RefreshFailed {
        /// The security scheme whose refresh failed.
        scheme: String,
        /// The callback's error message.
        message: String,
    },

    /// A multipart response body could not be parsed.
    #[display("Invalid multipart response: {detail}")]
    #[from(skip)]
    InvalidMultipart {
        /// What made the body unparsable.
        detail: String,
    },

    /// The server answered with a non-success status.
    #[display("Request failed with status {status}: {message}")]
    #[from(skip)]
    RequestFailed {
        /// The response status code.
        status: StatusCode,
        /// The status line, or the body-derived message for JSON and text
        /// responses.
        message: String,
        /// The decoded body for `application/json` responses.
        data: Option<serde_json::Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_client_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<ApiClientError>();
        assert_sync::<ApiClientError>();
    }

    #[test]
    fn test_argument_error_messages() {
        let error = ApiClientError::MissingParameter {
            name: "petId".to_string(),
        };
        assert_eq!(error.to_string(), "Value for parameter 'petId' is missing");

        let error = ApiClientError::InvalidParameterType {
            name: "petId".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Path parameter 'petId' must be a scalar value"
        );

        assert_eq!(ApiClientError::MissingBody.to_string(), "Body is required");
        assert_eq!(
            ApiClientError::ExtraParameters.to_string(),
            "Extra parameters were provided"
        );
    }

    #[test]
    fn test_request_failed_message() {
        let error = ApiClientError::RequestFailed {
            status: StatusCode::UNAUTHORIZED,
            message: "unauthorized".to_string(),
            data: None,
        };
        assert_eq!(
            error.to_string(),
            "Request failed with status 401 Unauthorized: unauthorized"
        );
    }
}
