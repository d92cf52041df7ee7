use std::collections::VecDeque;

use http::Method;
use indexmap::IndexMap;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;
use url::Url;

use super::credential::CredentialMode;
use super::operations::OperationDescriptor;
use super::{ApiClientError, BaseOptions};

/// An outgoing request assembled from positional call arguments.
///
/// Security scheme injections are merged into `headers`/`query` after
/// assembly and before the URL is finalized.
#[derive(Debug)]
pub(super) struct PreparedRequest {
    pub(super) method: Method,
    pub(super) path: String,
    pub(super) headers: IndexMap<String, String>,
    pub(super) query: IndexMap<String, String>,
    pub(super) body: Option<String>,
    pub(super) credential_mode: CredentialMode,
}

impl PreparedRequest {
    /// Consumes the positional arguments in their fixed order: one scalar per
    /// path parameter, then a query mapping (when the operation declares
    /// query parameters), then the body (when declared and the method can
    /// carry one), then a header mapping. Anything further is rejected.
    pub(super) fn from_args(
        operation: &OperationDescriptor,
        args: Vec<Value>,
        base: &BaseOptions,
        allow_cors: bool,
    ) -> Result<Self, ApiClientError> {
        let mut args = VecDeque::from(args);
        let mut headers = base.headers.clone();
        let mut query = IndexMap::new();
        let credential_mode = base.credential_mode.unwrap_or_else(|| {
            if operation.send_cookies {
                CredentialMode::cookie_default(allow_cors)
            } else {
                CredentialMode::Omit
            }
        });

        let mut path = operation.path.clone();
        for name in &operation.path_parameters {
            let Some(value) = args.pop_front().filter(|value| !value.is_null()) else {
                return Err(ApiClientError::MissingParameter { name: name.clone() });
            };
            let Some(scalar) = scalar_to_string(&value) else {
                return Err(ApiClientError::InvalidParameterType { name: name.clone() });
            };
            let encoded = utf8_percent_encode(&scalar, NON_ALPHANUMERIC).to_string();
            path = path.replace(&["{", name, "}"].concat(), &encoded);
        }

        if !operation.query_parameters.is_empty()
            && let Some(argument) = args.pop_front()
            && let Some(map) = argument.as_object()
        {
            for (name, value) in map {
                query.insert(name.clone(), query_value_to_string(name, value)?);
            }
        }

        let mut body = None;
        if operation.has_body && operation.method != Method::GET && operation.method != Method::HEAD
        {
            let argument = args.pop_front();
            if operation.requires_body && argument.as_ref().is_none_or(Value::is_null) {
                return Err(ApiClientError::MissingBody);
            }
            if let Some(value) = argument.filter(|value| !value.is_null()) {
                body = Some(match &value {
                    Value::Object(_) | Value::Array(_) => {
                        headers.insert(
                            "content-type".to_string(),
                            mime::APPLICATION_JSON.to_string(),
                        );
                        serde_json::to_string(&value)?
                    }
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                });
            }
        }

        if let Some(argument) = args.pop_front()
            && let Some(map) = argument.as_object()
        {
            for (name, value) in map {
                if let Some(text) = scalar_to_string(value) {
                    headers.insert(name.to_lowercase(), text);
                }
            }
        }

        if !args.is_empty() {
            return Err(ApiClientError::ExtraParameters);
        }

        Ok(Self {
            method: operation.method.clone(),
            path,
            headers,
            query,
            body,
            credential_mode,
        })
    }

    /// Resolves the absolute URL against the configured base and appends the
    /// accumulated query parameters.
    pub(super) fn url(&self, base_url: &Url) -> Result<Url, ApiClientError> {
        let joined = format!(
            "{}/{}",
            base_url.as_str().trim_end_matches('/'),
            self.path.trim_start_matches('/')
        );
        let mut url = joined.parse::<Url>()?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Coerces a query value to its string form: scalars directly, arrays as a
/// comma-joined list. Objects are rejected.
fn query_value_to_string(name: &str, value: &Value) -> Result<String, ApiClientError> {
    match value {
        Value::Object(_) => Err(ApiClientError::UnsupportedQueryParameterValue {
            name: name.to_string(),
            value: value.clone(),
        }),
        Value::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(query_value_to_string(name, item)?);
            }
            Ok(parts.join(","))
        }
        Value::Null => Ok("null".to_string()),
        other => Ok(scalar_to_string(other).unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn operation(method: Method, path: &str) -> OperationDescriptor {
        OperationDescriptor {
            key: format!("{} {path}", method.as_str().to_lowercase()),
            method,
            path: path.to_string(),
            path_parameters: Vec::new(),
            query_parameters: Vec::new(),
            has_body: false,
            requires_body: false,
            send_cookies: false,
            security: Vec::new(),
        }
    }

    fn base() -> BaseOptions {
        BaseOptions::default()
    }

    #[test]
    fn should_substitute_path_parameters_in_order() {
        let mut get_repo = operation(Method::GET, "/orgs/{orgId}/repos/{repoId}");
        get_repo.path_parameters = vec!["orgId".to_string(), "repoId".to_string()];

        let prepared = PreparedRequest::from_args(
            &get_repo,
            vec![json!("acme"), json!(42)],
            &base(),
            false,
        )
        .unwrap();

        assert_eq!(prepared.path, "/orgs/acme/repos/42");
        assert!(!prepared.path.contains('{'));
        assert!(!prepared.path.contains('}'));
    }

    #[test]
    fn should_percent_encode_path_parameter_values() {
        let mut get_file = operation(Method::GET, "/files/{name}");
        get_file.path_parameters = vec!["name".to_string()];

        let prepared =
            PreparedRequest::from_args(&get_file, vec![json!("a b/c")], &base(), false).unwrap();

        assert_eq!(prepared.path, "/files/a%20b%2Fc");
    }

    #[test]
    fn should_reject_missing_and_composite_path_parameters() {
        let mut get_pet = operation(Method::GET, "/pets/{petId}");
        get_pet.path_parameters = vec!["petId".to_string()];

        let error = PreparedRequest::from_args(&get_pet, vec![], &base(), false).unwrap_err();
        assert!(matches!(
            error,
            ApiClientError::MissingParameter { name } if name == "petId"
        ));

        let error =
            PreparedRequest::from_args(&get_pet, vec![json!(null)], &base(), false).unwrap_err();
        assert!(matches!(error, ApiClientError::MissingParameter { .. }));

        let error = PreparedRequest::from_args(&get_pet, vec![json!({"id": 1})], &base(), false)
            .unwrap_err();
        assert!(matches!(
            error,
            ApiClientError::InvalidParameterType { name } if name == "petId"
        ));
    }

    #[test]
    fn should_flatten_query_mapping() {
        let mut list_pets = operation(Method::GET, "/pets");
        list_pets.query_parameters = vec!["limit".to_string(), "tags".to_string()];

        let prepared = PreparedRequest::from_args(
            &list_pets,
            vec![json!({"limit": 10, "tags": ["dog", "cat"], "verbose": true})],
            &base(),
            false,
        )
        .unwrap();

        assert_eq!(prepared.query.get("limit").map(String::as_str), Some("10"));
        assert_eq!(
            prepared.query.get("tags").map(String::as_str),
            Some("dog,cat")
        );
        assert_eq!(
            prepared.query.get("verbose").map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn should_reject_object_query_values() {
        let mut list_pets = operation(Method::GET, "/pets");
        list_pets.query_parameters = vec!["filter".to_string()];

        let error = PreparedRequest::from_args(
            &list_pets,
            vec![json!({"filter": {"nested": true}})],
            &base(),
            false,
        )
        .unwrap_err();
        assert!(matches!(
            error,
            ApiClientError::UnsupportedQueryParameterValue { name, .. } if name == "filter"
        ));
    }

    #[test]
    fn should_serialize_composite_body_as_json() {
        let mut create_pet = operation(Method::POST, "/pets");
        create_pet.has_body = true;

        let prepared = PreparedRequest::from_args(
            &create_pet,
            vec![json!({"name": "rex"})],
            &base(),
            false,
        )
        .unwrap();

        assert_eq!(prepared.body.as_deref(), Some(r#"{"name":"rex"}"#));
        assert_eq!(
            prepared.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn should_pass_scalar_body_through() {
        let mut upload = operation(Method::POST, "/upload");
        upload.has_body = true;

        let prepared =
            PreparedRequest::from_args(&upload, vec![json!("raw text")], &base(), false).unwrap();

        assert_eq!(prepared.body.as_deref(), Some("raw text"));
        assert!(!prepared.headers.contains_key("content-type"));
    }

    #[test]
    fn should_reject_missing_required_body() {
        let mut create_pet = operation(Method::POST, "/pets");
        create_pet.has_body = true;
        create_pet.requires_body = true;

        let error = PreparedRequest::from_args(&create_pet, vec![], &base(), false).unwrap_err();
        assert!(matches!(error, ApiClientError::MissingBody));

        let error = PreparedRequest::from_args(&create_pet, vec![json!(null)], &base(), false)
            .unwrap_err();
        assert!(matches!(error, ApiClientError::MissingBody));
    }

    #[test]
    fn should_not_consume_body_argument_for_get() {
        let mut get_pets = operation(Method::GET, "/pets");
        get_pets.has_body = true;

        // The single argument lands on the headers slot, not the body.
        let prepared = PreparedRequest::from_args(
            &get_pets,
            vec![json!({"x-trace": "abc"})],
            &base(),
            false,
        )
        .unwrap();

        assert!(prepared.body.is_none());
        assert_eq!(
            prepared.headers.get("x-trace").map(String::as_str),
            Some("abc")
        );
    }

    #[test]
    fn should_merge_caller_headers_over_base_headers() {
        let list_pets = operation(Method::GET, "/pets");
        let mut base = BaseOptions::default();
        base.headers
            .insert("x-client".to_string(), "opdeck".to_string());
        base.headers
            .insert("x-trace".to_string(), "base".to_string());

        let prepared = PreparedRequest::from_args(
            &list_pets,
            vec![json!({"X-Trace": "override"})],
            &base,
            false,
        )
        .unwrap();

        assert_eq!(
            prepared.headers.get("x-client").map(String::as_str),
            Some("opdeck")
        );
        assert_eq!(
            prepared.headers.get("x-trace").map(String::as_str),
            Some("override")
        );
    }

    #[test]
    fn should_reject_extra_arguments() {
        let list_pets = operation(Method::GET, "/pets");

        let error = PreparedRequest::from_args(
            &list_pets,
            vec![json!({"x-trace": "abc"}), json!("surplus")],
            &base(),
            false,
        )
        .unwrap_err();
        assert!(matches!(error, ApiClientError::ExtraParameters));
    }

    #[test]
    fn should_derive_default_credential_mode() {
        let list_pets = operation(Method::GET, "/pets");
        let prepared =
            PreparedRequest::from_args(&list_pets, vec![], &base(), false).unwrap();
        assert_eq!(prepared.credential_mode, CredentialMode::Omit);

        let mut session = operation(Method::GET, "/session");
        session.send_cookies = true;
        let prepared = PreparedRequest::from_args(&session, vec![], &base(), false).unwrap();
        assert_eq!(prepared.credential_mode, CredentialMode::SameOrigin);

        let prepared = PreparedRequest::from_args(&session, vec![], &base(), true).unwrap();
        assert_eq!(prepared.credential_mode, CredentialMode::Include);

        let mut base = BaseOptions::default();
        base.credential_mode = Some(CredentialMode::Include);
        let prepared = PreparedRequest::from_args(&list_pets, vec![], &base, false).unwrap();
        assert_eq!(prepared.credential_mode, CredentialMode::Include);
    }

    #[test]
    fn should_build_url_with_query_parameters() {
        let mut list_pets = operation(Method::GET, "/pets");
        list_pets.query_parameters = vec!["limit".to_string()];

        let prepared = PreparedRequest::from_args(
            &list_pets,
            vec![json!({"limit": 10, "tag": "a b"})],
            &base(),
            false,
        )
        .unwrap();

        let base_url: Url = "https://api.example.com/v1".parse().unwrap();
        let url = prepared.url(&base_url).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/pets?limit=10&tag=a+b");
    }

    #[test]
    fn should_build_url_without_query() {
        let get_pets = operation(Method::GET, "/pets");
        let prepared = PreparedRequest::from_args(&get_pets, vec![], &base(), false).unwrap();

        let base_url: Url = "http://127.0.0.1/".parse().unwrap();
        let url = prepared.url(&base_url).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1/pets");
    }
}
