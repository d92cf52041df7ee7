use http::Method;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

/// Extension flag that excludes a path or operation from the table.
///
/// Lets host bookkeeping endpoints stay out of the callable surface.
pub const SKIP_EXTENSION: &str = "x-opdeck-skip";

/// Every HTTP method an operation document may declare, in scan order.
const METHODS: [(&str, Method); 9] = [
    ("head", Method::HEAD),
    ("get", Method::GET),
    ("post", Method::POST),
    ("put", Method::PUT),
    ("delete", Method::DELETE),
    ("connect", Method::CONNECT),
    ("options", Method::OPTIONS),
    ("trace", Method::TRACE),
    ("patch", Method::PATCH),
];

/// Compact per-operation metadata compiled from the document.
///
/// The `path_parameters` order is load-bearing: it fixes the positional
/// argument contract for calls.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    /// The operation key, `"<method> <pathTemplate>"` with a lower-case method.
    pub key: String,
    /// The HTTP method.
    pub method: Method,
    /// The path template, with `{name}` placeholders.
    pub path: String,
    /// Path parameter names in declaration order.
    pub path_parameters: Vec<String>,
    /// Query parameter names.
    pub query_parameters: Vec<String>,
    /// Whether the operation declares a request body.
    pub has_body: bool,
    /// Whether the declared request body is required.
    pub requires_body: bool,
    /// Whether the operation declares cookie parameters (drives the default
    /// cookie-forwarding mode).
    pub send_cookies: bool,
    /// Names of the security schemes the operation requires.
    pub security: Vec<String>,
}

impl OperationDescriptor {
    fn compile(
        method_name: &str,
        method: &Method,
        path: &str,
        operation: &Value,
        global_security: &[String],
    ) -> Self {
        let mut path_parameters = Vec::new();
        let mut query_parameters = Vec::new();
        let mut send_cookies = false;

        if let Some(parameters) = operation.get("parameters").and_then(Value::as_array) {
            for parameter in parameters {
                let Some(name) = parameter.get("name").and_then(Value::as_str) else {
                    warn!(%path, %method_name, "skipping parameter without a name");
                    continue;
                };
                match parameter.get("in").and_then(Value::as_str) {
                    Some("path") => path_parameters.push(name.to_string()),
                    Some("query") => query_parameters.push(name.to_string()),
                    Some("cookie") => send_cookies = true,
                    // Header parameters are supplied through the trailing
                    // headers argument of a call.
                    _ => {}
                }
            }
        }

        let request_body = operation.get("requestBody");
        let has_body = request_body.is_some_and(Value::is_object);
        let requires_body = request_body
            .and_then(|body| body.get("required"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        // An operation-level requirement, even an empty one, wins over the
        // document-level requirement.
        let security = operation.get("security").map_or_else(
            || global_security.to_vec(),
            |requirement| flatten_security(Some(requirement)),
        );

        Self {
            key: format!("{method_name} {path}"),
            method: method.clone(),
            path: path.to_string(),
            path_parameters,
            query_parameters,
            has_body,
            requires_body,
            send_cookies,
            security,
        }
    }
}

/// Immutable mapping from operation key to [`OperationDescriptor`].
///
/// Built once from a validated operation document and shared read-only by
/// every client created from it.
#[derive(Debug, Clone, Default)]
pub struct OperationTable {
    operations: IndexMap<String, OperationDescriptor>,
}

impl OperationTable {
    /// Compiles the callable operations out of the document.
    ///
    /// Never fails: absent or malformed optional fields degrade to empty
    /// collections.
    pub fn compile(document: &Value) -> Self {
        let mut operations = IndexMap::new();
        let global_security = flatten_security(document.get("security"));

        let Some(paths) = document.get("paths").and_then(Value::as_object) else {
            return Self { operations };
        };
        for (path, path_item) in paths {
            if is_skipped(path_item) {
                continue;
            }
            for (method_name, method) in &METHODS {
                let Some(operation) = path_item.get(method_name) else {
                    continue;
                };
                if !operation.is_object() || is_skipped(operation) {
                    continue;
                }
                let descriptor = OperationDescriptor::compile(
                    method_name,
                    method,
                    path,
                    operation,
                    &global_security,
                );
                operations.insert(descriptor.key.clone(), descriptor);
            }
        }

        Self { operations }
    }

    /// Looks up one operation by key.
    pub fn get(&self, key: &str) -> Option<&OperationDescriptor> {
        self.operations.get(key)
    }

    /// Whether the table contains an operation for the key.
    pub fn contains(&self, key: &str) -> bool {
        self.operations.contains_key(key)
    }

    /// Iterates over the operation keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    /// The number of compiled operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

fn is_skipped(object: &Value) -> bool {
    object
        .get(SKIP_EXTENSION)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Flattens a security requirement (a disjunction of alternatives, each a
/// conjunction of scheme names) into the ordered set of names it mentions.
///
/// The runtime applies every scheme it holds a valid credential for; it does
/// not enforce the disjunction/conjunction algebra.
fn flatten_security(requirement: Option<&Value>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let Some(alternatives) = requirement.and_then(Value::as_array) else {
        return names;
    };
    for alternative in alternatives {
        let Some(alternative) = alternative.as_object() else {
            continue;
        };
        for name in alternative.keys() {
            if !names.iter().any(|existing| existing == name) {
                names.push(name.clone());
            }
        }
    }
    names
}
