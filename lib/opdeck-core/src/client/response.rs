use http::StatusCode;
use serde_json::Value;

use super::ApiClientError;
use super::transport::TransportResponse;

/// The classified result of a successful call.
///
/// Status 200 responses are decoded according to their content type. Other
/// success statuses hand back the raw response with its body readers
/// untouched — this asymmetry is part of the documented contract and can be
/// widened with the client's decode-all-success setting.
#[derive(Debug)]
pub enum CallOutcome {
    /// A decoded `application/json` body.
    Json(Value),
    /// A decoded `text/*` body.
    Text(String),
    /// A parsed `multipart/form-data` body.
    Form(FormData),
    /// A 200 response with no decodable content type.
    Empty,
    /// A non-200 success response, body unread.
    Raw(Box<dyn TransportResponse>),
}

impl CallOutcome {
    /// The decoded JSON value, if this outcome is JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Consumes the outcome into its decoded JSON value.
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The decoded text, if this outcome is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The parsed form data, if this outcome is a multipart form.
    pub fn as_form(&self) -> Option<&FormData> {
        match self {
            Self::Form(form) => Some(form),
            _ => None,
        }
    }

    /// Whether the outcome carries no decoded value.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Classifies a transport response into a [`CallOutcome`] or a
/// [`RequestFailed`](ApiClientError::RequestFailed) error.
///
/// Non-success responses always fail; their body is only read to enrich the
/// error message (`message` field of JSON bodies, raw text of `text/*`
/// bodies).
pub(super) async fn interpret(
    response: Box<dyn TransportResponse>,
    decode_all_success: bool,
) -> Result<CallOutcome, ApiClientError> {
    let status = response.status();
    let content_type = response
        .header(http::header::CONTENT_TYPE.as_str())
        .unwrap_or_default();

    if !response.is_ok() {
        let mut message = response.status_text();
        let mut data = None;
        if content_type.starts_with(mime::APPLICATION_JSON.essence_str()) {
            let value = response.json().await?;
            message = value
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| value.to_string(), str::to_string);
            data = Some(value);
        } else if content_type.starts_with("text/") {
            message = response.text().await?;
        }
        return Err(ApiClientError::RequestFailed {
            status,
            message,
            data,
        });
    }

    if status == StatusCode::OK || decode_all_success {
        if content_type.starts_with(mime::APPLICATION_JSON.essence_str()) {
            Ok(CallOutcome::Json(response.json().await?))
        } else if content_type.starts_with("text/") {
            Ok(CallOutcome::Text(response.text().await?))
        } else if content_type.starts_with(mime::MULTIPART_FORM_DATA.essence_str()) {
            Ok(CallOutcome::Form(response.form_data().await?))
        } else {
            Ok(CallOutcome::Empty)
        }
    } else {
        Ok(CallOutcome::Raw(response))
    }
}

/// A parsed `multipart/form-data` response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<FormField>,
}

/// One field of a multipart form: a plain value or an uploaded file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    /// The field name from the part's content disposition.
    pub name: String,
    /// The filename, for file parts.
    pub filename: Option<String>,
    /// The part's own content type, when declared.
    pub content_type: Option<String>,
    /// The part content.
    pub value: String,
}

impl FormData {
    /// Parses a multipart body using the boundary from the content type.
    pub fn parse(content_type: &str, body: &str) -> Result<Self, ApiClientError> {
        let boundary = content_type
            .split(';')
            .find_map(|part| {
                part.trim()
                    .strip_prefix("boundary=")
                    .map(|boundary| boundary.trim_matches('"').to_string())
            })
            .ok_or_else(|| ApiClientError::InvalidMultipart {
                detail: "missing boundary in content type".to_string(),
            })?;

        let marker = format!("--{boundary}");
        let mut fields = Vec::new();
        for part in body.split(&marker).skip(1) {
            let part = part.trim_start_matches("\r\n").trim_start_matches('\n');
            if part.trim() == "--" || part.trim().is_empty() {
                continue;
            }
            if let Some(field) = Self::parse_part(part)? {
                fields.push(field);
            }
        }

        Ok(Self { fields })
    }

    /// Parses one part: headers up to the blank line, then the content.
    fn parse_part(part: &str) -> Result<Option<FormField>, ApiClientError> {
        let lines: Vec<&str> = part.lines().collect();
        if lines.is_empty() {
            return Ok(None);
        }

        let mut name = None;
        let mut filename = None;
        let mut content_type = None;
        let mut content_start = lines.len();

        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                content_start = index + 1;
                break;
            }
            let lowered = line.to_lowercase();
            if lowered.starts_with("content-disposition:") {
                for attribute in line.split(';') {
                    let attribute = attribute.trim();
                    if let Some(value) = attribute.strip_prefix("name=") {
                        name = Some(value.trim_matches('"').to_string());
                    } else if let Some(value) = attribute.strip_prefix("filename=") {
                        filename = Some(value.trim_matches('"').to_string());
                    }
                }
            } else if lowered.starts_with("content-type:")
                && let Some((_, declared)) = line.split_once(':')
            {
                content_type = Some(declared.trim().to_string());
            }
        }

        let name = name.ok_or_else(|| ApiClientError::InvalidMultipart {
            detail: "part without a field name".to_string(),
        })?;
        let value = lines
            .get(content_start..)
            .unwrap_or_default()
            .join("\n")
            .trim_end_matches('\n')
            .to_string();

        Ok(Some(FormField {
            name,
            filename,
            content_type,
            value,
        }))
    }

    /// The value of the first field with the given name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }

    /// All parsed fields, in order of appearance.
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// The number of parsed fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the form has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
