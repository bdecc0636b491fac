// Error types for the Trellis resource pipeline

use crate::payload::Format;
use crate::{HttpMethod, HttpResponse, HttpStatus};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use thiserror::Error;

/// Message sent to clients for any 5xx failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred";

/// Request-level failures.
///
/// Every variant maps to exactly one HTTP status and one machine-readable
/// error code carried in the failure envelope.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Object does not exist: {0}")]
    NotFound(String),

    #[error("You don't have permission for this: {0}")]
    PermissionDenied(String),

    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),

    #[error("You are not logged in")]
    AuthenticationRequired,

    #[error("One or more fields had errors")]
    InvalidFormData {
        fields: BTreeMap<String, Vec<String>>,
    },

    #[error("Missing attribute: {0}")]
    MissingAttribute(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Method not allowed: {method}")]
    MethodNotAllowed {
        method: String,
        allowed: Vec<HttpMethod>,
    },

    #[error("Not acceptable: {0}")]
    NotAcceptable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl Error {
    /// Build an `InvalidFormData` error from `(field, message)` pairs.
    pub fn invalid_form<I, K, V>(errors: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, message) in errors {
            fields.entry(field.into()).or_default().push(message.into());
        }
        Error::InvalidFormData { fields }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.http_status().code()
    }

    /// Get the HttpStatus enum for this error
    pub fn http_status(&self) -> HttpStatus {
        match self {
            Error::NotFound(_) => HttpStatus::NotFound,
            Error::PermissionDenied(_) => HttpStatus::Forbidden,
            Error::InvalidAttribute(_) => HttpStatus::BadRequest,
            Error::AuthenticationRequired => HttpStatus::Unauthorized,
            Error::InvalidFormData { .. } => HttpStatus::BadRequest,
            Error::MissingAttribute(_) => HttpStatus::BadRequest,
            Error::Conflict(_) => HttpStatus::Conflict,
            Error::MethodNotAllowed { .. } => HttpStatus::MethodNotAllowed,
            Error::NotAcceptable(_) => HttpStatus::NotAcceptable,
            Error::Serialization(_) | Error::Internal(_) => HttpStatus::InternalServerError,
        }
    }

    /// Machine-readable error code placed in `err.code`
    pub fn error_code(&self) -> u32 {
        match self {
            Error::NotFound(_) => 100,
            Error::PermissionDenied(_) => 101,
            Error::InvalidAttribute(_) => 102,
            Error::AuthenticationRequired => 103,
            Error::InvalidFormData { .. } => 105,
            Error::MissingAttribute(_) => 106,
            Error::Conflict(_) => 111,
            Error::MethodNotAllowed { .. } => 200,
            Error::NotAcceptable(_) => 201,
            Error::Serialization(_) | Error::Internal(_) => 1,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.http_status().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.http_status().is_server_error()
    }

    /// Message that is safe to show to the client.
    pub fn public_message(&self) -> String {
        if self.is_server_error() {
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }

    /// Failure envelope: `{"stat": "fail", "err": {...}, "fields": {...}}`
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("stat".to_string(), Value::from("fail"));
        payload.insert(
            "err".to_string(),
            json!({
                "code": self.error_code(),
                "msg": self.public_message(),
            }),
        );

        if let Error::InvalidFormData { fields } = self {
            payload.insert("fields".to_string(), json!(fields));
        }

        Value::Object(payload)
    }

    /// Render the failure envelope as a response in `format`.
    ///
    /// `MethodNotAllowed` also carries the `Allow` header.
    pub fn into_response(self, format: Format) -> HttpResponse {
        let payload = self.to_payload();
        let (format, body) = match format.encode(&payload) {
            Ok(body) => (format, body),
            Err(_) => (
                Format::Json,
                serde_json::to_vec(&payload).unwrap_or_default(),
            ),
        };

        let mut response = HttpResponse::new(self.status_code())
            .with_header("Content-Type", format.media_type().to_header_value())
            .with_body(body);
        if let Error::MethodNotAllowed { allowed, .. } = &self {
            let allow: Vec<&str> = allowed.iter().map(|m| m.as_str()).collect();
            response = response.with_header("Allow", allow.join(", "));
        }
        response
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Failures detected while assembling a resource tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("resource '{parent}' declares two children named '{name}'")]
    DuplicateSibling { parent: String, name: String },

    #[error("capture key '{key}' on resource '{resource}' is already used by an ancestor")]
    DuplicateCaptureKey { resource: String, key: String },

    #[error("field '{field}' on resource '{resource}' refers to unknown resource '{target}'")]
    UnknownRelatedResource {
        resource: String,
        field: String,
        target: String,
    },

    #[error("field '{field}' on resource '{resource}' refers to ambiguous resource '{target}'")]
    AmbiguousRelatedResource {
        resource: String,
        field: String,
        target: String,
    },

    #[error("resource '{resource}' uses unknown field '{field}' as its ETag")]
    UnknownEtagField { resource: String, field: String },

    #[error("invalid base path '{0}'")]
    InvalidBasePath(String),

    #[error("resource '{resource}' serves objects but has no object key or 'id' field")]
    MissingObjectKey { resource: String },

    #[error("resource '{resource}' has item routes but no lookup")]
    MissingLookup { resource: String },

    #[error("resource '{resource}' uses the default list handler but has no query")]
    MissingQuery { resource: String },

    #[error("'{name}' on resource '{resource}' is not a valid field or link name")]
    InvalidFieldName { resource: String, name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::NotFound("x".into()).status_code(), 404);
        assert_eq!(Error::AuthenticationRequired.status_code(), 401);
        assert_eq!(Error::PermissionDenied("x".into()).status_code(), 403);
        assert_eq!(Error::NotAcceptable("x".into()).status_code(), 406);
        assert_eq!(Error::Conflict("x".into()).status_code(), 409);
        assert_eq!(
            Error::MethodNotAllowed {
                method: "DELETE".into(),
                allowed: vec![HttpMethod::GET],
            }
            .status_code(),
            405
        );
        assert_eq!(Error::Internal("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_invalid_form_groups_messages() {
        let err = Error::invalid_form([
            ("name", "This field is required"),
            ("name", "Too short"),
            ("count", "Must be positive"),
        ]);
        let payload = err.to_payload();
        assert_eq!(payload["stat"], "fail");
        assert_eq!(payload["err"]["code"], 105);
        assert_eq!(payload["fields"]["name"].as_array().unwrap().len(), 2);
        assert_eq!(payload["fields"]["count"][0], "Must be positive");
    }

    #[test]
    fn test_method_not_allowed_response_has_allow() {
        let response = Error::MethodNotAllowed {
            method: "DELETE".into(),
            allowed: vec![HttpMethod::GET, HttpMethod::HEAD],
        }
        .into_response(Format::Json);
        assert_eq!(response.status, 405);
        assert_eq!(response.header("allow"), Some("GET, HEAD"));
        assert_eq!(response.body_json().unwrap()["err"]["code"], 200);
    }

    #[test]
    fn test_internal_errors_do_not_leak() {
        let err = Error::Internal("database password is hunter2".into());
        let payload = err.to_payload();
        assert_eq!(payload["err"]["msg"], INTERNAL_ERROR_MESSAGE);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_client_error_message_is_public() {
        let err = Error::NotFound("item 9".into());
        assert!(err.is_client_error());
        assert_eq!(err.to_payload()["err"]["msg"], "Object does not exist: item 9");
    }
}
