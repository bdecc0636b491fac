// HTTP request and response types

use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// HTTP methods understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    GET,
    HEAD,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl HttpMethod {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "HEAD" => Some(HttpMethod::HEAD),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "PATCH" => Some(HttpMethod::PATCH),
            "DELETE" => Some(HttpMethod::DELETE),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
        }
    }

    /// GET and HEAD never mutate state.
    pub fn is_safe(&self) -> bool {
        matches!(self, HttpMethod::GET | HttpMethod::HEAD)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller on whose behalf a request runs.
///
/// Authentication happens outside the framework; the host attaches the
/// resolved principal to the request before dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Principal {
    #[default]
    Anonymous,
    User { id: String, username: String },
}

impl Principal {
    pub fn user(id: impl Into<String>, username: impl Into<String>) -> Self {
        Principal::User {
            id: id.into(),
            username: username.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Principal::Anonymous => None,
            Principal::User { id, .. } => Some(id),
        }
    }
}

/// HTTP request wrapper
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub query_params: HashMap<String, String>,
    pub principal: Principal,
}

impl HttpRequest {
    /// Create a request. A query string in `path` is split off and parsed.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let (path, query_params) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), parse_query_string(q)),
            None => (path, HashMap::new()),
        };

        Self {
            method: method.into(),
            path,
            headers: HashMap::new(),
            body: Vec::new(),
            query_params,
            principal: Principal::Anonymous,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    /// Parse the request body as JSON
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::InvalidAttribute(e.to_string()))
    }

    /// Decode the body into a field map.
    ///
    /// JSON objects are taken as-is; anything else is read as
    /// `application/x-www-form-urlencoded` with string values.
    pub fn form_fields(&self) -> Result<Map<String, Value>, Error> {
        if self.body.is_empty() {
            return Ok(Map::new());
        }

        let is_json = self
            .header("Content-Type")
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);

        if is_json {
            return match serde_json::from_slice::<Value>(&self.body) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(Error::InvalidAttribute(
                    "request body must be a JSON object".to_string(),
                )),
                Err(e) => Err(Error::InvalidAttribute(e.to_string())),
            };
        }

        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&self.body)
            .map_err(|e| Error::InvalidAttribute(e.to_string()))?;

        Ok(pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect())
    }
}

/// HTTP response wrapper
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn created() -> Self {
        Self::new(201)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_json(&self) -> Result<Value, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Parse a query string into a map of decoded parameters.
///
/// Repeated keys keep the last value.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .unwrap_or_default()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_splits_query() {
        let req = HttpRequest::new("GET", "/items/?start=5&expand=comments%2Cauthor");
        assert_eq!(req.path, "/items/");
        assert_eq!(req.query("start"), Some("5"));
        assert_eq!(req.query("expand"), Some("comments,author"));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = HttpRequest::new("GET", "/").with_header("if-none-match", "\"abc\"");
        assert_eq!(req.header("If-None-Match"), Some("\"abc\""));
        assert_eq!(req.header("Accept"), None);
    }

    #[test]
    fn test_form_fields_urlencoded() {
        let req = HttpRequest::new("POST", "/items/").with_body(b"name=Widget&_method=PUT".to_vec());
        let fields = req.form_fields().unwrap();
        assert_eq!(fields.get("name"), Some(&Value::String("Widget".into())));
        assert_eq!(fields.get("_method"), Some(&Value::String("PUT".into())));
    }

    #[test]
    fn test_form_fields_json() {
        let req = HttpRequest::new("POST", "/items/")
            .with_header("Content-Type", "application/json")
            .with_body(br#"{"name": "Widget", "count": 3}"#.to_vec());
        let fields = req.form_fields().unwrap();
        assert_eq!(fields.get("count"), Some(&Value::from(3)));
    }

    #[test]
    fn test_form_fields_rejects_json_array() {
        let req = HttpRequest::new("POST", "/items/")
            .with_header("Content-Type", "application/json")
            .with_body(b"[1, 2]".to_vec());
        assert!(matches!(req.form_fields(), Err(Error::InvalidAttribute(_))));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!(HttpMethod::from_str("patch"), Some(HttpMethod::PATCH));
        assert_eq!(HttpMethod::from_str("TRACE"), None);
        assert!(HttpMethod::HEAD.is_safe());
        assert!(!HttpMethod::DELETE.is_safe());
    }

    #[test]
    fn test_principal() {
        assert!(Principal::default().is_anonymous());
        let user = Principal::user("7", "grace");
        assert_eq!(user.id(), Some("7"));
        assert!(!user.is_anonymous());
    }
}
