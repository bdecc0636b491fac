// Test client driving a Dispatcher in-process

use serde_json::Value;
use std::collections::HashMap;
use trellis_core::{Dispatcher, HttpMethod, HttpRequest, HttpResponse, Principal};

/// Test client for making requests against a resource tree
#[derive(Clone)]
pub struct TestClient {
    dispatcher: Dispatcher,
    principal: Principal,
}

impl TestClient {
    /// Create a new test client
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            principal: Principal::Anonymous,
        }
    }

    /// Send every request as `principal` unless the request overrides it
    pub fn as_principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(self.request(HttpMethod::GET, path)).await
    }

    /// Make a HEAD request
    pub async fn head(&self, path: &str) -> TestResponse {
        self.send(self.request(HttpMethod::HEAD, path)).await
    }

    /// Make a POST request with form fields
    pub async fn post(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        self.send(self.request(HttpMethod::POST, path).form(fields))
            .await
    }

    /// Make a PUT request with form fields
    pub async fn put(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        self.send(self.request(HttpMethod::PUT, path).form(fields)).await
    }

    /// Make a PATCH request with form fields
    pub async fn patch(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        self.send(self.request(HttpMethod::PATCH, path).form(fields))
            .await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(self.request(HttpMethod::DELETE, path)).await
    }

    /// Start a request carrying the client's principal
    pub fn request(&self, method: HttpMethod, path: &str) -> TestRequestBuilder {
        TestRequestBuilder::new(method, path).principal(self.principal.clone())
    }

    /// Dispatch a built request
    pub async fn send(&self, builder: TestRequestBuilder) -> TestResponse {
        TestResponse::new(self.dispatcher.handle(builder.build()).await)
    }
}

/// Builder for test requests
#[derive(Debug, Clone)]
pub struct TestRequestBuilder {
    method: HttpMethod,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    query_params: Vec<(String, String)>,
    principal: Principal,
}

impl TestRequestBuilder {
    /// Create a new request builder
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            query_params: Vec::new(),
            principal: Principal::Anonymous,
        }
    }

    /// Add a header
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    /// Set the `Accept` header
    pub fn accept(self, value: &str) -> Self {
        self.header("Accept", value)
    }

    /// Set the body
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Set a urlencoded form body
    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = serde_urlencoded::to_string(fields)
            .unwrap_or_default()
            .into_bytes();
        self.headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        self
    }

    /// Set a JSON body
    pub fn json(mut self, data: &Value) -> Self {
        self.body = data.to_string().into_bytes();
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        self
    }

    /// Add a query parameter
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query_params.push((key.to_string(), value.to_string()));
        self
    }

    /// Run the request as `principal`
    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }

    /// Build the request
    pub fn build(self) -> HttpRequest {
        let mut request = HttpRequest::new(self.method.as_str(), self.path)
            .with_body(self.body)
            .with_principal(self.principal);
        for (key, value) in self.headers {
            request = request.with_header(key, value);
        }
        for (key, value) in self.query_params {
            request = request.with_query(key, value);
        }
        request
    }
}

/// Response from a test request
#[derive(Debug, Clone)]
pub struct TestResponse {
    response: HttpResponse,
}

impl TestResponse {
    pub fn new(response: HttpResponse) -> Self {
        Self { response }
    }

    /// The wrapped response
    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    /// Get the status code
    pub fn status(&self) -> u16 {
        self.response.status
    }

    /// Get a header value
    pub fn header(&self, key: &str) -> Option<&str> {
        self.response.header(key)
    }

    /// Get the response body as string
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.response.body.clone()).ok()
    }

    /// Get the response body as JSON
    pub fn body_json(&self) -> Result<Value, String> {
        serde_json::from_slice(&self.response.body)
            .map_err(|e| format!("Serialization error: {}", e))
    }

    /// The envelope's `stat` member
    pub fn stat(&self) -> Option<String> {
        self.body_json()
            .ok()?
            .get("stat")?
            .as_str()
            .map(str::to_string)
    }

    /// The failure envelope's `err.code`
    pub fn error_code(&self) -> Option<u64> {
        self.body_json().ok()?.pointer("/err/code")?.as_u64()
    }
}

impl From<HttpResponse> for TestResponse {
    fn from(response: HttpResponse) -> Self {
        Self::new(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = TestRequestBuilder::new(HttpMethod::GET, "/items/")
            .accept("application/json")
            .query("start", "20")
            .principal(Principal::user("7", "ann"))
            .build();

        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/items/");
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(req.query("start"), Some("20"));
        assert_eq!(req.principal.id(), Some("7"));
    }

    #[test]
    fn test_form_body() {
        let req = TestRequestBuilder::new(HttpMethod::POST, "/items/")
            .form(&[("name", "a b"), ("_method", "PUT")])
            .build();

        let fields = req.form_fields().unwrap();
        assert_eq!(fields["name"], "a b");
        assert_eq!(fields["_method"], "PUT");
    }

    #[test]
    fn test_json_body() {
        let req = TestRequestBuilder::new(HttpMethod::POST, "/items/")
            .json(&serde_json::json!({"name": "x", "count": 2}))
            .build();

        let fields = req.form_fields().unwrap();
        assert_eq!(fields["count"], 2);
    }

    #[test]
    fn test_response_accessors() {
        let response = TestResponse::new(
            HttpResponse::new(404)
                .with_header("Content-Type", "application/json")
                .with_body(br#"{"stat": "fail", "err": {"code": 100, "msg": "x"}}"#.to_vec()),
        );

        assert_eq!(response.status(), 404);
        assert_eq!(response.stat().as_deref(), Some("fail"));
        assert_eq!(response.error_code(), Some(100));
        assert_eq!(response.header("content-type"), Some("application/json"));
    }
}
