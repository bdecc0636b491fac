// Test assertions for dispatcher responses

use crate::TestResponse;
use serde_json::Value;
use trellis_core::{HttpResponse, HttpStatus};

/// Assert that a response has a specific status code
pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status();
    assert_eq!(
        actual,
        expected,
        "Expected status {}, got {}. Body: {}",
        expected,
        actual,
        response.body_string().unwrap_or_default()
    );
}

/// Assert that a raw response has a specific HTTP status
pub fn assert_http_status(response: &HttpResponse, expected: HttpStatus) {
    assert_eq!(
        response.status,
        expected.code(),
        "Expected status {}, got {}",
        expected.code(),
        response.status
    );
}

/// Assert that a response has a specific header
pub fn assert_header(response: &TestResponse, key: &str, expected: &str) {
    let actual = response.header(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{}' to be '{}', got {:?}",
        key,
        expected,
        actual
    );
}

/// Assert that a response does not carry a header
pub fn assert_no_header(response: &TestResponse, key: &str) {
    let actual = response.header(key);
    assert!(
        actual.is_none(),
        "Expected no '{}' header, got {:?}",
        key,
        actual
    );
}

/// Assert the envelope's `stat` member
pub fn assert_stat(response: &TestResponse, expected: &str) {
    let actual = response.stat();
    assert_eq!(
        actual.as_deref(),
        Some(expected),
        "Expected stat '{}', got {:?}",
        expected,
        actual
    );
}

/// Assert a failure envelope with the given status and `err.code`
pub fn assert_failure(response: &TestResponse, status: u16, code: u64) {
    assert_status(response, status);
    assert_stat(response, "fail");
    assert_eq!(
        response.error_code(),
        Some(code),
        "Expected error code {}, got {:?}",
        code,
        response.error_code()
    );
}

/// Assert the JSON value at a pointer such as `/item/links/self/href`
pub fn assert_json_pointer(response: &TestResponse, pointer: &str, expected: &Value) {
    let body = response
        .body_json()
        .unwrap_or_else(|e| panic!("Response body is not JSON: {}", e));
    let actual = body.pointer(pointer);
    assert_eq!(
        actual,
        Some(expected),
        "Expected {} at '{}', got {:?}",
        expected,
        pointer,
        actual
    );
}

/// Assert that a response body contains a string
pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.body_string().unwrap_or_default();
    assert!(
        body.contains(expected),
        "Expected body to contain '{}', but it didn't. Body: {}",
        expected,
        body
    );
}

/// Assert that a response is successful (2xx status)
pub fn assert_success(response: &TestResponse) {
    let status = response.status();
    assert!(
        (200..300).contains(&status),
        "Expected successful status (2xx), got {}",
        status
    );
}

/// Assert that a response is a client error (4xx status)
pub fn assert_client_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (400..500).contains(&status),
        "Expected client error status (4xx), got {}",
        status
    );
}

/// Assert that a response is a server error (5xx status)
pub fn assert_server_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (500..600).contains(&status),
        "Expected server error status (5xx), got {}",
        status
    );
}

/// Assert the negotiated `Content-Type`
pub fn assert_content_type(response: &TestResponse, expected: &str) {
    let content_type = response.header("Content-Type");
    assert!(
        content_type.is_some_and(|ct| ct.starts_with(expected)),
        "Expected content type '{}', got {:?}",
        expected,
        content_type
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_response(status: u16, body: &str) -> TestResponse {
        TestResponse::new(
            HttpResponse::new(status)
                .with_header("Content-Type", "application/json")
                .with_body(body.as_bytes().to_vec()),
        )
    }

    #[test]
    fn test_assert_status() {
        let response = create_test_response(200, r#"{"stat": "ok"}"#);
        assert_status(&response, 200);
        assert_stat(&response, "ok");
        assert_success(&response);
    }

    #[test]
    fn test_assert_failure() {
        let response = create_test_response(
            403,
            r#"{"stat": "fail", "err": {"code": 101, "msg": "Permission denied"}}"#,
        );
        assert_failure(&response, 403, 101);
        assert_client_error(&response);
    }

    #[test]
    #[should_panic(expected = "Expected error code 100")]
    fn test_assert_failure_wrong_code() {
        let response = create_test_response(
            404,
            r#"{"stat": "fail", "err": {"code": 101, "msg": "x"}}"#,
        );
        assert_failure(&response, 404, 100);
    }

    #[test]
    fn test_assert_json_pointer() {
        let response = create_test_response(
            200,
            r#"{"stat": "ok", "item": {"links": {"self": {"href": "/items/1/"}}}}"#,
        );
        assert_json_pointer(&response, "/item/links/self/href", &json!("/items/1/"));
        assert_body_contains(&response, "/items/1/");
    }

    #[test]
    fn test_assert_headers() {
        let response = create_test_response(200, "{}");
        assert_header(&response, "Content-Type", "application/json");
        assert_content_type(&response, "application/json");
        assert_no_header(&response, "ETag");
    }

    #[test]
    fn test_assert_server_error() {
        let response = create_test_response(500, "{}");
        assert_server_error(&response);
        assert_http_status(response.response(), HttpStatus::InternalServerError);
    }
}
