//! Header redaction for audit rows
//!
//! `Authorization` values are replaced with a fixed placeholder before a
//! header map is persisted. The match is case-insensitive; every other
//! header is preserved verbatim.

const REDACTED_VALUE: &str = "Bearer ***redacted***";

/// Redact a header map into the JSON shape stored in `request_headers` /
/// `response_headers`: an object of string arrays, mirroring how HTTP
/// allows a header name to repeat.
pub fn redact_headers(headers: &http::HeaderMap) -> serde_json::Value {
    let mut out = serde_json::Map::new();

    for name in headers.keys() {
        let values: Vec<serde_json::Value> = headers
            .get_all(name)
            .iter()
            .map(|v| {
                if name.as_str().eq_ignore_ascii_case("authorization") {
                    serde_json::Value::String(REDACTED_VALUE.to_string())
                } else {
                    serde_json::Value::String(v.to_str().unwrap_or("").to_string())
                }
            })
            .collect();

        out.insert(name.as_str().to_string(), serde_json::Value::Array(values));
    }

    serde_json::Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderMap, HeaderValue, AUTHORIZATION};

    #[test]
    fn redacts_authorization_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret-xyz"));
        headers.insert("X-Request-Id", HeaderValue::from_static("abc-123"));

        let redacted = redact_headers(&headers);

        assert_eq!(
            redacted["Authorization"],
            serde_json::json!(["Bearer ***redacted***"])
        );
        assert_eq!(redacted["x-request-id"], serde_json::json!(["abc-123"]));

        let serialized = serde_json::to_string(&redacted).unwrap();
        assert!(!serialized.contains("secret-xyz"));
    }

    #[test]
    fn preserves_non_auth_headers_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let redacted = redact_headers(&headers);
        assert_eq!(
            redacted["content-type"],
            serde_json::json!(["application/json"])
        );
    }

    #[test]
    fn empty_headers_produce_empty_object() {
        let headers = HeaderMap::new();
        let redacted = redact_headers(&headers);
        assert_eq!(redacted, serde_json::json!({}));
    }
}
