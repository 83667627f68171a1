// Wire format of the paste service API (v2.0.0).
//
// Every API response is a JSON object with a `status` field. Success looks
// like `{"status":"success","data":...}` and errors look like
// `{"status":"error","message":...,"error_id":...}`. The server is PHP, so
// empty maps arrive as `[]` and numbers sometimes arrive as strings; the
// helpers at the bottom of this file absorb both.

use crate::error::{FbError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Parse an API response body. `http_status` is checked after the JSON
/// shape so that server-side error messages win over a bare status code.
pub fn parse_envelope<T: DeserializeOwned>(http_status: u16, body: &str) -> Result<T> {
    let value: Value = serde_json::from_str(body)
        .map_err(|_| FbError::protocol(format!("Invalid response:\n{}", body)))?;

    match value.get("status").and_then(Value::as_str) {
        Some("error") => {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            let error_id = value
                .get("error_id")
                .and_then(Value::as_str)
                .unwrap_or("client-internal/invalid-response");
            return Err(FbError::api(message, error_id));
        }
        Some("success") => {}
        _ => return Err(FbError::protocol("Request failed or invalid response")),
    }

    if http_status != 200 {
        return Err(FbError::protocol(format!(
            "Invalid HTTP response code: {}",
            http_status
        )));
    }

    let data = value.get("data").cloned().unwrap_or(Value::Null);
    serde_json::from_value(data)
        .map_err(|e| FbError::protocol(format!("Unexpected response data: {}", e)))
}

/// Payload of `/file/upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFiles {
    pub ids: Vec<String>,
    pub urls: Vec<String>,
}

/// Payload of `/file/delete`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteOutcome {
    #[serde(default, deserialize_with = "php_map")]
    pub errors: BTreeMap<String, DeleteFailure>,
    #[serde(default, deserialize_with = "php_map")]
    pub deleted: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeleteFailure {
    pub id: String,
    pub reason: String,
}

/// Payload of `/file/create_multipaste`.
#[derive(Debug, Clone, Deserialize)]
pub struct Multipaste {
    pub url: String,
    #[serde(default)]
    pub url_id: Option<String>,
}

/// Payload of `/user/create_apikey`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewApikey {
    pub new_key: String,
}

/// Accept a JSON object, an empty array or null as a map.
pub(crate) fn php_map<'de, D, V>(deserializer: D) -> std::result::Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: DeserializeOwned,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(BTreeMap::new()),
        Value::Array(items) if items.is_empty() => Ok(BTreeMap::new()),
        other @ Value::Object(_) => serde_json::from_value(other).map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("expected object, got {}", other))),
    }
}

/// Accept `123` as well as `"123"`.
pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| D::Error::custom(format!("expected unsigned integer, got {}", n))),
        Value::String(s) => s.trim().parse().map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("expected integer, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let body = r#"{"status":"success","data":{"ids":["abc"],"urls":["https://p/abc/"]}}"#;
        let files: UploadedFiles = parse_envelope(200, body).unwrap();
        assert_eq!(files.ids, vec!["abc"]);
        assert_eq!(files.urls, vec!["https://p/abc/"]);
    }

    #[test]
    fn test_error_envelope_carries_error_id() {
        let body = r#"{"status":"error","message":"Login failed","error_id":"user/login-failed"}"#;
        let err = parse_envelope::<Value>(401, body).unwrap_err();
        assert_eq!(err.kind(), "user/login-failed");
    }

    #[test]
    fn test_malformed_responses_are_protocol_errors() {
        let not_json = parse_envelope::<Value>(200, "<html>oops</html>").unwrap_err();
        assert!(matches!(not_json, FbError::Protocol { .. }));

        let bad_status = parse_envelope::<Value>(200, r#"{"status":"maybe"}"#).unwrap_err();
        assert!(matches!(bad_status, FbError::Protocol { .. }));

        let bad_code =
            parse_envelope::<Value>(500, r#"{"status":"success","data":null}"#).unwrap_err();
        assert_eq!(
            bad_code.to_string(),
            "Invalid response: Invalid HTTP response code: 500"
        );

        let wrong_shape =
            parse_envelope::<UploadedFiles>(200, r#"{"status":"success","data":[]}"#).unwrap_err();
        assert!(matches!(wrong_shape, FbError::Protocol { .. }));
    }

    #[test]
    fn test_delete_outcome_accepts_php_empty_array() {
        let body = r#"{"status":"success","data":{"errors":[],"deleted":{"abc":{"id":"abc"}}}}"#;
        let outcome: DeleteOutcome = parse_envelope(200, body).unwrap();
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.deleted.len(), 1);

        let body = r#"{"status":"success","data":{"errors":{"x":{"id":"x","reason":"wrong owner"}},"deleted":[]}}"#;
        let outcome: DeleteOutcome = parse_envelope(200, body).unwrap();
        assert_eq!(outcome.errors["x"].reason, "wrong owner");
    }
}
