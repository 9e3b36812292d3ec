//! The success/error envelope wrapped around every trainer API response.
//!
//! ```json
//! {"status": "success", "message": "OK", "data": {...}, "timestamp": "...", "api_version": "1.0"}
//! ```

use serde::Deserialize;
use serde_json::Value;

use super::error::{ApiError, ApiResult};

pub const STATUS_SUCCESS: &str = "success";

/// Fields checked, in order, for a readable message in an error body.
const ERROR_MESSAGE_FIELDS: [&str; 3] = ["message", "error", "detail"];

#[derive(Debug, Deserialize)]
pub struct Envelope {
  pub status: String,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub data: Value,
  #[serde(default)]
  pub timestamp: Option<Value>,
  #[serde(default)]
  pub api_version: Option<String>,
}

impl Envelope {
  pub fn is_success(&self) -> bool {
    self.status == STATUS_SUCCESS
  }
}

/// Parse a 2xx body and return the enveloped `data`.
pub fn unwrap_payload(body: &[u8]) -> ApiResult<Value> {
  let value: Value = serde_json::from_slice(body)
    .map_err(|e| ApiError::MalformedResponse(format!("Failed to parse API response: {}", e)))?;

  let envelope: Envelope = serde_json::from_value(value)
    .map_err(|e| ApiError::MalformedResponse(format!("Unexpected response envelope: {}", e)))?;

  if !envelope.is_success() {
    let message = envelope
      .message
      .filter(|m| !m.trim().is_empty())
      .unwrap_or_else(|| format!("Request failed with status '{}'", envelope.status));
    return Err(ApiError::Rejected { message });
  }

  Ok(envelope.data)
}

/// Best-effort readable message for a non-2xx response.
///
/// JSON bodies are searched for a message field; other bodies are used as
/// plain text. Empty or unhelpful bodies fall back to `API error: <status>`.
pub fn error_message(status: u16, body: &[u8]) -> String {
  let fallback = || format!("API error: {}", status);

  match serde_json::from_slice::<Value>(body) {
    Ok(value) => ERROR_MESSAGE_FIELDS
      .iter()
      .filter_map(|field| value.get(field).and_then(Value::as_str))
      .map(str::trim)
      .find(|message| !message.is_empty())
      .map(String::from)
      .unwrap_or_else(fallback),
    Err(_) => {
      let text = String::from_utf8_lossy(body);
      let text = text.trim();
      if text.is_empty() {
        fallback()
      } else {
        text.to_string()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_unwrap_success() {
    let body = json!({
      "status": "success",
      "message": "OK",
      "data": [{"id": "c1"}],
      "timestamp": "2026-01-01T00:00:00Z",
      "api_version": "1.0"
    });
    let data = unwrap_payload(body.to_string().as_bytes()).unwrap();
    assert_eq!(data, json!([{"id": "c1"}]));
  }

  #[test]
  fn test_unwrap_missing_data_is_null() {
    let data = unwrap_payload(br#"{"status":"success"}"#).unwrap();
    assert!(data.is_null());
  }

  #[test]
  fn test_error_status_is_rejected() {
    let err = unwrap_payload(br#"{"status":"error","message":"Client not found"}"#).unwrap_err();
    assert!(matches!(err, ApiError::Rejected { ref message } if message == "Client not found"));
  }

  #[test]
  fn test_error_status_without_message() {
    let err = unwrap_payload(br#"{"status":"fail"}"#).unwrap_err();
    assert_eq!(err.to_string(), "Request failed with status 'fail'");
  }

  #[test]
  fn test_bad_json_is_malformed() {
    let err = unwrap_payload(b"<html>oops</html>").unwrap_err();
    assert!(matches!(err, ApiError::MalformedResponse(_)));

    let err = unwrap_payload(br#"{"data": []}"#).unwrap_err();
    assert!(matches!(err, ApiError::MalformedResponse(_)));
  }

  #[test]
  fn test_error_message_from_json_fields() {
    assert_eq!(error_message(400, br#"{"message":"Email taken"}"#), "Email taken");
    assert_eq!(error_message(403, br#"{"error":"Forbidden"}"#), "Forbidden");
    assert_eq!(error_message(422, br#"{"message":"","detail":"bad date"}"#), "bad date");
  }

  #[test]
  fn test_error_message_fallbacks() {
    assert_eq!(error_message(502, b"Bad Gateway\n"), "Bad Gateway");
    assert_eq!(error_message(500, b""), "API error: 500");
    assert_eq!(error_message(500, br#"{"code": 17}"#), "API error: 500");
  }
}
