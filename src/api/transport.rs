//! HTTP transport used by the dispatcher.
//!
//! The dispatcher only sees [`HttpRequest`] and [`HttpResponse`]. Anything
//! that can move those over the wire implements [`Transport`]; production
//! code uses [`ReqwestTransport`].

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// HTTP methods understood by the trainer API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Method {
  #[default]
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
    }
  }

  /// Anything other than GET changes server state.
  pub fn is_mutation(&self) -> bool {
    !matches!(self, Method::Get)
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<Method> for reqwest::Method {
  fn from(method: Method) -> Self {
    match method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Patch => reqwest::Method::PATCH,
      Method::Delete => reqwest::Method::DELETE,
    }
  }
}

// ============================================================================
// Request bodies
// ============================================================================

/// One field of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
  pub name: String,
  pub file_name: Option<String>,
  pub mime: Option<String>,
  pub data: Vec<u8>,
}

/// Multipart form, used for OCR image uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
  parts: Vec<MultipartPart>,
}

impl MultipartForm {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a file field.
  pub fn file(
    mut self,
    name: impl Into<String>,
    file_name: impl Into<String>,
    mime: impl Into<String>,
    data: Vec<u8>,
  ) -> Self {
    self.parts.push(MultipartPart {
      name: name.into(),
      file_name: Some(file_name.into()),
      mime: Some(mime.into()),
      data,
    });
    self
  }

  /// Add a plain text field.
  pub fn parts(&self) -> &[MultipartPart] {
    &self.parts
  }

  fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    for part in &self.parts {
      hasher.update(part.name.as_bytes());
      hasher.update([0u8]);
      hasher.update(part.file_name.as_deref().unwrap_or_default().as_bytes());
      hasher.update([0u8]);
      hasher.update(&part.data);
    }
    format!("multipart:{}", hex::encode(hasher.finalize()))
  }
}

/// Body of an outgoing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
  #[default]
  Empty,
  Json(Value),
  Multipart(MultipartForm),
}

impl RequestBody {
  /// Serialize `value` into a JSON body.
  pub fn json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Self> {
    Ok(RequestBody::Json(serde_json::to_value(value)?))
  }

  pub fn is_multipart(&self) -> bool {
    matches!(self, RequestBody::Multipart(_))
  }

  /// Serialized form of the body, used as part of the request identity.
  pub fn fingerprint(&self) -> String {
    match self {
      RequestBody::Empty => String::new(),
      RequestBody::Json(value) => value.to_string(),
      RequestBody::Multipart(form) => form.fingerprint(),
    }
  }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpRequest {
  pub method: Method,
  pub url: String,
  pub headers: Vec<(String, String)>,
  pub body: RequestBody,
}

impl HttpRequest {
  /// Look up a header value (case-insensitive).
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

impl HttpResponse {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      body: body.into(),
    }
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// A request that never produced an HTTP response (connection refused,
/// DNS failure, timeout, broken body stream), or one that could not be
/// built at all.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
  message: String,
  /// The request itself is malformed; sending it again cannot succeed.
  invalid_request: bool,
  #[source]
  source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      invalid_request: false,
      source: None,
    }
  }

  pub fn with_source(
    message: impl Into<String>,
    source: impl std::error::Error + Send + Sync + 'static,
  ) -> Self {
    Self {
      source: Some(Box::new(source)),
      ..Self::new(message)
    }
  }

  /// The request could not be built (bad header, MIME type or body).
  pub fn invalid_request(
    message: impl Into<String>,
    source: impl std::error::Error + Send + Sync + 'static,
  ) -> Self {
    Self {
      invalid_request: true,
      ..Self::with_source(message, source)
    }
  }

  pub fn is_invalid_request(&self) -> bool {
    self.invalid_request
  }
}

/// Sends a single HTTP request. Implementations must not retry.
pub trait Transport: Send + Sync {
  fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>>;
}

// ============================================================================
// reqwest implementation
// ============================================================================

/// Transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl ReqwestTransport {
  pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
      builder = builder.timeout(timeout);
    }

    let client = builder
      .build()
      .map_err(|e| TransportError::with_source(format!("Failed to create HTTP client: {}", e), e))?;

    Ok(Self { client })
  }

  async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let HttpRequest {
      method,
      url,
      headers,
      body,
    } = request;

    let mut builder = self.client.request(method.into(), &url);
    for (name, value) in &headers {
      builder = builder.header(name.as_str(), value.as_str());
    }

    builder = match body {
      RequestBody::Empty => builder,
      RequestBody::Json(value) => {
        let bytes = serde_json::to_vec(&value)
          .map_err(|e| TransportError::invalid_request(format!("Failed to encode body: {}", e), e))?;
        builder.body(bytes)
      }
      RequestBody::Multipart(form) => builder.multipart(into_reqwest_form(form)?),
    };

    let response = builder.send().await.map_err(|e| {
      let message = format!("{} {} failed: {}", method, url, e);
      if e.is_builder() {
        TransportError::invalid_request(message, e)
      } else {
        TransportError::with_source(message, e)
      }
    })?;

    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(|e| {
      TransportError::with_source(format!("Failed to read response from {}: {}", url, e), e)
    })?;

    Ok(HttpResponse::new(status, body.to_vec()))
  }
}

impl Transport for ReqwestTransport {
  fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
    Box::pin(self.execute(request))
  }
}

fn into_reqwest_form(form: MultipartForm) -> Result<reqwest::multipart::Form, TransportError> {
  let mut out = reqwest::multipart::Form::new();
  for part in form.parts {
    let mut field = reqwest::multipart::Part::bytes(part.data);
    if let Some(file_name) = part.file_name {
      field = field.file_name(file_name);
    }
    if let Some(mime) = part.mime {
      field = field
        .mime_str(&mime)
        .map_err(|e| TransportError::invalid_request(format!("Invalid mime type {}: {}", mime, e), e))?;
    }
    out = out.part(part.name, field);
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn request(method: Method, url: String, body: RequestBody) -> HttpRequest {
    HttpRequest {
      method,
      url,
      headers: vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("X-API-Key".to_string(), "test-key".to_string()),
      ],
      body,
    }
  }

  #[test]
  fn test_method_mutation() {
    assert!(!Method::Get.is_mutation());
    assert!(Method::Post.is_mutation());
    assert!(Method::Delete.is_mutation());
    assert_eq!(Method::Patch.to_string(), "PATCH");
  }

  #[test]
  fn test_header_lookup_is_case_insensitive() {
    let req = request(Method::Get, "http://x".into(), RequestBody::Empty);
    assert_eq!(req.header("x-api-key"), Some("test-key"));
    assert_eq!(req.header("authorization"), None);
  }

  #[test]
  fn test_fingerprint_differs_by_body() {
    let a = RequestBody::Json(json!({"name": "Ana"}));
    let b = RequestBody::Json(json!({"name": "Ben"}));
    assert_eq!(RequestBody::Empty.fingerprint(), "");
    assert_ne!(a.fingerprint(), b.fingerprint());

    let img = RequestBody::Multipart(MultipartForm::new().file("image", "a.png", "image/png", vec![1, 2]));
    assert!(img.fingerprint().starts_with("multipart:"));
  }

  #[tokio::test]
  async fn test_reqwest_transport_sends_headers_and_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/clients"))
      .and(header("x-api-key", "test-key"))
      .and(body_json(json!({"name": "Ana"})))
      .respond_with(ResponseTemplate::new(201).set_body_string("created"))
      .expect(1)
      .mount(&server)
      .await;

    let transport = ReqwestTransport::new(Some(Duration::from_secs(5))).unwrap();
    let response = transport
      .send(request(
        Method::Post,
        format!("{}/clients", server.uri()),
        RequestBody::Json(json!({"name": "Ana"})),
      ))
      .await
      .unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(response.body, b"created".to_vec());
  }

  #[tokio::test]
  async fn test_reqwest_transport_passes_error_statuses_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/workouts"))
      .respond_with(ResponseTemplate::new(401))
      .mount(&server)
      .await;

    let transport = ReqwestTransport::new(None).unwrap();
    let response = transport
      .send(request(
        Method::Get,
        format!("{}/workouts", server.uri()),
        RequestBody::Empty,
      ))
      .await
      .unwrap();

    assert_eq!(response.status, 401);
    assert!(!response.is_success());
  }

  #[tokio::test]
  async fn test_reqwest_transport_uploads_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/ocr/process"))
      .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
      .expect(1)
      .mount(&server)
      .await;

    let transport = ReqwestTransport::new(None).unwrap();
    let form = MultipartForm::new().file("image", "log.jpg", "image/jpeg", vec![0xff, 0xd8, 0xff]);
    let response = transport
      .send(HttpRequest {
        method: Method::Post,
        url: format!("{}/ocr/process", server.uri()),
        headers: vec![],
        body: RequestBody::Multipart(form),
      })
      .await
      .unwrap();

    assert_eq!(response.status, 200);
  }

  #[tokio::test]
  async fn test_connection_failure_is_transport_error() {
    let transport = ReqwestTransport::new(Some(Duration::from_secs(2))).unwrap();
    let result = transport
      .send(request(
        Method::Get,
        "http://127.0.0.1:1/clients".to_string(),
        RequestBody::Empty,
      ))
      .await;

    let err = result.unwrap_err();
    assert!(!err.is_invalid_request());
  }

  #[tokio::test]
  async fn test_unbuildable_requests_are_invalid() {
    let transport = ReqwestTransport::new(None).unwrap();

    let mut bad_header = request(Method::Get, "http://127.0.0.1:1/clients".into(), RequestBody::Empty);
    bad_header.headers.push(("bad header".to_string(), "x".to_string()));
    let err = transport.send(bad_header).await.unwrap_err();
    assert!(err.is_invalid_request());

    let form = MultipartForm::new().file("image", "log.jpg", "not a mime type", vec![1]);
    let bad_mime = request(
      Method::Post,
      "http://127.0.0.1:1/ocr/process".into(),
      RequestBody::Multipart(form),
    );
    let err = transport.send(bad_mime).await.unwrap_err();
    assert!(err.is_invalid_request());
  }
}
