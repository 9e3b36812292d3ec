//! Scripted transport for tests.

use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::transport::{HttpRequest, HttpResponse, Transport, TransportError};

/// Wrap `data` in a success envelope.
pub fn success(data: Value) -> Value {
  json!({
    "status": "success",
    "message": "OK",
    "data": data,
    "timestamp": "2026-01-01T00:00:00Z",
    "api_version": "1.0"
  })
}

enum Scripted {
  Response(HttpResponse),
  NetworkError,
  InvalidRequest,
}

#[derive(Default)]
struct MockState {
  script: VecDeque<Scripted>,
  requests: Vec<HttpRequest>,
}

/// Transport that replays queued responses in order and records every
/// request it sees. Runs out of script → network error.
#[derive(Clone, Default)]
pub struct MockTransport {
  state: Arc<Mutex<MockState>>,
}

impl MockTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push_success(&self, data: Value) {
    self.push_status(200, success(data));
  }

  pub fn push_status(&self, status: u16, body: Value) {
    self.push_raw(status, body.to_string());
  }

  pub fn push_raw(&self, status: u16, body: impl Into<Vec<u8>>) {
    self.push(Scripted::Response(HttpResponse::new(status, body)));
  }

  pub fn push_no_content(&self) {
    self.push_raw(204, Vec::new());
  }

  pub fn push_network_error(&self) {
    self.push(Scripted::NetworkError);
  }

  pub fn push_invalid_request(&self) {
    self.push(Scripted::InvalidRequest);
  }

  fn push(&self, item: Scripted) {
    self.state.lock().unwrap().script.push_back(item);
  }

  pub fn calls(&self) -> usize {
    self.state.lock().unwrap().requests.len()
  }

  pub fn requests(&self) -> Vec<HttpRequest> {
    self.state.lock().unwrap().requests.clone()
  }
}

impl Transport for MockTransport {
  fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
    let next = {
      let mut state = self.state.lock().unwrap();
      state.requests.push(request);
      state.script.pop_front()
    };

    Box::pin(async move {
      match next {
        Some(Scripted::Response(response)) => Ok(response),
        Some(Scripted::NetworkError) => Err(TransportError::new("connection refused")),
        Some(Scripted::InvalidRequest) => Err(TransportError::invalid_request(
          "invalid header value",
          std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid header value"),
        )),
        None => Err(TransportError::new("no scripted response left")),
      }
    })
  }
}
