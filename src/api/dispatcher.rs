//! Request dispatcher for the trainer API.
//!
//! Turns one logical operation into an HTTP exchange:
//! 1. Serve fresh cached results for GET requests
//! 2. Attach the API key, bearer token and content type
//! 3. On 401, raise one refresh signal and resend once with the new token
//! 4. Unwrap the response envelope and flatten known collection shapes
//! 5. Retry network failures with a fixed delay
//! 6. Invalidate related cache entries after a successful mutation

use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::auth::AuthCoordinator;
use super::envelope;
use super::error::{ApiError, ApiResult};
use super::rules::{self, EndpointRules};
use super::transport::{HttpRequest, HttpResponse, Method, RequestBody, Transport};
use crate::cache::{CacheKey, ResponseCache};

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

const STATUS_NO_CONTENT: u16 = 204;
const STATUS_UNAUTHORIZED: u16 = 401;

/// Fixed-delay retry budget for network failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Extra attempts after the first one.
  pub retries: u32,
  pub delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      retries: DEFAULT_RETRIES,
      delay: DEFAULT_RETRY_DELAY,
    }
  }
}

/// Per-request options. Unset retry values fall back to the dispatcher's
/// [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
  pub method: Method,
  pub body: RequestBody,
  pub headers: Vec<(String, String)>,
  /// Store the result of a GET. Ignored for other methods.
  pub cache: bool,
  /// Bypass the cache lookup; a successful GET still refreshes the entry.
  pub skip_cache: bool,
  pub retries: Option<u32>,
  pub retry_delay: Option<Duration>,
}

impl Default for RequestOptions {
  fn default() -> Self {
    Self {
      method: Method::Get,
      body: RequestBody::Empty,
      headers: Vec::new(),
      cache: true,
      skip_cache: false,
      retries: None,
      retry_delay: None,
    }
  }
}

impl RequestOptions {
  pub fn get() -> Self {
    Self::default()
  }

  pub fn post(body: RequestBody) -> Self {
    Self::with_method(Method::Post, body)
  }

  pub fn put(body: RequestBody) -> Self {
    Self::with_method(Method::Put, body)
  }

  pub fn patch(body: RequestBody) -> Self {
    Self::with_method(Method::Patch, body)
  }

  pub fn delete() -> Self {
    Self::with_method(Method::Delete, RequestBody::Empty)
  }

  fn with_method(method: Method, body: RequestBody) -> Self {
    Self {
      method,
      body,
      ..Self::default()
    }
  }

  pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn without_cache(mut self) -> Self {
    self.cache = false;
    self
  }

  pub fn skip_cache(mut self) -> Self {
    self.skip_cache = true;
    self
  }

  pub fn retries(mut self, retries: u32) -> Self {
    self.retries = Some(retries);
    self
  }

  pub fn retry_delay(mut self, delay: Duration) -> Self {
    self.retry_delay = Some(delay);
    self
  }
}

/// Data-access entry point for the trainer API.
///
/// Cheap to clone; clones share the transport, cache and auth coordinator.
#[derive(Clone)]
pub struct Dispatcher {
  base_url: Arc<str>,
  api_key: Option<Arc<str>>,
  transport: Arc<dyn Transport>,
  cache: ResponseCache,
  auth: Arc<AuthCoordinator>,
  rules: Arc<EndpointRules>,
  retry: RetryPolicy,
  caching: bool,
}

impl Dispatcher {
  pub fn builder(base_url: impl Into<String>, transport: impl Transport + 'static) -> DispatcherBuilder {
    DispatcherBuilder {
      base_url: base_url.into(),
      api_key: None,
      transport: Arc::new(transport),
      cache: None,
      auth: None,
      rules: EndpointRules::default(),
      retry: RetryPolicy::default(),
      caching: true,
    }
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  pub fn cache(&self) -> &ResponseCache {
    &self.cache
  }

  pub fn auth(&self) -> &Arc<AuthCoordinator> {
    &self.auth
  }

  /// Execute one logical request and return the normalized payload.
  ///
  /// A 204 response yields `Value::Null`.
  pub async fn request(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Value> {
    let endpoint = normalize_endpoint(endpoint);
    let url = format!("{}{}", self.base_url, endpoint);
    let key = CacheKey::new(options.method, &url, &endpoint, &options.body.fingerprint());

    let cacheable = options.method == Method::Get && options.cache && self.caching;
    if cacheable && !options.skip_cache {
      if let Some(hit) = self.cache.get(&key) {
        return Ok(hit);
      }
    }

    let policy = RetryPolicy {
      retries: options.retries.unwrap_or(self.retry.retries),
      delay: options.retry_delay.unwrap_or(self.retry.delay),
    };

    let payload = self.send_with_retry(&url, &options, policy).await?;
    let payload = self.rules.normalize(&endpoint, payload);

    if cacheable {
      self.cache.set(key, payload.clone());
    }
    if options.method.is_mutation() {
      self.invalidate_after_mutation(&endpoint);
    }

    Ok(payload)
  }

  /// GET a whole collection, e.g. `/clients`.
  pub async fn get_all(&self, collection: &str) -> ApiResult<Value> {
    self.request(collection, RequestOptions::get()).await
  }

  pub async fn get_by_id(&self, collection: &str, id: &str) -> ApiResult<Value> {
    self
      .request(&resource_path(collection, id)?, RequestOptions::get())
      .await
  }

  pub async fn create<T: Serialize + ?Sized>(&self, collection: &str, body: &T) -> ApiResult<Value> {
    self
      .request(collection, RequestOptions::post(json_body(body)?))
      .await
  }

  pub async fn update<T: Serialize + ?Sized>(
    &self,
    collection: &str,
    id: &str,
    body: &T,
  ) -> ApiResult<Value> {
    self
      .request(&resource_path(collection, id)?, RequestOptions::put(json_body(body)?))
      .await
  }

  pub async fn remove(&self, collection: &str, id: &str) -> ApiResult<Value> {
    self
      .request(&resource_path(collection, id)?, RequestOptions::delete())
      .await
  }

  async fn send_with_retry(
    &self,
    url: &str,
    options: &RequestOptions,
    policy: RetryPolicy,
  ) -> ApiResult<Value> {
    let mut remaining = policy.retries;
    loop {
      match self.send_once(url, options).await {
        Err(ApiError::Network(err)) if remaining > 0 => {
          warn!(
            %url,
            error = %err,
            retries_left = remaining,
            "Network error, retrying in {:?}",
            policy.delay
          );
          tokio::time::sleep(policy.delay).await;
          remaining -= 1;
        }
        result => return result,
      }
    }
  }

  async fn send_once(&self, url: &str, options: &RequestOptions) -> ApiResult<Value> {
    let token = self.auth.current_token();
    let mut response = self.transport.send(self.build_request(url, options, token)).await?;

    if response.status == STATUS_UNAUTHORIZED {
      info!(%url, "Received 401, requesting token refresh");
      if self.auth.request_refresh().await {
        let token = self.auth.current_token();
        response = self.transport.send(self.build_request(url, options, token)).await?;
      }
    }

    interpret(response)
  }

  fn build_request(&self, url: &str, options: &RequestOptions, token: Option<String>) -> HttpRequest {
    let mut headers: Vec<(String, String)> = Vec::with_capacity(3 + options.headers.len());

    // Multipart bodies get their boundary content type from the transport.
    if !options.body.is_multipart() {
      headers.push(("Content-Type".to_string(), "application/json".to_string()));
    }
    if let Some(api_key) = &self.api_key {
      headers.push((API_KEY_HEADER.to_string(), api_key.to_string()));
    }
    if let Some(token) = token {
      headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
    }
    for (name, value) in &options.headers {
      set_header(&mut headers, name, value);
    }

    HttpRequest {
      method: options.method,
      url: url.to_string(),
      headers,
      body: options.body.clone(),
    }
  }

  fn invalidate_after_mutation(&self, endpoint: &str) {
    let mut removed = self.cache.delete(rules::path_of(endpoint));

    if let Some(collection) = rules::collection_of(endpoint) {
      removed += self.cache.delete(&format!("/{}", collection));
      for dependent in self.rules.dependents(collection) {
        removed += self.cache.delete(&format!("/{}", dependent));
      }
    }

    if removed > 0 {
      debug!(%endpoint, removed, "Invalidated cached responses");
    }
  }
}

impl std::fmt::Debug for Dispatcher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Dispatcher")
      .field("base_url", &self.base_url)
      .field("retry", &self.retry)
      .field("caching", &self.caching)
      .field("cached_entries", &self.cache.len())
      .finish_non_exhaustive()
  }
}

pub struct DispatcherBuilder {
  base_url: String,
  api_key: Option<String>,
  transport: Arc<dyn Transport>,
  cache: Option<ResponseCache>,
  auth: Option<Arc<AuthCoordinator>>,
  rules: EndpointRules,
  retry: RetryPolicy,
  caching: bool,
}

impl DispatcherBuilder {
  pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
    self.api_key = Some(api_key.into());
    self
  }

  /// Cache to use; defaults to a fresh, private cache.
  pub fn cache(mut self, cache: ResponseCache) -> Self {
    self.cache = Some(cache);
    self
  }

  pub fn auth(mut self, auth: Arc<AuthCoordinator>) -> Self {
    self.auth = Some(auth);
    self
  }

  pub fn rules(mut self, rules: EndpointRules) -> Self {
    self.rules = rules;
    self
  }

  pub fn retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// Disable caching for every request made through this dispatcher.
  pub fn caching(mut self, enabled: bool) -> Self {
    self.caching = enabled;
    self
  }

  pub fn build(self) -> Dispatcher {
    Dispatcher {
      base_url: self.base_url.trim_end_matches('/').into(),
      api_key: self.api_key.map(Into::into),
      transport: self.transport,
      cache: self.cache.unwrap_or_default(),
      auth: self
        .auth
        .unwrap_or_else(|| Arc::new(AuthCoordinator::anonymous())),
      rules: Arc::new(self.rules),
      retry: self.retry,
      caching: self.caching,
    }
  }
}

fn interpret(response: HttpResponse) -> ApiResult<Value> {
  if !response.is_success() {
    return Err(ApiError::Http {
      status: response.status,
      message: envelope::error_message(response.status, &response.body),
    });
  }
  if response.status == STATUS_NO_CONTENT {
    return Ok(Value::Null);
  }
  envelope::unwrap_payload(&response.body)
}

fn normalize_endpoint(endpoint: &str) -> Cow<'_, str> {
  if endpoint.starts_with('/') {
    Cow::Borrowed(endpoint)
  } else {
    Cow::Owned(format!("/{}", endpoint))
  }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
  headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
  headers.push((name.to_string(), value.to_string()));
}

fn json_body<T: Serialize + ?Sized>(body: &T) -> ApiResult<RequestBody> {
  RequestBody::json(body).map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))
}

/// `/{collection}/{id}` for an opaque record id.
pub fn resource_path(collection: &str, id: &str) -> ApiResult<String> {
  if id.is_empty() || id.contains(|c| matches!(c, '/' | '?' | '#')) {
    return Err(ApiError::InvalidRequest(format!("Invalid record id '{}'", id)));
  }
  Ok(format!("/{}/{}", collection.trim_matches('/'), id))
}
