//! Bearer-token lookup and refresh signalling.
//!
//! The dispatcher has no knowledge of the identity provider. It reads the
//! current token through a [`TokenSource`] and, when the API answers 401,
//! raises a refresh signal through [`AuthCoordinator::request_refresh`].
//! Whoever owns the session registers listeners with
//! [`AuthCoordinator::on_auth_expired`] and makes the new token visible
//! through the same `TokenSource`.

use futures::future::{join_all, BoxFuture};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Accessor for the current bearer token.
pub trait TokenSource: Send + Sync {
  fn current_token(&self) -> Option<String>;
}

impl<F> TokenSource for F
where
  F: Fn() -> Option<String> + Send + Sync,
{
  fn current_token(&self) -> Option<String> {
    self()
  }
}

/// In-memory token slot shared between the dispatcher and a refresh listener.
#[derive(Debug, Clone, Default)]
pub struct SharedToken {
  inner: Arc<RwLock<Option<String>>>,
}

impl SharedToken {
  pub fn new(token: Option<String>) -> Self {
    Self {
      inner: Arc::new(RwLock::new(token)),
    }
  }

  pub fn set(&self, token: impl Into<String>) {
    *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
  }

  pub fn clear(&self) {
    *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
  }
}

impl TokenSource for SharedToken {
  fn current_token(&self) -> Option<String> {
    self
      .inner
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}

/// Coordinator state as seen from the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
  Idle,
  RefreshRequested,
}

/// Listener invoked on a refresh signal; resolves to `true` if it obtained
/// a new token.
type RefreshHandler = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Couples a token lookup with the listeners that can refresh it.
pub struct AuthCoordinator {
  token: Arc<dyn TokenSource>,
  handlers: RwLock<Vec<RefreshHandler>>,
  in_flight: AtomicUsize,
  signals: AtomicU64,
}

impl AuthCoordinator {
  pub fn new(token: impl TokenSource + 'static) -> Self {
    Self {
      token: Arc::new(token),
      handlers: RwLock::new(Vec::new()),
      in_flight: AtomicUsize::new(0),
      signals: AtomicU64::new(0),
    }
  }

  /// Coordinator with no token; requests go out with the API key only.
  pub fn anonymous() -> Self {
    Self::new(|| -> Option<String> { None })
  }

  pub fn current_token(&self) -> Option<String> {
    self.token.current_token()
  }

  /// Register a listener for the "token refresh needed" signal.
  pub fn on_auth_expired<F, Fut>(&self, handler: F)
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
  {
    let handler: RefreshHandler = Arc::new(move || -> BoxFuture<'static, bool> { Box::pin(handler()) });
    self
      .handlers
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .push(handler);
  }

  pub fn state(&self) -> RefreshState {
    if self.in_flight.load(Ordering::SeqCst) > 0 {
      RefreshState::RefreshRequested
    } else {
      RefreshState::Idle
    }
  }

  /// Number of refresh signals raised so far.
  pub fn signals_raised(&self) -> u64 {
    self.signals.load(Ordering::SeqCst)
  }

  /// Raise the refresh signal and wait for every listener.
  ///
  /// Returns `true` if at least one listener reported a new token.
  /// Concurrent callers each raise their own signal.
  pub async fn request_refresh(&self) -> bool {
    self.signals.fetch_add(1, Ordering::SeqCst);

    let handlers: Vec<RefreshHandler> = self
      .handlers
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();

    if handlers.is_empty() {
      warn!("Token refresh needed but no listener is registered");
      return false;
    }

    info!(listeners = handlers.len(), "Requesting token refresh");
    let _in_flight = InFlight::enter(&self.in_flight);
    let results = join_all(handlers.iter().map(|handler| handler())).await;

    let refreshed = results.into_iter().any(|ok| ok);
    if !refreshed {
      warn!("Token refresh failed, keeping the current token");
    }
    refreshed
  }
}

/// Holds a refresh in flight until dropped, including when the
/// `request_refresh` future is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
  fn enter(counter: &'a AtomicUsize) -> Self {
    counter.fetch_add(1, Ordering::SeqCst);
    Self(counter)
  }
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    self.0.fetch_sub(1, Ordering::SeqCst);
  }
}

impl Default for AuthCoordinator {
  fn default() -> Self {
    Self::anonymous()
  }
}

impl fmt::Debug for AuthCoordinator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AuthCoordinator")
      .field("state", &self.state())
      .field("signals", &self.signals_raised())
      .finish_non_exhaustive()
  }
}
