//! Client-side data-access layer for the trainer API.
//!
//! [`Dispatcher`] is the only component that talks to the remote service.
//! Everything it depends on is injected: the [`Transport`], the
//! [`ResponseCache`](crate::cache::ResponseCache), the [`AuthCoordinator`]
//! and the [`EndpointRules`] table.

pub mod auth;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod rules;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AuthCoordinator, RefreshState, SharedToken, TokenSource};
pub use dispatcher::{Dispatcher, DispatcherBuilder, RequestOptions, RetryPolicy};
pub use error::{ApiError, ApiResult};
pub use rules::{EndpointRules, Shape};
pub use transport::{
  HttpRequest, HttpResponse, Method, MultipartForm, ReqwestTransport, RequestBody, Transport,
  TransportError,
};
