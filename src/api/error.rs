use super::transport::TransportError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failure of a dispatched request.
///
/// Only [`ApiError::Network`] is retried by the dispatcher; every other
/// variant is surfaced on the first occurrence.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  /// The request never produced a response.
  #[error(transparent)]
  Network(TransportError),

  /// Non-2xx response. A 401 ends up here when no refresh succeeded.
  #[error("{message}")]
  Http { status: u16, message: String },

  /// The envelope reported `status != "success"`.
  #[error("{message}")]
  Rejected { message: String },

  #[error("{0}")]
  MalformedResponse(String),

  #[error("Invalid request: {0}")]
  InvalidRequest(String),
}

impl From<TransportError> for ApiError {
  fn from(err: TransportError) -> Self {
    if err.is_invalid_request() {
      ApiError::InvalidRequest(err.to_string())
    } else {
      ApiError::Network(err)
    }
  }
}

impl ApiError {
  pub fn is_network(&self) -> bool {
    matches!(self, ApiError::Network(_))
  }

  /// HTTP status for [`ApiError::Http`] failures.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Http { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn is_unauthorized(&self) -> bool {
    self.status() == Some(401)
  }
}
