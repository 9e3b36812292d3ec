//! Token-file session listener.
//!
//! The sign-in flow lives outside this crate and leaves the current access
//! token in a file. On a refresh signal the listener re-reads that file and
//! publishes the token if it changed.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::api::{AuthCoordinator, SharedToken, TokenSource};

/// Read a token file synchronously; empty or unreadable files yield `None`.
pub fn read_token_file(path: &Path) -> Option<String> {
  let contents = std::fs::read_to_string(path).ok()?;
  let token = contents.trim();
  (!token.is_empty()).then(|| token.to_string())
}

/// Re-read `path` into `token`. Returns `true` only if a different,
/// non-empty token was found.
pub async fn reload_token(path: &Path, token: &SharedToken) -> bool {
  let contents = match tokio::fs::read_to_string(path).await {
    Ok(contents) => contents,
    Err(e) => {
      warn!(path = %path.display(), error = %e, "Failed to read token file");
      return false;
    }
  };

  let fresh = contents.trim();
  if fresh.is_empty() {
    warn!(path = %path.display(), "Token file is empty");
    return false;
  }
  if token.current_token().as_deref() == Some(fresh) {
    info!(path = %path.display(), "Token file unchanged");
    return false;
  }

  token.set(fresh);
  info!(path = %path.display(), "Loaded refreshed token");
  true
}

/// Register a refresh listener that reloads `token` from `path`.
pub fn watch_token_file(auth: &AuthCoordinator, path: PathBuf, token: SharedToken) {
  auth.on_auth_expired(move || {
    let path = path.clone();
    let token = token.clone();
    async move { reload_token(&path, &token).await }
  });
}
