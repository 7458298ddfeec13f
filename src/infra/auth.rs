//! Access tokens. Logging in happens elsewhere; this side only reads what the
//! login flow left behind.

use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use log::info;
use rspotify::Token;
use std::path::PathBuf;

pub trait TokenProvider: Send + Sync {
  fn get_token(&self) -> BoxFuture<'_, Result<String>>;
}

/// Reads the token cache file on every call, so a login that refreshes it
/// in the meantime is picked up.
pub struct CachedTokenProvider {
  path: PathBuf,
}

impl CachedTokenProvider {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    CachedTokenProvider { path: path.into() }
  }

  pub async fn load(&self) -> Result<Token> {
    let token_json = tokio::fs::read_to_string(&self.path)
      .await
      .with_context(|| format!("no cached token at {}; log in first", self.path.display()))?;
    let token: Token = serde_json::from_str(&token_json)
      .with_context(|| format!("unreadable token cache {}", self.path.display()))?;
    Ok(token)
  }
}

impl TokenProvider for CachedTokenProvider {
  fn get_token(&self) -> BoxFuture<'_, Result<String>> {
    Box::pin(async move {
      let token = self.load().await?;
      if token.is_expired() {
        return Err(anyhow!(
          "cached token in {} has expired; log in again",
          self.path.display()
        ));
      }
      Ok(token.access_token)
    })
  }
}

/// A token handed over directly (`--token` or `ENCORE_TOKEN`).
pub struct StaticToken {
  access_token: String,
}

impl StaticToken {
  pub fn new(access_token: impl Into<String>) -> Self {
    StaticToken {
      access_token: access_token.into(),
    }
  }
}

impl TokenProvider for StaticToken {
  fn get_token(&self) -> BoxFuture<'_, Result<String>> {
    Box::pin(async move {
      if self.access_token.trim().is_empty() {
        return Err(anyhow!("empty access token"));
      }
      Ok(self.access_token.clone())
    })
  }
}

/// Prefers an explicit token, then the cache file.
pub fn provider_for(explicit: Option<String>, token_cache: PathBuf) -> Box<dyn TokenProvider> {
  match explicit.filter(|t| !t.trim().is_empty()) {
    Some(token) => {
      info!("using access token from the command line or environment");
      Box::new(StaticToken::new(token))
    }
    None => {
      info!("using cached token from {}", token_cache.display());
      Box::new(CachedTokenProvider::new(token_cache))
    }
  }
}
