use crate::core::offline::Downloader;
use anyhow::anyhow;
use futures::future::BoxFuture;
use log::debug;

/// Fetches preview clips over plain HTTPS; preview urls need no token.
pub struct HttpDownloader {
  client: reqwest::Client,
}

impl HttpDownloader {
  pub fn new(client: reqwest::Client) -> Self {
    HttpDownloader { client }
  }
}

impl Downloader for HttpDownloader {
  fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<u8>>> {
    Box::pin(async move {
      debug!("GET {}", url);
      let response = self.client.get(url).send().await?;
      let status = response.status();
      if !status.is_success() {
        return Err(anyhow!("preview download {} failed: {}", url, status));
      }
      let bytes = response.bytes().await?;
      if bytes.is_empty() {
        return Err(anyhow!("preview download {} returned no data", url));
      }
      Ok(bytes.to_vec())
    })
  }
}
