use crate::infra::auth::TokenProvider;
use anyhow::anyhow;
use log::debug;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
  sync::Arc,
  time::{Duration, Instant},
};
use tokio::sync::Mutex;

pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1/";
pub const SPOTIFY_API_MIN_INTERVAL: Duration = Duration::from_millis(250);
const MAX_ATTEMPTS: u8 = 4;

/// Bearer-token JSON calls against the Web API. Requests are paced: each one
/// starts at least `min_interval` after the previous one started.
pub struct SpotifyApi {
  client: reqwest::Client,
  token: Arc<dyn TokenProvider>,
  base_url: reqwest::Url,
  min_interval: Duration,
  last_request_started_at: Mutex<Option<Instant>>,
}

impl SpotifyApi {
  pub fn new(token: Arc<dyn TokenProvider>) -> anyhow::Result<Self> {
    Ok(SpotifyApi {
      client: reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .build()?,
      token,
      base_url: reqwest::Url::parse(SPOTIFY_API_BASE)?,
      min_interval: SPOTIFY_API_MIN_INTERVAL,
      last_request_started_at: Mutex::new(None),
    })
  }

  pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
    self.min_interval = min_interval;
    self
  }

  pub fn http(&self) -> &reqwest::Client {
    &self.client
  }

  async fn pace_spotify_api_call(&self) {
    let mut last_request_started_at = self.last_request_started_at.lock().await;

    if let Some(last) = *last_request_started_at {
      let elapsed = last.elapsed();
      if elapsed < self.min_interval {
        tokio::time::sleep(self.min_interval - elapsed).await;
      }
    }

    *last_request_started_at = Some(Instant::now());
  }

  pub fn url_for(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<reqwest::Url> {
    let mut url = self.base_url.join(path)?;
    if !query.is_empty() {
      let mut qp = url.query_pairs_mut();
      for (k, v) in query {
        qp.append_pair(k, v);
      }
    }
    Ok(url)
  }

  pub async fn request_json(
    &self,
    method: Method,
    path: &str,
    query: &[(&str, String)],
    body: Option<Value>,
  ) -> anyhow::Result<Value> {
    let url = self.url_for(path, query)?;
    let mut attempt: u8 = 0;

    loop {
      let access_token = self.token.get_token().await?;

      self.pace_spotify_api_call().await;
      debug!("{} {}", method, url);

      let mut request = self
        .client
        .request(method.clone(), url.clone())
        .header("Authorization", format!("Bearer {}", access_token))
        .header("Content-Type", "application/json");

      if let Some(payload) = body.clone() {
        request = request.json(&payload);
      }

      let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
          if attempt + 1 < MAX_ATTEMPTS && (e.is_connect() || e.is_timeout() || e.is_request()) {
            let backoff_secs = 1 + u64::from(attempt);
            tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            attempt += 1;
            continue;
          }
          return Err(anyhow!("Spotify API request failed: {}", e));
        }
      };
      if response.status().is_success() {
        let response_body = response.text().await?;
        if response_body.trim().is_empty() {
          return Ok(Value::Null);
        }
        return Ok(serde_json::from_str(&response_body)?);
      }

      let status = response.status();

      if status == reqwest::StatusCode::TOO_MANY_REQUESTS && attempt + 1 < MAX_ATTEMPTS {
        let backoff_secs = retry_after_secs(response.headers()) + u64::from(attempt);
        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
        attempt += 1;
        continue;
      }

      let body = response.text().await.unwrap_or_default();
      if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(anyhow!(
          "Spotify API {} failed: {} (token expired or revoked; log in again)",
          status,
          body
        ));
      }
      return Err(anyhow!("Spotify API {} failed: {}", status, body));
    }
  }

  pub async fn get_typed<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> anyhow::Result<T> {
    let mut value = self.request_json(Method::GET, path, query, None).await?;
    normalize_spotify_payload(&mut value);
    Ok(serde_json::from_value(value)?)
  }
}

fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> u64 {
  headers
    .get("retry-after")
    .and_then(|h| h.to_str().ok())
    .and_then(|v| v.parse::<u64>().ok())
    .unwrap_or(1)
    .max(1)
}

/// Patches payloads the API sends in a shape the model types reject: null
/// entries in item lists (removed or unavailable tracks) and track objects
/// missing fields that newer responses omit.
pub fn normalize_spotify_payload(value: &mut Value) {
  match value {
    Value::Object(map) => {
      if let Some(Value::Array(items)) = map.get_mut("items") {
        items.retain(|item| !item.is_null());
      }

      // Playlist items moved from `track` to `item`
      if map.contains_key("added_at") && !map.contains_key("track") {
        if let Some(item_obj) = map.get("item").cloned() {
          map.insert("track".to_string(), item_obj);
        }
      }

      if map.contains_key("album")
        && map.contains_key("artists")
        && map.contains_key("track_number")
        && map.contains_key("duration_ms")
      {
        map
          .entry("available_markets".to_string())
          .or_insert_with(|| Value::Array(Vec::new()));
        map
          .entry("external_ids".to_string())
          .or_insert_with(|| Value::Object(Default::default()));
        map.entry("linked_from".to_string()).or_insert(Value::Null);
        map
          .entry("popularity".to_string())
          .or_insert_with(|| Value::from(0));
      }

      for child in map.values_mut() {
        normalize_spotify_payload(child);
      }
    }
    Value::Array(values) => {
      values.retain(|item| !item.is_null());
      for child in values.iter_mut() {
        normalize_spotify_payload(child);
      }
    }
    _ => {}
  }
}
