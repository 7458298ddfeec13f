//! Whole-document key-value persistence.
//!
//! The core keeps two records, `localPlaylists` and `downloadedTracks`, each
//! read and written as a single JSON blob.

use super::error::{CoreError, Result};
use anyhow::Context;
use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

pub const LOCAL_PLAYLISTS_KEY: &str = "localPlaylists";
pub const DOWNLOADED_TRACKS_KEY: &str = "downloadedTracks";

pub trait KeyValueStore: Send + Sync {
  fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<Option<String>>>;
  fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Reads a document, treating a missing or blank record as the default value.
pub async fn load_json<T>(store: &dyn KeyValueStore, key: &str) -> Result<T>
where
  T: DeserializeOwned + Default,
{
  let raw = store.get(key).await.map_err(CoreError::storage)?;
  match raw {
    Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
      .map_err(|e| CoreError::Storage(format!("corrupt '{}' record: {}", key, e))),
    _ => Ok(T::default()),
  }
}

pub async fn save_json<T: Serialize + ?Sized>(
  store: &dyn KeyValueStore,
  key: &str,
  value: &T,
) -> Result<()> {
  let raw = serde_json::to_string(value).map_err(CoreError::storage)?;
  store.set(key, raw).await.map_err(CoreError::storage)
}

/// One `<key>.json` file per record inside a data directory.
pub struct JsonFileStore {
  dir: PathBuf,
}

impl JsonFileStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    JsonFileStore { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn path_for(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{}.json", key))
  }
}

impl KeyValueStore for JsonFileStore {
  fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<Option<String>>> {
    Box::pin(async move {
      let path = self.path_for(key);
      match tokio::fs::read_to_string(&path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
      }
    })
  }

  fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, anyhow::Result<()>> {
    Box::pin(async move {
      tokio::fs::create_dir_all(&self.dir)
        .await
        .with_context(|| format!("failed to create {}", self.dir.display()))?;

      // Replace by rename so a crash mid-write never leaves half a document
      let path = self.path_for(key);
      let tmp = path.with_extension("json.tmp");
      tokio::fs::write(&tmp, value.as_bytes())
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
      tokio::fs::rename(&tmp, &path)
        .await
        .with_context(|| format!("failed to replace {}", path.display()))?;
      Ok(())
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::model::DownloadRecord;

  #[tokio::test]
  async fn test_missing_record_is_default() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());
    let records: Vec<DownloadRecord> = load_json(&store, DOWNLOADED_TRACKS_KEY).await.unwrap();
    assert!(records.is_empty());
  }

  #[tokio::test]
  async fn test_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("nested"));
    let records = vec![DownloadRecord {
      track_id: "abc".into(),
      name: "Song".into(),
      local_uri: "/docs/abc.mp3".into(),
    }];
    save_json(&store, DOWNLOADED_TRACKS_KEY, &records).await.unwrap();

    assert!(dir.path().join("nested/downloadedTracks.json").exists());
    assert!(!dir.path().join("nested/downloadedTracks.json.tmp").exists());
    let loaded: Vec<DownloadRecord> = load_json(&store, DOWNLOADED_TRACKS_KEY).await.unwrap();
    assert_eq!(loaded, records);
  }

  #[tokio::test]
  async fn test_corrupt_record_is_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("localPlaylists.json"), "{not json").unwrap();
    let store = JsonFileStore::new(dir.path());
    let result: Result<Vec<DownloadRecord>> = load_json(&store, LOCAL_PLAYLISTS_KEY).await;
    assert!(matches!(result, Err(CoreError::Storage(_))));
  }
}
