//! Offline cache for preview audio.
//!
//! A track counts as downloaded only once its bytes are on disk and a
//! record for it is in the `downloadedTracks` document. Timed out or failed
//! downloads leave neither behind, so the next attempt starts from scratch.

use super::error::{CoreError, Result};
use super::model::{DownloadRecord, Track};
use super::store::{load_json, save_json, KeyValueStore, DOWNLOADED_TRACKS_KEY};
use anyhow::Context;
use futures::future::BoxFuture;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5);

pub trait Downloader: Send + Sync {
  fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<u8>>>;
}

/// Where downloaded audio lives. `write` hands back the uri the audio
/// engine should be given for the file.
pub trait FileStorage: Send + Sync {
  fn write<'a>(&'a self, file_name: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, anyhow::Result<String>>;
  fn exists<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, bool>;
  fn remove<'a>(&'a self, file_name: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Audio files in one directory, written under a `.part` name and renamed
/// into place once complete.
pub struct DiskStorage {
  dir: PathBuf,
}

impl DiskStorage {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    DiskStorage { dir: dir.into() }
  }

  fn partial_path(&self, file_name: &str) -> PathBuf {
    self.dir.join(format!("{}.part", file_name))
  }
}

impl FileStorage for DiskStorage {
  fn write<'a>(&'a self, file_name: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, anyhow::Result<String>> {
    Box::pin(async move {
      tokio::fs::create_dir_all(&self.dir)
        .await
        .with_context(|| format!("failed to create {}", self.dir.display()))?;
      let partial = self.partial_path(file_name);
      let path = self.dir.join(file_name);
      tokio::fs::write(&partial, &bytes)
        .await
        .with_context(|| format!("failed to write {}", partial.display()))?;
      tokio::fs::rename(&partial, &path)
        .await
        .with_context(|| format!("failed to move {} into place", path.display()))?;
      Ok(path.to_string_lossy().into_owned())
    })
  }

  fn exists<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, bool> {
    Box::pin(async move { tokio::fs::try_exists(uri).await.unwrap_or(false) })
  }

  fn remove<'a>(&'a self, file_name: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
    Box::pin(async move {
      for path in [self.partial_path(file_name), self.dir.join(file_name)] {
        match tokio::fs::remove_file(&path).await {
          Ok(()) => {}
          Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
          Err(e) => return Err(e).with_context(|| format!("failed to remove {}", path.display())),
        }
      }
      Ok(())
    })
  }
}

/// Tally of a bulk pre-fetch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrefetchReport {
  pub downloaded: usize,
  pub already_cached: usize,
  pub no_source: usize,
  pub failed: usize,
}

pub struct OfflineCache {
  store: Arc<dyn KeyValueStore>,
  files: Arc<dyn FileStorage>,
  downloader: Arc<dyn Downloader>,
  timeout: Duration,
  // Serializes read-modify-write of the records document
  writer: Mutex<()>,
}

impl OfflineCache {
  pub fn new(
    store: Arc<dyn KeyValueStore>,
    files: Arc<dyn FileStorage>,
    downloader: Arc<dyn Downloader>,
  ) -> Self {
    OfflineCache {
      store,
      files,
      downloader,
      timeout: DEFAULT_DOWNLOAD_TIMEOUT,
      writer: Mutex::new(()),
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }

  pub fn file_name_for(track_id: &str) -> String {
    format!("{}.mp3", track_id)
  }

  pub async fn records(&self) -> Result<Vec<DownloadRecord>> {
    load_json(self.store.as_ref(), DOWNLOADED_TRACKS_KEY).await
  }

  pub async fn record_for(&self, track_id: &str) -> Result<Option<DownloadRecord>> {
    Ok(
      self
        .records()
        .await?
        .into_iter()
        .find(|record| record.track_id == track_id),
    )
  }

  /// Downloaded tracks, for building a queue when there is no connection.
  pub async fn offline_tracks(&self) -> Result<Vec<Track>> {
    Ok(self.records().await?.iter().map(DownloadRecord::to_track).collect())
  }

  pub async fn ensure_downloaded(&self, track: &Track) -> Result<String> {
    let _writer = self.writer.lock().await;

    let mut records = self.records().await?;
    if let Some(position) = records.iter().position(|r| r.track_id == track.id) {
      let local_uri = records[position].local_uri.clone();
      if self.files.exists(&local_uri).await {
        debug!("{}: already downloaded", track.name);
        return Ok(local_uri);
      }
      // The file went away behind our back; the record is no longer true
      warn!("{}: cached file {} is missing, downloading again", track.name, local_uri);
      records.remove(position);
      save_json(self.store.as_ref(), DOWNLOADED_TRACKS_KEY, &records).await?;
    }

    let Some(preview_uri) = track.preview_uri.as_deref().filter(|uri| !uri.trim().is_empty())
    else {
      info!("{}: no preview url available to download", track.name);
      return Err(CoreError::NoSourceAvailable(track.id.clone()));
    };

    info!("{}: downloading", track.name);
    let file_name = Self::file_name_for(&track.id);
    let attempt = async {
      let bytes = self.downloader.fetch(preview_uri).await?;
      self.files.write(&file_name, bytes).await
    };

    let local_uri = match tokio::time::timeout(self.timeout, attempt).await {
      Ok(Ok(local_uri)) => local_uri,
      Ok(Err(e)) => {
        warn!("{}: download failed: {}", track.name, e);
        self.discard_partial(&file_name).await;
        return Err(CoreError::DownloadFailed {
          track_id: track.id.clone(),
          reason: e.to_string(),
        });
      }
      Err(_) => {
        warn!("{}: download timed out after {:?}", track.name, self.timeout);
        self.discard_partial(&file_name).await;
        return Err(CoreError::DownloadTimeout(track.id.clone()));
      }
    };

    records.push(DownloadRecord {
      track_id: track.id.clone(),
      name: track.name.clone(),
      local_uri: local_uri.clone(),
    });
    save_json(self.store.as_ref(), DOWNLOADED_TRACKS_KEY, &records).await?;
    info!("{}: downloaded to {}", track.name, local_uri);
    Ok(local_uri)
  }

  async fn discard_partial(&self, file_name: &str) {
    if let Err(e) = self.files.remove(file_name).await {
      warn!("failed to discard partial download {}: {}", file_name, e);
    }
  }

  /// Cached copy first, then whatever uri the track carries.
  pub async fn resolve_playable_uri(&self, track: &Track) -> Result<String> {
    if let Some(record) = self.record_for(&track.id).await? {
      return Ok(record.local_uri);
    }
    let own_uri = [&track.local_uri, &track.preview_uri]
      .into_iter()
      .flatten()
      .find(|uri| !uri.trim().is_empty());
    match own_uri {
      Some(uri) => Ok(uri.clone()),
      None => Err(CoreError::Unplayable(track.id.clone())),
    }
  }

  /// One track at a time; a failure only costs that track.
  pub async fn prefetch_all(&self, tracks: &[Track]) -> PrefetchReport {
    let mut report = PrefetchReport::default();
    for track in tracks {
      let was_cached = matches!(self.record_for(&track.id).await, Ok(Some(_)));
      match self.ensure_downloaded(track).await {
        Ok(_) if was_cached => report.already_cached += 1,
        Ok(_) => report.downloaded += 1,
        Err(CoreError::NoSourceAvailable(_)) => report.no_source += 1,
        Err(e) => {
          warn!("{}: skipped in bulk download: {}", track.name, e);
          report.failed += 1;
        }
      }
    }
    info!(
      "bulk download finished: {} new, {} cached, {} without source, {} failed",
      report.downloaded, report.already_cached, report.no_source, report.failed
    );
    report
  }
}
