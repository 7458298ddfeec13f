//! In-memory stand-ins for the collaborators the core talks to.

use super::model::{Track, TrackPage};
use super::offline::{Downloader, FileStorage};
use super::queue::PageSource;
use super::session::{AudioEngine, AudioHandle, PlaybackStatus, StatusCallback};
use super::store::KeyValueStore;
use super::error::{CoreError, Result};
use anyhow::anyhow;
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct MemoryStore {
  records: Mutex<HashMap<String, String>>,
  writes: AtomicUsize,
}

impl MemoryStore {
  pub fn raw(&self, key: &str) -> Option<String> {
    self.records.lock().unwrap().get(key).cloned()
  }

  pub fn put_raw(&self, key: &str, value: &str) {
    self
      .records
      .lock()
      .unwrap()
      .insert(key.to_string(), value.to_string());
  }

  pub fn writes(&self) -> usize {
    self.writes.load(Ordering::SeqCst)
  }
}

impl KeyValueStore for MemoryStore {
  fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<Option<String>>> {
    Box::pin(async move { Ok(self.raw(key)) })
  }

  fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, anyhow::Result<()>> {
    Box::pin(async move {
      // Give other tasks a chance to interleave, like real I/O would
      tokio::task::yield_now().await;
      self.writes.fetch_add(1, Ordering::SeqCst);
      self.records.lock().unwrap().insert(key.to_string(), value);
      Ok(())
    })
  }
}

#[derive(Default)]
pub struct MemoryFiles {
  files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryFiles {
  pub fn uri_for(file_name: &str) -> String {
    format!("mem://{}", file_name)
  }

  pub fn contains(&self, file_name: &str) -> bool {
    self.files.lock().unwrap().contains_key(file_name)
  }

  pub fn delete(&self, file_name: &str) {
    self.files.lock().unwrap().remove(file_name);
  }
}

impl FileStorage for MemoryFiles {
  fn write<'a>(&'a self, file_name: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, anyhow::Result<String>> {
    Box::pin(async move {
      self
        .files
        .lock()
        .unwrap()
        .insert(file_name.to_string(), bytes);
      Ok(Self::uri_for(file_name))
    })
  }

  fn exists<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, bool> {
    Box::pin(async move {
      let name = uri.trim_start_matches("mem://");
      self.contains(name)
    })
  }

  fn remove<'a>(&'a self, file_name: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
    Box::pin(async move {
      self.delete(file_name);
      Ok(())
    })
  }
}

#[derive(Clone)]
pub enum Fetch {
  Bytes(Vec<u8>),
  Hang,
  Fail(String),
}

/// Downloader with a scripted answer per url; unknown urls fail.
#[derive(Default)]
pub struct ScriptedDownloader {
  script: Mutex<HashMap<String, Fetch>>,
  calls: Mutex<Vec<String>>,
}

impl ScriptedDownloader {
  pub fn set(&self, url: &str, fetch: Fetch) {
    self.script.lock().unwrap().insert(url.to_string(), fetch);
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }
}

impl Downloader for ScriptedDownloader {
  fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<u8>>> {
    Box::pin(async move {
      self.calls.lock().unwrap().push(url.to_string());
      let fetch = self.script.lock().unwrap().get(url).cloned();
      match fetch {
        Some(Fetch::Bytes(bytes)) => Ok(bytes),
        Some(Fetch::Hang) => {
          tokio::time::sleep(Duration::from_secs(3600)).await;
          Ok(Vec::new())
        }
        Some(Fetch::Fail(reason)) => Err(anyhow!(reason)),
        None => Err(anyhow!("404 for {}", url)),
      }
    })
  }
}

/// Engine whose handles only record what was done to them.
#[derive(Default)]
pub struct FakeEngine {
  ops: Arc<Mutex<Vec<String>>>,
  failing: Mutex<HashSet<String>>,
  live: Arc<AtomicUsize>,
  max_live: Arc<AtomicUsize>,
  callbacks: Arc<Mutex<Vec<Option<StatusCallback>>>>,
}

impl FakeEngine {
  pub fn fail_uri(&self, uri: &str) {
    self.failing.lock().unwrap().insert(uri.to_string());
  }

  pub fn ops(&self) -> Vec<String> {
    self.ops.lock().unwrap().clone()
  }

  pub fn loaded_uris(&self) -> Vec<String> {
    self
      .ops()
      .into_iter()
      .filter_map(|op| op.strip_prefix("load ").map(str::to_string))
      .collect()
  }

  pub fn live_handles(&self) -> usize {
    self.live.load(Ordering::SeqCst)
  }

  pub fn max_live_handles(&self) -> usize {
    self.max_live.load(Ordering::SeqCst)
  }

  /// Fires the status callback of the `nth` successful load.
  pub fn emit(&self, nth: usize, status: PlaybackStatus) {
    let callbacks = self.callbacks.lock().unwrap();
    if let Some(Some(callback)) = callbacks.get(nth) {
      callback(status);
    }
  }
}

impl AudioEngine for FakeEngine {
  fn load<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, anyhow::Result<Box<dyn AudioHandle>>> {
    Box::pin(async move {
      self.ops.lock().unwrap().push(format!("load {}", uri));
      if self.failing.lock().unwrap().contains(uri) {
        return Err(anyhow!("cannot decode {}", uri));
      }
      let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
      self.max_live.fetch_max(live, Ordering::SeqCst);

      let slot = {
        let mut callbacks = self.callbacks.lock().unwrap();
        callbacks.push(None);
        callbacks.len() - 1
      };
      Ok(Box::new(FakeHandle {
        uri: uri.to_string(),
        ops: self.ops.clone(),
        live: self.live.clone(),
        callbacks: self.callbacks.clone(),
        slot,
        released: false,
      }) as Box<dyn AudioHandle>)
    })
  }
}

struct FakeHandle {
  uri: String,
  ops: Arc<Mutex<Vec<String>>>,
  live: Arc<AtomicUsize>,
  callbacks: Arc<Mutex<Vec<Option<StatusCallback>>>>,
  slot: usize,
  released: bool,
}

impl FakeHandle {
  fn record(&self, op: &str) {
    self.ops.lock().unwrap().push(format!("{} {}", op, self.uri));
  }
}

impl AudioHandle for FakeHandle {
  fn play(&mut self) -> anyhow::Result<()> {
    self.record("play");
    Ok(())
  }

  fn pause(&mut self) -> anyhow::Result<()> {
    self.record("pause");
    Ok(())
  }

  fn seek(&mut self, position_millis: u32) -> anyhow::Result<()> {
    self.record(&format!("seek {}", position_millis));
    Ok(())
  }

  fn stop(&mut self) -> anyhow::Result<()> {
    self.record("stop");
    Ok(())
  }

  fn release(&mut self) {
    if !self.released {
      self.released = true;
      self.record("release");
      self.live.fetch_sub(1, Ordering::SeqCst);
    }
  }

  fn on_status(&mut self, callback: StatusCallback) {
    self.callbacks.lock().unwrap()[self.slot] = Some(callback);
  }
}

/// Serves a fixed list in pages, counting fetches.
pub struct ScriptedPages {
  tracks: Vec<Track>,
  hidden: HashSet<String>,
  delay: Duration,
  failing_offsets: Mutex<HashSet<u32>>,
  fetches: Mutex<Vec<u32>>,
}

impl ScriptedPages {
  pub fn new(tracks: Vec<Track>) -> Self {
    ScriptedPages {
      tracks,
      hidden: HashSet::new(),
      delay: Duration::ZERO,
      failing_offsets: Mutex::new(HashSet::new()),
      fetches: Mutex::new(Vec::new()),
    }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  /// Listed items that the source drops from its pages, the way episodes
  /// and removed tracks are dropped from a playlist.
  pub fn with_hidden(mut self, ids: &[&str]) -> Self {
    self.hidden = ids.iter().map(|id| id.to_string()).collect();
    self
  }

  pub fn fail_at(&self, offset: u32) {
    self.failing_offsets.lock().unwrap().insert(offset);
  }

  pub fn recover_at(&self, offset: u32) {
    self.failing_offsets.lock().unwrap().remove(&offset);
  }

  pub fn fetched_offsets(&self) -> Vec<u32> {
    self.fetches.lock().unwrap().clone()
  }
}

impl PageSource for ScriptedPages {
  fn fetch_page(&self, offset: u32, limit: u32) -> BoxFuture<'_, Result<TrackPage>> {
    Box::pin(async move {
      if !self.delay.is_zero() {
        tokio::time::sleep(self.delay).await;
      }
      self.fetches.lock().unwrap().push(offset);
      if self.failing_offsets.lock().unwrap().contains(&offset) {
        return Err(CoreError::RemoteFetchFailed("Spotify API 503 failed".into()));
      }
      let start = (offset as usize).min(self.tracks.len());
      let end = (start + limit as usize).min(self.tracks.len());
      Ok(TrackPage {
        tracks: self.tracks[start..end]
          .iter()
          .filter(|track| !self.hidden.contains(&track.id))
          .cloned()
          .collect(),
        offset,
        limit,
        total: Some(self.tracks.len() as u32),
        has_more: end < self.tracks.len(),
      })
    })
  }
}

pub fn playable(id: &str) -> Track {
  Track::new(id, id.to_uppercase()).with_preview(format!("https://p.scdn.co/{}", id))
}
