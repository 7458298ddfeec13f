//! What plays next.
//!
//! A queue is either a fixed list (a local playlist, an album, the offline
//! downloads) or a remote listing that is paged in as playback runs past the
//! loaded tail. The two are chosen when the queue is built and never mixed.

use super::catalog::SharedCatalog;
use super::error::{CoreError, Result};
use super::model::{Track, TrackPage};
use super::offline::OfflineCache;
use super::session::{HandleId, NowPlaying, PlaybackSession, SessionSignal, StatusUpdate};
use futures::future::BoxFuture;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub const DEFAULT_STATUS_TTL_SECS: u64 = 4;

/// Queue behaviour a user can configure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueOptions {
  pub repeat_all: bool,
  pub status_ttl_secs: u64,
}

impl Default for QueueOptions {
  fn default() -> Self {
    QueueOptions {
      repeat_all: true,
      status_ttl_secs: DEFAULT_STATUS_TTL_SECS,
    }
  }
}

/// `TrackPage::limit` is the number of raw items the page covered, which may
/// be more than the tracks it carries.
pub trait PageSource: Send + Sync {
  fn fetch_page(&self, offset: u32, limit: u32) -> BoxFuture<'_, Result<TrackPage>>;
}

#[derive(Default)]
struct PagerState {
  tracks: Vec<Track>,
  next_offset: u32,
  exhausted: bool,
}

/// Loaded tracks and the offset cursor of one remote listing.
///
/// The state lock is held across the fetch itself, so whoever asks for a page
/// that is already on its way waits for it instead of requesting it again.
pub struct RemotePager {
  source: Arc<dyn PageSource>,
  page_size: u32,
  state: Mutex<PagerState>,
  catalog: Option<SharedCatalog>,
}

impl RemotePager {
  pub fn new(source: Arc<dyn PageSource>, page_size: u32) -> Self {
    RemotePager {
      source,
      page_size: page_size.max(1),
      state: Mutex::new(PagerState::default()),
      catalog: None,
    }
  }

  /// Every loaded page is also recorded in `catalog`.
  pub fn with_catalog(mut self, catalog: SharedCatalog) -> Self {
    self.catalog = Some(catalog);
    self
  }

  pub fn page_size(&self) -> u32 {
    self.page_size
  }

  async fn fetch_next(&self, state: &mut PagerState) -> Result<usize> {
    if state.exhausted {
      return Ok(0);
    }
    let offset = state.next_offset;
    debug!("fetching page at offset {} (limit {})", offset, self.page_size);
    let page = self.source.fetch_page(offset, self.page_size).await?;

    let count = page.tracks.len();
    if let Some(catalog) = &self.catalog {
      if let Ok(mut catalog) = catalog.write() {
        catalog.extend(page.tracks.iter().cloned());
      }
    }
    state.tracks.extend(page.tracks);
    // The cursor only moves once the page is in hand. It steps over the whole
    // page, since the source may have dropped items it cannot queue.
    let step = if page.limit > 0 { page.limit } else { self.page_size };
    state.next_offset = offset + step;
    state.exhausted = !page.has_more;
    Ok(count)
  }

  /// Loads pages until `index` is covered or the listing runs out. Returns
  /// whether `index` is now loaded.
  pub async fn ensure_index(&self, index: usize) -> Result<bool> {
    let mut state = self.state.lock().await;
    while state.tracks.len() <= index && !state.exhausted {
      self.fetch_next(&mut state).await?;
    }
    Ok(index < state.tracks.len())
  }

  pub async fn load_next_page(&self) -> Result<usize> {
    let mut state = self.state.lock().await;
    self.fetch_next(&mut state).await
  }

  /// Pages in the rest of the listing, one page per lock so foreground
  /// callers can slip in between. Stops at the first failure.
  pub async fn load_all(&self) -> Result<usize> {
    let mut loaded = 0;
    loop {
      let mut state = self.state.lock().await;
      if state.exhausted {
        return Ok(loaded);
      }
      loaded += self.fetch_next(&mut state).await?;
    }
  }

  pub async fn len(&self) -> usize {
    self.state.lock().await.tracks.len()
  }

  pub async fn is_exhausted(&self) -> bool {
    self.state.lock().await.exhausted
  }

  pub async fn get(&self, index: usize) -> Option<Track> {
    self.state.lock().await.tracks.get(index).cloned()
  }

  pub async fn snapshot(&self) -> Vec<Track> {
    self.state.lock().await.tracks.clone()
  }
}

pub enum QueueSource {
  Fixed(Vec<Track>),
  Remote(Arc<RemotePager>),
}

/// A track that ended up loaded, and everything passed over to reach it.
#[derive(Debug)]
pub struct PlayOutcome {
  pub track: Track,
  pub handle: HandleId,
  pub skipped: Vec<(Track, CoreError)>,
}

pub struct QueueController {
  source: QueueSource,
  index: usize,
  repeat_all: bool,
  session: PlaybackSession,
  cache: Arc<OfflineCache>,
  status_ttl_secs: u64,
  last_completed: Option<HandleId>,
}

impl QueueController {
  pub fn new(source: QueueSource, session: PlaybackSession, cache: Arc<OfflineCache>) -> Self {
    QueueController {
      source,
      index: 0,
      repeat_all: true,
      session,
      cache,
      status_ttl_secs: DEFAULT_STATUS_TTL_SECS,
      last_completed: None,
    }
  }

  pub fn with_repeat_all(mut self, repeat_all: bool) -> Self {
    self.repeat_all = repeat_all;
    self
  }

  pub fn with_options(mut self, options: QueueOptions) -> Self {
    self.repeat_all = options.repeat_all;
    self.status_ttl_secs = options.status_ttl_secs;
    self
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn now_playing(&self) -> &NowPlaying {
    self.session.now_playing()
  }

  pub fn session(&self) -> &PlaybackSession {
    &self.session
  }

  pub fn pager(&self) -> Option<&Arc<RemotePager>> {
    match &self.source {
      QueueSource::Remote(pager) => Some(pager),
      QueueSource::Fixed(_) => None,
    }
  }

  /// Loaded length; a remote queue grows as it is paged in.
  pub async fn len(&self) -> usize {
    match &self.source {
      QueueSource::Fixed(tracks) => tracks.len(),
      QueueSource::Remote(pager) => pager.len().await,
    }
  }

  pub async fn is_empty(&self) -> bool {
    self.len().await == 0
  }

  pub async fn tracks(&self) -> Vec<Track> {
    match &self.source {
      QueueSource::Fixed(tracks) => tracks.clone(),
      QueueSource::Remote(pager) => pager.snapshot().await,
    }
  }

  pub async fn current(&self) -> Result<Track> {
    let track = match &self.source {
      QueueSource::Fixed(tracks) => tracks.get(self.index).cloned(),
      QueueSource::Remote(pager) => {
        pager.ensure_index(self.index).await?;
        pager.get(self.index).await
      }
    };
    track.ok_or(CoreError::EmptyQueue)
  }

  /// Moves one forward, paging in more of a remote listing when needed. At
  /// the end it wraps to the start, or fails with `EndOfQueue` when
  /// repeat-all is off. A failed page fetch leaves the position alone.
  pub async fn next(&mut self) -> Result<Track> {
    let candidate = self.index + 1;
    let available = match &self.source {
      QueueSource::Fixed(tracks) => candidate < tracks.len(),
      QueueSource::Remote(pager) => pager.ensure_index(candidate).await?,
    };

    if available {
      self.index = candidate;
    } else if self.is_empty().await {
      return Err(CoreError::EmptyQueue);
    } else if !self.repeat_all {
      return Err(CoreError::EndOfQueue);
    } else {
      self.index = 0;
    }
    self.current().await
  }

  /// Moves one back, wrapping to the last loaded entry.
  pub async fn previous(&mut self) -> Result<Track> {
    let len = self.len().await;
    if len == 0 {
      return Err(CoreError::EmptyQueue);
    }
    self.index = if self.index == 0 { len - 1 } else { self.index - 1 };
    self.current().await
  }

  pub async fn select(&mut self, index: usize) -> Result<Track> {
    let loaded = match &self.source {
      QueueSource::Fixed(tracks) => index < tracks.len(),
      QueueSource::Remote(pager) => pager.ensure_index(index).await?,
    };
    if !loaded {
      return Err(CoreError::NotFound(format!("queue entry {}", index)));
    }
    self.index = index;
    self.current().await
  }

  /// Loads the current entry, moving forward past anything that cannot be
  /// played. Gives up with `NoPlayableTracks` once every entry has failed.
  pub async fn play_current(&mut self) -> Result<PlayOutcome> {
    let mut skipped = Vec::new();
    loop {
      let track = self.current().await?;
      let uri = match self.cache.resolve_playable_uri(&track).await {
        Ok(uri) => uri,
        Err(e) => {
          debug!("no uri for '{}': {}", track.name, e);
          String::new()
        }
      };

      match self.session.load(&track, &uri, true).await {
        Ok(handle) => {
          let index = self.index;
          self
            .session
            .now_playing()
            .update(|state| state.queue_index = Some(index));
          info!("now playing '{}' (queue position {})", track.name, index);
          return Ok(PlayOutcome {
            track,
            handle,
            skipped,
          });
        }
        Err(e) => {
          warn!("skipping '{}': {}", track.name, e);
          self
            .session
            .now_playing()
            .show_status_message(format!("Can't play {}, skipping", track.name), self.status_ttl_secs);
          skipped.push((track, e));
          if skipped.len() >= self.len().await {
            warn!("none of the {} queued tracks could be played", skipped.len());
            self
              .session
              .now_playing()
              .show_status_message("No playable tracks".to_string(), self.status_ttl_secs);
            return Err(CoreError::NoPlayableTracks);
          }
          self.next().await?;
        }
      }
    }
  }

  /// Feeds an engine event through the session and advances on completion
  /// or failure. A handle's completion is acted on once.
  pub async fn handle_status(&mut self, update: StatusUpdate) -> Result<Option<PlayOutcome>> {
    match self.session.on_status(update) {
      None => Ok(None),
      Some(SessionSignal::Finished(handle)) => {
        if self.last_completed == Some(handle) {
          return Ok(None);
        }
        self.last_completed = Some(handle);
        self.next().await?;
        self.play_current().await.map(Some)
      }
      Some(SessionSignal::Failed(handle, error)) => {
        warn!("playback of handle {} failed: {}", handle.0, error);
        self
          .session
          .now_playing()
          .show_status_message(format!("Playback failed: {}", error), self.status_ttl_secs);
        self.next().await?;
        self.play_current().await.map(Some)
      }
    }
  }

  /// Pages in the rest of a remote queue in the background. Shares the
  /// pager's in-flight fetch with `next()`.
  pub fn prefetch_all(&self) -> Option<JoinHandle<Result<usize>>> {
    let pager = self.pager()?.clone();
    Some(tokio::spawn(async move {
      let loaded = pager.load_all().await;
      match &loaded {
        Ok(count) => info!("background prefetch loaded {} more tracks", count),
        Err(e) => warn!("background prefetch stopped: {}", e),
      }
      loaded
    }))
  }

  pub fn play(&mut self) {
    self.session.play();
  }

  pub fn pause(&mut self) {
    self.session.pause();
  }

  pub fn toggle(&mut self) {
    self.session.toggle();
  }

  pub fn seek(&mut self, position_millis: u32) {
    self.session.seek(position_millis);
  }

  pub fn stop(&mut self) {
    self.session.stop();
  }
}
