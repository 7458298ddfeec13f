//! Playback session: owns the one live audio handle and mirrors its state
//! into the shared [`NowPlaying`] handle.
//!
//! The session never decides what plays next. A finished or failed handle is
//! reported back as a [`SessionSignal`] for the queue to act on.

use super::error::{CoreError, Result};
use super::model::Track;
use futures::future::BoxFuture;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Identity of one `load()`; status events carry it so stale ones can be told apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

/// What the audio engine reports about a loaded handle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackStatus {
  pub position_millis: u32,
  pub duration_millis: Option<u32>,
  pub is_playing: bool,
  pub did_finish: bool,
  pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusUpdate {
  pub handle: HandleId,
  pub status: PlaybackStatus,
}

pub type StatusCallback = Box<dyn Fn(PlaybackStatus) + Send + Sync>;

pub trait AudioHandle: Send {
  fn play(&mut self) -> anyhow::Result<()>;
  fn pause(&mut self) -> anyhow::Result<()>;
  fn seek(&mut self, position_millis: u32) -> anyhow::Result<()>;
  fn stop(&mut self) -> anyhow::Result<()>;
  fn release(&mut self);
  fn on_status(&mut self, callback: StatusCallback);
}

pub trait AudioEngine: Send + Sync {
  fn load<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, anyhow::Result<Box<dyn AudioHandle>>>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaybackState {
  pub active_track: Option<Track>,
  pub handle: Option<HandleId>,
  pub is_playing: bool,
  pub position_millis: u32,
  pub duration_millis: Option<u32>,
  pub queue_index: Option<usize>,
  pub status_message: Option<String>,
  pub status_message_expires_at: Option<Instant>,
}

impl PlaybackState {
  /// Position as a 0..=1 ratio, once the duration is known.
  pub fn progress(&self) -> Option<f64> {
    match self.duration_millis {
      Some(duration) if duration > 0 => {
        Some((f64::from(self.position_millis) / f64::from(duration)).min(1.0))
      }
      _ => None,
    }
  }

  fn clear_track(&mut self) {
    self.active_track = None;
    self.handle = None;
    self.is_playing = false;
    self.position_millis = 0;
    self.duration_millis = None;
    self.queue_index = None;
  }
}

/// The process-wide "now playing" context. Cloned into the session, the
/// queue and any observer; all clones see the same state.
#[derive(Clone)]
pub struct NowPlaying {
  tx: Arc<watch::Sender<PlaybackState>>,
}

impl Default for NowPlaying {
  fn default() -> Self {
    Self::new()
  }
}

impl NowPlaying {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(PlaybackState::default());
    NowPlaying { tx: Arc::new(tx) }
  }

  pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
    self.tx.subscribe()
  }

  pub fn snapshot(&self) -> PlaybackState {
    self.tx.borrow().clone()
  }

  pub fn update<F: FnOnce(&mut PlaybackState)>(&self, modify: F) {
    self.tx.send_modify(modify);
  }

  pub fn show_status_message(&self, message: String, ttl_secs: u64) {
    self.update(|state| {
      state.status_message = Some(message);
      state.status_message_expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
    });
  }

  pub fn clear_expired_status(&self, now: Instant) {
    let expired = self
      .tx
      .borrow()
      .status_message_expires_at
      .is_some_and(|expires_at| now >= expires_at);
    if expired {
      self.update(|state| {
        state.status_message = None;
        state.status_message_expires_at = None;
      });
    }
  }

  /// Logout: forget everything.
  pub fn reset(&self) {
    self.tx.send_replace(PlaybackState::default());
  }
}

/// What the queue needs to react to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionSignal {
  Finished(HandleId),
  Failed(HandleId, String),
}

struct ActiveHandle {
  id: HandleId,
  audio: Box<dyn AudioHandle>,
  /// Set once a terminal event has been seen
  done: bool,
}

pub struct PlaybackSession {
  engine: Arc<dyn AudioEngine>,
  now_playing: NowPlaying,
  events: mpsc::UnboundedSender<StatusUpdate>,
  active: Option<ActiveHandle>,
  last_handle: u64,
}

impl PlaybackSession {
  /// The receiver yields every status event from every handle this session
  /// loads; feed them back through [`PlaybackSession::on_status`].
  pub fn new(
    engine: Arc<dyn AudioEngine>,
    now_playing: NowPlaying,
  ) -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
    let (events, rx) = mpsc::unbounded_channel();
    let session = PlaybackSession {
      engine,
      now_playing,
      events,
      active: None,
      last_handle: 0,
    };
    (session, rx)
  }

  pub fn now_playing(&self) -> &NowPlaying {
    &self.now_playing
  }

  pub fn active_handle(&self) -> Option<HandleId> {
    self.active.as_ref().map(|active| active.id)
  }

  pub fn is_loaded(&self) -> bool {
    self.active.is_some()
  }

  pub async fn load(&mut self, track: &Track, uri: &str, autoplay: bool) -> Result<HandleId> {
    // The old handle goes away before anything can suspend
    self.release_active();
    self.now_playing.update(PlaybackState::clear_track);

    if uri.trim().is_empty() {
      return Err(CoreError::MediaUnavailable(format!(
        "'{}' has no playable uri",
        track.name
      )));
    }

    self.last_handle += 1;
    let id = HandleId(self.last_handle);

    let mut audio = match self.engine.load(uri).await {
      Ok(audio) => audio,
      Err(e) => {
        warn!("failed to load '{}' from {}: {}", track.name, uri, e);
        return Err(CoreError::MediaUnavailable(format!("'{}': {}", track.name, e)));
      }
    };

    let events = self.events.clone();
    audio.on_status(Box::new(move |status| {
      // Receiver gone means the session was dropped; nothing to tell
      let _ = events.send(StatusUpdate { handle: id, status });
    }));

    if autoplay {
      if let Err(e) = audio.play() {
        warn!("failed to start '{}': {}", track.name, e);
        audio.release();
        return Err(CoreError::MediaUnavailable(format!("'{}': {}", track.name, e)));
      }
    }

    info!("loaded '{}' as handle {}", track.name, id.0);
    self.active = Some(ActiveHandle {
      id,
      audio,
      done: false,
    });
    self.now_playing.update(|state| {
      state.active_track = Some(track.clone());
      state.handle = Some(id);
      state.is_playing = autoplay;
      state.position_millis = 0;
      state.duration_millis = track.duration_millis;
    });
    Ok(id)
  }

  /// No-op without a loaded track.
  pub fn play(&mut self) {
    self.set_playing(true);
  }

  pub fn pause(&mut self) {
    self.set_playing(false);
  }

  pub fn toggle(&mut self) {
    let playing = self.now_playing.snapshot().is_playing;
    self.set_playing(!playing);
  }

  fn set_playing(&mut self, playing: bool) {
    let Some(active) = self.active.as_mut() else {
      return;
    };
    let result = if playing {
      active.audio.play()
    } else {
      active.audio.pause()
    };
    if let Err(e) = result {
      warn!("audio handle {} rejected play/pause: {}", active.id.0, e);
    }
    // Optimistic; the next status event confirms or corrects it
    self.now_playing.update(|state| state.is_playing = playing);
  }

  pub fn seek(&mut self, position_millis: u32) {
    let Some(active) = self.active.as_mut() else {
      return;
    };
    if let Err(e) = active.audio.seek(position_millis) {
      warn!("audio handle {} rejected seek: {}", active.id.0, e);
      return;
    }
    self.now_playing.update(|state| state.position_millis = position_millis);
  }

  pub fn stop(&mut self) {
    self.release_active();
    self.now_playing.update(|state| {
      state.is_playing = false;
      state.handle = None;
    });
  }

  pub fn reset(&mut self) {
    self.release_active();
    self.now_playing.reset();
  }

  /// Applies an engine event. Events for anything but the live handle, and
  /// anything after its terminal event, are dropped.
  pub fn on_status(&mut self, update: StatusUpdate) -> Option<SessionSignal> {
    let active = match self.active.as_mut() {
      Some(active) if active.id == update.handle => active,
      _ => {
        debug!("ignoring status for stale handle {}", update.handle.0);
        return None;
      }
    };
    if active.done {
      return None;
    }

    // Engine ticks double as the clock for the status message
    self.now_playing.clear_expired_status(Instant::now());

    let status = update.status;
    if let Some(error) = status.error {
      active.done = true;
      let id = active.id;
      self.release_active();
      self.now_playing.update(PlaybackState::clear_track);
      return Some(SessionSignal::Failed(id, error));
    }

    self.now_playing.update(|state| {
      state.position_millis = status.position_millis;
      if status.duration_millis.is_some() {
        state.duration_millis = status.duration_millis;
      }
      state.is_playing = status.is_playing && !status.did_finish;
    });

    if status.did_finish {
      active.done = true;
      return Some(SessionSignal::Finished(active.id));
    }
    None
  }

  fn release_active(&mut self) {
    if let Some(mut active) = self.active.take() {
      if let Err(e) = active.audio.stop() {
        debug!("stopping handle {} failed: {}", active.id.0, e);
      }
      active.audio.release();
    }
  }
}

impl Drop for PlaybackSession {
  fn drop(&mut self) {
    self.release_active();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::testing::FakeEngine;

  fn session_with(engine: &Arc<FakeEngine>) -> (PlaybackSession, mpsc::UnboundedReceiver<StatusUpdate>) {
    PlaybackSession::new(engine.clone(), NowPlaying::new())
  }

  fn track(id: &str) -> Track {
    Track::new(id, id.to_uppercase()).with_preview(format!("https://p/{}", id))
  }

  fn playing_at(position_millis: u32) -> PlaybackStatus {
    PlaybackStatus {
      position_millis,
      duration_millis: Some(30_000),
      is_playing: true,
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn test_load_publishes_now_playing() {
    let engine = Arc::new(FakeEngine::default());
    let (mut session, _rx) = session_with(&engine);
    let observer = session.now_playing().clone();

    let id = session.load(&track("a"), "https://p/a", true).await.unwrap();

    let state = observer.snapshot();
    assert_eq!(state.active_track.unwrap().id, "a");
    assert_eq!(state.handle, Some(id));
    assert!(state.is_playing);
    assert_eq!(engine.ops(), vec!["load https://p/a", "play https://p/a"]);
  }

  #[tokio::test]
  async fn test_empty_uri_is_media_unavailable_and_clears_state() {
    let engine = Arc::new(FakeEngine::default());
    let (mut session, _rx) = session_with(&engine);
    session.load(&track("a"), "https://p/a", true).await.unwrap();

    let err = session.load(&track("b"), "", true).await.unwrap_err();
    assert!(matches!(err, CoreError::MediaUnavailable(_)));
    assert!(!session.is_loaded());
    assert_eq!(engine.live_handles(), 0);
    let state = session.now_playing().snapshot();
    assert!(state.active_track.is_none());
    assert!(!state.is_playing);
  }

  #[tokio::test]
  async fn test_failed_acquisition_releases_previous_handle() {
    let engine = Arc::new(FakeEngine::default());
    engine.fail_uri("https://p/broken");
    let (mut session, _rx) = session_with(&engine);
    session.load(&track("a"), "https://p/a", true).await.unwrap();

    let err = session
      .load(&track("b"), "https://p/broken", true)
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::MediaUnavailable(_)));
    assert_eq!(engine.live_handles(), 0);
    assert!(session.now_playing().snapshot().active_track.is_none());
  }

  #[tokio::test]
  async fn test_never_two_live_handles() {
    let engine = Arc::new(FakeEngine::default());
    let (mut session, _rx) = session_with(&engine);
    for id in ["a", "b", "c"] {
      session.load(&track(id), &format!("https://p/{}", id), true).await.unwrap();
    }
    assert_eq!(engine.live_handles(), 1);
    assert_eq!(engine.max_live_handles(), 1);
  }

  #[tokio::test]
  async fn test_play_pause_without_track_is_noop() {
    let engine = Arc::new(FakeEngine::default());
    let (mut session, _rx) = session_with(&engine);
    session.play();
    session.toggle();
    session.seek(1000);
    assert!(!session.now_playing().snapshot().is_playing);
    assert!(engine.ops().is_empty());
  }

  #[tokio::test]
  async fn test_toggle_is_optimistic() {
    let engine = Arc::new(FakeEngine::default());
    let (mut session, _rx) = session_with(&engine);
    session.load(&track("a"), "https://p/a", false).await.unwrap();
    assert!(!session.now_playing().snapshot().is_playing);

    session.toggle();
    assert!(session.now_playing().snapshot().is_playing);
    session.toggle();
    assert!(!session.now_playing().snapshot().is_playing);
    assert_eq!(
      engine.ops(),
      vec!["load https://p/a", "play https://p/a", "pause https://p/a"]
    );
  }

  #[tokio::test]
  async fn test_stop_then_play_is_noop() {
    let engine = Arc::new(FakeEngine::default());
    let (mut session, _rx) = session_with(&engine);
    session.load(&track("a"), "https://p/a", true).await.unwrap();
    session.stop();
    session.play();
    assert_eq!(engine.live_handles(), 0);
    assert!(!session.now_playing().snapshot().is_playing);
  }

  #[tokio::test]
  async fn test_callback_events_carry_handle_identity() {
    let engine = Arc::new(FakeEngine::default());
    let (mut session, mut rx) = session_with(&engine);
    let first = session.load(&track("a"), "https://p/a", true).await.unwrap();
    let second = session.load(&track("b"), "https://p/b", true).await.unwrap();

    engine.emit(0, playing_at(5_000));
    engine.emit(1, playing_at(1_000));

    let stale = rx.recv().await.unwrap();
    assert_eq!(stale.handle, first);
    assert_eq!(session.on_status(stale), None);
    assert_eq!(session.now_playing().snapshot().position_millis, 0);

    let live = rx.recv().await.unwrap();
    assert_eq!(live.handle, second);
    session.on_status(live);
    let state = session.now_playing().snapshot();
    assert_eq!(state.position_millis, 1_000);
    assert_eq!(state.progress(), Some(1_000.0 / 30_000.0));
  }

  #[tokio::test]
  async fn test_finish_signals_once() {
    let engine = Arc::new(FakeEngine::default());
    let (mut session, _rx) = session_with(&engine);
    let id = session.load(&track("a"), "https://p/a", true).await.unwrap();

    let finished = StatusUpdate {
      handle: id,
      status: PlaybackStatus {
        position_millis: 30_000,
        duration_millis: Some(30_000),
        did_finish: true,
        ..Default::default()
      },
    };
    assert_eq!(
      session.on_status(finished.clone()),
      Some(SessionSignal::Finished(id))
    );
    assert_eq!(session.on_status(finished), None);
    assert!(!session.now_playing().snapshot().is_playing);
  }

  #[tokio::test]
  async fn test_error_event_clears_state() {
    let engine = Arc::new(FakeEngine::default());
    let (mut session, _rx) = session_with(&engine);
    let id = session.load(&track("a"), "https://p/a", true).await.unwrap();

    let signal = session.on_status(StatusUpdate {
      handle: id,
      status: PlaybackStatus {
        error: Some("decoder error".into()),
        ..Default::default()
      },
    });
    assert_eq!(signal, Some(SessionSignal::Failed(id, "decoder error".into())));
    assert!(!session.is_loaded());
    assert!(session.now_playing().snapshot().active_track.is_none());
  }

  #[test]
  fn test_status_message_expiry() {
    let now_playing = NowPlaying::new();
    now_playing.show_status_message("Download failed".into(), 0);
    now_playing.clear_expired_status(Instant::now() + Duration::from_millis(1));
    assert!(now_playing.snapshot().status_message.is_none());

    now_playing.show_status_message("Still here".into(), 60);
    now_playing.clear_expired_status(Instant::now());
    assert_eq!(
      now_playing.snapshot().status_message.as_deref(),
      Some("Still here")
    );
  }

  #[tokio::test]
  async fn test_progress_tick_clears_expired_status() {
    let engine = Arc::new(FakeEngine::default());
    let (mut session, _rx) = session_with(&engine);
    let id = session.load(&track("a"), "https://p/a", true).await.unwrap();
    session
      .now_playing()
      .show_status_message("Can't play B, skipping".into(), 0);

    session.on_status(StatusUpdate {
      handle: id,
      status: PlaybackStatus {
        position_millis: 1_000,
        is_playing: true,
        ..Default::default()
      },
    });
    let state = session.now_playing().snapshot();
    assert!(state.status_message.is_none());
    assert_eq!(state.position_millis, 1_000);
  }

  #[test]
  fn test_reset_clears_everything() {
    let now_playing = NowPlaying::new();
    let observer = now_playing.clone();
    now_playing.update(|state| {
      state.active_track = Some(Track::new("a", "A"));
      state.is_playing = true;
    });
    now_playing.reset();
    assert_eq!(observer.snapshot(), PlaybackState::default());
  }
}
