//! Error kinds surfaced by the playback core.
//!
//! Infrastructure code works in `anyhow::Result`; anything crossing into the
//! core API is folded into one of these so callers can match on the kind.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
  /// The audio engine could not acquire a handle for the uri, or the uri was empty
  #[error("media unavailable: {0}")]
  MediaUnavailable(String),

  /// A non-wrapping queue ran past its last entry
  #[error("end of queue reached")]
  EndOfQueue,

  #[error("queue is empty")]
  EmptyQueue,

  /// Every entry in the queue was tried and none could be loaded
  #[error("no playable tracks in queue")]
  NoPlayableTracks,

  /// Nothing to download: the track has no preview url
  #[error("no download source for track {0}")]
  NoSourceAvailable(String),

  #[error("download of track {0} timed out")]
  DownloadTimeout(String),

  #[error("download of track {track_id} failed: {reason}")]
  DownloadFailed { track_id: String, reason: String },

  /// Neither a cached copy nor a preview url exists for the track
  #[error("track {0} is unplayable")]
  Unplayable(String),

  #[error("playlist name must not be empty")]
  InvalidName,

  #[error("a playlist named '{0}' already exists")]
  DuplicateName(String),

  #[error("{0} not found")]
  NotFound(String),

  #[error("remote fetch failed: {0}")]
  RemoteFetchFailed(String),

  #[error("storage error: {0}")]
  Storage(String),
}

impl CoreError {
  pub fn storage(e: impl std::fmt::Display) -> Self {
    CoreError::Storage(e.to_string())
  }

  pub fn remote(e: impl std::fmt::Display) -> Self {
    CoreError::RemoteFetchFailed(e.to_string())
  }
}
