//! In-memory index of every track the client has seen, from remote pages,
//! albums, or local playlists and downloads.

use super::model::{Album, Track};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Shared between the pagers that feed it and whoever looks tracks up.
pub type SharedCatalog = Arc<RwLock<TrackCatalog>>;

#[derive(Clone, Debug, Default)]
pub struct TrackCatalog {
  tracks: HashMap<String, Track>,
  albums: HashMap<String, Album>,
}

impl TrackCatalog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn shared() -> SharedCatalog {
    Arc::new(RwLock::new(Self::new()))
  }

  /// Merges by id. A later sighting keeps a local uri learned earlier,
  /// since remote listings never carry one.
  pub fn insert(&mut self, track: Track) {
    if track.id.is_empty() {
      return;
    }
    match self.tracks.get_mut(&track.id) {
      Some(known) => {
        let local_uri = known.local_uri.take();
        *known = track;
        if known.local_uri.is_none() {
          known.local_uri = local_uri;
        }
      }
      None => {
        self.tracks.insert(track.id.clone(), track);
      }
    }
  }

  pub fn extend<I: IntoIterator<Item = Track>>(&mut self, tracks: I) {
    for track in tracks {
      self.insert(track);
    }
  }

  pub fn get(&self, id: &str) -> Option<&Track> {
    self.tracks.get(id)
  }

  pub fn len(&self) -> usize {
    self.tracks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tracks.is_empty()
  }

  pub fn mark_downloaded(&mut self, id: &str, local_uri: &str) {
    if let Some(track) = self.tracks.get_mut(id) {
      track.local_uri = Some(local_uri.to_string());
    }
  }

  pub fn insert_album(&mut self, album: Album) {
    self.extend(album.tracks.iter().cloned());
    self.albums.insert(album.id.clone(), album);
  }

  pub fn album(&self, id: &str) -> Option<&Album> {
    self.albums.get(id)
  }
}

/// Case-insensitive substring match on the title, as the search box does.
/// An empty query keeps everything.
pub fn filter_by_name(tracks: &[Track], query: &str) -> Vec<Track> {
  let query = query.trim().to_lowercase();
  if query.is_empty() {
    return tracks.to_vec();
  }
  tracks
    .iter()
    .filter(|track| track.name.to_lowercase().contains(&query))
    .cloned()
    .collect()
}
