//! Plain data types shared by the catalog, the stores and the player.
//!
//! Everything here is serialized camelCase since it lands in the
//! `localPlaylists` / `downloadedTracks` documents.

use chrono::TimeDelta;
use rspotify::model::{FullAlbum, FullTrack, Image, SimplifiedArtist, SimplifiedTrack};
use rspotify::prelude::Id;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
  #[serde(default)]
  pub id: String,
  pub name: String,
  /// Remote preview clip. Older playlist records stored it as `uri`.
  #[serde(default, alias = "uri", skip_serializing_if = "Option::is_none")]
  pub preview_uri: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub local_uri: Option<String>,
  #[serde(default)]
  pub artist_names: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub album_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub album_art_uri: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub duration_millis: Option<u32>,
}

impl Track {
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Track {
      id: id.into(),
      name: name.into(),
      ..Default::default()
    }
  }

  pub fn with_preview(mut self, uri: impl Into<String>) -> Self {
    self.preview_uri = Some(uri.into());
    self
  }

  pub fn with_local(mut self, uri: impl Into<String>) -> Self {
    self.local_uri = Some(uri.into());
    self
  }

  pub fn with_artists<S: Into<String>>(mut self, artists: impl IntoIterator<Item = S>) -> Self {
    self.artist_names = artists.into_iter().map(Into::into).collect();
    self
  }

  /// True when the track itself names some uri to play from. A download
  /// record can still make a track without one playable.
  pub fn has_uri(&self) -> bool {
    non_empty(&self.preview_uri) || non_empty(&self.local_uri)
  }

  pub fn artists_display(&self) -> String {
    self.artist_names.join(", ")
  }

  pub fn from_full_track(track: &FullTrack) -> Self {
    Track {
      id: track
        .id
        .as_ref()
        .map(|id| id.id().to_string())
        .unwrap_or_default(),
      name: track.name.clone(),
      preview_uri: track.preview_url.clone().filter(|url| !url.is_empty()),
      local_uri: None,
      artist_names: artist_names(&track.artists),
      album_name: Some(track.album.name.clone()),
      album_art_uri: cover_url(&track.album.images),
      duration_millis: millis(track.duration),
    }
  }

  /// Album listings carry simplified tracks without album info, so the
  /// album's name and art are passed down.
  pub fn from_simplified(
    track: &SimplifiedTrack,
    album_name: Option<&str>,
    album_art_uri: Option<&str>,
  ) -> Self {
    Track {
      id: track
        .id
        .as_ref()
        .map(|id| id.id().to_string())
        .unwrap_or_default(),
      name: track.name.clone(),
      preview_uri: track.preview_url.clone().filter(|url| !url.is_empty()),
      local_uri: None,
      artist_names: artist_names(&track.artists),
      album_name: album_name.map(str::to_string),
      album_art_uri: album_art_uri.map(str::to_string),
      duration_millis: millis(track.duration),
    }
  }
}

fn non_empty(uri: &Option<String>) -> bool {
  uri.as_deref().is_some_and(|u| !u.trim().is_empty())
}

fn artist_names(artists: &[SimplifiedArtist]) -> Vec<String> {
  artists.iter().map(|artist| artist.name.clone()).collect()
}

// The API lists images widest first
fn cover_url(images: &[Image]) -> Option<String> {
  images.first().map(|image| image.url.clone())
}

fn millis(duration: TimeDelta) -> Option<u32> {
  u32::try_from(duration.num_milliseconds())
    .ok()
    .filter(|ms| *ms > 0)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
  pub name: String,
  #[serde(default)]
  pub songs: Vec<Track>,
}

impl Playlist {
  pub fn new(name: impl Into<String>) -> Self {
    Playlist {
      name: name.into(),
      songs: Vec::new(),
    }
  }
}

/// Proof that a track's audio was written to local storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
  #[serde(alias = "id")]
  pub track_id: String,
  pub name: String,
  #[serde(alias = "uri")]
  pub local_uri: String,
}

impl DownloadRecord {
  /// Offline listings only know what the record kept.
  pub fn to_track(&self) -> Track {
    Track::new(self.track_id.clone(), self.name.clone()).with_local(self.local_uri.clone())
  }
}

/// One page of a remote listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackPage {
  pub tracks: Vec<Track>,
  pub offset: u32,
  pub limit: u32,
  pub total: Option<u32>,
  pub has_more: bool,
}

/// An album with its track listing resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Album {
  pub id: String,
  pub name: String,
  pub art_uri: Option<String>,
  pub tracks: Vec<Track>,
}

impl Album {
  pub fn from_full_album(album: &FullAlbum) -> Self {
    let art_uri = cover_url(&album.images);
    let tracks = album
      .tracks
      .items
      .iter()
      .map(|track| Track::from_simplified(track, Some(&album.name), art_uri.as_deref()))
      .collect();
    Album {
      id: album.id.id().to_string(),
      name: album.name.clone(),
      art_uri,
      tracks,
    }
  }
}

/// `mm:ss`, the way the player bar shows positions.
pub fn format_millis(millis: u32) -> String {
  let minutes = millis / 60_000;
  let seconds = (millis % 60_000) / 1000;
  format!("{}:{:02}", minutes, seconds)
}
