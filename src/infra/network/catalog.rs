use super::requests::SpotifyApi;
use crate::core::error::{CoreError, Result as CoreResult};
use crate::core::model::{Album, Track, TrackPage};
use crate::core::queue::PageSource;
use anyhow::Result;
use futures::future::BoxFuture;
use log::{info, warn};
use reqwest::Method;
use rspotify::model::{
  album::FullAlbum, page::CursorBasedPage, page::Page, playlist::PlaylistItem, track::FullTrack,
  PlayHistory, PlayableItem, PrivateUser, SavedTrack,
};
use std::sync::Arc;

/// The slice of the Web API the player needs.
pub struct SpotifyCatalog {
  api: SpotifyApi,
}

fn track_page<T>(page: &Page<T>, tracks: Vec<Track>) -> TrackPage {
  TrackPage {
    tracks,
    offset: page.offset,
    limit: page.limit,
    total: Some(page.total),
    has_more: page.next.is_some(),
  }
}

/// Episodes and local files have no place in a track queue.
fn playlist_item_track(item: &PlaylistItem) -> Option<Track> {
  match item.track.as_ref() {
    Some(PlayableItem::Track(full_track)) => Some(Track::from_full_track(full_track)),
    _ => None,
  }
}

impl SpotifyCatalog {
  pub fn new(api: SpotifyApi) -> Self {
    SpotifyCatalog { api }
  }

  pub fn api(&self) -> &SpotifyApi {
    &self.api
  }

  pub async fn current_user(&self) -> Result<PrivateUser> {
    self.api.get_typed("me", &[]).await
  }

  pub async fn recently_played(&self, limit: u32) -> Result<Vec<Track>> {
    let page: CursorBasedPage<PlayHistory> = self
      .api
      .get_typed("me/player/recently-played", &[("limit", limit.to_string())])
      .await?;
    Ok(
      page
        .items
        .iter()
        .map(|history| Track::from_full_track(&history.track))
        .collect(),
    )
  }

  pub async fn saved_tracks(&self, offset: u32, limit: u32) -> Result<TrackPage> {
    let query = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
    let page: Page<SavedTrack> = self.api.get_typed("me/tracks", &query).await?;
    let tracks = page
      .items
      .iter()
      .map(|saved| Track::from_full_track(&saved.track))
      .collect();
    Ok(track_page(&page, tracks))
  }

  pub async fn playlist_tracks(&self, playlist_id: &str, offset: u32, limit: u32) -> Result<TrackPage> {
    let path = format!("playlists/{}/tracks", playlist_id);
    let query = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
    let page: Page<PlaylistItem> = self.api.get_typed(&path, &query).await?;
    let tracks = page.items.iter().filter_map(playlist_item_track).collect();
    Ok(track_page(&page, tracks))
  }

  pub async fn album(&self, album_id: &str) -> Result<Album> {
    let album: FullAlbum = self
      .api
      .get_typed(&format!("albums/{}", album_id), &[])
      .await?;
    Ok(Album::from_full_album(&album))
  }

  pub async fn track(&self, track_id: &str) -> Result<Track> {
    let track: FullTrack = self
      .api
      .get_typed(&format!("tracks/{}", track_id), &[])
      .await?;
    Ok(Track::from_full_track(&track))
  }

  /// Adds the track to, or removes it from, the saved tracks.
  pub async fn set_favorite(&self, track_id: &str, favorite: bool) -> Result<()> {
    let method = if favorite { Method::PUT } else { Method::DELETE };
    self
      .api
      .request_json(method, "me/tracks", &[("ids", track_id.to_string())], None)
      .await?;
    info!(
      "{} {} saved tracks",
      track_id,
      if favorite { "added to" } else { "removed from" }
    );
    Ok(())
  }

  pub async fn saved_contains(&self, track_ids: &[String]) -> Result<Vec<bool>> {
    self
      .api
      .get_typed("me/tracks/contains", &[("ids", track_ids.join(","))])
      .await
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteListing {
  SavedTracks,
  Playlist(String),
}

/// Feeds a remote listing into a [`crate::core::queue::RemotePager`].
pub struct CatalogPages {
  catalog: Arc<SpotifyCatalog>,
  listing: RemoteListing,
}

impl CatalogPages {
  pub fn new(catalog: Arc<SpotifyCatalog>, listing: RemoteListing) -> Self {
    CatalogPages { catalog, listing }
  }
}

impl PageSource for CatalogPages {
  fn fetch_page(&self, offset: u32, limit: u32) -> BoxFuture<'_, CoreResult<TrackPage>> {
    Box::pin(async move {
      let page = match &self.listing {
        RemoteListing::SavedTracks => self.catalog.saved_tracks(offset, limit).await,
        RemoteListing::Playlist(id) => self.catalog.playlist_tracks(id, offset, limit).await,
      };
      page.map_err(|e| {
        warn!("failed to fetch {:?} at offset {}: {}", self.listing, offset, e);
        CoreError::remote(e)
      })
    })
  }
}
