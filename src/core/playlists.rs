//! User-authored playlists, kept as one `localPlaylists` document.
//!
//! Songs are stored as loose JSON so records written by older clients (or by
//! hand) survive a rewrite untouched; only `list`/`get` decide what counts as
//! a usable song.

use super::error::{CoreError, Result};
use super::model::{Playlist, Track};
use super::store::{load_json, save_json, KeyValueStore, LOCAL_PLAYLISTS_KEY};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StoredPlaylist {
  name: String,
  #[serde(default)]
  songs: Vec<Value>,
}

impl StoredPlaylist {
  fn to_playlist(&self) -> Playlist {
    let songs = self
      .songs
      .iter()
      .filter_map(|song| serde_json::from_value::<Track>(song.clone()).ok())
      .filter(Track::has_uri)
      .collect();
    Playlist {
      name: self.name.clone(),
      songs,
    }
  }
}

fn song_value(track: &Track) -> Result<Value> {
  serde_json::to_value(track).map_err(CoreError::storage)
}

pub struct LocalPlaylistStore {
  store: Arc<dyn KeyValueStore>,
  writer: Mutex<()>,
}

impl LocalPlaylistStore {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    LocalPlaylistStore {
      store,
      writer: Mutex::new(()),
    }
  }

  async fn load(&self) -> Result<Vec<StoredPlaylist>> {
    let mut playlists: Vec<StoredPlaylist> = load_json(self.store.as_ref(), LOCAL_PLAYLISTS_KEY).await?;
    for playlist in &mut playlists {
      playlist.songs.retain(|song| !song.is_null());
    }
    Ok(playlists)
  }

  async fn save(&self, playlists: &[StoredPlaylist]) -> Result<()> {
    save_json(self.store.as_ref(), LOCAL_PLAYLISTS_KEY, playlists).await
  }

  pub async fn list(&self) -> Result<Vec<Playlist>> {
    Ok(self.load().await?.iter().map(StoredPlaylist::to_playlist).collect())
  }

  pub async fn get(&self, name: &str) -> Result<Playlist> {
    let name = name.trim();
    self
      .load()
      .await?
      .iter()
      .find(|playlist| playlist.name == name)
      .map(StoredPlaylist::to_playlist)
      .ok_or_else(|| CoreError::NotFound(format!("playlist '{}'", name)))
  }

  pub async fn create(&self, name: &str) -> Result<Playlist> {
    self.create_seeded(name, None).await
  }

  /// "Add to new playlist": the playlist and its first song land in one write.
  pub async fn create_with_song(&self, name: &str, track: &Track) -> Result<Playlist> {
    self.create_seeded(name, Some(track)).await
  }

  async fn create_seeded(&self, name: &str, first: Option<&Track>) -> Result<Playlist> {
    let name = name.trim();
    if name.is_empty() {
      return Err(CoreError::InvalidName);
    }

    let _writer = self.writer.lock().await;
    let mut playlists = self.load().await?;
    // Exact match only; "favorites" and "Favorites" may coexist
    if playlists.iter().any(|playlist| playlist.name == name) {
      return Err(CoreError::DuplicateName(name.to_string()));
    }

    let songs = match first {
      Some(track) => vec![song_value(track)?],
      None => Vec::new(),
    };
    let created = StoredPlaylist {
      name: name.to_string(),
      songs,
    };
    playlists.push(created.clone());
    self.save(&playlists).await?;
    info!("created playlist '{}'", name);
    Ok(created.to_playlist())
  }

  /// Appends even if the song is already there.
  pub async fn add_song(&self, playlist_name: &str, track: &Track) -> Result<Playlist> {
    let playlist_name = playlist_name.trim();
    if !track.has_uri() {
      warn!(
        "adding '{}' to '{}' without a playable uri; it will be hidden until downloaded",
        track.name, playlist_name
      );
    }

    let _writer = self.writer.lock().await;
    let mut playlists = self.load().await?;
    let Some(playlist) = playlists.iter_mut().find(|p| p.name == playlist_name) else {
      return Err(CoreError::NotFound(format!("playlist '{}'", playlist_name)));
    };
    playlist.songs.push(song_value(track)?);
    let updated = playlist.to_playlist();
    self.save(&playlists).await?;
    info!("added '{}' to playlist '{}'", track.name, playlist_name);
    Ok(updated)
  }

  /// Returns whether anything was removed.
  pub async fn remove(&self, playlist_name: &str) -> Result<bool> {
    let playlist_name = playlist_name.trim();
    let _writer = self.writer.lock().await;
    let mut playlists = self.load().await?;
    let before = playlists.len();
    playlists.retain(|playlist| playlist.name != playlist_name);
    if playlists.len() == before {
      return Ok(false);
    }
    self.save(&playlists).await?;
    info!("removed playlist '{}'", playlist_name);
    Ok(true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::testing::{playable, MemoryStore};

  fn store() -> (Arc<MemoryStore>, LocalPlaylistStore) {
    let memory = Arc::new(MemoryStore::default());
    (memory.clone(), LocalPlaylistStore::new(memory))
  }

  #[tokio::test]
  async fn test_create_rejects_blank_name() {
    let (memory, playlists) = store();
    assert_eq!(playlists.create("").await.unwrap_err(), CoreError::InvalidName);
    assert_eq!(playlists.create("   ").await.unwrap_err(), CoreError::InvalidName);
    assert_eq!(memory.writes(), 0);
  }

  #[tokio::test]
  async fn test_create_trims_and_rejects_duplicates() {
    let (_memory, playlists) = store();
    let created = playlists.create("  Favorites ").await.unwrap();
    assert_eq!(created.name, "Favorites");

    assert_eq!(
      playlists.create("Favorites").await.unwrap_err(),
      CoreError::DuplicateName("Favorites".into())
    );
    // Case-sensitive
    playlists.create("favorites").await.unwrap();
    assert_eq!(playlists.list().await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn test_add_song_to_missing_playlist_leaves_storage_alone() {
    let (memory, playlists) = store();
    playlists.create("Road Trip").await.unwrap();
    let before = memory.raw(LOCAL_PLAYLISTS_KEY);
    let writes = memory.writes();

    let err = playlists
      .add_song("Favorites", &playable("a"))
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
    assert_eq!(memory.raw(LOCAL_PLAYLISTS_KEY), before);
    assert_eq!(memory.writes(), writes);
  }

  #[tokio::test]
  async fn test_lookups_trim_the_name() {
    let (_memory, playlists) = store();
    playlists.create("  Favorites ").await.unwrap();

    let updated = playlists
      .add_song(" Favorites ", &playable("a"))
      .await
      .unwrap();
    assert_eq!(updated.songs.len(), 1);
    assert_eq!(playlists.get("Favorites\t").await.unwrap().songs.len(), 1);
    assert!(playlists.remove(" Favorites").await.unwrap());
    assert!(playlists.list().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_add_song_appends_duplicates() {
    let (_memory, playlists) = store();
    playlists.create("Favorites").await.unwrap();
    playlists.add_song("Favorites", &playable("a")).await.unwrap();
    let updated = playlists.add_song("Favorites", &playable("a")).await.unwrap();
    assert_eq!(updated.songs.len(), 2);
    assert_eq!(playlists.get("Favorites").await.unwrap().songs.len(), 2);
  }

  #[tokio::test]
  async fn test_create_with_song_is_one_write() {
    let (memory, playlists) = store();
    let created = playlists
      .create_with_song("Chill", &playable("a"))
      .await
      .unwrap();
    assert_eq!(created.songs[0].id, "a");
    assert_eq!(memory.writes(), 1);
  }

  #[tokio::test]
  async fn test_list_hides_songs_without_uri() {
    let (memory, playlists) = store();
    memory.put_raw(
      LOCAL_PLAYLISTS_KEY,
      r#"[{"name":"Old","songs":[
        null,
        {"name":"No uri"},
        {"name":"Legacy","uri":"file:///docs/legacy.mp3"},
        {"id":"a","name":"A","previewUri":"https://p.scdn.co/a"},
        "garbage"
      ]}]"#,
    );

    let old = playlists.get("Old").await.unwrap();
    let names: Vec<&str> = old.songs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Legacy", "A"]);
  }

  #[tokio::test]
  async fn test_rewrite_keeps_unrecognized_songs() {
    let (memory, playlists) = store();
    memory.put_raw(
      LOCAL_PLAYLISTS_KEY,
      r#"[{"name":"Old","songs":[{"name":"No uri yet"}]}]"#,
    );
    playlists.add_song("Old", &playable("a")).await.unwrap();
    let raw = memory.raw(LOCAL_PLAYLISTS_KEY).unwrap();
    assert!(raw.contains("No uri yet"));
  }

  #[tokio::test]
  async fn test_remove_is_idempotent() {
    let (_memory, playlists) = store();
    playlists.create("Gone").await.unwrap();
    assert!(playlists.remove("Gone").await.unwrap());
    assert!(!playlists.remove("Gone").await.unwrap());
    assert!(matches!(
      playlists.get("Gone").await.unwrap_err(),
      CoreError::NotFound(_)
    ));
  }

  #[tokio::test]
  async fn test_concurrent_adds_are_not_lost() {
    let (_memory, playlists) = store();
    let playlists = Arc::new(playlists);
    playlists.create("Party").await.unwrap();

    let tasks: Vec<_> = ["a", "b", "c", "d"]
      .into_iter()
      .map(|id| {
        let playlists = playlists.clone();
        tokio::spawn(async move { playlists.add_song("Party", &playable(id)).await })
      })
      .collect();
    for task in tasks {
      task.await.unwrap().unwrap();
    }

    let mut ids: Vec<String> = playlists
      .get("Party")
      .await
      .unwrap()
      .songs
      .into_iter()
      .map(|s| s.id)
      .collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
  }
}
