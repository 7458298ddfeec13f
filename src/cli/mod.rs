//! Non-interactive subcommands.

mod clap;
mod util;

pub use self::clap::{
  download_subcommand, like_subcommand, playlist_subcommand, recent_subcommand, saved_subcommand,
  whoami_subcommand,
};

use crate::config::UserConfig;
use crate::core::catalog::{filter_by_name, TrackCatalog};
use crate::core::model::Track;
use crate::core::offline::{DiskStorage, OfflineCache};
use crate::core::playlists::LocalPlaylistStore;
use crate::core::queue::RemotePager;
use crate::core::sort::Sorter;
use crate::core::store::{JsonFileStore, KeyValueStore};
use crate::infra::auth;
use crate::infra::network::{CatalogPages, HttpDownloader, RemoteListing, SpotifyApi, SpotifyCatalog};
use ::clap::ArgMatches;
use anyhow::{anyhow, Result};
use log::{info, warn};
use rspotify::prelude::Id;
use std::collections::HashSet;
use std::sync::Arc;
use util::{format_playlist, format_record, format_report, format_track, sort_state_from_matches};

/// Everything a subcommand may need, built on first use so that the
/// local-only commands never touch the network or the token.
pub struct CliContext {
  config: UserConfig,
  token: Option<String>,
  store: Arc<dyn KeyValueStore>,
  catalog: Option<Arc<SpotifyCatalog>>,
}

impl CliContext {
  pub fn new(config: UserConfig, token: Option<String>) -> Result<Self> {
    let store = Arc::new(JsonFileStore::new(config.paths()?.store_dir()));
    Ok(CliContext {
      config,
      token,
      store,
      catalog: None,
    })
  }

  fn playlists(&self) -> LocalPlaylistStore {
    LocalPlaylistStore::new(self.store.clone())
  }

  fn catalog(&mut self) -> Result<Arc<SpotifyCatalog>> {
    if let Some(catalog) = &self.catalog {
      return Ok(catalog.clone());
    }
    let token_provider = auth::provider_for(self.token.clone(), self.config.paths()?.token_cache_path.clone());
    let api = SpotifyApi::new(Arc::from(token_provider))?
      .with_min_interval(self.config.behavior.api_min_interval());
    let catalog = Arc::new(SpotifyCatalog::new(api));
    self.catalog = Some(catalog.clone());
    Ok(catalog)
  }

  fn offline_cache(&mut self) -> Result<OfflineCache> {
    let http = match &self.catalog {
      Some(catalog) => catalog.api().http().clone(),
      None => reqwest::Client::new(),
    };
    let files = Arc::new(DiskStorage::new(self.config.paths()?.tracks_dir()));
    Ok(
      OfflineCache::new(self.store.clone(), files, Arc::new(HttpDownloader::new(http)))
        .with_timeout(self.config.behavior.download_timeout()),
    )
  }
}

pub async fn handle_matches(matches: &ArgMatches, cmd: &str, ctx: &mut CliContext) -> Result<()> {
  match cmd {
    "playlist" => handle_playlist(matches, ctx).await,
    "download" => handle_download(matches, ctx).await,
    "saved" => handle_saved(matches, ctx).await,
    "recent" => {
      let limit = ctx.config.behavior.recently_played_limit;
      for track in ctx.catalog()?.recently_played(limit).await? {
        println!("{}", format_track(&track, false));
      }
      Ok(())
    }
    "like" => {
      let track_id = required(matches, "track-id")?;
      let favorite = !matches.get_flag("remove");
      let catalog = ctx.catalog()?;
      catalog.set_favorite(track_id, favorite).await?;
      let saved = catalog
        .saved_contains(&[track_id.to_string()])
        .await?
        .first()
        .copied()
        .unwrap_or(false);
      println!("{} is {}in your liked songs", track_id, if saved { "" } else { "not " });
      Ok(())
    }
    "whoami" => {
      let user = ctx.catalog()?.current_user().await?;
      println!(
        "{} ({})",
        user.display_name.unwrap_or_else(|| "Unnamed".to_string()),
        user.id.id()
      );
      Ok(())
    }
    _ => Err(anyhow!("unknown command `{}`", cmd)),
  }
}

fn required<'a>(m: &'a ArgMatches, name: &str) -> Result<&'a str> {
  m.get_one::<String>(name)
    .map(String::as_str)
    .ok_or_else(|| anyhow!("missing argument <{}>", name))
}

async fn handle_playlist(matches: &ArgMatches, ctx: &mut CliContext) -> Result<()> {
  let playlists = ctx.playlists();
  match matches.subcommand() {
    Some(("list", _)) => {
      let all = playlists.list().await?;
      if all.is_empty() {
        println!("No local playlists yet");
      }
      for playlist in &all {
        println!("{}", format_playlist(playlist));
      }
    }
    Some(("show", m)) => {
      let playlist = playlists.get(required(m, "name")?).await?;
      for track in &playlist.songs {
        println!("{}", format_track(track, track.local_uri.is_some()));
      }
    }
    Some(("create", m)) => {
      let created = playlists.create(required(m, "name")?).await?;
      println!("Created {}", format_playlist(&created));
    }
    Some(("add", m)) => {
      let name = required(m, "name")?;
      let track = lookup_track(ctx, required(m, "track-id")?).await?;
      let updated = if m.get_flag("create") {
        playlists.create_with_song(name, &track).await?
      } else {
        playlists.add_song(name, &track).await?
      };
      println!("Added {} to {}", track.name, format_playlist(&updated));
    }
    Some(("remove", m)) => {
      let name = required(m, "name")?;
      if playlists.remove(name).await? {
        println!("Removed {}", name);
      } else {
        println!("No playlist named {}", name);
      }
    }
    _ => return Err(anyhow!("missing playlist subcommand")),
  }
  Ok(())
}

/// Fetches the track, and carries over the local copy when there is one so
/// the playlist entry works offline too.
async fn lookup_track(ctx: &mut CliContext, track_id: &str) -> Result<Track> {
  let mut track = ctx.catalog()?.track(track_id).await?;
  if let Some(record) = ctx.offline_cache()?.record_for(track_id).await? {
    track.local_uri = Some(record.local_uri);
  }
  Ok(track)
}

async fn handle_download(matches: &ArgMatches, ctx: &mut CliContext) -> Result<()> {
  match matches.subcommand() {
    Some(("saved", m)) => {
      let page_size = ctx.config.behavior.saved_tracks_page_size;
      download_listing(ctx, RemoteListing::SavedTracks, page_size, m).await?;
    }
    Some(("playlist", m)) => {
      let listing = RemoteListing::Playlist(required(m, "playlist-id")?.to_string());
      let page_size = ctx.config.behavior.playlist_page_size;
      download_listing(ctx, listing, page_size, m).await?;
    }
    Some(("album", m)) => {
      let album = ctx.catalog()?.album(required(m, "album-id")?).await?;
      info!("downloading {} tracks of {}", album.tracks.len(), album.name);
      let cache = ctx.offline_cache()?;
      let report = cache.prefetch_all(&album.tracks).await;

      let mut catalog = TrackCatalog::new();
      let album_id = album.id.clone();
      catalog.insert_album(album);
      for record in cache.records().await? {
        catalog.mark_downloaded(&record.track_id, &record.local_uri);
      }
      if let Some(album) = catalog.album(&album_id) {
        for track in &album.tracks {
          let downloaded = catalog.get(&track.id).is_some_and(|known| known.local_uri.is_some());
          println!("{}", format_track(track, downloaded));
        }
        println!("{}: {}", album.name, format_report(&report));
      }
    }
    Some(("list", _)) => {
      let records = ctx.offline_cache()?.records().await?;
      if records.is_empty() {
        println!("Nothing downloaded yet");
      }
      for record in &records {
        println!("{}", format_record(record));
      }
    }
    Some(("track", m)) => {
      let track = ctx.catalog()?.track(required(m, "track-id")?).await?;
      let local_uri = ctx.offline_cache()?.ensure_downloaded(&track).await?;
      println!("{} -> {}", track.name, local_uri);
    }
    _ => return Err(anyhow!("missing download subcommand")),
  }
  Ok(())
}

/// Pages in a remote listing (all of it unless `--pages` says otherwise)
/// and downloads every track in it.
async fn download_listing(
  ctx: &mut CliContext,
  listing: RemoteListing,
  page_size: u32,
  m: &ArgMatches,
) -> Result<()> {
  let catalog = ctx.catalog()?;
  let cache = ctx.offline_cache()?;
  let pages = Arc::new(CatalogPages::new(catalog, listing.clone()));
  let pager = RemotePager::new(pages, page_size);
  match m.get_one::<u32>("pages") {
    Some(count) => {
      for _ in 0..*count {
        if pager.load_next_page().await? == 0 {
          break;
        }
      }
    }
    None => {
      pager.load_all().await?;
    }
  }
  let tracks = pager.snapshot().await;
  info!("downloading {} tracks from {:?}", tracks.len(), listing);
  let report = cache.prefetch_all(&tracks).await;
  println!("{}", format_report(&report));
  Ok(())
}

async fn handle_saved(m: &ArgMatches, ctx: &mut CliContext) -> Result<()> {
  let offset = m.get_one::<u32>("offset").copied().unwrap_or(0);
  let page_size = ctx.config.behavior.saved_tracks_page_size;

  let mut online = false;
  let mut tracks = if m.get_flag("offline") {
    ctx.offline_cache()?.offline_tracks().await?
  } else {
    match ctx.catalog()?.saved_tracks(offset, page_size).await {
      Ok(page) => {
        online = true;
        page.tracks
      }
      Err(e) => {
        warn!("could not fetch liked songs, showing downloads instead: {}", e);
        println!("Offline: showing downloaded tracks");
        ctx.offline_cache()?.offline_tracks().await?
      }
    }
  };

  let mut catalog = TrackCatalog::new();
  catalog.extend(tracks.iter().cloned());
  let cache = ctx.offline_cache()?;
  for record in cache.records().await? {
    catalog.mark_downloaded(&record.track_id, &record.local_uri);
  }
  let downloaded: HashSet<String> = tracks
    .iter()
    .filter(|t| catalog.get(&t.id).is_some_and(|known| known.local_uri.is_some()))
    .map(|t| t.id.clone())
    .collect();

  if let Some(query) = m.get_one::<String>("filter") {
    tracks = filter_by_name(&tracks, query);
  }
  if let Some(state) = sort_state_from_matches(m) {
    Sorter::new(state).sort_tracks(&mut tracks);
  }
  for track in &tracks {
    println!("{}", format_track(track, downloaded.contains(&track.id)));
  }

  if online && ctx.config.behavior.prefetch_saved_tracks {
    let report = cache.prefetch_all(&tracks).await;
    info!("liked songs page cached: {}", format_report(&report));
  }
  Ok(())
}
