use crate::core::model::{format_millis, DownloadRecord, Playlist, Track};
use crate::core::offline::PrefetchReport;
use crate::core::sort::{SortField, SortOrder, SortState};
use clap::ArgMatches;

// Marks tracks that can play without a connection
const OFFLINE_ICON: &str = "⬇";

pub fn sort_state_from_matches(m: &ArgMatches) -> Option<SortState> {
  let field = m
    .get_one::<String>("sort")
    .and_then(|name| SortField::from_name(name))?;
  let order = if m.get_flag("desc") {
    SortOrder::Descending
  } else {
    SortOrder::Ascending
  };
  Some(SortState::new(field, order))
}

/// `title - artists (m:ss) [id]`, with the pieces that are unknown left out.
pub fn format_track(track: &Track, downloaded: bool) -> String {
  let mut line = String::new();
  if downloaded {
    line.push_str(OFFLINE_ICON);
    line.push(' ');
  }
  line.push_str(&track.name);
  if !track.artist_names.is_empty() {
    line.push_str(" - ");
    line.push_str(&track.artists_display());
  }
  if let Some(duration) = track.duration_millis {
    line.push_str(&format!(" ({})", format_millis(duration)));
  }
  if !track.id.is_empty() {
    line.push_str(&format!(" [{}]", track.id));
  }
  line
}

pub fn format_playlist(playlist: &Playlist) -> String {
  match playlist.songs.len() {
    1 => format!("{} (1 song)", playlist.name),
    n => format!("{} ({} songs)", playlist.name, n),
  }
}

pub fn format_record(record: &DownloadRecord) -> String {
  format!("{} [{}] -> {}", record.name, record.track_id, record.local_uri)
}

pub fn format_report(report: &PrefetchReport) -> String {
  format!(
    "{} downloaded, {} already cached, {} without preview, {} failed",
    report.downloaded, report.already_cached, report.no_source, report.failed
  )
}
