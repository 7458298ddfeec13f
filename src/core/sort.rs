//! Sorting for track listings (liked songs, playlists, album views)

use super::model::Track;
use std::cmp::Ordering;

/// Fields that can be used for sorting
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SortField {
  /// Original API order (no sorting applied)
  #[default]
  Default,
  /// Alphabetical by title, case-insensitive
  Name,
  /// By first artist name
  Artist,
  Album,
  /// Unknown durations sort first
  Duration,
}

impl SortField {
  pub fn display_name(&self) -> &'static str {
    match self {
      SortField::Default => "Default",
      SortField::Name => "Name",
      SortField::Artist => "Artist",
      SortField::Album => "Album",
      SortField::Duration => "Duration",
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    match name.to_ascii_lowercase().as_str() {
      "default" => Some(SortField::Default),
      "name" => Some(SortField::Name),
      "artist" => Some(SortField::Artist),
      "album" => Some(SortField::Album),
      "duration" => Some(SortField::Duration),
      _ => None,
    }
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SortOrder {
  #[default]
  Ascending,
  Descending,
}

impl SortOrder {
  pub fn toggle(&self) -> Self {
    match self {
      SortOrder::Ascending => SortOrder::Descending,
      SortOrder::Descending => SortOrder::Ascending,
    }
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct SortState {
  pub field: SortField,
  pub order: SortOrder,
}

impl SortState {
  pub fn new(field: SortField, order: SortOrder) -> Self {
    SortState { field, order }
  }

  /// Apply a new sort field, toggling order if same field selected
  pub fn apply_field(&mut self, field: SortField) {
    if self.field == field {
      self.order = self.order.toggle();
    } else {
      self.field = field;
      self.order = SortOrder::Ascending;
    }
  }
}

pub struct Sorter {
  state: SortState,
}

impl Sorter {
  pub fn new(state: SortState) -> Self {
    Self { state }
  }

  /// Stable, so equal keys keep API order.
  pub fn sort_tracks(&self, tracks: &mut [Track]) {
    if self.state.field == SortField::Default {
      return;
    }

    tracks.sort_by(|a, b| {
      let order = match self.state.field {
        SortField::Name => compare_text(&a.name, &b.name),
        SortField::Artist => compare_text(
          a.artist_names.first().map(String::as_str).unwrap_or(""),
          b.artist_names.first().map(String::as_str).unwrap_or(""),
        ),
        SortField::Album => compare_text(
          a.album_name.as_deref().unwrap_or(""),
          b.album_name.as_deref().unwrap_or(""),
        ),
        SortField::Duration => a.duration_millis.cmp(&b.duration_millis),
        SortField::Default => Ordering::Equal,
      };

      if self.state.order == SortOrder::Descending {
        order.reverse()
      } else {
        order
      }
    });
  }
}

fn compare_text(a: &str, b: &str) -> Ordering {
  a.to_lowercase().cmp(&b.to_lowercase())
}
