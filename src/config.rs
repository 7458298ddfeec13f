use crate::core::queue::{QueueOptions, DEFAULT_STATUS_TTL_SECS};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
  fs,
  path::{Path, PathBuf},
  time::Duration,
};

const FILE_NAME: &str = "config.yml";
const CONFIG_DIR: &str = ".config";
const APP_CONFIG_DIR: &str = "encore";
const TOKEN_CACHE_FILE: &str = ".spotify_token_cache.json";
const PANIC_LOG_FILE: &str = "encore_panic.log";

#[derive(Clone, Debug)]
pub struct UserConfigPaths {
  pub config_file_path: PathBuf,
  pub token_cache_path: PathBuf,
  pub data_dir: PathBuf,
}

impl UserConfigPaths {
  /// Download records and playlists live here as `<key>.json`.
  pub fn store_dir(&self) -> PathBuf {
    self.data_dir.clone()
  }

  pub fn tracks_dir(&self) -> PathBuf {
    self.data_dir.join("tracks")
  }
}

#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BehaviorConfigString {
  pub download_timeout_milliseconds: Option<u64>,
  pub saved_tracks_page_size: Option<u32>,
  pub playlist_page_size: Option<u32>,
  pub recently_played_limit: Option<u32>,
  pub repeat_all: Option<bool>,
  pub prefetch_saved_tracks: Option<bool>,
  pub api_min_interval_milliseconds: Option<u64>,
  pub status_message_ttl_seconds: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BehaviorConfig {
  pub download_timeout_milliseconds: u64,
  pub saved_tracks_page_size: u32,
  pub playlist_page_size: u32,
  pub recently_played_limit: u32,
  pub repeat_all: bool,
  pub prefetch_saved_tracks: bool,
  pub api_min_interval_milliseconds: u64,
  pub status_message_ttl_seconds: u64,
}

impl Default for BehaviorConfig {
  fn default() -> Self {
    BehaviorConfig {
      download_timeout_milliseconds: 5 * 1000,
      saved_tracks_page_size: 10,
      playlist_page_size: 25,
      recently_played_limit: 4,
      repeat_all: true,
      prefetch_saved_tracks: true,
      api_min_interval_milliseconds: 250,
      status_message_ttl_seconds: DEFAULT_STATUS_TTL_SECS,
    }
  }
}

impl BehaviorConfig {
  pub fn download_timeout(&self) -> Duration {
    Duration::from_millis(self.download_timeout_milliseconds)
  }

  pub fn api_min_interval(&self) -> Duration {
    Duration::from_millis(self.api_min_interval_milliseconds)
  }

  pub fn queue_options(&self) -> QueueOptions {
    QueueOptions {
      repeat_all: self.repeat_all,
      status_ttl_secs: self.status_message_ttl_seconds,
    }
  }
}

#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathsConfigString {
  pub data_dir: Option<String>,
  pub token_cache: Option<String>,
}

#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserConfigString {
  behavior: Option<BehaviorConfigString>,
  paths: Option<PathsConfigString>,
}

#[derive(Clone, Debug)]
pub struct UserConfig {
  pub behavior: BehaviorConfig,
  pub path_to_config: Option<UserConfigPaths>,
}

impl Default for UserConfig {
  fn default() -> Self {
    Self::new()
  }
}

// The API caps every paged endpoint at 50 items
fn check_page_size(name: &str, value: u32) -> Result<u32> {
  if !(1..=50).contains(&value) {
    return Err(anyhow!("{} must be between 1 and 50, is {}", name, value));
  }
  Ok(value)
}

fn app_config_dir() -> Result<PathBuf> {
  match dirs::home_dir() {
    Some(home) => Ok(Path::new(&home).join(CONFIG_DIR).join(APP_CONFIG_DIR)),
    None => Err(anyhow!("No $HOME directory found for client config")),
  }
}

/// Where the panic hook appends crash reports.
pub fn panic_log_path() -> Option<PathBuf> {
  app_config_dir().ok().map(|dir| dir.join(PANIC_LOG_FILE))
}

impl UserConfig {
  pub fn new() -> UserConfig {
    UserConfig {
      behavior: BehaviorConfig::default(),
      path_to_config: None,
    }
  }

  pub fn get_or_build_paths(&mut self) -> Result<()> {
    let app_config_dir = app_config_dir()?;
    self.build_paths(app_config_dir.join(FILE_NAME))
  }

  /// Use an explicit config file instead of `~/.config/encore/config.yml`.
  pub fn with_config_file(&mut self, config_file_path: impl Into<PathBuf>) -> Result<()> {
    self.build_paths(config_file_path.into())
  }

  fn build_paths(&mut self, config_file_path: PathBuf) -> Result<()> {
    if let Some(parent) = config_file_path.parent() {
      if !parent.as_os_str().is_empty() && !parent.exists() {
        fs::create_dir_all(parent)
          .with_context(|| format!("failed to create {}", parent.display()))?;
      }
    }

    let token_cache_path = match app_config_dir() {
      Ok(dir) => dir.join(TOKEN_CACHE_FILE),
      Err(_) => config_file_path.with_file_name(TOKEN_CACHE_FILE),
    };
    let data_dir = match dirs::data_local_dir() {
      Some(dir) => dir.join(APP_CONFIG_DIR),
      None => config_file_path.with_file_name("data"),
    };

    self.path_to_config = Some(UserConfigPaths {
      config_file_path,
      token_cache_path,
      data_dir,
    });
    Ok(())
  }

  pub fn paths(&self) -> Result<&UserConfigPaths> {
    self
      .path_to_config
      .as_ref()
      .ok_or_else(|| anyhow!("Config path not initialized"))
  }

  pub fn load_behaviorconfig(&mut self, behavior_config: BehaviorConfigString) -> Result<()> {
    if let Some(timeout) = behavior_config.download_timeout_milliseconds {
      if !(1..=60_000).contains(&timeout) {
        return Err(anyhow!(
          "Download timeout must be between 1 and 60000 milliseconds, is {}",
          timeout
        ));
      }
      self.behavior.download_timeout_milliseconds = timeout;
    }

    if let Some(page_size) = behavior_config.saved_tracks_page_size {
      self.behavior.saved_tracks_page_size = check_page_size("Saved tracks page size", page_size)?;
    }

    if let Some(page_size) = behavior_config.playlist_page_size {
      self.behavior.playlist_page_size = check_page_size("Playlist page size", page_size)?;
    }

    if let Some(limit) = behavior_config.recently_played_limit {
      self.behavior.recently_played_limit = check_page_size("Recently played limit", limit)?;
    }

    if let Some(repeat_all) = behavior_config.repeat_all {
      self.behavior.repeat_all = repeat_all;
    }

    if let Some(prefetch) = behavior_config.prefetch_saved_tracks {
      self.behavior.prefetch_saved_tracks = prefetch;
    }

    if let Some(interval) = behavior_config.api_min_interval_milliseconds {
      if interval >= 5000 {
        return Err(anyhow!("API request interval must be below 5000"));
      } else {
        self.behavior.api_min_interval_milliseconds = interval;
      }
    }

    if let Some(ttl) = behavior_config.status_message_ttl_seconds {
      self.behavior.status_message_ttl_seconds = ttl;
    }

    Ok(())
  }

  fn load_paths(&mut self, paths_config: PathsConfigString) -> Result<()> {
    let paths = self
      .path_to_config
      .as_mut()
      .ok_or_else(|| anyhow!("Config path not initialized"))?;
    if let Some(data_dir) = paths_config.data_dir.filter(|d| !d.trim().is_empty()) {
      paths.data_dir = PathBuf::from(data_dir);
    }
    if let Some(token_cache) = paths_config.token_cache.filter(|t| !t.trim().is_empty()) {
      paths.token_cache_path = PathBuf::from(token_cache);
    }
    Ok(())
  }

  pub fn load_config(&mut self) -> Result<()> {
    if self.path_to_config.is_none() {
      self.get_or_build_paths()?;
    }
    let config_file_path = self.paths()?.config_file_path.clone();

    if config_file_path.exists() {
      let config_string = fs::read_to_string(&config_file_path)?;
      // serde fails if file is empty
      if config_string.trim().is_empty() {
        return Ok(());
      }

      let config_yml: UserConfigString = serde_yaml::from_str(&config_string)
        .with_context(|| format!("invalid config file {}", config_file_path.display()))?;

      if let Some(behavior) = config_yml.behavior {
        self.load_behaviorconfig(behavior)?;
      }
      if let Some(paths) = config_yml.paths {
        self.load_paths(paths)?;
      }
    }
    Ok(())
  }

  /// Save the current configuration to the config file
  pub fn save_config(&self) -> Result<()> {
    let paths = self.paths()?;

    let behavior = BehaviorConfigString {
      download_timeout_milliseconds: Some(self.behavior.download_timeout_milliseconds),
      saved_tracks_page_size: Some(self.behavior.saved_tracks_page_size),
      playlist_page_size: Some(self.behavior.playlist_page_size),
      recently_played_limit: Some(self.behavior.recently_played_limit),
      repeat_all: Some(self.behavior.repeat_all),
      prefetch_saved_tracks: Some(self.behavior.prefetch_saved_tracks),
      api_min_interval_milliseconds: Some(self.behavior.api_min_interval_milliseconds),
      status_message_ttl_seconds: Some(self.behavior.status_message_ttl_seconds),
    };
    let final_config = UserConfigString {
      behavior: Some(behavior),
      paths: Some(PathsConfigString {
        data_dir: Some(paths.data_dir.to_string_lossy().into_owned()),
        token_cache: Some(paths.token_cache_path.to_string_lossy().into_owned()),
      }),
    };

    let content_yml = serde_yaml::to_string(&final_config)?;
    fs::write(&paths.config_file_path, content_yml.as_bytes())
      .with_context(|| format!("failed to write {}", paths.config_file_path.display()))?;
    Ok(())
  }
}
