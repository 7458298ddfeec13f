//! Playback queue, offline cache and local playlists for a Spotify Web API
//! client.

pub mod cli;
pub mod config;
pub mod core;
pub mod infra;
