use clap::{Arg, ArgAction, Command};

fn track_id_arg() -> Arg {
  Arg::new("track-id")
    .required(true)
    .value_name("TRACK_ID")
    .help("Spotify track id (base62, as in open.spotify.com/track/<id>)")
}

fn playlist_name_arg() -> Arg {
  Arg::new("name")
    .required(true)
    .value_name("NAME")
    .help("Name of the local playlist")
}

fn pages_arg() -> Arg {
  Arg::new("pages")
    .long("pages")
    .value_name("PAGES")
    .value_parser(clap::value_parser!(u32).range(1..))
    .help("Only downloads the first PAGES pages (default: all)")
}

pub fn playlist_subcommand() -> Command {
  Command::new("playlist")
    .version(env!("CARGO_PKG_VERSION"))
    .author(env!("CARGO_PKG_AUTHORS"))
    .about("Manages playlists stored on this device")
    .long_about(
      "Local playlists live next to the downloaded tracks and never touch your Spotify \
account. Names are matched exactly, so `Favorites` and `favorites` are two playlists.",
    )
    .visible_alias("pl")
    .subcommand_required(true)
    .subcommand(Command::new("list").about("Lists local playlists"))
    .subcommand(
      Command::new("show")
        .about("Lists the songs of a playlist")
        .arg(playlist_name_arg()),
    )
    .subcommand(
      Command::new("create")
        .about("Creates an empty playlist")
        .arg(playlist_name_arg()),
    )
    .subcommand(
      Command::new("add")
        .about("Appends a track to a playlist")
        .arg(playlist_name_arg())
        .arg(track_id_arg())
        .arg(
          Arg::new("create")
            .short('c')
            .long("create")
            .action(ArgAction::SetTrue)
            .help("Creates the playlist with this track as its first song"),
        ),
    )
    .subcommand(
      Command::new("remove")
        .about("Deletes a playlist")
        .arg(playlist_name_arg()),
    )
}

pub fn download_subcommand() -> Command {
  Command::new("download")
    .version(env!("CARGO_PKG_VERSION"))
    .author(env!("CARGO_PKG_AUTHORS"))
    .about("Downloads preview clips for offline playback")
    .long_about(
      "Tracks without a preview clip are skipped. Each download is given the configured \
timeout (5 seconds by default); a track that times out is not recorded and will be \
tried again next time.",
    )
    .visible_alias("dl")
    .subcommand_required(true)
    .subcommand(
      Command::new("saved")
        .about("Downloads your liked songs")
        .arg(pages_arg()),
    )
    .subcommand(
      Command::new("playlist")
        .about("Downloads the tracks of a Spotify playlist")
        .arg(
          Arg::new("playlist-id")
            .required(true)
            .value_name("PLAYLIST_ID")
            .help("Spotify playlist id"),
        )
        .arg(pages_arg()),
    )
    .subcommand(
      Command::new("album")
        .about("Downloads the tracks of an album")
        .arg(
          Arg::new("album-id")
            .required(true)
            .value_name("ALBUM_ID")
            .help("Spotify album id"),
        ),
    )
    .subcommand(Command::new("list").about("Lists downloaded tracks"))
    .subcommand(
      Command::new("track")
        .about("Downloads a single track")
        .arg(track_id_arg()),
    )
}

pub fn saved_subcommand() -> Command {
  Command::new("saved")
    .version(env!("CARGO_PKG_VERSION"))
    .author(env!("CARGO_PKG_AUTHORS"))
    .about("Lists liked songs")
    .long_about(
      "Shows one page of your liked songs. Without a connection (or with `--offline`) \
the downloaded tracks are listed instead.",
    )
    .arg(
      Arg::new("offset")
        .long("offset")
        .value_name("OFFSET")
        .value_parser(clap::value_parser!(u32))
        .default_value("0")
        .help("Index of the first song to show"),
    )
    .arg(
      Arg::new("filter")
        .long("filter")
        .value_name("TEXT")
        .help("Only shows songs whose title contains TEXT"),
    )
    .arg(
      Arg::new("sort")
        .long("sort")
        .value_name("FIELD")
        .value_parser(["name", "artist", "album", "duration"])
        .help("Sorts the page by FIELD"),
    )
    .arg(
      Arg::new("desc")
        .long("desc")
        .action(ArgAction::SetTrue)
        .requires("sort")
        .help("Sorts in descending order"),
    )
    .arg(
      Arg::new("offline")
        .long("offline")
        .action(ArgAction::SetTrue)
        .help("Lists downloaded tracks without going online"),
    )
}

pub fn recent_subcommand() -> Command {
  Command::new("recent")
    .version(env!("CARGO_PKG_VERSION"))
    .author(env!("CARGO_PKG_AUTHORS"))
    .about("Lists recently played tracks")
}

pub fn like_subcommand() -> Command {
  Command::new("like")
    .version(env!("CARGO_PKG_VERSION"))
    .author(env!("CARGO_PKG_AUTHORS"))
    .about("Adds a track to your liked songs")
    .arg(track_id_arg())
    .arg(
      Arg::new("remove")
        .short('r')
        .long("remove")
        .action(ArgAction::SetTrue)
        .help("Removes the track from your liked songs instead"),
    )
}

pub fn whoami_subcommand() -> Command {
  Command::new("whoami")
    .version(env!("CARGO_PKG_VERSION"))
    .author(env!("CARGO_PKG_AUTHORS"))
    .about("Shows the account the token belongs to")
}
