use anyhow::{anyhow, Result};
use backtrace::Backtrace;
use clap::{Arg, Command as ClapApp};
use clap_complete::{generate, Shell};
use encore::cli::{self, CliContext};
use encore::config::{panic_log_path, UserConfig};
use log::info;
use std::{fs, io, io::Write, panic};

fn setup_logging() -> anyhow::Result<()> {
  // One log file per process
  let pid = std::process::id();
  let log_dir = std::env::temp_dir().join("encore_logs");
  let log_path = log_dir.join(format!("encorelog{}", pid));

  if !log_dir.exists() {
    fs::create_dir_all(&log_dir).map_err(|e| {
      anyhow!(
        "Failed to create log directory {}: {}",
        log_dir.display(),
        e
      )
    })?;
  }
  fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "{}[{}][{}] {}",
        chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
        record.target(),
        record.level(),
        message
      ))
    })
    .level(log::LevelFilter::Info)
    .chain(fern::log_file(&log_path)?)
    .apply()
    .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

  // stdout belongs to command output
  eprintln!("Logging to: {}", log_path.display());

  Ok(())
}

fn install_panic_hook() {
  let default_hook = panic::take_hook();
  panic::set_hook(Box::new(move |info| {
    if let Some(path) = panic_log_path() {
      if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
      }
      if let Ok(mut f) = fs::OpenOptions::new().create(true).append(true).open(&path) {
        let _ = writeln!(f, "\n==== encore panic ====");
        let _ = writeln!(f, "{}", info);
        let _ = writeln!(f, "{:?}", Backtrace::new());
      }
      eprintln!("A crash log was written to: {}", path.to_string_lossy());
    }
    default_hook(info);
  }));
}

fn build_cli() -> ClapApp {
  ClapApp::new(env!("CARGO_PKG_NAME"))
    .version(env!("CARGO_PKG_VERSION"))
    .author(env!("CARGO_PKG_AUTHORS"))
    .about(env!("CARGO_PKG_DESCRIPTION"))
    .after_help(
      "Settings are read from $HOME/.config/encore/config.yml. The access token is read from \
$HOME/.config/encore/.spotify_token_cache.json unless --token or ENCORE_TOKEN is given.",
    )
    .arg(
      Arg::new("config")
        .short('c')
        .long("config")
        .global(true)
        .help("Specify configuration file path."),
    )
    .arg(
      Arg::new("token")
        .long("token")
        .env("ENCORE_TOKEN")
        .hide_env_values(true)
        .global(true)
        .help("Use this access token instead of the cached one"),
    )
    .arg(
      Arg::new("completions")
        .long("completions")
        .help("Generates completions for your preferred shell")
        .value_parser(["bash", "zsh", "fish", "power-shell", "elvish"])
        .value_name("SHELL"),
    )
    .subcommand(cli::playlist_subcommand())
    .subcommand(cli::download_subcommand())
    .subcommand(cli::saved_subcommand())
    .subcommand(cli::recent_subcommand())
    .subcommand(cli::like_subcommand())
    .subcommand(cli::whoami_subcommand())
}

#[tokio::main]
async fn main() -> Result<()> {
  setup_logging()?;
  info!("encore {} starting up", env!("CARGO_PKG_VERSION"));

  install_panic_hook();
  info!("panic hook configured");

  let mut clap_app = build_cli();
  let matches = clap_app.clone().get_matches();

  // Shell completions need neither config nor token
  if let Some(s) = matches.get_one::<String>("completions") {
    let shell = match s.as_str() {
      "fish" => Shell::Fish,
      "bash" => Shell::Bash,
      "zsh" => Shell::Zsh,
      "power-shell" => Shell::PowerShell,
      "elvish" => Shell::Elvish,
      _ => return Err(anyhow!("no completions avaible for '{}'", s)),
    };
    generate(shell, &mut clap_app, "encore", &mut io::stdout());
    return Ok(());
  }

  let mut user_config = UserConfig::new();
  if let Some(config_file_path) = matches.get_one::<String>("config") {
    user_config.with_config_file(config_file_path)?;
  }
  user_config.load_config()?;
  info!("user config loaded successfully");

  let Some((cmd, m)) = matches.subcommand() else {
    clap_app.print_help()?;
    return Ok(());
  };
  info!("running command: {}", cmd);

  let token = matches.get_one::<String>("token").cloned();
  let mut ctx = CliContext::new(user_config, token)?;
  cli::handle_matches(m, cmd, &mut ctx).await
}
