mod app;
mod config;
mod constants;
mod download;
mod feed;
mod input;
mod player;
mod theme;
mod ui;

use anyhow::Result;
use clap::Parser;
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use app::App;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Initial search query, e.g. "!zdf +krimi >40"
  /// (wildcards: ! sender, + title, # topic, * description, <N / >N minutes)
  query: Vec<String>,

  /// Directory downloads default into (overrides the saved preference)
  #[arg(long)]
  download_dir: Option<PathBuf>,
}

// --- Logging ---

/// Log to a rolling file in the platform data dir; stderr belongs to the TUI.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let proj_dirs = ProjectDirs::from("", "", "mvt")?;
  let log_dir = proj_dirs.data_dir().join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;

  let appender = tracing_appender::rolling::daily(log_dir, "mvt.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _log_guard = init_logging();

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, args).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, args: Args) -> Result<()> {
  let mut app = App::new(args.download_dir);
  if !args.query.is_empty() {
    app.input = args.query.join(" ");
    app.cursor_position = app.input.chars().count();
  }

  loop {
    app.check_pending();
    app.player.check_status();
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  // Quitting does not join an in-flight download worker; it is abandoned,
  // leaving whatever bytes made it to disk.
  app.player.stop().await?;
  Ok(())
}
