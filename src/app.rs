use anyhow::Result;
use ratatui::widgets::ListState;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::config::Config;
use crate::constants::constants;
use crate::download::{self, DownloadEvent};
use crate::feed::{self, SearchItem};
use crate::player::StreamPlayer;
use crate::theme::THEMES;

// --- Types ---

pub type SearchOutcome = Result<Vec<SearchItem>, feed::SearchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Input,
  Results,
  SavePath,
}

/// A download in flight. At most one exists at a time; the worker reports
/// through the channel and the UI loop drains it every frame.
pub struct ActiveDownload {
  pub dest: PathBuf,
  /// Last reported percentage; `None` until the first report (or for
  /// responses without an advertised size).
  pub percent: Option<u8>,
  rx: mpsc::UnboundedReceiver<DownloadEvent>,
}

pub struct App {
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub mode: AppMode,
  pub theme_index: usize,
  pub search_results: Vec<SearchItem>,
  pub list_state: ListState,
  pub player: StreamPlayer,
  pub http_client: Client,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  /// Informational message — shown with info icon, lower priority than status/error.
  pub info_message: Option<String>,
  pub should_quit: bool,
  /// Editable destination path while in SavePath mode.
  pub save_input: String,
  pub save_cursor: usize,
  pub save_scroll: usize,
  pub download: Option<ActiveDownload>,
  /// Directory new save prompts default into (CLI flag or prefs).
  pub download_dir: Option<PathBuf>,
  search_rx: Option<oneshot::Receiver<SearchOutcome>>,
  /// When the last error was set — used for auto-dismiss after 5 seconds.
  error_time: Option<Instant>,
}

impl App {
  pub fn new(download_dir_override: Option<PathBuf>) -> Self {
    let config = Config::load();
    let theme_index =
      if let Some(ref name) = config.theme_name { THEMES.iter().position(|t| t.name == name).unwrap_or(0) } else { 0 };
    let download_dir = download_dir_override.or_else(|| config.download_dir.map(PathBuf::from));

    let default_input = constants().default_query.clone();
    let default_cursor = default_input.chars().count();

    Self {
      input: default_input,
      cursor_position: default_cursor,
      input_scroll: 0,
      mode: AppMode::Input,
      theme_index,
      search_results: Vec::new(),
      list_state: ListState::default(),
      player: StreamPlayer::new(),
      http_client: Client::new(),
      last_error: None,
      status_message: None,
      info_message: None,
      should_quit: false,
      save_input: String::new(),
      save_cursor: 0,
      save_scroll: 0,
      download: None,
      download_dir,
      search_rx: None,
      error_time: None,
    }
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    // Safety: theme_index is always bounded by modular arithmetic in next_theme()
    // and clamped to THEMES.len() - 1 on initialization.
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  fn save_config(&self) {
    let config = Config {
      theme_name: Some(self.theme().name.to_string()),
      download_dir: self.download_dir.as_ref().map(|p| p.to_string_lossy().into_owned()),
    };
    config.save();
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  /// Clear the current error message and its expiry timer.
  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after 5 seconds.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(5)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  pub fn selected_item(&self) -> Option<&SearchItem> {
    self.search_results.get(self.list_state.selected()?)
  }

  // --- Background task polling ---

  /// Drain completion channels from background workers. Runs once per
  /// frame on the UI loop; this is the only place worker results touch
  /// UI state.
  pub fn check_pending(&mut self) {
    if let Some(mut rx) = self.search_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          self.status_message = None;
          match result {
            Ok(results) if results.is_empty() => {
              self.search_results.clear();
              self.list_state.select(None);
              self.set_error("No results found.".to_string());
            }
            Ok(results) => {
              self.info_message = Some(format!("{} results", results.len()));
              self.search_results = results;
              self.list_state.select(Some(0));
              self.mode = AppMode::Results;
            }
            Err(e) => {
              // A failed search leaves an empty list, never a crash.
              self.search_results.clear();
              self.list_state.select(None);
              self.set_error(format!("Search failed: {}", e));
            }
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.search_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.status_message = None;
          self.set_error("Search task failed.".to_string());
        }
      }
    }

    if let Some(mut dl) = self.download.take() {
      let mut outcome = None;
      while let Ok(event) = dl.rx.try_recv() {
        match event {
          DownloadEvent::Progress(p) => dl.percent = Some(p),
          DownloadEvent::Finished { bytes } => outcome = Some(Ok(bytes)),
          DownloadEvent::Failed(msg) => outcome = Some(Err(msg)),
        }
      }
      match outcome {
        Some(Ok(bytes)) => {
          self.info_message =
            Some(format!("Saved {} ({:.1} MiB)", dl.dest.display(), bytes as f64 / (1024.0 * 1024.0)));
        }
        Some(Err(msg)) => {
          self.set_error(format!("Download failed: {} — partial file at {}", msg, dl.dest.display()));
        }
        None => self.download = Some(dl),
      }
    }
  }

  // --- Search ---

  pub fn trigger_search(&mut self) {
    let query = self.input.trim().to_string();
    if query.is_empty() {
      self.set_error("Enter a search term.".to_string());
      return;
    }
    info!(query = %query, "search triggered");
    self.search_rx = None;
    self.clear_error();
    self.info_message = None;
    self.status_message = Some(format!("Searching '{}'…", query));

    let client = self.http_client.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(feed::search(&client, &query).await);
    });
    self.search_rx = Some(rx);
  }

  // --- Playback ---

  pub async fn trigger_play(&mut self) {
    let Some(item) = self.selected_item().cloned() else { return };
    info!(title = %item.title, url = %item.url, "playback requested");
    self.clear_error();
    if let Err(e) = self.player.play(item).await {
      self.set_error(format!("Playback error: {:#}", e));
      let _ = self.player.stop().await;
    }
  }

  // --- Download ---

  /// Open the save-path prompt for the selected item, primed with
  /// `<videos dir>/<title>.mp4`.
  pub fn begin_save_prompt(&mut self) {
    if self.download.is_some() {
      self.set_error("A download is already running.".to_string());
      return;
    }
    let Some(item) = self.selected_item() else { return };

    let path = self.default_save_path(&item.title);
    self.save_input = path.to_string_lossy().into_owned();
    self.save_cursor = self.save_input.chars().count();
    self.save_scroll = 0;
    self.mode = AppMode::SavePath;
  }

  /// Default destination: the configured download directory, the
  /// platform's videos folder, or the working directory, in that order.
  pub fn default_save_path(&self, title: &str) -> PathBuf {
    let dir = self
      .download_dir
      .clone()
      .or_else(|| directories::UserDirs::new().and_then(|d| d.video_dir().map(Path::to_path_buf)))
      .unwrap_or_else(|| PathBuf::from("."));
    dir.join(format!("{}.{}", sanitize_filename(title), constants().download_extension))
  }

  /// Start the download the save prompt was opened for. Downloads are
  /// serialized: a second one is rejected while the first is running.
  pub fn trigger_download(&mut self) {
    if self.download.is_some() {
      self.set_error("A download is already running.".to_string());
      self.mode = AppMode::Results;
      return;
    }
    let Some(item) = self.selected_item() else { return };
    let url = item.url.clone();
    let dest = PathBuf::from(self.save_input.trim());
    if dest.as_os_str().is_empty() {
      self.set_error("Enter a destination path.".to_string());
      return;
    }

    self.clear_error();
    self.info_message = None;
    self.mode = AppMode::Results;

    let (tx, rx) = mpsc::unbounded_channel();
    // The handle is dropped on purpose: there is no cancellation, and
    // quitting abandons the worker.
    let _ = download::spawn_download(self.http_client.clone(), url, dest.clone(), tx);
    self.download = Some(ActiveDownload { dest, percent: None, rx });
  }

  // --- Clipboard ---

  /// Copy the selected item's stream URL to the system clipboard.
  pub fn copy_selected_url(&mut self) {
    let Some(item) = self.selected_item() else { return };
    let url = item.url.clone();
    match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(url.clone())) {
      Ok(()) => {
        self.info_message = Some(format!("Copied {}", url));
      }
      Err(e) => {
        warn!(err = %e, "clipboard error");
        self.set_error(format!("Clipboard error: {}", e));
      }
    }
  }
}

// --- Helpers ---

/// Make a title safe to use as a file name: quotes are dropped and path
/// separators become dashes.
pub fn sanitize_filename(title: &str) -> String {
  title.replace('"', "").replace(['/', '\\'], "-").trim().to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(title: &str) -> SearchItem {
    SearchItem {
      title: title.to_string(),
      url: "https://example.org/s.mp4".to_string(),
      description: String::new(),
      duration_secs: 0,
      category: String::new(),
    }
  }

  // --- sanitize_filename ---

  #[test]
  fn sanitize_drops_quotes() {
    assert_eq!(sanitize_filename(r#"Der "Alte""#), "Der Alte");
  }

  #[test]
  fn sanitize_replaces_path_separators() {
    assert_eq!(sanitize_filename("Krimi 1/2"), "Krimi 1-2");
    assert_eq!(sanitize_filename(r"a\b"), "a-b");
  }

  #[test]
  fn sanitize_trims_edges() {
    assert_eq!(sanitize_filename("  Tatort "), "Tatort");
  }

  // --- save path / download guard ---

  #[test]
  fn save_path_prefers_configured_directory() {
    let app = App::new(Some(PathBuf::from("/media/videos")));
    assert_eq!(app.default_save_path("Tatort"), PathBuf::from("/media/videos/Tatort.mp4"));
  }

  #[test]
  fn second_download_is_rejected() {
    let mut app = App::new(Some(PathBuf::from("/tmp")));
    app.search_results = vec![item("Wilsberg")];
    app.list_state.select(Some(0));

    let (_tx, rx) = mpsc::unbounded_channel();
    app.download = Some(ActiveDownload { dest: PathBuf::from("/tmp/x.mp4"), percent: None, rx });

    app.begin_save_prompt();
    assert_ne!(app.mode, AppMode::SavePath);
    assert!(app.last_error.is_some());
  }

  #[test]
  fn selected_item_follows_list_state() {
    let mut app = App::new(None);
    app.search_results = vec![item("a"), item("b")];
    assert!(app.selected_item().is_none());
    app.list_state.select(Some(1));
    assert_eq!(app.selected_item().map(|i| i.title.as_str()), Some("b"));
  }
}
