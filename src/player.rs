use anyhow::{Context, Result, anyhow};
use std::process::Stdio;
use tokio::{
  io::AsyncBufReadExt,
  io::BufReader as TokioBufReader,
  process::{Child as TokioChild, Command},
  sync::mpsc,
  task::JoinHandle,
};

use crate::constants::constants;
use crate::feed::SearchItem;

// --- URL normalization ---

/// Quality-fallback rewrites applied before handing a stream URL to the
/// player. The highest-quality variants of some senders are known-broken;
/// each rule is a literal first-match substring swap to the next tier
/// down, without any capability probing. Applying the function twice yields the
/// same URL as applying it once.
pub fn normalize_stream_url(url: &str) -> String {
  let mut url = url.to_string();
  if url.contains("webxxl") {
    url = url.replacen(".webxxl.", ".webm.", 1);
  }
  if url.contains("3360k_p36v15.mp4") {
    url = url.replacen("3360k_p36v15.mp4", "1628k_p13v15.mp4", 1);
  }
  if url.contains(".xxl.mp4") {
    url = url.replacen(".xxl.mp4", ".l.mp4", 1);
  }
  url
}

// --- Player process ---

/// Hands stream URLs to an external player process and tracks it.
pub struct StreamPlayer {
  pub(crate) current_process: Option<TokioChild>,
  /// The item currently playing, for the Now Playing pane.
  pub current: Option<SearchItem>,
  monitor_handle: Option<JoinHandle<()>>,
  status_rx: Option<mpsc::Receiver<String>>,
  last_status: Option<String>,
  ipc_socket_path: Option<String>,
  pub paused: bool,
}

impl StreamPlayer {
  pub fn new() -> Self {
    Self {
      current_process: None,
      current: None,
      monitor_handle: None,
      status_rx: None,
      last_status: None,
      ipc_socket_path: None,
      paused: false,
    }
  }

  pub fn is_playing(&self) -> bool {
    self.current_process.is_some()
  }

  pub fn check_status(&mut self) {
    if let Some(rx) = &mut self.status_rx {
      while let Ok(status) = rx.try_recv() {
        self.last_status = Some(status);
      }
    }
  }

  pub fn last_status(&self) -> Option<String> {
    self.last_status.clone()
  }

  /// Start playback of an item's stream, stopping any previous playback.
  ///
  /// The URL is run through the quality-fallback rewrites first, matching
  /// what the feed hands out for known-broken high-quality variants.
  pub async fn play(&mut self, item: SearchItem) -> Result<()> {
    self.stop().await.context("Failed to stop previous playback")?;
    let url = normalize_stream_url(&item.url);
    self.current = Some(item);
    self.paused = false;

    let player_cmd = constants().player_cmd.as_str();
    let socket_path = std::env::temp_dir().join(format!("mvt-{}-{}.sock", player_cmd, std::process::id()));
    let socket_path_str = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let mut cmd = Command::new(player_cmd);
    cmd.args([
      "--term-status-msg=Time: ${time-pos/full} / ${duration/full} | ${pause} ${percent-pos}%",
      &format!("--input-ipc-server={}", socket_path_str),
      &url,
    ]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    // Send stderr to null — if piped but never drained, the pipe buffer
    // fills and the player blocks.
    cmd.stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("{player_cmd} not found. Install it with: apt install {player_cmd} (Linux) or brew install {player_cmd} (macOS)")
      } else {
        anyhow!(e).context(format!("Failed to spawn {player_cmd} process"))
      }
    })?;

    let stdout = child.stdout.take().context("Failed to get player stdout")?;
    let (tx, rx) = mpsc::channel::<String>(10);
    self.status_rx = Some(rx);

    let monitor_handle = tokio::spawn(async move {
      let reader = TokioBufReader::new(stdout);
      let mut lines = reader.lines();
      while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
          break;
        }
      }
    });

    self.current_process = Some(child);
    self.monitor_handle = Some(monitor_handle);
    self.ipc_socket_path = Some(socket_path_str);
    Ok(())
  }

  pub async fn toggle_pause(&mut self) -> Result<()> {
    let Some(ref socket_path) = self.ipc_socket_path else {
      return Ok(());
    };
    let stream =
      tokio::net::UnixStream::connect(socket_path).await.context("Failed to connect to player IPC socket")?;
    stream.writable().await.context("Player IPC socket not writable")?;
    let cmd = b"{\"command\":[\"cycle\",\"pause\"]}\n";
    let written = stream.try_write(cmd).context("Failed to send pause command to player")?;
    if written < cmd.len() {
      return Err(anyhow!("Partial write to player IPC socket: wrote {} of {} bytes", written, cmd.len()));
    }
    self.paused = !self.paused;
    Ok(())
  }

  pub async fn stop(&mut self) -> Result<()> {
    if let Some(handle) = self.monitor_handle.take() {
      handle.abort();
      let _ = handle.await;
    }
    self.status_rx = None;
    self.last_status = None;

    if let Some(mut child) = self.current_process.take() {
      child.kill().await.context("Failed to kill player process")?;
      let _ = child.wait().await;
    }

    self.current = None;
    self.paused = false;

    if let Some(path) = self.ipc_socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn webxxl_drops_to_webm() {
    assert_eq!(
      normalize_stream_url("https://cdn.example/video.webxxl.mp4"),
      "https://cdn.example/video.webm.mp4"
    );
  }

  #[test]
  fn fixed_bitrate_profile_drops_a_tier() {
    assert_eq!(
      normalize_stream_url("https://cdn.example/show/3360k_p36v15.mp4"),
      "https://cdn.example/show/1628k_p13v15.mp4"
    );
  }

  #[test]
  fn xxl_quality_tag_drops_to_l() {
    assert_eq!(normalize_stream_url("https://cdn.example/film.xxl.mp4"), "https://cdn.example/film.l.mp4");
  }

  #[test]
  fn unrelated_urls_pass_through() {
    let url = "https://cdn.example/ok/film.l.mp4";
    assert_eq!(normalize_stream_url(url), url);
  }

  #[test]
  fn normalization_is_idempotent() {
    for url in [
      "https://cdn.example/video.webxxl.mp4",
      "https://cdn.example/show/3360k_p36v15.mp4",
      "https://cdn.example/film.xxl.mp4",
      "https://cdn.example/plain.mp4",
    ] {
      let once = normalize_stream_url(url);
      assert_eq!(normalize_stream_url(&once), once);
    }
  }

  #[test]
  fn only_the_first_match_is_rewritten() {
    let twice = normalize_stream_url("https://cdn.example/a.xxl.mp4/b.xxl.mp4");
    assert_eq!(twice, "https://cdn.example/a.l.mp4/b.xxl.mp4");
  }
}
