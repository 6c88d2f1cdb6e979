use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::constants::constants;

// --- Types ---

/// Events sent from the download worker to the UI loop.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
  /// Completion percentage, `floor(100 * written / total)`. Only sent
  /// when the response advertises a total size.
  Progress(u8),
  /// All bytes written and the file flushed.
  Finished { bytes: u64 },
  /// Terminal failure; a partial file may remain at the destination.
  Failed(String),
}

/// Ways a download can end. Both are terminal: no retry, and the partial
/// file is left in place for the caller to keep or delete.
#[derive(Debug, Error)]
pub enum DownloadError {
  /// The destination could not be created or written.
  #[error("cannot write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  /// Connect failure, non-success status, or the connection dropped mid-stream.
  #[error("network failure while downloading: {0}")]
  Network(#[from] reqwest::Error),
}

// --- Progress accounting ---

/// Chunk accounting for progress reporting.
///
/// Reports are spaced at least `max(total / report_divisor, min_report_bytes)`
/// bytes apart, so a stream produces on the order of a thousand UI updates
/// at most, not one per network read. Percentages are floored and
/// non-decreasing; 100 is only reached when the byte count covers the
/// advertised total.
#[derive(Debug)]
pub struct ProgressTracker {
  total: u64,
  written: u64,
  interval: u64,
  last_report: u64,
}

impl ProgressTracker {
  pub fn new(total: u64) -> Self {
    let interval = (total / constants().report_divisor).max(constants().min_report_bytes);
    Self { total, written: 0, interval, last_report: 0 }
  }

  /// Account for `n` freshly written bytes. Returns the percentage to
  /// report, or `None` while still inside the current reporting interval.
  pub fn advance(&mut self, n: u64) -> Option<u8> {
    self.written += n;
    if self.written - self.last_report >= self.interval || self.written >= self.total {
      self.last_report = self.written;
      Some(self.percent())
    } else {
      None
    }
  }

  pub fn percent(&self) -> u8 {
    if self.total == 0 {
      return 100;
    }
    ((self.written * 100) / self.total).min(100) as u8
  }

  pub fn written(&self) -> u64 {
    self.written
  }
}

// --- Download ---

/// Stream `url` to `dest`, overwriting any existing file.
///
/// Without an advertised total size the whole body is written in one shot
/// and no progress is reported; completion implies 100%. With one,
/// chunks are written as they arrive and percentage reports are paced by
/// [`ProgressTracker`].
pub async fn download(
  client: &Client,
  url: &str,
  dest: &Path,
  tx: &mpsc::UnboundedSender<DownloadEvent>,
) -> Result<u64, DownloadError> {
  let write_err = |source| DownloadError::Write { path: dest.to_path_buf(), source };

  let response = client.get(url).send().await?.error_for_status()?;
  let total = response.content_length();

  let mut file = File::create(dest).await.map_err(write_err)?;

  let written = match total {
    None => {
      let body = response.bytes().await?;
      file.write_all(&body).await.map_err(write_err)?;
      body.len() as u64
    }
    Some(total) => {
      let mut tracker = ProgressTracker::new(total);
      let mut stream = response.bytes_stream();
      while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(write_err)?;
        if let Some(percent) = tracker.advance(chunk.len() as u64) {
          let _ = tx.send(DownloadEvent::Progress(percent));
        }
      }
      tracker.written()
    }
  };

  file.flush().await.map_err(write_err)?;
  Ok(written)
}

/// Run a download as a background worker, reporting through `tx`.
///
/// There is no cancellation: dropping the handle abandons the worker,
/// matching the fire-and-forget discipline of the app shell. The app
/// layer keeps at most one download active at a time.
pub fn spawn_download(
  client: Client,
  url: String,
  dest: PathBuf,
  tx: mpsc::UnboundedSender<DownloadEvent>,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    info!(url = %url, dest = %dest.display(), "download started");
    match download(&client, &url, &dest, &tx).await {
      Ok(bytes) => {
        info!(bytes, dest = %dest.display(), "download finished");
        let _ = tx.send(DownloadEvent::Finished { bytes });
      }
      Err(e) => {
        warn!(err = %e, dest = %dest.display(), "download failed, partial file kept");
        let _ = tx.send(DownloadEvent::Failed(e.to_string()));
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  const MIB: u64 = 1024 * 1024;

  /// Feed chunks through a tracker and collect every reported percentage.
  fn reports(total: u64, chunk: u64) -> Vec<u8> {
    let mut tracker = ProgressTracker::new(total);
    let mut out = Vec::new();
    let mut sent = 0;
    while sent < total {
      let n = chunk.min(total - sent);
      sent += n;
      if let Some(p) = tracker.advance(n) {
        out.push(p);
      }
    }
    out
  }

  #[test]
  fn percentages_are_monotonic_and_bounded() {
    let percents = reports(100 * MIB, 3 * MIB + 7);
    assert!(!percents.is_empty());
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert!(percents.iter().all(|&p| p <= 100));
  }

  #[test]
  fn final_report_is_exactly_100() {
    for chunk in [64 * 1024, MIB, 5 * MIB + 3] {
      let percents = reports(20 * MIB + 123, chunk);
      assert_eq!(percents.last().copied(), Some(100));
    }
  }

  #[test]
  fn no_report_inside_the_interval() {
    // 4 MiB total → interval is the 1 MiB floor; sub-interval chunks
    // stay silent until a megabyte has accumulated.
    let mut tracker = ProgressTracker::new(4 * MIB);
    assert_eq!(tracker.advance(100 * 1024), None);
    assert_eq!(tracker.advance(100 * 1024), None);
    // ...nine more 100 KiB chunks cross the 1 MiB line at 11 chunks.
    let mut report = None;
    for _ in 0..9 {
      report = report.or(tracker.advance(100 * 1024));
    }
    assert_eq!(report, Some(26));
  }

  #[test]
  fn large_totals_use_the_thousandth_interval() {
    // 4 GiB total → interval is total/1000, above the 1 MiB floor.
    let total = 4096 * MIB;
    let mut tracker = ProgressTracker::new(total);
    assert_eq!(tracker.advance(total / 1000 - 1), None);
    assert!(tracker.advance(1).is_some());
  }

  #[test]
  fn percent_is_floored() {
    let mut tracker = ProgressTracker::new(3);
    tracker.advance(1);
    assert_eq!(tracker.percent(), 33);
    tracker.advance(1);
    assert_eq!(tracker.percent(), 66);
    tracker.advance(1);
    assert_eq!(tracker.percent(), 100);
  }

  #[test]
  fn hundred_only_when_total_reached() {
    let mut tracker = ProgressTracker::new(10 * MIB);
    let mut last = 0;
    for _ in 0..9 {
      if let Some(p) = tracker.advance(MIB) {
        last = p;
      }
    }
    assert!(last < 100);
    assert_eq!(tracker.advance(MIB), Some(100));
  }

  #[test]
  fn zero_total_reports_complete() {
    let tracker = ProgressTracker::new(0);
    assert_eq!(tracker.percent(), 100);
  }
}
