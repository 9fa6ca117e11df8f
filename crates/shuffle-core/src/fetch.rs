//! yt-dlp invocation.
//!
//! Both modes ask for a single JSON document on stdout.  Every call is
//! bounded by a timeout; a timed-out child is killed and the call fails
//! without retrying.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::config::FetchConfig;
use crate::{Result, ShuffleError};

/// Longest stderr excerpt carried in a `FetchProcess` error.
const DIAGNOSTIC_LIMIT: usize = 400;

#[derive(Debug, Clone)]
pub struct Fetcher {
    binary: PathBuf,
    listing_timeout: Duration,
    item_timeout: Duration,
}

impl Fetcher {
    pub fn new(binary: PathBuf, listing_timeout: Duration, item_timeout: Duration) -> Self {
        Self {
            binary,
            listing_timeout,
            item_timeout,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            config.resolved_binary(),
            config.listing_timeout(),
            config.item_timeout(),
        )
    }

    /// Flat listing of every entry of a channel/playlist.
    pub async fn fetch_listing(&self, locator: &str) -> Result<Value> {
        self.run(
            &["--flat-playlist", "--dump-single-json", "--no-warnings", locator],
            self.listing_timeout,
        )
        .await
    }

    /// Full metadata for a single video.
    pub async fn fetch_item(&self, url: &str) -> Result<Value> {
        self.run(&["--dump-single-json", "--no-warnings", url], self.item_timeout)
            .await
    }

    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Value> {
        debug!("yt-dlp: {} {:?}", self.binary.display(), args);
        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ShuffleError::FetchProcess(format!(
                        "{} not found. Install yt-dlp or set YT_DLP_PATH",
                        self.binary.display()
                    ))
                } else {
                    ShuffleError::FetchProcess(format!("failed to spawn yt-dlp: {}", e))
                }
            })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ShuffleError::FetchTimeout {
                secs: timeout.as_secs(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ShuffleError::FetchProcess(diagnostic(
                output.status.code(),
                &stderr,
            )));
        }
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(ShuffleError::Validation(
                "No data returned from yt-dlp".to_string(),
            ));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            ShuffleError::Validation(format!("Received invalid JSON from yt-dlp: {}", e))
        })
    }
}

fn diagnostic(code: Option<i32>, stderr: &str) -> String {
    let text = stderr.trim();
    let mut excerpt: String = text.chars().take(DIAGNOSTIC_LIMIT).collect();
    if excerpt.len() < text.len() {
        excerpt.push('…');
    }
    match code {
        Some(code) if excerpt.is_empty() => format!("exit status {}", code),
        Some(code) => format!("exit status {}: {}", code, excerpt),
        None if excerpt.is_empty() => "terminated by signal".to_string(),
        None => format!("terminated by signal: {}", excerpt),
    }
}
