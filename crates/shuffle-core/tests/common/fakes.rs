#![allow(dead_code)]

//! Stand-ins for yt-dlp and mpv.
//!
//! `FakeYtDlp` is a shell script that logs its arguments and prints canned
//! JSON; `FakeMpv` is a Unix listener that records every command line sent
//! to the socket.

use serde_json::{json, Value};
use shuffle_core::config::Config;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;

pub fn write_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

pub struct FakeYtDlp {
    pub binary: PathBuf,
    dir: PathBuf,
}

impl FakeYtDlp {
    /// Prints `listing` for `--flat-playlist` calls, `item` otherwise.
    pub fn new(dir: &Path, listing: &Value, item: &Value) -> Self {
        let dir = dir.join("yt-dlp-fake");
        std::fs::create_dir_all(&dir).unwrap();
        let this = Self {
            binary: dir.join("yt-dlp"),
            dir,
        };
        this.set_listing(listing);
        std::fs::write(this.dir.join("item.json"), item.to_string()).unwrap();
        let d = this.dir.display();
        write_script(
            &this.binary,
            &format!(
                r#"echo "$*" >> "{d}/calls.log"
case "$*" in
  *--flat-playlist*) cat "{d}/listing.json" ;;
  *) cat "{d}/item.json" ;;
esac"#
            ),
        );
        this
    }

    pub fn set_listing(&self, listing: &Value) {
        std::fs::write(self.dir.join("listing.json"), listing.to_string()).unwrap();
    }

    /// Replace the single-item output with arbitrary text.
    pub fn set_item_raw(&self, body: &str) {
        std::fs::write(self.dir.join("item.json"), body).unwrap();
    }

    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.join("calls.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn listing_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.contains("--flat-playlist"))
            .count()
    }
}

pub struct FakeMpv {
    pub socket_path: PathBuf,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl FakeMpv {
    pub fn bind(socket_path: &Path) -> Self {
        let listener = UnixListener::bind(socket_path).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stream).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        if let Ok(v) = serde_json::from_str::<Value>(&line) {
                            let _ = tx.send(v);
                        }
                    }
                });
            }
        });
        Self {
            socket_path: socket_path.to_path_buf(),
            rx,
        }
    }

    pub async fn next_command(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("no command reached the fake mpv")
            .expect("fake mpv listener stopped")
    }

    pub fn try_next_command(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }
}

pub fn listing(ids: &[&str]) -> Value {
    let entries: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "title": format!("Video {}", id)}))
        .collect();
    json!({"playlist_channel": "Test Channel", "entries": entries})
}

pub fn item() -> Value {
    json!({
        "title": "Full Title",
        "channel": "Test Channel",
        "upload_date": "20240115",
        "view_count": 1234567,
        "duration": 3725
    })
}

/// Config pointing every path and binary into `dir`.
pub fn config(dir: &Path, yt_dlp: &Path, mpv: &Path) -> Config {
    let mut config = Config::default();
    config.fetch.binary = Some(yt_dlp.to_path_buf());
    config.fetch.listing_timeout_secs = 10;
    config.fetch.item_timeout_secs = 10;
    config.enrich.delay_ms = 0;
    config.player.binary = Some(mpv.to_path_buf());
    config.player.socket_path = dir.join("mpv.sock");
    config.player.startup_attempts = 3;
    config.player.startup_interval_ms = 10;
    config.player.probe_timeout_ms = 100;
    config.player.command_timeout_ms = 1000;
    config.paths.cache_dir = dir.join("cache");
    config.paths.state_file = dir.join("config").join("shuffle_state.json");
    config
}
