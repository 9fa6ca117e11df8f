//! mpv lifecycle and IPC command channel.
//!
//! ```text
//!   NotRunning ──ensure_running()──► Starting ──socket connectable──► Running
//!        ▲                                                              │
//!        └──────────────────────── probe fails ◄────────────────────────┘
//! ```
//!
//! mpv is launched detached in its own process group with `--idle=yes`, so it
//! outlives this process and stays up between videos.  Every command opens a
//! fresh connection to the well-known socket, writes one JSON line and closes;
//! no response is read.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tracing::{debug, info, warn};

use crate::config::PlayerConfig;
use crate::{Result, ShuffleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    NotRunning,
    Starting,
    Running,
}

/// Try connecting to the IPC socket within `timeout`.
///
/// Any error, including the timeout, counts as not running.  Used by the
/// controller and by the front end's health poll.
pub async fn probe(socket_path: &Path, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, UnixStream::connect(socket_path)).await,
        Ok(Ok(_))
    )
}

pub struct PlayerController {
    binary: PathBuf,
    socket_path: PathBuf,
    audio_filter: String,
    probe_timeout: Duration,
    startup_attempts: u32,
    startup_interval: Duration,
    command_timeout: Duration,
    state: PlayerState,
    /// mpv launched by this controller, kept so it can be reaped once it exits.
    child: Option<std::process::Child>,
}

impl PlayerController {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            binary: config.resolved_binary(),
            socket_path: config.socket_path.clone(),
            audio_filter: config.audio_filter.clone(),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
            startup_attempts: config.startup_attempts.max(1),
            startup_interval: Duration::from_millis(config.startup_interval_ms),
            command_timeout: Duration::from_millis(config.command_timeout_ms),
            state: PlayerState::NotRunning,
            child: None,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Last state observed by this controller.
    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub async fn is_running(&mut self) -> bool {
        self.reap_child();
        let up = probe(&self.socket_path, self.probe_timeout).await;
        if !up && self.state == PlayerState::Running {
            info!("mpv: socket no longer reachable");
        }
        self.state = if up {
            PlayerState::Running
        } else {
            PlayerState::NotRunning
        };
        up
    }

    /// Collect the exit status of a launched mpv that has quit, so it does
    /// not linger as a zombie.
    fn reap_child(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                info!("mpv: pid={} exited with {}", child.id(), status);
                self.child = None;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("mpv: could not check pid={}: {}", child.id(), e);
                self.child = None;
            }
        }
    }

    fn launch_args(&self) -> Vec<String> {
        vec![
            "--idle=yes".to_string(),
            "--force-window=yes".to_string(),
            format!("--af={}", self.audio_filter),
            format!("--input-ipc-server={}", self.socket_path.display()),
        ]
    }

    /// Start mpv unless its socket already accepts connections.
    pub async fn ensure_running(&mut self) -> Result<()> {
        if self.is_running().await {
            return Ok(());
        }

        // A socket file left by a dead mpv would make the new one fail to bind.
        match tokio::fs::remove_file(&self.socket_path).await {
            Ok(()) => debug!("mpv: removed stale socket {:?}", self.socket_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("mpv: could not remove stale socket {:?}: {}", self.socket_path, e),
        }

        info!("mpv: spawning {}", self.binary.display());
        self.state = PlayerState::Starting;
        if let Err(e) = self.spawn_detached() {
            self.state = PlayerState::NotRunning;
            return Err(e);
        }

        for attempt in 1..=self.startup_attempts {
            if probe(&self.socket_path, self.probe_timeout).await {
                info!("mpv: IPC socket up after {} attempt(s)", attempt);
                self.state = PlayerState::Running;
                return Ok(());
            }
            tokio::time::sleep(self.startup_interval).await;
        }

        self.state = PlayerState::NotRunning;
        Err(ShuffleError::StartupTimeout {
            attempts: self.startup_attempts,
        })
    }

    // std rather than tokio: the child is only polled with `try_wait` and
    // must not be killed when its handle drops.
    fn spawn_detached(&mut self) -> Result<()> {
        use std::os::unix::process::CommandExt;

        let child = std::process::Command::new(&self.binary)
            .args(self.launch_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ShuffleError::PlayerLaunch(format!(
                        "{} not found. Install mpv or set MPV_PATH",
                        self.binary.display()
                    ))
                } else {
                    ShuffleError::PlayerLaunch(e.to_string())
                }
            })?;
        debug!("mpv: launched pid={}", child.id());
        self.child = Some(child);
        Ok(())
    }

    /// Write `{"command": [...]}` on a fresh connection.  Not retried.
    pub async fn send_command(&self, command: Value) -> Result<()> {
        let mut line = serde_json::to_string(&json!({ "command": command }))?;
        line.push('\n');

        let write = async {
            let mut stream = UnixStream::connect(&self.socket_path).await?;
            stream.write_all(line.as_bytes()).await?;
            stream.shutdown().await
        };

        match tokio::time::timeout(self.command_timeout, write).await {
            Ok(Ok(())) => {
                debug!("mpv: sent {}", line.trim_end());
                Ok(())
            }
            Ok(Err(e)) => Err(ShuffleError::PlaybackCommandFailed(e.to_string())),
            Err(_) => Err(ShuffleError::PlaybackCommandFailed(format!(
                "timed out after {}ms",
                self.command_timeout.as_millis()
            ))),
        }
    }

    /// Make sure mpv is up, then replace whatever it is playing with `url`.
    pub async fn load_and_play(&mut self, url: &str) -> Result<()> {
        self.ensure_running().await?;
        self.send_command(json!(["loadfile", url, "replace"])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args() {
        let config = PlayerConfig {
            binary: Some(PathBuf::from("/usr/bin/mpv")),
            socket_path: PathBuf::from("/tmp/test.sock"),
            ..PlayerConfig::default()
        };
        let args = PlayerController::new(&config).launch_args();
        assert_eq!(args[0], "--idle=yes");
        assert_eq!(args[1], "--force-window=yes");
        assert!(args[2].starts_with("--af=lavfi=[dynaudnorm"));
        assert_eq!(args[3], "--input-ipc-server=/tmp/test.sock");
    }

    #[tokio::test]
    async fn test_exited_player_is_reaped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let binary = dir.path().join("mpv");
        std::fs::write(&binary, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
        let config = PlayerConfig {
            binary: Some(binary),
            socket_path: dir.path().join("mpv.sock"),
            probe_timeout_ms: 50,
            startup_attempts: 2,
            startup_interval_ms: 10,
            ..PlayerConfig::default()
        };

        let mut player = PlayerController::new(&config);
        assert!(player.ensure_running().await.is_err());
        assert!(player.child.is_some());

        let mut reaped = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(!player.is_running().await);
            if player.child.is_none() {
                reaped = true;
                break;
            }
        }
        assert!(reaped, "exited mpv was never reaped");
    }

    #[tokio::test]
    async fn test_probe_missing_socket() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(!probe(&dir.path().join("none.sock"), Duration::from_millis(50)).await);
    }
}
