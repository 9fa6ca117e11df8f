use std::path::PathBuf;

/// Every failure the shuffle core can report.
///
/// Variants that describe the user's requested action (validation, fetch,
/// player startup/command) are meant to be surfaced as one human-readable
/// message.  `CacheCorruption`, `Persistence` and `Enrichment` describe
/// best-effort subsystems; callers log them and carry on.
#[derive(Debug, thiserror::Error)]
pub enum ShuffleError {
    #[error("{0}")]
    Validation(String),

    #[error("yt-dlp timed out after {secs}s")]
    FetchTimeout { secs: u64 },

    #[error("yt-dlp failed: {0}")]
    FetchProcess(String),

    #[error("cache file {path:?} is corrupt: {reason}")]
    CacheCorruption { path: PathBuf, reason: String },

    #[error("could not launch mpv: {0}")]
    PlayerLaunch(String),

    #[error("mpv did not create its IPC socket after {attempts} attempts")]
    StartupTimeout { attempts: u32 },

    #[error("could not send command to mpv: {0}")]
    PlaybackCommandFailed(String),

    #[error("could not write {path:?}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("metadata enrichment failed: {0}")]
    Enrichment(String),

    #[error("catalog is empty")]
    EmptyCatalog,

    #[error("no channel loaded")]
    NoSource,

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ShuffleError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShuffleError>;
