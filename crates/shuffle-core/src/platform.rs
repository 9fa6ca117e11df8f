use std::path::PathBuf;

const APP_DIR: &str = "yt-shuffle";

/// Well-known IPC socket path the player is launched with.
pub const MPV_SOCKET_PATH: &str = "/tmp/mpv-shuffle-socket";

pub fn data_dir() -> PathBuf {
    // ~/.local/share on macOS too, rather than Application Support
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".local")
        .join("share")
        .join(APP_DIR)
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(APP_DIR)
}

pub fn cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".cache")
        .join(APP_DIR)
}

fn find_beside_exe(name: &str) -> Option<PathBuf> {
    let current_exe = std::env::current_exe().ok()?;
    let dir = current_exe.parent()?;
    let p = dir.join(name);
    if p.exists() {
        return Some(p);
    }
    let p = dir.join("external").join(name);
    if p.exists() {
        return Some(p);
    }
    None
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|p| p.exists())
}

fn find_binary(env_override: &str, name: &str) -> Option<PathBuf> {
    if let Ok(p) = std::env::var(env_override) {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }
    find_beside_exe(name).or_else(|| find_on_path(name))
}

/// Find yt-dlp.
///
/// Searches in order:
/// 1. `YT_DLP_PATH` environment variable
/// 2. Beside the current executable (or its `external/` folder)
/// 3. PATH
pub fn find_yt_dlp_binary() -> Option<PathBuf> {
    find_binary("YT_DLP_PATH", "yt-dlp")
}

/// Find mpv, same search order as [`find_yt_dlp_binary`] with `MPV_PATH`.
pub fn find_mpv_binary() -> Option<PathBuf> {
    find_binary("MPV_PATH", "mpv")
}
