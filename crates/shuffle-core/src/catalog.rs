//! Channel catalogs: the per-video record, yt-dlp output parsing and the
//! on-disk cache (`channel_<hash>.json`, one per channel).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::fetch::Fetcher;
use crate::{Result, ShuffleError};

/// Path segments that mark a locator as a whole channel rather than a video.
const COLLECTION_MARKERS: [&str; 4] = ["/@", "/c/", "/user/", "/channel/"];
const LISTING_SUFFIX: &str = "/videos";
/// yt-dlp reports nested channel tabs as entries with a channel id.
const CHANNEL_ID_PREFIX: &str = "UC";
const UNKNOWN: &str = "Unknown";

// ── VideoRecord ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub url: String,
    pub title: String,
    #[serde(rename = "channel", default)]
    pub channel_name: String,
    /// `YYYYMMDD` when known.
    #[serde(
        default,
        deserialize_with = "de_upload_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(rename = "duration", default)]
    pub duration_seconds: u64,
}

/// Fields returned by a single-video metadata fetch.  `None` means yt-dlp
/// didn't report it; the existing value is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub channel_name: Option<String>,
    pub upload_date: Option<String>,
    pub view_count: Option<u64>,
    pub duration_seconds: Option<u64>,
}

impl VideoRecord {
    pub fn merge(&mut self, meta: &VideoMetadata) {
        if let Some(title) = &meta.title {
            self.title = title.clone();
        }
        if let Some(channel) = &meta.channel_name {
            self.channel_name = channel.clone();
        }
        if let Some(date) = &meta.upload_date {
            self.upload_date = Some(date.clone());
        }
        if let Some(views) = meta.view_count {
            self.view_count = views;
        }
        if let Some(duration) = meta.duration_seconds {
            self.duration_seconds = duration;
        }
    }
}

fn valid_upload_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit())).then(|| raw.to_string())
}

// Older cache files store a missing date as "" (or yt-dlp's "NA").
fn de_upload_date<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(valid_upload_date))
}

fn json_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key)?.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn json_u64(v: &Value, key: &str) -> Option<u64> {
    let field = v.get(key)?;
    field
        .as_u64()
        .or_else(|| field.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

// ── locator handling ──────────────────────────────────────────────────────────

/// Normalise user input into the locator handed to yt-dlp.
///
/// Channel references (`/@handle`, `/c/`, `/user/`, `/channel/`) get the
/// `/videos` tab appended so yt-dlp lists uploads.
pub fn normalize_locator(input: &str) -> Result<String> {
    let url = input.trim().trim_end_matches('/');
    if url.is_empty() {
        return Err(ShuffleError::Validation("Empty URL".to_string()));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ShuffleError::Validation(
            "URL must start with http:// or https://".to_string(),
        ));
    }
    if !(url.contains("youtube.com") || url.contains("youtu.be")) {
        return Err(ShuffleError::Validation(
            "URL must be a YouTube URL".to_string(),
        ));
    }

    let is_collection = COLLECTION_MARKERS.iter().any(|m| url.contains(m));
    if is_collection && !url.ends_with(LISTING_SUFFIX) {
        return Ok(format!("{}{}", url, LISTING_SUFFIX));
    }
    Ok(url.to_string())
}

/// Fixed-width cache key: first 12 hex chars of SHA-256(locator).
pub fn cache_key(locator: &str) -> String {
    let digest = Sha256::digest(locator.as_bytes());
    digest[..6].iter().map(|b| format!("{:02x}", b)).collect()
}

// ── yt-dlp output parsing ─────────────────────────────────────────────────────

/// Turn a `--flat-playlist --dump-single-json` document into a catalog.
pub fn parse_listing(data: &Value) -> Result<Vec<VideoRecord>> {
    let entries = data
        .get("entries")
        .and_then(Value::as_array)
        .ok_or_else(|| ShuffleError::Validation("Invalid response from yt-dlp".to_string()))?;

    let channel_name = ["playlist_channel", "playlist_uploader", "uploader", "channel"]
        .iter()
        .find_map(|k| json_str(data, k))
        .unwrap_or(UNKNOWN)
        .to_string();

    let videos: Vec<VideoRecord> = entries
        .iter()
        .filter_map(|entry| {
            let id = json_str(entry, "id")?;
            if id.starts_with(CHANNEL_ID_PREFIX) {
                return None;
            }
            Some(VideoRecord {
                url: json_str(entry, "url")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id)),
                title: json_str(entry, "title").unwrap_or(UNKNOWN).to_string(),
                channel_name: channel_name.clone(),
                upload_date: json_str(entry, "upload_date").and_then(valid_upload_date),
                view_count: json_u64(entry, "view_count").unwrap_or(0),
                duration_seconds: json_u64(entry, "duration").unwrap_or(0),
            })
        })
        .collect();

    if videos.is_empty() {
        return Err(ShuffleError::Validation(
            "No videos found in channel".to_string(),
        ));
    }
    Ok(videos)
}

/// Pull the enrichable fields out of a single-video `--dump-single-json`.
pub fn parse_item(data: &Value) -> Result<VideoMetadata> {
    if !data.is_object() {
        return Err(ShuffleError::Validation(
            "expected a JSON object for video metadata".to_string(),
        ));
    }
    Ok(VideoMetadata {
        title: json_str(data, "title").map(str::to_string),
        channel_name: json_str(data, "channel")
            .or_else(|| json_str(data, "uploader"))
            .map(str::to_string),
        upload_date: json_str(data, "upload_date").and_then(valid_upload_date),
        view_count: json_u64(data, "view_count"),
        duration_seconds: json_u64(data, "duration"),
    })
}

// ── CatalogCache ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogOrigin {
    Cache,
    Fetched,
}

/// A resolved catalog plus any recoverable problems met on the way
/// (corrupt cache file, failed cache write).  Callers log the warnings.
#[derive(Debug)]
pub struct Resolution {
    pub videos: Vec<VideoRecord>,
    pub origin: CatalogOrigin,
    pub warnings: Vec<ShuffleError>,
}

pub struct CatalogCache {
    dir: PathBuf,
    fetcher: Fetcher,
}

impl CatalogCache {
    pub fn new(dir: PathBuf, fetcher: Fetcher) -> Self {
        Self { dir, fetcher }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn cache_path(&self, locator: &str) -> PathBuf {
        self.dir.join(format!("channel_{}.json", cache_key(locator)))
    }

    /// Return the catalog for an already-normalised locator, from cache when
    /// possible.
    pub async fn resolve(&self, locator: &str, force_refresh: bool) -> Result<Resolution> {
        let path = self.cache_path(locator);
        let mut warnings = Vec::new();

        if !force_refresh {
            match read_cache(&path).await {
                Ok(Some(videos)) => {
                    info!("catalog: {} videos from cache {:?}", videos.len(), path);
                    return Ok(Resolution {
                        videos,
                        origin: CatalogOrigin::Cache,
                        warnings,
                    });
                }
                Ok(None) => debug!("catalog: no cache file for {}", locator),
                Err(corrupt) => {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        warn!("catalog: could not remove corrupt cache {:?}: {}", path, e);
                    }
                    warnings.push(corrupt);
                }
            }
        }

        info!("catalog: fetching {}", locator);
        let data = self.fetcher.fetch_listing(locator).await?;
        let videos = parse_listing(&data)?;
        info!("catalog: fetched {} videos", videos.len());

        if let Err(e) = self.store(locator, &videos).await {
            warnings.push(e);
        }
        Ok(Resolution {
            videos,
            origin: CatalogOrigin::Fetched,
            warnings,
        })
    }

    /// Write a catalog to its cache file (pretty-printed JSON).
    pub async fn store(&self, locator: &str, videos: &[VideoRecord]) -> Result<()> {
        let path = self.cache_path(locator);
        let json = serde_json::to_string_pretty(videos)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ShuffleError::persistence(&self.dir, e))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| ShuffleError::persistence(&path, e))?;
        debug!("catalog: wrote {} videos to {:?}", videos.len(), path);
        Ok(())
    }
}

/// `Ok(None)` when there is no readable cache file; `Err(CacheCorruption)`
/// when its content is unusable.
async fn read_cache(path: &Path) -> Result<Option<Vec<VideoRecord>>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            warn!("catalog: could not read cache {:?}: {}", path, e);
            return Ok(None);
        }
    };
    let corrupt = |reason: String| ShuffleError::CacheCorruption {
        path: path.to_path_buf(),
        reason,
    };
    let videos: Vec<VideoRecord> =
        serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
    if videos.is_empty() {
        return Err(corrupt("empty catalog".to_string()));
    }
    Ok(Some(videos))
}
