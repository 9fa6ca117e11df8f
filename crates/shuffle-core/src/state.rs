use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::history::ShuffleHistory;
use crate::{Result, ShuffleError};

/// Persisted progress for one channel, keyed by its locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    /// Catalog indices in the order they were played.
    pub history: Vec<i64>,
    /// Cursor into `history`, -1 when empty.
    pub position: i64,
    #[serde(deserialize_with = "de_last_used")]
    pub last_used: DateTime<Local>,
}

/// Accepts RFC 3339 and offset-less ISO-8601 (`2024-05-01T10:00:00.123456`),
/// the latter read as local time.
fn de_last_used<'de, D>(deserializer: D) -> std::result::Result<DateTime<Local>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    // A local time skipped by a DST jump has no mapping; take it as UTC.
    Some(
        Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(|| naive.and_utc().with_timezone(&Local)),
    )
}

impl ChannelState {
    pub fn snapshot(history: &ShuffleHistory) -> Self {
        Self {
            history: history.entries().iter().map(|&i| i as i64).collect(),
            position: history.position(),
            last_used: Local::now(),
        }
    }

    /// Rebuild the history, dropping entries that don't fit `catalog_size`.
    pub fn to_history(&self, catalog_size: usize) -> ShuffleHistory {
        ShuffleHistory::restore(&self.history, self.position, catalog_size)
    }
}

pub type StateDocument = HashMap<String, ChannelState>;

/// Durable store for the state document.
///
/// Writes go to a temp file in the same directory which is flushed, synced
/// and renamed over the canonical file, so a reader only ever sees the old
/// or the new document.
pub struct StateStore {
    state_file: PathBuf,
}

impl StateStore {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    pub fn path(&self) -> &Path {
        &self.state_file
    }

    /// Read the state document.  Missing → empty.  Unparsable → moved aside
    /// to a backup and empty.
    pub fn load(&self) -> StateDocument {
        let content = match std::fs::read_to_string(&self.state_file) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("state: no state file at {:?}", self.state_file);
                return StateDocument::new();
            }
            Err(e) => {
                error!("state: could not read {:?}: {}", self.state_file, e);
                return StateDocument::new();
            }
        };

        match serde_json::from_str::<StateDocument>(&content) {
            Ok(doc) => {
                info!("state: loaded {} channel(s)", doc.len());
                doc
            }
            Err(e) => {
                error!("state: corrupted state file {:?}: {}", self.state_file, e);
                self.back_up_corrupt();
                StateDocument::new()
            }
        }
    }

    fn back_up_corrupt(&self) {
        let backup = self.backup_path();
        match std::fs::rename(&self.state_file, &backup) {
            Ok(()) => info!("state: backed up corrupted state to {:?}", backup),
            Err(e) => warn!(
                "state: could not back up {:?} to {:?}: {}",
                self.state_file, backup, e
            ),
        }
    }

    /// `<name>.bak`, or `<name>.bak.<timestamp>` when that is taken.
    fn backup_path(&self) -> PathBuf {
        let mut name = self
            .state_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".bak");
        let plain = self.state_file.with_file_name(&name);
        if !plain.exists() {
            return plain;
        }
        name.push(format!(".{}", Local::now().format("%Y%m%d%H%M%S")));
        self.state_file.with_file_name(name)
    }

    pub fn save(&self, doc: &StateDocument) -> Result<()> {
        let dir = match self.state_file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let fail = |e: &dyn std::fmt::Display| ShuffleError::persistence(&self.state_file, e);

        std::fs::create_dir_all(&dir).map_err(|e| fail(&e))?;
        let json = serde_json::to_string_pretty(doc)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".shuffle_state")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| fail(&e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| fail(&e))?;
        tmp.flush().map_err(|e| fail(&e))?;
        tmp.as_file().sync_all().map_err(|e| fail(&e))?;
        tmp.persist(&self.state_file).map_err(|e| fail(&e.error))?;

        debug!("state: saved {} channel(s)", doc.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> StateStore {
        StateStore::new(dir.path().join("config").join("shuffle_state.json"))
    }

    fn sample() -> StateDocument {
        let mut doc = StateDocument::new();
        doc.insert(
            "https://www.youtube.com/@a/videos".to_string(),
            ChannelState {
                history: vec![2, 4, 1],
                position: 1,
                last_used: Local::now(),
            },
        );
        doc
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).load().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let doc = sample();
        store.save(&doc).unwrap();
        assert_eq!(store.load(), doc);
    }

    #[test]
    fn test_snapshot_round_trip_prunes_on_shrunk_catalog() {
        let mut h = ShuffleHistory::restore(&[2, 9, 4], 2, 10);
        h.retreat();
        let state = ChannelState::snapshot(&h);
        assert_eq!(state.history, vec![2, 9, 4]);
        assert_eq!(state.position, 1);

        assert_eq!(state.to_history(10), h);

        let pruned = state.to_history(5);
        assert_eq!(pruned.entries(), &[2, 4]);
        assert_eq!(pruned.current(), Some(2));
    }

    #[test]
    fn test_offset_less_timestamps_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(
            store.path(),
            r#"{
                "https://www.youtube.com/@a/videos": {"history": [2, 4, 1], "position": 1, "last_used": "2024-05-01T10:00:00.123456"},
                "https://www.youtube.com/@b/videos": {"history": [], "position": -1, "last_used": "2024-05-02T08:30:00"},
                "https://www.youtube.com/@c/videos": {"history": [0], "position": 0, "last_used": "2024-05-03T09:00:00+02:00"}
            }"#,
        )
        .unwrap();

        let doc = store.load();
        assert_eq!(doc.len(), 3);
        assert!(store.path().exists());
        assert!(!store.path().with_file_name("shuffle_state.json.bak").exists());

        let a = &doc["https://www.youtube.com/@a/videos"];
        assert_eq!(a.history, vec![2, 4, 1]);
        assert_eq!(a.position, 1);
        assert_eq!(
            a.last_used.naive_local(),
            NaiveDateTime::parse_from_str("2024-05-01T10:00:00.123456", "%Y-%m-%dT%H:%M:%S%.f")
                .unwrap()
        );
        let b = &doc["https://www.youtube.com/@b/videos"];
        let c = &doc["https://www.youtube.com/@c/videos"];
        assert!(a.last_used < b.last_used && b.last_used < c.last_used);
    }

    #[test]
    fn test_parse_timestamp() {
        assert!(parse_timestamp("2024-05-01T10:00:00").is_some());
        assert!(parse_timestamp("2024-05-01 10:00:00.5").is_some());
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_unparsable_timestamp_counts_as_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(
            store.path(),
            r#"{"x": {"history": [], "position": -1, "last_used": "yesterday"}}"#,
        )
        .unwrap();
        assert!(store.load().is_empty());
        assert!(store.path().with_file_name("shuffle_state.json.bak").exists());
    }

    #[test]
    fn test_corrupt_file_is_backed_up() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load().is_empty());
        assert!(!store.path().exists());
        let backup = store.path().with_file_name("shuffle_state.json.bak");
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "{ not json");
    }

    #[test]
    fn test_existing_backup_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let parent = store.path().parent().unwrap().to_path_buf();
        std::fs::create_dir_all(&parent).unwrap();
        let backup = parent.join("shuffle_state.json.bak");
        std::fs::write(&backup, "older backup").unwrap();
        std::fs::write(store.path(), "[1, 2").unwrap();

        assert!(store.load().is_empty());
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "older backup");
        let extra: Vec<_> = std::fs::read_dir(&parent)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("shuffle_state.json.bak."))
            .collect();
        assert_eq!(extra.len(), 1);
    }

    #[test]
    fn test_wrong_shape_counts_as_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "[1, 2, 3]").unwrap();
        assert!(store.load().is_empty());
        assert!(store.path().with_file_name("shuffle_state.json.bak").exists());
    }

    #[test]
    fn test_interrupted_write_leaves_previous_document() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let old = sample();
        store.save(&old).unwrap();

        let mut new = sample();
        new.insert(
            "https://www.youtube.com/@b/videos".to_string(),
            ChannelState {
                history: vec![0; 64],
                position: 63,
                last_used: Local::now(),
            },
        );
        let full = serde_json::to_string_pretty(&new).unwrap();
        let parent = store.path().parent().unwrap();

        // A crash mid-save leaves at most a partial temp sibling behind.
        for cut in [0, 1, full.len() / 2, full.len() - 1] {
            let mut tmp = tempfile::Builder::new()
                .prefix(".shuffle_state")
                .suffix(".tmp")
                .tempfile_in(parent)
                .unwrap();
            tmp.write_all(&full.as_bytes()[..cut]).unwrap();
            let (_file, _path) = tmp.keep().unwrap();
            assert_eq!(store.load(), old);
        }

        store.save(&new).unwrap();
        assert_eq!(store.load(), new);
    }
}
