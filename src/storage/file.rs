use crate::config::Config;
use crate::error::{Error, Result};
use crate::snippet::{Revision, SnippetHistory};
use crate::storage::{LoadOutcome, Storage};
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const HISTORY_EXT: &str = "json";
const TMP_EXT: &str = "json.tmp";

/// File-based storage: one JSON document per snippet identity.
///
/// Files under the storage root:
/// - `<id>.json`: the full revision history of `<id>` (pretty-printed JSON array)
/// - `<id>.json.tmp`: temporary file for atomic history writes
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage rooted at the configured storage directory
    pub fn new(config: &Config) -> Self {
        FileStorage {
            dir: config.get_storage_dir().clone(),
        }
    }

    /// Create FileStorage with a custom root (for testing)
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        FileStorage { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the history file backing `id`
    pub fn history_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, HISTORY_EXT))
    }

    fn tmp_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, TMP_EXT))
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::persistence(&self.dir, format!("create storage root: {}", e)))
    }

    fn read_history(&self, path: &Path, id: &str) -> Result<SnippetHistory> {
        let data = fs::read_to_string(path)
            .map_err(|e| Error::persistence(path, format!("read history: {}", e)))?;
        let revisions: Vec<Revision> =
            serde_json::from_str(&data).map_err(|e| Error::corrupt(path, e))?;
        SnippetHistory::from_revisions(id, revisions).map_err(|msg| Error::corrupt(path, msg))
    }

    /// Identity carried by a directory entry, or None if the entry is not a history file.
    fn history_id(path: &Path) -> Option<&str> {
        if path.extension().and_then(|ext| ext.to_str()) != Some(HISTORY_EXT) {
            return None;
        }
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
    }
}

impl Storage for FileStorage {
    fn load_all(&self) -> Result<LoadOutcome> {
        let mut outcome = LoadOutcome::default();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            // Nothing persisted yet; the root is created on first write
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(outcome),
            Err(e) => {
                return Err(Error::persistence(
                    &self.dir,
                    format!("enumerate storage root: {}", e),
                ))
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    outcome
                        .failures
                        .push(Error::persistence(&self.dir, format!("read dir entry: {}", e)));
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(id) = Self::history_id(&path) else {
                debug!("skipping non-history file {}", path.display());
                continue;
            };

            match self.read_history(&path, id) {
                Ok(history) => outcome.histories.push((id.to_string(), history)),
                Err(e) => {
                    warn!("skipping unreadable history: {}", e);
                    outcome.failures.push(e);
                }
            }
        }

        Ok(outcome)
    }

    fn persist_history(&self, id: &str, history: &SnippetHistory) -> Result<()> {
        self.ensure_dir()?;

        let path = self.history_path(id);
        let tmp_path = self.tmp_path(id);

        let bytes = serde_json::to_vec_pretty(history)
            .map_err(|e| Error::persistence(&path, format!("serialize history: {}", e)))?;

        if let Err(e) = write_tmp(&tmp_path, &bytes) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::persistence(&path, format!("rename temp file: {}", e)));
        }

        // The new history is visible from here on
        sync_dir(&self.dir).map_err(|e| Error::unsynced(&path, e))
    }

    fn remove_history(&self, id: &str) -> Result<()> {
        let path = self.history_path(id);
        match fs::remove_file(&path) {
            Ok(()) => sync_dir(&self.dir).map_err(|e| Error::unsynced(&path, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::persistence(&path, format!("remove history: {}", e))),
        }
    }
}

/// Write `bytes` to a fresh temp file and fsync it before it is renamed.
fn write_tmp(tmp_path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(tmp_path)
        .map_err(|e| Error::persistence(tmp_path, format!("create temp file: {}", e)))?;
    file.write_all(bytes)
        .map_err(|e| Error::persistence(tmp_path, format!("write history: {}", e)))?;
    file.sync_all()
        .map_err(|e| Error::persistence(tmp_path, format!("fsync temp file: {}", e)))
}

/// Fsync a directory so renames and unlinks inside it are persisted.
fn sync_dir(dir: &Path) -> Result<()> {
    let handle = File::open(dir)
        .map_err(|e| Error::persistence(dir, format!("open storage root: {}", e)))?;
    handle
        .sync_all()
        .map_err(|e| Error::persistence(dir, format!("fsync storage root: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (FileStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::with_dir(temp_dir.path().join("snippets"));
        (storage, temp_dir)
    }

    fn history(id: &str, versions: u64) -> SnippetHistory {
        let mut h = SnippetHistory::new(Revision::initial(
            id.to_string(),
            "rust".to_string(),
            "fn main() {}".to_string(),
            1,
        ));
        for v in 2..=versions {
            h = h.with_appended(h.next_revision(format!("// v{}", v), v));
        }
        h
    }

    #[test]
    fn test_new_uses_configured_root() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::new();
        config.set_storage_dir(temp_dir.path().join("configured"));

        let storage = FileStorage::new(&config);
        storage.persist_history("abc", &history("abc", 1)).unwrap();
        assert!(temp_dir.path().join("configured").join("abc.json").exists());
    }

    #[test]
    fn test_load_missing_root_is_empty() {
        let (storage, _temp_dir) = create_test_storage();
        let outcome = storage.load_all().unwrap();
        assert!(outcome.histories.is_empty());
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_persist_and_load_history() {
        let (storage, _temp_dir) = create_test_storage();
        storage.persist_history("abc", &history("abc", 3)).unwrap();

        let outcome = storage.load_all().unwrap();
        assert_eq!(outcome.histories.len(), 1);
        let (id, loaded) = &outcome.histories[0];
        assert_eq!(id, "abc");
        assert_eq!(loaded, &history("abc", 3));
    }

    #[test]
    fn test_persist_overwrites_whole_history() {
        let (storage, _temp_dir) = create_test_storage();
        storage.persist_history("abc", &history("abc", 1)).unwrap();
        storage.persist_history("abc", &history("abc", 4)).unwrap();

        let data = fs::read_to_string(storage.history_path("abc")).unwrap();
        let revisions: Vec<Revision> = serde_json::from_str(&data).unwrap();
        assert_eq!(revisions.len(), 4);
        assert!(!storage.tmp_path("abc").exists());
    }

    #[test]
    fn test_load_skips_corrupt_file() {
        let (storage, _temp_dir) = create_test_storage();
        storage.persist_history("good", &history("good", 2)).unwrap();
        fs::write(storage.history_path("bad"), "{ not json").unwrap();

        let outcome = storage.load_all().unwrap();
        assert_eq!(outcome.histories.len(), 1);
        assert_eq!(outcome.histories[0].0, "good");
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(outcome.failures[0], Error::CorruptRecord { .. }));
    }

    #[test]
    fn test_load_rejects_invariant_violation() {
        let (storage, _temp_dir) = create_test_storage();
        storage.persist_history("abc", &history("abc", 1)).unwrap();
        // Same content under a different name: ids no longer match the stem
        fs::copy(storage.history_path("abc"), storage.history_path("other")).unwrap();

        let outcome = storage.load_all().unwrap();
        assert_eq!(outcome.histories.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
    }

    #[test]
    fn test_load_ignores_other_files() {
        let (storage, _temp_dir) = create_test_storage();
        storage.persist_history("abc", &history("abc", 1)).unwrap();
        fs::write(storage.dir().join("notes.txt"), "hello").unwrap();
        fs::write(storage.tmp_path("stale"), "[").unwrap();

        let outcome = storage.load_all().unwrap();
        assert_eq!(outcome.histories.len(), 1);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let (storage, _temp_dir) = create_test_storage();
        // A directory squatting on the target name makes the rename fail
        fs::create_dir_all(storage.history_path("abc")).unwrap();

        let err = storage.persist_history("abc", &history("abc", 1)).unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert!(!err.is_committed());
        assert!(!storage.tmp_path("abc").exists());
    }

    #[test]
    fn test_remove_history() {
        let (storage, _temp_dir) = create_test_storage();
        storage.persist_history("abc", &history("abc", 1)).unwrap();
        storage.remove_history("abc").unwrap();
        assert!(!storage.history_path("abc").exists());

        // Already gone
        storage.remove_history("abc").unwrap();
    }
}
