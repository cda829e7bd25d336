//! Versioned snippet store: in-memory index of revision histories backed by
//! a [`Storage`] medium.
//!
//! Every mutation persists first and commits to memory only once the medium
//! holds the change, so memory never runs ahead of durable state. A write
//! that landed but could not be fsynced (`Error::Unsynced`) is committed and
//! still reported; a failed add is rolled back instead. Each identity has its
//! own lock, held across the whole read-modify-persist sequence.

use crate::error::{Error, Result};
use crate::snippet::{Revision, SnippetHistory};
use crate::storage::{FileStorage, Storage};
use crate::{current_timestamp_millis, generate_id};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// One identity's history. `None` while an add is still persisting, and
/// after the identity was deleted.
type Slot = Arc<Mutex<Option<SnippetHistory>>>;

#[derive(Default)]
struct Index {
    slots: HashMap<String, Slot>,
}

/// What happened while loading the storage root at startup.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub failures: Vec<Error>,
}

pub struct SnippetStore<S: Storage = FileStorage> {
    storage: S,
    index: RwLock<Index>,
    load_report: LoadReport,
}

impl SnippetStore<FileStorage> {
    /// Open a store over a directory of history files
    pub fn open_dir(dir: impl Into<PathBuf>) -> Self {
        SnippetStore::open(FileStorage::with_dir(dir))
    }
}

impl<S: Storage> SnippetStore<S> {
    /// Load every persisted history from `storage`.
    ///
    /// Never fails: unreadable records, or an unreadable storage root, are
    /// logged and kept in [`SnippetStore::load_report`].
    pub fn open(storage: S) -> Self {
        let mut index = Index::default();
        let mut report = LoadReport::default();

        match storage.load_all() {
            Ok(outcome) => {
                for (id, history) in outcome.histories {
                    index.slots.insert(id, Arc::new(Mutex::new(Some(history))));
                }
                report.loaded = index.slots.len();
                report.failures = outcome.failures;
            }
            Err(e) => {
                warn!("storage root unavailable, starting empty: {}", e);
                report.failures.push(e);
            }
        }

        info!(
            "snippet store opened: {} histories loaded, {} skipped",
            report.loaded,
            report.failures.len()
        );

        SnippetStore {
            storage,
            index: RwLock::new(index),
            load_report: report,
        }
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Create a snippet and return its new identity.
    ///
    /// The identity is not reachable by any read until its first revision is
    /// durable. A failed add leaves no trace in memory; if its record already
    /// landed it is removed again, and `Error::Diverged` reports a record that
    /// could not be.
    pub fn add_snippet(&self, language: &str, content: &str) -> Result<String> {
        let slot: Slot = Arc::new(Mutex::new(None));
        let mut guard = lock_slot(&slot)?;

        let id = {
            let mut index = self.write_index()?;
            loop {
                let candidate = generate_id();
                if !index.slots.contains_key(&candidate) {
                    index.slots.insert(candidate.clone(), Arc::clone(&slot));
                    break candidate;
                }
            }
        };

        let history = SnippetHistory::new(Revision::initial(
            id.clone(),
            language.to_string(),
            content.to_string(),
            current_timestamp_millis(),
        ));

        if let Err(e) = self.storage.persist_history(&id, &history) {
            warn!("add {} failed: {}", id, e);
            drop(guard);
            self.unlink(&id, &slot)?;
            if e.is_committed() {
                self.roll_back_add(&id, &e)?;
                return Err(Error::Persistence {
                    path: cause_path(&e),
                    message: format!("add rolled back: {}", e),
                });
            }
            return Err(e);
        }

        *guard = Some(history);
        debug!("added snippet {} ({})", id, language);
        Ok(id)
    }

    /// Append a revision with `content` to the history of `id`.
    ///
    /// Returns the new latest revision. On a failed write the in-memory
    /// history is left exactly as it was, unless the medium already holds the
    /// new history (`Error::Unsynced`), in which case memory follows it.
    pub fn update_snippet(&self, id: &str, content: &str) -> Result<Revision> {
        let slot = self.slot(id)?;
        let mut guard = lock_slot(&slot)?;
        let history = guard
            .as_ref()
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let revision = history.next_revision(content.to_string(), current_timestamp_millis());
        let updated = history.with_appended(revision.clone());

        if let Err(e) = self.storage.persist_history(id, &updated) {
            warn!("update {} to version {} failed: {}", id, revision.version, e);
            if e.is_committed() {
                *guard = Some(updated);
            }
            return Err(e);
        }

        *guard = Some(updated);
        debug!("updated snippet {} to version {}", id, revision.version);
        Ok(revision)
    }

    /// Latest revision of `id`
    pub fn fetch_snippet(&self, id: &str) -> Result<Revision> {
        self.with_history(id, |history| history.latest().clone())
    }

    /// Specific revision of `id`
    pub fn fetch_version(&self, id: &str, version: u64) -> Result<Revision> {
        self.with_history(id, |history| history.get(version).cloned())?
            .ok_or_else(|| Error::NotFound(format!("{} version {}", id, version)))
    }

    /// All revisions of `id`, oldest first
    pub fn fetch_version_history(&self, id: &str) -> Result<Vec<Revision>> {
        self.with_history(id, |history| history.revisions().to_vec())
    }

    /// Delete `id` and its backing record.
    ///
    /// The record is removed first; if that fails the identity stays fully
    /// readable and the error is returned. An `Error::Unsynced` removal is
    /// still a removal: the identity is dropped and the error returned.
    pub fn delete_snippet(&self, id: &str) -> Result<()> {
        let slot = self.slot(id)?;
        let mut guard = lock_slot(&slot)?;
        if guard.is_none() {
            return Err(Error::NotFound(id.to_string()));
        }

        let outcome = self.storage.remove_history(id);
        if let Err(e) = &outcome {
            warn!("delete {} failed: {}", id, e);
            if !e.is_committed() {
                return outcome;
            }
        }

        *guard = None;
        drop(guard);
        self.unlink(id, &slot)?;
        debug!("deleted snippet {}", id);
        outcome
    }

    /// Identities currently readable, sorted
    pub fn list_ids(&self) -> Result<Vec<String>> {
        let slots: Vec<(String, Slot)> = {
            let index = self.read_index()?;
            index
                .slots
                .iter()
                .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
                .collect()
        };

        let mut ids = Vec::with_capacity(slots.len());
        for (id, slot) in slots {
            if lock_slot(&slot)?.is_some() {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.list_ids()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn with_history<T>(&self, id: &str, f: impl FnOnce(&SnippetHistory) -> T) -> Result<T> {
        let slot = self.slot(id)?;
        let guard = lock_slot(&slot)?;
        guard
            .as_ref()
            .map(f)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Slot for `id`. The index lock is released before the caller locks
    /// the slot; slot-then-index is the only nesting order allowed.
    fn slot(&self, id: &str) -> Result<Slot> {
        self.read_index()?
            .slots
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn unlink(&self, id: &str, slot: &Slot) -> Result<()> {
        let mut index = self.write_index()?;
        if index.slots.get(id).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            index.slots.remove(id);
        }
        Ok(())
    }

    /// Remove the record a failed add left on the medium.
    fn roll_back_add(&self, id: &str, cause: &Error) -> Result<()> {
        match self.storage.remove_history(id) {
            // Unlinked; only the storage-root fsync failed
            Ok(()) | Err(Error::Unsynced { .. }) => Ok(()),
            Err(e) => {
                warn!("rollback of failed add {} failed: {}", id, e);
                Err(Error::Diverged {
                    id: id.to_string(),
                    path: cause_path(cause),
                    message: format!("{}; rollback: {}", cause, e),
                })
            }
        }
    }

    fn read_index(&self) -> Result<std::sync::RwLockReadGuard<'_, Index>> {
        self.index
            .read()
            .map_err(|_| Error::LockPoisoned("snippet index"))
    }

    fn write_index(&self) -> Result<std::sync::RwLockWriteGuard<'_, Index>> {
        self.index
            .write()
            .map_err(|_| Error::LockPoisoned("snippet index"))
    }
}

fn cause_path(cause: &Error) -> PathBuf {
    match cause {
        Error::Unsynced { path, .. } | Error::Persistence { path, .. } => path.clone(),
        _ => PathBuf::new(),
    }
}

fn lock_slot(slot: &Slot) -> Result<MutexGuard<'_, Option<SnippetHistory>>> {
    slot.lock().map_err(|_| Error::LockPoisoned("snippet history"))
}
