use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Snippet not found: {0}")]
    NotFound(String),

    #[error("Persistence failure at {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    /// The record is in place under its final name, but the storage root
    /// could not be fsynced afterwards.
    #[error("Record at {} written but not confirmed durable: {message}", path.display())]
    Unsynced { path: PathBuf, message: String },

    /// A failed add could not be rolled back; the record at `path` outlives it.
    #[error("Snippet {id} left behind at {} after failed add: {message}", path.display())]
    Diverged {
        id: String,
        path: PathBuf,
        message: String,
    },

    #[error("Corrupt record at {}: {message}", path.display())]
    CorruptRecord { path: PathBuf, message: String },

    #[error("Store lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub(crate) fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn unsynced(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Unsynced {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// True when the medium already reflects the attempted change.
    pub fn is_committed(&self) -> bool {
        matches!(self, Error::Unsynced { .. })
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::CorruptRecord {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
