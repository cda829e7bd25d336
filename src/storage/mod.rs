pub mod file;

pub use file::FileStorage;

use crate::error::{Error, Result};
use crate::snippet::SnippetHistory;

/// Everything recovered from a storage root at startup.
///
/// Histories that could not be read or decoded are reported in `failures`
/// instead of aborting the whole load.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub histories: Vec<(String, SnippetHistory)>,
    pub failures: Vec<Error>,
}

/// Persistence medium for snippet histories, one record per identity.
///
/// Implementations must preserve:
/// - Whole-history writes: a persisted record always holds the full history
/// - Atomic replacement (a reader never sees a half-written record)
/// - Completion before return: `Ok` means the state is durable
/// - `Error::Unsynced` only when the change is already visible on the medium
///   and only its durability is unconfirmed; any other error means the
///   previous record is still in place
pub trait Storage: Send + Sync {
    /// Read every persisted history.
    ///
    /// Returns Err only when the storage root itself cannot be enumerated.
    fn load_all(&self) -> Result<LoadOutcome>;

    /// Replace the persisted history of `id` with `history`
    fn persist_history(&self, id: &str, history: &SnippetHistory) -> Result<()>;

    /// Remove the persisted history of `id`; removing an absent record succeeds
    fn remove_history(&self, id: &str) -> Result<()>;
}
