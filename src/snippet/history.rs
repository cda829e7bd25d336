use serde::{Deserialize, Serialize};

/// One immutable snapshot of a snippet.
///
/// `id` is shared by every revision of the same snippet; `version` is the
/// revision's 1-based position in that snippet's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Revision {
    pub id: String,
    pub language: String,
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub version: u64,
}

impl Revision {
    /// First revision of a new snippet
    pub fn initial(id: String, language: String, content: String, timestamp: u64) -> Self {
        Revision {
            id,
            language,
            content,
            timestamp,
            version: 1,
        }
    }
}

/// Ordered, append-only revision sequence for one identity.
///
/// Invariants:
/// - Never empty
/// - `revisions[i].version == i + 1`
/// - Every revision carries the same `id` and `language`
/// - Timestamps are non-decreasing
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SnippetHistory {
    revisions: Vec<Revision>,
}

impl SnippetHistory {
    pub fn new(first: Revision) -> Self {
        SnippetHistory {
            revisions: vec![first],
        }
    }

    /// Rebuild a history read back from storage, checking every invariant.
    ///
    /// Returns Err with a description of the first violation found.
    pub fn from_revisions(id: &str, revisions: Vec<Revision>) -> Result<Self, String> {
        let first = revisions
            .first()
            .ok_or_else(|| "history is empty".to_string())?;
        let language = first.language.clone();

        let mut previous_ts = 0u64;
        for (i, rev) in revisions.iter().enumerate() {
            let expected = i as u64 + 1;
            if rev.id != id {
                return Err(format!(
                    "revision {} belongs to {}, expected {}",
                    expected, rev.id, id
                ));
            }
            if rev.version != expected {
                return Err(format!(
                    "version gap: position {} holds version {}",
                    expected, rev.version
                ));
            }
            if rev.language != language {
                return Err(format!(
                    "language changed at version {}: {} -> {}",
                    expected, language, rev.language
                ));
            }
            if rev.timestamp < previous_ts {
                return Err(format!("timestamp went backwards at version {}", expected));
            }
            previous_ts = rev.timestamp;
        }

        Ok(SnippetHistory { revisions })
    }

    /// Current revision
    pub fn latest(&self) -> &Revision {
        // Non-empty by construction
        &self.revisions[self.revisions.len() - 1]
    }

    pub fn get(&self, version: u64) -> Option<&Revision> {
        let index = usize::try_from(version.checked_sub(1)?).ok()?;
        self.revisions.get(index)
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub(crate) fn len(&self) -> usize {
        self.revisions.len()
    }

    /// Build the successor of the latest revision.
    ///
    /// `id` and `language` are copied forward; the timestamp is clamped so it
    /// never precedes the latest one even if the wall clock stepped back.
    pub fn next_revision(&self, content: String, now: u64) -> Revision {
        let last = self.latest();
        Revision {
            id: last.id.clone(),
            language: last.language.clone(),
            content,
            timestamp: now.max(last.timestamp),
            version: last.version + 1,
        }
    }

    /// History extended by `revision`; `self` is left untouched.
    pub fn with_appended(&self, revision: Revision) -> Self {
        let mut revisions = Vec::with_capacity(self.revisions.len() + 1);
        revisions.extend_from_slice(&self.revisions);
        revisions.push(revision);
        SnippetHistory { revisions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev(id: &str, version: u64, timestamp: u64) -> Revision {
        Revision {
            id: id.to_string(),
            language: "rust".to_string(),
            content: format!("v{}", version),
            timestamp,
            version,
        }
    }

    #[test]
    fn test_next_revision_copies_forward() {
        let history = SnippetHistory::new(Revision::initial(
            "abc".to_string(),
            "go".to_string(),
            "package main".to_string(),
            100,
        ));
        let next = history.next_revision("package util".to_string(), 200);
        assert_eq!(next.id, "abc");
        assert_eq!(next.language, "go");
        assert_eq!(next.content, "package util");
        assert_eq!(next.version, 2);
        assert_eq!(next.timestamp, 200);
    }

    #[test]
    fn test_next_revision_clamps_timestamp() {
        let history = SnippetHistory::new(rev("abc", 1, 500));
        let next = history.next_revision("x".to_string(), 10);
        assert_eq!(next.timestamp, 500);
    }

    #[test]
    fn test_with_appended_leaves_original() {
        let history = SnippetHistory::new(rev("abc", 1, 1));
        let extended = history.with_appended(history.next_revision("x".to_string(), 2));
        assert_eq!(history.len(), 1);
        assert_eq!(extended.len(), 2);
        assert_eq!(extended.latest().version, 2);
        assert_eq!(&extended.revisions()[..1], history.revisions());
    }

    #[test]
    fn test_get_by_version() {
        let history = SnippetHistory::from_revisions(
            "abc",
            vec![rev("abc", 1, 1), rev("abc", 2, 2)],
        )
        .unwrap();
        assert_eq!(history.get(1).unwrap().content, "v1");
        assert_eq!(history.get(2).unwrap().content, "v2");
        assert!(history.get(0).is_none());
        assert!(history.get(3).is_none());
    }

    #[test]
    fn test_from_revisions_rejects_empty() {
        assert!(SnippetHistory::from_revisions("abc", vec![]).is_err());
    }

    #[test]
    fn test_from_revisions_rejects_version_gap() {
        let err = SnippetHistory::from_revisions("abc", vec![rev("abc", 1, 1), rev("abc", 3, 2)])
            .unwrap_err();
        assert!(err.contains("version gap"));
    }

    #[test]
    fn test_from_revisions_rejects_foreign_id() {
        let err = SnippetHistory::from_revisions("abc", vec![rev("abc", 1, 1), rev("def", 2, 2)])
            .unwrap_err();
        assert!(err.contains("belongs to def"));
    }

    #[test]
    fn test_from_revisions_rejects_language_change() {
        let mut second = rev("abc", 2, 2);
        second.language = "python".to_string();
        assert!(SnippetHistory::from_revisions("abc", vec![rev("abc", 1, 1), second]).is_err());
    }

    #[test]
    fn test_from_revisions_rejects_backwards_timestamp() {
        assert!(
            SnippetHistory::from_revisions("abc", vec![rev("abc", 1, 9), rev("abc", 2, 3)])
                .is_err()
        );
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let history = SnippetHistory::new(rev("abc", 1, 7));
        let json = serde_json::to_value(&history).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["id"], "abc");
        assert_eq!(json[0]["version"], 1);
        assert_eq!(json[0]["timestamp"], 7);
    }
}
