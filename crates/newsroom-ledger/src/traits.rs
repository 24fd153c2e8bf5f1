use newsroom_core::{ContentId, ContentState, LedgerEntry, LedgerEvent};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger storage failure: {0}")]
    Storage(String),
    #[error("ledger entry could not be encoded: {0}")]
    Encode(String),
    #[error("ledger for {content_id} is corrupt: {detail}")]
    Corrupt { content_id: ContentId, detail: String },
    #[error("ledger for {content_id} moved on: expected last ordinal {expected}, found {found}")]
    Conflict { content_id: ContentId, expected: u64, found: u64 },
}

impl LedgerError {
    pub fn storage<E: std::fmt::Display>(e: E) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Append-only keyed-sequence store.
///
/// `append` is compare-and-append: it writes entry `after + 1` only while
/// `after` is still the last ordinal for the content id (0 for a new id), and
/// returns `Conflict` otherwise. Ordinals start at 1 and are gapless per id.
/// A failed append must return an error, never drop the entry.
pub trait Ledger: Send + Sync {
    fn append(
        &self,
        content_id: &ContentId,
        after: u64,
        event: LedgerEvent,
        state: ContentState,
    ) -> Result<LedgerEntry, LedgerError>;

    /// Entries for one content id in ordinal order. Unknown ids yield an empty list.
    fn read(&self, content_id: &ContentId) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Every content id with at least one entry.
    fn content_ids(&self) -> Result<Vec<ContentId>, LedgerError>;
}
