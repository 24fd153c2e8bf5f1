use std::collections::HashMap;
use std::sync::Mutex;

use newsroom_core::{now_ms, ContentId, ContentState, LedgerEntry, LedgerEvent};

use crate::traits::{Ledger, LedgerError};

/// In-memory ledger for tests and one-shot runs. Not durable.
#[derive(Default)]
pub struct InMemoryLedger {
    inner: Mutex<HashMap<ContentId, Vec<LedgerEntry>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ledger for InMemoryLedger {
    fn append(
        &self,
        content_id: &ContentId,
        after: u64,
        event: LedgerEvent,
        state: ContentState,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut inner = self.inner.lock().map_err(|_| LedgerError::storage("ledger lock poisoned"))?;
        let entries = inner.entry(content_id.clone()).or_default();
        let last = entries.len() as u64;
        if last != after {
            return Err(LedgerError::Conflict { content_id: content_id.clone(), expected: after, found: last });
        }
        let entry = LedgerEntry {
            content_id: content_id.clone(),
            ordinal: last + 1,
            event,
            state,
            recorded_at_ms: now_ms(),
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    fn read(&self, content_id: &ContentId) -> Result<Vec<LedgerEntry>, LedgerError> {
        let inner = self.inner.lock().map_err(|_| LedgerError::storage("ledger lock poisoned"))?;
        Ok(inner.get(content_id).cloned().unwrap_or_default())
    }

    fn content_ids(&self) -> Result<Vec<ContentId>, LedgerError> {
        let inner = self.inner.lock().map_err(|_| LedgerError::storage("ledger lock poisoned"))?;
        let mut ids: Vec<ContentId> = inner.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
