use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use newsroom_core::{now_ms, ContentId, ContentState, LedgerEntry, LedgerEvent};
use newsroom_ledger::{Ledger, LedgerError};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(db_path).with_context(|| format!("open sqlite db {}", db_path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("open in-memory sqlite db")?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        let init_sql = include_str!("../migrations/0001_init.sql");
        conn.execute_batch(init_sql).context("apply ledger schema")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn parse_state(content_id: &ContentId, s: &str) -> Result<ContentState, LedgerError> {
        ContentState::parse(s).ok_or_else(|| LedgerError::Corrupt {
            content_id: content_id.clone(),
            detail: format!("unknown state {s}"),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, LedgerError> {
        self.conn.lock().map_err(|_| LedgerError::storage("sqlite connection lock poisoned"))
    }
}

impl Ledger for SqliteLedger {
    fn append(
        &self,
        content_id: &ContentId,
        after: u64,
        event: LedgerEvent,
        state: ContentState,
    ) -> Result<LedgerEntry, LedgerError> {
        let event_json = serde_json::to_string(&event).map_err(|e| LedgerError::Encode(e.to_string()))?;
        let now = now_ms();

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(LedgerError::storage)?;

        let last: Option<i64> = tx
            .query_row(
                "SELECT MAX(ordinal) FROM ledger_entries WHERE content_id = ?1",
                params![content_id.as_str()],
                |r| r.get(0),
            )
            .optional()
            .map_err(LedgerError::storage)?
            .flatten();
        let last = last.unwrap_or(0) as u64;
        if last != after {
            return Err(LedgerError::Conflict { content_id: content_id.clone(), expected: after, found: last });
        }
        let ordinal = (last + 1) as i64;

        tx.execute(
            "INSERT INTO ledger_entries(content_id, ordinal, event_kind, event_json, state, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![content_id.as_str(), ordinal, event.label(), event_json, state.as_str(), now],
        )
        .map_err(LedgerError::storage)?;
        tx.commit().map_err(LedgerError::storage)?;

        tracing::trace!(content_id = %content_id, ordinal, event = event.label(), "ledger append");
        Ok(LedgerEntry {
            content_id: content_id.clone(),
            ordinal: ordinal as u64,
            event,
            state,
            recorded_at_ms: now,
        })
    }

    fn read(&self, content_id: &ContentId) -> Result<Vec<LedgerEntry>, LedgerError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT ordinal, event_json, state, recorded_at FROM ledger_entries
                 WHERE content_id = ?1 ORDER BY ordinal ASC",
            )
            .map_err(LedgerError::storage)?;
        let rows = stmt
            .query_map(params![content_id.as_str()], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?, r.get::<_, i64>(3)?))
            })
            .map_err(LedgerError::storage)?;

        let mut entries = vec![];
        for row in rows {
            let (ordinal, event_json, state, recorded_at_ms) = row.map_err(LedgerError::storage)?;
            let event: LedgerEvent = serde_json::from_str(&event_json).map_err(|e| LedgerError::Corrupt {
                content_id: content_id.clone(),
                detail: format!("entry {ordinal}: {e}"),
            })?;
            entries.push(LedgerEntry {
                content_id: content_id.clone(),
                ordinal: ordinal as u64,
                event,
                state: Self::parse_state(content_id, &state)?,
                recorded_at_ms,
            });
        }
        Ok(entries)
    }

    fn content_ids(&self) -> Result<Vec<ContentId>, LedgerError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT content_id FROM ledger_entries ORDER BY content_id")
            .map_err(LedgerError::storage)?;
        let rows = stmt
            .query_map([], |r| r.get::<_, String>(0))
            .map_err(LedgerError::storage)?;
        let mut ids = vec![];
        for row in rows {
            ids.push(ContentId::from_str(row.map_err(LedgerError::storage)?));
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsroom_core::{Lead, LeadKind, NewsRoomId};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn submitted() -> LedgerEvent {
        LedgerEvent::Submitted {
            newsroom: NewsRoomId::from_str("basic"),
            lead: Lead::new(LeadKind::Email, "tip from a reader"),
        }
    }

    #[test]
    fn sqlite_open_and_migrate() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("ledger.db");
        let _ = SqliteLedger::open(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");
        let id = ContentId::from_str("c1");
        {
            let ledger = SqliteLedger::open(&db_path).unwrap();
            ledger.append(&id, 0, submitted(), ContentState::Created).unwrap();
            ledger
                .append(&id, 1, LedgerEvent::transition(ContentState::Created, ContentState::Drafting, None), ContentState::Drafting)
                .unwrap();
        }
        let ledger = SqliteLedger::open(&db_path).unwrap();
        let entries = ledger.read(&id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, submitted());
        assert_eq!(entries[1].state, ContentState::Drafting);
        assert_eq!(ledger.content_ids().unwrap(), vec![id]);
    }

    #[test]
    fn ordinals_are_gapless_under_concurrent_appends() {
        let ledger = Arc::new(SqliteLedger::open_in_memory().unwrap());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    let id = ContentId::from_str(format!("c{}", i % 2));
                    let mut written = 0;
                    while written < 10 {
                        let after = ledger.read(&id).unwrap().len() as u64;
                        match ledger.append(&id, after, submitted(), ContentState::Created) {
                            Ok(_) => written += 1,
                            Err(LedgerError::Conflict { .. }) => continue,
                            Err(e) => panic!("append failed: {e}"),
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for id in ledger.content_ids().unwrap() {
            let ordinals: Vec<u64> = ledger.read(&id).unwrap().iter().map(|e| e.ordinal).collect();
            assert_eq!(ordinals, (1..=20).collect::<Vec<u64>>());
        }
    }

    #[test]
    fn append_after_stale_ordinal_conflicts() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let id = ContentId::from_str("c1");
        ledger.append(&id, 0, submitted(), ContentState::Created).unwrap();
        let failed = LedgerEvent::transition(ContentState::Created, ContentState::Failed, Some("cancelled".into()));
        ledger.append(&id, 1, failed, ContentState::Failed).unwrap();

        let late = LedgerEvent::transition(ContentState::Created, ContentState::Drafting, None);
        let err = ledger.append(&id, 1, late, ContentState::Drafting).unwrap_err();
        assert_eq!(err, LedgerError::Conflict { content_id: id.clone(), expected: 1, found: 2 });
        assert_eq!(ledger.read(&id).unwrap().last().unwrap().state, ContentState::Failed);
    }

    #[test]
    fn unknown_state_is_reported_as_corruption() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        {
            let conn = ledger.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO ledger_entries(content_id, ordinal, event_kind, event_json, state, recorded_at)
                 VALUES ('c1', 1, 'submitted', ?1, 'archived', 0)",
                params![serde_json::to_string(&submitted()).unwrap()],
            )
            .unwrap();
        }
        let err = ledger.read(&ContentId::from_str("c1")).unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt { .. }));
    }
}
