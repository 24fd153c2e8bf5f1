use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use newsroom_core::{ContentId, ContentState, Lead, LedgerEntry, LedgerEvent, NewsRoomId, Schema};
use newsroom_ledger::{Ledger, RunSnapshot, StatusReport};
use newsroom_roles::{ConfigurationError, NewsRoomCatalog, NewsRoomSpec, Pipeline, RoleRegistry};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::machine::Run;
use crate::{EngineConfig, EngineError, Journal};

/// Stays registered until the run task ends, so `cancel` always reaches a
/// live run. `wait` takes the join handle but leaves the flags behind.
struct RunHandle {
    cancel: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    task: Option<JoinHandle<Result<StatusReport, EngineError>>>,
}

impl RunHandle {
    fn is_live(&self) -> bool {
        !self.done.load(Ordering::SeqCst)
    }
}

/// Accepts content requests and runs each item on its own task.
///
/// Runs share nothing but the ledger. `submit` and `resume` spawn onto the
/// current tokio runtime.
pub struct Engine {
    catalog: NewsRoomCatalog,
    ledger: Arc<dyn Ledger>,
    schema: Arc<Schema>,
    config: EngineConfig,
    journal: Journal,
    runs: Mutex<HashMap<ContentId, RunHandle>>,
}

impl Engine {
    pub fn new(catalog: NewsRoomCatalog, ledger: Arc<dyn Ledger>, schema: Arc<Schema>, config: EngineConfig) -> Self {
        Self {
            catalog,
            ledger,
            schema,
            config,
            journal: Journal::disabled(),
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Validates every newsroom against the registry and builds an engine
    /// whose schema follows `config.max_payload_bytes`.
    pub fn compose(
        registry: &RoleRegistry,
        newsrooms: &[NewsRoomSpec],
        ledger: Arc<dyn Ledger>,
        config: EngineConfig,
    ) -> Result<Self, ConfigurationError> {
        let catalog = NewsRoomCatalog::compose(newsrooms, registry)?;
        let schema = Arc::new(config.schema());
        Ok(Self::new(catalog, ledger, schema, config))
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn newsrooms(&self) -> impl Iterator<Item = &NewsRoomId> {
        self.catalog.ids()
    }

    pub fn submit(&self, newsroom: &NewsRoomId, lead: Lead) -> Result<ContentId, EngineError> {
        let pipeline = self.catalog.get(newsroom)?;
        let content_id = ContentId::new();
        let entry = self.ledger.append(
            &content_id,
            0,
            LedgerEvent::Submitted { newsroom: newsroom.clone(), lead },
            ContentState::Created,
        )?;
        self.journal.record(&entry);
        let snapshot = RunSnapshot::start(&entry)?;
        info!(content_id = %content_id, newsroom = %newsroom, lead = %snapshot.item.lead.preview(), "content submitted");
        self.spawn(pipeline, snapshot);
        Ok(content_id)
    }

    /// Waits for a run started by this engine. For any other known item, or
    /// when another caller is already waiting, returns its recorded status.
    pub async fn wait(&self, content_id: &ContentId) -> Result<StatusReport, EngineError> {
        let task = self.lock_runs().get_mut(content_id).and_then(|h| h.task.take());
        let Some(task) = task else {
            return self.get_status(content_id);
        };
        let result = task.await.map_err(|e| EngineError::Join {
            content_id: content_id.clone(),
            detail: e.to_string(),
        });
        // The task has ended, even if it panicked before marking itself done.
        let mut runs = self.lock_runs();
        if runs.get(content_id).is_some_and(|h| h.task.is_none()) {
            runs.remove(content_id);
        }
        result?
    }

    /// Status as of the last durable ledger entry.
    pub fn get_status(&self, content_id: &ContentId) -> Result<StatusReport, EngineError> {
        Ok(self.replay(content_id)?.status())
    }

    pub fn history(&self, content_id: &ContentId) -> Result<Vec<LedgerEntry>, EngineError> {
        let entries = self.ledger.read(content_id)?;
        if entries.is_empty() {
            return Err(EngineError::NotFound(content_id.clone()));
        }
        Ok(entries)
    }

    /// Stops a run at its next transition boundary; it ends `Failed` with
    /// reason "cancelled". An unfinished item not running here is marked
    /// failed directly. Finished items are left alone.
    pub fn cancel(&self, content_id: &ContentId) -> Result<(), EngineError> {
        if let Some(h) = self.lock_runs().get(content_id) {
            if h.is_live() {
                info!(content_id = %content_id, "cancellation requested");
                h.cancel.store(true, Ordering::SeqCst);
                return Ok(());
            }
        }

        let snapshot = self.replay(content_id)?;
        let from = snapshot.state();
        if from.is_terminal() {
            return Ok(());
        }
        let entry = self.ledger.append(
            content_id,
            snapshot.last_ordinal(),
            LedgerEvent::transition(from, ContentState::Failed, Some("cancelled".to_string())),
            ContentState::Failed,
        )?;
        self.journal.record(&entry);
        info!(content_id = %content_id, from = %from, "idle run cancelled");
        Ok(())
    }

    /// Re-enters an unfinished run at its last recorded state. Returns that
    /// state; terminal items are not restarted.
    pub fn resume(&self, content_id: &ContentId) -> Result<ContentState, EngineError> {
        {
            let mut runs = self.lock_runs();
            if runs.get(content_id).is_some_and(RunHandle::is_live) {
                return Err(EngineError::AlreadyRunning(content_id.clone()));
            }
            runs.remove(content_id);
        }

        let mut snapshot = self.replay(content_id)?;
        let at = snapshot.state();
        if at.is_terminal() {
            return Ok(at);
        }
        let pipeline = self.catalog.get(&snapshot.item.newsroom)?;
        let entry = self.ledger.append(content_id, snapshot.last_ordinal(), LedgerEvent::Resumed { at }, at)?;
        snapshot.apply(&entry)?;
        self.journal.record(&entry);
        info!(content_id = %content_id, state = %at, "run resumed");
        self.spawn(pipeline, snapshot);
        Ok(at)
    }

    /// Resumes every unfinished item in the ledger. Items that cannot be
    /// resumed are logged and skipped.
    pub fn resume_unfinished(&self) -> Result<Vec<ContentId>, EngineError> {
        let mut resumed = Vec::new();
        for content_id in self.ledger.content_ids()? {
            match self.resume(&content_id) {
                Ok(state) if !state.is_terminal() => resumed.push(content_id),
                Ok(_) | Err(EngineError::AlreadyRunning(_)) => {}
                Err(e) => warn!(content_id = %content_id, error = %e, "could not resume run"),
            }
        }
        Ok(resumed)
    }

    fn replay(&self, content_id: &ContentId) -> Result<RunSnapshot, EngineError> {
        let entries = self.ledger.read(content_id)?;
        if entries.is_empty() {
            return Err(EngineError::NotFound(content_id.clone()));
        }
        Ok(RunSnapshot::replay(&entries)?)
    }

    fn spawn(&self, pipeline: Arc<Pipeline>, snapshot: RunSnapshot) {
        let content_id = snapshot.item.id.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));
        let span = info_span!("content_run", content_id = %content_id, newsroom = %pipeline.id);
        let run = Run {
            pipeline,
            snapshot,
            ledger: Arc::clone(&self.ledger),
            schema: Arc::clone(&self.schema),
            config: self.config.clone(),
            journal: self.journal.clone(),
            cancel: Arc::clone(&cancel),
        };
        let finished = Arc::clone(&done);
        let task = tokio::spawn(
            async move {
                let result = run.drive().await;
                finished.store(true, Ordering::SeqCst);
                if let Err(e) = &result {
                    error!(error = %e, "run aborted");
                }
                result
            }
            .instrument(span),
        );
        self.lock_runs().insert(content_id, RunHandle { cancel, done, task: Some(task) });
    }

    fn lock_runs(&self) -> MutexGuard<'_, HashMap<ContentId, RunHandle>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
