use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use newsroom_core::{now_ms, ContentState, LedgerEvent, Message, MessageBody, MessageKind, RoleId, Schema};
use newsroom_ledger::{Ledger, RunSnapshot, StatusReport};
use newsroom_roles::{Dispatch, Node, Phase, Pipeline, Slot};
use tracing::{debug, error, info, warn};

use crate::dispatch::{self, SlotCall, SlotReport, SlotResult};
use crate::{EngineConfig, EngineError, Journal};

/// What a pass decided. `Cancelled` discards whatever the pass produced.
enum Step {
    To(ContentState, Option<String>),
    Cancelled,
}

enum NodeOutcome {
    Done(Vec<Accepted>),
    Failed(String),
    Cancelled,
}

enum Settled {
    Accepted(Accepted),
    Skipped,
    Failed(String),
}

struct Accepted {
    role: RoleId,
    body: MessageBody,
}

impl Accepted {
    fn is_rejection(&self) -> bool {
        self.body.kind() == MessageKind::Rejection
    }
}

/// State machine for one content item. Owns its snapshot; every ledger entry
/// it appends is folded into that snapshot before the run acts on it.
pub(crate) struct Run {
    pub pipeline: Arc<Pipeline>,
    pub snapshot: RunSnapshot,
    pub ledger: Arc<dyn Ledger>,
    pub schema: Arc<Schema>,
    pub config: EngineConfig,
    pub journal: Journal,
    pub cancel: Arc<AtomicBool>,
}

impl Run {
    pub async fn drive(mut self) -> Result<StatusReport, EngineError> {
        info!(state = %self.snapshot.state(), lead = %self.snapshot.item.lead.preview(), "run started");
        loop {
            let step = match self.snapshot.state() {
                ContentState::Published | ContentState::Rejected | ContentState::Failed => {
                    let status = self.snapshot.status();
                    info!(state = %status.state, revisions = status.revision_count, "run finished");
                    return Ok(status);
                }
                _ if self.cancelled() => Step::Cancelled,
                ContentState::Created | ContentState::RevisionRequested => Step::To(ContentState::Drafting, None),
                ContentState::Drafting => self.draft().await?,
                ContentState::UnderReview => self.review().await?,
                ContentState::Approved => self.publish().await?,
            };

            match step {
                Step::To(to, reason) => self.transition(to, reason)?,
                Step::Cancelled => self.transition(ContentState::Failed, Some("cancelled".to_string()))?,
            }
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    async fn draft(&mut self) -> Result<Step, EngineError> {
        let pipeline = Arc::clone(&self.pipeline);
        let revision_pass = self.snapshot.item.revision_count > 0;
        for node in pipeline.drafting_nodes(revision_pass) {
            let slots = node.active_slots(revision_pass);
            if slots.is_empty() {
                continue;
            }
            match self.run_node(node, slots, false).await? {
                NodeOutcome::Done(_) => {}
                NodeOutcome::Failed(reason) => return Ok(Step::To(ContentState::Failed, Some(reason))),
                NodeOutcome::Cancelled => return Ok(Step::Cancelled),
            }
        }

        if !self.snapshot.pending().iter().any(|m| m.kind() == MessageKind::Draft) {
            return Ok(Step::To(ContentState::Failed, Some("no draft produced".to_string())));
        }
        Ok(Step::To(ContentState::UnderReview, None))
    }

    async fn review(&mut self) -> Result<Step, EngineError> {
        let pipeline = Arc::clone(&self.pipeline);
        let mut verdicts = Vec::new();
        for node in pipeline.phase(Phase::Review) {
            match self.run_node(node, node.active_slots(false), true).await? {
                NodeOutcome::Done(accepted) => {
                    let rejected = accepted.iter().any(Accepted::is_rejection);
                    verdicts.extend(accepted);
                    if rejected {
                        break;
                    }
                }
                NodeOutcome::Failed(reason) => return Ok(Step::To(ContentState::Failed, Some(reason))),
                NodeOutcome::Cancelled => return Ok(Step::Cancelled),
            }
        }
        Ok(self.decide(&pipeline, &verdicts))
    }

    /// Rejection wins outright. Otherwise every approver on the path must
    /// approve; a withheld approval counts as a revision request.
    fn decide(&self, pipeline: &Pipeline, verdicts: &[Accepted]) -> Step {
        if let Some(a) = verdicts.iter().find(|a| a.is_rejection()) {
            let reason = match &a.body {
                MessageBody::Rejection { reason } => reason.as_str(),
                _ => "",
            };
            return Step::To(ContentState::Rejected, Some(format!("rejected by {}: {reason}", a.role)));
        }

        let approved_by = |role: &RoleId| {
            verdicts
                .iter()
                .any(|a| &a.role == role && a.body.kind() == MessageKind::Approval)
        };
        let withheld: Vec<&RoleId> = pipeline
            .phase(Phase::Review)
            .flat_map(|n| n.slots.iter())
            .filter(|s| s.is_approver() && !approved_by(&s.role))
            .map(|s| &s.role)
            .collect();
        let requested = verdicts.iter().any(|a| a.body.kind() == MessageKind::RevisionRequest);

        if !requested && withheld.is_empty() {
            return Step::To(ContentState::Approved, None);
        }
        if !requested {
            debug!(withheld = ?withheld, "approval withheld without revision request");
        }
        if self.snapshot.item.revision_count + 1 > pipeline.max_revisions {
            return Step::To(ContentState::Rejected, Some("revision limit exceeded".to_string()));
        }
        Step::To(ContentState::RevisionRequested, None)
    }

    async fn publish(&mut self) -> Result<Step, EngineError> {
        let pipeline = Arc::clone(&self.pipeline);
        for node in pipeline.phase(Phase::Publish) {
            match self.run_node(node, node.active_slots(false), false).await? {
                NodeOutcome::Done(_) => {}
                NodeOutcome::Failed(reason) => return Ok(Step::To(ContentState::Failed, Some(reason))),
                NodeOutcome::Cancelled => return Ok(Step::Cancelled),
            }
        }
        Ok(Step::To(ContentState::Published, None))
    }

    /// Dispatches one node. With `fail_fast`, a rejection under sequential
    /// dispatch skips the roles still waiting their turn, and under parallel
    /// dispatch it outranks any sibling that failed.
    async fn run_node(&mut self, node: &Node, slots: Vec<&Slot>, fail_fast: bool) -> Result<NodeOutcome, EngineError> {
        debug!(node = %node.id, dispatch = ?node.dispatch, roles = slots.len(), "dispatching node");
        let mut accepted = Vec::new();
        match node.dispatch {
            Dispatch::Sequential => {
                for slot in slots {
                    if self.cancelled() {
                        return Ok(NodeOutcome::Cancelled);
                    }
                    let report = dispatch::invoke_slot(self.call(node, slot)).await;
                    if self.cancelled() {
                        return Ok(NodeOutcome::Cancelled);
                    }
                    match self.settle(report)? {
                        Settled::Failed(reason) => return Ok(NodeOutcome::Failed(reason)),
                        Settled::Skipped => {}
                        Settled::Accepted(a) => {
                            let stop = fail_fast && a.is_rejection();
                            accepted.push(a);
                            if stop {
                                debug!(node = %node.id, "rejection short-circuits remaining reviewers");
                                break;
                            }
                        }
                    }
                }
            }
            Dispatch::Parallel => {
                if self.cancelled() {
                    return Ok(NodeOutcome::Cancelled);
                }
                let calls = slots.into_iter().map(|s| self.call(node, s)).collect();
                let reports = dispatch::fan_out(calls).await;
                if self.cancelled() {
                    return Ok(NodeOutcome::Cancelled);
                }
                let mut failure = None;
                for report in reports {
                    match self.settle(report)? {
                        Settled::Failed(reason) => {
                            failure.get_or_insert(reason);
                        }
                        Settled::Skipped => {}
                        Settled::Accepted(a) => accepted.push(a),
                    }
                }
                let rejected = fail_fast && accepted.iter().any(Accepted::is_rejection);
                if let Some(reason) = failure {
                    if !rejected {
                        return Ok(NodeOutcome::Failed(reason));
                    }
                    debug!(node = %node.id, failure = %reason, "rejection outranks sibling failure");
                }
            }
        }
        Ok(NodeOutcome::Done(accepted))
    }

    fn call(&self, node: &Node, slot: &Slot) -> SlotCall {
        SlotCall {
            slot: slot.clone(),
            phase: node.phase,
            item: Arc::new(self.snapshot.item.clone()),
            history: Arc::from(self.snapshot.visible_history()),
            schema: Arc::clone(&self.schema),
            policy: self.config.retry_policy(),
            timeout: node.timeout.unwrap_or(Duration::from_millis(self.config.node_timeout_ms)),
        }
    }

    /// Records a slot's fault chain and message, then classifies it.
    fn settle(&mut self, report: SlotReport) -> Result<Settled, EngineError> {
        let state = self.snapshot.state();
        for event in report.failures {
            self.append(event, state)?;
        }
        match report.result {
            SlotResult::Accepted(body) => {
                let message = Message {
                    content_id: self.snapshot.item.id.clone(),
                    sequence: self.snapshot.next_sequence(),
                    sender: report.role.clone(),
                    body: body.clone(),
                    created_at_ms: now_ms(),
                };
                self.append(LedgerEvent::Message { message }, state)?;
                Ok(Settled::Accepted(Accepted { role: report.role, body }))
            }
            SlotResult::Failed(reason) if report.optional => {
                warn!(role = %report.role, reason = %reason, "optional role failed; continuing");
                Ok(Settled::Skipped)
            }
            SlotResult::Failed(reason) => Ok(Settled::Failed(reason)),
        }
    }

    fn transition(&mut self, to: ContentState, reason: Option<String>) -> Result<(), EngineError> {
        let from = self.snapshot.state();
        info!(from = %from, to = %to, reason = reason.as_deref().unwrap_or(""), "state transition");
        self.append(LedgerEvent::transition(from, to, reason), to)
    }

    /// Write-ahead: the entry is durable before the snapshot moves. The append
    /// is conditional on the snapshot's last ordinal, so a run that lost
    /// ownership of the item stops with a conflict.
    fn append(&mut self, event: LedgerEvent, state: ContentState) -> Result<(), EngineError> {
        let entry = self
            .ledger
            .append(&self.snapshot.item.id, self.snapshot.last_ordinal(), event, state)
            .inspect_err(|e| error!(error = %e, "ledger append failed"))?;
        self.snapshot.apply(&entry)?;
        self.journal.record(&entry);
        Ok(())
    }
}
