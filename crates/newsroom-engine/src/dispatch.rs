use std::sync::Arc;
use std::time::Duration;

use newsroom_core::{ContentItem, LedgerEvent, Message, MessageBody, RetryPolicy, RoleId, Schema};
use newsroom_roles::{Outcome, Phase, Slot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Everything one role invocation needs, owned so it can run on its own task.
#[derive(Clone)]
pub(crate) struct SlotCall {
    pub slot: Slot,
    pub phase: Phase,
    pub item: Arc<ContentItem>,
    pub history: Arc<[Message]>,
    pub schema: Arc<Schema>,
    pub policy: RetryPolicy,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub(crate) enum SlotResult {
    Accepted(MessageBody),
    Failed(String),
}

/// Result of driving one role through its retry budget.
#[derive(Clone, Debug)]
pub(crate) struct SlotReport {
    pub role: RoleId,
    pub optional: bool,
    pub approver: bool,
    /// Faults and refusals in attempt order, as ledger events.
    pub failures: Vec<LedgerEvent>,
    pub result: SlotResult,
}

impl SlotReport {
    fn new(slot: &Slot) -> Self {
        Self {
            role: slot.role.clone(),
            optional: slot.optional,
            approver: slot.is_approver(),
            failures: Vec::new(),
            result: SlotResult::Failed(String::new()),
        }
    }

    fn fault(&mut self, attempt: u32, error: String) {
        self.failures.push(LedgerEvent::Fault { role: self.role.clone(), attempt, error });
    }
}

/// Invokes a role until it yields a valid message or the retry budget runs out.
///
/// Faults, timeouts and retryable refusals are retried with backoff. A
/// non-retryable refusal or a message that fails validation ends the slot
/// at once.
pub(crate) async fn invoke_slot(call: SlotCall) -> SlotReport {
    let mut report = SlotReport::new(&call.slot);
    let role = call.slot.role.clone();
    let expected = call.slot.expected_kinds(call.phase);
    let attempts = call.policy.max_attempts();

    for attempt in 1..=attempts {
        let delay = call.policy.delay_ms(attempt);
        if delay > 0 {
            debug!(role = %role, attempt, delay_ms = delay, "backing off before retry");
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        info!(role = %role, attempt, phase = %call.phase, "role started");
        let invocation = call.slot.handle.invoke(&call.item, &call.history);
        let outcome = match tokio::time::timeout(call.timeout, invocation).await {
            Ok(outcome) => outcome,
            Err(_) => Outcome::faulted(format!("timed out after {}ms", call.timeout.as_millis())),
        };

        match outcome {
            Outcome::Produced(raw) => match call.schema.validate(&raw, &expected) {
                Ok(body) => {
                    info!(role = %role, attempt, kind = %body.kind(), "role finished");
                    report.result = SlotResult::Accepted(body);
                    return report;
                }
                Err(e) => {
                    warn!(role = %role, attempt, error = %e, "role produced an invalid message");
                    report.fault(attempt, format!("invalid message: {e}"));
                    report.result = SlotResult::Failed(format!("{role} produced an invalid message: {e}"));
                    return report;
                }
            },
            Outcome::Refused { reason, retryable } => {
                warn!(role = %role, attempt, retryable, reason = %reason, "role refused");
                report.failures.push(LedgerEvent::Refusal {
                    role: role.clone(),
                    attempt,
                    reason: reason.clone(),
                    retryable,
                });
                if !retryable {
                    report.result = SlotResult::Failed(format!("{role} refused: {reason}"));
                    return report;
                }
                report.result = SlotResult::Failed(format!("{role} refused after {attempt} attempts: {reason}"));
            }
            Outcome::Faulted(error) => {
                warn!(role = %role, attempt, error = %error, "role faulted");
                report.result = SlotResult::Failed(format!("{role} failed after {attempt} attempts: {error}"));
                report.fault(attempt, error);
            }
        }
    }
    report
}

/// Runs every call on its own task and waits for all of them. Reports come
/// back in call order regardless of completion order.
pub(crate) async fn fan_out(calls: Vec<SlotCall>) -> Vec<SlotReport> {
    let mut set = JoinSet::new();
    let mut fallbacks = Vec::with_capacity(calls.len());

    for (idx, call) in calls.into_iter().enumerate() {
        fallbacks.push(SlotReport::new(&call.slot));
        set.spawn(async move { (idx, invoke_slot(call).await) });
    }

    let mut reports: Vec<Option<SlotReport>> = vec![None; fallbacks.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, report)) => reports[idx] = Some(report),
            Err(e) => warn!(error = %e, "role task aborted"),
        }
    }

    // A branch without a report panicked; it counts as a fault.
    reports
        .into_iter()
        .zip(fallbacks)
        .map(|(report, mut fallback)| {
            report.unwrap_or_else(|| {
                fallback.fault(1, "role task aborted".to_string());
                fallback.result = SlotResult::Failed(format!("{} task aborted", fallback.role));
                fallback
            })
        })
        .collect()
}
