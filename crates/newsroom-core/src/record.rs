use serde::{Deserialize, Serialize};

use crate::{ids::*, model::*, time::EpochMs, types::*};

/// What happened, as recorded in the run ledger.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Submitted { newsroom: NewsRoomId, lead: Lead },
    Message { message: Message },
    Fault { role: RoleId, attempt: u32, error: String },
    Refusal { role: RoleId, attempt: u32, reason: String, retryable: bool },
    Transition {
        from: ContentState,
        to: ContentState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// A run was re-entered from the ledger. Messages recorded since the last
    /// transition belong to an interrupted pass and are dropped from history.
    Resumed { at: ContentState },
}

impl LedgerEvent {
    pub fn transition(from: ContentState, to: ContentState, reason: Option<String>) -> Self {
        Self::Transition { from, to, reason }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Submitted { .. } => "submitted",
            Self::Message { .. } => "message",
            Self::Fault { .. } => "fault",
            Self::Refusal { .. } => "refusal",
            Self::Transition { .. } => "transition",
            Self::Resumed { .. } => "resumed",
        }
    }
}

/// One append-only ledger row. `state` is the content state after the event.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub content_id: ContentId,
    pub ordinal: u64,
    pub event: LedgerEvent,
    pub state: ContentState,
    pub recorded_at_ms: EpochMs,
}

impl LedgerEntry {
    /// Single-line human rendering used by the journal and the CLI.
    pub fn summary(&self) -> String {
        let detail = match &self.event {
            LedgerEvent::Submitted { newsroom, lead } => {
                format!("submitted to {newsroom}: {}", lead.preview())
            }
            LedgerEvent::Message { message } => {
                format!("#{} {} from {}", message.sequence, message.kind(), message.sender)
            }
            LedgerEvent::Fault { role, attempt, error } => {
                format!("fault from {role} (attempt {attempt}): {error}")
            }
            LedgerEvent::Refusal { role, attempt, reason, retryable } => {
                format!("refusal from {role} (attempt {attempt}, retryable={retryable}): {reason}")
            }
            LedgerEvent::Transition { from, to, reason } => match reason {
                Some(r) => format!("{from} -> {to} ({r})"),
                None => format!("{from} -> {to}"),
            },
            LedgerEvent::Resumed { at } => format!("resumed at {at}"),
        };
        format!("[{:>4}] {:<18} {}", self.ordinal, self.state.as_str(), detail)
    }
}
