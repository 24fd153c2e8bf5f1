use serde::{Deserialize, Serialize};

use crate::{ids::*, model::*, time::EpochMs};

/// Initial payload submitted to a newsroom.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lead {
    pub kind: LeadKind,
    pub content: String,
}

impl Lead {
    pub fn new(kind: LeadKind, content: impl Into<String>) -> Self {
        Self { kind, content: content.into() }
    }

    /// Short form used in log lines: first 50 characters plus `...`.
    pub fn preview(&self) -> String {
        if self.content.chars().count() > 50 {
            let head: String = self.content.chars().take(50).collect();
            format!("{head}...")
        } else {
            self.content.clone()
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub body: String,
}

impl Draft {
    /// Combines the drafts of one drafting pass in dispatch order: the first
    /// title wins and bodies are joined by a blank line.
    pub fn merge(drafts: &[Draft]) -> Option<Draft> {
        let first = drafts.first()?;
        let body = drafts.iter().map(|d| d.body.as_str()).collect::<Vec<_>>().join("\n\n");
        Some(Draft { title: first.title.clone(), body })
    }
}

/// Validated message payload, tagged by kind.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    Draft { title: String, body: String },
    ReviewComment { comment: String },
    RevisionRequest { notes: String },
    Approval {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    Rejection { reason: String },
    PublishConfirmation { location: String },
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Draft { .. } => MessageKind::Draft,
            Self::ReviewComment { .. } => MessageKind::ReviewComment,
            Self::RevisionRequest { .. } => MessageKind::RevisionRequest,
            Self::Approval { .. } => MessageKind::Approval,
            Self::Rejection { .. } => MessageKind::Rejection,
            Self::PublishConfirmation { .. } => MessageKind::PublishConfirmation,
        }
    }

    /// Wire form as a role hands it to the engine.
    pub fn to_raw(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    pub fn draft(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Draft { title: title.into(), body: body.into() }
    }

    pub fn approval() -> Self {
        Self::Approval { note: None }
    }

    pub fn revision_request(notes: impl Into<String>) -> Self {
        Self::RevisionRequest { notes: notes.into() }
    }

    pub fn rejection(reason: impl Into<String>) -> Self {
        Self::Rejection { reason: reason.into() }
    }

    pub fn comment(comment: impl Into<String>) -> Self {
        Self::ReviewComment { comment: comment.into() }
    }

    pub fn published(location: impl Into<String>) -> Self {
        Self::PublishConfirmation { location: location.into() }
    }
}

/// Immutable record of one role invocation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub content_id: ContentId,
    /// Position in the content item's message sequence, starting at 1.
    pub sequence: u64,
    pub sender: RoleId,
    pub body: MessageBody,
    pub created_at_ms: EpochMs,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }
}

/// The unit moving through a newsroom pipeline.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentItem {
    pub id: ContentId,
    pub newsroom: NewsRoomId,
    pub state: ContentState,
    pub lead: Lead,
    /// Latest accepted draft, if any.
    pub draft: Option<Draft>,
    pub revision_count: u32,
    pub published_at: Option<String>,
}

impl ContentItem {
    pub fn new(id: ContentId, newsroom: NewsRoomId, lead: Lead) -> Self {
        Self {
            id,
            newsroom,
            state: ContentState::Created,
            lead,
            draft: None,
            revision_count: 0,
            published_at: None,
        }
    }
}
