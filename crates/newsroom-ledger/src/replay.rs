use newsroom_core::{
    ContentId, ContentItem, ContentState, Draft, Lead, LedgerEntry, LedgerEvent, Message, MessageBody, NewsRoomId,
};

use crate::traits::LedgerError;

/// What callers of the status interface see.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    pub content_id: ContentId,
    pub newsroom: NewsRoomId,
    pub state: ContentState,
    pub last_message: Option<Message>,
    pub revision_count: u32,
    /// Reason attached to the latest transition (rejection or failure cause).
    pub reason: Option<String>,
    pub lead: Lead,
    pub draft: Option<Draft>,
    pub published_at: Option<String>,
}

/// Content state rebuilt by folding ledger entries in ordinal order.
///
/// The engine applies every entry it appends to its own snapshot, so a live
/// run and a replayed run go through the same fold.
#[derive(Clone, Debug)]
pub struct RunSnapshot {
    pub item: ContentItem,
    /// Messages accepted by a completed transition.
    history: Vec<Message>,
    /// Messages recorded since the latest transition.
    pending: Vec<Message>,
    last_message: Option<Message>,
    last_ordinal: u64,
    next_sequence: u64,
    reason: Option<String>,
    faults: u32,
}

impl RunSnapshot {
    /// Rebuilds a run from its full ledger. The first entry must be `Submitted`.
    pub fn replay(entries: &[LedgerEntry]) -> Result<Self, LedgerError> {
        let (first, rest) = entries.split_first().ok_or_else(|| LedgerError::Corrupt {
            content_id: ContentId::from_str(""),
            detail: "empty ledger".into(),
        })?;
        let mut snapshot = Self::start(first)?;
        for entry in rest {
            snapshot.apply(entry)?;
        }
        Ok(snapshot)
    }

    pub fn start(entry: &LedgerEntry) -> Result<Self, LedgerError> {
        let LedgerEvent::Submitted { newsroom, lead } = &entry.event else {
            return Err(corrupt(&entry.content_id, format!("first entry is {}, not submitted", entry.event.label())));
        };
        if entry.ordinal != 1 || entry.state != ContentState::Created {
            return Err(corrupt(&entry.content_id, "submission must be ordinal 1 in state created".into()));
        }
        Ok(Self {
            item: ContentItem::new(entry.content_id.clone(), newsroom.clone(), lead.clone()),
            history: Vec::new(),
            pending: Vec::new(),
            last_message: None,
            last_ordinal: 1,
            next_sequence: 1,
            reason: None,
            faults: 0,
        })
    }

    pub fn apply(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let id = &self.item.id.clone();
        if entry.content_id != *id {
            return Err(corrupt(id, format!("entry belongs to {}", entry.content_id)));
        }
        if entry.ordinal != self.last_ordinal + 1 {
            return Err(corrupt(id, format!("ordinal {} follows {}", entry.ordinal, self.last_ordinal)));
        }

        match &entry.event {
            LedgerEvent::Submitted { .. } => {
                return Err(corrupt(id, format!("duplicate submission at ordinal {}", entry.ordinal)));
            }
            LedgerEvent::Message { message } => {
                if message.sequence < self.next_sequence {
                    return Err(corrupt(id, format!("message sequence {} reused", message.sequence)));
                }
                self.next_sequence = message.sequence + 1;
                self.last_message = Some(message.clone());
                self.pending.push(message.clone());
            }
            LedgerEvent::Fault { .. } => self.faults += 1,
            LedgerEvent::Refusal { .. } => {}
            LedgerEvent::Transition { from, to, reason } => {
                if *from != self.item.state || !from.can_transition_to(*to) {
                    return Err(corrupt(id, format!("illegal transition {from} -> {to} from {}", self.item.state)));
                }
                self.commit(*from, *to);
                self.item.state = *to;
                self.reason = reason.clone();
            }
            LedgerEvent::Resumed { at } => {
                if *at != self.item.state {
                    return Err(corrupt(id, format!("resumed at {at} while in {}", self.item.state)));
                }
                self.pending.clear();
            }
        }

        if entry.state != self.item.state {
            return Err(corrupt(id, format!("entry {} records {} but run is {}", entry.ordinal, entry.state, self.item.state)));
        }
        self.last_ordinal = entry.ordinal;
        Ok(())
    }

    fn commit(&mut self, from: ContentState, to: ContentState) {
        match (from, to) {
            (ContentState::Drafting, ContentState::UnderReview) => {
                let drafts: Vec<Draft> = self
                    .pending
                    .iter()
                    .filter_map(|m| match &m.body {
                        MessageBody::Draft { title, body } => Some(Draft { title: title.clone(), body: body.clone() }),
                        _ => None,
                    })
                    .collect();
                if let Some(draft) = Draft::merge(&drafts) {
                    self.item.draft = Some(draft);
                }
            }
            (_, ContentState::RevisionRequested) => self.item.revision_count += 1,
            (ContentState::Approved, ContentState::Published) => {
                self.item.published_at = self.pending.iter().rev().find_map(|m| match &m.body {
                    MessageBody::PublishConfirmation { location } => Some(location.clone()),
                    _ => None,
                });
            }
            _ => {}
        }
        self.history.append(&mut self.pending);
    }

    pub fn state(&self) -> ContentState {
        self.item.state
    }

    pub fn last_ordinal(&self) -> u64 {
        self.last_ordinal
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn faults(&self) -> u32 {
        self.faults
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Messages a role sees: accepted history plus the current pass so far.
    pub fn visible_history(&self) -> Vec<Message> {
        self.history.iter().chain(self.pending.iter()).cloned().collect()
    }

    /// Messages recorded since the latest transition.
    pub fn pending(&self) -> &[Message] {
        &self.pending
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            content_id: self.item.id.clone(),
            newsroom: self.item.newsroom.clone(),
            state: self.item.state,
            last_message: self.last_message.clone(),
            revision_count: self.item.revision_count,
            reason: self.reason.clone(),
            lead: self.item.lead.clone(),
            draft: self.item.draft.clone(),
            published_at: self.item.published_at.clone(),
        }
    }
}

fn corrupt(content_id: &ContentId, detail: String) -> LedgerError {
    LedgerError::Corrupt { content_id: content_id.clone(), detail }
}
