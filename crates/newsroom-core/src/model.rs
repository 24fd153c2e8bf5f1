use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a content item.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentState {
    Created,
    Drafting,
    UnderReview,
    RevisionRequested,
    Approved,
    Published,
    Rejected,
    Failed,
}

impl ContentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published | Self::Rejected | Self::Failed)
    }

    /// Legal edges of the content state machine. `Failed` is reachable from
    /// every non-terminal state (retry exhaustion, invalid messages, cancellation).
    pub fn can_transition_to(&self, next: ContentState) -> bool {
        use ContentState::*;
        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return true;
        }
        matches!(
            (self, next),
            (Created, Drafting)
                | (Drafting, UnderReview)
                | (UnderReview, RevisionRequested)
                | (UnderReview, Approved)
                | (UnderReview, Rejected)
                | (RevisionRequested, Drafting)
                | (Approved, Published)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Drafting => "drafting",
            Self::UnderReview => "under_review",
            Self::RevisionRequested => "revision_requested",
            Self::Approved => "approved",
            Self::Published => "published",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    /// Inverse of `as_str`, read through the serde names.
    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }
}

impl fmt::Display for ContentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a role declares it can do.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Produce,
    Review,
    Revise,
    Approve,
    Publish,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Produce => "produce",
            Self::Review => "review",
            Self::Revise => "revise",
            Self::Approve => "approve",
            Self::Publish => "publish",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new(caps: impl IntoIterator<Item = Capability>) -> Self {
        Self(caps.into_iter().collect())
    }

    pub fn contains(&self, cap: Capability) -> bool {
        self.0.contains(&cap)
    }

    pub fn contains_any(&self, caps: &[Capability]) -> bool {
        caps.iter().any(|c| self.0.contains(c))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    /// Message kinds a role holding these capabilities may emit.
    pub fn emittable_kinds(&self) -> Vec<MessageKind> {
        let mut kinds = Vec::new();
        if self.contains_any(&[Capability::Produce, Capability::Revise]) {
            kinds.push(MessageKind::Draft);
        }
        if self.contains_any(&[Capability::Review, Capability::Approve]) {
            kinds.push(MessageKind::ReviewComment);
            kinds.push(MessageKind::RevisionRequest);
        }
        if self.contains(Capability::Approve) {
            kinds.push(MessageKind::Approval);
            kinds.push(MessageKind::Rejection);
        }
        if self.contains(Capability::Publish) {
            kinds.push(MessageKind::PublishConfirmation);
        }
        kinds
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Draft,
    ReviewComment,
    RevisionRequest,
    Approval,
    Rejection,
    PublishConfirmation,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::ReviewComment => "review_comment",
            Self::RevisionRequest => "revision_request",
            Self::Approval => "approval",
            Self::Rejection => "rejection",
            Self::PublishConfirmation => "publish_confirmation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a lead came from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeadKind {
    File,
    Question,
    Email,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_every_stored_name() {
        use ContentState::*;
        for s in [Created, Drafting, UnderReview, RevisionRequested, Approved, Published, Rejected, Failed] {
            assert_eq!(ContentState::parse(s.as_str()), Some(s));
        }
        assert_eq!(ContentState::parse("archived"), None);
    }

    #[test]
    fn terminal_states_are_final() {
        for s in [ContentState::Published, ContentState::Rejected, ContentState::Failed] {
            assert!(s.is_terminal());
            assert!(!s.can_transition_to(ContentState::Drafting));
            assert!(!s.can_transition_to(ContentState::Failed));
        }
    }

    #[test]
    fn revision_loop_is_the_only_back_edge() {
        assert!(ContentState::UnderReview.can_transition_to(ContentState::RevisionRequested));
        assert!(ContentState::RevisionRequested.can_transition_to(ContentState::Drafting));
        assert!(!ContentState::UnderReview.can_transition_to(ContentState::Drafting));
        assert!(!ContentState::Approved.can_transition_to(ContentState::UnderReview));
        assert!(!ContentState::Drafting.can_transition_to(ContentState::Approved));
    }

    #[test]
    fn any_live_state_can_fail() {
        for s in [
            ContentState::Created,
            ContentState::Drafting,
            ContentState::UnderReview,
            ContentState::RevisionRequested,
            ContentState::Approved,
        ] {
            assert!(s.can_transition_to(ContentState::Failed));
        }
    }

    #[test]
    fn emittable_kinds_follow_capabilities() {
        let reviewer = CapabilitySet::new([Capability::Review]);
        assert!(reviewer.emittable_kinds().contains(&MessageKind::RevisionRequest));
        assert!(!reviewer.emittable_kinds().contains(&MessageKind::Approval));

        let approver = CapabilitySet::new([Capability::Review, Capability::Approve]);
        assert!(approver.emittable_kinds().contains(&MessageKind::Rejection));

        let writer = CapabilitySet::new([Capability::Revise]);
        assert_eq!(writer.emittable_kinds(), vec![MessageKind::Draft]);
    }

    #[test]
    fn message_kind_parse_matches_as_str() {
        for k in [
            MessageKind::Draft,
            MessageKind::ReviewComment,
            MessageKind::RevisionRequest,
            MessageKind::Approval,
            MessageKind::Rejection,
            MessageKind::PublishConfirmation,
        ] {
            assert_eq!(MessageKind::parse(k.as_str()), Some(k));
        }
        assert_eq!(MessageKind::parse("memo"), None);
    }
}
