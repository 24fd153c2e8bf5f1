//! Built-in demo desk: an editor drafts, two investigators check the draft in
//! parallel, the chief editor signs off and the publisher files the story.

use std::sync::Arc;

use async_trait::async_trait;
use newsroom_core::{Capability, CapabilitySet, ContentItem, Message, MessageBody, MessageKind};
use newsroom_roles::{ConfigurationError, NewsRoomSpec, NodeSpec, Outcome, Phase, Role, RoleDescriptor, RoleRegistry};

pub const BASIC: &str = "basic";

struct Editor;

#[async_trait]
impl Role for Editor {
    async fn invoke(&self, content: &ContentItem, history: &[Message]) -> Outcome {
        let lead = &content.lead;
        if lead.content.trim().is_empty() {
            return Outcome::refused("lead is empty", false);
        }
        let mut body = match &content.draft {
            Some(draft) => draft.body.clone(),
            None => format!("Lead ({:?}): {}", lead.kind, lead.content),
        };
        let notes: Vec<&str> = history
            .iter()
            .filter_map(|m| match &m.body {
                MessageBody::RevisionRequest { notes } => Some(notes.as_str()),
                _ => None,
            })
            .collect();
        if let Some(latest) = notes.last() {
            body.push_str(&format!("\n\nSources: {latest}"));
        }
        Outcome::produced(MessageBody::draft(lead.preview(), body))
    }
}

/// Checks one aspect of the draft. The sourcing desk asks for a revision
/// until the draft names its sources.
struct Investigator {
    wants_sources: bool,
}

#[async_trait]
impl Role for Investigator {
    async fn invoke(&self, content: &ContentItem, _history: &[Message]) -> Outcome {
        let Some(draft) = &content.draft else {
            return Outcome::faulted("nothing to review");
        };
        if self.wants_sources && !draft.body.contains("Sources:") {
            return Outcome::produced(MessageBody::revision_request("cite at least one source"));
        }
        Outcome::produced(MessageBody::comment(format!("checked {} characters", draft.body.len())))
    }
}

struct ChiefEditor;

#[async_trait]
impl Role for ChiefEditor {
    async fn invoke(&self, content: &ContentItem, history: &[Message]) -> Outcome {
        let Some(draft) = &content.draft else {
            return Outcome::faulted("nothing to approve");
        };
        if draft.body.trim().is_empty() {
            return Outcome::produced(MessageBody::rejection("empty draft"));
        }
        let comments = history.iter().filter(|m| m.kind() == MessageKind::ReviewComment).count();
        Outcome::produced(MessageBody::Approval {
            note: Some(format!("approved after {} revision(s), {comments} comment(s)", content.revision_count)),
        })
    }
}

struct Publisher;

#[async_trait]
impl Role for Publisher {
    async fn invoke(&self, content: &ContentItem, _history: &[Message]) -> Outcome {
        Outcome::produced(MessageBody::published(format!("desk://{}/{}", content.newsroom, content.id)))
    }
}

pub fn registry() -> Result<RoleRegistry, ConfigurationError> {
    let mut reg = RoleRegistry::new();
    let caps = |c: &[Capability]| c.iter().copied().collect::<CapabilitySet>();
    reg.register(RoleDescriptor::new("editor", caps(&[Capability::Produce, Capability::Revise])), Arc::new(Editor))?;
    reg.register(
        RoleDescriptor::new("investigator-sources", caps(&[Capability::Review])),
        Arc::new(Investigator { wants_sources: true }),
    )?;
    reg.register(
        RoleDescriptor::new("investigator-facts", caps(&[Capability::Review])),
        Arc::new(Investigator { wants_sources: false }),
    )?;
    reg.register(
        RoleDescriptor::new("chief-editor", caps(&[Capability::Review, Capability::Approve])),
        Arc::new(ChiefEditor),
    )?;
    reg.register(RoleDescriptor::new("publisher", caps(&[Capability::Publish])), Arc::new(Publisher))?;
    Ok(reg)
}

pub fn basic_newsroom() -> NewsRoomSpec {
    NewsRoomSpec::new(BASIC, 2)
        .node(NodeSpec::new("draft", Phase::Produce, &["editor"]))
        .node(
            NodeSpec::new("investigate", Phase::Review, &["investigator-sources", "investigator-facts"])
                .parallel()
                .optional("investigator-facts"),
        )
        .node(NodeSpec::new("sign-off", Phase::Review, &["chief-editor"]))
        .node(NodeSpec::new("publish", Phase::Publish, &["publisher"]))
}
