use async_trait::async_trait;
use newsroom_core::{CapabilitySet, ContentItem, Message, MessageBody, RoleId};
use serde::{Deserialize, Serialize};

/// Result of one role invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// A raw message; the engine validates it against the schema before use.
    Produced(serde_json::Value),
    Refused { reason: String, retryable: bool },
    Faulted(String),
}

impl Outcome {
    pub fn produced(body: MessageBody) -> Self {
        Self::Produced(body.to_raw())
    }

    pub fn refused(reason: impl Into<String>, retryable: bool) -> Self {
        Self::Refused { reason: reason.into(), retryable }
    }

    pub fn faulted(error: impl Into<String>) -> Self {
        Self::Faulted(error.into())
    }
}

/// A capability unit the engine can dispatch to.
///
/// Invocations must be safe to repeat: after a fault or timeout the engine
/// calls the role again with the same snapshot and history. A role must not
/// hold locks on shared resources across an invocation.
#[async_trait]
pub trait Role: Send + Sync {
    async fn invoke(&self, content: &ContentItem, history: &[Message]) -> Outcome;
}

/// Identity and declared capabilities of a registered role.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleDescriptor {
    pub id: RoleId,
    pub capabilities: CapabilitySet,
}

impl RoleDescriptor {
    pub fn new(id: impl Into<String>, capabilities: CapabilitySet) -> Self {
        Self { id: RoleId::from_str(id), capabilities }
    }
}
