use newsroom_core::{NewsRoomId, NodeId, RoleId};
use thiserror::Error;

use crate::pipeline::Phase;

/// Setup-time problems. Never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown newsroom: {0}")]
    UnknownNewsRoom(NewsRoomId),
    #[error("newsroom {0} is defined twice")]
    DuplicateNewsRoom(NewsRoomId),
    #[error("role {0} is registered twice")]
    DuplicateRegistration(RoleId),
    #[error("role {0} declares no capabilities")]
    NoCapabilities(RoleId),
    #[error("newsroom {newsroom} has no nodes")]
    EmptyPipeline { newsroom: NewsRoomId },
    #[error("newsroom {newsroom} has duplicate node id: {node}")]
    DuplicateNode { newsroom: NewsRoomId, node: NodeId },
    #[error("node {node} in newsroom {newsroom} has no roles")]
    EmptyNode { newsroom: NewsRoomId, node: NodeId },
    #[error("role {role} appears twice in node {node}")]
    DuplicateRole { node: NodeId, role: RoleId },
    #[error("newsroom {newsroom} references unregistered role {role}")]
    UnregisteredRole { newsroom: NewsRoomId, role: RoleId },
    #[error("role {role} in {phase} node {node} lacks the required capability")]
    MissingCapability { node: NodeId, role: RoleId, phase: Phase },
    #[error("optional role {role} is not a member of node {node}")]
    UnknownOptionalRole { node: NodeId, role: RoleId },
    #[error("role {role} in node {node} cannot be optional")]
    MandatoryRole { node: NodeId, role: RoleId },
    #[error("newsroom {newsroom} edge references missing node: {node}")]
    MissingNode { newsroom: NewsRoomId, node: NodeId },
    #[error("newsroom {newsroom} pipeline contains a cycle outside the revision loop")]
    Cycle { newsroom: NewsRoomId },
    #[error("newsroom {newsroom} pipeline branches at node {node}; use a parallel node to fan out")]
    Branching { newsroom: NewsRoomId, node: NodeId },
    #[error("node {node} is not reachable from the pipeline entry")]
    Unreachable { node: NodeId },
    #[error("{phase} node {node} is out of order; pipelines run produce, then review, then publish")]
    PhaseOrder { node: NodeId, phase: Phase },
    #[error("newsroom {newsroom} has no {phase} node")]
    MissingPhase { newsroom: NewsRoomId, phase: Phase },
    #[error("newsroom {newsroom} has no produce-capable role for the first draft")]
    NoProducer { newsroom: NewsRoomId },
    #[error("newsroom {newsroom} has no approve-capable reviewer, so no path can end in rejection")]
    NoApprover { newsroom: NewsRoomId },
    #[error("newsroom {newsroom} must end in exactly one publish node")]
    PublishExit { newsroom: NewsRoomId },
    #[error("invalid revision edge {from} -> {to}: {detail}")]
    InvalidRevisionEdge { from: NodeId, to: NodeId, detail: String },
}
