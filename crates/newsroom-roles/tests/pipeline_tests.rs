use std::sync::Arc;

use async_trait::async_trait;
use newsroom_core::{Capability, CapabilitySet, ContentItem, Message, MessageBody, MessageKind, NewsRoomId, NodeId, RoleId};
use newsroom_roles::{
    compose, ConfigurationError, EdgeKind, NewsRoomCatalog, NewsRoomSpec, NodeSpec, Outcome, Phase, Role,
    RoleDescriptor, RoleRegistry,
};

struct Silent;

#[async_trait]
impl Role for Silent {
    async fn invoke(&self, _content: &ContentItem, _history: &[Message]) -> Outcome {
        Outcome::produced(MessageBody::comment("noted"))
    }
}

fn registry() -> RoleRegistry {
    let mut reg = RoleRegistry::new();
    let roles: [(&str, &[Capability]); 6] = [
        ("writer", &[Capability::Produce, Capability::Revise]),
        ("stringer", &[Capability::Produce]),
        ("rewrite-desk", &[Capability::Revise]),
        ("fact-checker", &[Capability::Review]),
        ("chief", &[Capability::Review, Capability::Approve]),
        ("publisher", &[Capability::Publish]),
    ];
    for (id, caps) in roles {
        reg.register(RoleDescriptor::new(id, caps.iter().copied().collect()), Arc::new(Silent))
            .unwrap();
    }
    reg
}

fn basic() -> NewsRoomSpec {
    NewsRoomSpec::new("basic", 2)
        .node(NodeSpec::new("draft", Phase::Produce, &["writer"]))
        .node(NodeSpec::new("check", Phase::Review, &["fact-checker", "chief"]).parallel())
        .node(NodeSpec::new("publish", Phase::Publish, &["publisher"]))
}

#[test]
fn test_basic_newsroom_composes_in_declaration_order() {
    let pipeline = compose(&basic(), &registry()).unwrap();
    let ids: Vec<&str> = pipeline.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["draft", "check", "publish"]);
    assert_eq!(pipeline.revision_entry, 0);
    assert_eq!(pipeline.max_revisions, 2);
    assert_eq!(pipeline.name, "basic");
}

#[test]
fn test_explicit_edges_define_the_path() {
    let spec = NewsRoomSpec::new("desk", 1)
        .node(NodeSpec::new("publish", Phase::Publish, &["publisher"]))
        .node(NodeSpec::new("review", Phase::Review, &["chief"]))
        .node(NodeSpec::new("draft", Phase::Produce, &["writer"]))
        .edge("draft", "review", EdgeKind::Sequential)
        .edge("review", "publish", EdgeKind::Sequential)
        .edge("review", "draft", EdgeKind::Revision);
    let pipeline = compose(&spec, &registry()).unwrap();
    let ids: Vec<&str> = pipeline.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["draft", "review", "publish"]);
}

#[test]
fn test_revision_edge_sets_reentry_node() {
    let spec = NewsRoomSpec::new("desk", 1)
        .node(NodeSpec::new("report", Phase::Produce, &["stringer"]))
        .node(NodeSpec::new("rewrite", Phase::Produce, &["rewrite-desk"]))
        .node(NodeSpec::new("review", Phase::Review, &["chief"]))
        .node(NodeSpec::new("publish", Phase::Publish, &["publisher"]))
        .edge("review", "rewrite", EdgeKind::Revision);
    let pipeline = compose(&spec, &registry()).unwrap();
    assert_eq!(pipeline.revision_entry, 1);

    let first: Vec<&str> = pipeline.drafting_nodes(false).map(|n| n.id.as_str()).collect();
    assert_eq!(first, vec!["report", "rewrite"]);
    let again: Vec<&str> = pipeline.drafting_nodes(true).map(|n| n.id.as_str()).collect();
    assert_eq!(again, vec!["rewrite"]);

    // The rewrite desk only revises, so it sits out the first pass.
    let rewrite = &pipeline.nodes[1];
    assert!(rewrite.active_slots(false).is_empty());
    assert_eq!(rewrite.active_slots(true).len(), 1);
}

#[test]
fn test_producer_stands_in_when_node_has_no_reviser() {
    let spec = NewsRoomSpec::new("desk", 1)
        .node(NodeSpec::new("report", Phase::Produce, &["stringer"]))
        .node(NodeSpec::new("review", Phase::Review, &["chief"]))
        .node(NodeSpec::new("publish", Phase::Publish, &["publisher"]));
    let pipeline = compose(&spec, &registry()).unwrap();
    let slots = pipeline.nodes[0].active_slots(true);
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].role.as_str(), "stringer");
}

#[test]
fn test_expected_kinds_intersect_phase_and_capabilities() {
    let pipeline = compose(&basic(), &registry()).unwrap();
    let review = &pipeline.nodes[1];
    let checker = &review.slots[0];
    assert_eq!(checker.expected_kinds(Phase::Review), vec![MessageKind::ReviewComment, MessageKind::RevisionRequest]);
    let chief = &review.slots[1];
    assert!(chief.expected_kinds(Phase::Review).contains(&MessageKind::Rejection));
    assert!(!chief.expected_kinds(Phase::Review).contains(&MessageKind::Draft));
}

#[test]
fn test_unregistered_role_is_rejected() {
    let spec = basic().node(NodeSpec::new("extra", Phase::Publish, &["ghost"]));
    let err = compose(&spec, &registry()).unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::UnregisteredRole { newsroom: NewsRoomId::from_str("basic"), role: RoleId::from_str("ghost") }
    );
}

#[test]
fn test_role_must_cover_node_phase() {
    let spec = NewsRoomSpec::new("bad", 1)
        .node(NodeSpec::new("draft", Phase::Produce, &["fact-checker"]))
        .node(NodeSpec::new("review", Phase::Review, &["chief"]))
        .node(NodeSpec::new("publish", Phase::Publish, &["publisher"]));
    let err = compose(&spec, &registry()).unwrap_err();
    assert!(matches!(err, ConfigurationError::MissingCapability { phase: Phase::Produce, .. }));
}

#[test]
fn test_sequential_cycle_is_rejected() {
    let spec = basic()
        .edge("draft", "check", EdgeKind::Sequential)
        .edge("check", "publish", EdgeKind::Sequential)
        .edge("publish", "draft", EdgeKind::Sequential);
    let err = compose(&spec, &registry()).unwrap_err();
    assert!(matches!(err, ConfigurationError::Cycle { .. }));
}

#[test]
fn test_branching_path_is_rejected() {
    let spec = basic()
        .node(NodeSpec::new("second-check", Phase::Review, &["chief"]))
        .edge("draft", "check", EdgeKind::Sequential)
        .edge("draft", "second-check", EdgeKind::Sequential)
        .edge("check", "publish", EdgeKind::Sequential);
    let err = compose(&spec, &registry()).unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::Branching { newsroom: NewsRoomId::from_str("basic"), node: NodeId::from_str("draft") }
    );
}

#[test]
fn test_disconnected_node_is_unreachable() {
    let spec = basic()
        .node(NodeSpec::new("orphan", Phase::Review, &["chief"]))
        .edge("draft", "check", EdgeKind::Sequential)
        .edge("check", "publish", EdgeKind::Sequential);
    let err = compose(&spec, &registry()).unwrap_err();
    assert_eq!(err, ConfigurationError::Unreachable { node: NodeId::from_str("orphan") });
}

#[test]
fn test_publish_before_review_is_out_of_order() {
    let spec = NewsRoomSpec::new("bad", 1)
        .node(NodeSpec::new("draft", Phase::Produce, &["writer"]))
        .node(NodeSpec::new("publish", Phase::Publish, &["publisher"]))
        .node(NodeSpec::new("review", Phase::Review, &["chief"]));
    let err = compose(&spec, &registry()).unwrap_err();
    assert!(matches!(err, ConfigurationError::PhaseOrder { phase: Phase::Review, .. }));
}

#[test]
fn test_pipeline_needs_an_approver() {
    let spec = NewsRoomSpec::new("soft", 1)
        .node(NodeSpec::new("draft", Phase::Produce, &["writer"]))
        .node(NodeSpec::new("review", Phase::Review, &["fact-checker"]))
        .node(NodeSpec::new("publish", Phase::Publish, &["publisher"]));
    let err = compose(&spec, &registry()).unwrap_err();
    assert!(matches!(err, ConfigurationError::NoApprover { .. }));
}

#[test]
fn test_pipeline_needs_exactly_one_publish_exit() {
    let spec = NewsRoomSpec::new("endless", 1)
        .node(NodeSpec::new("draft", Phase::Produce, &["writer"]))
        .node(NodeSpec::new("review", Phase::Review, &["chief"]));
    assert!(matches!(compose(&spec, &registry()).unwrap_err(), ConfigurationError::PublishExit { .. }));
}

#[test]
fn test_approver_cannot_be_optional() {
    let spec = NewsRoomSpec::new("lax", 1)
        .node(NodeSpec::new("draft", Phase::Produce, &["writer"]))
        .node(NodeSpec::new("review", Phase::Review, &["fact-checker", "chief"]).optional("chief"))
        .node(NodeSpec::new("publish", Phase::Publish, &["publisher"]));
    let err = compose(&spec, &registry()).unwrap_err();
    assert!(matches!(err, ConfigurationError::MandatoryRole { .. }));

    let ok = NewsRoomSpec::new("lax", 1)
        .node(NodeSpec::new("draft", Phase::Produce, &["writer"]))
        .node(NodeSpec::new("review", Phase::Review, &["fact-checker", "chief"]).optional("fact-checker"))
        .node(NodeSpec::new("publish", Phase::Publish, &["publisher"]));
    let pipeline = compose(&ok, &registry()).unwrap();
    assert!(pipeline.nodes[1].slots[0].optional);
}

#[test]
fn test_revision_edge_must_run_review_to_produce() {
    let spec = basic().edge("draft", "check", EdgeKind::Revision);
    let err = compose(&spec, &registry()).unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidRevisionEdge { .. }));
}

#[test]
fn test_newsroom_spec_parses_from_toml() {
    let raw = r#"
        id = "weekly"
        max_revisions = 1

        [[nodes]]
        id = "draft"
        phase = "produce"
        roles = ["writer"]

        [[nodes]]
        id = "review"
        phase = "review"
        roles = ["fact-checker", "chief"]
        dispatch = "parallel"
        optional = ["fact-checker"]
        timeout_ms = 1500

        [[nodes]]
        id = "publish"
        phase = "publish"
        roles = ["publisher"]

        [[edges]]
        from = "review"
        to = "draft"
        kind = "revision"
    "#;
    let spec: NewsRoomSpec = toml::from_str(raw).unwrap();
    assert_eq!(spec.nodes.len(), 3);
    let pipeline = compose(&spec, &registry()).unwrap();
    assert_eq!(pipeline.nodes[1].timeout, Some(std::time::Duration::from_millis(1500)));
    assert_eq!(pipeline.name, "weekly");
}

#[test]
fn test_catalog_rejects_unknown_and_duplicate_newsrooms() {
    let reg = registry();
    let mut catalog = NewsRoomCatalog::compose(&[basic()], &reg).unwrap();
    assert!(catalog.get(&NewsRoomId::from_str("basic")).is_ok());
    assert_eq!(
        catalog.get(&NewsRoomId::from_str("sports")).unwrap_err(),
        ConfigurationError::UnknownNewsRoom(NewsRoomId::from_str("sports"))
    );
    assert!(matches!(catalog.insert(&basic(), &reg).unwrap_err(), ConfigurationError::DuplicateNewsRoom(_)));
}

#[test]
fn test_capability_set_from_slice() {
    let caps: CapabilitySet = [Capability::Publish].into_iter().collect();
    assert!(caps.contains(Capability::Publish));
}
