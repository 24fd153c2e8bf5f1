use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use newsroom_core::{Capability, CapabilitySet, MessageKind, NewsRoomId, NodeId, RoleId};
use serde::{Deserialize, Serialize};

use crate::{ConfigurationError, Role, RoleRegistry};

pub const DEFAULT_MAX_REVISIONS: u32 = 3;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Produce,
    Review,
    Publish,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Produce => "produce",
            Self::Review => "review",
            Self::Publish => "publish",
        }
    }

    /// Message kinds a node of this phase accepts from its roles.
    pub fn accepted_kinds(&self) -> &'static [MessageKind] {
        match self {
            Self::Produce => &[MessageKind::Draft],
            Self::Review => &[
                MessageKind::ReviewComment,
                MessageKind::RevisionRequest,
                MessageKind::Approval,
                MessageKind::Rejection,
            ],
            Self::Publish => &[MessageKind::PublishConfirmation],
        }
    }

    fn covered_by(&self, caps: &CapabilitySet) -> bool {
        match self {
            Self::Produce => caps.contains_any(&[Capability::Produce, Capability::Revise]),
            Self::Review => caps.contains_any(&[Capability::Review, Capability::Approve]),
            Self::Publish => caps.contains(Capability::Publish),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Produce => 0,
            Self::Review => 1,
            Self::Publish => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a node hands the item to its roles.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Dispatch {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    #[default]
    Sequential,
    /// Review back to produce; taken on a revision request.
    Revision,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeSpec {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub kind: EdgeKind,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSpec {
    pub id: NodeId,
    pub phase: Phase,
    pub roles: Vec<RoleId>,
    #[serde(default)]
    pub dispatch: Dispatch,
    /// Roles whose failures are recorded but do not fail the item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional: Vec<RoleId>,
    /// Per-invocation deadline; falls back to the engine default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, phase: Phase, roles: &[&str]) -> Self {
        Self {
            id: NodeId::from_str(id),
            phase,
            roles: roles.iter().map(|r| RoleId::from_str(*r)).collect(),
            dispatch: Dispatch::Sequential,
            optional: Vec::new(),
            timeout_ms: None,
        }
    }

    pub fn parallel(mut self) -> Self {
        self.dispatch = Dispatch::Parallel;
        self
    }

    pub fn optional(mut self, role: &str) -> Self {
        self.optional.push(RoleId::from_str(role));
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }
}

/// Declarative newsroom definition, as written in config.
///
/// When `edges` holds no sequential edge the nodes are chained in declaration
/// order. Without a revision edge a revision request re-enters the first
/// produce node.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsRoomSpec {
    pub id: NewsRoomId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
    pub nodes: Vec<NodeSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<EdgeSpec>,
}

fn default_max_revisions() -> u32 {
    DEFAULT_MAX_REVISIONS
}

impl NewsRoomSpec {
    pub fn new(id: impl Into<String>, max_revisions: u32) -> Self {
        let id = id.into();
        Self { name: id.clone(), id: NewsRoomId::from_str(id), max_revisions, nodes: Vec::new(), edges: Vec::new() }
    }

    pub fn node(mut self, node: NodeSpec) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn edge(mut self, from: &str, to: &str, kind: EdgeKind) -> Self {
        self.edges.push(EdgeSpec { from: NodeId::from_str(from), to: NodeId::from_str(to), kind });
        self
    }
}

/// A role placed in a node, resolved against the registry.
#[derive(Clone)]
pub struct Slot {
    pub role: RoleId,
    pub capabilities: CapabilitySet,
    pub optional: bool,
    pub handle: Arc<dyn Role>,
}

impl Slot {
    /// Kinds this role may emit in a node of `phase`.
    pub fn expected_kinds(&self, phase: Phase) -> Vec<MessageKind> {
        let accepted = phase.accepted_kinds();
        self.capabilities
            .emittable_kinds()
            .into_iter()
            .filter(|k| accepted.contains(k))
            .collect()
    }

    pub fn is_approver(&self) -> bool {
        self.capabilities.contains(Capability::Approve)
    }

    fn drafts_on(&self, revision_pass: bool) -> bool {
        if revision_pass {
            self.capabilities.contains(Capability::Revise)
        } else {
            self.capabilities.contains(Capability::Produce)
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("role", &self.role)
            .field("capabilities", &self.capabilities)
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub phase: Phase,
    pub dispatch: Dispatch,
    pub slots: Vec<Slot>,
    pub timeout: Option<Duration>,
}

impl Node {
    /// Roles dispatched on this pass. A produce node sends first drafts to
    /// produce-capable roles and revisions to revise-capable ones, falling back
    /// to its producers when it has no reviser.
    pub fn active_slots(&self, revision_pass: bool) -> Vec<&Slot> {
        if self.phase != Phase::Produce {
            return self.slots.iter().collect();
        }
        let picked: Vec<&Slot> = self.slots.iter().filter(|s| s.drafts_on(revision_pass)).collect();
        if picked.is_empty() && revision_pass {
            return self.slots.iter().filter(|s| s.drafts_on(false)).collect();
        }
        picked
    }
}

/// A validated newsroom: nodes in execution order.
#[derive(Clone, Debug)]
pub struct Pipeline {
    pub id: NewsRoomId,
    pub name: String,
    pub max_revisions: u32,
    pub nodes: Vec<Node>,
    /// Index of the produce node a revision pass re-enters.
    pub revision_entry: usize,
}

impl Pipeline {
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.phase == phase)
    }

    /// Produce nodes to run on a drafting pass.
    pub fn drafting_nodes(&self, revision_pass: bool) -> impl Iterator<Item = &Node> {
        let skip = if revision_pass { self.revision_entry } else { 0 };
        self.nodes.iter().enumerate().filter_map(move |(i, n)| {
            (n.phase == Phase::Produce && i >= skip).then_some(n)
        })
    }
}

/// Resolves a newsroom definition against the registry and checks that every
/// path through it ends in publication or rejection.
pub fn compose(spec: &NewsRoomSpec, registry: &RoleRegistry) -> Result<Pipeline, ConfigurationError> {
    let newsroom = spec.id.clone();
    if spec.nodes.is_empty() {
        return Err(ConfigurationError::EmptyPipeline { newsroom });
    }

    // Unique node ids and resolvable roles
    let mut seen = HashSet::new();
    let mut resolved: HashMap<&NodeId, Node> = HashMap::new();
    for n in &spec.nodes {
        if !seen.insert(&n.id) {
            return Err(ConfigurationError::DuplicateNode { newsroom, node: n.id.clone() });
        }
        resolved.insert(&n.id, resolve_node(&newsroom, n, registry)?);
    }

    // Edges reference existing nodes
    for e in &spec.edges {
        for id in [&e.from, &e.to] {
            if !seen.contains(id) {
                return Err(ConfigurationError::MissingNode { newsroom, node: id.clone() });
            }
        }
    }

    let order = execution_order(spec)?;

    let mut last_rank = 0;
    for id in &order {
        let phase = resolved[id].phase;
        if phase.rank() < last_rank {
            return Err(ConfigurationError::PhaseOrder { node: (*id).clone(), phase });
        }
        last_rank = phase.rank();
    }

    let nodes: Vec<Node> = order.iter().filter_map(|id| resolved.remove(id)).collect();
    let count = |phase: Phase| nodes.iter().filter(|n| n.phase == phase).count();
    for phase in [Phase::Produce, Phase::Review] {
        if count(phase) == 0 {
            return Err(ConfigurationError::MissingPhase { newsroom, phase });
        }
    }
    if count(Phase::Publish) != 1 {
        return Err(ConfigurationError::PublishExit { newsroom });
    }

    let slots_in = |phase: Phase| nodes.iter().filter(move |n| n.phase == phase).flat_map(|n| n.slots.iter());
    if !slots_in(Phase::Produce).any(|s| s.capabilities.contains(Capability::Produce)) {
        return Err(ConfigurationError::NoProducer { newsroom });
    }
    if !slots_in(Phase::Review).any(Slot::is_approver) {
        return Err(ConfigurationError::NoApprover { newsroom });
    }

    let revision_entry = revision_entry(spec, &nodes)?;
    Ok(Pipeline {
        id: spec.id.clone(),
        name: if spec.name.is_empty() { spec.id.to_string() } else { spec.name.clone() },
        max_revisions: spec.max_revisions,
        nodes,
        revision_entry,
    })
}

fn resolve_node(newsroom: &NewsRoomId, spec: &NodeSpec, registry: &RoleRegistry) -> Result<Node, ConfigurationError> {
    if spec.roles.is_empty() {
        return Err(ConfigurationError::EmptyNode { newsroom: newsroom.clone(), node: spec.id.clone() });
    }
    for role in &spec.optional {
        if !spec.roles.contains(role) {
            return Err(ConfigurationError::UnknownOptionalRole { node: spec.id.clone(), role: role.clone() });
        }
    }

    let mut seen = HashSet::new();
    let mut slots = Vec::with_capacity(spec.roles.len());
    for role in &spec.roles {
        if !seen.insert(role) {
            return Err(ConfigurationError::DuplicateRole { node: spec.id.clone(), role: role.clone() });
        }
        let registered = registry.get(role).ok_or_else(|| ConfigurationError::UnregisteredRole {
            newsroom: newsroom.clone(),
            role: role.clone(),
        })?;
        let capabilities = registered.descriptor.capabilities.clone();
        if !spec.phase.covered_by(&capabilities) {
            return Err(ConfigurationError::MissingCapability {
                node: spec.id.clone(),
                role: role.clone(),
                phase: spec.phase,
            });
        }
        let optional = spec.optional.contains(role);
        let decisive = spec.phase == Phase::Publish || (spec.phase == Phase::Review && capabilities.contains(Capability::Approve));
        if optional && decisive {
            return Err(ConfigurationError::MandatoryRole { node: spec.id.clone(), role: role.clone() });
        }
        slots.push(Slot { role: role.clone(), capabilities, optional, handle: Arc::clone(&registered.role) });
    }

    Ok(Node {
        id: spec.id.clone(),
        phase: spec.phase,
        dispatch: spec.dispatch,
        slots,
        timeout: spec.timeout_ms.map(Duration::from_millis),
    })
}

/// Walks the sequential edges from the single entry node. Fan-out belongs
/// inside a parallel node, so the path must not branch.
fn execution_order(spec: &NewsRoomSpec) -> Result<Vec<&NodeId>, ConfigurationError> {
    let newsroom = &spec.id;
    let sequential: Vec<&EdgeSpec> = spec.edges.iter().filter(|e| e.kind == EdgeKind::Sequential).collect();
    if sequential.is_empty() {
        return Ok(spec.nodes.iter().map(|n| &n.id).collect());
    }

    let mut graph: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    let mut incoming: HashMap<&NodeId, usize> = HashMap::new();
    for e in &sequential {
        graph.entry(&e.from).or_default().push(&e.to);
        *incoming.entry(&e.to).or_default() += 1;
    }

    // Cycle detection (DFS)
    let mut temp = HashSet::new();
    let mut perm = HashSet::new();

    fn visit<'a>(
        v: &'a NodeId,
        graph: &HashMap<&'a NodeId, Vec<&'a NodeId>>,
        temp: &mut HashSet<&'a NodeId>,
        perm: &mut HashSet<&'a NodeId>,
    ) -> bool {
        if perm.contains(v) {
            return false;
        }
        if !temp.insert(v) {
            return true;
        }
        if let Some(ns) = graph.get(v) {
            for &n in ns {
                if visit(n, graph, temp, perm) {
                    return true;
                }
            }
        }
        temp.remove(v);
        perm.insert(v);
        false
    }

    for n in &spec.nodes {
        if visit(&n.id, &graph, &mut temp, &mut perm) {
            return Err(ConfigurationError::Cycle { newsroom: newsroom.clone() });
        }
    }

    for n in &spec.nodes {
        let fan_out = graph.get(&n.id).map_or(0, Vec::len);
        let fan_in = incoming.get(&n.id).copied().unwrap_or(0);
        if fan_out > 1 || fan_in > 1 {
            return Err(ConfigurationError::Branching { newsroom: newsroom.clone(), node: n.id.clone() });
        }
    }

    // Acyclic with no branching: the first node without a predecessor starts the path.
    let Some(entry) = spec.nodes.iter().map(|n| &n.id).find(|id| !incoming.contains_key(id)) else {
        return Err(ConfigurationError::Cycle { newsroom: newsroom.clone() });
    };
    let mut order = vec![entry];
    let mut cursor = entry;
    while let Some(next) = graph.get(cursor).and_then(|ns| ns.first().copied()) {
        order.push(next);
        cursor = next;
    }

    let on_path: HashSet<&NodeId> = order.iter().copied().collect();
    if let Some(stray) = spec.nodes.iter().find(|n| !on_path.contains(&n.id)) {
        return Err(ConfigurationError::Unreachable { node: stray.id.clone() });
    }
    Ok(order)
}

fn revision_entry(spec: &NewsRoomSpec, nodes: &[Node]) -> Result<usize, ConfigurationError> {
    let index: BTreeMap<&NodeId, (usize, Phase)> = nodes.iter().enumerate().map(|(i, n)| (&n.id, (i, n.phase))).collect();
    let mut entry = None;
    for e in spec.edges.iter().filter(|e| e.kind == EdgeKind::Revision) {
        let invalid = |detail: &str| ConfigurationError::InvalidRevisionEdge {
            from: e.from.clone(),
            to: e.to.clone(),
            detail: detail.to_string(),
        };
        let (_, from_phase) = index[&e.from];
        let (to_idx, to_phase) = index[&e.to];
        if from_phase != Phase::Review {
            return Err(invalid("source must be a review node"));
        }
        if to_phase != Phase::Produce {
            return Err(invalid("target must be a produce node"));
        }
        match entry {
            Some(existing) if existing != to_idx => return Err(invalid("revision edges must share one target")),
            _ => entry = Some(to_idx),
        }
    }
    Ok(entry.unwrap_or(0))
}

/// Every newsroom the engine can accept submissions for.
#[derive(Clone, Debug, Default)]
pub struct NewsRoomCatalog {
    rooms: BTreeMap<NewsRoomId, Arc<Pipeline>>,
}

impl NewsRoomCatalog {
    pub fn compose(specs: &[NewsRoomSpec], registry: &RoleRegistry) -> Result<Self, ConfigurationError> {
        let mut catalog = Self::default();
        for spec in specs {
            catalog.insert(spec, registry)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, spec: &NewsRoomSpec, registry: &RoleRegistry) -> Result<Arc<Pipeline>, ConfigurationError> {
        if self.rooms.contains_key(&spec.id) {
            return Err(ConfigurationError::DuplicateNewsRoom(spec.id.clone()));
        }
        let pipeline = Arc::new(compose(spec, registry)?);
        self.rooms.insert(spec.id.clone(), Arc::clone(&pipeline));
        Ok(pipeline)
    }

    pub fn get(&self, id: &NewsRoomId) -> Result<Arc<Pipeline>, ConfigurationError> {
        self.rooms
            .get(id)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownNewsRoom(id.clone()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &NewsRoomId> {
        self.rooms.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
