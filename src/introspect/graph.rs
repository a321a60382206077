//! On-demand construction of the connection topology graph.
//!
//! [`ConnectionGraph`] walks live [`ConnectionManager`] snapshots starting
//! from a port or a component's port set and materializes a value-typed
//! node/edge graph for diagnostics. The walk is breadth-first and bounded
//! by a remaining-depth counter; nodes are deduplicated by endpoint
//! identity so cyclic topologies terminate with a node count bounded by
//! the number of distinct endpoints, not by the requested depth.
//!
//! Construction is pure: no rendering, no I/O, no topology mutation. The
//! graph reads manager snapshots point-in-time, so connections changing
//! mid-walk may be missed or doubly observed but can never corrupt the
//! result.
//!
//! [`ConnectionManager`]: crate::connection::ConnectionManager

use crate::channel::{ChannelElement, remote};
use crate::connection::{ChannelDescriptor, ConnId};
use crate::observability;
use crate::policy::ConnPolicy;
use crate::port::{FREE_OWNER, Port, PortDirection, PortOwner};
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Owner tag of the sentinel node standing in for an absent component.
pub const NO_COMPONENT: &str = "{NONE}";

/// Identity under which nodes are deduplicated during the walk.
///
/// Local ports are identified by qualified name; endpoints without a
/// resolvable port by channel-element identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Port(String),
    Element(usize),
    Sentinel(String),
}

/// A node wrapping a resolvable local port.
#[derive(Clone)]
pub struct PortNode {
    port: Arc<Port>,
}

impl PortNode {
    /// The wrapped port.
    pub fn port(&self) -> &Arc<Port> {
        &self.port
    }

    /// The port's qualified name.
    pub fn qualified_name(&self) -> String {
        self.port.qualified_name()
    }
}

/// A synthesized placeholder for a chain terminus with no resolvable
/// port, typically a remote transport adapter.
#[derive(Debug, Clone)]
pub struct RemoteNode {
    /// Owner tag derived from the adapter identity table.
    pub owner: String,
    /// Display name: remote URI, connection name, or element label.
    pub name: String,
    /// The element-name label of the terminus.
    pub element_name: String,
    /// Local URI of the terminus, if known.
    pub local_uri: Option<String>,
    /// Remote URI of the terminus, if known.
    pub remote_uri: Option<String>,
    /// Policy attached to the terminus or its descriptor.
    pub policy: Option<ConnPolicy>,
    /// Identity of the descriptor the terminus was discovered through.
    pub conn_id: Option<ConnId>,
    /// Role hint derived from the adapter identity, if any.
    pub direction: Option<PortDirection>,
}

/// One node of the introspection graph.
#[derive(Clone)]
pub enum GraphNode {
    /// A resolvable local port.
    Port(PortNode),
    /// A synthesized remote placeholder.
    Remote(RemoteNode),
    /// Sentinel for an absent or empty component.
    Sentinel {
        /// Display label of the sentinel.
        label: String,
    },
}

impl GraphNode {
    /// Whether this node wraps a resolvable port.
    pub fn is_port(&self) -> bool {
        matches!(self, Self::Port(_))
    }

    /// Whether this node represents a remote endpoint.
    pub fn is_remote(&self) -> bool {
        match self {
            Self::Port(node) => !node.port.is_local(),
            Self::Remote(_) => true,
            Self::Sentinel { .. } => false,
        }
    }

    /// The data-flow role of this node, when known. Input ports are always
    /// sinks.
    pub fn direction(&self) -> Option<PortDirection> {
        match self {
            Self::Port(node) => Some(node.port.direction()),
            Self::Remote(node) => node.direction,
            Self::Sentinel { .. } => None,
        }
    }

    /// The owner tag used for grouping.
    pub fn owner(&self) -> &str {
        match self {
            Self::Port(node) => node.port.owner().unwrap_or(FREE_OWNER),
            Self::Remote(node) => &node.owner,
            Self::Sentinel { .. } => NO_COMPONENT,
        }
    }

    /// Short name of the node within its owner.
    pub fn name(&self) -> &str {
        match self {
            Self::Port(node) => node.port.name(),
            Self::Remote(node) => &node.name,
            Self::Sentinel { label } => label,
        }
    }

    /// Display name used by renderers.
    pub fn display_name(&self) -> String {
        match self {
            Self::Port(node) => node.qualified_name(),
            Self::Remote(node) => node.name.clone(),
            Self::Sentinel { label } => label.clone(),
        }
    }

    /// The element-name label, for remote placeholders.
    pub fn element_name(&self) -> Option<&str> {
        match self {
            Self::Remote(node) => Some(&node.element_name),
            _ => None,
        }
    }

    /// Local URI, for remote placeholders.
    pub fn local_uri(&self) -> Option<&str> {
        match self {
            Self::Remote(node) => node.local_uri.as_deref(),
            _ => None,
        }
    }

    /// Remote URI, for remote placeholders.
    pub fn remote_uri(&self) -> Option<&str> {
        match self {
            Self::Remote(node) => node.remote_uri.as_deref(),
            _ => None,
        }
    }

    /// Attached policy, for remote placeholders.
    pub fn policy(&self) -> Option<&ConnPolicy> {
        match self {
            Self::Remote(node) => node.policy.as_ref(),
            _ => None,
        }
    }
}

impl std::fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphNode")
            .field("name", &self.display_name())
            .field("direction", &self.direction())
            .field("remote", &self.is_remote())
            .finish()
    }
}

/// One edge of the introspection graph, stored from data source to data
/// sink.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    /// Identity shared by the descriptors on both sides.
    pub id: ConnId,
    /// The policy the connection was established with.
    pub policy: ConnPolicy,
    /// `false` when both endpoints were direction-ambiguous and the
    /// deterministic fallback (discovering side becomes the source) was
    /// used.
    pub direction_resolved: bool,
    /// Whether the far side's manager was also seen carrying this
    /// connection.
    pub confirmed_peer: bool,
}

/// A depth-bounded, point-in-time snapshot of the live connection
/// topology.
pub struct ConnectionGraph {
    graph: DiGraph<GraphNode, GraphEdge>,
    index: HashMap<NodeKey, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl ConnectionGraph {
    fn empty() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            roots: Vec::new(),
        }
    }

    /// Build the graph reachable from one port.
    pub fn from_port(port: &Arc<Port>, depth: usize) -> Self {
        let mut graph = Self::empty();
        graph.seed_port(port);
        graph.build(depth)
    }

    /// Build the graph reachable from every port of a component.
    pub fn from_component(component: &dyn PortOwner, depth: usize) -> Self {
        let mut graph = Self::empty();
        let mut seeded = false;
        for name in component.port_names() {
            if let Some(port) = component.port(&name) {
                graph.seed_port(&port);
                seeded = true;
            }
        }
        if !seeded {
            graph.seed_sentinel(format!("(empty component: {})", component.name()));
        }
        graph.build(depth)
    }

    /// Build the graph for a component that may be absent. An absent
    /// component yields a sentinel node instead of an error.
    pub fn from_optional_component(component: Option<&dyn PortOwner>, depth: usize) -> Self {
        match component {
            Some(component) => Self::from_component(component, depth),
            None => {
                let mut graph = Self::empty();
                graph.seed_sentinel("(empty component)".to_string());
                graph.build(depth)
            }
        }
    }

    fn seed_port(&mut self, port: &Arc<Port>) {
        let key = NodeKey::Port(port.qualified_name());
        let (idx, _) = self.intern(
            key,
            GraphNode::Port(PortNode {
                port: Arc::clone(port),
            }),
        );
        if !self.roots.contains(&idx) {
            self.roots.push(idx);
        }
    }

    fn seed_sentinel(&mut self, label: String) {
        let (idx, _) = self.intern(
            NodeKey::Sentinel(label.clone()),
            GraphNode::Sentinel { label },
        );
        self.roots.push(idx);
    }

    /// Breadth-first expansion with an explicit remaining-depth counter,
    /// clamped to at least one hop.
    fn build(mut self, depth: usize) -> Self {
        let started = Instant::now();
        let mut remaining = depth.max(1);
        let mut frontier = self.roots.clone();
        while !frontier.is_empty() {
            remaining -= 1;
            let mut next = Vec::new();
            for idx in frontier {
                let port = match &self.graph[idx] {
                    GraphNode::Port(node) => Arc::clone(node.port()),
                    _ => continue,
                };
                let descriptors = port.manager().connections();
                trace!(
                    port = %port.qualified_name(),
                    descriptors = descriptors.len(),
                    remaining,
                    "expanding node"
                );
                for descriptor in descriptors {
                    let far = match port.direction() {
                        PortDirection::Output => descriptor.channel.output_endpoint(),
                        PortDirection::Input => descriptor.channel.input_endpoint(),
                    };
                    let (key, node) = classify_endpoint(&far, &descriptor);
                    let (other, newly) = self.intern(key, node);
                    self.record_edge(idx, other, &descriptor);
                    if newly {
                        if remaining > 0 {
                            next.push(other);
                        } else {
                            // Depth exhausted: attach the branch's
                            // immediate descriptor metadata without
                            // recursing further.
                            self.confirm_edges_of(other);
                        }
                    }
                }
            }
            if remaining == 0 {
                break;
            }
            frontier = next;
        }
        observability::record_walk(started.elapsed(), self.graph.node_count());
        self
    }

    /// Intern a node under its identity key, returning its index and
    /// whether it was newly added.
    fn intern(&mut self, key: NodeKey, node: GraphNode) -> (NodeIndex, bool) {
        if let Some(idx) = self.index.get(&key) {
            return (*idx, false);
        }
        let idx = self.graph.add_node(node);
        self.index.insert(key, idx);
        (idx, true)
    }

    /// Record the connection described by `descriptor` between the
    /// discovering node and the far node, deduplicating per connection
    /// identity. A second sighting from the far side confirms the edge
    /// instead of duplicating it.
    fn record_edge(&mut self, from: NodeIndex, other: NodeIndex, descriptor: &ChannelDescriptor) {
        if let Some(existing) = self.find_edge_between(from, other, &descriptor.id) {
            self.graph[existing].confirmed_peer = true;
            return;
        }
        let from_dir = self.graph[from].direction();
        let to_dir = self.graph[other].direction();
        let (source, sink, resolved) = match (from_dir, to_dir) {
            (Some(PortDirection::Output), _) => (from, other, true),
            (Some(PortDirection::Input), _) => (other, from, true),
            (None, Some(PortDirection::Input)) => (from, other, true),
            (None, Some(PortDirection::Output)) => (other, from, true),
            (None, None) => (from, other, false),
        };
        self.graph.add_edge(
            source,
            sink,
            GraphEdge {
                id: descriptor.id.clone(),
                policy: descriptor.policy.clone(),
                direction_resolved: resolved,
                confirmed_peer: false,
            },
        );
    }

    fn find_edge_between(&self, a: NodeIndex, b: NodeIndex, id: &ConnId) -> Option<EdgeIndex> {
        self.graph
            .edges_connecting(a, b)
            .chain(self.graph.edges_connecting(b, a))
            .find(|edge| edge.weight().id == *id)
            .map(|edge| edge.id())
    }

    /// Scan the manager of a terminal-depth port node and confirm the
    /// edges whose identity it also carries.
    fn confirm_edges_of(&mut self, idx: NodeIndex) {
        let port = match &self.graph[idx] {
            GraphNode::Port(node) => Arc::clone(node.port()),
            _ => return,
        };
        let known: Vec<ConnId> = port
            .manager()
            .connections()
            .iter()
            .map(|d| d.id.clone())
            .collect();
        let incident: Vec<EdgeIndex> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .chain(self.graph.edges_directed(idx, Direction::Outgoing))
            .map(|edge| edge.id())
            .collect();
        for edge in incident {
            if known.contains(&self.graph[edge].id) {
                self.graph[edge].confirmed_peer = true;
            }
        }
    }

    /// Number of nodes discovered.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct connections discovered.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterate over all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    /// Iterate over all edges as (source, edge, sink) triples.
    pub fn edges(&self) -> impl Iterator<Item = (&GraphNode, &GraphEdge, &GraphNode)> {
        self.graph.edge_indices().map(|idx| {
            let (source, sink) = self.graph.edge_endpoints(idx).expect("edge endpoints");
            (&self.graph[source], &self.graph[idx], &self.graph[sink])
        })
    }

    /// Render the graph as an indented textual tree.
    pub fn to_text(&self) -> String {
        super::text::render(self)
    }

    /// Render the graph as a Graphviz dot document.
    pub fn to_dot(&self) -> String {
        super::dot::render(self)
    }

    pub(crate) fn inner(&self) -> &DiGraph<GraphNode, GraphEdge> {
        &self.graph
    }

    pub(crate) fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }
}

impl std::fmt::Debug for ConnectionGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .field("roots", &self.roots.len())
            .finish()
    }
}

/// Resolve a chain terminus to a node: a port node when the terminus
/// carries a resolvable port, a synthesized remote placeholder otherwise.
fn classify_endpoint(
    far: &Arc<ChannelElement>,
    descriptor: &ChannelDescriptor,
) -> (NodeKey, GraphNode) {
    if let Some(port) = far.port() {
        let key = NodeKey::Port(port.qualified_name());
        return (key, GraphNode::Port(PortNode { port }));
    }
    let identity = remote::identify(far.element_name());
    let name = far
        .remote_uri()
        .map(str::to_string)
        .or_else(|| descriptor.id.name().map(str::to_string))
        .unwrap_or_else(|| far.element_name().to_string());
    let node = RemoteNode {
        owner: identity.owner.to_string(),
        name,
        element_name: far.element_name().to_string(),
        local_uri: far.local_uri().map(str::to_string),
        remote_uri: far.remote_uri().map(str::to_string),
        policy: far
            .policy()
            .cloned()
            .or_else(|| Some(descriptor.policy.clone())),
        conn_id: Some(descriptor.id.clone()),
        direction: identity.direction,
    };
    (
        NodeKey::Element(Arc::as_ptr(far) as usize),
        GraphNode::Remote(node),
    )
}
