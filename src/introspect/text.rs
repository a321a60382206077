//! Indented plain-text rendering of a connection graph.

use super::graph::{ConnectionGraph, GraphEdge, GraphNode};
use crate::port::PortDirection;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::HashSet;
use std::fmt::Write;

const INDENT: usize = 4;

/// Render the graph as an indented tree, one block per root.
///
/// Each line carries the node's direction tag, a remote flag when the node
/// stands for a remote endpoint, and the policy of the connection it was
/// reached through. Remote and non-port nodes get an extra debug line with
/// their URIs and policy.
pub fn render(graph: &ConnectionGraph) -> String {
    let mut out = String::new();
    let mut printed = HashSet::new();
    for &root in graph.roots() {
        print_node(graph, root, 0, None, &mut printed, &mut out);
        out.push('\n');
    }
    out
}

fn print_node(
    graph: &ConnectionGraph,
    idx: NodeIndex,
    level: usize,
    via: Option<&GraphEdge>,
    printed: &mut HashSet<NodeIndex>,
    out: &mut String,
) {
    let node = &graph.inner()[idx];
    let pad = " ".repeat(level * INDENT);

    let mut line = format!("{pad}{}{}{}", direction_tag(node), remote_tag(node), node.display_name());
    if level == 0 {
        let degree = graph
            .inner()
            .edges_directed(idx, Direction::Incoming)
            .chain(graph.inner().edges_directed(idx, Direction::Outgoing))
            .count();
        let summary = match degree {
            0 => "no",
            1 => "single",
            _ => "multiple",
        };
        let _ = write!(line, " with {summary} connection(s) (#{degree})");
    }
    if let Some(edge) = via {
        let _ = write!(line, " [{}]", edge.policy);
        if !edge.direction_resolved {
            line.push_str(" [direction unresolved]");
        }
    }
    out.push_str(&line);
    out.push('\n');

    if node.is_remote() || !node.is_port() {
        let local = node.local_uri().unwrap_or("NONE");
        let remote = node.remote_uri().unwrap_or("NONE");
        let policy = node
            .policy()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "NONE".to_string());
        let _ = writeln!(
            out,
            "{pad}[DEBUG INFO] localURI: {local} | remoteURI: {remote} | connPolicy: {policy}"
        );
    }

    if !printed.insert(idx) {
        return;
    }

    // Follow every incident edge to the neighbor, whichever way the data
    // flows, so the tree reads the same from either side of a connection.
    let neighbors: Vec<(NodeIndex, GraphEdge)> = graph
        .inner()
        .edges_directed(idx, Direction::Outgoing)
        .map(|e| (e.target(), e.weight().clone()))
        .chain(
            graph
                .inner()
                .edges_directed(idx, Direction::Incoming)
                .map(|e| (e.source(), e.weight().clone())),
        )
        .collect();
    for (neighbor, edge) in neighbors {
        if neighbor == idx {
            continue;
        }
        if printed.contains(&neighbor) {
            // Cycle or rejoin: reference the node without recursing.
            let n = &graph.inner()[neighbor];
            let childpad = " ".repeat((level + 1) * INDENT);
            let _ = writeln!(
                out,
                "{childpad}{}{}{} [{}] (see above)",
                direction_tag(n),
                remote_tag(n),
                n.display_name(),
                edge.policy
            );
            continue;
        }
        print_node(graph, neighbor, level + 1, Some(&edge), printed, out);
    }
}

fn direction_tag(node: &GraphNode) -> &'static str {
    if !node.is_port() {
        return "[NOT port] ";
    }
    match node.direction() {
        Some(PortDirection::Input) => "[In port] ",
        Some(PortDirection::Output) => "[Out port] ",
        None => "[NOT port] ",
    }
}

fn remote_tag(node: &GraphNode) -> String {
    if !node.is_remote() {
        return String::new();
    }
    match node.element_name() {
        Some(name) => format!("[REMOTE: {name}] "),
        None => "[REMOTE] ".to_string(),
    }
}
