//! Graphviz rendering of a connection graph.
//!
//! Ports are grouped into one `subgraph cluster_*` per owning component.
//! Connections are not drawn as bare edges: each becomes (or joins) a
//! record-shaped buffer node sitting between its output and input ports,
//! so the rendered picture shows where buffers actually live. How many
//! connections collapse into one record is decided by the policy's
//! [`BufferSharing`]:
//!
//! - `PerConnection`: one record per (output port, input port) pair
//! - `PerInputPort`: every connection into the same input port joins one
//!   record
//! - `PerOutputPort`: every connection out of the same output port joins
//!   one record
//! - `Shared`: records merge transitively; two groups that turn out to
//!   share any endpoint are unioned into one surviving record

use super::graph::{ConnectionGraph, GraphNode};
use crate::policy::BufferSharing;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use std::fmt::Write;

/// One buffer record and the ports it connects.
struct Record {
    label: String,
    outputs: Vec<NodeIndex>,
    inputs: Vec<NodeIndex>,
}

impl Record {
    fn new(label: String) -> Self {
        Self {
            label,
            outputs: Vec::new(),
            inputs: Vec::new(),
        }
    }

    fn attach(&mut self, output: NodeIndex, input: NodeIndex) {
        if !self.outputs.contains(&output) {
            self.outputs.push(output);
        }
        if !self.inputs.contains(&input) {
            self.inputs.push(input);
        }
    }
}

/// Grouping key for the non-transitive sharing policies.
#[derive(PartialEq, Eq, Hash)]
enum RecordKey {
    PerConnection(NodeIndex, NodeIndex),
    PerInputPort(NodeIndex),
    PerOutputPort(NodeIndex),
}

/// Render the graph as a Graphviz `digraph` document.
pub fn render(graph: &ConnectionGraph) -> String {
    let inner = graph.inner();

    // Collapse edges into buffer records.
    let mut records: Vec<Option<Record>> = Vec::new();
    let mut keyed: HashMap<RecordKey, usize> = HashMap::new();
    let mut shared: HashMap<NodeIndex, usize> = HashMap::new();
    for edge in inner.edge_references() {
        let (output, input) = (edge.source(), edge.target());
        let policy = &edge.weight().policy;
        let slot = match policy.buffer_sharing() {
            BufferSharing::PerConnection => *keyed
                .entry(RecordKey::PerConnection(output, input))
                .or_insert_with(|| {
                    records.push(Some(Record::new(policy.to_string())));
                    records.len() - 1
                }),
            BufferSharing::PerInputPort => *keyed
                .entry(RecordKey::PerInputPort(input))
                .or_insert_with(|| {
                    records.push(Some(Record::new(policy.to_string())));
                    records.len() - 1
                }),
            BufferSharing::PerOutputPort => *keyed
                .entry(RecordKey::PerOutputPort(output))
                .or_insert_with(|| {
                    records.push(Some(Record::new(policy.to_string())));
                    records.len() - 1
                }),
            BufferSharing::Shared => {
                merge_shared(&mut records, &mut shared, policy.to_string(), output, input)
            }
        };
        if let Some(record) = records[slot].as_mut() {
            record.attach(output, input);
        }
        if policy.buffer_sharing() == BufferSharing::Shared {
            shared.insert(output, slot);
            shared.insert(input, slot);
        }
    }

    // Group nodes by owner, preserving discovery order.
    let mut owners: Vec<(&str, Vec<NodeIndex>)> = Vec::new();
    for idx in inner.node_indices() {
        let owner = inner[idx].owner();
        match owners.iter_mut().find(|(o, _)| *o == owner) {
            Some((_, members)) => members.push(idx),
            None => owners.push((owner, vec![idx])),
        }
    }

    let mut out = String::from("digraph ConnectionGraph {\n");
    out.push_str("    rankdir=LR;\n");
    out.push_str("    node [shape=box];\n");
    for (owner, members) in &owners {
        let _ = writeln!(out, "    subgraph cluster_{} {{", sanitize(owner));
        let _ = writeln!(out, "        label=\"{owner}\";");
        for &idx in members {
            let _ = writeln!(
                out,
                "        {} [label=\"{}\"];",
                node_id(&inner[idx], idx),
                inner[idx].name()
            );
        }
        out.push_str("    }\n");
    }
    for (slot, record) in records.iter().enumerate() {
        let Some(record) = record else { continue };
        let _ = writeln!(
            out,
            "    conn_{slot} [shape=record, label=\"{{{}}}\"];",
            record.label
        );
        for &output in &record.outputs {
            let _ = writeln!(out, "    {} -> conn_{slot};", node_id(&inner[output], output));
        }
        for &input in &record.inputs {
            let _ = writeln!(out, "    conn_{slot} -> {};", node_id(&inner[input], input));
        }
    }
    out.push_str("}\n");
    out
}

/// Pick or create the record for a `Shared` connection, transitively
/// unioning the groups its endpoints already belong to. The surviving
/// record absorbs the other's port sets; every endpoint of the absorbed
/// group is re-pointed to the survivor.
fn merge_shared(
    records: &mut Vec<Option<Record>>,
    shared: &mut HashMap<NodeIndex, usize>,
    label: String,
    output: NodeIndex,
    input: NodeIndex,
) -> usize {
    match (shared.get(&output).copied(), shared.get(&input).copied()) {
        (None, None) => {
            records.push(Some(Record::new(label)));
            records.len() - 1
        }
        (Some(slot), None) | (None, Some(slot)) => slot,
        (Some(a), Some(b)) if a == b => a,
        (Some(a), Some(b)) => {
            let absorbed = records[b].take().expect("absorbed record");
            let survivor = records[a].as_mut().expect("surviving record");
            for output in absorbed.outputs {
                if !survivor.outputs.contains(&output) {
                    survivor.outputs.push(output);
                }
            }
            for input in absorbed.inputs {
                if !survivor.inputs.contains(&input) {
                    survivor.inputs.push(input);
                }
            }
            for slot in shared.values_mut() {
                if *slot == b {
                    *slot = a;
                }
            }
            a
        }
    }
}

/// Stable dot identifier of a node. Port nodes use their sanitized
/// qualified name; placeholder nodes additionally carry the node index so
/// two remote stubs with the same label stay distinct.
fn node_id(node: &GraphNode, idx: NodeIndex) -> String {
    let base = format!("{}___{}", sanitize(node.owner()), sanitize(node.name()));
    if node.is_port() {
        base
    } else {
        format!("{base}_{}", idx.index())
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
