//! On-demand introspection of the live connection topology.
//!
//! Diagnostics tools point a [`ConnectionGraph`] at a port or a component
//! and get back a depth-bounded, point-in-time snapshot of everything
//! reachable through the connection managers: local ports, remote adapter
//! placeholders, and the policies the connections were established with.
//!
//! Construction and rendering are separate steps. [`graph`] builds the
//! value-typed graph without performing any I/O; [`text`] and [`dot`]
//! consume it:
//!
//! - [`ConnectionGraph::to_text`]: indented tree for terminal output
//! - [`ConnectionGraph::to_dot`]: Graphviz document with per-component
//!   clusters and policy-labeled buffer records

pub mod dot;
pub mod graph;
pub mod text;

pub use graph::{ConnectionGraph, GraphEdge, GraphNode, PortNode, RemoteNode};
