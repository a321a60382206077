//! Integration tests for topology introspection: graph construction,
//! cycle handling, depth bounding, and the text/dot renderers.

use flowlink::channel::remote;
use flowlink::introspect::{ConnectionGraph, GraphNode};
use flowlink::policy::ConnPolicy;
use flowlink::port::{Component, Port, PortDirection};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// One connection reads identically from either endpoint: a single edge
/// with the input port as sink, whichever side the query starts from.
#[test]
fn test_edge_is_symmetric_across_query_direction() {
    init_tracing();
    let out = Port::with_owner("out", "a", PortDirection::Output);
    let input = Port::with_owner("in", "b", PortDirection::Input);
    out.connect_to(&input, ConnPolicy::data()).unwrap();

    for seed in [&out, &input] {
        let graph = ConnectionGraph::from_port(seed, 1);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        let (source, _, sink) = graph.edges().next().unwrap();
        assert_eq!(source.display_name(), "a.out");
        assert_eq!(sink.display_name(), "b.in");
    }
}

/// A cyclic topology terminates with a node count bounded by the number
/// of distinct endpoints, independent of the requested depth.
#[test]
fn test_cycle_terminates() {
    init_tracing();
    let mut a = Component::new("a");
    let a_out = a.add_output("out");
    let a_in = a.add_input("in");
    let mut b = Component::new("b");
    let b_out = b.add_output("out");
    let b_in = b.add_input("in");

    a_out.connect_to(&b_in, ConnPolicy::data()).unwrap();
    b_out.connect_to(&a_in, ConnPolicy::data()).unwrap();

    let shallow = ConnectionGraph::from_component(&a, 1);
    let deep = ConnectionGraph::from_component(&a, 100);
    assert_eq!(shallow.node_count(), 4);
    assert_eq!(deep.node_count(), 4);
    assert_eq!(deep.edge_count(), 2);
}

/// The walk stops expanding at the requested depth; one more hop is
/// needed to see the connections of the far port's other peers.
#[test]
fn test_depth_bounds_expansion() {
    let x = Port::with_owner("out", "x", PortDirection::Output);
    let z = Port::with_owner("out", "z", PortDirection::Output);
    let y = Port::with_owner("in", "y", PortDirection::Input);
    x.connect_to(&y, ConnPolicy::data()).unwrap();
    z.connect_to(&y, ConnPolicy::data()).unwrap();

    // Depth 1 from x discovers y but does not expand it toward z.
    let graph = ConnectionGraph::from_port(&x, 1);
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 1);

    let graph = ConnectionGraph::from_port(&x, 2);
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 2);
}

/// A depth of zero is clamped to one hop.
#[test]
fn test_zero_depth_still_takes_one_hop() {
    let out = Port::with_owner("out", "a", PortDirection::Output);
    let input = Port::with_owner("in", "b", PortDirection::Input);
    out.connect_to(&input, ConnPolicy::data()).unwrap();

    let graph = ConnectionGraph::from_port(&out, 0);
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 1);
}

/// An absent component yields a labeled sentinel node, never an error;
/// both renderers accept it.
#[test]
fn test_absent_component_renders() {
    let graph = ConnectionGraph::from_optional_component(None, 1);
    assert_eq!(graph.node_count(), 1);

    let text = graph.to_text();
    assert!(text.contains("(empty component)"));
    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph ConnectionGraph {"));
}

/// A component with no resolvable ports also degrades to a sentinel.
#[test]
fn test_empty_component_sentinel() {
    let component = Component::new("idle");
    let graph = ConnectionGraph::from_component(&component, 1);
    assert_eq!(graph.node_count(), 1);
    assert!(graph.to_text().contains("(empty component: idle)"));
}

/// Chains ending in a recognized adapter stub synthesize a remote node
/// with the adapter's owner label; unrecognized labels degrade to the
/// unknown-owner tag.
#[test]
fn test_remote_endpoint_labels() {
    let out = Port::with_owner("out", "a", PortDirection::Output);
    let stub = remote::remote_stub(remote::IPC_PUBLISHER, "shm://frames");
    out.connect_to_element(&stub, ConnPolicy::data()).unwrap();

    let graph = ConnectionGraph::from_port(&out, 2);
    let node = graph
        .nodes()
        .find(|n| n.is_remote())
        .expect("remote node synthesized");
    assert_eq!(node.owner(), remote::IPC_OWNER);
    assert_eq!(node.element_name(), Some(remote::IPC_PUBLISHER));
    assert_eq!(node.remote_uri(), Some("shm://frames"));

    let other = Port::with_owner("out", "b", PortDirection::Output);
    let odd = remote::remote_stub("carrier-pigeon", "rfc1149://coop");
    other.connect_to_element(&odd, ConnPolicy::data()).unwrap();
    let graph = ConnectionGraph::from_port(&other, 2);
    let node = graph.nodes().find(|n| n.is_remote()).unwrap();
    assert_eq!(node.owner(), remote::UNKNOWN_OWNER);
}

/// Adapter identities resolve the data-flow role of a remote terminus:
/// senders consume local data, receivers produce it.
#[test]
fn test_remote_direction_hints() {
    let out = Port::with_owner("out", "a", PortDirection::Output);
    let sender = remote::remote_stub(remote::NETWORK_SENDER, "tcp://far:9000");
    out.connect_to_element(&sender, ConnPolicy::data()).unwrap();

    let graph = ConnectionGraph::from_port(&out, 2);
    let (source, edge, sink) = graph.edges().next().unwrap();
    assert!(edge.direction_resolved);
    assert_eq!(source.display_name(), "a.out");
    assert!(sink.is_remote());

    // A receiver on the far side of an input port is the data source.
    let input = Port::with_owner("in", "b", PortDirection::Input);
    let receiver = remote::remote_stub(remote::NETWORK_RECEIVER, "tcp://far:9001");
    input
        .connect_to_element(&receiver, ConnPolicy::data())
        .unwrap();

    let graph = ConnectionGraph::from_port(&input, 2);
    let (source, edge, sink) = graph.edges().next().unwrap();
    assert!(edge.direction_resolved);
    assert!(source.is_remote());
    assert_eq!(sink.display_name(), "b.in");
}

/// A proxy for a port in another process resolves like any local port
/// but is flagged remote in the graph and its rendering.
#[test]
fn test_remote_port_proxy() {
    let out = Port::with_owner("out", "a", PortDirection::Output);
    let far = Port::remote("in", "other_host", PortDirection::Input);
    out.connect_to(&far, ConnPolicy::data()).unwrap();

    let graph = ConnectionGraph::from_port(&out, 2);
    let node = graph
        .nodes()
        .find(|n| n.display_name() == "other_host.in")
        .unwrap();
    assert!(node.is_port());
    assert!(node.is_remote());
    assert!(graph.to_text().contains("[REMOTE] other_host.in"));
}

/// The text tree carries direction tags, the connection-count summary,
/// and a debug block for remote nodes.
#[test]
fn test_text_rendering() {
    init_tracing();
    let out = Port::with_owner("video", "camera", PortDirection::Output);
    let input = Port::with_owner("frames", "recorder", PortDirection::Input);
    out.connect_to(&input, ConnPolicy::buffer(8).with_name("feed"))
        .unwrap();

    let text = ConnectionGraph::from_port(&out, 2).to_text();
    assert!(text.contains("[Out port] camera.video with single connection(s) (#1)"));
    assert!(text.contains("[In port] recorder.frames [buffer(8)|lock-free|push|per-connection|feed]"));

    // Queried from the input side the same connection is shown from the
    // sink's point of view.
    let text = ConnectionGraph::from_port(&input, 2).to_text();
    assert!(text.contains("[In port] recorder.frames with single connection(s) (#1)"));
    assert!(text.contains("[Out port] camera.video"));
}

/// The policy travels into the graph edge untouched.
#[test]
fn test_edge_carries_policy() {
    let out = Port::with_owner("out", "a", PortDirection::Output);
    let input = Port::with_owner("in", "b", PortDirection::Input);
    let id = out
        .connect_to(&input, ConnPolicy::circular(16).with_mandatory())
        .unwrap();

    let graph = ConnectionGraph::from_port(&out, 1);
    let (_, edge, _) = graph.edges().next().unwrap();
    assert_eq!(edge.id, id);
    assert_eq!(edge.policy, ConnPolicy::circular(16).with_mandatory());
}

/// Seeding from a whole component walks every port it owns.
#[test]
fn test_component_walk() {
    let mut camera = Component::new("camera");
    let video = camera.add_output("video");
    let control = camera.add_input("control");
    let recorder_in = Port::with_owner("frames", "recorder", PortDirection::Input);
    let panel_out = Port::with_owner("cmd", "panel", PortDirection::Output);
    video.connect_to(&recorder_in, ConnPolicy::data()).unwrap();
    panel_out.connect_to(&control, ConnPolicy::data()).unwrap();

    let graph = ConnectionGraph::from_component(&camera, 2);
    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.edge_count(), 2);
    let names: Vec<String> = graph.nodes().map(GraphNode::display_name).collect();
    assert!(names.contains(&"recorder.frames".to_string()));
    assert!(names.contains(&"panel.cmd".to_string()));
}

/// Building a graph does not disturb the topology it walks.
#[test]
fn test_walk_does_not_mutate() {
    let out = Port::with_owner("out", "a", PortDirection::Output);
    let input = Port::with_owner("in", "b", PortDirection::Input);
    out.connect_to(&input, ConnPolicy::data()).unwrap();

    for depth in [1, 2, 5] {
        let _ = ConnectionGraph::from_port(&out, depth);
    }
    assert!(out.connected());
    assert!(input.connected());
    assert!(out.manager().is_single_connection());
    assert!(out.endpoint().signal());
}
