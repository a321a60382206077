//! Integration tests for chain wiring, fan-in/fan-out teardown, and the
//! per-port connection registry.

use flowlink::channel::{ChannelElement, ElementKind};
use flowlink::policy::ConnPolicy;
use flowlink::port::{Port, PortDirection};
use std::sync::Arc;
use std::thread;

fn single(label: &str) -> Arc<ChannelElement> {
    Arc::new(ChannelElement::new(ElementKind::Single, label))
}

/// Wiring two ports registers one shared connection with both managers.
#[test]
fn test_connect_registers_both_managers() {
    let out = Port::with_owner("out", "a", PortDirection::Output);
    let input = Port::with_owner("in", "b", PortDirection::Input);

    let id = out.connect_to(&input, ConnPolicy::data()).unwrap();

    for port in [&out, &input] {
        let descriptors = port.manager().connections();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].id, id);
        assert!(port.manager().is_single_connection());
    }
}

/// Removing a connection by identity empties the manager; removing it
/// again reports the miss without raising.
#[test]
fn test_remove_connection_by_id() {
    let out = Port::with_owner("out", "a", PortDirection::Output);
    let input = Port::with_owner("in", "b", PortDirection::Input);
    let id = out.connect_to(&input, ConnPolicy::data()).unwrap();

    assert!(out.manager().remove_connection(&id));
    assert!(!out.manager().connected());
    assert!(!out.manager().remove_connection(&id));
    // The peer's registration is independent of the local one.
    assert!(input.manager().connected());
}

/// Data and readiness signals travel the whole chain between two ports.
#[test]
fn test_signals_cross_the_chain() {
    let out = Port::with_owner("out", "a", PortDirection::Output);
    let input = Port::with_owner("in", "b", PortDirection::Input);
    out.connect_to(&input, ConnPolicy::data()).unwrap();

    assert!(out.endpoint().signal());
    // The input endpoint has one feeder, so it reports ready.
    assert!(input.endpoint().input_ready());
    // Fatal failure mid-chain surfaces as `false` at the source.
    let descriptors = out.manager().connections();
    descriptors[0].channel.invalidate();
    assert!(!out.endpoint().signal());
}

/// Tearing down from the output side clears both managers and unlinks the
/// chain; a second teardown is a no-op.
#[test]
fn test_full_disconnect_is_idempotent() {
    let out = Port::with_owner("out", "a", PortDirection::Output);
    let input = Port::with_owner("in", "b", PortDirection::Input);
    out.connect_to(&input, ConnPolicy::data()).unwrap();

    out.disconnect();
    assert!(!out.connected());
    assert!(!input.connected());
    assert!(out.endpoint().outputs().is_empty());
    assert!(input.endpoint().inputs().is_empty());

    out.disconnect();
    input.disconnect();
    assert!(!input.connected());
}

/// Tearing down from the input side reaches the output side's manager
/// through the chain.
#[test]
fn test_disconnect_from_input_side() {
    let out = Port::with_owner("out", "a", PortDirection::Output);
    let input = Port::with_owner("in", "b", PortDirection::Input);
    out.connect_to(&input, ConnPolicy::data()).unwrap();

    input.disconnect();
    assert!(!input.connected());
    assert!(!out.connected());
}

/// A fan-out port feeding two sinks loses only the requested branch and
/// keeps serving the other; the source endpoint empties only after the
/// last branch is gone.
#[test]
fn test_fan_out_partial_teardown() {
    let c = Port::with_owner("out", "c", PortDirection::Output);
    let d = Port::with_owner("in", "d", PortDirection::Input);
    let e = Port::with_owner("in", "e", PortDirection::Input);
    c.connect_to(&d, ConnPolicy::data()).unwrap();
    c.connect_to(&e, ConnPolicy::data()).unwrap();

    assert!(c.manager().disconnect_port(&d));
    assert!(c.connected());
    assert!(!d.connected());
    assert!(e.connected());
    assert_eq!(c.endpoint().outputs().len(), 1);
    assert!(c.endpoint().signal());

    assert!(c.manager().disconnect_port(&e));
    assert!(!c.connected());
    assert!(c.endpoint().outputs().is_empty());
    // No third peer to disconnect.
    assert!(!c.manager().disconnect_port(&d));
}

/// Disconnecting one peer of a shared input port leaves the other feeder
/// attached and ready.
#[test]
fn test_fan_in_partial_teardown() {
    let left = Port::with_owner("out", "left", PortDirection::Output);
    let right = Port::with_owner("out", "right", PortDirection::Output);
    let sink = Port::with_owner("in", "sink", PortDirection::Input);
    left.connect_to(&sink, ConnPolicy::data()).unwrap();
    right.connect_to(&sink, ConnPolicy::data()).unwrap();

    assert!(sink.manager().disconnect_port(&left));
    assert!(!left.connected());
    assert!(sink.connected());
    assert!(sink.endpoint().input_ready());

    assert!(sink.manager().disconnect_port(&right));
    assert!(!sink.endpoint().input_ready());
    assert!(!right.connected());
}

/// Dropping every owning reference frees the chain: the non-owning
/// back-references never keep an element alive.
#[test]
fn test_chain_is_freed_with_its_owners() {
    let a = single("a");
    let b = single("b");
    let c = single("c");
    a.set_output(&b).unwrap();
    b.set_output(&c).unwrap();

    let weak_b = Arc::downgrade(&b);
    let weak_c = Arc::downgrade(&c);
    drop(b);
    drop(c);
    // Still owned through the chain head.
    assert!(weak_b.upgrade().is_some());
    assert!(weak_c.upgrade().is_some());

    drop(a);
    assert!(weak_b.upgrade().is_none());
    assert!(weak_c.upgrade().is_none());
}

/// Concurrent wiring, teardown, and snapshot reads on one shared output
/// port keep the registry consistent.
#[test]
fn test_concurrent_manager_stress() {
    let out = Port::with_owner("out", "hub", PortDirection::Output);
    let rounds = 50;
    let writers = 4;

    let mut handles = Vec::new();
    for w in 0..writers {
        let out = Arc::clone(&out);
        handles.push(thread::spawn(move || {
            for i in 0..rounds {
                let input = Port::with_owner(format!("in_{w}_{i}"), "sink", PortDirection::Input);
                let id = out.connect_to(&input, ConnPolicy::data()).unwrap();
                if i % 2 == 0 {
                    out.manager().disconnect_port(&input);
                } else {
                    assert!(out.manager().remove_connection(&id));
                }
            }
        }));
    }
    let reader = {
        let out = Arc::clone(&out);
        thread::spawn(move || {
            for _ in 0..rounds * writers {
                let snapshot = out.manager().connections();
                // Snapshots are bounded by the number of writers that can
                // hold an open connection at once.
                assert!(snapshot.len() <= writers as usize);
                out.endpoint().signal();
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    reader.join().unwrap();
    assert!(!out.connected());
}

/// Concurrent signalling and teardown on one chain never deadlocks or
/// observes a half-rewired hop.
#[test]
fn test_concurrent_signal_and_disconnect() {
    for _ in 0..20 {
        let out = Port::with_owner("out", "a", PortDirection::Output);
        let input = Port::with_owner("in", "b", PortDirection::Input);
        out.connect_to(&input, ConnPolicy::data()).unwrap();

        let signaller = {
            let endpoint = out.endpoint();
            thread::spawn(move || {
                // Either outcome is fine; the call must simply not race
                // the teardown into a panic.
                for _ in 0..100 {
                    endpoint.signal();
                }
            })
        };
        let teardown = {
            let out = Arc::clone(&out);
            thread::spawn(move || out.disconnect())
        };

        signaller.join().unwrap();
        teardown.join().unwrap();
        assert!(!out.connected());
        assert!(!input.connected());
    }
}
