//! Metrics collection using metrics-rs.

use metrics::{Unit, counter, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const CONNECTIONS_ADDED: &str = "flowlink_connections_added";
const CONNECTIONS_REMOVED: &str = "flowlink_connections_removed";
const CONNECTIONS_ACTIVE: &str = "flowlink_connections_active";
const DISCONNECTS_TOTAL: &str = "flowlink_disconnects_total";
const WALK_TIME_NS: &str = "flowlink_introspection_walk_ns";
const WALK_NODES: &str = "flowlink_introspection_nodes";

/// Initialize metrics descriptions.
///
/// Call this once at application startup before using any metrics.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return; // Already initialized
    }

    metrics::describe_counter!(
        CONNECTIONS_ADDED,
        Unit::Count,
        "Total number of connections registered on ports"
    );
    metrics::describe_counter!(
        CONNECTIONS_REMOVED,
        Unit::Count,
        "Total number of connections removed from ports"
    );
    metrics::describe_gauge!(
        CONNECTIONS_ACTIVE,
        Unit::Count,
        "Connections currently registered per port"
    );
    metrics::describe_counter!(
        DISCONNECTS_TOTAL,
        Unit::Count,
        "Total number of chain teardowns initiated"
    );
    metrics::describe_histogram!(
        WALK_TIME_NS,
        Unit::Nanoseconds,
        "Time to build one introspection graph"
    );
    metrics::describe_gauge!(
        WALK_NODES,
        Unit::Count,
        "Nodes discovered by the last introspection walk"
    );
}

/// Record a connection registered on a port.
#[inline]
pub fn record_connection_added(port: &str) {
    counter!(CONNECTIONS_ADDED, "port" => port.to_string()).increment(1);
}

/// Record a connection removed from a port.
#[inline]
pub fn record_connection_removed(port: &str) {
    counter!(CONNECTIONS_REMOVED, "port" => port.to_string()).increment(1);
}

/// Record the number of connections currently registered on a port.
#[inline]
pub fn record_connections_active(port: &str, active: usize) {
    gauge!(CONNECTIONS_ACTIVE, "port" => port.to_string()).set(active as f64);
}

/// Record a chain teardown initiated from a port.
#[inline]
pub fn record_disconnect(port: &str) {
    counter!(DISCONNECTS_TOTAL, "port" => port.to_string()).increment(1);
}

/// Record the duration and node count of one introspection walk.
#[inline]
pub fn record_walk(duration: Duration, nodes: usize) {
    histogram!(WALK_TIME_NS).record(duration.as_nanos() as f64);
    gauge!(WALK_NODES).set(nodes as f64);
}
