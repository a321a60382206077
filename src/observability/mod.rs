//! Observability: connection metrics.
//!
//! Flowlink exposes the following metrics via the `metrics-rs` facade:
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `flowlink_connections_added` | Counter | Connections registered on ports |
//! | `flowlink_connections_removed` | Counter | Connections removed from ports |
//! | `flowlink_connections_active` | Gauge | Connections currently registered per port |
//! | `flowlink_disconnects_total` | Counter | Chain teardowns initiated |
//! | `flowlink_introspection_walk_ns` | Histogram | Time to build one introspection graph |
//! | `flowlink_introspection_nodes` | Gauge | Nodes discovered by the last walk |
//!
//! Call [`init_metrics`] once at startup, then attach any `metrics-rs`
//! exporter (prometheus, statsd, ...) to collect them. Recording without an
//! exporter installed is a no-op.

mod metrics;

pub use metrics::{
    init_metrics, record_connection_added, record_connection_removed, record_connections_active,
    record_disconnect, record_walk,
};
