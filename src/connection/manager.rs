//! Per-port connection registry.

use crate::channel::ChannelElement;
use crate::connection::ConnId;
use crate::observability;
use crate::policy::ConnPolicy;
use crate::port::{Port, PortDirection};
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

/// One tracked connection: identity, chain hop, and read-only policy.
///
/// Snapshots handed out by [`ConnectionManager::connections`] are value
/// copies; mutating a descriptor has no effect on the connection.
#[derive(Clone)]
pub struct ChannelDescriptor {
    /// Identity shared by both endpoints of the connection.
    pub id: ConnId,
    /// The chain hop adjacent to the owning port's endpoint.
    pub channel: Arc<ChannelElement>,
    /// The policy the connection was established with.
    pub policy: ConnPolicy,
}

impl std::fmt::Debug for ChannelDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelDescriptor")
            .field("id", &self.id)
            .field("channel", &self.channel.element_name())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Registry of the active connections of one port.
///
/// Every operation is serialized on one lock; reads hand out full copies so
/// nothing walks chains while the lock is held.
pub struct ConnectionManager {
    port: Weak<Port>,
    connections: Mutex<Vec<ChannelDescriptor>>,
}

impl ConnectionManager {
    /// Create a manager for `port`. Called from the port constructor.
    pub(crate) fn new(port: Weak<Port>) -> Self {
        Self {
            port,
            connections: Mutex::new(Vec::new()),
        }
    }

    fn port_name(&self) -> String {
        self.port
            .upgrade()
            .map(|p| p.qualified_name())
            .unwrap_or_else(|| "(dropped)".to_string())
    }

    /// Register a connection. Reachability of the chain is the wiring
    /// code's responsibility; the manager does not validate it.
    pub fn add_connection(&self, id: ConnId, channel: Arc<ChannelElement>, policy: ConnPolicy) {
        let count = {
            let mut connections = self.connections.lock().unwrap();
            connections.push(ChannelDescriptor {
                id: id.clone(),
                channel,
                policy,
            });
            connections.len()
        };
        let port = self.port_name();
        debug!(port = %port, id = %id, "connection added");
        observability::record_connection_added(&port);
        observability::record_connections_active(&port, count);
    }

    /// Remove the descriptor with the given identity without tearing the
    /// chain down. Returns whether a match existed; absence is not an
    /// error.
    pub fn remove_connection(&self, id: &ConnId) -> bool {
        let (removed, count) = {
            let mut connections = self.connections.lock().unwrap();
            let before = connections.len();
            connections.retain(|d| d.id != *id);
            (connections.len() < before, connections.len())
        };
        if removed {
            let port = self.port_name();
            debug!(port = %port, id = %id, "connection removed");
            observability::record_connection_removed(&port);
            observability::record_connections_active(&port, count);
        }
        removed
    }

    /// Remove the descriptor whose chain contains `channel` as its
    /// registered hop or as either chain terminus. Returns whether a match
    /// existed.
    pub fn remove_channel(&self, channel: &Arc<ChannelElement>) -> bool {
        let (removed, count) = {
            let mut connections = self.connections.lock().unwrap();
            let before = connections.len();
            connections.retain(|d| !descriptor_matches_channel(d, channel));
            (connections.len() < before, connections.len())
        };
        if removed {
            let port = self.port_name();
            debug!(port = %port, element = channel.element_name(), "connection removed by channel");
            observability::record_connection_removed(&port);
            observability::record_connections_active(&port, count);
        }
        removed
    }

    /// Remove and tear down every connection. Idempotent.
    pub fn disconnect(&self) {
        let drained: Vec<ChannelDescriptor> = {
            let mut connections = self.connections.lock().unwrap();
            connections.drain(..).collect()
        };
        if drained.is_empty() {
            return;
        }
        let port = self.port_name();
        debug!(port = %port, count = drained.len(), "disconnecting all");
        for descriptor in &drained {
            self.teardown(descriptor);
            observability::record_connection_removed(&port);
            observability::record_disconnect(&port);
        }
        observability::record_connections_active(&port, 0);
    }

    /// Remove and tear down only the connection(s) whose chain terminates
    /// at `peer`. Returns whether any match existed.
    pub fn disconnect_port(&self, peer: &Arc<Port>) -> bool {
        let (drained, count) = {
            let mut connections = self.connections.lock().unwrap();
            let (matched, kept): (Vec<_>, Vec<_>) = connections
                .drain(..)
                .partition(|d| descriptor_reaches_port(d, peer));
            *connections = kept;
            let count = connections.len();
            (matched, count)
        };
        if drained.is_empty() {
            return false;
        }
        let port = self.port_name();
        debug!(port = %port, peer = %peer.qualified_name(), "disconnecting peer");
        for descriptor in &drained {
            self.teardown(descriptor);
            observability::record_connection_removed(&port);
            observability::record_disconnect(&port);
        }
        observability::record_connections_active(&port, count);
        true
    }

    /// Whether at least one connection is registered.
    pub fn connected(&self) -> bool {
        !self.connections.lock().unwrap().is_empty()
    }

    /// Whether exactly one connection is registered. Callers use this to
    /// skip fan-out handling on the fast path.
    pub fn is_single_connection(&self) -> bool {
        self.connections.lock().unwrap().len() == 1
    }

    /// Value-copy snapshot of the descriptor list; never a live view.
    pub fn connections(&self) -> Vec<ChannelDescriptor> {
        self.connections.lock().unwrap().clone()
    }

    /// Detach the descriptor's hop from this port's endpoint, then tear
    /// the chain down away from this port. An output port sits at the
    /// input side of its chains, so it initiates forward teardown; an
    /// input port initiates reverse teardown.
    fn teardown(&self, descriptor: &ChannelDescriptor) {
        let Some(port) = self.port.upgrade() else {
            return;
        };
        let endpoint = port.endpoint();
        match port.direction() {
            PortDirection::Output => {
                endpoint.disconnect(false, Some(&descriptor.channel));
                descriptor.channel.disconnect(true, None);
            }
            PortDirection::Input => {
                endpoint.disconnect(true, Some(&descriptor.channel));
                descriptor.channel.disconnect(false, None);
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("port", &self.port_name())
            .field("connections", &self.connections.lock().unwrap().len())
            .finish()
    }
}

/// Whether `channel` is the descriptor's registered hop or either chain
/// terminus.
fn descriptor_matches_channel(
    descriptor: &ChannelDescriptor,
    channel: &Arc<ChannelElement>,
) -> bool {
    Arc::ptr_eq(&descriptor.channel, channel)
        || Arc::ptr_eq(&descriptor.channel.input_endpoint(), channel)
        || Arc::ptr_eq(&descriptor.channel.output_endpoint(), channel)
}

/// Whether the descriptor's chain terminates at `peer` on either side.
fn descriptor_reaches_port(descriptor: &ChannelDescriptor, peer: &Arc<Port>) -> bool {
    let reaches = |endpoint: Arc<ChannelElement>| {
        endpoint
            .port()
            .is_some_and(|p| Arc::ptr_eq(&p, peer))
    };
    reaches(descriptor.channel.input_endpoint()) || reaches(descriptor.channel.output_endpoint())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ElementKind;

    fn element(label: &str) -> Arc<ChannelElement> {
        Arc::new(ChannelElement::new(ElementKind::Single, label))
    }

    fn manager() -> ConnectionManager {
        ConnectionManager::new(Weak::new())
    }

    #[test]
    fn test_add_and_lookup() {
        let m = manager();
        assert!(!m.connected());

        let id = ConnId::new();
        m.add_connection(id.clone(), element("chain"), ConnPolicy::data());

        assert!(m.connected());
        assert!(m.is_single_connection());
        let snapshot = m.connections();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, id);
    }

    #[test]
    fn test_remove_by_id() {
        let m = manager();
        let id = ConnId::new();
        m.add_connection(id.clone(), element("chain"), ConnPolicy::data());

        assert!(m.remove_connection(&id));
        assert!(!m.connected());
        // Absence is not an error.
        assert!(!m.remove_connection(&id));
    }

    #[test]
    fn test_remove_by_channel() {
        let m = manager();
        let chain = element("chain");
        m.add_connection(ConnId::new(), Arc::clone(&chain), ConnPolicy::data());

        let other = element("other");
        assert!(!m.remove_channel(&other));
        assert!(m.remove_channel(&chain));
        assert!(!m.connected());
    }

    #[test]
    fn test_remove_by_chain_terminus() {
        let m = manager();
        let head = element("head");
        let tail = element("tail");
        head.set_output(&tail).unwrap();
        m.add_connection(ConnId::new(), Arc::clone(&head), ConnPolicy::data());

        // The output terminus of the registered chain also matches.
        assert!(m.remove_channel(&tail));
        assert!(!m.connected());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let m = manager();
        m.add_connection(ConnId::new(), element("chain"), ConnPolicy::data());

        let snapshot = m.connections();
        m.add_connection(ConnId::new(), element("second"), ConnPolicy::data());

        assert_eq!(snapshot.len(), 1);
        assert_eq!(m.connections().len(), 2);
        assert!(!m.is_single_connection());
    }

    #[test]
    fn test_disconnect_without_port_is_safe() {
        let m = manager();
        m.add_connection(ConnId::new(), element("chain"), ConnPolicy::data());
        m.disconnect();
        assert!(!m.connected());
        // Idempotent.
        m.disconnect();
    }
}
