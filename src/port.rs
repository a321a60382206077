//! Ports: the named, direction-typed attachment points of the topology.
//!
//! A port owns exactly one [`ConnectionManager`] tracking the connections
//! established on it, and lazily creates the fan endpoint element its
//! chains attach to. The [`PortOwner`] trait is the seam toward the
//! component layer: introspection only needs to enumerate a component's
//! port names and resolve them back to ports.

use crate::channel::{ChannelElement, ElementKind};
use crate::connection::{ConnId, ConnectionManager};
use crate::error::{Error, Result};
use crate::policy::ConnPolicy;
use std::sync::{Arc, OnceLock};

/// Owner tag used in qualified names of ports without an owner.
pub const FREE_OWNER: &str = "{FREE}";

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// An input port; always a data sink.
    Input,
    /// An output port; always a data source.
    Output,
}

/// A direction-typed connection point.
pub struct Port {
    name: String,
    owner: Option<String>,
    direction: PortDirection,
    local: bool,
    manager: ConnectionManager,
    endpoint: OnceLock<Arc<ChannelElement>>,
}

impl Port {
    fn build(
        name: String,
        owner: Option<String>,
        direction: PortDirection,
        local: bool,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            name,
            owner,
            direction,
            local,
            manager: ConnectionManager::new(weak.clone()),
            endpoint: OnceLock::new(),
        })
    }

    /// Create a local, unowned port.
    pub fn new(name: impl Into<String>, direction: PortDirection) -> Arc<Self> {
        Self::build(name.into(), None, direction, true)
    }

    /// Create a local port owned by the named component.
    pub fn with_owner(
        name: impl Into<String>,
        owner: impl Into<String>,
        direction: PortDirection,
    ) -> Arc<Self> {
        Self::build(name.into(), Some(owner.into()), direction, true)
    }

    /// Create a proxy for a port living in another process.
    pub fn remote(
        name: impl Into<String>,
        owner: impl Into<String>,
        direction: PortDirection,
    ) -> Arc<Self> {
        Self::build(name.into(), Some(owner.into()), direction, false)
    }

    /// The port's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning component's name, if any.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// `owner.name`, with a placeholder owner for free-standing ports.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner.as_deref().unwrap_or(FREE_OWNER), self.name)
    }

    /// The port's direction.
    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    /// Whether the port lives in this process.
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// The connection manager of this port.
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Whether at least one connection is registered.
    pub fn connected(&self) -> bool {
        self.manager.connected()
    }

    /// The chain endpoint element of this port, created on first use.
    ///
    /// Output ports fan out (one port feeding several connections), input
    /// ports fan in.
    pub fn endpoint(self: &Arc<Self>) -> Arc<ChannelElement> {
        Arc::clone(self.endpoint.get_or_init(|| {
            let kind = match self.direction {
                PortDirection::Output => ElementKind::FanOut,
                PortDirection::Input => ElementKind::FanIn,
            };
            Arc::new(ChannelElement::new(kind, "port").with_port(self))
        }))
    }

    /// Wire this output port to `peer` and register the connection with
    /// both managers.
    ///
    /// The chain hop adjacent to each endpoint is what gets registered;
    /// both descriptors share one [`ConnId`].
    pub fn connect_to(self: &Arc<Self>, peer: &Arc<Port>, policy: ConnPolicy) -> Result<ConnId> {
        if self.direction != PortDirection::Output || peer.direction != PortDirection::Input {
            return Err(Error::DirectionMismatch {
                from: self.qualified_name(),
                to: peer.qualified_name(),
            });
        }
        let id = match &policy.name {
            Some(name) => ConnId::named(name.clone()),
            None => ConnId::new(),
        };
        let hop = Arc::new(
            ChannelElement::new(ElementKind::Single, "data")
                .with_conn_id(id.clone())
                .with_policy(policy.clone()),
        );
        self.endpoint().set_output(&hop)?;
        hop.set_output(&peer.endpoint())?;
        self.manager.add_connection(id.clone(), Arc::clone(&hop), policy.clone());
        peer.manager.add_connection(id.clone(), hop, policy);
        Ok(id)
    }

    /// Wire this port to an opaque chain terminus (typically a remote
    /// transport stub) and register the connection with this port's
    /// manager only.
    pub fn connect_to_element(
        self: &Arc<Self>,
        far: &Arc<ChannelElement>,
        policy: ConnPolicy,
    ) -> Result<ConnId> {
        let id = match &policy.name {
            Some(name) => ConnId::named(name.clone()),
            None => ConnId::new(),
        };
        let hop = Arc::new(
            ChannelElement::new(ElementKind::Single, "data")
                .with_conn_id(id.clone())
                .with_policy(policy.clone()),
        );
        match self.direction {
            PortDirection::Output => {
                self.endpoint().set_output(&hop)?;
                hop.set_output(far)?;
            }
            PortDirection::Input => {
                far.set_output(&hop)?;
                hop.set_output(&self.endpoint())?;
            }
        }
        self.manager.add_connection(id.clone(), hop, policy);
        Ok(id)
    }

    /// Tear down every connection on this port.
    pub fn disconnect(self: &Arc<Self>) {
        self.manager.disconnect();
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.qualified_name())
            .field("direction", &self.direction)
            .field("local", &self.local)
            .field("connected", &self.connected())
            .finish()
    }
}

/// Capability surface of a component: enumerate its ports and resolve one
/// by name.
pub trait PortOwner {
    /// The component's name.
    fn name(&self) -> &str;

    /// Names of every port on this component.
    fn port_names(&self) -> Vec<String>;

    /// Resolve a port by name.
    fn port(&self, name: &str) -> Option<Arc<Port>>;
}

/// A plain bag of ports implementing [`PortOwner`].
#[derive(Default)]
pub struct Component {
    name: String,
    ports: Vec<Arc<Port>>,
}

impl Component {
    /// Create an empty component.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ports: Vec::new(),
        }
    }

    /// Add an input port owned by this component.
    pub fn add_input(&mut self, name: impl Into<String>) -> Arc<Port> {
        let port = Port::with_owner(name, self.name.clone(), PortDirection::Input);
        self.ports.push(Arc::clone(&port));
        port
    }

    /// Add an output port owned by this component.
    pub fn add_output(&mut self, name: impl Into<String>) -> Arc<Port> {
        let port = Port::with_owner(name, self.name.clone(), PortDirection::Output);
        self.ports.push(Arc::clone(&port));
        port
    }
}

impl PortOwner for Component {
    fn name(&self) -> &str {
        &self.name
    }

    fn port_names(&self) -> Vec<String> {
        self.ports.iter().map(|p| p.name().to_string()).collect()
    }

    fn port(&self, name: &str) -> Option<Arc<Port>> {
        self.ports
            .iter()
            .find(|p| p.name() == name)
            .map(Arc::clone)
    }
}
