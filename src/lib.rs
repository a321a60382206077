//! # Flowlink
//!
//! The data-flow connection core of a real-time component middleware.
//!
//! Flowlink wires ports together through chains of reference-counted
//! channel elements, tracks the resulting connections per port, and lets
//! diagnostics walk the live topology on demand.
//!
//! ## Features
//!
//! - **Channel element chains**: owning successor / observing predecessor
//!   hops, with fan-in and fan-out variants for multi-connection ports
//! - **Per-port connection registry**: descriptors (identity, chain head,
//!   policy) behind one lock, snapshot reads
//! - **Collective teardown**: fan endpoints propagate a disconnect only
//!   once their last branch is removed
//! - **Depth-bounded introspection**: cycle-safe topology walks rendered
//!   as an indented tree or a Graphviz document
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowlink::prelude::*;
//!
//! // Wire an output port to an input port.
//! let video = Port::with_owner("video", "camera", PortDirection::Output);
//! let frames = Port::with_owner("frames", "recorder", PortDirection::Input);
//! video.connect_to(&frames, ConnPolicy::buffer(8))?;
//!
//! // Walk the live topology for diagnostics.
//! let graph = ConnectionGraph::from_port(&video, 3);
//! println!("{}", graph.to_text());
//!
//! // Tear everything down from either side.
//! frames.disconnect();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod connection;
pub mod error;
pub mod introspect;
pub mod observability;
pub mod policy;
pub mod port;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::channel::{ChannelElement, ElementKind};
    pub use crate::connection::{ChannelDescriptor, ConnId, ConnectionManager};
    pub use crate::error::{Error, Result};
    pub use crate::introspect::ConnectionGraph;
    pub use crate::policy::{BufferSharing, ConnPolicy};
    pub use crate::port::{Component, Port, PortDirection, PortOwner};
}

pub use error::{Error, Result};
