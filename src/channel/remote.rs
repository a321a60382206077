//! Well-known remote adapter identities.
//!
//! Concrete transports are outside this crate; a chain that crosses a
//! process or network boundary ends in an opaque stub element whose label
//! names the adapter. The introspector recognizes the labels below and
//! turns them into readable owner tags; anything else degrades to
//! [`UNKNOWN_OWNER`].

use crate::channel::{ChannelElement, ElementKind};
use crate::port::PortDirection;
use std::sync::Arc;

/// Label of the sending half of a network link.
pub const NETWORK_SENDER: &str = "network-sender";
/// Label of the receiving half of a network link.
pub const NETWORK_RECEIVER: &str = "network-receiver";
/// Label of the publishing half of a cross-process link.
pub const IPC_PUBLISHER: &str = "ipc-publisher";
/// Label of the subscribing half of a cross-process link.
pub const IPC_SUBSCRIBER: &str = "ipc-subscriber";

/// Owner tag for network adapters.
pub const NETWORK_OWNER: &str = "NETWORK";
/// Owner tag for cross-process adapters.
pub const IPC_OWNER: &str = "IPC";
/// Owner tag used when an adapter label is not recognized.
pub const UNKNOWN_OWNER: &str = "{UNKNOWN_OWNER}";

/// What a remote adapter label tells us about the far side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteIdentity {
    /// Owner tag used for the synthesized node.
    pub owner: &'static str,
    /// Role the adapter plays in the local graph: senders consume local
    /// data (they behave like an input port), receivers produce it.
    pub direction: Option<PortDirection>,
}

/// Classify an element-name label.
pub fn identify(element_name: &str) -> RemoteIdentity {
    match element_name {
        NETWORK_SENDER => RemoteIdentity {
            owner: NETWORK_OWNER,
            direction: Some(PortDirection::Input),
        },
        NETWORK_RECEIVER => RemoteIdentity {
            owner: NETWORK_OWNER,
            direction: Some(PortDirection::Output),
        },
        IPC_PUBLISHER => RemoteIdentity {
            owner: IPC_OWNER,
            direction: Some(PortDirection::Input),
        },
        IPC_SUBSCRIBER => RemoteIdentity {
            owner: IPC_OWNER,
            direction: Some(PortDirection::Output),
        },
        _ => RemoteIdentity {
            owner: UNKNOWN_OWNER,
            direction: None,
        },
    }
}

/// Build a chain terminus standing in for a remote transport.
pub fn remote_stub(element_name: impl Into<String>, remote_uri: impl Into<String>) -> Arc<ChannelElement> {
    Arc::new(
        ChannelElement::new(ElementKind::Single, element_name).with_remote_uri(remote_uri),
    )
}
