//! Connection chains built from reference-counted channel elements.
//!
//! This module provides the hop type for connection chains:
//!
//! - [`ChannelElement`]: one hop; owns its successor, observes its
//!   predecessor
//! - [`ElementKind`]: capability tag selecting single-slot or fan-in /
//!   fan-out linking behavior
//! - [`remote`]: well-known labels for opaque remote transport stubs
//!
//! Chains are wired with [`ChannelElement::set_output`], torn down with
//! [`ChannelElement::disconnect`], and traversed by the run-time
//! propagation calls ([`signal`](ChannelElement::signal),
//! [`input_ready`](ChannelElement::input_ready),
//! [`clear`](ChannelElement::clear)).

mod element;
pub mod remote;

pub use element::{ChannelElement, ElementKind};
