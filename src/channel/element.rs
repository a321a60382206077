//! Channel elements: the hops of a connection chain.
//!
//! A connection between two ports is a chain of `ChannelElement`s. Within a
//! chain an element owns its successor (`Arc`) and holds a non-owning
//! back-reference to its predecessor (`Weak`); keeping the two directions
//! asymmetric means a topology that logically loops back through remote
//! adapters can never form an ownership cycle.
//!
//! One concrete type covers all chain shapes. An [`ElementKind`] tag selects
//! the behavior: `Single` elements use one input and one output slot, the
//! fan variants replace one side (or both) with a guarded list so a port
//! endpoint can serve several connections at once.

use crate::connection::ConnId;
use crate::error::{Error, Result};
use crate::policy::ConnPolicy;
use crate::port::Port;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

/// Capability tag selecting how an element links to its neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// One predecessor, one successor.
    Single,
    /// Many predecessors, one successor (input-port endpoints).
    FanIn,
    /// One predecessor, many successors (output-port endpoints).
    FanOut,
    /// Many predecessors and many successors.
    FanInFanOut,
}

impl ElementKind {
    /// Whether the input side is a list rather than a single slot.
    pub fn has_fan_in(self) -> bool {
        matches!(self, Self::FanIn | Self::FanInFanOut)
    }

    /// Whether the output side is a list rather than a single slot.
    pub fn has_fan_out(self) -> bool {
        matches!(self, Self::FanOut | Self::FanInFanOut)
    }
}

/// Single-slot neighbor references, guarded together so a concurrent
/// traversal cannot race a teardown rewriting them.
#[derive(Default)]
struct SingleLinks {
    input: Weak<ChannelElement>,
    output: Option<Arc<ChannelElement>>,
}

/// One hop in a connection chain.
pub struct ChannelElement {
    kind: ElementKind,
    label: String,
    port: Weak<Port>,
    conn_id: Option<ConnId>,
    policy: Option<ConnPolicy>,
    local_uri: Option<String>,
    remote_uri: Option<String>,
    valid: AtomicBool,
    links: Mutex<SingleLinks>,
    inputs: RwLock<SmallVec<[Weak<ChannelElement>; 2]>>,
    outputs: RwLock<SmallVec<[Arc<ChannelElement>; 2]>>,
}

impl ChannelElement {
    /// Create an unlinked element.
    pub fn new(kind: ElementKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            port: Weak::new(),
            conn_id: None,
            policy: None,
            local_uri: None,
            remote_uri: None,
            valid: AtomicBool::new(true),
            links: Mutex::new(SingleLinks::default()),
            inputs: RwLock::new(SmallVec::new()),
            outputs: RwLock::new(SmallVec::new()),
        }
    }

    /// Attach the port this element terminates at, making it an endpoint.
    pub fn with_port(mut self, port: &Arc<Port>) -> Self {
        self.port = Arc::downgrade(port);
        self
    }

    /// Attach a connection identity (endpoint elements only).
    pub fn with_conn_id(mut self, id: ConnId) -> Self {
        self.conn_id = Some(id);
        self
    }

    /// Attach the policy of the connection this element belongs to.
    pub fn with_policy(mut self, policy: ConnPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Set the local URI of this hop.
    pub fn with_local_uri(mut self, uri: impl Into<String>) -> Self {
        self.local_uri = Some(uri.into());
        self
    }

    /// Set the remote URI of this hop (remote adapters).
    pub fn with_remote_uri(mut self, uri: impl Into<String>) -> Self {
        self.remote_uri = Some(uri.into());
        self
    }

    /// The capability tag of this element.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// The element-name label, e.g. `"data"` or a remote adapter identity.
    pub fn element_name(&self) -> &str {
        &self.label
    }

    /// The port this element terminates at, if it is an endpoint.
    pub fn port(&self) -> Option<Arc<Port>> {
        self.port.upgrade()
    }

    /// The connection identity stored on this element, if any.
    pub fn conn_id(&self) -> Option<&ConnId> {
        self.conn_id.as_ref()
    }

    /// The connection policy stored on this element, if any.
    pub fn policy(&self) -> Option<&ConnPolicy> {
        self.policy.as_ref()
    }

    /// The local URI of this hop, if one was set.
    pub fn local_uri(&self) -> Option<&str> {
        self.local_uri.as_deref()
    }

    /// The remote URI of this hop, if one was set.
    pub fn remote_uri(&self) -> Option<&str> {
        self.remote_uri.as_deref()
    }

    /// Whether the element is still usable for data flow.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Relaxed)
    }

    /// Mark the element failed. Subsequent [`signal`](Self::signal) and
    /// [`input_ready`](Self::input_ready) calls return `false`, telling the
    /// caller to tear the channel down.
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------
    // Wiring
    // ------------------------------------------------------------------

    /// Make `output` the successor of this element.
    ///
    /// This element becomes the owning predecessor of `output`, and
    /// `output` receives a non-owning back-reference to this element. On
    /// fan-out elements the successor is appended to the output list;
    /// otherwise a second, different successor is a wiring error.
    pub fn set_output(self: &Arc<Self>, output: &Arc<ChannelElement>) -> Result<()> {
        if self.kind.has_fan_out() {
            self.add_output(output);
        } else {
            let mut links = self.links.lock().unwrap();
            if let Some(existing) = &links.output {
                if Arc::ptr_eq(existing, output) {
                    return Ok(());
                }
                return Err(Error::SlotOccupied {
                    element: self.label.clone(),
                });
            }
            links.output = Some(Arc::clone(output));
        }
        output.set_input(self);
        Ok(())
    }

    /// Set the non-owning back-reference to `input`.
    ///
    /// Ownership is not transferred. On fan-in elements the reference is
    /// appended to the input list.
    pub fn set_input(self: &Arc<Self>, input: &Arc<ChannelElement>) {
        if self.kind.has_fan_in() {
            self.add_input(input);
        } else {
            self.links.lock().unwrap().input = Arc::downgrade(input);
        }
    }

    /// Append a predecessor to the input list (fan-in elements).
    pub fn add_input(&self, input: &Arc<ChannelElement>) {
        let mut inputs = self.inputs.write().unwrap();
        if !inputs
            .iter()
            .any(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(input)))
        {
            inputs.push(Arc::downgrade(input));
        }
    }

    /// Append a successor to the output list (fan-out elements).
    pub fn add_output(&self, output: &Arc<ChannelElement>) {
        let mut outputs = self.outputs.write().unwrap();
        if !outputs.iter().any(|o| Arc::ptr_eq(o, output)) {
            outputs.push(Arc::clone(output));
        }
    }

    /// Remove one predecessor from the input list. Dead references are
    /// pruned along the way. Returns whether `input` was present.
    pub fn remove_input(&self, input: &Arc<ChannelElement>) -> bool {
        let mut inputs = self.inputs.write().unwrap();
        let before = inputs.len();
        inputs.retain(|w| {
            !std::ptr::eq(w.as_ptr(), Arc::as_ptr(input)) && w.upgrade().is_some()
        });
        inputs.len() < before
    }

    /// Remove one successor from the output list. Returns whether `output`
    /// was present.
    pub fn remove_output(&self, output: &Arc<ChannelElement>) -> bool {
        let mut outputs = self.outputs.write().unwrap();
        let before = outputs.len();
        outputs.retain(|o| !Arc::ptr_eq(o, output));
        outputs.len() < before
    }

    /// The current predecessor. Fan-in elements report the first live entry
    /// of their input list.
    pub fn input(&self) -> Option<Arc<ChannelElement>> {
        if self.kind.has_fan_in() {
            self.inputs.read().unwrap().iter().find_map(|w| w.upgrade())
        } else {
            self.links.lock().unwrap().input.upgrade()
        }
    }

    /// The current successor. Fan-out elements report the first entry of
    /// their output list.
    pub fn output(&self) -> Option<Arc<ChannelElement>> {
        if self.kind.has_fan_out() {
            self.outputs.read().unwrap().first().cloned()
        } else {
            self.links.lock().unwrap().output.clone()
        }
    }

    /// Snapshot of all live predecessors.
    pub fn inputs(&self) -> Vec<Arc<ChannelElement>> {
        if self.kind.has_fan_in() {
            self.inputs
                .read()
                .unwrap()
                .iter()
                .filter_map(|w| w.upgrade())
                .collect()
        } else {
            self.input().into_iter().collect()
        }
    }

    /// Snapshot of all successors.
    pub fn outputs(&self) -> Vec<Arc<ChannelElement>> {
        if self.kind.has_fan_out() {
            self.outputs.read().unwrap().iter().cloned().collect()
        } else {
            self.output().into_iter().collect()
        }
    }

    /// Walk `input` references to the chain terminus on the input side,
    /// returning this element if it has no predecessor.
    pub fn input_endpoint(self: &Arc<Self>) -> Arc<ChannelElement> {
        let mut current = Arc::clone(self);
        while let Some(prev) = current.input() {
            current = prev;
        }
        current
    }

    /// Walk `output` references to the chain terminus on the output side,
    /// returning this element if it has no successor.
    pub fn output_endpoint(self: &Arc<Self>) -> Arc<ChannelElement> {
        let mut current = Arc::clone(self);
        while let Some(next) = current.output() {
            current = next;
        }
        current
    }

    // ------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------

    /// Signal that new data is available, propagating toward the output
    /// side.
    ///
    /// Returns `false` if a fatal failure was encountered and the channel
    /// must be torn down; this is not a backpressure signal. Fan-out
    /// elements signal every branch and report failure if any branch
    /// failed, without short-circuiting the remaining branches.
    pub fn signal(&self) -> bool {
        if !self.is_valid() {
            return false;
        }
        if self.kind.has_fan_out() {
            // Snapshot under the read lock; propagation happens unlocked.
            let outputs: SmallVec<[Arc<ChannelElement>; 2]> =
                self.outputs.read().unwrap().iter().cloned().collect();
            let mut ok = true;
            for out in outputs {
                if !out.signal() {
                    ok = false;
                }
            }
            ok
        } else {
            let next = self.links.lock().unwrap().output.clone();
            match next {
                Some(next) => next.signal(),
                None => true,
            }
        }
    }

    /// Notification that the receiving side is ready, propagated toward
    /// the output side.
    ///
    /// Fan-in elements answer locally: they are ready iff their input set
    /// is non-empty, and do not forward the call. Returns `false` on fatal
    /// connection failure.
    pub fn input_ready(&self) -> bool {
        if !self.is_valid() {
            return false;
        }
        if self.kind.has_fan_in() {
            return !self.inputs.read().unwrap().is_empty();
        }
        if self.kind.has_fan_out() {
            let outputs: SmallVec<[Arc<ChannelElement>; 2]> =
                self.outputs.read().unwrap().iter().cloned().collect();
            let mut ok = true;
            for out in outputs {
                if !out.input_ready() {
                    ok = false;
                }
            }
            ok
        } else {
            let next = self.links.lock().unwrap().output.clone();
            match next {
                Some(next) => next.input_ready(),
                None => true,
            }
        }
    }

    /// Discard buffered state, propagating toward the input side.
    pub fn clear(&self) {
        if self.kind.has_fan_in() {
            let inputs: SmallVec<[Arc<ChannelElement>; 2]> = self
                .inputs
                .read()
                .unwrap()
                .iter()
                .filter_map(|w| w.upgrade())
                .collect();
            for input in inputs {
                input.clear();
            }
        } else if let Some(prev) = self.links.lock().unwrap().input.upgrade() {
            prev.clear();
        }
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Tear down the chain through this element.
    ///
    /// `forward = true` means the teardown was initiated by the input-side
    /// endpoint and propagates toward the output; `forward = false` means
    /// the output side initiated it. `caller` identifies the neighbor the
    /// call arrived from; fan elements remove only that neighbor and
    /// forward the teardown once their list has emptied (collective
    /// teardown). Disconnecting an already-disconnected element is a no-op;
    /// the return value reports whether anything changed.
    pub fn disconnect(
        self: &Arc<Self>,
        forward: bool,
        caller: Option<&Arc<ChannelElement>>,
    ) -> bool {
        if forward {
            self.disconnect_forward(caller)
        } else {
            self.disconnect_reverse(caller)
        }
    }

    /// Teardown moving toward the output side.
    fn disconnect_forward(self: &Arc<Self>, caller: Option<&Arc<ChannelElement>>) -> bool {
        let mut changed = false;
        match self.kind {
            ElementKind::Single => {
                let next = {
                    let mut links = self.links.lock().unwrap();
                    if links.input.upgrade().is_some() {
                        changed = true;
                    }
                    links.input = Weak::new();
                    links.output.take()
                };
                if let Some(next) = next {
                    changed = true;
                    next.disconnect(true, Some(self));
                }
            }
            ElementKind::FanIn | ElementKind::FanInFanOut => {
                match caller {
                    Some(caller) => {
                        if self.remove_input(caller) {
                            changed = true;
                            self.notify_manager_removed(caller);
                        }
                        if !self.inputs.read().unwrap().is_empty() {
                            // Collective teardown: the output side is
                            // reached only once the last input is removed.
                            return changed;
                        }
                    }
                    None => {
                        for input in self.drain_inputs() {
                            changed = true;
                            self.notify_manager_removed(&input);
                            input.disconnect(false, Some(self));
                        }
                    }
                }
                // Last input gone: the teardown continues toward the
                // output side, whichever shape it has.
                if self.kind == ElementKind::FanIn {
                    let next = self.links.lock().unwrap().output.take();
                    if let Some(next) = next {
                        changed = true;
                        next.disconnect(true, Some(self));
                    }
                } else {
                    for out in self.drain_outputs() {
                        changed = true;
                        self.notify_manager_removed(&out);
                        out.disconnect(true, Some(self));
                    }
                }
            }
            ElementKind::FanOut => {
                {
                    let mut links = self.links.lock().unwrap();
                    if links.input.upgrade().is_some() {
                        changed = true;
                    }
                    links.input = Weak::new();
                }
                for out in self.drain_outputs() {
                    changed = true;
                    self.notify_manager_removed(&out);
                    out.disconnect(true, Some(self));
                }
            }
        }
        changed
    }

    /// Teardown moving toward the input side.
    fn disconnect_reverse(self: &Arc<Self>, caller: Option<&Arc<ChannelElement>>) -> bool {
        let mut changed = false;
        match self.kind {
            ElementKind::Single => {
                let prev = {
                    let mut links = self.links.lock().unwrap();
                    if links.output.take().is_some() {
                        changed = true;
                    }
                    let prev = links.input.upgrade();
                    links.input = Weak::new();
                    prev
                };
                if let Some(prev) = prev {
                    changed = true;
                    prev.disconnect(false, Some(self));
                }
            }
            ElementKind::FanOut | ElementKind::FanInFanOut => {
                match caller {
                    Some(caller) => {
                        if self.remove_output(caller) {
                            changed = true;
                            self.notify_manager_removed(caller);
                        }
                        if !self.outputs.read().unwrap().is_empty() {
                            // The input side is reached only once the last
                            // output is removed.
                            return changed;
                        }
                    }
                    None => {
                        for out in self.drain_outputs() {
                            changed = true;
                            self.notify_manager_removed(&out);
                            out.disconnect(true, Some(self));
                        }
                    }
                }
                // Last output gone: the teardown continues toward the
                // input side, whichever shape it has.
                if self.kind == ElementKind::FanOut {
                    let prev = {
                        let mut links = self.links.lock().unwrap();
                        let prev = links.input.upgrade();
                        links.input = Weak::new();
                        prev
                    };
                    if let Some(prev) = prev {
                        changed = true;
                        prev.disconnect(false, Some(self));
                    }
                } else {
                    for input in self.drain_inputs() {
                        changed = true;
                        self.notify_manager_removed(&input);
                        input.disconnect(false, Some(self));
                    }
                }
            }
            ElementKind::FanIn => {
                if self.links.lock().unwrap().output.take().is_some() {
                    changed = true;
                }
                for input in self.drain_inputs() {
                    changed = true;
                    self.notify_manager_removed(&input);
                    input.disconnect(false, Some(self));
                }
            }
        }
        changed
    }

    /// Take every live predecessor out of the input list.
    fn drain_inputs(&self) -> Vec<Arc<ChannelElement>> {
        let mut inputs = self.inputs.write().unwrap();
        let drained = inputs.iter().filter_map(|w| w.upgrade()).collect();
        inputs.clear();
        drained
    }

    /// Take every successor out of the output list.
    fn drain_outputs(&self) -> Vec<Arc<ChannelElement>> {
        let mut outputs = self.outputs.write().unwrap();
        outputs.drain(..).collect()
    }

    /// Endpoint elements tell their port's manager that a chain hop was
    /// detached. A no-op when the manager initiated the teardown itself,
    /// which keeps disconnect idempotent across both sides.
    fn notify_manager_removed(&self, removed: &Arc<ChannelElement>) {
        if let Some(port) = self.port.upgrade() {
            port.manager().remove_channel(removed);
        }
    }
}

impl std::fmt::Debug for ChannelElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelElement")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("valid", &self.is_valid())
            .field("inputs", &self.inputs().len())
            .field("outputs", &self.outputs().len())
            .finish()
    }
}
