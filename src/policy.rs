//! Connection policies.
//!
//! A [`ConnPolicy`] describes how a single connection behaves: how samples
//! are buffered, how access to the buffer is synchronized, whether data is
//! pushed or pulled, and how the buffer is shared between connections that
//! touch the same port. The policy travels with the connection descriptor
//! and is carried, read-only, into introspection output.

use std::fmt;

/// Buffering discipline of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Buffering {
    /// No buffering: the channel holds only the most recent sample.
    #[default]
    None,
    /// Bounded FIFO buffer; writes to a full buffer are rejected.
    Bounded,
    /// Circular buffer; writes to a full buffer overwrite the oldest sample.
    Circular,
}

/// Concurrency discipline used by a connection's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Locking {
    /// No synchronization; safe only for single-threaded wiring.
    Unsync,
    /// Mutex-guarded access.
    Locked,
    /// Lock-free access.
    #[default]
    LockFree,
}

/// Whether one role (reader or writer) of a connection's buffer may be
/// shared with other connections on the same port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sharing {
    /// The buffer end is private to this connection.
    #[default]
    Private,
    /// The buffer end is shared across connections on the same port.
    Shared,
}

/// How connection records are grouped when the topology is rendered.
///
/// Derived from the per-role [`Sharing`] flags of a policy; this is the key
/// used by the Graphviz exporter to collapse edges into buffer records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferSharing {
    /// One buffer per (output port, input port) pair.
    PerConnection,
    /// All connections into one input port share a buffer.
    PerInputPort,
    /// All connections out of one output port share a buffer.
    PerOutputPort,
    /// One buffer shared by every connection in the group.
    Shared,
}

/// Configuration bundle for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnPolicy {
    /// Buffering discipline.
    pub buffering: Buffering,
    /// Buffer capacity in samples; ignored for [`Buffering::None`].
    pub size: usize,
    /// Concurrency discipline of the buffer.
    pub locking: Locking,
    /// `true` for push semantics (writer drives), `false` for pull.
    pub push: bool,
    /// Sharing of the reader end of the buffer.
    pub read_sharing: Sharing,
    /// Sharing of the writer end of the buffer.
    pub write_sharing: Sharing,
    /// Maximum number of threads expected to touch the buffer concurrently.
    pub max_threads: usize,
    /// Whether data loss on this connection is an error for the writer.
    pub mandatory: bool,
    /// Transport identifier; 0 means in-process.
    pub transport: u16,
    /// Optional display name for the connection.
    pub name: Option<String>,
}

impl Default for ConnPolicy {
    fn default() -> Self {
        Self {
            buffering: Buffering::None,
            size: 0,
            locking: Locking::LockFree,
            push: true,
            read_sharing: Sharing::Private,
            write_sharing: Sharing::Private,
            max_threads: 2,
            mandatory: false,
            transport: 0,
            name: None,
        }
    }
}

impl ConnPolicy {
    /// An unbuffered, latest-sample connection.
    pub fn data() -> Self {
        Self::default()
    }

    /// A bounded FIFO connection holding up to `size` samples.
    pub fn buffer(size: usize) -> Self {
        Self {
            buffering: Buffering::Bounded,
            size,
            ..Self::default()
        }
    }

    /// A circular-buffer connection holding up to `size` samples.
    pub fn circular(size: usize) -> Self {
        Self {
            buffering: Buffering::Circular,
            size,
            ..Self::default()
        }
    }

    /// Set the locking discipline.
    pub fn with_locking(mut self, locking: Locking) -> Self {
        self.locking = locking;
        self
    }

    /// Switch to pull semantics.
    pub fn pull(mut self) -> Self {
        self.push = false;
        self
    }

    /// Share the reader end of the buffer across the input port.
    pub fn with_shared_read(mut self) -> Self {
        self.read_sharing = Sharing::Shared;
        self
    }

    /// Share the writer end of the buffer across the output port.
    pub fn with_shared_write(mut self) -> Self {
        self.write_sharing = Sharing::Shared;
        self
    }

    /// Mark the connection mandatory: data loss is reported to the writer.
    pub fn with_mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Set the transport identifier.
    pub fn with_transport(mut self, transport: u16) -> Self {
        self.transport = transport;
        self
    }

    /// Set a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Buffer grouping implied by the per-role sharing flags.
    pub fn buffer_sharing(&self) -> BufferSharing {
        match (self.write_sharing, self.read_sharing) {
            (Sharing::Private, Sharing::Private) => BufferSharing::PerConnection,
            (Sharing::Private, Sharing::Shared) => BufferSharing::PerInputPort,
            (Sharing::Shared, Sharing::Private) => BufferSharing::PerOutputPort,
            (Sharing::Shared, Sharing::Shared) => BufferSharing::Shared,
        }
    }
}

impl fmt::Display for ConnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.buffering {
            Buffering::None => write!(f, "data")?,
            Buffering::Bounded => write!(f, "buffer({})", self.size)?,
            Buffering::Circular => write!(f, "circular({})", self.size)?,
        }
        match self.locking {
            Locking::Unsync => write!(f, "|unsync")?,
            Locking::Locked => write!(f, "|locked")?,
            Locking::LockFree => write!(f, "|lock-free")?,
        }
        write!(f, "|{}", if self.push { "push" } else { "pull" })?;
        match self.buffer_sharing() {
            BufferSharing::PerConnection => write!(f, "|per-connection")?,
            BufferSharing::PerInputPort => write!(f, "|per-input-port")?,
            BufferSharing::PerOutputPort => write!(f, "|per-output-port")?,
            BufferSharing::Shared => write!(f, "|shared")?,
        }
        if self.mandatory {
            write!(f, "|mandatory")?;
        }
        if let Some(name) = &self.name {
            write!(f, "|{name}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ConnPolicy::default();
        assert_eq!(policy.buffering, Buffering::None);
        assert_eq!(policy.locking, Locking::LockFree);
        assert!(policy.push);
        assert_eq!(policy.buffer_sharing(), BufferSharing::PerConnection);
    }

    #[test]
    fn test_buffer_constructors() {
        let policy = ConnPolicy::buffer(16);
        assert_eq!(policy.buffering, Buffering::Bounded);
        assert_eq!(policy.size, 16);

        let policy = ConnPolicy::circular(8);
        assert_eq!(policy.buffering, Buffering::Circular);
        assert_eq!(policy.size, 8);
    }

    #[test]
    fn test_buffer_sharing_derivation() {
        assert_eq!(
            ConnPolicy::data().buffer_sharing(),
            BufferSharing::PerConnection
        );
        assert_eq!(
            ConnPolicy::data().with_shared_read().buffer_sharing(),
            BufferSharing::PerInputPort
        );
        assert_eq!(
            ConnPolicy::data().with_shared_write().buffer_sharing(),
            BufferSharing::PerOutputPort
        );
        assert_eq!(
            ConnPolicy::data()
                .with_shared_read()
                .with_shared_write()
                .buffer_sharing(),
            BufferSharing::Shared
        );
    }

    #[test]
    fn test_display_compact_form() {
        let policy = ConnPolicy::buffer(4)
            .with_locking(Locking::Locked)
            .pull()
            .with_name("telemetry");
        let rendered = policy.to_string();
        assert_eq!(rendered, "buffer(4)|locked|pull|per-connection|telemetry");
    }

    #[test]
    fn test_display_mandatory() {
        let rendered = ConnPolicy::data().with_mandatory().to_string();
        assert!(rendered.contains("|mandatory"));
    }
}
