//! Opaque connection identities.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of one connection.
///
/// Both endpoints of a connection register descriptors carrying the same
/// `ConnId`, which is how a connection can be located and removed from
/// either side. Equality and hashing use only the numeric id; the optional
/// name is display-only.
#[derive(Debug, Clone, Eq)]
pub struct ConnId {
    id: u64,
    name: Option<Arc<str>>,
}

impl ConnId {
    /// Allocate a fresh anonymous identity.
    pub fn new() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: None,
        }
    }

    /// Allocate a fresh identity with a display name.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: Some(name.into()),
        }
    }

    /// The display name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ConnId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for ConnId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "#{}", self.id),
        }
    }
}
