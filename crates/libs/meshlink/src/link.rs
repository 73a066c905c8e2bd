//! Link identity types.
//!
//! A [`Link`] names a logical peer independently of the socket that carries
//! it: a 128-bit identifier, a human-readable description, and the transmit
//! handle of the session currently serving that peer. Identity is the id
//! alone; descriptions are display-only and not guaranteed unique.

use std::fmt;
use std::hash::{Hash, Hasher};

use rand_core::{OsRng, RngCore};
use tokio::sync::mpsc;

use meshlink_wire::NODE_ID_SIZE;

/// Compact unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(pub [u8; NODE_ID_SIZE]);

impl LinkId {
    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        let mut raw = [0u8; NODE_ID_SIZE];
        OsRng.fill_bytes(&mut raw);
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; NODE_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", u128::from_be_bytes(self.0))
    }
}

/// This process's half of every handshake.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub id: LinkId,
    pub description: String,
}

impl NodeIdentity {
    /// Fresh identity with a random id.
    pub fn generate(description: impl Into<String>) -> Self {
        Self {
            id: LinkId::random(),
            description: description.into(),
        }
    }
}

/// Logical identity of a remote peer plus the handle needed to send to it.
///
/// Cheap to clone; every component holds its own copies and the registry is
/// the authoritative owner. Two links are equal iff their ids are equal.
#[derive(Debug, Clone)]
pub struct Link {
    pub id: LinkId,
    pub description: String,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Link {
    pub fn new(
        id: LinkId,
        description: impl Into<String>,
        tx: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            tx,
        }
    }

    /// Submit raw envelope bytes for transmission.
    ///
    /// Fire-and-forget: safe from any thread, never blocks, and silently
    /// drops the bytes if the session behind this link has already closed.
    pub fn send_raw(&self, bytes: Vec<u8>) {
        let _ = self.tx.send(bytes);
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Link {}

impl Hash for Link {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.description, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(id: LinkId, description: &str) -> Link {
        let (tx, _rx) = mpsc::unbounded_channel();
        Link::new(id, description, tx)
    }

    #[test]
    fn equality_is_by_id_only() {
        let id = LinkId::random();
        let a = link(id, "gateway");
        let b = link(id, "realm");
        assert_eq!(a, b);

        let c = link(LinkId::random(), "gateway");
        assert_ne!(a, c);
    }

    #[test]
    fn send_after_session_close_is_a_noop() {
        let (tx, rx) = mpsc::unbounded_channel();
        let l = Link::new(LinkId::random(), "peer", tx);
        drop(rx);
        l.send_raw(vec![1, 2, 3]);
    }

    #[test]
    fn display_includes_description_and_id() {
        let id = LinkId([0xAB; 16]);
        let l = link(id, "gateway");
        let shown = l.to_string();
        assert!(shown.starts_with("gateway:"));
        assert!(shown.ends_with(&id.to_string()));
    }
}
