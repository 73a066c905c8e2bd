//! Authoritative set of live links.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::RegistryError;
use crate::link::{Link, LinkId};

/// Thread-safe registry of currently active [`Link`]s, keyed by id.
///
/// All call sites go through these methods; the mutex serializes mutations
/// so [`for_each`](Self::for_each) always observes a consistent snapshot.
#[derive(Debug, Default)]
pub struct LinkRegistry {
    links: Mutex<HashMap<LinkId, Link>>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a link. Fails if a link with the same id already exists and
    /// leaves the registry unchanged.
    pub fn add(&self, link: Link) -> Result<(), RegistryError> {
        let mut links = self.links.lock().unwrap_or_else(|e| e.into_inner());
        if links.contains_key(&link.id) {
            return Err(RegistryError::DuplicateLink(link.id));
        }
        links.insert(link.id, link);
        Ok(())
    }

    /// Remove a link by id. Idempotent: removing an absent link is a no-op,
    /// since the peer may already have been torn down.
    pub fn remove(&self, id: &LinkId) {
        let mut links = self.links.lock().unwrap_or_else(|e| e.into_inner());
        links.remove(id);
    }

    /// Look up a link by id.
    pub fn get(&self, id: &LinkId) -> Option<Link> {
        let links = self.links.lock().unwrap_or_else(|e| e.into_inner());
        links.get(id).cloned()
    }

    /// Invoke `f` once per registered link under the registry lock.
    ///
    /// `f` must not call back into the registry.
    pub fn for_each(&self, mut f: impl FnMut(&Link)) {
        let links = self.links.lock().unwrap_or_else(|e| e.into_inner());
        for link in links.values() {
            f(link);
        }
    }

    pub fn len(&self) -> usize {
        let links = self.links.lock().unwrap_or_else(|e| e.into_inner());
        links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
