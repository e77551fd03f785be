//! Clients whose connection ended and has not been replaced yet.

use std::collections::HashSet;

use parking_lot::RwLock;
use placard_shared::ClientId;

/// Departed clients, shared by every board of a registry.
///
/// A board checks this set under its recipient lock before spawning. A
/// disconnect marks the client first and destroys second, so a spawn decided
/// from a session read before the disconnect either lands before the destroy
/// or is refused.
#[derive(Debug, Default)]
pub struct Departures {
    clients: RwLock<HashSet<ClientId>>,
}

impl Departures {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `client` as gone. Returns `false` if it already was.
    pub fn mark(&self, client: ClientId) -> bool {
        self.clients.write().insert(client)
    }

    /// Clears the mark of a returning client. Returns whether it was set.
    pub fn clear(&self, client: ClientId) -> bool {
        self.clients.write().remove(&client)
    }

    /// True while `client` is marked.
    #[must_use]
    pub fn contains(&self, client: ClientId) -> bool {
        self.clients.read().contains(&client)
    }

    /// Number of marked clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// True when nobody is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}
