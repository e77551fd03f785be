//! # Board Core
//!
//! State shared by every board variant: the fragment layout, the recipient
//! set, and the interaction callback.
//!
//! ## Recipient Invariant
//!
//! A client is in the recipient set iff the sink was last asked to spawn
//! (not destroy) this board for that client. Set mutation and emission happen
//! under the same lock, so the scheduler thread and host event contexts can
//! race on one board without the set and the client drifting apart. Clients
//! marked in the registry's [`Departures`] are refused under that same lock.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use placard_shared::{ClientId, FragmentId};

use super::departures::Departures;
use super::fragments::FragmentLayout;
use super::InteractHandler;
use crate::host::FragmentSink;

#[derive(Debug, Default)]
struct Recipients {
    clients: HashSet<ClientId>,
    /// Set once the board left the registry. No spawn is accepted afterwards.
    retired: bool,
}

/// Layout, recipients and callback of one board.
pub struct BoardCore {
    layout: FragmentLayout,
    /// Fragment ids sorted for lookup. The layout keeps grid order.
    lookup: Vec<FragmentId>,
    sink: Arc<dyn FragmentSink>,
    recipients: Mutex<Recipients>,
    departures: OnceLock<Arc<Departures>>,
    handler: RwLock<Option<InteractHandler>>,
}

impl BoardCore {
    /// Creates the core of a board with no recipients.
    #[must_use]
    pub fn new(layout: FragmentLayout, sink: Arc<dyn FragmentSink>) -> Self {
        let mut lookup = layout.fragments.clone();
        lookup.sort_unstable();
        Self {
            layout,
            lookup,
            sink,
            recipients: Mutex::new(Recipients::default()),
            departures: OnceLock::new(),
            handler: RwLock::new(None),
        }
    }

    /// Binds the board to a registry's departed clients. The first binding
    /// wins; later calls are ignored.
    pub fn track_departures(&self, departures: Arc<Departures>) {
        let _ = self.departures.set(departures);
    }

    /// Immutable layout.
    #[must_use]
    pub fn layout(&self) -> &FragmentLayout {
        &self.layout
    }

    /// True when `id` is one of this board's fragments, in any grid order.
    #[must_use]
    pub fn owns(&self, id: FragmentId) -> bool {
        self.lookup.binary_search(&id).is_ok()
    }

    /// Copy of the current recipient set.
    #[must_use]
    pub fn recipients(&self) -> Vec<ClientId> {
        self.recipients.lock().clients.iter().copied().collect()
    }

    /// True when `client` currently has this board materialized.
    #[must_use]
    pub fn is_recipient(&self, client: ClientId) -> bool {
        self.recipients.lock().clients.contains(&client)
    }

    /// Number of recipients.
    #[must_use]
    pub fn recipient_count(&self) -> usize {
        self.recipients.lock().clients.len()
    }

    /// True once the board was unregistered.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.recipients.lock().retired
    }

    /// Adds `client` and emits the spawn. No-op for existing recipients,
    /// departed clients and retired boards. Returns whether anything was sent.
    pub fn spawn(&self, client: ClientId) -> bool {
        let mut recipients = self.recipients.lock();
        if recipients.retired || self.has_departed(client) {
            return false;
        }
        if !recipients.clients.insert(client) {
            return false;
        }
        self.sink.spawn_fragments(client, &self.layout);
        tracing::trace!(board = %self.layout.board, %client, "spawned");
        true
    }

    /// Removes `client` and emits the destroy. No-op for non-recipients.
    pub fn destroy(&self, client: ClientId) -> bool {
        let mut recipients = self.recipients.lock();
        if !recipients.clients.remove(&client) {
            return false;
        }
        self.sink.destroy_fragments(client, &self.layout);
        tracing::trace!(board = %self.layout.board, %client, "destroyed");
        true
    }

    /// Drops `client` from the recipients without emitting anything. For a
    /// connection that no longer exists. Returns whether it was a recipient.
    pub fn forget(&self, client: ClientId) -> bool {
        self.recipients.lock().clients.remove(&client)
    }

    fn has_departed(&self, client: ClientId) -> bool {
        self.departures
            .get()
            .is_some_and(|departures| departures.contains(client))
    }

    /// Resends the board to `client` without touching membership.
    /// No-op for non-recipients.
    pub fn update(&self, client: ClientId) -> bool {
        let recipients = self.recipients.lock();
        if !recipients.clients.contains(&client) {
            return false;
        }
        self.sink.update_fragments(client, &self.layout);
        true
    }

    /// Destroys the board for every recipient. Returns how many were removed.
    pub fn broadcast_destroy(&self) -> usize {
        let mut recipients = self.recipients.lock();
        self.destroy_all(&mut recipients)
    }

    /// Marks the board retired and destroys it for every recipient.
    pub fn retire(&self) -> usize {
        let mut recipients = self.recipients.lock();
        recipients.retired = true;
        self.destroy_all(&mut recipients)
    }

    fn destroy_all(&self, recipients: &mut Recipients) -> usize {
        let count = recipients.clients.len();
        for client in recipients.clients.drain() {
            self.sink.destroy_fragments(client, &self.layout);
        }
        count
    }

    /// Current interaction callback.
    #[must_use]
    pub fn interact_handler(&self) -> Option<InteractHandler> {
        self.handler.read().clone()
    }

    /// Replaces the interaction callback.
    pub fn set_interact_handler(&self, handler: Option<InteractHandler>) {
        *self.handler.write() = handler;
    }
}

impl std::fmt::Debug for BoardCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardCore")
            .field("layout", &self.layout)
            .field("recipients", &self.recipient_count())
            .field("has_handler", &self.handler.read().is_some())
            .finish_non_exhaustive()
    }
}
