//! # Host Contracts
//!
//! Traits the host runtime implements so the engine can run inside it.
//!
//! ```text
//! Engine defines:              Host implements:
//! ┌────────────────────────┐   ┌────────────────────────┐
//! │ trait Host             │ ← │ sessions, events       │
//! │ trait FragmentSink     │ ← │ entity packets         │
//! │ trait ClientConnection │ ← │ inbound pipeline       │
//! └────────────────────────┘   └────────────────────────┘
//! ```
//!
//! The engine never owns client state. It reads sessions, receives events,
//! taps inbound frames, and asks the sink to emit entity packets.

use std::sync::Arc;

use placard_shared::{ClientId, LifecycleEvent, Vec3, WorldId, WorldLocation};

use crate::board::FragmentLayout;

/// Snapshot of one client session as the host sees it right now.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClientSession {
    /// Client identifier.
    pub id: ClientId,
    /// Current world.
    pub world: WorldId,
    /// Current position.
    pub position: Vec3,
    /// Whether the connection is still alive.
    pub connected: bool,
}

impl ClientSession {
    /// Current location as a [`WorldLocation`].
    #[must_use]
    pub const fn location(&self) -> WorldLocation {
        WorldLocation::new(self.world, self.position)
    }
}

/// Emits the entity packets that materialize a board for one client.
///
/// Calls are fire-and-forget. Implementations are invoked while the board
/// holds its recipient lock and must not call back into that board.
pub trait FragmentSink: Send + Sync {
    /// Create every fragment of `layout` on `client`.
    fn spawn_fragments(&self, client: ClientId, layout: &FragmentLayout);

    /// Resend the current appearance of `layout` to `client`.
    fn update_fragments(&self, client: ClientId, layout: &FragmentLayout);

    /// Remove every fragment of `layout` from `client`.
    fn destroy_fragments(&self, client: ClientId, layout: &FragmentLayout);
}

/// Read-only observer of inbound frames on one connection.
///
/// A tap sees each frame by shared reference. It cannot modify or drop it;
/// the host forwards the frame to its own decoder regardless of the tap.
pub trait InboundTap: Send + Sync {
    /// Called for every inbound frame, in arrival order.
    fn on_inbound(&self, frame: &[u8]);
}

/// Inbound pipeline of one client connection.
pub trait ClientConnection: Send + Sync {
    /// Adds a named tap after the frame decoder. Replaces a tap of the same name.
    fn add_inbound_tap(&self, name: &'static str, tap: Arc<dyn InboundTap>);

    /// Removes a named tap. Returns `false` when no such tap was installed.
    fn remove_inbound_tap(&self, name: &str) -> bool;
}

/// Receives lifecycle events from the host.
pub trait LifecycleListener: Send + Sync {
    /// Handles one event synchronously on the host's event context.
    fn on_event(&self, event: &LifecycleEvent);
}

/// Order in which the host dispatches listeners for one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerPriority {
    /// Dispatched first.
    Highest,
    /// Default slot.
    Normal,
    /// Dispatched after every other listener, sees the final post-event state.
    Lowest,
}

/// Handle returned by [`Host::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// The host runtime the engine is embedded in.
pub trait Host: Send + Sync {
    /// Every client currently online.
    fn online_clients(&self) -> Vec<ClientSession>;

    /// Inbound pipeline of `client`, if it is connected.
    fn connection(&self, client: ClientId) -> Option<Arc<dyn ClientConnection>>;

    /// Sink used by every board to emit entity packets.
    fn fragment_sink(&self) -> Arc<dyn FragmentSink>;

    /// Registers a lifecycle listener.
    fn subscribe(
        &self,
        priority: ListenerPriority,
        listener: Arc<dyn LifecycleListener>,
    ) -> ListenerId;

    /// Removes a listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: ListenerId);
}
