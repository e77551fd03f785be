//! Connection lifecycle events delivered by the host.
//!
//! The host raises one of these for every client state transition the engine
//! has to react to. Each event carries at least the client; where the engine
//! needs the post-event state (new world) the event carries it too.

use crate::ids::{ClientId, WorldId};
use crate::math::Vec3;

/// Event kind discriminator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleEventKind {
    /// Client started teleporting
    TeleportBegin,
    /// Client arrived in a different world
    WorldChanged,
    /// Client left
    Disconnected,
    /// Client was removed for cause
    Kicked,
    /// Client respawned
    Respawned,
    /// Client (re)connected
    Connected,
}

/// Lifecycle events the engine reconciles against.
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleEvent {
    /// Client begins teleporting to `destination` (same or other world).
    TeleportBegin {
        /// Client being teleported
        client: ClientId,
        /// World the client is heading to
        world: WorldId,
        /// Position the client is heading to
        destination: Vec3,
    },

    /// Client's world changed.
    WorldChanged {
        /// Client that moved
        client: ClientId,
        /// World the client left
        from: WorldId,
        /// World the client is now in
        to: WorldId,
    },

    /// Client disconnected.
    Disconnected {
        /// Client that left
        client: ClientId,
    },

    /// Client was kicked.
    Kicked {
        /// Client that was removed
        client: ClientId,
        /// Reason given by the host
        reason: String,
    },

    /// Client respawned.
    Respawned {
        /// Client that respawned
        client: ClientId,
    },

    /// Client connected (or reconnected).
    Connected {
        /// Client that joined
        client: ClientId,
    },
}

impl LifecycleEvent {
    /// Client the event is about.
    #[must_use]
    pub fn client(&self) -> ClientId {
        match self {
            Self::TeleportBegin { client, .. }
            | Self::WorldChanged { client, .. }
            | Self::Disconnected { client }
            | Self::Kicked { client, .. }
            | Self::Respawned { client }
            | Self::Connected { client } => *client,
        }
    }

    /// Discriminator of this event.
    #[must_use]
    pub fn kind(&self) -> LifecycleEventKind {
        match self {
            Self::TeleportBegin { .. } => LifecycleEventKind::TeleportBegin,
            Self::WorldChanged { .. } => LifecycleEventKind::WorldChanged,
            Self::Disconnected { .. } => LifecycleEventKind::Disconnected,
            Self::Kicked { .. } => LifecycleEventKind::Kicked,
            Self::Respawned { .. } => LifecycleEventKind::Respawned,
            Self::Connected { .. } => LifecycleEventKind::Connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_and_kind() {
        let event = LifecycleEvent::Kicked {
            client: ClientId(4),
            reason: "flying".to_owned(),
        };
        assert_eq!(event.client(), ClientId(4));
        assert_eq!(event.kind(), LifecycleEventKind::Kicked);

        let event = LifecycleEvent::WorldChanged {
            client: ClientId(9),
            from: WorldId(0),
            to: WorldId(1),
        };
        assert_eq!(event.client(), ClientId(9));
        assert_eq!(event.kind(), LifecycleEventKind::WorldChanged);
    }
}
