//! # Interaction Interceptor
//!
//! Per-connection inbound tap. Watches for the interact-entity frame, maps the
//! target entity id to the boards that own it, and fires their callbacks.
//!
//! ```text
//! inbound frame ──► host decoder ──► ... ──► host logic
//!                        │
//!                        └──► tap (read-only)
//!                               decode? ──no──► ignore
//!                                 │yes
//!                               registry.boards_owning(id)
//!                                 └──► handler(action, client)
//! ```
//!
//! The tap never alters or swallows a frame. A panicking callback unwinds
//! through the tap into the host's pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use placard_shared::{ClientId, InteractDecoder, InteractPacket};

use crate::host::{ClientConnection, InboundTap};
use crate::registry::BoardRegistry;

/// Name under which the tap is installed on every connection.
pub const TAP_NAME: &str = "placard_interact";

/// Routes interact frames of one client to the owning boards.
pub struct InteractionInterceptor {
    client: ClientId,
    registry: Arc<BoardRegistry>,
    /// `None` when the protocol version is unsupported. The tap is then inert.
    decoder: Option<InteractDecoder>,
}

impl InteractionInterceptor {
    /// Creates a tap for `client`.
    #[must_use]
    pub fn new(
        client: ClientId,
        registry: Arc<BoardRegistry>,
        decoder: Option<InteractDecoder>,
    ) -> Self {
        Self {
            client,
            registry,
            decoder,
        }
    }

    /// Client this tap belongs to.
    #[must_use]
    pub const fn client(&self) -> ClientId {
        self.client
    }

    /// True when no decoder is available.
    #[must_use]
    pub const fn is_inert(&self) -> bool {
        self.decoder.is_none()
    }

    /// Fires the callback of every board owning the packet's target.
    /// Returns how many callbacks ran.
    pub fn dispatch(&self, packet: &InteractPacket) -> usize {
        let mut fired = 0;
        for board in self.registry.boards_owning(packet.entity_id) {
            if let Some(handler) = board.interact_handler() {
                tracing::trace!(
                    board = %board.id(),
                    client = %self.client,
                    fragment = %packet.entity_id,
                    action = ?packet.action,
                    "interaction"
                );
                handler(packet.action, self.client);
                fired += 1;
            }
        }
        fired
    }
}

impl InboundTap for InteractionInterceptor {
    fn on_inbound(&self, frame: &[u8]) {
        let Some(decoder) = &self.decoder else {
            return;
        };
        match decoder.decode(frame) {
            Ok(Some(packet)) => {
                self.dispatch(&packet);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::debug!(client = %self.client, error = %err, "malformed interact frame");
            }
        }
    }
}

impl std::fmt::Debug for InteractionInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionInterceptor")
            .field("client", &self.client)
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}

/// Connections the engine installed a tap on, so they can be detached later.
#[derive(Default)]
pub struct InterceptorHooks {
    installed: Mutex<HashMap<ClientId, Arc<dyn ClientConnection>>>,
}

impl InterceptorHooks {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `tap` on `connection`. A reconnecting client replaces its
    /// previous entry, so at most one tap per client is tracked.
    pub fn install(
        &self,
        client: ClientId,
        connection: Arc<dyn ClientConnection>,
        tap: Arc<dyn InboundTap>,
    ) {
        connection.add_inbound_tap(TAP_NAME, tap);
        self.installed.lock().insert(client, connection);
        tracing::info!(%client, "interact tap installed");
    }

    /// Stops tracking `client`. The connection is gone, nothing to remove.
    pub fn forget(&self, client: ClientId) -> bool {
        self.installed.lock().remove(&client).is_some()
    }

    /// True when a tap is tracked for `client`.
    #[must_use]
    pub fn is_installed(&self, client: ClientId) -> bool {
        self.installed.lock().contains_key(&client)
    }

    /// Number of tracked taps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.installed.lock().len()
    }

    /// True when no tap is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.installed.lock().is_empty()
    }

    /// Removes every tracked tap from its connection. Returns how many were
    /// actually removed.
    pub fn detach_all(&self) -> usize {
        let drained: Vec<_> = self.installed.lock().drain().collect();
        drained
            .into_iter()
            .filter(|(_, connection)| connection.remove_inbound_tap(TAP_NAME))
            .count()
    }
}

impl std::fmt::Debug for InterceptorHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorHooks")
            .field("installed", &self.len())
            .finish()
    }
}
