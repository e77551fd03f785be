//! # Simulated Host
//!
//! In-memory host runtime for tests, benchmarks and the simulation binary.
//!
//! ## Pieces
//!
//! - [`RecordingSink`]: records every emission and tracks what each client
//!   would have on screen
//! - [`SimulatedConnection`]: inbound pipeline with named taps
//! - [`SimulatedHost`]: sessions, connections and prioritized listeners
//!
//! Events fire synchronously on the calling thread, listeners in priority
//! order, the way a single-threaded host event loop would.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use placard_shared::{BoardId, ClientId, LifecycleEvent, Vec3, WorldId};

use crate::board::FragmentLayout;
use crate::host::{
    ClientConnection, ClientSession, FragmentSink, Host, InboundTap, LifecycleListener, ListenerId,
    ListenerPriority,
};

/// One emission seen by a [`RecordingSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkCall {
    /// `spawn_fragments`
    Spawn {
        /// Target client
        client: ClientId,
        /// Board emitted
        board: BoardId,
    },
    /// `update_fragments`
    Update {
        /// Target client
        client: ClientId,
        /// Board emitted
        board: BoardId,
    },
    /// `destroy_fragments`
    Destroy {
        /// Target client
        client: ClientId,
        /// Board emitted
        board: BoardId,
    },
}

#[derive(Debug, Default)]
struct SinkState {
    calls: Vec<SinkCall>,
    visible: HashMap<ClientId, HashSet<BoardId>>,
    /// Clients whose connection closed and has not reopened.
    closed: HashSet<ClientId>,
    spawns: u64,
    updates: u64,
    destroys: u64,
    /// Spawn of a visible board, destroy or update of an invisible one, or
    /// anything sent to a closed connection.
    violations: u64,
}

/// Fragment sink that models the client side.
#[derive(Debug)]
pub struct RecordingSink {
    state: Mutex<SinkState>,
    keep_log: bool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    /// Creates a sink that keeps the full call log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SinkState::default()),
            keep_log: true,
        }
    }

    /// Creates a sink that only counts. For long runs.
    #[must_use]
    pub fn counting() -> Self {
        Self {
            state: Mutex::new(SinkState::default()),
            keep_log: false,
        }
    }

    /// Every call, in order. Empty for counting sinks.
    #[must_use]
    pub fn calls(&self) -> Vec<SinkCall> {
        self.state.lock().calls.clone()
    }

    /// Boards `client` currently has on screen.
    #[must_use]
    pub fn visible_boards(&self, client: ClientId) -> HashSet<BoardId> {
        self.state
            .lock()
            .visible
            .get(&client)
            .cloned()
            .unwrap_or_default()
    }

    /// Spawns emitted.
    #[must_use]
    pub fn spawn_count(&self) -> u64 {
        self.state.lock().spawns
    }

    /// Updates emitted.
    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.state.lock().updates
    }

    /// Destroys emitted.
    #[must_use]
    pub fn destroy_count(&self) -> u64 {
        self.state.lock().destroys
    }

    /// Emissions inconsistent with what the client has on screen.
    #[must_use]
    pub fn violations(&self) -> u64 {
        self.state.lock().violations
    }

    /// A new connection for `client`. Emissions reach it again.
    pub fn open_connection(&self, client: ClientId) {
        self.state.lock().closed.remove(&client);
    }

    /// `client`'s connection is gone, and with it everything on its screen.
    pub fn close_connection(&self, client: ClientId) {
        let mut state = self.state.lock();
        state.visible.remove(&client);
        state.closed.insert(client);
    }

    fn record(&self, call: SinkCall) {
        let mut state = self.state.lock();
        let (SinkCall::Spawn { client, .. }
        | SinkCall::Update { client, .. }
        | SinkCall::Destroy { client, .. }) = call;
        if state.closed.contains(&client) {
            match call {
                SinkCall::Spawn { .. } => state.spawns += 1,
                SinkCall::Update { .. } => state.updates += 1,
                SinkCall::Destroy { .. } => state.destroys += 1,
            }
            state.violations += 1;
            if self.keep_log {
                state.calls.push(call);
            }
            return;
        }
        match call {
            SinkCall::Spawn { client, board } => {
                state.spawns += 1;
                if !state.visible.entry(client).or_default().insert(board) {
                    state.violations += 1;
                }
            }
            SinkCall::Update { client, board } => {
                state.updates += 1;
                let visible = state.visible.get(&client).is_some_and(|set| set.contains(&board));
                if !visible {
                    state.violations += 1;
                }
            }
            SinkCall::Destroy { client, board } => {
                state.destroys += 1;
                let removed = state
                    .visible
                    .get_mut(&client)
                    .is_some_and(|set| set.remove(&board));
                if !removed {
                    state.violations += 1;
                }
            }
        }
        if self.keep_log {
            state.calls.push(call);
        }
    }
}

impl FragmentSink for RecordingSink {
    fn spawn_fragments(&self, client: ClientId, layout: &FragmentLayout) {
        self.record(SinkCall::Spawn {
            client,
            board: layout.board,
        });
    }

    fn update_fragments(&self, client: ClientId, layout: &FragmentLayout) {
        self.record(SinkCall::Update {
            client,
            board: layout.board,
        });
    }

    fn destroy_fragments(&self, client: ClientId, layout: &FragmentLayout) {
        self.record(SinkCall::Destroy {
            client,
            board: layout.board,
        });
    }
}

/// Inbound pipeline of one simulated client.
#[derive(Default)]
pub struct SimulatedConnection {
    taps: RwLock<Vec<(&'static str, Arc<dyn InboundTap>)>>,
    delivered: AtomicU64,
}

impl SimulatedConnection {
    /// Creates a pipeline with no taps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a frame through every tap. The frame always reaches the
    /// (simulated) host afterwards.
    pub fn deliver(&self, frame: &[u8]) {
        let taps: Vec<_> = self.taps.read().iter().map(|(_, tap)| Arc::clone(tap)).collect();
        for tap in taps {
            tap.on_inbound(frame);
        }
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames that reached the host.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Number of installed taps.
    #[must_use]
    pub fn tap_count(&self) -> usize {
        self.taps.read().len()
    }

    /// True when a tap named `name` is installed.
    #[must_use]
    pub fn has_tap(&self, name: &str) -> bool {
        self.taps.read().iter().any(|(tap, _)| *tap == name)
    }
}

impl ClientConnection for SimulatedConnection {
    fn add_inbound_tap(&self, name: &'static str, tap: Arc<dyn InboundTap>) {
        let mut taps = self.taps.write();
        if let Some(slot) = taps.iter_mut().find(|(existing, _)| *existing == name) {
            slot.1 = tap;
        } else {
            taps.push((name, tap));
        }
    }

    fn remove_inbound_tap(&self, name: &str) -> bool {
        let mut taps = self.taps.write();
        let before = taps.len();
        taps.retain(|(existing, _)| *existing != name);
        taps.len() != before
    }
}

impl std::fmt::Debug for SimulatedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedConnection")
            .field("taps", &self.tap_count())
            .field("delivered", &self.delivered())
            .finish()
    }
}

struct Subscription {
    id: ListenerId,
    priority: ListenerPriority,
    listener: Arc<dyn LifecycleListener>,
}

/// In-memory host.
pub struct SimulatedHost {
    sessions: RwLock<HashMap<ClientId, ClientSession>>,
    connections: RwLock<HashMap<ClientId, Arc<SimulatedConnection>>>,
    listeners: RwLock<Vec<Subscription>>,
    next_listener: AtomicU64,
    sink: Arc<RecordingSink>,
}

impl SimulatedHost {
    /// Creates a host whose sink keeps a full call log.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_sink(Arc::new(RecordingSink::new()))
    }

    /// Creates a host emitting into `sink`.
    #[must_use]
    pub fn with_sink(sink: Arc<RecordingSink>) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            sink,
        })
    }

    /// The sink, with its inspection methods.
    #[must_use]
    pub fn recording_sink(&self) -> Arc<RecordingSink> {
        Arc::clone(&self.sink)
    }

    /// Fires `event` at every listener, highest priority first.
    pub fn emit(&self, event: &LifecycleEvent) {
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|sub| Arc::clone(&sub.listener))
            .collect();
        for listener in listeners {
            listener.on_event(event);
        }
    }

    /// Connects (or reconnects) a client and fires `Connected`.
    pub fn connect(&self, client: ClientId, world: WorldId, position: Vec3) {
        self.sessions.write().insert(
            client,
            ClientSession {
                id: client,
                world,
                position,
                connected: true,
            },
        );
        self.connections
            .write()
            .insert(client, Arc::new(SimulatedConnection::new()));
        self.sink.open_connection(client);
        self.emit(&LifecycleEvent::Connected { client });
    }

    /// Moves a client within its world. Fires nothing.
    pub fn move_to(&self, client: ClientId, position: Vec3) {
        if let Some(session) = self.sessions.write().get_mut(&client) {
            session.position = position;
        }
    }

    /// Teleports a client: `TeleportBegin`, then `WorldChanged` when the world
    /// differs.
    pub fn teleport(&self, client: ClientId, world: WorldId, destination: Vec3) {
        let Some(from) = self.session(client).map(|session| session.world) else {
            return;
        };
        self.emit(&LifecycleEvent::TeleportBegin {
            client,
            world,
            destination,
        });
        self.place(client, world, destination);
        if from != world {
            self.emit(&LifecycleEvent::WorldChanged {
                client,
                from,
                to: world,
            });
        }
    }

    /// Respawns a client at a location: `Respawned`, then `WorldChanged` when
    /// the world differs.
    pub fn respawn(&self, client: ClientId, world: WorldId, position: Vec3) {
        let Some(from) = self.session(client).map(|session| session.world) else {
            return;
        };
        self.place(client, world, position);
        self.emit(&LifecycleEvent::Respawned { client });
        if from != world {
            self.emit(&LifecycleEvent::WorldChanged {
                client,
                from,
                to: world,
            });
        }
    }

    /// Disconnects a client. Listeners still see the session, as on a real
    /// host's quit event.
    pub fn disconnect(&self, client: ClientId) {
        self.leave(client, LifecycleEvent::Disconnected { client });
    }

    /// Kicks a client.
    pub fn kick(&self, client: ClientId, reason: &str) {
        self.leave(
            client,
            LifecycleEvent::Kicked {
                client,
                reason: reason.to_owned(),
            },
        );
    }

    /// Flips the connection-alive flag without firing anything.
    pub fn set_connected(&self, client: ClientId, connected: bool) {
        if let Some(session) = self.sessions.write().get_mut(&client) {
            session.connected = connected;
        }
    }

    /// Delivers an inbound frame on `client`'s connection. Returns `false`
    /// when the client is not connected.
    pub fn send_frame(&self, client: ClientId, frame: &[u8]) -> bool {
        let Some(connection) = self.connection_of(client) else {
            return false;
        };
        connection.deliver(frame);
        true
    }

    /// Concrete connection of `client`.
    #[must_use]
    pub fn connection_of(&self, client: ClientId) -> Option<Arc<SimulatedConnection>> {
        self.connections.read().get(&client).cloned()
    }

    /// Current session of `client`.
    #[must_use]
    pub fn session(&self, client: ClientId) -> Option<ClientSession> {
        self.sessions.read().get(&client).copied()
    }

    /// Number of subscribed listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn place(&self, client: ClientId, world: WorldId, position: Vec3) {
        if let Some(session) = self.sessions.write().get_mut(&client) {
            session.world = world;
            session.position = position;
        }
    }

    fn leave(&self, client: ClientId, event: LifecycleEvent) {
        if self.session(client).is_none() {
            return;
        }
        self.emit(&event);
        self.sessions.write().remove(&client);
        self.connections.write().remove(&client);
        self.sink.close_connection(client);
    }
}

impl Host for SimulatedHost {
    fn online_clients(&self) -> Vec<ClientSession> {
        self.sessions.read().values().copied().collect()
    }

    fn connection(&self, client: ClientId) -> Option<Arc<dyn ClientConnection>> {
        self.connection_of(client)
            .map(|connection| connection as Arc<dyn ClientConnection>)
    }

    fn fragment_sink(&self) -> Arc<dyn FragmentSink> {
        self.sink.clone()
    }

    fn subscribe(
        &self,
        priority: ListenerPriority,
        listener: Arc<dyn LifecycleListener>,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.write();
        listeners.push(Subscription {
            id,
            priority,
            listener,
        });
        // Stable: equal priorities keep subscription order.
        listeners.sort_by_key(|sub| sub.priority);
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.write().retain(|sub| sub.id != id);
    }
}

impl std::fmt::Debug for SimulatedHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedHost")
            .field("sessions", &self.sessions.read().len())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        tag: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl LifecycleListener for Probe {
        fn on_event(&self, _event: &LifecycleEvent) {
            self.seen.lock().push(self.tag);
        }
    }

    #[test]
    fn test_listeners_run_in_priority_order() {
        let host = SimulatedHost::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let probe = |tag| Arc::new(Probe { tag, seen: Arc::clone(&seen) });

        host.subscribe(ListenerPriority::Lowest, probe("lowest"));
        host.subscribe(ListenerPriority::Highest, probe("highest"));
        let normal = host.subscribe(ListenerPriority::Normal, probe("normal"));

        host.connect(ClientId(1), WorldId(0), Vec3::ZERO);
        assert_eq!(*seen.lock(), vec!["highest", "normal", "lowest"]);

        host.unsubscribe(normal);
        seen.lock().clear();
        host.disconnect(ClientId(1));
        assert_eq!(*seen.lock(), vec!["highest", "lowest"]);
        assert!(host.session(ClientId(1)).is_none());
    }

    #[test]
    fn test_teleport_fires_world_change_only_across_worlds() {
        use placard_shared::LifecycleEventKind as K;

        struct Kinds(Arc<Mutex<Vec<K>>>);
        impl LifecycleListener for Kinds {
            fn on_event(&self, event: &LifecycleEvent) {
                self.0.lock().push(event.kind());
            }
        }

        let host = SimulatedHost::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        host.subscribe(ListenerPriority::Normal, Arc::new(Kinds(Arc::clone(&seen))));

        host.connect(ClientId(1), WorldId(0), Vec3::ZERO);
        host.teleport(ClientId(1), WorldId(0), Vec3::new(5.0, 0.0, 0.0));
        host.teleport(ClientId(1), WorldId(1), Vec3::ZERO);

        assert_eq!(
            *seen.lock(),
            vec![K::Connected, K::TeleportBegin, K::TeleportBegin, K::WorldChanged]
        );
        assert_eq!(host.session(ClientId(1)).unwrap().world, WorldId(1));
    }

    #[test]
    fn test_recording_sink_tracks_visibility() {
        let sink = RecordingSink::new();
        let layout = FragmentLayout {
            board: BoardId(1),
            location: placard_shared::WorldLocation::new(WorldId(0), Vec3::ZERO),
            facing: placard_shared::BlockFace::North,
            size: placard_shared::GridSize::new(1, 1),
            fragments: Vec::new(),
        };
        sink.spawn_fragments(ClientId(1), &layout);
        assert!(sink.visible_boards(ClientId(1)).contains(&BoardId(1)));
        sink.spawn_fragments(ClientId(1), &layout);
        sink.destroy_fragments(ClientId(1), &layout);
        sink.update_fragments(ClientId(1), &layout);
        assert_eq!(sink.violations(), 2);
        assert_eq!(sink.calls().len(), 4);

        // A closed connection shows nothing and accepts nothing.
        sink.spawn_fragments(ClientId(1), &layout);
        sink.close_connection(ClientId(1));
        assert!(sink.visible_boards(ClientId(1)).is_empty());
        sink.spawn_fragments(ClientId(1), &layout);
        assert_eq!(sink.violations(), 3);
        sink.open_connection(ClientId(1));
        sink.spawn_fragments(ClientId(1), &layout);
        assert_eq!(sink.violations(), 3);
        assert_eq!(sink.visible_boards(ClientId(1)).len(), 1);

        let counting = RecordingSink::counting();
        counting.spawn_fragments(ClientId(1), &layout);
        assert!(counting.calls().is_empty());
        assert_eq!(counting.spawn_count(), 1);
    }

    #[test]
    fn test_frames_pass_through_taps() {
        struct Count(AtomicU64);
        impl InboundTap for Count {
            fn on_inbound(&self, _frame: &[u8]) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let host = SimulatedHost::new();
        host.connect(ClientId(1), WorldId(0), Vec3::ZERO);
        let tap = Arc::new(Count(AtomicU64::new(0)));
        let connection = host.connection(ClientId(1)).unwrap();
        connection.add_inbound_tap("count", tap.clone());
        connection.add_inbound_tap("count", tap.clone());

        assert!(host.send_frame(ClientId(1), &[1, 2, 3]));
        assert!(!host.send_frame(ClientId(2), &[1]));
        assert_eq!(tap.0.load(Ordering::Relaxed), 1);
        assert_eq!(host.connection_of(ClientId(1)).unwrap().delivered(), 1);

        assert!(connection.remove_inbound_tap("count"));
        assert!(!connection.remove_inbound_tap("count"));
    }
}
