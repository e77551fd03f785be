//! # Engine Lifecycle
//!
//! Wires the registry, scheduler, reconciler and interceptor hooks to one
//! host, and tears them down again.
//!
//! ```text
//! start:  validate config → decoder → deferred worker → reconciler
//!         → subscribe(Lowest) → tap online clients → scheduler thread
//! stop:   cancel scheduler → detach reconciler → unsubscribe
//!         → stop deferred worker → retire every board → detach taps
//! ```
//!
//! ## Global Handle
//!
//! Hosts that want a single process-wide engine use [`init`], [`engine`] and
//! [`stop`]. Everything else takes an `Arc<Engine>` explicitly, and tests run
//! independent engines side by side through [`Engine::start`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use placard_shared::{BlockFace, BoardId, ClientId, GridSize, InteractDecoder, WorldLocation};

use crate::board::{Board, BoardCore, FragmentAllocator, FragmentLayout, PrivateBoard, PublicBoard};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::host::{Host, ListenerId, ListenerPriority};
use crate::interceptor::InterceptorHooks;
use crate::reconciler::{DeferredWorker, LifecycleReconciler};
use crate::registry::BoardRegistry;
use crate::scheduler::{PassStats, SchedulerHandle, SchedulerStats, VisibilityScheduler};

/// A running visibility and interaction engine bound to one host.
pub struct Engine {
    config: EngineConfig,
    host: Arc<dyn Host>,
    registry: Arc<BoardRegistry>,
    hooks: Arc<InterceptorHooks>,
    reconciler: Arc<LifecycleReconciler>,
    listener: ListenerId,
    allocator: FragmentAllocator,
    next_board: AtomicU64,
    visibility: VisibilityScheduler,
    scheduler: Mutex<Option<SchedulerHandle>>,
    deferred: Mutex<Option<DeferredWorker>>,
    stopped: AtomicBool,
}

impl Engine {
    /// Starts an engine on `host`.
    ///
    /// An unsupported `protocol_version` does not fail startup: it is logged
    /// once and interaction routing stays off for the engine's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] for a bad configuration and
    /// [`EngineError::ThreadSpawn`] when a background thread cannot start.
    pub fn start(host: Arc<dyn Host>, config: EngineConfig) -> EngineResult<Arc<Self>> {
        config.validate()?;

        let decoder = match InteractDecoder::for_version(config.protocol_version()) {
            Ok(decoder) => Some(decoder),
            Err(err) => {
                tracing::warn!(error = %err, "interaction routing disabled");
                None
            }
        };

        let registry = Arc::new(BoardRegistry::new());
        let hooks = Arc::new(InterceptorHooks::new());
        let mut deferred = DeferredWorker::spawn(Arc::clone(&registry))?;
        let reconciler = Arc::new(LifecycleReconciler::new(
            Arc::clone(&registry),
            &host,
            Arc::clone(&hooks),
            decoder,
            deferred.sender(),
            config.respawn_delay(),
        ));
        let listener = host.subscribe(ListenerPriority::Lowest, reconciler.clone());

        // Clients that joined before the engine existed never fired Connected.
        for session in host.online_clients() {
            if session.connected {
                reconciler.install_tap(session.id);
            }
        }

        let visibility = VisibilityScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&host),
            config.visibility_radius,
        );
        let background = VisibilityScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&host),
            config.visibility_radius,
        );
        let scheduler = match SchedulerHandle::spawn(
            background,
            config.scheduler_initial_delay(),
            config.scheduler_period(),
        ) {
            Ok(handle) => handle,
            Err(err) => {
                reconciler.detach();
                host.unsubscribe(listener);
                deferred.stop();
                hooks.detach_all();
                return Err(err);
            }
        };

        tracing::info!(
            radius = config.visibility_radius,
            period_ms = config.scheduler_period_ms,
            protocol = config.protocol_version,
            interactions = decoder.is_some(),
            "board engine started"
        );

        let base = config.fragment_id_base;
        Ok(Arc::new(Self {
            config,
            host,
            registry,
            hooks,
            reconciler,
            listener,
            allocator: FragmentAllocator::new(base),
            next_board: AtomicU64::new(1),
            visibility,
            scheduler: Mutex::new(Some(scheduler)),
            deferred: Mutex::new(Some(deferred)),
            stopped: AtomicBool::new(false),
        }))
    }

    /// Creates and registers a board any client may see.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidDimensions`] when `columns` or `rows` is zero,
    /// [`EngineError::FragmentIdsExhausted`] when the id space ran out,
    /// [`EngineError::AlreadyStopped`] after [`Engine::stop`].
    pub fn create_board(
        &self,
        location: WorldLocation,
        facing: BlockFace,
        columns: u32,
        rows: u32,
    ) -> EngineResult<Arc<PublicBoard>> {
        let core = self.build_core(location, facing, columns, rows)?;
        let board = Arc::new(PublicBoard::new(core));
        self.register(board.clone())?;
        Ok(board)
    }

    /// Creates and registers a board only `viewer` may see.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::create_board`].
    pub fn create_private_board(
        &self,
        location: WorldLocation,
        facing: BlockFace,
        columns: u32,
        rows: u32,
        viewer: ClientId,
    ) -> EngineResult<Arc<PrivateBoard>> {
        let core = self.build_core(location, facing, columns, rows)?;
        let board = Arc::new(PrivateBoard::new(core, viewer));
        self.register(board.clone())?;
        Ok(board)
    }

    fn build_core(
        &self,
        location: WorldLocation,
        facing: BlockFace,
        columns: u32,
        rows: u32,
    ) -> EngineResult<BoardCore> {
        if self.is_stopped() {
            return Err(EngineError::AlreadyStopped);
        }
        let size = GridSize::new(columns, rows);
        if size.is_empty() {
            return Err(EngineError::InvalidDimensions { columns, rows });
        }
        let layout = FragmentLayout {
            board: BoardId(self.next_board.fetch_add(1, Ordering::Relaxed)),
            location,
            facing,
            size,
            fragments: self.allocator.allocate(size.cells())?,
        };
        Ok(BoardCore::new(layout, self.host.fragment_sink()))
    }

    /// Adds a board built elsewhere. Returns `false` for a duplicate id.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyStopped`] after [`Engine::stop`]. A board that
    /// lost the race against a concurrent `stop` is retired before returning.
    pub fn register(&self, board: Arc<dyn Board>) -> EngineResult<bool> {
        if self.is_stopped() {
            board.core().retire();
            return Err(EngineError::AlreadyStopped);
        }
        let id = board.id();
        let added = self.registry.register(Arc::clone(&board));
        // `stop` raises the flag before draining: either the drain saw this
        // board or this check sees the flag.
        if self.is_stopped() {
            self.registry.unregister(board.as_ref());
            return Err(EngineError::AlreadyStopped);
        }
        if added {
            tracing::debug!(board = %id, "board registered");
        }
        Ok(added)
    }

    /// Destroys `board` for all its recipients and removes it. Idempotent.
    pub fn unregister(&self, board: &dyn Board) -> bool {
        let removed = self.registry.unregister(board);
        if removed {
            tracing::debug!(board = %board.id(), "board unregistered");
        }
        removed
    }

    /// Runs one visibility pass on the calling thread.
    pub fn run_visibility_pass(&self) -> PassStats {
        self.visibility.run_pass()
    }

    /// Board registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<BoardRegistry> {
        &self.registry
    }

    /// Host this engine is bound to.
    #[must_use]
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lifecycle listener subscribed to the host.
    #[must_use]
    pub fn reconciler(&self) -> &Arc<LifecycleReconciler> {
        &self.reconciler
    }

    /// Interact taps currently installed.
    #[must_use]
    pub fn hooks(&self) -> &Arc<InterceptorHooks> {
        &self.hooks
    }

    /// Background scheduler statistics, `None` once stopped.
    #[must_use]
    pub fn scheduler_stats(&self) -> Option<SchedulerStats> {
        self.scheduler.lock().as_ref().map(SchedulerHandle::stats)
    }

    /// True until [`Engine::stop`].
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.is_stopped()
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Shuts the engine down. Every board is destroyed for every client and
    /// removed, and nothing is emitted afterwards.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyStopped`] on the second call.
    pub fn stop(&self) -> EngineResult<()> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Err(EngineError::AlreadyStopped);
        }

        if let Some(mut scheduler) = self.scheduler.lock().take() {
            scheduler.cancel();
        }
        self.reconciler.detach();
        self.host.unsubscribe(self.listener);
        if let Some(mut deferred) = self.deferred.lock().take() {
            deferred.stop();
        }

        let boards = self.registry.drain();
        let taps = self.hooks.detach_all();
        tracing::info!(boards = boards.len(), taps, "board engine stopped");
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.is_stopped() {
            let _ = self.stop();
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("hooks", &self.hooks)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

static ENGINE: Mutex<Option<Arc<Engine>>> = parking_lot::const_mutex(None);

/// Starts the process-wide engine with the default configuration.
///
/// # Errors
///
/// [`EngineError::AlreadyInitialized`] when an engine is already running,
/// otherwise whatever [`Engine::start`] returns.
pub fn init(host: Arc<dyn Host>) -> EngineResult<Arc<Engine>> {
    init_with_config(host, EngineConfig::default())
}

/// Starts the process-wide engine.
///
/// # Errors
///
/// Same as [`init`].
pub fn init_with_config(host: Arc<dyn Host>, config: EngineConfig) -> EngineResult<Arc<Engine>> {
    let mut slot = ENGINE.lock();
    if slot.is_some() {
        return Err(EngineError::AlreadyInitialized);
    }
    let engine = Engine::start(host, config)?;
    *slot = Some(Arc::clone(&engine));
    Ok(engine)
}

/// The process-wide engine.
///
/// # Errors
///
/// [`EngineError::NotInitialized`] before [`init`] or after [`stop`].
pub fn engine() -> EngineResult<Arc<Engine>> {
    ENGINE.lock().clone().ok_or(EngineError::NotInitialized)
}

/// Stops and clears the process-wide engine.
///
/// # Errors
///
/// [`EngineError::NotInitialized`] when no engine is running.
pub fn stop() -> EngineResult<()> {
    let engine = ENGINE.lock().take().ok_or(EngineError::NotInitialized)?;
    engine.stop()
}

/// [`Engine::create_board`] on the process-wide engine.
///
/// # Errors
///
/// [`EngineError::NotInitialized`], or whatever board creation returns.
pub fn create_board(
    location: WorldLocation,
    facing: BlockFace,
    columns: u32,
    rows: u32,
) -> EngineResult<Arc<PublicBoard>> {
    engine()?.create_board(location, facing, columns, rows)
}

/// [`Engine::create_private_board`] on the process-wide engine.
///
/// # Errors
///
/// [`EngineError::NotInitialized`], or whatever board creation returns.
pub fn create_private_board(
    location: WorldLocation,
    facing: BlockFace,
    columns: u32,
    rows: u32,
    viewer: ClientId,
) -> EngineResult<Arc<PrivateBoard>> {
    engine()?.create_private_board(location, facing, columns, rows, viewer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::SimulatedHost;
    use placard_shared::{Vec3, WorldId};

    fn quiet_config() -> EngineConfig {
        EngineConfig {
            scheduler_initial_delay_ms: 3_600_000,
            ..EngineConfig::default()
        }
    }

    fn here() -> WorldLocation {
        WorldLocation::new(WorldId(0), Vec3::ZERO)
    }

    #[test]
    fn test_create_board_allocates_disjoint_fragments() {
        let host = SimulatedHost::new();
        let engine = Engine::start(host, quiet_config()).unwrap();
        let a = engine.create_board(here(), BlockFace::North, 3, 2).unwrap();
        let b = engine.create_board(here(), BlockFace::North, 1, 1).unwrap();

        assert_eq!(a.fragment_ids().len(), 6);
        assert_ne!(a.id(), b.id());
        assert!(!a.fragment_ids().contains(&b.fragment_ids()[0]));
        assert_eq!(engine.registry().len(), 2);
        engine.stop().unwrap();
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let engine = Engine::start(SimulatedHost::new(), quiet_config()).unwrap();
        assert!(matches!(
            engine.create_board(here(), BlockFace::Up, 0, 3),
            Err(EngineError::InvalidDimensions { columns: 0, rows: 3 })
        ));
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            visibility_radius: -1.0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Engine::start(SimulatedHost::new(), config),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unsupported_protocol_degrades() {
        let host = SimulatedHost::new();
        let config = EngineConfig {
            protocol_version: 47,
            ..quiet_config()
        };
        let engine = Engine::start(host.clone(), config).unwrap();
        host.connect(ClientId(1), WorldId(0), Vec3::ZERO);
        // The tap is still installed, just inert.
        assert!(engine.hooks().is_installed(ClientId(1)));
    }

    #[test]
    fn test_stop_is_final() {
        let host = SimulatedHost::new();
        let engine = Engine::start(host.clone(), quiet_config()).unwrap();
        assert_eq!(host.listener_count(), 1);

        engine.stop().unwrap();
        assert!(!engine.is_running());
        assert!(engine.scheduler_stats().is_none());
        assert_eq!(host.listener_count(), 0);
        assert!(matches!(engine.stop(), Err(EngineError::AlreadyStopped)));
        assert!(matches!(
            engine.create_board(here(), BlockFace::Up, 1, 1),
            Err(EngineError::AlreadyStopped)
        ));
    }

    #[test]
    fn test_register_after_stop_retires_board() {
        let host = SimulatedHost::new();
        let engine = Engine::start(host.clone(), quiet_config()).unwrap();
        let layout = FragmentLayout {
            board: BoardId(900),
            location: here(),
            facing: BlockFace::North,
            size: GridSize::new(1, 1),
            fragments: vec![placard_shared::FragmentId(5)],
        };
        let board = Arc::new(PublicBoard::new(BoardCore::new(layout, host.fragment_sink())));
        engine.stop().unwrap();

        assert!(matches!(
            engine.register(board.clone()),
            Err(EngineError::AlreadyStopped)
        ));
        assert!(engine.registry().is_empty());
        assert!(board.core().is_retired());
    }

    #[test]
    fn test_create_racing_stop_leaves_nothing_registered() {
        let host = SimulatedHost::new();
        let engine = Engine::start(host, quiet_config()).unwrap();
        let creator = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let mut created = Vec::new();
                for _ in 0..2_000 {
                    match engine.create_board(here(), BlockFace::North, 1, 1) {
                        Ok(board) => created.push(board),
                        Err(EngineError::AlreadyStopped) => break,
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                }
                created
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(1));
        engine.stop().unwrap();
        let created = creator.join().unwrap();

        assert!(engine.registry().is_empty());
        assert!(created.iter().all(|board| board.core().is_retired()));
    }

    #[test]
    fn test_taps_clients_already_online() {
        let host = SimulatedHost::new();
        host.connect(ClientId(4), WorldId(0), Vec3::ZERO);
        let engine = Engine::start(host, quiet_config()).unwrap();
        assert!(engine.hooks().is_installed(ClientId(4)));
    }
}
