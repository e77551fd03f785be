//! # Lifecycle Reconciler
//!
//! Corrects visibility immediately on events the scheduler would be too slow
//! for. Everything here runs on the host's event context, except the respawn
//! destroy, which waits on the deferred worker.
//!
//! | Event           | Action                                              |
//! |-----------------|-----------------------------------------------------|
//! | teleport begins | destroy client from every board                     |
//! | world changed   | destroy where the world differs, update elsewhere   |
//! | disconnect/kick | mark departed, destroy everywhere, forget its tap   |
//! | respawn         | after `respawn_delay`, destroy from every board     |
//! | connect         | readmit, update every board, install the interact tap |
//!
//! The reconciler never spawns. Getting a board back onto a client is the
//! scheduler's job.
//!
//! A departed client stays marked until it connects again. Readmission drops
//! whatever membership survived from the old connection without emitting,
//! then lifts the mark, so the next pass spawns onto the new connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{at, bounded, select, unbounded, Sender};
use placard_shared::{ClientId, InteractDecoder, LifecycleEvent, WorldId};

use crate::error::{EngineError, EngineResult};
use crate::host::{Host, LifecycleListener};
use crate::interceptor::{InteractionInterceptor, InterceptorHooks};
use crate::registry::BoardRegistry;

const DEFERRED_THREAD_NAME: &str = "placard-deferred";

/// Destroys `client` from every registered board. Returns how many boards
/// actually sent a destroy.
pub fn destroy_everywhere(registry: &BoardRegistry, client: ClientId) -> usize {
    let mut removed = 0;
    registry.for_each(|board| {
        if board.destroy(client) {
            removed += 1;
        }
    });
    removed
}

/// A destroy-everywhere scheduled for later.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeferredDestroy {
    /// Client to clear.
    pub client: ClientId,
    /// Earliest time to run.
    pub due: Instant,
}

/// Background thread running [`DeferredDestroy`] jobs when they come due.
///
/// Jobs run in submission order. Every job carries the same delay, so that is
/// also due order. Jobs still pending at [`DeferredWorker::stop`] are dropped.
#[derive(Debug)]
pub struct DeferredWorker {
    jobs: Sender<DeferredDestroy>,
    shutdown: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl DeferredWorker {
    /// Spawns the worker.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ThreadSpawn`] if the OS refuses the thread.
    pub fn spawn(registry: Arc<BoardRegistry>) -> EngineResult<Self> {
        let (jobs, job_rx) = unbounded::<DeferredDestroy>();
        let (shutdown, shutdown_rx) = bounded::<()>(1);

        let thread = std::thread::Builder::new()
            .name(DEFERRED_THREAD_NAME.to_owned())
            .spawn(move || loop {
                let job = select! {
                    recv(job_rx) -> job => match job {
                        Ok(job) => job,
                        Err(_) => break,
                    },
                    recv(shutdown_rx) -> _ => break,
                };
                select! {
                    recv(at(job.due)) -> _ => {}
                    recv(shutdown_rx) -> _ => break,
                }
                let removed = destroy_everywhere(&registry, job.client);
                tracing::trace!(client = %job.client, removed, "deferred destroy");
            })
            .map_err(|source| EngineError::ThreadSpawn {
                name: DEFERRED_THREAD_NAME,
                source,
            })?;

        Ok(Self {
            jobs,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Queue feeding the worker.
    #[must_use]
    pub fn sender(&self) -> Sender<DeferredDestroy> {
        self.jobs.clone()
    }

    /// Stops the worker, dropping pending jobs, and joins it.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.shutdown.try_send(());
        if thread.join().is_err() {
            tracing::error!("deferred worker thread panicked");
        }
    }
}

impl Drop for DeferredWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Event-driven visibility corrections.
pub struct LifecycleReconciler {
    registry: Arc<BoardRegistry>,
    /// Weak: the host owns this listener once subscribed.
    host: Weak<dyn Host>,
    hooks: Arc<InterceptorHooks>,
    decoder: Option<InteractDecoder>,
    deferred: Sender<DeferredDestroy>,
    respawn_delay: Duration,
    detached: AtomicBool,
}

impl LifecycleReconciler {
    /// Creates a reconciler. It does nothing until subscribed to `host`.
    #[must_use]
    pub fn new(
        registry: Arc<BoardRegistry>,
        host: &Arc<dyn Host>,
        hooks: Arc<InterceptorHooks>,
        decoder: Option<InteractDecoder>,
        deferred: Sender<DeferredDestroy>,
        respawn_delay: Duration,
    ) -> Self {
        Self {
            registry,
            host: Arc::downgrade(host),
            hooks,
            decoder,
            deferred,
            respawn_delay,
            detached: AtomicBool::new(false),
        }
    }

    /// Ignores every later event. Used on shutdown, racing events included.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }

    /// True after [`LifecycleReconciler::detach`].
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Handles one event. Public so hosts and tests can drive it directly.
    pub fn handle(&self, event: &LifecycleEvent) {
        if self.is_detached() {
            return;
        }
        match event {
            LifecycleEvent::TeleportBegin { client, .. } => {
                destroy_everywhere(&self.registry, *client);
            }
            LifecycleEvent::WorldChanged { client, to, .. } => {
                self.on_world_changed(*client, *to);
            }
            LifecycleEvent::Disconnected { client } | LifecycleEvent::Kicked { client, .. } => {
                self.on_departed(*client);
            }
            LifecycleEvent::Respawned { client } => self.on_respawned(*client),
            LifecycleEvent::Connected { client } => self.on_connected(*client),
        }
    }

    fn on_world_changed(&self, client: ClientId, world: WorldId) {
        self.registry.for_each(|board| {
            if board.location().world == world {
                board.update(client);
            } else {
                board.destroy(client);
            }
        });
    }

    fn on_respawned(&self, client: ClientId) {
        let job = DeferredDestroy {
            client,
            due: Instant::now() + self.respawn_delay,
        };
        if self.deferred.send(job).is_err() {
            tracing::debug!(%client, "deferred worker gone, respawn destroy dropped");
        }
    }

    fn on_departed(&self, client: ClientId) {
        // Mark before destroying: a spawn racing this sees one or the other.
        self.registry.departures().mark(client);
        destroy_everywhere(&self.registry, client);
        self.hooks.forget(client);
    }

    fn on_connected(&self, client: ClientId) {
        let departures = self.registry.departures();
        if departures.contains(client) {
            let mut stale = 0;
            self.registry.for_each(|board| {
                if board.core().forget(client) {
                    stale += 1;
                }
            });
            departures.clear(client);
            if stale > 0 {
                tracing::debug!(%client, stale, "dropped memberships of previous connection");
            }
        }
        self.registry.for_each(|board| {
            board.update(client);
        });
        self.install_tap(client);
    }

    /// Installs the interact tap on `client`'s connection, if the host still
    /// has one.
    pub fn install_tap(&self, client: ClientId) -> bool {
        let Some(host) = self.host.upgrade() else {
            return false;
        };
        let Some(connection) = host.connection(client) else {
            tracing::debug!(%client, "no connection to tap");
            return false;
        };
        let tap = Arc::new(InteractionInterceptor::new(
            client,
            Arc::clone(&self.registry),
            self.decoder,
        ));
        self.hooks.install(client, connection, tap);
        true
    }
}

impl LifecycleListener for LifecycleReconciler {
    fn on_event(&self, event: &LifecycleEvent) {
        self.handle(event);
    }
}

impl std::fmt::Debug for LifecycleReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleReconciler")
            .field("respawn_delay", &self.respawn_delay)
            .field("detached", &self.is_detached())
            .finish_non_exhaustive()
    }
}
