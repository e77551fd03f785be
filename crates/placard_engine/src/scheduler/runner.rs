//! # Scheduler Thread
//!
//! Runs [`VisibilityScheduler::run_pass`] on a dedicated thread: once after
//! the initial delay, then at a fixed period until cancelled.
//!
//! ```text
//! start ──delay──► pass ──period──► pass ──period──► pass ...
//!                                         cancel ──► join
//! ```
//!
//! Passes never overlap. A pass that overruns the period delays the next one
//! instead of queueing a burst.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{after, bounded, select, tick, Sender};
use parking_lot::Mutex;

use super::{PassStats, VisibilityScheduler};
use crate::error::{EngineError, EngineResult};

/// Name of the scheduler thread.
const THREAD_NAME: &str = "placard-visibility";

/// Accumulated pass statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Passes completed.
    pub passes: u64,
    /// Spawns sent across all passes.
    pub total_spawned: u64,
    /// Destroys sent across all passes.
    pub total_destroyed: u64,
    /// Duration of the most recent pass.
    pub last_pass: Duration,
    /// Longest pass observed.
    pub max_pass: Duration,
}

impl SchedulerStats {
    fn record(&mut self, pass: &PassStats) {
        self.passes += 1;
        self.total_spawned += pass.spawned as u64;
        self.total_destroyed += pass.destroyed as u64;
        self.last_pass = pass.elapsed;
        self.max_pass = self.max_pass.max(pass.elapsed);
    }
}

/// Owner of the running scheduler thread.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: Sender<()>,
    thread: Option<JoinHandle<()>>,
    stats: Arc<Mutex<SchedulerStats>>,
}

impl SchedulerHandle {
    /// Spawns the scheduler thread.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ThreadSpawn`] if the OS refuses the thread.
    pub fn spawn(
        scheduler: VisibilityScheduler,
        initial_delay: Duration,
        period: Duration,
    ) -> EngineResult<Self> {
        let (shutdown, shutdown_rx) = bounded::<()>(1);
        let stats = Arc::new(Mutex::new(SchedulerStats::default()));
        let shared = Arc::clone(&stats);

        let thread = std::thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || {
                tracing::debug!(?initial_delay, ?period, "visibility scheduler started");
                select! {
                    recv(after(initial_delay)) -> _ => {}
                    recv(shutdown_rx) -> _ => return,
                }

                let ticker = tick(period);
                loop {
                    let pass = scheduler.run_pass();
                    shared.lock().record(&pass);

                    select! {
                        recv(ticker) -> _ => {}
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                tracing::debug!("visibility scheduler stopped");
            })
            .map_err(|source| EngineError::ThreadSpawn {
                name: THREAD_NAME,
                source,
            })?;

        Ok(Self {
            shutdown,
            thread: Some(thread),
            stats,
        })
    }

    /// Statistics so far.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        *self.stats.lock()
    }

    /// True until [`SchedulerHandle::cancel`] ran.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stops the thread and waits for an in-flight pass to finish.
    /// No pass starts after this returns.
    pub fn cancel(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // Disconnecting works as well as sending when the thread is mid-pass.
        let _ = self.shutdown.try_send(());
        if thread.join().is_err() {
            tracing::error!("visibility scheduler thread panicked");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
