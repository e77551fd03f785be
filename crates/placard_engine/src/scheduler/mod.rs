//! # Visibility Scheduler
//!
//! The steady-state authority on who sees what. One pass walks every
//! connected client against every board and spawns, destroys or leaves alone.
//!
//! ## Decision Order
//!
//! ```text
//! world differs            → destroy (if recipient)
//! out of radius, recipient → destroy
//! in radius, not recipient,
//!   board accepts client   → spawn
//! otherwise                → keep
//! ```
//!
//! Destroy conditions are checked before the spawn condition. Nothing else is
//! ordered: a pass re-reads every piece of state it needs, so it is safe to
//! run while boards and clients come and go. The period bounds worst-case
//! visibility lag; lifecycle events correct the cases that cannot wait.

mod runner;

pub use runner::{SchedulerHandle, SchedulerStats};

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::board::Board;
use crate::host::{ClientSession, Host};
use crate::registry::BoardRegistry;

/// Outcome of one client × board check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Materialize the board for the client.
    Spawn,
    /// Remove the board from the client.
    Destroy,
    /// Leave things as they are.
    Keep,
}

/// Decides what to do for one client and one board.
#[must_use]
pub fn decide(board: &dyn Board, session: &ClientSession, radius: f32) -> Decision {
    let anchor = board.location();
    let recipient = board.is_recipient(session.id);

    if !session.location().same_world(&anchor) {
        return if recipient { Decision::Destroy } else { Decision::Keep };
    }

    let in_range = session.position.within(anchor.position, radius);
    if !in_range {
        return if recipient { Decision::Destroy } else { Decision::Keep };
    }

    if !recipient && board.can_receive(session.id) {
        Decision::Spawn
    } else {
        Decision::Keep
    }
}

/// Statistics of one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Connected clients examined.
    pub clients: usize,
    /// Boards examined.
    pub boards: usize,
    /// Spawns that were actually sent.
    pub spawned: usize,
    /// Destroys that were actually sent.
    pub destroyed: usize,
    /// Wall time of the pass.
    pub elapsed: Duration,
}

/// Reconciles every client against every board.
pub struct VisibilityScheduler {
    registry: Arc<BoardRegistry>,
    host: Arc<dyn Host>,
    radius: f32,
}

impl VisibilityScheduler {
    /// Creates a scheduler over `registry`, reading sessions from `host`.
    #[must_use]
    pub fn new(registry: Arc<BoardRegistry>, host: Arc<dyn Host>, radius: f32) -> Self {
        Self {
            registry,
            host,
            radius,
        }
    }

    /// Visibility radius in world units.
    #[must_use]
    pub const fn radius(&self) -> f32 {
        self.radius
    }

    /// Runs one pass.
    pub fn run_pass(&self) -> PassStats {
        let start = Instant::now();
        let boards = self.registry.snapshot();
        let clients = self.host.online_clients();

        let mut stats = PassStats {
            boards: boards.len(),
            ..PassStats::default()
        };

        for session in clients.iter().filter(|session| session.connected) {
            stats.clients += 1;
            for board in &boards {
                match decide(board.as_ref(), session, self.radius) {
                    Decision::Spawn => {
                        if board.spawn(session.id) {
                            stats.spawned += 1;
                        }
                    }
                    Decision::Destroy => {
                        if board.destroy(session.id) {
                            stats.destroyed += 1;
                        }
                    }
                    Decision::Keep => {}
                }
            }
        }

        stats.elapsed = start.elapsed();
        if stats.spawned > 0 || stats.destroyed > 0 {
            tracing::debug!(
                clients = stats.clients,
                boards = stats.boards,
                spawned = stats.spawned,
                destroyed = stats.destroyed,
                elapsed_us = stats.elapsed.as_micros() as u64,
                "visibility pass"
            );
        }
        stats
    }
}

impl std::fmt::Debug for VisibilityScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityScheduler")
            .field("registry", &self.registry)
            .field("radius", &self.radius)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardCore, FragmentAllocator, FragmentLayout, PrivateBoard, PublicBoard};
    use crate::simulation::{RecordingSink, SimulatedHost};
    use placard_shared::{BlockFace, BoardId, ClientId, GridSize, Vec3, WorldId, WorldLocation};

    const W: WorldId = WorldId(0);
    const W2: WorldId = WorldId(1);

    fn layout(id: u64, world: WorldId, position: Vec3) -> FragmentLayout {
        FragmentLayout {
            board: BoardId(id),
            location: WorldLocation::new(world, position),
            facing: BlockFace::North,
            size: GridSize::new(2, 2),
            fragments: FragmentAllocator::new(i32::try_from(id).unwrap() * 10)
                .allocate(4)
                .unwrap(),
        }
    }

    fn session(id: u64, world: WorldId, position: Vec3) -> ClientSession {
        ClientSession {
            id: ClientId(id),
            world,
            position,
            connected: true,
        }
    }

    #[test]
    fn test_decide_order() {
        let sink = Arc::new(RecordingSink::new());
        let board = PublicBoard::new(BoardCore::new(layout(1, W, Vec3::ZERO), sink));
        let near = session(1, W, Vec3::new(10.0, 0.0, 0.0));
        let far = session(1, W, Vec3::new(100.0, 0.0, 0.0));
        let elsewhere = session(1, W2, Vec3::ZERO);

        assert_eq!(decide(&board, &near, 60.0), Decision::Spawn);
        assert_eq!(decide(&board, &far, 60.0), Decision::Keep);
        assert_eq!(decide(&board, &elsewhere, 60.0), Decision::Keep);

        board.spawn(ClientId(1));
        assert_eq!(decide(&board, &near, 60.0), Decision::Keep);
        assert_eq!(decide(&board, &far, 60.0), Decision::Destroy);
        assert_eq!(decide(&board, &elsewhere, 60.0), Decision::Destroy);
    }

    #[test]
    fn test_decide_private_board() {
        let sink = Arc::new(RecordingSink::new());
        let board = PrivateBoard::new(
            BoardCore::new(layout(1, W, Vec3::ZERO), sink),
            ClientId(2),
        );
        assert_eq!(decide(&board, &session(1, W, Vec3::ZERO), 60.0), Decision::Keep);
        assert_eq!(decide(&board, &session(2, W, Vec3::ZERO), 60.0), Decision::Spawn);
    }

    #[test]
    fn test_pass_converges_in_one_run() {
        let host = SimulatedHost::new();
        let registry = Arc::new(BoardRegistry::new());
        let sink = host.recording_sink();
        let near: Arc<dyn Board> =
            Arc::new(PublicBoard::new(BoardCore::new(layout(1, W, Vec3::ZERO), sink.clone())));
        let far: Arc<dyn Board> = Arc::new(PublicBoard::new(BoardCore::new(
            layout(2, W, Vec3::new(500.0, 0.0, 0.0)),
            sink.clone(),
        )));
        let other_world: Arc<dyn Board> =
            Arc::new(PublicBoard::new(BoardCore::new(layout(3, W2, Vec3::ZERO), sink.clone())));
        registry.register(Arc::clone(&near));
        registry.register(Arc::clone(&far));
        registry.register(Arc::clone(&other_world));

        host.connect(ClientId(1), W, Vec3::new(5.0, 0.0, 5.0));
        let scheduler = VisibilityScheduler::new(registry, host.clone(), 60.0);

        let first = scheduler.run_pass();
        assert_eq!(first.clients, 1);
        assert_eq!(first.boards, 3);
        assert_eq!(first.spawned, 1);
        assert!(near.is_recipient(ClientId(1)));
        assert!(!far.is_recipient(ClientId(1)));
        assert!(!other_world.is_recipient(ClientId(1)));

        // Nothing changed: the next pass is a no-op.
        let second = scheduler.run_pass();
        assert_eq!((second.spawned, second.destroyed), (0, 0));

        // Walk out of range.
        host.move_to(ClientId(1), Vec3::new(200.0, 0.0, 0.0));
        let third = scheduler.run_pass();
        assert_eq!(third.destroyed, 1);
        assert!(near.recipients().is_empty());
    }

    #[test]
    fn test_disconnected_sessions_are_skipped() {
        let host = SimulatedHost::new();
        let registry = Arc::new(BoardRegistry::new());
        let board: Arc<dyn Board> = Arc::new(PublicBoard::new(BoardCore::new(
            layout(1, W, Vec3::ZERO),
            host.recording_sink(),
        )));
        registry.register(Arc::clone(&board));
        host.connect(ClientId(1), W, Vec3::ZERO);
        host.set_connected(ClientId(1), false);

        let stats = VisibilityScheduler::new(registry, host.clone(), 60.0).run_pass();
        assert_eq!(stats.clients, 0);
        assert!(board.recipients().is_empty());
    }
}
