//! # Board Registry
//!
//! The only shared mutable collection in the engine. Every execution context
//! (scheduler thread, host event contexts, connection taps) reads it.
//!
//! ## Iteration
//!
//! Iteration works on a snapshot taken under a short read lock, so a
//! register/unregister from another context never blocks behind a long pass
//! and never corrupts it. A board added mid-pass is picked up next pass; a
//! board removed mid-pass is retired first and refuses further spawns.
//!
//! The registry also owns the [`Departures`] of its clients. Every board it
//! registers is bound to them, so no board spawns onto a connection that is
//! already gone.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use placard_shared::{BoardId, FragmentId};

use crate::board::{Board, Departures};

/// Set of active boards, unique by [`BoardId`].
#[derive(Default)]
pub struct BoardRegistry {
    boards: RwLock<HashMap<BoardId, Arc<dyn Board>>>,
    departures: Arc<Departures>,
}

impl BoardRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a board. Returns `false` when a board with that id is already present.
    pub fn register(&self, board: Arc<dyn Board>) -> bool {
        let mut boards = self.boards.write();
        let id = board.id();
        if boards.contains_key(&id) {
            return false;
        }
        board.core().track_departures(Arc::clone(&self.departures));
        boards.insert(id, board);
        true
    }

    /// Clients whose connection ended and has not been replaced.
    #[must_use]
    pub fn departures(&self) -> &Arc<Departures> {
        &self.departures
    }

    /// Destroys `board` for every recipient, then removes it.
    ///
    /// Safe to call on a board that was already removed. Returns whether this
    /// call removed it.
    pub fn unregister(&self, board: &dyn Board) -> bool {
        board.core().retire();
        self.boards.write().remove(&board.id()).is_some()
    }

    /// Removes every board, retiring each one. Used on shutdown.
    pub fn drain(&self) -> Vec<Arc<dyn Board>> {
        let drained: Vec<_> = self.boards.write().drain().map(|(_, board)| board).collect();
        for board in &drained {
            board.core().retire();
        }
        drained
    }

    /// Board with `id`, if registered.
    #[must_use]
    pub fn get(&self, id: BoardId) -> Option<Arc<dyn Board>> {
        self.boards.read().get(&id).cloned()
    }

    /// True when a board with `id` is registered.
    #[must_use]
    pub fn contains(&self, id: BoardId) -> bool {
        self.boards.read().contains_key(&id)
    }

    /// Number of registered boards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boards.read().len()
    }

    /// True when no board is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boards.read().is_empty()
    }

    /// Point-in-time copy of the registered boards.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<dyn Board>> {
        self.boards.read().values().cloned().collect()
    }

    /// Calls `f` for every board of a snapshot. No lock is held during `f`.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<dyn Board>)) {
        for board in self.snapshot() {
            f(&board);
        }
    }

    /// Boards whose fragment set contains `fragment`.
    ///
    /// Linear scan: board counts and interaction rates are both low. Ids are
    /// disjoint across boards, so this is normally zero or one board.
    #[must_use]
    pub fn boards_owning(&self, fragment: FragmentId) -> Vec<Arc<dyn Board>> {
        self.boards
            .read()
            .values()
            .filter(|board| board.owns_fragment(fragment))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for BoardRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardRegistry")
            .field("boards", &self.len())
            .field("departed", &self.departures.len())
            .finish()
    }
}
