//! Fragment ids and the immutable layout a board hands to the sink.

use std::sync::atomic::{AtomicI32, Ordering};

use placard_shared::{BlockFace, BoardId, FragmentId, GridSize, WorldLocation};

use crate::error::{EngineError, EngineResult};

/// Everything the host needs to render a board. Never changes after creation.
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentLayout {
    /// Owning board.
    pub board: BoardId,
    /// Anchor of the grid.
    pub location: WorldLocation,
    /// Direction the grid faces.
    pub facing: BlockFace,
    /// Grid dimensions.
    pub size: GridSize,
    /// One fragment per cell, row-major.
    pub fragments: Vec<FragmentId>,
}

impl FragmentLayout {
    /// Fragment occupying a grid cell.
    #[must_use]
    pub fn fragment_at(&self, column: u32, row: u32) -> Option<FragmentId> {
        self.size
            .index_of(column, row)
            .and_then(|index| self.fragments.get(index).copied())
    }
}

/// Hands out disjoint, ascending runs of fragment ids.
#[derive(Debug)]
pub struct FragmentAllocator {
    next: AtomicI32,
}

impl FragmentAllocator {
    /// Creates an allocator whose first id is `base`.
    #[must_use]
    pub const fn new(base: i32) -> Self {
        Self {
            next: AtomicI32::new(base),
        }
    }

    /// Reserves `count` consecutive ids.
    pub fn allocate(&self, count: u64) -> EngineResult<Vec<FragmentId>> {
        let span = i32::try_from(count)
            .map_err(|_| EngineError::FragmentIdsExhausted { requested: count })?;

        let first = self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
                next.checked_add(span)
            })
            .map_err(|_| EngineError::FragmentIdsExhausted { requested: count })?;

        Ok((first..first + span).map(FragmentId).collect())
    }
}
