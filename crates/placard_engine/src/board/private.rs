//! Board visible to a single viewer.

use placard_shared::ClientId;

use super::{Board, BoardCore};

/// A board only its viewer may receive.
#[derive(Debug)]
pub struct PrivateBoard {
    core: BoardCore,
    viewer: ClientId,
}

impl PrivateBoard {
    /// Wraps a core as a board private to `viewer`.
    #[must_use]
    pub fn new(core: BoardCore, viewer: ClientId) -> Self {
        Self { core, viewer }
    }
}

impl Board for PrivateBoard {
    fn core(&self) -> &BoardCore {
        &self.core
    }

    fn can_receive(&self, client: ClientId) -> bool {
        client == self.viewer
    }
}
