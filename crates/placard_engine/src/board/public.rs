//! Board visible to every client in range.

use placard_shared::ClientId;

use super::{Board, BoardCore};

/// A board any client may receive.
#[derive(Debug)]
pub struct PublicBoard {
    core: BoardCore,
}

impl PublicBoard {
    /// Wraps a core as a public board.
    #[must_use]
    pub fn new(core: BoardCore) -> Self {
        Self { core }
    }
}

impl Board for PublicBoard {
    fn core(&self) -> &BoardCore {
        &self.core
    }

    fn can_receive(&self, _client: ClientId) -> bool {
        true
    }
}
