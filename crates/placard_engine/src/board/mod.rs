//! # Boards
//!
//! A board is a grid of proxy entities (fragments) that only exists on the
//! clients it was spawned for. It does not decide who sees it: the scheduler
//! and the lifecycle reconciler do, and the board records and executes their
//! decisions.
//!
//! ## Variants
//!
//! - [`PublicBoard`]: any client may receive it
//! - [`PrivateBoard`]: only its designated viewer may receive it

mod departures;
mod fragments;
mod private;
mod public;
mod state;

pub use departures::Departures;
pub use fragments::{FragmentAllocator, FragmentLayout};
pub use private::PrivateBoard;
pub use public::PublicBoard;
pub use state::BoardCore;

use std::sync::Arc;

use placard_shared::{BlockFace, BoardId, ClientId, FragmentId, GridSize, InteractAction, WorldLocation};

/// Callback invoked when a client interacts with one of a board's fragments.
pub type InteractHandler = Arc<dyn Fn(InteractAction, ClientId) + Send + Sync>;

/// Capability contract of every board variant.
///
/// Variants provide [`Board::core`] and [`Board::can_receive`]; everything
/// else is derived from the core.
pub trait Board: Send + Sync {
    /// Shared state of the board.
    fn core(&self) -> &BoardCore;

    /// Variant-specific eligibility. Distance and world are not checked here.
    fn can_receive(&self, client: ClientId) -> bool;

    /// Stable identity.
    fn id(&self) -> BoardId {
        self.core().layout().board
    }

    /// Immutable layout.
    fn layout(&self) -> &FragmentLayout {
        self.core().layout()
    }

    /// Anchor location.
    fn location(&self) -> WorldLocation {
        self.core().layout().location
    }

    /// Facing direction.
    fn facing(&self) -> BlockFace {
        self.core().layout().facing
    }

    /// Grid dimensions.
    fn size(&self) -> GridSize {
        self.core().layout().size
    }

    /// Fragment ids, row-major.
    fn fragment_ids(&self) -> &[FragmentId] {
        &self.core().layout().fragments
    }

    /// True when `id` belongs to this board.
    fn owns_fragment(&self, id: FragmentId) -> bool {
        self.core().owns(id)
    }

    /// Clients currently materialized.
    fn recipients(&self) -> Vec<ClientId> {
        self.core().recipients()
    }

    /// True when `client` currently has the board.
    fn is_recipient(&self, client: ClientId) -> bool {
        self.core().is_recipient(client)
    }

    /// Sends the board to `client`. Idempotent.
    fn spawn(&self, client: ClientId) -> bool {
        self.core().spawn(client)
    }

    /// Removes the board from `client`. Idempotent.
    fn destroy(&self, client: ClientId) -> bool {
        self.core().destroy(client)
    }

    /// Resends current state to `client` without membership change.
    fn update(&self, client: ClientId) -> bool {
        self.core().update(client)
    }

    /// Destroys the board for every recipient.
    fn broadcast_destroy(&self) -> usize {
        self.core().broadcast_destroy()
    }

    /// Interaction callback, if any.
    fn interact_handler(&self) -> Option<InteractHandler> {
        self.core().interact_handler()
    }

    /// Installs (or clears, with `None`) the interaction callback.
    fn set_interact_handler(&self, handler: Option<InteractHandler>) {
        self.core().set_interact_handler(handler);
    }
}
