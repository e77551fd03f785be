//! # Engine Constants
//!
//! Defaults for the visibility engine. Every value here can be overridden
//! through `EngineConfig` in `placard_engine`.

// =============================================================================
// VISIBILITY
// =============================================================================

/// Maximum distance (world units) at which a client may be spawned for a board.
pub const VISIBILITY_RADIUS: f32 = 60.0;

/// Period of the visibility scheduler (one pass per second).
pub const SCHEDULER_PERIOD_MS: u64 = 1_000;

/// Delay before the first scheduler pass after the engine starts.
pub const SCHEDULER_INITIAL_DELAY_MS: u64 = 500;

/// Delay before a respawned client is destroyed from every board,
/// so the new position has settled.
pub const RESPAWN_DELAY_MS: u64 = 100;

// =============================================================================
// PROTOCOL
// =============================================================================

/// Protocol version the interact decoder is built for unless configured.
pub const DEFAULT_PROTOCOL_VERSION: u32 = 340;

/// First fragment id handed out by the engine.
///
/// Kept well above the id range a host allocates for its real entities.
pub const DEFAULT_FRAGMENT_ID_BASE: i32 = 1_000_000;

