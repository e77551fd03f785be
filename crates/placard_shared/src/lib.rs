//! # PLACARD Shared
//!
//! Types shared by the board engine and the host that embeds it.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - threads, locks or channels
//! - any host runtime
//!
//! If you need engine state, put it in `placard_engine`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod events;
pub mod ids;
pub mod math;
pub mod protocol;
pub mod world;

pub use constants::{
    DEFAULT_FRAGMENT_ID_BASE, DEFAULT_PROTOCOL_VERSION, RESPAWN_DELAY_MS,
    SCHEDULER_INITIAL_DELAY_MS, SCHEDULER_PERIOD_MS, VISIBILITY_RADIUS,
};
pub use events::{LifecycleEvent, LifecycleEventKind};
pub use ids::{BoardId, ClientId, FragmentId, WorldId};
pub use math::Vec3;
pub use protocol::{
    DecodeError, DecodeResult, Hand, InteractAction, InteractDecoder, InteractPacket,
    ProtocolVersion,
};
pub use world::{BlockFace, GridSize, WorldLocation};
