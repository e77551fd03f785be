//! # PLACARD Engine - Virtual Board Visibility
//!
//! Decides which clients have which virtual boards materialized, keeps that
//! decision correct as clients move, switch worlds and leave, and routes
//! clicks on a board back to its owner.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────────┐
//!    host events ──► │ LifecycleReconc. │──┐
//!                    └──────────────────┘  │   ┌──────────────┐
//!                    ┌──────────────────┐  ├──►│ BoardRegistry│──► FragmentSink
//!    every period ─► │ VisibilitySched. │──┤   └──────────────┘     (host)
//!                    └──────────────────┘  │
//!                    ┌──────────────────┐  │
//!  inbound frames ─► │ InteractionInt.  │──┘
//!                    └──────────────────┘
//! ```
//!
//! - **Scheduler**: steady-state consistency, pull-based, idempotent
//! - **Reconciler**: immediate corrections on teleport, world change,
//!   respawn and disconnect
//! - **Interceptor**: read-only tap mapping interact frames to board callbacks
//!
//! The registry is the only shared mutable collection. Each board guards its
//! own recipient set.
//!
//! ## Example
//!
//! ```rust,ignore
//! use placard_engine::{Engine, EngineConfig};
//!
//! let engine = Engine::start(host, EngineConfig::default())?;
//! let board = engine.create_board(location, BlockFace::North, 4, 3)?;
//! board.set_interact_handler(Some(Arc::new(|action, client| {
//!     println!("{client} clicked ({action:?})");
//! })));
//! engine.stop()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod board;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod interceptor;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod simulation;

pub use board::{Board, FragmentLayout, InteractHandler, PrivateBoard, PublicBoard};
pub use config::EngineConfig;
pub use engine::{create_board, create_private_board, engine, init, init_with_config, stop, Engine};
pub use error::{EngineError, EngineResult};
pub use host::{
    ClientConnection, ClientSession, FragmentSink, Host, InboundTap, LifecycleListener, ListenerId,
    ListenerPriority,
};
pub use interceptor::{InteractionInterceptor, InterceptorHooks};
pub use reconciler::LifecycleReconciler;
pub use registry::BoardRegistry;
pub use scheduler::{PassStats, SchedulerStats, VisibilityScheduler};
pub use simulation::{RecordingSink, SimulatedHost};
