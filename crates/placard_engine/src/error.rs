//! # Engine Error Types
//!
//! All errors the engine reports to its embedder.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the board engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The process-wide engine was used before `init`.
    #[error("engine not initialized")]
    NotInitialized,

    /// `init` was called while an engine is already installed.
    #[error("engine already initialized")]
    AlreadyInitialized,

    /// `stop` was called on an engine that already stopped.
    #[error("engine already stopped")]
    AlreadyStopped,

    /// A board needs at least one column and one row.
    #[error("invalid board dimensions: {columns}x{rows}")]
    InvalidDimensions {
        /// Requested columns.
        columns: u32,
        /// Requested rows.
        rows: u32,
    },

    /// The fragment id space is used up.
    #[error("fragment ids exhausted: cannot allocate {requested} more")]
    FragmentIdsExhausted {
        /// Fragments requested by the failing allocation.
        requested: u64,
    },

    /// Configuration values out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("cannot read configuration {}: {source}", path.display())]
    ConfigIo {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for `EngineConfig`.
    #[error("cannot parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A background worker thread could not be started.
    #[error("cannot spawn {name} thread: {source}")]
    ThreadSpawn {
        /// Thread name.
        name: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
