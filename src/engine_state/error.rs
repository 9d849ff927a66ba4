//! # Error Module
//!
//! Error types shared by the terrain pipeline. Per-chunk failures are carried back
//! to the main thread as values so one bad chunk never aborts its siblings; only
//! [`GenerationError::Exhausted`] ends a generation batch.

use std::{collections::TryReserveError, path::PathBuf};

use cgmath::Point3;

/// Errors raised while generating, meshing or scheduling chunks.
#[derive(thiserror::Error, Debug)]
pub enum GenerationError {
    /// The vertex buffer for one chunk could not be allocated.
    #[error("failed to allocate {requested_vertices} vertices for chunk at {origin:?}")]
    Allocation {
        /// World-space origin of the chunk being meshed.
        origin: Point3<i32>,
        /// Size of the scratch buffer that was requested.
        requested_vertices: usize,
        /// Underlying allocator error.
        #[source]
        source: TryReserveError,
    },
    /// The chunk side length does not fit an occupancy grid.
    #[error("chunk size {size} exceeds the supported maximum of {max}")]
    ChunkTooLarge {
        /// Requested side length.
        size: usize,
        /// Largest supported side length.
        max: usize,
    },
    /// The chunk origin does not fit 32-bit world coordinates.
    #[error("chunk at grid position ({grid_x}, {grid_z}) with size {size} lies outside world coordinates")]
    ChunkOutOfRange {
        /// Grid position along X.
        grid_x: usize,
        /// Grid position along Z.
        grid_z: usize,
        /// Chunk side length.
        size: usize,
    },
    /// Every chunk of a batch failed, generation cannot make progress.
    #[error("terrain generation failed for all {failed} chunks of the batch")]
    Exhausted {
        /// Number of chunks that ended in failure.
        failed: usize,
    },
    /// All worker threads hung up before the batch completed.
    #[error("chunk workers disconnected with {pending} chunks outstanding")]
    WorkersDisconnected {
        /// Chunks still awaiting a result.
        pending: usize,
    },
    /// Settings could not be loaded or were rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while loading [`GenerationSettings`](super::settings::GenerationSettings).
#[derive(thiserror::Error, Debug)]
#[allow(missing_docs)]
pub enum ConfigError {
    #[error("failed to read settings file \"{}\"", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file \"{}\"", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid settings: {0}")]
    Invalid(String),
}
