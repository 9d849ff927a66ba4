//! # Settings Module
//!
//! Orchestration parameters for terrain generation: seed, world grid size,
//! chunk side length, noise shaping and the worker/queue configuration.
//! Settings deserialize from JSON and every field falls back to its default.

use std::{fs, num::NonZeroUsize, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use web_time::{SystemTime, UNIX_EPOCH};

use super::{
    error::ConfigError, task_management::work_queue::QueuePolicy, voxels::chunk::MAX_CHUNK_SIZE,
};

/// Environment variable naming the settings file read by the binary.
pub const SETTINGS_PATH_ENV: &str = "VOXEL_TERRAIN_CONFIG";

/// Side length of a chunk in blocks.
pub const DEFAULT_CHUNK_SIZE: usize = 32;

/// Number of chunks along each horizontal axis of the world.
pub const DEFAULT_RENDER_DISTANCE: usize = 20;

/// Largest number of chunks in one world grid.
pub const MAX_CHUNK_COUNT: usize = 1 << 20;

// Every chunk origin of a valid world fits 32-bit world coordinates.
const _: () = assert!(MAX_CHUNK_COUNT * MAX_CHUNK_SIZE <= i32::MAX as usize);

/// Shape of the height field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    /// World units per noise lattice cell.
    pub scale: f32,
    /// Number of fractal octaves. One octave is the plain gradient noise.
    pub octaves: u32,
    /// Amplitude multiplier applied after each octave.
    pub persistence: f32,
    /// Frequency multiplier applied after each octave.
    pub lacunarity: f32,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        TerrainSettings {
            scale: 64.0,
            octaves: 1,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// Queue policy as written in a settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicySetting {
    /// Reject new work while the queue is full.
    FailFast,
    /// Wait up to `timeout_ms` for room (or for work).
    Block {
        /// Wait bound in milliseconds.
        timeout_ms: u64,
    },
    /// Evict the oldest queued item to admit a new one.
    DropOldest,
}

impl From<QueuePolicySetting> for QueuePolicy {
    fn from(setting: QueuePolicySetting) -> Self {
        match setting {
            QueuePolicySetting::FailFast => QueuePolicy::FailFast,
            QueuePolicySetting::Block { timeout_ms } => QueuePolicy::Block {
                timeout: Duration::from_millis(timeout_ms),
            },
            QueuePolicySetting::DropOldest => QueuePolicy::DropOldest,
        }
    }
}

/// Everything the generation pipeline needs to build a world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// World seed. `None` derives one from the clock.
    pub seed: Option<i32>,
    /// Chunks along the world X axis.
    pub grid_width: usize,
    /// Chunks along the world Z axis.
    pub grid_depth: usize,
    /// Side length S of every chunk.
    pub chunk_size: usize,
    /// Height field shaping.
    pub terrain: TerrainSettings,
    /// Background workers. Zero generates on the calling thread.
    pub worker_count: usize,
    /// Capacity of the bounded work queue.
    pub queue_capacity: usize,
    /// What the producer does when the queue is full.
    pub queue_policy: QueuePolicySetting,
    /// How many times a failed chunk is re-queued before it is left as a hole.
    pub chunk_retry_limit: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        GenerationSettings {
            seed: None,
            grid_width: DEFAULT_RENDER_DISTANCE,
            grid_depth: DEFAULT_RENDER_DISTANCE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            terrain: TerrainSettings::default(),
            worker_count: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            queue_capacity: 64,
            queue_policy: QueuePolicySetting::FailFast,
            chunk_retry_limit: 1,
        }
    }
}

impl GenerationSettings {
    /// Reads settings from a JSON file and validates them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                log::warn!(
                    "Settings file \"{}\" not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Rejects settings the pipeline cannot run with.
    ///
    /// A valid world has at most [`MAX_CHUNK_COUNT`] chunks of side at most
    /// [`MAX_CHUNK_SIZE`], so every chunk origin fits `i32`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1".into()));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "chunk_size must be at most {MAX_CHUNK_SIZE}, got {}",
                self.chunk_size
            )));
        }
        match self.chunk_count() {
            Some(count) if count <= MAX_CHUNK_COUNT => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "grid_width x grid_depth must be at most {MAX_CHUNK_COUNT} chunks, got {} x {}",
                    self.grid_width, self.grid_depth
                )))
            }
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".into()));
        }
        if !(self.terrain.scale.is_finite() && self.terrain.scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "terrain.scale must be a positive number, got {}",
                self.terrain.scale
            )));
        }
        if self.terrain.octaves == 0 {
            return Err(ConfigError::Invalid("terrain.octaves must be at least 1".into()));
        }
        Ok(())
    }

    /// Number of chunks in the world grid, or `None` if it overflows `usize`.
    pub fn chunk_count(&self) -> Option<usize> {
        self.grid_width.checked_mul(self.grid_depth)
    }

    /// The configured seed, or one derived from the current time.
    pub fn resolve_seed(&self) -> i32 {
        self.seed.unwrap_or_else(time_seed)
    }
}

/// Seconds since the epoch truncated to 32 bits, or a random seed if the clock is unusable.
pub fn time_seed() -> i32 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i32,
        Err(_) => fastrand::i32(..),
    }
}
