//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask`, the work unit moved through the
//! work queue: populate one chunk from the height field and mesh it. The task
//! owns its chunk until the finished result is handed back to the main thread.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use cgmath::Point3;
use log::debug;

use crate::engine_state::{
    error::GenerationError,
    rendering::meshing::build_mesh,
    settings::TerrainSettings,
    task_management::task::Task,
    voxels::chunk::Chunk,
};

/// A task that generates and meshes one chunk.
///
/// The task carries the world generation it was created for. If the pipeline
/// moves on to a new generation before the task finishes, the task abandons its
/// work at the next checkpoint.
#[derive(Debug, Clone)]
pub struct ChunkGenerationTask {
    /// Slot of the chunk in the world array
    pub grid_index: usize,
    /// World-space origin of the chunk
    pub origin: Point3<i32>,
    /// Side length of the chunk
    pub size: usize,
    /// Seed of the height field
    pub seed: i32,
    /// Height field shaping
    pub terrain: TerrainSettings,
    /// World generation this task belongs to
    pub generation: u64,
    /// Number of earlier failed attempts at this chunk
    pub attempt: u32,
    current_generation: Arc<AtomicU64>,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `grid_index` - The world slot the chunk will occupy
    /// * `origin` - World-space origin of the chunk
    /// * `size` - Side length of the chunk
    /// * `seed` - Height field seed
    /// * `terrain` - Height field shaping
    /// * `current_generation` - The pipeline's live generation counter; the task
    ///   belongs to the generation it holds right now
    pub fn new(
        grid_index: usize,
        origin: Point3<i32>,
        size: usize,
        seed: i32,
        terrain: TerrainSettings,
        current_generation: Arc<AtomicU64>,
    ) -> Self {
        let generation = current_generation.load(Ordering::Acquire);
        ChunkGenerationTask {
            grid_index,
            origin,
            size,
            seed,
            terrain,
            generation,
            attempt: 0,
            current_generation,
        }
    }

    /// The same chunk again, one attempt later.
    pub fn retry(&self) -> Self {
        ChunkGenerationTask {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    /// Whether the pipeline has moved on since this task was created.
    pub fn is_stale(&self) -> bool {
        self.current_generation.load(Ordering::Acquire) != self.generation
    }

    fn result(&self, outcome: ChunkOutcome) -> ChunkGenerationResult {
        ChunkGenerationResult {
            task: self.clone(),
            outcome,
        }
    }
}

impl Task for ChunkGenerationTask {
    type Output = ChunkGenerationResult;

    /// Populates the chunk, then meshes it. Staleness is checked before each step.
    fn process(self) -> ChunkGenerationResult {
        if self.is_stale() {
            return self.result(ChunkOutcome::Abandoned);
        }

        let mut chunk = match Chunk::try_new(self.origin, self.size) {
            Ok(chunk) => chunk,
            Err(error) => return self.result(ChunkOutcome::Failed(error)),
        };
        chunk.populate(self.seed, &self.terrain);

        if self.is_stale() {
            return self.result(ChunkOutcome::Abandoned);
        }

        match build_mesh(&chunk) {
            Ok(mesh) => {
                debug!(
                    target: "terrain-pipeline",
                    "Generated chunk {:?}: {} solid cells, {} vertices",
                    self.origin,
                    chunk.solid_count(),
                    mesh.vertex_count()
                );
                chunk.set_mesh(mesh);
                self.result(ChunkOutcome::Meshed(chunk))
            }
            Err(error) => self.result(ChunkOutcome::Failed(error)),
        }
    }
}

/// What became of a chunk generation task.
#[derive(Debug)]
pub enum ChunkOutcome {
    /// The chunk was populated and meshed.
    Meshed(Chunk),
    /// Generation failed; the chunk may be retried.
    Failed(GenerationError),
    /// The task belonged to an outdated generation and did no further work.
    Abandoned,
}

/// The result of a chunk generation task, sent back to the main thread.
#[derive(Debug)]
pub struct ChunkGenerationResult {
    /// The task that produced this result
    pub task: ChunkGenerationTask,
    /// The produced chunk, or why there is none
    pub outcome: ChunkOutcome,
}
