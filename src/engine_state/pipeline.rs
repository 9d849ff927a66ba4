//! # Generation Pipeline
//!
//! Orchestrates terrain generation for a whole world: it publishes one
//! [`ChunkGenerationTask`] per grid slot, collects the finished chunks on the
//! main thread, uploads them through the [`ChunkUploader`] and places them in the
//! [`World`].
//!
//! ## Frame loop
//!
//! ```rust,ignore
//! pipeline.generate(seed);
//! loop {
//!     pipeline.process_queued();
//!     pipeline.process_completed()?;
//!     for request in pipeline.render() {
//!         // set the model translation, then request.handle.draw(&mut pass)
//!     }
//! }
//! ```
//!
//! ## Regeneration
//!
//! [`GenerationPipeline::generate`] bumps the world generation. Queued tasks of
//! the previous generation are cancelled, running ones abandon their work at the
//! next checkpoint, and anything that still arrives for an old generation is
//! discarded at handoff. The previous world's GPU buffers are released before a
//! single new task is published.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::RecvTimeoutError,
        Arc,
    },
    time::Duration,
};

use cgmath::{Point3, Vector3};
use log::{debug, error, info, warn};
use web_time::Instant;

use crate::engine_state::{
    buffer_state::ChunkUploader,
    error::GenerationError,
    rendering::meshing::build_mesh,
    settings::GenerationSettings,
    task_management::{task::Task, TaskManager, WORKER_POLL_INTERVAL},
    voxels::{
        chunk::Chunk,
        tasks::chunk_generation_task::{ChunkGenerationResult, ChunkGenerationTask, ChunkOutcome},
        world::World,
    },
};

/// One draw call for a renderable chunk.
#[derive(Debug)]
pub struct DrawRequest<'a, H> {
    /// GPU buffer handle of the chunk's vertices
    pub handle: &'a H,
    /// Chunk origin in world space
    pub origin: Point3<i32>,
    /// Model translation for the chunk, equal to its origin
    pub translation: Vector3<f32>,
    /// Number of vertices to draw
    pub vertex_count: u32,
}

/// Summary of a finished generation batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationReport {
    /// Seed the world was generated with
    pub seed: i32,
    /// World generation the batch belonged to
    pub generation: u64,
    /// Chunks placed in the world
    pub chunks: usize,
    /// Grid slots left empty by failed chunks
    pub holes: usize,
    /// Total vertices across the world
    pub vertices: usize,
    /// Time from `generate` until the last chunk was handed off
    pub elapsed: Duration,
}

#[derive(Debug)]
struct BatchProgress {
    started: Instant,
    total: usize,
    completed: usize,
    finished: Option<GenerationReport>,
}

/// Owns the world and drives chunk generation for it.
pub struct GenerationPipeline<U: ChunkUploader> {
    settings: GenerationSettings,
    uploader: U,
    world: World<U::Handle>,
    task_manager: Option<TaskManager<ChunkGenerationTask>>,
    local_tasks: VecDeque<ChunkGenerationTask>,
    generation: Arc<AtomicU64>,
    seed: i32,
    batch: Option<BatchProgress>,
}

impl<U: ChunkUploader> GenerationPipeline<U> {
    /// Validates `settings` and starts the worker pool.
    ///
    /// With `worker_count == 0` no threads are started and chunks are generated
    /// on the calling thread inside [`GenerationPipeline::process_completed`].
    ///
    /// # Errors
    /// Returns [`GenerationError::Config`] if the settings are rejected.
    pub fn new(settings: GenerationSettings, uploader: U) -> Result<Self, GenerationError> {
        settings.validate()?;

        let task_manager = (settings.worker_count > 0).then(|| {
            TaskManager::new(
                settings.worker_count,
                settings.queue_capacity,
                settings.queue_policy.into(),
            )
        });
        let world = World::new(settings.grid_width, settings.grid_depth, settings.chunk_size);

        Ok(GenerationPipeline {
            seed: settings.seed.unwrap_or_default(),
            settings,
            uploader,
            world,
            task_manager,
            local_tasks: VecDeque::new(),
            generation: Arc::new(AtomicU64::new(0)),
            batch: None,
        })
    }

    /// Starts generating a fresh world for `seed`, replacing the current one.
    pub fn generate(&mut self, seed: i32) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        let cancelled = match &mut self.task_manager {
            Some(task_manager) => task_manager.cancel_queued_tasks().len(),
            None => 0,
        } + self.local_tasks.len();
        self.local_tasks.clear();

        let released = self.world.clear(&mut self.uploader);
        info!(
            target: "terrain-pipeline",
            "Generating world {} with seed {} ({} chunks, {} released, {} queued tasks cancelled)",
            generation,
            seed,
            self.world.capacity(),
            released,
            cancelled
        );

        self.seed = seed;
        self.batch = Some(BatchProgress {
            started: Instant::now(),
            total: self.world.capacity(),
            completed: 0,
            finished: None,
        });

        for index in 0..self.world.capacity() {
            let task = self.new_task(index);
            self.publish(task);
        }
    }

    fn new_task(&self, index: usize) -> ChunkGenerationTask {
        ChunkGenerationTask::new(
            index,
            self.world.origin_of(index),
            self.settings.chunk_size,
            self.seed,
            self.settings.terrain,
            Arc::clone(&self.generation),
        )
    }

    fn publish(&mut self, task: ChunkGenerationTask) {
        match &mut self.task_manager {
            Some(task_manager) => {
                task_manager.publish_task(task);
            }
            None => self.local_tasks.push_back(task),
        }
    }

    /// Moves backlogged tasks into the work queue as room frees up.
    pub fn process_queued(&mut self) {
        if let Some(task_manager) = &mut self.task_manager {
            task_manager.process_queued_tasks();
        }
    }

    /// Hands off every chunk finished since the last call.
    ///
    /// Finished chunks are uploaded and placed in the world; failed chunks are
    /// re-queued until `chunk_retry_limit` is used up and then left as holes.
    /// Returns the number of chunks placed by this call.
    ///
    /// # Errors
    /// Returns [`GenerationError::Exhausted`] once, when the batch ends without a
    /// single chunk placed.
    pub fn process_completed(&mut self) -> Result<usize, GenerationError> {
        let mut placed = 0;

        if let Some(task_manager) = &mut self.task_manager {
            let outputs = task_manager.process_completed_tasks();
            for output in outputs {
                placed += self.hand_off(output);
            }
            self.requeue_dropped_tasks();
        } else {
            while let Some(task) = self.local_tasks.pop_front() {
                let output = task.process();
                placed += self.hand_off(output);
            }
        }

        self.finish_batch_if_done()?;
        Ok(placed)
    }

    /// Puts chunks evicted from the queue back in the backlog. They never ran,
    /// so they keep their attempt count.
    fn requeue_dropped_tasks(&mut self) {
        let Some(task_manager) = &mut self.task_manager else {
            return;
        };
        for task in task_manager.take_dropped_tasks() {
            if task.is_stale() {
                continue;
            }
            debug!(
                target: "terrain-pipeline",
                "Chunk {:?} was evicted from the queue, requeued",
                task.origin
            );
            task_manager.requeue_task(task);
        }
    }

    fn hand_off(&mut self, output: ChunkGenerationResult) -> usize {
        let ChunkGenerationResult { task, outcome } = output;
        if task.is_stale() {
            debug!(
                target: "terrain-pipeline",
                "Discarding chunk {:?} of outdated world {}",
                task.origin,
                task.generation
            );
            return 0;
        }

        match outcome {
            ChunkOutcome::Meshed(mut chunk) => {
                let handle = match chunk.mesh() {
                    Some(mesh) => self.uploader.upload(chunk.origin, mesh.vertices()),
                    None => return 0,
                };
                chunk.mark_gpu_ready();
                if let Some(previous) = self.world.insert(task.grid_index, chunk, handle) {
                    self.uploader.release(previous.handle);
                }
                if let Some(batch) = &mut self.batch {
                    batch.completed += 1;
                }
                1
            }
            ChunkOutcome::Failed(error) => {
                if task.attempt < self.settings.chunk_retry_limit {
                    warn!(
                        target: "terrain-pipeline",
                        "Chunk {:?} failed ({}), retry {} of {}",
                        task.origin,
                        error,
                        task.attempt + 1,
                        self.settings.chunk_retry_limit
                    );
                    let retry = task.retry();
                    self.publish(retry);
                } else {
                    warn!(
                        target: "terrain-pipeline",
                        "Chunk {:?} failed ({}), leaving a hole",
                        task.origin,
                        error
                    );
                }
                0
            }
            ChunkOutcome::Abandoned => 0,
        }
    }

    fn pending(&self) -> usize {
        self.task_manager
            .as_ref()
            .map_or(0, TaskManager::pending_tasks)
            + self.local_tasks.len()
    }

    fn finish_batch_if_done(&mut self) -> Result<(), GenerationError> {
        let pending = self.pending();
        let Some(batch) = &mut self.batch else {
            return Ok(());
        };
        if batch.finished.is_some() || pending > 0 {
            return Ok(());
        }

        let report = GenerationReport {
            seed: self.seed,
            generation: self.generation.load(Ordering::Acquire),
            chunks: batch.completed,
            holes: batch.total - batch.completed,
            vertices: self.world.vertex_count(),
            elapsed: batch.started.elapsed(),
        };
        batch.finished = Some(report);

        if report.chunks == 0 && report.holes > 0 {
            error!(
                target: "terrain-pipeline",
                "Every chunk of world {} failed to generate",
                report.generation
            );
            return Err(GenerationError::Exhausted {
                failed: report.holes,
            });
        }

        info!(
            target: "terrain-pipeline",
            "Time taken: {:?} for {} chunks ({} holes, {} vertices)",
            report.elapsed,
            report.chunks,
            report.holes,
            report.vertices
        );
        Ok(())
    }

    /// Whether the current batch has been fully handed off.
    pub fn is_complete(&self) -> bool {
        self.report().is_some()
    }

    /// Report of the current batch, once it is complete.
    pub fn report(&self) -> Option<GenerationReport> {
        self.batch.as_ref().and_then(|batch| batch.finished)
    }

    /// Generates a world for `seed` and waits until every chunk is handed off.
    ///
    /// # Errors
    /// [`GenerationError::Exhausted`] if no chunk could be generated, and
    /// [`GenerationError::WorkersDisconnected`] if the worker pool went away.
    pub fn generate_blocking(&mut self, seed: i32) -> Result<GenerationReport, GenerationError> {
        self.generate(seed);

        loop {
            self.process_queued();

            if let Some(task_manager) = &mut self.task_manager {
                match task_manager.wait_for_completed_task(WORKER_POLL_INTERVAL) {
                    Ok(Some(output)) => {
                        self.hand_off(output);
                    }
                    Ok(None) | Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        let pending = self.pending();
                        error!(
                            target: "terrain-pipeline",
                            "Chunk workers disconnected with {} chunks outstanding",
                            pending
                        );
                        return Err(GenerationError::WorkersDisconnected { pending });
                    }
                }
            }

            self.process_completed()?;
            if let Some(report) = self.report() {
                return Ok(report);
            }
        }
    }

    /// Populates and meshes the chunk at grid position `(grid_x, grid_z)` on the
    /// calling thread, with the current seed and settings. The chunk is returned
    /// meshed; it is neither uploaded nor placed in the world.
    ///
    /// # Errors
    /// [`GenerationError::ChunkOutOfRange`] if the grid position lies outside
    /// world coordinates, and [`GenerationError::Allocation`] if the chunk's
    /// vertex buffer could not be reserved.
    pub fn generate_chunk_sync(&self, grid_x: usize, grid_z: usize) -> Result<Chunk, GenerationError> {
        let mut chunk = Chunk::at_grid_position(grid_x, grid_z, self.settings.chunk_size)?;
        chunk.populate(self.seed, &self.settings.terrain);
        let mesh = build_mesh(&chunk)?;
        chunk.set_mesh(mesh);
        Ok(chunk)
    }

    /// Draw requests for every renderable chunk, in world slot order.
    pub fn render(&self) -> impl Iterator<Item = DrawRequest<'_, U::Handle>> {
        self.world.renderable().map(|entry| {
            let origin = entry.chunk.origin;
            DrawRequest {
                handle: &entry.handle,
                origin,
                translation: Vector3::new(origin.x as f32, origin.y as f32, origin.z as f32),
                vertex_count: entry.chunk.vertex_count() as u32,
            }
        })
    }

    /// Stops the workers and releases the world's GPU buffers.
    pub fn shutdown(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(mut task_manager) = self.task_manager.take() {
            task_manager.shutdown();
        }
        self.local_tasks.clear();
        let released = self.world.clear(&mut self.uploader);
        if released > 0 {
            info!(target: "terrain-pipeline", "Released {} chunk buffers", released);
        }
    }

    /// The world being generated.
    pub fn world(&self) -> &World<U::Handle> {
        &self.world
    }

    /// The uploader chunk buffers go through.
    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    /// The settings the pipeline was created with.
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Seed of the current world.
    pub fn seed(&self) -> i32 {
        self.seed
    }

    /// Current world generation; bumped by every `generate` and by `shutdown`.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl<U: ChunkUploader> Drop for GenerationPipeline<U> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
