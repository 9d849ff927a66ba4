//! # Engine State Module
//!
//! The terrain engine: noise, chunks, meshing, the worker pool and the
//! generation pipeline that ties them together.
//!
//! ## Key Components
//!
//! * `noise` - Deterministic gradient noise and its fractal sum
//! * `voxels` - Chunks, block faces, the world container and generation tasks
//! * `rendering` - Vertex format and the face-culling mesher
//! * `buffer_state` - The seam through which meshes reach the GPU
//! * `task_management` - Bounded work queue and worker threads
//! * `pipeline` - `GenerationPipeline`, the orchestrator owned by the main thread
//! * `settings` / `error` - Configuration and the error taxonomy
//!
//! ## Architecture
//!
//! Data flows leaf-first: the pipeline publishes one task per world slot, a
//! worker populates the chunk from noise and meshes it, and the finished chunk
//! travels back to the main thread, which uploads it and only then makes it
//! visible to rendering.

pub mod buffer_state;
pub mod error;
pub mod noise;
pub mod pipeline;
pub mod rendering;
pub mod settings;
pub mod task_management;
pub mod voxels;
