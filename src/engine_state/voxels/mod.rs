//! # Voxel Terrain Core
//!
//! ## Architecture
//!
//! * **Block**: the six faces of a voxel and their constant geometry
//! * **Chunk**: a fixed-size occupancy grid populated from the height field
//! * **World**: the fixed grid of finished chunks, owned by the main thread
//! * **Tasks**: the work unit that populates and meshes one chunk off-thread
//!
//! ## Data Flow
//!
//! 1. The pipeline creates a task per world slot
//! 2. A worker populates the chunk and meshes it
//! 3. The main thread uploads the mesh and places the chunk in the world
//! 4. Rendering reads only chunks placed in the world

pub mod block;
pub mod chunk;
pub mod tasks;
pub mod world;
