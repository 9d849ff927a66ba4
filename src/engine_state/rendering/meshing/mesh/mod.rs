//! Mesh generation for voxel rendering.
//!
//! # Architecture
//! - [`Face`]: a single visible face of a voxel, identified by cell and side
//! - [`MeshBuilder`]: the scratch buffer faces are written into
//! - [`ChunkMesh`]: the trimmed vertex buffer handed to the GPU

mod face;
mod mesh;

pub use face::{Face, VERTICES_PER_FACE};
pub use mesh::*;
